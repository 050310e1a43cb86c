use crate::sync::hint;
use core::{
    fmt,
    ops::{Deref, DerefMut},
};

macro_rules! test_trace {
    ($($tt:tt)*) => {
        #[cfg(test)]
        tracing::trace!($($tt)*)
    }
}

/// The Size of a single Cache-Line, that the Queue uses to seperate the
/// Consumer and Producer facing State.
///
/// This is 128 on x86_64 and aarch64, because both of them prefetch the
/// adjacent Cache-Line as well, and 64 on all other Targets. When the
/// `no-cache-pad` Feature is enabled, no padding is applied and this is 1.
#[cfg(not(feature = "no-cache-pad"))]
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
pub const CACHE_LINE_SIZE: usize = 128;
/// The Size of a single Cache-Line, that the Queue uses to seperate the
/// Consumer and Producer facing State.
#[cfg(not(feature = "no-cache-pad"))]
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub const CACHE_LINE_SIZE: usize = 64;
/// The Size of a single Cache-Line, that the Queue uses to seperate the
/// Consumer and Producer facing State.
#[cfg(feature = "no-cache-pad")]
pub const CACHE_LINE_SIZE: usize = 1;

pub(crate) use cache_pad::CachePadded;

#[cfg(feature = "no-cache-pad")]
mod cache_pad {
    #[derive(Default)]
    pub(crate) struct CachePadded<T>(pub(crate) T);
}

// The alignments here have to stay in sync with `CACHE_LINE_SIZE`
#[cfg(not(feature = "no-cache-pad"))]
mod cache_pad {
    #[cfg_attr(any(target_arch = "x86_64", target_arch = "aarch64"), repr(align(128)))]
    #[cfg_attr(
        not(any(target_arch = "x86_64", target_arch = "aarch64")),
        repr(align(64))
    )]
    #[derive(Default)]
    pub(crate) struct CachePadded<T>(pub(crate) T);
}

impl<T> Deref for CachePadded<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for CachePadded<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for CachePadded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An exponential Backoff used between the Attempts of the Retry-Loops
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    exp: u8,
}

impl Backoff {
    const MAX_EXPONENT: u8 = 6;

    pub(crate) const fn new() -> Self {
        Self { exp: 0 }
    }

    /// Spins for 2^exp Iterations and then doubles the Time for the next
    /// call, until the maximum has been reached
    #[inline(always)]
    pub(crate) fn spin(&mut self) {
        // Every spin is a yield under loom, so spinning more than once only
        // blows up the number of explored Interleavings
        #[cfg(loom)]
        hint::spin_loop();

        #[cfg(not(loom))]
        for _ in 0..(1u32 << self.exp) {
            hint::spin_loop();
        }

        if self.exp < Self::MAX_EXPONENT {
            self.exp += 1;
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
