//! Switches between the real atomics and the ones provided by loom, when
//! running the loom model tests

#[cfg(loom)]
pub(crate) use loom::{hint, sync::atomic};

#[cfg(not(loom))]
pub(crate) use core::{hint, sync::atomic};
