//! An unbounded intrusive Lock-Free MPMC Queue
//!
//! # Structure
//! The Queue is a singly linked List, whose Head is a permanent Sentinel
//! that is embedded in the Queue itself, and a `tail` Cursor that points to
//! the last Node or lags at most behind it, while an Enqueue is still in
//! progress. Every Operation that notices a lagging `tail` helps moving it
//! forward, so no Thread ever has to wait for another one.
//!
//! A Node is removed by swinging the Sentinel's Link past it. The last Node
//! is special, because a Producer could append to it at the same Time, so
//! its Link is first closed (by pointing it at the Sentinel, which is never
//! the Successor of any real Node) before it is unlinked and the `tail` is
//! reset to the Sentinel.
//!
//! # Tail-Generations
//! The `tail` returns to the Sentinel after every Drain, so a delayed Thread
//! could otherwise move it from the Sentinel onto a Node, that has already
//! been removed in the meantime. To prevent this, the `tail` never stores
//! the Address of the Sentinel itself but an odd Marker, that encodes how
//! often it has been reset. Every Reset produces a new Marker and all the
//! compare-exchanges that were based on an older one fail.
//!
//! # Memory
//! The Queue never allocates or frees anything. The Nodes belong to the
//! Caller and have to stay valid, see the Safety-Section of [`Linked`] for
//! when a Node that was returned by the Queue can be reused.
//!
//! # Example
//! ```rust
//! # use std::ptr::NonNull;
//! # use msfifo::queues::mpmc::intrusive::{Linked, Links, Queue};
//! struct Entry {
//!     links: Links<Entry>,
//!     value: u64,
//! }
//!
//! unsafe impl Linked for Entry {
//!     type Handle = Box<Entry>;
//!
//!     const LINKS_OFFSET: usize = core::mem::offset_of!(Entry, links);
//!
//!     fn into_ptr(handle: Box<Entry>) -> NonNull<Entry> {
//!         NonNull::from(Box::leak(handle))
//!     }
//!
//!     unsafe fn from_ptr(ptr: NonNull<Entry>) -> Box<Entry> {
//!         Box::from_raw(ptr.as_ptr())
//!     }
//! }
//!
//! let queue = Box::pin(Queue::<Entry>::new());
//! queue.as_ref().init();
//!
//! queue.as_ref().send(Box::new(Entry { links: Links::new(), value: 13 }));
//!
//! assert_eq!(Some(13), queue.as_ref().recv().map(|e| e.value));
//! assert!(queue.as_ref().recv().is_none());
//! ```

use core::{
    fmt,
    pin::Pin,
    ptr::{self, NonNull},
};

use crate::{
    sync::atomic::{self, AtomicPtr, AtomicUsize},
    util::{Backoff, CachePadded},
};

mod links;
pub use links::{Linked, Links};

/// The intrusive Lock-Free MPMC Queue
///
/// The Address of the Sentinel embedded in the Queue is used to mark Nodes
/// that are being removed, so all the Operations require it to be pinned.
#[repr(C)]
pub struct Queue<T: Linked> {
    /// The permanent Head of the List, mostly written to by Consumers
    sentinel: CachePadded<Links<T>>,
    /// The Producer facing Cursor
    tail: CachePadded<Tail<T>>,
}

struct Tail<T> {
    /// The last Node in the List, one behind it, or a Sentinel-Marker.
    ///
    /// This is null until the Queue has been initialized
    current: AtomicPtr<Links<T>>,
    /// The Generation of the most recent Sentinel-Marker
    resets: AtomicUsize,
}

// Safety:
// All the shared State is only modified through atomic Operations, the Nodes
// however are passed between Threads and therefore have to be Send
unsafe impl<T: Linked + Send> Send for Queue<T> {}
unsafe impl<T: Linked + Send> Sync for Queue<T> {}

impl<T: Linked> Queue<T> {
    /// Creates a new empty Queue
    ///
    /// The Queue needs to be pinned before it can be used, either by
    /// boxing it or by placing it in a `static`.
    #[cfg(not(loom))]
    pub const fn new() -> Self {
        Self {
            sentinel: CachePadded(Links::new()),
            tail: CachePadded(Tail {
                current: AtomicPtr::new(ptr::null_mut()),
                resets: AtomicUsize::new(0),
            }),
        }
    }
    /// Creates a new empty Queue
    #[cfg(loom)]
    pub fn new() -> Self {
        Self {
            sentinel: CachePadded(Links::new()),
            tail: CachePadded(Tail {
                current: AtomicPtr::new(ptr::null_mut()),
                resets: AtomicUsize::new(0),
            }),
        }
    }

    /// Points the `tail` at the Sentinel, establishing the initial State of
    /// the Queue.
    ///
    /// Calling this once, before sharing the Queue with other Threads, avoids
    /// the small extra Cost of the first Operation initializing it lazily.
    /// Calling it again has no effect.
    pub fn init(self: Pin<&Self>) {
        self.load_tail();
    }

    /// Enqueues the given Node at the End of the Queue
    ///
    /// The Link of the Node is reset, so any Value left over from a previous
    /// use of the Node is simply overwritten.
    pub fn send(self: Pin<&Self>, node: T::Handle) {
        let node = T::into_ptr(node);
        // Safety:
        // The Node was just handed to us by the Caller and is therefore valid
        let links = unsafe { T::links(node) }.as_ptr();
        // The Store is published by the successful CAS below, so it does not
        // need any ordering on its own
        unsafe { &(*links).next }.store(ptr::null_mut(), atomic::Ordering::Relaxed);

        let sentinel = self.sentinel_ptr();
        let mut backoff = Backoff::new();

        loop {
            let tail = self.load_tail();
            // Safety:
            // The tail is either our Sentinel or a Node, that the Caller keeps
            // alive as described by the Safety-Requirements of `Linked`
            let tail_next = unsafe { &(*self.resolve(tail)).next };
            let next = tail_next.load(atomic::Ordering::Acquire);

            if tail != self.tail.current.load(atomic::Ordering::Relaxed) {
                continue;
            }

            if next.is_null() {
                match tail_next.compare_exchange(
                    ptr::null_mut(),
                    links,
                    atomic::Ordering::AcqRel,
                    atomic::Ordering::Acquire,
                ) {
                    Ok(_) => {
                        // If this fails, someone else already moved the tail
                        // forward for us or the Node has already been
                        // removed again and the tail was reset
                        let _ = self.tail.current.compare_exchange(
                            tail,
                            links,
                            atomic::Ordering::AcqRel,
                            atomic::Ordering::Relaxed,
                        );
                        return;
                    }
                    Err(_) => {
                        test_trace!(?tail, "lost race for the tail link");
                        backoff.spin();
                    }
                }
            } else if next == sentinel {
                // The tail is the last Node and a Consumer is removing it
                test_trace!(?tail, "helping to remove the closed last node");
                self.finish_removal(tail);
            } else {
                test_trace!(?tail, ?next, "helping the lagging tail");
                let _ = self.tail.current.compare_exchange(
                    tail,
                    next,
                    atomic::Ordering::AcqRel,
                    atomic::Ordering::Relaxed,
                );
            }
        }
    }

    /// Attempts to dequeue the first Node from the Queue
    ///
    /// # Returns
    /// * `Some(node)` with the first Node of the Queue
    /// * `None` if the Queue was empty at the Time
    pub fn recv(self: Pin<&Self>) -> Option<T::Handle> {
        let sentinel = self.sentinel_ptr();
        let mut backoff = Backoff::new();

        loop {
            let first = self.sentinel.next.load(atomic::Ordering::Acquire);
            let tail = self.load_tail();

            if first != self.sentinel.next.load(atomic::Ordering::Acquire) {
                continue;
            }

            if first.is_null() {
                return None;
            }

            // Safety:
            // The first Node is kept alive by the Caller, as described by the
            // Safety-Requirements of `Linked`
            let first_next = unsafe { &(*first).next };
            let next = first_next.load(atomic::Ordering::Acquire);

            if next == sentinel {
                // Someone else already claimed the first Node as the last
                // Node of the Queue, but has not finished removing it yet
                test_trace!(?first, "helping to remove the closed last node");
                self.finish_removal(first);
                continue;
            }

            if is_marker(tail) {
                test_trace!(?first, "helping the tail off the sentinel");
                let _ = self.tail.current.compare_exchange(
                    tail,
                    first,
                    atomic::Ordering::AcqRel,
                    atomic::Ordering::Relaxed,
                );
                continue;
            }

            if next.is_null() {
                // Close the Link of the last Node, so no Producer can append
                // to it anymore, this claims the Node for us
                if first_next
                    .compare_exchange(
                        ptr::null_mut(),
                        sentinel,
                        atomic::Ordering::AcqRel,
                        atomic::Ordering::Acquire,
                    )
                    .is_ok()
                {
                    self.finish_removal(first);
                    return Some(unsafe { Self::into_handle(first) });
                }
            } else if tail == first {
                // The tail must never point at a Node that is no longer
                // reachable from the Sentinel
                test_trace!(?first, ?next, "helping the tail past the first node");
                let _ = self.tail.current.compare_exchange(
                    first,
                    next,
                    atomic::Ordering::AcqRel,
                    atomic::Ordering::Relaxed,
                );
                continue;
            } else if self
                .sentinel
                .next
                .compare_exchange(
                    first,
                    next,
                    atomic::Ordering::AcqRel,
                    atomic::Ordering::Acquire,
                )
                .is_ok()
            {
                return Some(unsafe { Self::into_handle(first) });
            }

            test_trace!(?first, "lost race for the first node");
            backoff.spin();
        }
    }

    /// Dequeues the first Node, spinning until the Queue contains one
    pub fn wait(self: Pin<&Self>) -> T::Handle {
        let mut backoff = Backoff::new();
        loop {
            if let Some(node) = self.recv() {
                return node;
            }
            backoff.spin();
        }
    }

    /// Checks if the Queue is currently empty
    ///
    /// # Note
    /// This is only a Snapshot, other Threads may enqueue or dequeue Nodes
    /// right after this returns
    pub fn is_empty(self: Pin<&Self>) -> bool {
        let first = self.sentinel.next.load(atomic::Ordering::Acquire);
        if first.is_null() {
            return true;
        }

        // A closed first Node has already been dequeued
        let next = unsafe { &(*first).next }.load(atomic::Ordering::Acquire);
        next == self.sentinel_ptr()
    }

    /// Completes the Removal of the closed last Node, by first unlinking it
    /// from the Sentinel and then resetting the tail to a fresh
    /// Sentinel-Marker.
    ///
    /// The Order matters, as a tail at the Sentinel while the Sentinel still
    /// links to the removed Node would be moved back onto it.
    fn finish_removal(&self, node: *mut Links<T>) {
        let _ = self.sentinel.next.compare_exchange(
            node,
            ptr::null_mut(),
            atomic::Ordering::AcqRel,
            atomic::Ordering::Relaxed,
        );

        if self.tail.current.load(atomic::Ordering::Acquire) != node {
            return;
        }

        let generation = self
            .tail
            .resets
            .fetch_add(1, atomic::Ordering::Relaxed)
            .wrapping_add(1);
        let _ = self.tail.current.compare_exchange(
            node,
            marker(generation),
            atomic::Ordering::AcqRel,
            atomic::Ordering::Relaxed,
        );
    }

    /// Loads the current tail, initializing it to the first Sentinel-Marker
    /// if the Queue has not been initialized yet
    fn load_tail(self: Pin<&Self>) -> *mut Links<T> {
        let tail = self.tail.current.load(atomic::Ordering::Acquire);
        if !tail.is_null() {
            return tail;
        }

        match self.tail.current.compare_exchange(
            ptr::null_mut(),
            marker(0),
            atomic::Ordering::AcqRel,
            atomic::Ordering::Acquire,
        ) {
            Ok(_) => marker(0),
            Err(current) => current,
        }
    }

    /// Maps a Value of the tail to the Links it refers to
    fn resolve(&self, tail: *mut Links<T>) -> *mut Links<T> {
        if is_marker(tail) {
            self.sentinel_ptr()
        } else {
            tail
        }
    }

    fn sentinel_ptr(&self) -> *mut Links<T> {
        &*self.sentinel as *const Links<T> as *mut Links<T>
    }

    /// # Safety
    /// The Links have to belong to a Node that was enqueued using `send` and
    /// has now been removed from the Queue by the current Thread
    unsafe fn into_handle(links: *mut Links<T>) -> T::Handle {
        let links = NonNull::new_unchecked(links);
        T::from_ptr(T::from_links(links))
    }

    #[cfg(test)]
    fn tail_is_sentinel(self: Pin<&Self>) -> bool {
        is_marker(self.tail.current.load(atomic::Ordering::Acquire))
    }
}

/// The Sentinel-Marker for the given Generation.
///
/// Links contain a Pointer and are therefore at least 2-aligned, so an odd
/// Value can never be mistaken for a Node
fn marker<T>(generation: usize) -> *mut Links<T> {
    ((generation << 1) | 1) as *mut Links<T>
}

fn is_marker<T>(tail: *mut Links<T>) -> bool {
    tail as usize & 1 == 1
}


#[cfg(not(loom))]
impl<T: Linked> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Linked> Drop for Queue<T> {
    fn drop(&mut self) {
        // Safety:
        // The Queue can only be used while pinned and as we are dropping it
        // now, it has not been moved since then
        let this = unsafe { Pin::new_unchecked(&*self) };
        while let Some(node) = this.recv() {
            drop(node);
        }
    }
}

impl<T: Linked> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("sentinel", &self.sentinel_ptr())
            .field("head", &self.sentinel.next.load(atomic::Ordering::Relaxed))
            .field("tail", &self.tail.current.load(atomic::Ordering::Relaxed))
            .field("resets", &self.tail.resets.load(atomic::Ordering::Relaxed))
            .finish()
    }
}
