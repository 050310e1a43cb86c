use std::{
    fmt::Debug,
    mem,
    pin::Pin,
    ptr::NonNull,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use crate::queues::mpmc::intrusive::{Linked, Links, Queue};

use super::BenchQueue;

/// A single Value in the Queue
#[derive(Debug)]
struct Slot {
    links: Links<Slot>,
    value: u64,
}

unsafe impl Linked for Slot {
    type Handle = Box<Slot>;

    const LINKS_OFFSET: usize = mem::offset_of!(Slot, links);

    fn into_ptr(handle: Box<Slot>) -> NonNull<Slot> {
        NonNull::from(Box::leak(handle))
    }

    unsafe fn from_ptr(ptr: NonNull<Slot>) -> Box<Slot> {
        Box::from_raw(ptr.as_ptr())
    }
}

/// All the Slots a single Handle has dequeued over its Lifetime
#[derive(Debug)]
struct Retired {
    links: Links<Retired>,
    owner: usize,
    slots: Vec<Box<Slot>>,
}

unsafe impl Linked for Retired {
    type Handle = Box<Retired>;

    const LINKS_OFFSET: usize = mem::offset_of!(Retired, links);

    fn into_ptr(handle: Box<Retired>) -> NonNull<Retired> {
        NonNull::from(Box::leak(handle))
    }

    unsafe fn from_ptr(ptr: NonNull<Retired>) -> Box<Retired> {
        Box::from_raw(ptr.as_ptr())
    }
}

#[derive(Debug)]
struct Shared {
    queue: Queue<Slot>,
    /// The dequeued Slots of every Handle that has already been dropped.
    ///
    /// Other Threads may still look at a dequeued Slot, so the Slots are only
    /// freed once the Adapter and all of its Handles are gone and no Thread
    /// can access the Queue anymore
    graveyard: Queue<Retired>,
    /// The Number of Slots in the Graveyard
    retained: AtomicUsize,
}

/// Drives the intrusive [`Queue`] from the Benchmark-Harness
///
/// Every enqueued Value is boxed into a new Node and the Nodes are never
/// reused while the Adapter or any of its Handles are still alive, which is
/// enough to satisfy the Memory-Requirements of the Queue.
#[derive(Debug)]
pub struct Intrusive {
    shared: Pin<Arc<Shared>>,
}

/// The per-Thread Handle for the [`Intrusive`] Adapter
pub struct IntrusiveHandle {
    id: usize,
    shared: Pin<Arc<Shared>>,
    retired: Vec<Box<Slot>>,
}

impl Intrusive {
    /// Creates a new Adapter with an empty Queue
    pub fn new() -> Self {
        let shared = Arc::pin(Shared {
            queue: Queue::new(),
            graveyard: Queue::new(),
            retained: AtomicUsize::new(0),
        });

        let intrusive = Self { shared };
        intrusive.queue().init();
        graveyard(&intrusive.shared).init();
        intrusive
    }

    /// The Number of dequeued Slots, that are kept alive until the Adapter
    /// and all of its Handles have been dropped.
    ///
    /// This only includes the Slots of Handles that have already been
    /// dropped. A long-running Benchmark should therefore use a new Adapter
    /// for every Run.
    pub fn retained(&self) -> usize {
        self.shared.retained.load(Ordering::Acquire)
    }

    fn queue(&self) -> Pin<&Queue<Slot>> {
        queue(&self.shared)
    }
}

impl Default for Intrusive {
    fn default() -> Self {
        Self::new()
    }
}

fn queue(shared: &Pin<Arc<Shared>>) -> Pin<&Queue<Slot>> {
    // Safety:
    // The Queue is never moved out of the pinned Shared-State
    unsafe { shared.as_ref().map_unchecked(|s| &s.queue) }
}

fn graveyard(shared: &Pin<Arc<Shared>>) -> Pin<&Queue<Retired>> {
    // Safety:
    // The Queue is never moved out of the pinned Shared-State
    unsafe { shared.as_ref().map_unchecked(|s| &s.graveyard) }
}

impl BenchQueue for Intrusive {
    type Handle = IntrusiveHandle;

    fn register(&self, id: usize) -> IntrusiveHandle {
        tracing::debug!(id, "registered handle");

        IntrusiveHandle {
            id,
            shared: self.shared.clone(),
            retired: Vec::new(),
        }
    }

    fn enqueue(&self, _handle: &mut IntrusiveHandle, value: u64) {
        self.queue().send(Box::new(Slot {
            links: Links::new(),
            value,
        }));
    }

    fn dequeue(&self, handle: &mut IntrusiveHandle) -> Option<u64> {
        let slot = self.queue().recv()?;
        let value = slot.value;
        handle.retired.push(slot);
        Some(value)
    }
}

impl IntrusiveHandle {
    /// The Index this Handle was registered with
    pub fn id(&self) -> usize {
        self.id
    }

    /// The Number of Values this Handle has dequeued so far
    pub fn dequeued(&self) -> usize {
        self.retired.len()
    }
}

impl Debug for IntrusiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntrusiveHandle")
            .field("id", &self.id)
            .field("dequeued", &self.retired.len())
            .finish()
    }
}

impl Drop for IntrusiveHandle {
    fn drop(&mut self) {
        if self.retired.is_empty() {
            return;
        }

        let slots = mem::take(&mut self.retired);
        tracing::debug!(id = self.id, count = slots.len(), "retiring dequeued slots");

        self.shared.retained.fetch_add(slots.len(), Ordering::AcqRel);

        graveyard(&self.shared).send(Box::new(Retired {
            links: Links::new(),
            owner: self.id,
            slots,
        }));
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Safety:
        // The Shared-State only ever lives pinned in an Arc, and is now being
        // dropped in place
        let graveyard = unsafe { Pin::new_unchecked(&self.graveyard) };
        while let Some(retired) = graveyard.recv() {
            tracing::debug!(
                owner = retired.owner,
                count = retired.slots.len(),
                "freeing retired slots"
            );
        }
    }
}
