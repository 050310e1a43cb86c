use core::{fmt, marker::PhantomPinned, ptr::NonNull};

use crate::sync::atomic;

/// The Link-Field that has to be embedded in every Type that should be
/// stored in the [`Queue`](super::Queue)
///
/// The Queue only ever modifies this Field and never touches the rest of
/// the surrounding Type.
pub struct Links<T> {
    /// The next Node in the Queue or null, if this is the last Node
    pub(super) next: atomic::AtomicPtr<Links<T>>,
    /// Links have to be `!Unpin`, because the Queue holds on to their Address
    /// as long as they are part of it
    _unpin: PhantomPinned,
}

/// A Type that can be stored in the intrusive [`Queue`](super::Queue),
/// because it contains a [`Links`] Field.
///
/// # Example
/// ```rust
/// # use std::ptr::NonNull;
/// # use msfifo::queues::mpmc::intrusive::{Linked, Links};
/// struct Entry {
///     links: Links<Entry>,
///     value: u64,
/// }
///
/// unsafe impl Linked for Entry {
///     type Handle = Box<Entry>;
///
///     const LINKS_OFFSET: usize = core::mem::offset_of!(Entry, links);
///
///     fn into_ptr(handle: Box<Entry>) -> NonNull<Entry> {
///         NonNull::from(Box::leak(handle))
///     }
///
///     unsafe fn from_ptr(ptr: NonNull<Entry>) -> Box<Entry> {
///         Box::from_raw(ptr.as_ptr())
///     }
/// }
/// ```
///
/// # Safety
/// Implementing this Trait is unsafe, because the Queue relies on the
/// following for its correctness:
/// * `LINKS_OFFSET` has to be the Byte-Offset of a `Links<Self>` Field in
///   `Self`
/// * A Node must not be moved or deallocated while it is part of a Queue
/// * A Node that was returned by the Queue must not be deallocated or
///   enqueued again, while another Operation on the same Queue that started
///   before the Node was returned could still be running. Other Threads may
///   still read the Link of such a Node, so the Caller has to use some form
///   of Memory-Reclamation (Epochs, Hazard-Pointers or simply never freeing
///   the Nodes while the Queue is in use) to decide when it can be reused.
pub unsafe trait Linked: Sized {
    /// The owning Handle for a single Node, like [`Box`]
    ///
    /// [`Box`]: https://doc.rust-lang.org/std/boxed/struct.Box.html
    type Handle;

    /// The Offset of the `Links<Self>` Field in `Self`, usually obtained
    /// using `core::mem::offset_of!`
    const LINKS_OFFSET: usize;

    /// Converts the Handle into a raw Pointer, giving up the ownership of
    /// the Node to the Queue
    fn into_ptr(handle: Self::Handle) -> NonNull<Self>;

    /// Converts a raw Pointer, previously obtained from
    /// [`into_ptr`](Linked::into_ptr), back into the owning Handle
    ///
    /// # Safety
    /// The Pointer has to come from `into_ptr` and the Handle for it must
    /// not exist anymore
    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle;

    /// Obtains the Links of the Node
    ///
    /// # Safety
    /// The Pointer has to point to a valid instance of `Self`
    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<Self>> {
        let raw = ptr.as_ptr().cast::<u8>().add(Self::LINKS_OFFSET);
        NonNull::new_unchecked(raw.cast::<Links<Self>>())
    }

    /// Obtains the Node from a Pointer to its Links
    ///
    /// # Safety
    /// The Links have to be embedded in an instance of `Self` and the
    /// Pointer has to be derived from a Pointer to that instance, like the
    /// ones returned by [`links`](Linked::links)
    unsafe fn from_links(links: NonNull<Links<Self>>) -> NonNull<Self> {
        let raw = links.as_ptr().cast::<u8>().sub(Self::LINKS_OFFSET);
        NonNull::new_unchecked(raw.cast::<Self>())
    }
}

impl<T> Links<T> {
    /// Creates a new unlinked Link-Field
    #[cfg(not(loom))]
    pub const fn new() -> Self {
        Self {
            next: atomic::AtomicPtr::new(core::ptr::null_mut()),
            _unpin: PhantomPinned,
        }
    }
    /// Creates a new unlinked Link-Field
    #[cfg(loom)]
    pub fn new() -> Self {
        Self {
            next: atomic::AtomicPtr::new(core::ptr::null_mut()),
            _unpin: PhantomPinned,
        }
    }
}

impl<T> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("next", &self.next.load(atomic::Ordering::Relaxed))
            .finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[repr(C)]
    struct Entry {
        value: u64,
        links: Links<Entry>,
    }

    unsafe impl Linked for Entry {
        type Handle = NonNull<Entry>;

        const LINKS_OFFSET: usize = core::mem::offset_of!(Entry, links);

        fn into_ptr(handle: NonNull<Entry>) -> NonNull<Entry> {
            handle
        }

        unsafe fn from_ptr(ptr: NonNull<Entry>) -> NonNull<Entry> {
            ptr
        }
    }

    #[test]
    fn new_is_unlinked() {
        let links = Links::<Entry>::new();
        assert!(links.next.load(atomic::Ordering::Relaxed).is_null());
    }

    #[test]
    fn links_to_node_and_back() {
        let mut entry = Entry {
            value: 13,
            links: Links::new(),
        };
        let ptr = NonNull::from(&mut entry);

        let links = unsafe { Entry::links(ptr) };
        assert_eq!(
            core::ptr::addr_of!(entry.links) as usize,
            links.as_ptr() as usize
        );

        let node = unsafe { Entry::from_links(links) };
        assert_eq!(ptr, node);
        assert_eq!(13, unsafe { node.as_ref() }.value);
    }
}
