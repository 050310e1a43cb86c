//! Provides Multi-Producer-Multi-Consumer Queues
//!
//! # Intrusive
//! The [`intrusive`] Queue is an unbounded Queue that does not own any of its
//! Elements, instead every Element carries its own [`Links`] field that the
//! Queue uses to chain the Elements together.
//!
//! # Reference
//! * [Simple, Fast, and Practical Non-Blocking and Blocking Concurrent Queue Algorithms](https://www.cs.rochester.edu/u/scott/papers/1996_PODC_queues.pdf)

pub mod intrusive;

#[doc(inline)]
pub use intrusive::{Linked, Links, Queue};
