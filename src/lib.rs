#![deny(missing_docs)]
#![warn(rust_2018_idioms, missing_debug_implementations)]
#![cfg_attr(not(any(feature = "std", test)), no_std)]
//! This crate provides an intrusive Lock-Free Multi-Producer-Multi-Consumer
//! FIFO Queue
//!
//! The Queue never allocates or frees any Memory itself, all the Nodes are
//! owned by the Caller and only linked together by the Queue, see
//! [`queues::mpmc::intrusive`] for the details.
//!
//! # Feature-Flags
//! * `std`: Enables the parts that depend on the Standard-Library
//! * `harness`: Enables the Benchmark-Harness used to compare the Queue with
//!   other Queue implementations
//! * `full`: Enables all the Feature-Flags
//! * `no-cache-pad`: Disables the Cache-Line padding inside of the Queue

#[macro_use]
mod util;
pub(crate) mod sync;

pub mod queues;

#[cfg(feature = "harness")]
pub mod harness;

pub use util::CACHE_LINE_SIZE;
