//! This module provides the Queue implementations of this crate
//!
//! # MPMC
//! These are queues that allow multiple Producers and multiple Consumers to
//! concurrently access the same Queue

pub mod mpmc;
