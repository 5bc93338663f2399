//! # Memory Management
//!
//! Chunked slot pools backing every store in the crate.
//!
//! ## Design Philosophy
//!
//! - Storage grows by appending chunks, never by reallocating
//! - A slot index stays valid for the lifetime of the pool
//! - Freed slots are reused first (LIFO), bounding growth under churn

mod pool;

pub use pool::{PoolHandle, SlotPool, DEFAULT_CHUNK_SIZE};
