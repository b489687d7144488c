//! Storage abstraction and implementations for studytrack.
//!
//! This crate provides a trait-based storage interface with a JSON file
//! implementation and an in-memory one. Both enforce optimistic versioning
//! on goals and per-user reward state.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory;

pub use trait_::{Storage, StorageError, Result};
pub use json_storage::JsonStorage;
pub use memory::MemoryStorage;
