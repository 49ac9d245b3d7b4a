//! tutorlink/crates/storage-adapters
//!
//! Adapter implementations of the `domains::DocumentStore` port.
//!
//! `MemoryStore` is the in-process tier: it backs local development, the
//! assembly binary, and every test that needs real store semantics
//! (transactions, batched writes, live queries) without a network.

pub mod memory;

pub use memory::MemoryStore;
