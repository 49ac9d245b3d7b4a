//! tutorlink/crates/domains
//!
//! The central domain models and port definitions for the tutorlink core.

pub mod error;
pub mod identity;
pub mod models;
pub mod store;

// Re-exporting for easier access in other crates
pub use error::*;
pub use identity::*;
pub use models::*;
pub use store::*;
