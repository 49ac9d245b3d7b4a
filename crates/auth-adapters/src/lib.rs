//! tutorlink/crates/auth-adapters
//!
//! Identity-provider adapters. The in-process [`SessionIdentity`] models a
//! single signed-in session and is the default wiring for local runs and
//! tests; a hosted identity service would implement the same port.

pub mod session;

pub use session::SessionIdentity;
