//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **UserRole**: Admin or client, as injected by the auth layer

mod role;

pub use role::*;
