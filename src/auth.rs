//! Provider identifiers and secret wrappers shared across the crate.

pub mod id;
pub mod secret;

pub use id::*;
pub use secret::*;
