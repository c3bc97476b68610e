//! Login flow orchestration: the callback route and identity upsert.

pub mod callback;
#[cfg(feature = "axum")] pub mod router;
pub mod upsert;

pub use callback::*;
