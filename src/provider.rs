//! Provider-facing descriptors (data) and clients (behavior).
//!
//! `descriptor` exposes validated metadata ([`ProviderDescriptor`]) covering HTTPS-only
//! endpoints, default configuration, and the parameter/field names a provider uses.
//! `client` defines [`ProviderClient`], the capability set every login provider offers, plus the
//! shared [`ClientCore`] that concrete providers compose. `github` is the first provider.

pub mod client;
pub mod descriptor;
pub mod github;

pub use client::*;
pub use descriptor::*;
pub use github::GitHub;
