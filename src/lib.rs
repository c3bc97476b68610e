//! Server-side OAuth 2.0 authorization-code login for third-party identity providers.
//!
//! The crate drives the four steps of a provider login (redirect, code exchange, profile fetch,
//! identity upsert) behind the [`provider::ProviderClient`] trait, keeps per-request state in an
//! explicit [`cache::RequestContext`], and persists identities through a pluggable
//! [`store::IdentityStore`].

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod parse;
pub mod provider;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::ConfigKey,
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		provider::{GitHub, ProviderDescriptor, github},
		store::{IdentityStore, MemoryStore},
	};

	/// GitHub client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestGitHub = GitHub<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// GitHub descriptor whose OAuth and API endpoints live under `base` (a mock server URL).
	pub fn mock_github_descriptor(base: &str) -> ProviderDescriptor {
		let base = base.trim_end_matches('/');
		let oauth = Url::parse(&format!("{base}/login/oauth"))
			.expect("Mock OAuth base URL should parse successfully.");
		let api = Url::parse(base).expect("Mock API base URL should parse successfully.");

		github::descriptor_at(&oauth, &api)
			.expect("Mock GitHub descriptor should build successfully.")
	}

	/// Constructs a [`GitHub`] client backed by an in-memory store and the reqwest transport used
	/// across integration tests.
	pub fn build_reqwest_test_github(
		base: &str,
		client_id: &str,
		client_secret: &str,
	) -> (ReqwestTestGitHub, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn IdentityStore> = store_backend.clone();
		let descriptor = mock_github_descriptor(base);
		let config = descriptor
			.defaults
			.clone()
			.with(ConfigKey::ClientId, client_id)
			.with(ConfigKey::ClientSecret, client_secret)
			.with(ConfigKey::RedirectUri, "https://app.example.com/oauth/github");
		let client = GitHub::with_config(
			descriptor,
			config,
			store,
			test_reqwest_http_client(),
			ReqwestTransportErrorMapper,
		);

		(client, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _, tower as _};
