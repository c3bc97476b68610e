//! Provider descriptor data structures shared by all clients.
//!
//! A descriptor captures everything provider-specific that is plain data: endpoint URLs, the
//! default configuration and its lookup prefix, which configuration keys travel in which request,
//! and the JSON field names of the token and profile payloads.

/// Builder API for assembling provider descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{
	_prelude::*,
	auth::ProviderName,
	config::{ConfigKey, ProviderConfig},
};

/// Token response fields kept by default.
pub const DEFAULT_TOKEN_FIELDS: [&str; 5] =
	["access_token", "expires_in", "token_type", "scope", "refresh_token"];

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Browser-facing authorization endpoint.
	pub authorization: Url,
	/// Code-for-token exchange endpoint.
	pub token: Url,
	/// Authenticated user-profile endpoint.
	pub profile: Url,
}

/// Profile payload field names for the identity attributes the crate reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
	/// Stable provider user id; also the required key when parsing profiles.
	pub id: String,
	/// Human-readable handle.
	pub username: String,
	/// Avatar URL.
	pub avatar: String,
}
impl ProfileFields {
	/// Builds a field-name set.
	pub fn new(id: impl Into<String>, username: impl Into<String>, avatar: impl Into<String>) -> Self {
		Self { id: id.into(), username: username.into(), avatar: avatar.into() }
	}

	/// Field names in parse order.
	pub fn wanted(&self) -> [&str; 3] {
		[&self.id, &self.username, &self.avatar]
	}
}

/// Immutable provider descriptor consumed by clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Provider name; namespaces cache entries and stored identities.
	pub name: ProviderName,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Prefix for external configuration keys (`LINKS_GITHUB_`).
	pub config_prefix: String,
	/// Ordered default configuration.
	pub defaults: ProviderConfig,
	/// Keys appended to the authorization URL.
	pub public_params: Vec<ConfigKey>,
	/// Keys sent in the token exchange form alongside `code`.
	pub token_params: Vec<ConfigKey>,
	/// Token response fields to keep.
	pub token_fields: Vec<String>,
	/// Profile response field names.
	pub profile_fields: ProfileFields,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided name.
	pub fn builder(name: ProviderName) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(name)
	}

	/// Token response fields as string slices.
	pub fn token_fields(&self) -> Vec<&str> {
		self.token_fields.iter().map(String::as_str).collect()
	}
}
