//! Crate-level error types shared across providers, flows, and stores.

// self
use crate::{_prelude::*, config::ConfigKey, oauth::EndpointKind};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure, including an upsert race that survived its single retry.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Provider answered with a non-success status or an unreadable body.
	#[error(transparent)]
	Provider(#[from] ProviderError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Callback request carried no authorization code.
	#[error("Callback request is missing the `code` parameter.")]
	MissingCode,
	/// Token endpoint response did not contain an access token.
	#[error("Provider did not issue an access token for the supplied code.")]
	EmptyExchange,
	/// Profile fetch or upsert was attempted without a cached access token.
	#[error("No access token is cached for provider `{provider}`.")]
	MissingToken {
		/// Provider whose cache lacked a token.
		provider: String,
	},
	/// Cached profile lacks the provider user id needed to key the identity record.
	#[error("Profile for provider `{provider}` lacks a usable user id.")]
	IncompleteIdentity {
		/// Provider whose profile was incomplete.
		provider: String,
	},
}
impl Error {
	/// HTTP status code a callback endpoint should answer with for this failure.
	///
	/// Client-supplied code problems map to 4xx, provider-side failures to 502/504, and local
	/// faults to 500.
	pub fn status_code(&self) -> u16 {
		match self {
			Error::MissingCode => 400,
			Error::EmptyExchange => 401,
			Error::Provider(_) | Error::IncompleteIdentity { .. } => 502,
			Error::Transport(TransportError::Timeout { .. }) => 504,
			Error::Transport(_) => 502,
			Error::Config(_) | Error::Storage(_) | Error::MissingToken { .. } => 500,
		}
	}

	/// Stable machine-readable label for the failure.
	pub fn code(&self) -> &'static str {
		match self {
			Error::Storage(_) => "persistence_error",
			Error::Config(_) => "configuration_error",
			Error::Provider(_) => "provider_error",
			Error::Transport(_) => "transport_error",
			Error::MissingCode => "missing_code",
			Error::EmptyExchange => "empty_exchange",
			Error::MissingToken { .. } => "missing_token",
			Error::IncompleteIdentity { .. } => "incomplete_identity",
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider name failed validation.
	#[error(transparent)]
	InvalidProviderName(#[from] crate::auth::IdentifierError),
	/// Provider descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Required configuration value is missing or empty.
	#[error("Configuration value `{key}` is required.")]
	MissingValue {
		/// Key that was missing.
		key: ConfigKey,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Callback path cannot be mounted on a router.
	#[error("Callback path `{path}` must start with `/`.")]
	InvalidCallbackPath {
		/// Offending path.
		path: String,
	},
	/// Endpoint URL assembled from a base URL is invalid.
	#[error("Endpoint URL `{url}` is invalid.")]
	InvalidEndpoint {
		/// URL string that failed to parse.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Provider-side failures surfaced while talking to token or profile endpoints.
#[derive(Debug, ThisError)]
pub enum ProviderError {
	/// Endpoint answered with a non-2xx status.
	#[error("Provider {endpoint} endpoint responded with HTTP {status}.")]
	Status {
		/// Endpoint that failed.
		endpoint: EndpointKind,
		/// HTTP status code returned.
		status: u16,
	},
	/// Endpoint answered with a body that is not valid JSON.
	#[error("Provider {endpoint} endpoint returned malformed JSON.")]
	MalformedJson {
		/// Endpoint that failed.
		endpoint: EndpointKind,
		/// Structured parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// Token lifetime cannot be represented as an expiry instant.
	#[error("Token lifetime of {seconds} seconds is out of range.")]
	ExpiresOutOfRange {
		/// Lifetime reported by the provider.
		seconds: i64,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider {endpoint} endpoint.")]
	Network {
		/// Endpoint being called.
		endpoint: EndpointKind,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request did not complete in time.
	#[error("Request to the provider {endpoint} endpoint timed out.")]
	Timeout {
		/// Endpoint being called.
		endpoint: EndpointKind,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
	/// Transport reported a failure it could not classify.
	#[error("HTTP client error occurred while calling the provider {endpoint} endpoint: {message}.")]
	Other {
		/// Endpoint being called.
		endpoint: EndpointKind,
		/// Transport-supplied description.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: EndpointKind,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}
