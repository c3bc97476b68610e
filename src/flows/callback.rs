//! Callback route adapter.
//!
//! A [`CallbackRoute`] binds one [`ProviderClient`] to the path of its configured redirect URI.
//! Each invocation gets a fresh [`RequestContext`] and walks the flow
//! `AwaitingCode → TokenExchanged → ProfileFetched → Persisted`; no step is retried and an empty
//! token exchange stops the flow before the profile fetch.

// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	cache::RequestContext,
	error::ConfigError,
	obs::{self, FlowStage},
	provider::ProviderClient,
	store::IdentityRecord,
};

/// Query parameters of an inbound provider redirect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackRequest {
	params: Vec<(String, String)>,
}
impl CallbackRequest {
	/// Parses a raw query string (without the leading `?`).
	pub fn from_query(query: &str) -> Self {
		Self::from_pairs(form_urlencoded::parse(query.as_bytes()).into_owned())
	}

	/// Reads the query of a full callback URL.
	pub fn from_url(url: &Url) -> Self {
		Self::from_pairs(url.query_pairs().into_owned())
	}

	/// Builds a request from already-decoded key/value pairs.
	pub fn from_pairs<I, K, V>(pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self { params: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
	}

	/// First value of `key`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	/// Authorization code; `None` when absent or empty.
	pub fn code(&self) -> Option<&str> {
		self.get("code").filter(|code| !code.is_empty())
	}

	/// Opaque `state` value echoed by the provider. Not validated here.
	pub fn state(&self) -> Option<&str> {
		self.get("state")
	}
}

/// Furthest step a callback invocation reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
	/// Waiting for the code exchange to yield a token.
	AwaitingCode,
	/// Token cached.
	TokenExchanged,
	/// Profile fields cached.
	ProfileFetched,
	/// Identity record written.
	Persisted,
}
impl FlowState {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowState::AwaitingCode => "awaiting_code",
			FlowState::TokenExchanged => "token_exchanged",
			FlowState::ProfileFetched => "profile_fetched",
			FlowState::Persisted => "persisted",
		}
	}
}
impl Display for FlowState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Result of a completed callback.
#[derive(Clone, Debug)]
pub struct CallbackOutcome {
	/// Created or updated identity record.
	pub record: IdentityRecord,
	/// Raw profile payload returned by the provider.
	pub profile: Value,
	/// Final state; always [`FlowState::Persisted`].
	pub state: FlowState,
}

/// One provider client bound to its callback path.
#[derive(Clone)]
pub struct CallbackRoute {
	client: Arc<dyn ProviderClient>,
	path: String,
}
impl CallbackRoute {
	/// Binds `client` to the path of its configured redirect URI.
	pub fn new(client: Arc<dyn ProviderClient>) -> Result<Self> {
		let path = client.callback_path()?;

		Self::at(client, path)
	}

	/// Binds `client` to an explicit `path`.
	pub fn at(client: Arc<dyn ProviderClient>, path: impl Into<String>) -> Result<Self> {
		let path = path.into();

		if !path.starts_with('/') {
			return Err(ConfigError::InvalidCallbackPath { path }.into());
		}

		Ok(Self { client, path })
	}

	/// Bound provider client.
	pub fn client(&self) -> &Arc<dyn ProviderClient> {
		&self.client
	}

	/// Callback path as configured, including any query.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Callback path without its query; what a router mounts.
	pub fn route_path(&self) -> &str {
		self.path.split_once('?').map_or(self.path.as_str(), |(path, _)| path)
	}

	/// Runs the whole login flow for one inbound redirect.
	pub async fn handle(&self, request: &CallbackRequest) -> Result<CallbackOutcome> {
		let provider = self.client.name();

		obs::observe(provider, FlowStage::Callback, async move {
			let ctx = RequestContext::new();
			let mut state = FlowState::AwaitingCode;
			let result = self.drive(&ctx, request, &mut state).await;

			if result.is_err() {
				obs::record_flow_halt(provider, state.as_str());
			}

			result
		})
		.await
	}

	async fn drive(
		&self,
		ctx: &RequestContext,
		request: &CallbackRequest,
		state: &mut FlowState,
	) -> Result<CallbackOutcome> {
		let token = self.client.exchange_code_for_token(ctx, request).await?;

		if token.is_empty() {
			return Err(Error::EmptyExchange);
		}

		*state = FlowState::TokenExchanged;

		let profile = self.client.fetch_profile(ctx).await?;

		*state = FlowState::ProfileFetched;

		let record = self.client.upsert_identity(ctx).await?;

		*state = FlowState::Persisted;

		Ok(CallbackOutcome { record, profile, state: *state })
	}
}
impl Debug for CallbackRoute {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallbackRoute")
			.field("provider", self.client.name())
			.field("path", &self.path)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn code_is_read_from_query_and_url() {
		let from_query = CallbackRequest::from_query("code=abc%20def&state=xyz");
		let url = Url::parse("https://app.example.com/oauth/github?state=s&code=123")
			.expect("Callback URL fixture should parse.");
		let from_url = CallbackRequest::from_url(&url);

		assert_eq!(from_query.code(), Some("abc def"));
		assert_eq!(from_query.state(), Some("xyz"));
		assert_eq!(from_url.code(), Some("123"));
	}

	#[test]
	fn empty_or_missing_code_reads_as_none() {
		assert_eq!(CallbackRequest::from_query("code=").code(), None);
		assert_eq!(CallbackRequest::from_query("state=only").code(), None);
		assert_eq!(CallbackRequest::default().code(), None);
	}

	#[test]
	fn flow_state_labels_are_stable() {
		assert_eq!(FlowState::AwaitingCode.to_string(), "awaiting_code");
		assert_eq!(
			serde_json::to_value(FlowState::Persisted).expect("State should serialize."),
			"persisted"
		);
	}
}
