//! GitHub login provider.

// self
use crate::{
	_prelude::*,
	auth::ProviderName,
	cache::RequestContext,
	config::{ConfigKey, ConfigSource, ProviderConfig},
	error::ConfigError,
	flows::CallbackRequest,
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
	parse::FieldMap,
	provider::{ClientCore, ClientFuture, ProfileFields, ProviderClient, ProviderDescriptor},
	store::{IdentityRecord, IdentityStore},
};
#[cfg(feature = "reqwest")]
use crate::{config::EnvSource, http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Provider name used for cache namespacing and stored identities.
pub const NAME: &str = "github";
/// Base of GitHub's browser-facing OAuth endpoints.
pub const OAUTH_BASE: &str = "https://github.com/login/oauth";
/// Base of GitHub's REST API.
pub const API_BASE: &str = "https://api.github.com";

/// Descriptor for github.com.
pub fn descriptor() -> Result<ProviderDescriptor> {
	let oauth = parse_base(OAUTH_BASE)?;
	let api = parse_base(API_BASE)?;

	descriptor_at(&oauth, &api)
}

/// Descriptor whose OAuth endpoints live under `oauth_base` and profile endpoint under
/// `api_base`; used for GitHub Enterprise hosts and mock servers.
pub fn descriptor_at(oauth_base: &Url, api_base: &Url) -> Result<ProviderDescriptor> {
	let name = ProviderName::new(NAME).map_err(ConfigError::from)?;
	let descriptor = ProviderDescriptor::builder(name)
		.authorization_endpoint(join(oauth_base, "authorize")?)
		.token_endpoint(join(oauth_base, "access_token")?)
		.profile_endpoint(join(api_base, "user")?)
		.defaults(ProviderConfig::new([
			(ConfigKey::ClientId, ""),
			(ConfigKey::ResponseType, "code"),
			(ConfigKey::RedirectUri, ""),
			(ConfigKey::Scope, "user:email"),
			(ConfigKey::ClientSecret, ""),
		]))
		.public_params([ConfigKey::ClientId])
		.token_params([ConfigKey::ClientId, ConfigKey::ClientSecret])
		.profile_fields(ProfileFields::new("id", "login", "avatar_url"))
		.build()
		.map_err(ConfigError::from)?;

	Ok(descriptor)
}

/// GitHub client over any [`ProviderHttpClient`].
pub struct GitHub<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	core: ClientCore<C, M>,
}
impl<C, M> GitHub<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client from a descriptor and an already-resolved configuration.
	pub fn with_config(
		descriptor: ProviderDescriptor,
		config: ProviderConfig,
		store: Arc<dyn IdentityStore>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self { core: ClientCore::new(descriptor, config, store, http_client, mapper) }
	}

	/// Creates a github.com client whose configuration is resolved from `source`.
	pub fn with_http_client(
		store: Arc<dyn IdentityStore>,
		source: &dyn ConfigSource,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		Ok(Self { core: ClientCore::resolve(descriptor()?, source, store, http_client, mapper) })
	}

	/// Shared client core.
	pub fn core(&self) -> &ClientCore<C, M> {
		&self.core
	}

	/// Late overlay of a single configuration value.
	pub fn with(mut self, key: ConfigKey, value: impl Into<String>) -> Self {
		self.core.overlay(key, value);

		self
	}
}
#[cfg(feature = "reqwest")]
impl GitHub<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a github.com client on the default reqwest transport.
	pub fn new(store: Arc<dyn IdentityStore>, source: &dyn ConfigSource) -> Result<Self> {
		let http_client = ReqwestHttpClient::new()?;

		Self::with_http_client(store, source, http_client, ReqwestTransportErrorMapper)
	}

	/// Creates a github.com client configured from `LINKS_GITHUB_*` environment variables.
	pub fn from_env(store: Arc<dyn IdentityStore>) -> Result<Self> {
		Self::new(store, &EnvSource)
	}
}
impl<C, M> ProviderClient for GitHub<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn descriptor(&self) -> &ProviderDescriptor {
		self.core.descriptor()
	}

	fn config(&self) -> &ProviderConfig {
		self.core.config()
	}

	fn redirect_url(&self) -> Result<Url> {
		self.core.authorize_url()
	}

	fn exchange_code_for_token<'a>(
		&'a self,
		ctx: &'a RequestContext,
		request: &'a CallbackRequest,
	) -> ClientFuture<'a, FieldMap> {
		Box::pin(self.core.exchange(ctx, request))
	}

	fn fetch_profile<'a>(&'a self, ctx: &'a RequestContext) -> ClientFuture<'a, Value> {
		Box::pin(self.core.fetch_profile(ctx))
	}

	fn upsert_identity<'a>(&'a self, ctx: &'a RequestContext) -> ClientFuture<'a, IdentityRecord> {
		Box::pin(self.core.upsert(ctx))
	}
}
impl<C, M> Debug for GitHub<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("GitHub").field(&self.core).finish()
	}
}

fn parse_base(base: &str) -> Result<Url> {
	Url::parse(base)
		.map_err(|source| ConfigError::InvalidEndpoint { url: base.to_owned(), source }.into())
}

fn join(base: &Url, segment: &str) -> Result<Url> {
	let joined = format!("{}/{segment}", base.as_str().trim_end_matches('/'));

	Url::parse(&joined).map_err(|source| ConfigError::InvalidEndpoint { url: joined, source }.into())
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::store::MemoryStore;

	fn client(pairs: &[(&str, &str)]) -> GitHub<ReqwestHttpClient, ReqwestTransportErrorMapper> {
		let source: HashMap<String, String> =
			pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();

		GitHub::new(Arc::new(MemoryStore::default()), &source)
			.expect("GitHub client should build from a map source.")
	}

	#[test]
	fn descriptor_targets_github_endpoints() {
		let descriptor = descriptor().expect("GitHub descriptor should build.");

		assert_eq!(
			descriptor.endpoints.authorization.as_str(),
			"https://github.com/login/oauth/authorize"
		);
		assert_eq!(
			descriptor.endpoints.token.as_str(),
			"https://github.com/login/oauth/access_token"
		);
		assert_eq!(descriptor.endpoints.profile.as_str(), "https://api.github.com/user");
		assert_eq!(descriptor.config_prefix, "LINKS_GITHUB_");
		assert_eq!(descriptor.profile_fields, ProfileFields::new("id", "login", "avatar_url"));
	}

	#[test]
	fn redirect_url_carries_only_public_params() {
		let client = client(&[
			("LINKS_GITHUB_CLIENT_ID", "cid"),
			("LINKS_GITHUB_CLIENT_SECRET", "secret"),
			("LINKS_GITHUB_SCOPE", "user:email"),
		]);
		let url = client.redirect_url().expect("Redirect URL should build.");

		assert_eq!(url.as_str(), "https://github.com/login/oauth/authorize?client_id=cid");
		assert!(!url.as_str().contains("secret"));
	}

	#[test]
	fn redirect_url_requires_client_id() {
		let err = client(&[]).redirect_url().expect_err("Empty client id must be rejected.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::MissingValue { key: ConfigKey::ClientId })
		));
	}

	#[test]
	fn callback_path_follows_configured_redirect_uri() {
		let client = client(&[("LINKS_GITHUB_REDIRECT_URI", "https://app.example.com/oauth/github")]);

		assert_eq!(client.callback_path().expect("Callback path should resolve."), "/oauth/github");
		assert_eq!(
			client
				.with(ConfigKey::RedirectUri, "/custom/path")
				.callback_path()
				.expect("Callback path should resolve."),
			"/custom/path"
		);
	}
}
