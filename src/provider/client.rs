//! Provider client contract and the shared core concrete providers compose.

// self
use crate::{
	_prelude::*,
	auth::{ProviderName, TokenSecret},
	cache::{CachedIdentity, RequestContext, TOKEN_FIELD},
	config::{ConfigKey, ConfigSource, ProviderConfig},
	flows::{
		CallbackRequest,
		upsert::{self, UpsertGuards, UpsertRequest},
	},
	http::ProviderHttpClient,
	oauth::{self, EndpointKind, TransportErrorMapper},
	obs::{self, FlowOutcome, FlowStage},
	parse::{self, FieldMap},
	provider::ProviderDescriptor,
	store::{IdentityKey, IdentityRecord, IdentityStore},
};

/// Boxed future returned by [`ProviderClient`] operations.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Capability set of a login provider.
///
/// Every call takes the [`RequestContext`] of the inbound request; token and profile fields are
/// cached there under [`ProviderClient::name`] and never on the client itself, so one client can
/// serve concurrent requests.
pub trait ProviderClient
where
	Self: Send + Sync,
{
	/// Validated provider metadata.
	fn descriptor(&self) -> &ProviderDescriptor;

	/// Resolved configuration.
	fn config(&self) -> &ProviderConfig;

	/// Browser-facing authorization URL carrying the provider's public parameters.
	fn redirect_url(&self) -> Result<Url>;

	/// Exchanges the callback's authorization code for a token and caches the parsed fields.
	///
	/// Returns an empty map, without touching the cache, when the provider answered without an
	/// access token.
	fn exchange_code_for_token<'a>(
		&'a self,
		ctx: &'a RequestContext,
		request: &'a CallbackRequest,
	) -> ClientFuture<'a, FieldMap>;

	/// Fetches the user profile with the cached token, caches its identity fields, and returns
	/// the raw payload.
	fn fetch_profile<'a>(&'a self, ctx: &'a RequestContext) -> ClientFuture<'a, Value>;

	/// Persists the cached identity through the client's store.
	fn upsert_identity<'a>(&'a self, ctx: &'a RequestContext) -> ClientFuture<'a, IdentityRecord>;

	/// Provider name; namespaces the cache.
	fn name(&self) -> &ProviderName {
		&self.descriptor().name
	}

	/// Seeds `token` into the cache and fetches the profile with it.
	fn fetch_profile_with_token<'a>(
		&'a self,
		ctx: &'a RequestContext,
		token: &'a str,
	) -> ClientFuture<'a, Value> {
		ctx.inject_token(self.name(), token);

		self.fetch_profile(ctx)
	}

	/// Typed view over this provider's cached fields.
	fn identity<'a>(&'a self, ctx: &'a RequestContext) -> CachedIdentity<'a> {
		CachedIdentity::new(ctx.cache(), self.name(), &self.descriptor().profile_fields)
	}

	/// Cached access token.
	fn token(&self, ctx: &RequestContext) -> Option<String> {
		self.identity(ctx).token()
	}

	/// Cached token lifetime in seconds; `0` when absent.
	fn expires(&self, ctx: &RequestContext) -> i64 {
		self.identity(ctx).expires()
	}

	/// Cached provider user id.
	fn uid(&self, ctx: &RequestContext) -> Option<String> {
		self.identity(ctx).uid()
	}

	/// Cached provider handle.
	fn username(&self, ctx: &RequestContext) -> Option<String> {
		self.identity(ctx).username()
	}

	/// Cached avatar URL.
	fn avatar(&self, ctx: &RequestContext) -> Option<String> {
		self.identity(ctx).avatar()
	}

	/// Route path (plus query) of the configured redirect URI.
	fn callback_path(&self) -> Result<String> {
		self.config().callback_path().map_err(Into::into)
	}
}

/// Shared configuration, transport, and persistence wiring for concrete providers.
pub struct ClientCore<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Identity store receiving upserts.
	pub store: Arc<dyn IdentityStore>,
	descriptor: ProviderDescriptor,
	config: ProviderConfig,
	upsert_guards: UpsertGuards,
}
impl<C, M> ClientCore<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a core with an already-resolved configuration.
	pub fn new(
		descriptor: ProviderDescriptor,
		config: ProviderConfig,
		store: Arc<dyn IdentityStore>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			descriptor,
			config,
			upsert_guards: UpsertGuards::default(),
		}
	}

	/// Creates a core whose configuration is the descriptor defaults overlaid with `source`.
	pub fn resolve(
		descriptor: ProviderDescriptor,
		source: &dyn ConfigSource,
		store: Arc<dyn IdentityStore>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let config =
			ProviderConfig::resolve(&descriptor.defaults, &descriptor.config_prefix, source);

		Self::new(descriptor, config, store, http_client, mapper)
	}

	/// Validated provider metadata.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.descriptor
	}

	/// Resolved configuration.
	pub fn config(&self) -> &ProviderConfig {
		&self.config
	}

	/// Late overlay of a single configuration value.
	pub fn overlay(&mut self, key: ConfigKey, value: impl Into<String>) {
		self.config.overlay(key, value);
	}

	/// Builds the authorization URL from the public parameters, in configuration order.
	///
	/// The client secret is skipped even if a descriptor lists it.
	pub fn authorize_url(&self) -> Result<Url> {
		let result = self.build_authorize_url();

		obs::record_flow_outcome(
			FlowStage::Redirect,
			if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
		);

		result
	}

	/// Posts the token parameters plus `code` to the token endpoint and caches the result.
	pub async fn exchange(
		&self,
		ctx: &RequestContext,
		request: &CallbackRequest,
	) -> Result<FieldMap> {
		let name = &self.descriptor.name;

		obs::observe(name, FlowStage::TokenExchange, async move {
			let code = request.code().ok_or(Error::MissingCode)?;

			self.config.require(ConfigKey::ClientId)?;

			let mut form: Vec<(&str, &str)> = self
				.descriptor
				.token_params
				.iter()
				.filter_map(|key| self.config.get(*key).map(|value| (key.as_str(), value)))
				.collect();

			form.push(("code", code));

			let http_request = oauth::token_request(&self.descriptor.endpoints.token, &form)?;
			let body = oauth::send_json(
				self.http_client.as_ref(),
				self.transport_mapper.as_ref(),
				EndpointKind::Token,
				http_request,
			)
			.await?;
			let fields = parse::parse_fields(&body, TOKEN_FIELD, &self.descriptor.token_fields());

			if !fields.is_empty() {
				ctx.cache().merge(name, fields.clone());
			}

			Ok(fields)
		})
		.await
	}

	/// Fetches the profile endpoint with the cached token and caches the identity fields.
	pub async fn fetch_profile(&self, ctx: &RequestContext) -> Result<Value> {
		let name = &self.descriptor.name;

		obs::observe(name, FlowStage::ProfileFetch, async move {
			let token = self
				.identity(ctx)
				.token()
				.filter(|token| !token.is_empty())
				.ok_or_else(|| Error::MissingToken { provider: name.to_string() })?;
			let http_request = oauth::profile_request(&self.descriptor.endpoints.profile, &token)?;
			let body = oauth::send_json(
				self.http_client.as_ref(),
				self.transport_mapper.as_ref(),
				EndpointKind::Profile,
				http_request,
			)
			.await?;
			let fields = &self.descriptor.profile_fields;

			ctx.cache().merge(name, parse::parse_fields(&body, &fields.id, &fields.wanted()));

			Ok(body)
		})
		.await
	}

	/// Upserts the identity record from the cached token and profile fields.
	pub async fn upsert(&self, ctx: &RequestContext) -> Result<IdentityRecord> {
		let name = &self.descriptor.name;

		obs::observe(name, FlowStage::Upsert, async move {
			let identity = self.identity(ctx);
			let uid = identity
				.uid()
				.filter(|uid| !uid.is_empty())
				.ok_or_else(|| Error::IncompleteIdentity { provider: name.to_string() })?;
			let token = identity
				.token()
				.filter(|token| !token.is_empty())
				.ok_or_else(|| Error::MissingToken { provider: name.to_string() })?;
			let request = UpsertRequest {
				key: IdentityKey::new(uid, name.clone()),
				display_name: identity.username(),
				access_token: TokenSecret::new(token),
				avatar: identity.avatar(),
				expires_in: identity.expires(),
			};

			upsert::upsert_identity(self.store.as_ref(), &self.upsert_guards, request).await
		})
		.await
	}

	/// Typed view over this provider's cached fields.
	pub fn identity<'a>(&'a self, ctx: &'a RequestContext) -> CachedIdentity<'a> {
		CachedIdentity::new(ctx.cache(), &self.descriptor.name, &self.descriptor.profile_fields)
	}

	fn build_authorize_url(&self) -> Result<Url> {
		self.config.require(ConfigKey::ClientId)?;

		let mut url = self.descriptor.endpoints.authorization.clone();
		let params: Vec<_> = self
			.config
			.iter()
			.filter(|(key, _)| {
				*key != ConfigKey::ClientSecret && self.descriptor.public_params.contains(key)
			})
			.collect();

		if !params.is_empty() {
			url.query_pairs_mut().extend_pairs(params.iter().map(|(k, v)| (k.as_str(), *v)));
		}

		Ok(url)
	}
}
impl<C, M> Debug for ClientCore<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCore")
			.field("descriptor", &self.descriptor)
			.field("config", &self.config)
			.finish()
	}
}
