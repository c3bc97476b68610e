// self
use crate::{
	_prelude::*,
	auth::ProviderName,
	cache::TOKEN_FIELD,
	config::{ConfigKey, ProviderConfig},
	provider::{DEFAULT_TOKEN_FIELDS, ProfileFields, ProviderDescriptor, ProviderEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization endpoint is required to build redirect URLs.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required to exchange codes.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Profile endpoint is required to identify the user.
	#[error("Missing profile endpoint.")]
	MissingProfileEndpoint,
	/// Profile field names are required to read identities.
	#[error("Missing profile field names.")]
	MissingProfileFields,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// The client secret must never reach the browser.
	#[error("The client secret cannot be a public authorization parameter.")]
	SecretInPublicParams,
	/// Request parameters must have a default so configuration resolution can find them.
	#[error("Parameter `{key}` has no default value.")]
	UndeclaredParam {
		/// Parameter without a default.
		key: ConfigKey,
	},
	/// The token field list must keep the access token.
	#[error("Token fields must include `access_token`.")]
	MissingTokenField,
	/// Profile field names cannot be empty.
	#[error("Profile field names must be non-empty.")]
	EmptyProfileField,
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Name for the descriptor being constructed.
	pub name: ProviderName,
	/// Authorization endpoint.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint.
	pub token_endpoint: Option<Url>,
	/// Profile endpoint.
	pub profile_endpoint: Option<Url>,
	/// Configuration lookup prefix; derived from the name when unset.
	pub config_prefix: Option<String>,
	/// Ordered default configuration.
	pub defaults: ProviderConfig,
	/// Keys appended to the authorization URL.
	pub public_params: Vec<ConfigKey>,
	/// Keys sent in the token exchange form.
	pub token_params: Vec<ConfigKey>,
	/// Token response fields to keep.
	pub token_fields: Vec<String>,
	/// Profile response field names.
	pub profile_fields: Option<ProfileFields>,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided name.
	pub fn new(name: ProviderName) -> Self {
		Self {
			name,
			authorization_endpoint: None,
			token_endpoint: None,
			profile_endpoint: None,
			config_prefix: None,
			defaults: ProviderConfig::default(),
			public_params: Vec::new(),
			token_params: Vec::new(),
			token_fields: DEFAULT_TOKEN_FIELDS.iter().map(|f| (*f).to_owned()).collect(),
			profile_fields: None,
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the profile endpoint.
	pub fn profile_endpoint(mut self, url: Url) -> Self {
		self.profile_endpoint = Some(url);

		self
	}

	/// Overrides the configuration lookup prefix.
	pub fn config_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.config_prefix = Some(prefix.into());

		self
	}

	/// Replaces the default configuration.
	pub fn defaults(mut self, defaults: ProviderConfig) -> Self {
		self.defaults = defaults;

		self
	}

	/// Sets the keys appended to the authorization URL.
	pub fn public_params<I>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = ConfigKey>,
	{
		self.public_params = keys.into_iter().collect();

		self
	}

	/// Sets the keys sent in the token exchange form.
	pub fn token_params<I>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = ConfigKey>,
	{
		self.token_params = keys.into_iter().collect();

		self
	}

	/// Adds a provider-specific token response field to keep.
	pub fn token_field(mut self, field: impl Into<String>) -> Self {
		let field = field.into();

		if !self.token_fields.contains(&field) {
			self.token_fields.push(field);
		}

		self
	}

	/// Sets the profile response field names.
	pub fn profile_fields(mut self, fields: ProfileFields) -> Self {
		self.profile_fields = Some(fields);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let profile =
			self.profile_endpoint.ok_or(ProviderDescriptorError::MissingProfileEndpoint)?;
		let profile_fields =
			self.profile_fields.ok_or(ProviderDescriptorError::MissingProfileFields)?;
		let config_prefix = self.config_prefix.unwrap_or_else(|| self.name.env_prefix());
		let descriptor = ProviderDescriptor {
			name: self.name,
			endpoints: ProviderEndpoints { authorization, token, profile },
			config_prefix,
			defaults: self.defaults,
			public_params: self.public_params,
			token_params: self.token_params,
			token_fields: self.token_fields,
			profile_fields,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("profile", &self.endpoints.profile)?;

		if self.public_params.contains(&ConfigKey::ClientSecret) {
			return Err(ProviderDescriptorError::SecretInPublicParams);
		}
		if let Some(key) = self
			.public_params
			.iter()
			.chain(&self.token_params)
			.find(|key| self.defaults.get(**key).is_none())
		{
			return Err(ProviderDescriptorError::UndeclaredParam { key: *key });
		}
		if !self.token_fields.iter().any(|f| f == TOKEN_FIELD) {
			return Err(ProviderDescriptorError::MissingTokenField);
		}
		if self.profile_fields.wanted().iter().any(|f| f.is_empty()) {
			return Err(ProviderDescriptorError::EmptyProfileField);
		}

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	if url.scheme() != "https" {
		Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}
