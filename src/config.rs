//! Provider configuration resolution.
//!
//! Each provider ships an ordered default [`ProviderConfig`]. At client construction the defaults
//! are overlaid with values looked up in a [`ConfigSource`] under provider-prefixed, upper-case
//! keys (`LINKS_GITHUB_CLIENT_ID`, ...). Order is preserved so authorize URLs are deterministic.

// std
use std::env;
// self
use crate::{_prelude::*, error::ConfigError};

/// Recognized per-provider configuration options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKey {
	/// OAuth client identifier.
	ClientId,
	/// Authorization response type (`code`).
	ResponseType,
	/// Redirect URI registered with the provider.
	RedirectUri,
	/// Requested scope string.
	Scope,
	/// OAuth client secret; never placed in browser-facing URLs.
	ClientSecret,
}
impl ConfigKey {
	/// Every recognized key.
	pub const ALL: [ConfigKey; 5] = [
		ConfigKey::ClientId,
		ConfigKey::ResponseType,
		ConfigKey::RedirectUri,
		ConfigKey::Scope,
		ConfigKey::ClientSecret,
	];

	/// Returns the wire/query parameter name.
	pub const fn as_str(self) -> &'static str {
		match self {
			ConfigKey::ClientId => "client_id",
			ConfigKey::ResponseType => "response_type",
			ConfigKey::RedirectUri => "redirect_uri",
			ConfigKey::Scope => "scope",
			ConfigKey::ClientSecret => "client_secret",
		}
	}

	/// External lookup key under `prefix` (`LINKS_GITHUB_` + `client_id` → `LINKS_GITHUB_CLIENT_ID`).
	pub fn source_key(self, prefix: &str) -> String {
		format!("{prefix}{}", self.as_str()).to_ascii_uppercase()
	}
}
impl Display for ConfigKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// External source of configuration values.
pub trait ConfigSource {
	/// Looks up a fully-qualified key.
	fn get(&self, key: &str) -> Option<String>;
}

/// Reads configuration from the process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvSource;
impl ConfigSource for EnvSource {
	fn get(&self, key: &str) -> Option<String> {
		env::var(key).ok()
	}
}
impl ConfigSource for HashMap<String, String> {
	fn get(&self, key: &str) -> Option<String> {
		HashMap::get(self, key).cloned()
	}
}
impl ConfigSource for BTreeMap<String, String> {
	fn get(&self, key: &str) -> Option<String> {
		BTreeMap::get(self, key).cloned()
	}
}

/// Ordered provider configuration.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
	entries: Vec<(ConfigKey, String)>,
}
impl ProviderConfig {
	/// Builds a configuration from `entries`; a repeated key replaces the earlier value in place.
	pub fn new<I, V>(entries: I) -> Self
	where
		I: IntoIterator<Item = (ConfigKey, V)>,
		V: Into<String>,
	{
		let mut config = Self::default();

		for (key, value) in entries {
			config.overlay(key, value);
		}

		config
	}

	/// Overlays values found in `source` under `prefix` onto `defaults`.
	///
	/// Only keys present in `defaults` are looked up.
	pub fn resolve(defaults: &ProviderConfig, prefix: &str, source: &dyn ConfigSource) -> Self {
		let mut resolved = defaults.clone();

		for (key, value) in resolved.entries.iter_mut() {
			if let Some(found) = source.get(&key.source_key(prefix)) {
				*value = found;
			}
		}

		resolved
	}

	/// Sets `key` to `value`, keeping its original position or appending when new.
	pub fn overlay(&mut self, key: ConfigKey, value: impl Into<String>) {
		let value = value.into();

		match self.entries.iter_mut().find(|(k, _)| *k == key) {
			Some((_, slot)) => *slot = value,
			None => self.entries.push((key, value)),
		}
	}

	/// Builder-style [`overlay`](Self::overlay).
	pub fn with(mut self, key: ConfigKey, value: impl Into<String>) -> Self {
		self.overlay(key, value);

		self
	}

	/// Returns the value for `key`, if configured.
	pub fn get(&self, key: ConfigKey) -> Option<&str> {
		self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
	}

	/// Returns the non-empty value for `key` or [`ConfigError::MissingValue`].
	pub fn require(&self, key: ConfigKey) -> Result<&str, ConfigError> {
		self.get(key).filter(|v| !v.is_empty()).ok_or(ConfigError::MissingValue { key })
	}

	/// Iterates entries in configuration order.
	pub fn iter(&self) -> impl Iterator<Item = (ConfigKey, &str)> {
		self.entries.iter().map(|(k, v)| (*k, v.as_str()))
	}

	/// Route path (plus query, if any) of the configured redirect URI.
	///
	/// Values that do not start with `http` are taken as a path already and returned verbatim.
	pub fn callback_path(&self) -> Result<String, ConfigError> {
		let redirect = self.require(ConfigKey::RedirectUri)?;

		if !redirect.starts_with("http") {
			return Ok(redirect.to_owned());
		}

		let url = Url::parse(redirect).map_err(|source| ConfigError::InvalidRedirect { source })?;

		Ok(match url.query() {
			Some(query) => format!("{}?{query}", url.path()),
			None => url.path().to_owned(),
		})
	}
}
impl Debug for ProviderConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut map = f.debug_map();

		for (key, value) in &self.entries {
			if matches!(key, ConfigKey::ClientSecret) && !value.is_empty() {
				map.entry(key, &"<redacted>");
			} else {
				map.entry(key, value);
			}
		}

		map.finish()
	}
}
