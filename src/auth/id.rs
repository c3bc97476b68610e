//! Strongly typed provider identifiers.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const PROVIDER_NAME_MAX_LEN: usize = 64;
const ENV_PREFIX_ROOT: &str = "LINKS_";

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("Provider name cannot be empty.")]
	Empty,
	/// The identifier contains characters outside `[a-z0-9_-]`.
	#[error("Provider name contains the invalid character {found:?}.")]
	InvalidCharacter {
		/// First offending character.
		found: char,
	},
	/// The identifier exceeded the allowed character count.
	#[error("Provider name exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Discriminator naming a third-party identity provider (`github`, ...).
///
/// Names are lower-case so they double as cache namespaces, record discriminators, and
/// configuration prefixes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderName(String);
impl ProviderName {
	/// Creates a new provider name after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}

	/// Returns the provider name as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Default configuration prefix for this provider (`github` → `LINKS_GITHUB_`).
	pub fn env_prefix(&self) -> String {
		format!("{ENV_PREFIX_ROOT}{}_", self.0.replace('-', "_").to_ascii_uppercase())
	}
}
impl Deref for ProviderName {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for ProviderName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for ProviderName {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<ProviderName> for String {
	fn from(value: ProviderName) -> Self {
		value.0
	}
}
impl TryFrom<String> for ProviderName {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl Debug for ProviderName {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Provider({})", self.0)
	}
}
impl Display for ProviderName {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for ProviderName {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

fn validate_view(view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty);
	}
	if let Some(found) =
		view.chars().find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_'))
	{
		return Err(IdentifierError::InvalidCharacter { found });
	}
	if view.len() > PROVIDER_NAME_MAX_LEN {
		return Err(IdentifierError::TooLong { max: PROVIDER_NAME_MAX_LEN });
	}

	Ok(())
}
