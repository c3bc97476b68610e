//! Request-scoped identity cache.
//!
//! A [`RequestContext`] is created for each inbound callback and passed explicitly into every
//! provider call. It owns an [`IdentityCache`] that accumulates token and profile fields per
//! provider name; dropping the context at the end of the request discards everything, so no
//! state can leak between concurrent requests.

// self
use crate::{
	_prelude::*,
	auth::ProviderName,
	parse::FieldMap,
	provider::ProfileFields,
};

/// Cache field holding the access token.
pub const TOKEN_FIELD: &str = "access_token";
/// Cache field holding the token lifetime in seconds.
pub const EXPIRES_FIELD: &str = "expires_in";

/// Token/profile fields for the current request, namespaced by provider name.
#[derive(Default)]
pub struct IdentityCache(Mutex<HashMap<ProviderName, FieldMap>>);
impl IdentityCache {
	/// Returns a clone of `field` cached for `provider`, if any.
	pub fn get(&self, provider: &ProviderName, field: &str) -> Option<Value> {
		self.0.lock().get(provider).and_then(|fields| fields.get(field)).cloned()
	}

	/// Overlays `fields` onto whatever is cached for `provider`; later values win per key.
	pub fn merge(&self, provider: &ProviderName, fields: FieldMap) {
		let mut guard = self.0.lock();
		let entry = guard.entry(provider.clone()).or_default();

		for (key, value) in fields {
			entry.insert(key, value);
		}
	}

	/// Snapshot of every field cached for `provider`.
	pub fn fields(&self, provider: &ProviderName) -> FieldMap {
		self.0.lock().get(provider).cloned().unwrap_or_default()
	}

	/// Returns `true` when nothing is cached for `provider`.
	pub fn is_empty(&self, provider: &ProviderName) -> bool {
		self.0.lock().get(provider).is_none_or(|fields| fields.is_empty())
	}
}
impl Debug for IdentityCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let guard = self.0.lock();
		let mut map = f.debug_map();

		// Values may hold access tokens; only the field names are printed.
		for (provider, fields) in guard.iter() {
			map.entry(provider, &fields.keys().collect::<Vec<_>>());
		}

		map.finish()
	}
}

/// Per-request state threaded through every provider call.
#[derive(Debug, Default)]
pub struct RequestContext {
	cache: IdentityCache,
}
impl RequestContext {
	/// Creates an empty context for a new inbound request.
	pub fn new() -> Self {
		Self::default()
	}

	/// Identity cache owned by this request.
	pub fn cache(&self) -> &IdentityCache {
		&self.cache
	}

	/// Seeds an access token for `provider`, for programmatic profile fetches.
	pub fn inject_token(&self, provider: &ProviderName, token: impl Into<String>) {
		let mut fields = FieldMap::new();

		fields.insert(TOKEN_FIELD.into(), Value::String(token.into()));

		self.cache.merge(provider, fields);
	}
}

/// Typed read-only view over the cached fields of one provider.
///
/// Every accessor is a pure lookup; reading before any exchange returns the defaults
/// (`expires` → 0, everything else → `None`).
#[derive(Clone, Copy, Debug)]
pub struct CachedIdentity<'a> {
	cache: &'a IdentityCache,
	provider: &'a ProviderName,
	fields: &'a ProfileFields,
}
impl<'a> CachedIdentity<'a> {
	/// Creates a view of `provider`'s entries using its profile field names.
	pub fn new(cache: &'a IdentityCache, provider: &'a ProviderName, fields: &'a ProfileFields) -> Self {
		Self { cache, provider, fields }
	}

	/// Cached access token.
	pub fn token(&self) -> Option<String> {
		self.string(TOKEN_FIELD)
	}

	/// Cached token lifetime in seconds; `0` when the provider did not report one.
	///
	/// Whole-number floats (`3600.0`) count as seconds; fractional or unreadable lifetimes read as
	/// `0`.
	pub fn expires(&self) -> i64 {
		match self.cache.get(self.provider, EXPIRES_FIELD) {
			Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(whole_seconds)),
			Some(Value::String(s)) => {
				let s = s.trim();

				s.parse().ok().or_else(|| s.parse().ok().and_then(whole_seconds))
			},
			_ => None,
		}
		.unwrap_or_default()
	}

	/// Provider user id, rendered as a string whether the provider sent a number or a string.
	pub fn uid(&self) -> Option<String> {
		self.string(&self.fields.id)
	}

	/// Provider handle (e.g. GitHub `login`).
	pub fn username(&self) -> Option<String> {
		self.string(&self.fields.username)
	}

	/// Provider avatar URL.
	pub fn avatar(&self) -> Option<String> {
		self.string(&self.fields.avatar)
	}

	fn string(&self, field: &str) -> Option<String> {
		match self.cache.get(self.provider, field)? {
			Value::String(s) => Some(s),
			Value::Number(n) => Some(n.to_string()),
			Value::Bool(b) => Some(b.to_string()),
			_ => None,
		}
	}
}

fn whole_seconds(seconds: f64) -> Option<i64> {
	// `i64::MAX as f64` rounds up to 2^63, hence the strict upper bound.
	(seconds.is_finite()
		&& seconds.fract() == 0.0
		&& seconds >= i64::MIN as f64
		&& seconds < i64::MAX as f64)
		.then_some(seconds as i64)
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn github() -> ProviderName {
		ProviderName::new("github").expect("Provider fixture should be valid.")
	}

	fn fields(value: Value) -> FieldMap {
		value.as_object().cloned().expect("Fixture should be a JSON object.")
	}

	fn profile_fields() -> ProfileFields {
		ProfileFields::new("id", "login", "avatar_url")
	}

	#[test]
	fn merge_overlays_without_clearing() {
		let cache = IdentityCache::default();
		let provider = github();

		cache.merge(&provider, fields(json!({ "a": 1 })));
		cache.merge(&provider, fields(json!({ "b": 2 })));

		assert_eq!(Value::Object(cache.fields(&provider)), json!({ "a": 1, "b": 2 }));

		cache.merge(&provider, fields(json!({ "a": 3 })));

		assert_eq!(cache.get(&provider, "a"), Some(json!(3)));
		assert_eq!(cache.get(&provider, "b"), Some(json!(2)));
	}

	#[test]
	fn merge_is_idempotent() {
		let cache = IdentityCache::default();
		let provider = github();

		cache.merge(&provider, fields(json!({ "a": 1 })));
		cache.merge(&provider, fields(json!({ "a": 1 })));

		assert_eq!(Value::Object(cache.fields(&provider)), json!({ "a": 1 }));
	}

	#[test]
	fn providers_are_namespaced() {
		let cache = IdentityCache::default();
		let github = github();
		let gitlab = ProviderName::new("gitlab").expect("Provider fixture should be valid.");

		cache.merge(&github, fields(json!({ "access_token": "gh" })));

		assert!(cache.is_empty(&gitlab));
		assert_eq!(cache.get(&gitlab, "access_token"), None);
	}

	#[test]
	fn accessors_default_before_exchange() {
		let ctx = RequestContext::new();
		let provider = github();
		let profile = profile_fields();
		let view = CachedIdentity::new(ctx.cache(), &provider, &profile);

		assert_eq!(view.token(), None);
		assert_eq!(view.expires(), 0);
		assert_eq!(view.uid(), None);
		assert_eq!(view.username(), None);
		assert_eq!(view.avatar(), None);
	}

	#[test]
	fn accessors_read_token_and_profile_fields() {
		let ctx = RequestContext::new();
		let provider = github();
		let profile = profile_fields();

		ctx.cache().merge(&provider, fields(json!({ "access_token": "abc", "expires_in": 3600 })));
		ctx.cache().merge(
			&provider,
			fields(json!({ "id": 42, "login": "octocat", "avatar_url": "http://x/a.png" })),
		);

		let view = CachedIdentity::new(ctx.cache(), &provider, &profile);

		assert_eq!(view.token().as_deref(), Some("abc"));
		assert_eq!(view.expires(), 3600);
		assert_eq!(view.uid().as_deref(), Some("42"));
		assert_eq!(view.username().as_deref(), Some("octocat"));
		assert_eq!(view.avatar().as_deref(), Some("http://x/a.png"));
	}

	#[test]
	fn expires_accepts_whole_number_floats() {
		let provider = github();
		let profile = profile_fields();
		let lifetime = |value: Value| {
			let ctx = RequestContext::new();

			ctx.cache().merge(&provider, fields(json!({ "expires_in": value })));

			CachedIdentity::new(ctx.cache(), &provider, &profile).expires()
		};

		assert_eq!(lifetime(json!(3600.0)), 3600);
		assert_eq!(lifetime(json!("7200")), 7200);
		assert_eq!(lifetime(json!(" 28800.0 ")), 28800);
		assert_eq!(lifetime(json!(1.5)), 0);
		assert_eq!(lifetime(json!(1e300)), 0);
		assert_eq!(lifetime(json!("soon")), 0);
	}

	#[test]
	fn inject_token_preserves_other_fields() {
		let ctx = RequestContext::new();
		let provider = github();

		ctx.cache().merge(&provider, fields(json!({ "id": 1 })));
		ctx.inject_token(&provider, "injected");

		assert_eq!(ctx.cache().get(&provider, "access_token"), Some(json!("injected")));
		assert_eq!(ctx.cache().get(&provider, "id"), Some(json!(1)));
	}

	#[test]
	fn debug_output_hides_values() {
		let ctx = RequestContext::new();
		let provider = github();

		ctx.inject_token(&provider, "gho_secret");

		assert!(!format!("{ctx:?}").contains("gho_secret"));
	}
}
