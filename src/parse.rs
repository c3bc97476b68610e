//! Whitelisted field extraction for provider JSON responses.
//!
//! Provider endpoints answer with large, loosely specified JSON objects. [`parse_fields`] keeps
//! only the fields a flow cares about and uses a single required key to tell a success payload
//! apart from an error payload, without raising.

// self
use crate::_prelude::*;

/// Field name → JSON value mapping produced by [`parse_fields`] and held in the identity cache.
pub type FieldMap = serde_json::Map<String, Value>;

/// Extracts `wanted` fields from `source`, gated on the presence of `required`.
///
/// Returns an empty map when `source` is not an object or lacks `required`. Otherwise returns
/// exactly the wanted keys present in `source`; absent keys are omitted rather than defaulted.
pub fn parse_fields(source: &Value, required: &str, wanted: &[&str]) -> FieldMap {
	let Some(object) = source.as_object() else {
		return FieldMap::new();
	};

	if !object.contains_key(required) {
		return FieldMap::new();
	}

	wanted
		.iter()
		.filter_map(|key| object.get(*key).map(|value| ((*key).to_owned(), value.clone())))
		.collect()
}
