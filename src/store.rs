//! Storage contracts and built-in store implementations for linked identity records.
//!
//! An [`IdentityRecord`] links a provider account to the local application. Records are unique
//! per [`IdentityKey`] (provider user id + provider name); stores enforce that by failing
//! [`IdentityStore::insert`] with [`StoreError::Conflict`] and stamp every timestamp themselves.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{ProviderName, TokenSecret},
};

/// Boxed future returned by [`IdentityStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by identity stores.
pub trait IdentityStore
where
	Self: Send + Sync,
{
	/// Fetches the record stored under `key`, if present.
	fn find<'a>(&'a self, key: &'a IdentityKey) -> StoreFuture<'a, Option<IdentityRecord>>;

	/// Creates a record from `draft`, failing with [`StoreError::Conflict`] when the key exists.
	fn insert(&self, draft: IdentityDraft) -> StoreFuture<'_, IdentityRecord>;

	/// Applies `changes` to the record under `key`; returns `None` when no record matched.
	fn update<'a>(
		&'a self,
		key: &'a IdentityKey,
		changes: IdentityChanges,
	) -> StoreFuture<'a, Option<IdentityRecord>>;

	/// Returns every stored record ordered by surrogate id.
	fn list(&self) -> StoreFuture<'_, Vec<IdentityRecord>>;
}

/// Error type produced by [`IdentityStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// A record already exists for the key being inserted.
	#[error("Identity record already exists for {key}.")]
	Conflict {
		/// Key that violated the uniqueness constraint.
		key: IdentityKey,
	},
	/// Serialization failures (e.g., serde) surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Unique key identifying a stored identity record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
	/// Opaque provider user id (GitHub's numeric `id`, rendered as a string).
	pub provider_uid: String,
	/// Provider discriminator.
	pub provider: ProviderName,
}
impl IdentityKey {
	/// Builds a key from its components.
	pub fn new(provider_uid: impl Into<String>, provider: ProviderName) -> Self {
		Self { provider_uid: provider_uid.into(), provider }
	}
}
impl Display for IdentityKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}:{}", self.provider, self.provider_uid)
	}
}

/// Persisted link between a provider account and the local application.
///
/// The provider user id is serialized under `username` and the provider handle under `realname`
/// so snapshots stay compatible with the historical column names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
	/// Surrogate id assigned by the store.
	pub id: u64,
	/// Local user this identity is attached to, if any.
	pub user: Option<u64>,
	/// Opaque provider user id; half of the uniqueness key.
	#[serde(rename = "username")]
	pub provider_uid: String,
	/// Provider handle at creation time (GitHub `login`); never rewritten by updates.
	#[serde(rename = "realname")]
	pub display_name: Option<String>,
	/// Provider discriminator; half of the uniqueness key.
	pub provider: ProviderName,
	/// Latest access token issued by the provider.
	pub access_token: TokenSecret,
	/// Latest avatar URL.
	pub avatar: Option<String>,
	/// Instant the access token stops being valid.
	pub expires_at: OffsetDateTime,
	/// Creation instant, stamped by the store.
	pub created_at: OffsetDateTime,
	/// Last modification instant, stamped by the store.
	pub modified_at: OffsetDateTime,
}
impl IdentityRecord {
	/// Uniqueness key of this record.
	pub fn key(&self) -> IdentityKey {
		IdentityKey::new(self.provider_uid.clone(), self.provider.clone())
	}

	/// Returns `true` when the access token has expired at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}

/// Caller-supplied fields for a new record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityDraft {
	/// Uniqueness key.
	pub key: IdentityKey,
	/// Provider handle.
	pub display_name: Option<String>,
	/// Access token.
	pub access_token: TokenSecret,
	/// Avatar URL.
	pub avatar: Option<String>,
	/// Token expiry instant.
	pub expires_at: OffsetDateTime,
}

/// Fields overwritten when an existing record is updated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityChanges {
	/// Replacement access token.
	pub access_token: TokenSecret,
	/// Replacement avatar URL.
	pub avatar: Option<String>,
	/// Replacement expiry instant.
	pub expires_at: OffsetDateTime,
}

/// Keyed record table shared by the built-in stores.
#[derive(Clone, Debug, Default)]
struct RecordTable {
	next_id: u64,
	records: HashMap<IdentityKey, IdentityRecord>,
}
impl RecordTable {
	fn from_records(records: Vec<IdentityRecord>) -> Result<Self, StoreError> {
		let mut table = Self::default();

		for record in records {
			let key = record.key();

			table.next_id = table.next_id.max(record.id);

			if table.records.insert(key.clone(), record).is_some() {
				return Err(StoreError::Serialization {
					message: format!("Snapshot holds duplicate records for {key}"),
				});
			}
		}

		Ok(table)
	}

	fn get(&self, key: &IdentityKey) -> Option<IdentityRecord> {
		self.records.get(key).cloned()
	}

	fn insert(&mut self, draft: IdentityDraft, now: OffsetDateTime) -> Result<IdentityRecord, StoreError> {
		if self.records.contains_key(&draft.key) {
			return Err(StoreError::Conflict { key: draft.key });
		}

		self.next_id += 1;

		let IdentityDraft { key, display_name, access_token, avatar, expires_at } = draft;
		let record = IdentityRecord {
			id: self.next_id,
			user: None,
			provider_uid: key.provider_uid.clone(),
			display_name,
			provider: key.provider.clone(),
			access_token,
			avatar,
			expires_at,
			created_at: now,
			modified_at: now,
		};

		self.records.insert(key, record.clone());

		Ok(record)
	}

	fn update(
		&mut self,
		key: &IdentityKey,
		changes: IdentityChanges,
		now: OffsetDateTime,
	) -> Option<IdentityRecord> {
		let record = self.records.get_mut(key)?;

		record.access_token = changes.access_token;
		record.avatar = changes.avatar;
		record.expires_at = changes.expires_at;
		record.modified_at = now;

		Some(record.clone())
	}

	fn list(&self) -> Vec<IdentityRecord> {
		let mut records: Vec<_> = self.records.values().cloned().collect();

		records.sort_by_key(|r| r.id);

		records
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn key(uid: &str) -> IdentityKey {
		IdentityKey::new(uid, ProviderName::new("github").expect("Provider fixture should be valid."))
	}

	fn draft(uid: &str) -> IdentityDraft {
		IdentityDraft {
			key: key(uid),
			display_name: Some("octocat".into()),
			access_token: TokenSecret::new("abc"),
			avatar: Some("http://x/a.png".into()),
			expires_at: datetime!(2030-01-01 0:00 UTC),
		}
	}

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("database unreachable"));

		let source =
			StdError::source(&error).expect("Crate error should expose the store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn table_rejects_duplicate_keys() {
		let mut table = RecordTable::default();
		let now = datetime!(2025-01-01 0:00 UTC);
		let first = table.insert(draft("42"), now).expect("First insert should succeed.");

		assert_eq!(first.id, 1);
		assert_eq!(first.created_at, now);
		assert!(matches!(
			table.insert(draft("42"), now),
			Err(StoreError::Conflict { key: k }) if k == key("42")
		));
	}

	#[test]
	fn update_keeps_identity_columns() {
		let mut table = RecordTable::default();
		let created = datetime!(2025-01-01 0:00 UTC);
		let later = datetime!(2025-02-01 0:00 UTC);

		table.insert(draft("42"), created).expect("Insert should succeed.");

		let updated = table
			.update(
				&key("42"),
				IdentityChanges {
					access_token: TokenSecret::new("def"),
					avatar: None,
					expires_at: later,
				},
				later,
			)
			.expect("Existing record should update.");

		assert_eq!(updated.id, 1);
		assert_eq!(updated.display_name.as_deref(), Some("octocat"));
		assert_eq!(updated.access_token.expose(), "def");
		assert_eq!(updated.avatar, None);
		assert_eq!(updated.created_at, created);
		assert_eq!(updated.modified_at, later);

		let missing =
			IdentityChanges { access_token: TokenSecret::new("x"), avatar: None, expires_at: later };

		assert!(table.update(&key("7"), missing, later).is_none());
	}

	#[test]
	fn from_records_resumes_id_sequence() {
		let mut table = RecordTable::default();
		let now = datetime!(2025-01-01 0:00 UTC);

		table.insert(draft("1"), now).expect("Insert should succeed.");
		table.insert(draft("2"), now).expect("Insert should succeed.");

		let mut restored =
			RecordTable::from_records(table.list()).expect("Snapshot should restore.");
		let next = restored.insert(draft("3"), now).expect("Insert should succeed.");

		assert_eq!(next.id, 3);
	}

	#[test]
	fn record_serializes_historical_column_names() {
		let mut table = RecordTable::default();
		let record =
			table.insert(draft("42"), datetime!(2025-01-01 0:00 UTC)).expect("Insert should succeed.");
		let json = serde_json::to_value(&record).expect("Record should serialize.");

		assert_eq!(json["username"], "42");
		assert_eq!(json["realname"], "octocat");
		assert_eq!(json["provider"], "github");
	}
}
