//! Identity upsert: reconcile a fetched profile with the stored identity record.
//!
//! The lookup-then-write runs under a per-[`IdentityKey`] async guard so concurrent callbacks in
//! one process serialize. Across processes the store's uniqueness constraint is the backstop: an
//! insert that loses the race fails with [`StoreError::Conflict`] and is retried as an update
//! exactly once.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ProviderError,
	store::{IdentityChanges, IdentityDraft, IdentityKey, IdentityRecord, IdentityStore, StoreError},
};

/// Inputs for [`upsert_identity`], read from the request's identity cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpsertRequest {
	/// Record key (provider user id + provider name).
	pub key: IdentityKey,
	/// Provider handle; only written when the record is created.
	pub display_name: Option<String>,
	/// Access token from the exchange.
	pub access_token: TokenSecret,
	/// Avatar URL from the profile.
	pub avatar: Option<String>,
	/// Token lifetime in seconds; `0` yields a record that is already expired.
	pub expires_in: i64,
}
impl UpsertRequest {
	/// Expiry instant relative to `now`.
	pub fn expires_at(&self, now: OffsetDateTime) -> Result<OffsetDateTime> {
		now.checked_add(Duration::seconds(self.expires_in))
			.ok_or_else(|| ProviderError::ExpiresOutOfRange { seconds: self.expires_in }.into())
	}

	fn changes(&self, expires_at: OffsetDateTime) -> IdentityChanges {
		IdentityChanges {
			access_token: self.access_token.clone(),
			avatar: self.avatar.clone(),
			expires_at,
		}
	}

	fn draft(&self, expires_at: OffsetDateTime) -> IdentityDraft {
		IdentityDraft {
			key: self.key.clone(),
			display_name: self.display_name.clone(),
			access_token: self.access_token.clone(),
			avatar: self.avatar.clone(),
			expires_at,
		}
	}
}

/// Per-key guards serializing upserts inside one process.
///
/// An entry lives only while some upsert holds a [`GuardLease`] for its key; the last lease to
/// drop removes it, so the map stays bounded by the number of in-flight upserts.
#[derive(Clone, Debug, Default)]
pub struct UpsertGuards(Arc<Mutex<HashMap<IdentityKey, GuardEntry>>>);
impl UpsertGuards {
	/// Leases (and creates on demand) the guard for `key`.
	pub fn lease(&self, key: &IdentityKey) -> GuardLease<'_> {
		let mut guards = self.0.lock();
		let entry = guards
			.entry(key.clone())
			.or_insert_with(|| GuardEntry { lock: Arc::new(AsyncMutex::new(())), leases: 0 });

		entry.leases += 1;

		GuardLease { guards: self, key: key.clone(), lock: entry.lock.clone() }
	}

	/// Number of keys with at least one outstanding lease.
	pub fn len(&self) -> usize {
		self.0.lock().len()
	}

	/// Returns `true` when no upsert holds a lease.
	pub fn is_empty(&self) -> bool {
		self.0.lock().is_empty()
	}
}

#[derive(Debug)]
struct GuardEntry {
	lock: Arc<AsyncMutex<()>>,
	leases: usize,
}

/// Outstanding claim on the guard for one key; releases the map entry when the last lease drops.
#[derive(Debug)]
pub struct GuardLease<'a> {
	guards: &'a UpsertGuards,
	key: IdentityKey,
	lock: Arc<AsyncMutex<()>>,
}
impl GuardLease<'_> {
	/// Waits for exclusive access to the key.
	pub async fn lock(&self) -> AsyncMutexGuard<'_, ()> {
		self.lock.lock().await
	}
}
impl Drop for GuardLease<'_> {
	fn drop(&mut self) {
		let mut guards = self.guards.0.lock();
		let released = match guards.get_mut(&self.key) {
			Some(entry) => {
				entry.leases = entry.leases.saturating_sub(1);

				entry.leases == 0
			},
			None => false,
		};

		if released {
			guards.remove(&self.key);
		}
	}
}

/// Inserts or updates the identity record for `request.key`.
pub async fn upsert_identity(
	store: &dyn IdentityStore,
	guards: &UpsertGuards,
	request: UpsertRequest,
) -> Result<IdentityRecord> {
	let lease = guards.lease(&request.key);
	let _serialized = lease.lock().await;
	let expires_at = request.expires_at(OffsetDateTime::now_utc())?;

	if store.find(&request.key).await?.is_some() {
		return update_existing(store, &request, expires_at).await;
	}

	match store.insert(request.draft(expires_at)).await {
		Ok(record) => Ok(record),
		Err(StoreError::Conflict { .. }) => update_existing(store, &request, expires_at).await,
		Err(e) => Err(e.into()),
	}
}

async fn update_existing(
	store: &dyn IdentityStore,
	request: &UpsertRequest,
	expires_at: OffsetDateTime,
) -> Result<IdentityRecord> {
	store.update(&request.key, request.changes(expires_at)).await?.ok_or_else(|| {
		StoreError::Backend {
			message: format!("Identity record for {} vanished during upsert", request.key),
		}
		.into()
	})
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicBool, Ordering};
	// self
	use super::*;
	use crate::{
		auth::ProviderName,
		store::{MemoryStore, StoreFuture},
	};

	fn request(token: &str, expires_in: i64) -> UpsertRequest {
		let provider = ProviderName::new("github").expect("Provider fixture should be valid.");

		UpsertRequest {
			key: IdentityKey::new("42", provider),
			display_name: Some("octocat".into()),
			access_token: TokenSecret::new(token),
			avatar: Some("http://x/a.png".into()),
			expires_in,
		}
	}

	/// Store whose first `find` reports nothing, as if a concurrent insert had not landed yet.
	#[derive(Default)]
	struct StaleFindStore {
		inner: MemoryStore,
		stale: AtomicBool,
	}
	impl IdentityStore for StaleFindStore {
		fn find<'a>(&'a self, key: &'a IdentityKey) -> StoreFuture<'a, Option<IdentityRecord>> {
			if self.stale.swap(false, Ordering::SeqCst) {
				return Box::pin(async { Ok(None) });
			}

			self.inner.find(key)
		}

		fn insert(&self, draft: IdentityDraft) -> StoreFuture<'_, IdentityRecord> {
			self.inner.insert(draft)
		}

		fn update<'a>(
			&'a self,
			key: &'a IdentityKey,
			changes: IdentityChanges,
		) -> StoreFuture<'a, Option<IdentityRecord>> {
			self.inner.update(key, changes)
		}

		fn list(&self) -> StoreFuture<'_, Vec<IdentityRecord>> {
			self.inner.list()
		}
	}

	/// Store that always loses the insert race and never finds the winning record afterwards.
	#[derive(Default)]
	struct VanishingStore {
		inner: MemoryStore,
	}
	impl IdentityStore for VanishingStore {
		fn find<'a>(&'a self, _: &'a IdentityKey) -> StoreFuture<'a, Option<IdentityRecord>> {
			Box::pin(async { Ok(None) })
		}

		fn insert(&self, draft: IdentityDraft) -> StoreFuture<'_, IdentityRecord> {
			Box::pin(async move { Err(StoreError::Conflict { key: draft.key }) })
		}

		fn update<'a>(
			&'a self,
			_: &'a IdentityKey,
			_: IdentityChanges,
		) -> StoreFuture<'a, Option<IdentityRecord>> {
			Box::pin(async { Ok(None) })
		}

		fn list(&self) -> StoreFuture<'_, Vec<IdentityRecord>> {
			self.inner.list()
		}
	}

	#[tokio::test]
	async fn creates_then_updates_single_record() {
		let store = MemoryStore::default();
		let guards = UpsertGuards::default();
		let created = upsert_identity(&store, &guards, request("first", 3600))
			.await
			.expect("First upsert should create a record.");
		let updated = upsert_identity(&store, &guards, request("second", 7200))
			.await
			.expect("Second upsert should update the record.");
		let records = store.list().await.expect("Listing should succeed.");

		assert_eq!(records.len(), 1);
		assert_eq!(updated.id, created.id);
		assert_eq!(updated.created_at, created.created_at);
		assert_eq!(updated.access_token.expose(), "second");
		assert!(updated.expires_at > created.expires_at);
		assert!(updated.modified_at >= created.modified_at);
	}

	#[tokio::test]
	async fn update_does_not_rewrite_display_name() {
		let store = MemoryStore::default();
		let guards = UpsertGuards::default();

		upsert_identity(&store, &guards, request("first", 60)).await.expect("Upsert should succeed.");

		let mut renamed = request("second", 60);

		renamed.display_name = Some("hubot".into());

		let updated =
			upsert_identity(&store, &guards, renamed).await.expect("Upsert should succeed.");

		assert_eq!(updated.display_name.as_deref(), Some("octocat"));
	}

	#[tokio::test]
	async fn conflicting_insert_is_retried_as_update() {
		let store = StaleFindStore::default();
		let guards = UpsertGuards::default();

		store
			.inner
			.insert(request("winner", 60).draft(OffsetDateTime::now_utc()))
			.await
			.expect("Seed insert should succeed.");
		store.stale.store(true, Ordering::SeqCst);

		let record = upsert_identity(&store, &guards, request("loser", 60))
			.await
			.expect("Conflict should be retried as an update.");

		assert_eq!(record.access_token.expose(), "loser");
		assert_eq!(store.list().await.expect("Listing should succeed.").len(), 1);
	}

	#[tokio::test]
	async fn concurrent_upserts_for_one_key_yield_one_record() {
		let store = Arc::new(MemoryStore::default());
		let guards = UpsertGuards::default();
		let mut tasks = Vec::new();

		for i in 0..16 {
			let store = store.clone();
			let guards = guards.clone();

			tasks.push(tokio::spawn(async move {
				upsert_identity(store.as_ref(), &guards, request(&format!("token-{i}"), 60)).await
			}));
		}
		for task in tasks {
			task.await.expect("Upsert task should not panic.").expect("Upsert should succeed.");
		}

		assert_eq!(store.list().await.expect("Listing should succeed.").len(), 1);
		assert!(guards.is_empty());
	}

	#[tokio::test]
	async fn failed_conflict_retry_surfaces_as_storage_error() {
		let store = VanishingStore::default();
		let guards = UpsertGuards::default();
		let err = upsert_identity(&store, &guards, request("t", 60))
			.await
			.expect_err("A conflict whose record vanished should fail.");

		assert!(matches!(err, Error::Storage(StoreError::Backend { .. })));
		assert_eq!(err.code(), "persistence_error");
		assert_eq!(err.status_code(), 500);
		assert!(store.list().await.expect("Listing should succeed.").is_empty());
		assert!(guards.is_empty());
	}

	#[tokio::test]
	async fn guards_are_released_after_upserts_finish() {
		let store = Arc::new(MemoryStore::default());
		let guards = UpsertGuards::default();
		let mut tasks = Vec::new();

		for uid in 0..64 {
			let store = store.clone();
			let guards = guards.clone();

			tasks.push(tokio::spawn(async move {
				let mut req = request("t", 60);

				req.key = IdentityKey::new(
					(uid % 8).to_string(),
					ProviderName::new("github").expect("Provider fixture should be valid."),
				);

				upsert_identity(store.as_ref(), &guards, req).await
			}));
		}
		for task in tasks {
			task.await.expect("Upsert task should not panic.").expect("Upsert should succeed.");
		}

		assert_eq!(store.list().await.expect("Listing should succeed.").len(), 8);
		assert!(guards.is_empty());
	}

	#[test]
	fn lease_entry_outlives_all_but_the_last_holder() {
		let guards = UpsertGuards::default();
		let key = request("t", 60).key;
		let first = guards.lease(&key);
		let second = guards.lease(&key);

		assert_eq!(guards.len(), 1);

		drop(first);

		assert_eq!(guards.len(), 1);

		drop(second);

		assert!(guards.is_empty());
	}

	#[test]
	fn zero_lifetime_expires_immediately() {
		let now = OffsetDateTime::now_utc();

		assert_eq!(request("t", 0).expires_at(now).expect("Zero lifetime is representable."), now);
		assert!(matches!(
			request("t", i64::MAX).expires_at(now),
			Err(Error::Provider(ProviderError::ExpiresOutOfRange { seconds: i64::MAX }))
		));
	}
}
