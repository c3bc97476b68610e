//! Thread-safe in-memory [`IdentityStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{
		IdentityChanges, IdentityDraft, IdentityKey, IdentityRecord, IdentityStore, RecordTable,
		StoreError, StoreFuture,
	},
};

type StoreTable = Arc<RwLock<RecordTable>>;

/// Thread-safe storage backend that keeps records in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreTable);
impl MemoryStore {
	fn insert_now(table: StoreTable, draft: IdentityDraft) -> Result<IdentityRecord, StoreError> {
		table.write().insert(draft, OffsetDateTime::now_utc())
	}

	fn update_now(
		table: StoreTable,
		key: &IdentityKey,
		changes: IdentityChanges,
	) -> Option<IdentityRecord> {
		table.write().update(key, changes, OffsetDateTime::now_utc())
	}
}
impl IdentityStore for MemoryStore {
	fn find<'a>(&'a self, key: &'a IdentityKey) -> StoreFuture<'a, Option<IdentityRecord>> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.read().get(key)) })
	}

	fn insert(&self, draft: IdentityDraft) -> StoreFuture<'_, IdentityRecord> {
		let table = self.0.clone();

		Box::pin(async move { Self::insert_now(table, draft) })
	}

	fn update<'a>(
		&'a self,
		key: &'a IdentityKey,
		changes: IdentityChanges,
	) -> StoreFuture<'a, Option<IdentityRecord>> {
		let table = self.0.clone();

		Box::pin(async move { Ok(Self::update_now(table, key, changes)) })
	}

	fn list(&self) -> StoreFuture<'_, Vec<IdentityRecord>> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.read().list()) })
	}
}
