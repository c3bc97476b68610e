//! Simple file-backed [`IdentityStore`] for lightweight deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{
		IdentityChanges, IdentityDraft, IdentityKey, IdentityRecord, IdentityStore, RecordTable,
		StoreError, StoreFuture,
	},
};

/// Persists identity records to a JSON file after each mutation.
///
/// Writes are synchronous and happen while the table's write lock is held, so every mutation
/// blocks the calling executor thread until the snapshot is renamed into place. Meant for
/// single-process, low-traffic deployments; busier servers should implement [`IdentityStore`]
/// over a transactional backend.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<RecordTable>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let table = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(table)) })
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<RecordTable, StoreError> {
		if !path.exists() {
			return Ok(RecordTable::default());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(RecordTable::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let records: Vec<IdentityRecord> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		RecordTable::from_records(records)
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, table: &RecordTable) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(&table.list()).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl IdentityStore for FileStore {
	fn find<'a>(&'a self, key: &'a IdentityKey) -> StoreFuture<'a, Option<IdentityRecord>> {
		Box::pin(async move { Ok(self.inner.read().get(key)) })
	}

	fn insert(&self, draft: IdentityDraft) -> StoreFuture<'_, IdentityRecord> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			// Persist from a copy so a failed write leaves memory and disk in agreement.
			let mut next = guard.clone();
			let record = next.insert(draft, OffsetDateTime::now_utc())?;

			self.persist_locked(&next)?;

			*guard = next;

			Ok(record)
		})
	}

	fn update<'a>(
		&'a self,
		key: &'a IdentityKey,
		changes: IdentityChanges,
	) -> StoreFuture<'a, Option<IdentityRecord>> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut next = guard.clone();
			let Some(record) = next.update(key, changes, OffsetDateTime::now_utc()) else {
				return Ok(None);
			};

			self.persist_locked(&next)?;

			*guard = next;

			Ok(Some(record))
		})
	}

	fn list(&self) -> StoreFuture<'_, Vec<IdentityRecord>> {
		Box::pin(async move { Ok(self.inner.read().list()) })
	}
}
