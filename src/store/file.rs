//! Simple file-backed [`TokenStore`] so a restarted gateway keeps its cached credential.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
	time::Duration as StdDuration,
};
// self
use crate::{
	_prelude::*,
	auth::TokenRecord,
	store::{StoreError, StoreFuture, TokenStore},
};

type Snapshot = HashMap<String, Entry>;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Entry {
	record: TokenRecord,
	#[serde(with = "time::serde::rfc3339")]
	evict_at: OffsetDateTime,
}
impl Entry {
	fn is_live_at(&self, now: OffsetDateTime) -> bool {
		now < self.evict_at
	}
}

/// Persists token records to a JSON file after each mutation.
///
/// Eviction deadlines are stored as wall-clock instants so TTLs survive a restart. Snapshot writes
/// run on the blocking pool; mutations hold `persist_guard` until their write lands, so snapshots
/// reach disk in mutation order.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
	persist_guard: Arc<AsyncMutex<()>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	///
	/// Entries whose TTL already elapsed are discarded during load.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let now = OffsetDateTime::now_utc();
		let mut snapshot = Self::load_snapshot(&path)?;

		snapshot.retain(|_, entry| entry.is_live_at(now));

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)), persist_guard: Default::default() })
	}

	/// Location of the backing JSON file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn serialize(contents: &Snapshot) -> Result<Vec<u8>, StoreError> {
		serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize store snapshot: {e}"),
		})
	}

	async fn persist(&self, serialized: Vec<u8>) -> Result<(), StoreError> {
		let path = self.path.clone();

		tokio::task::spawn_blocking(move || write_snapshot(&path, &serialized)).await.map_err(
			|e| StoreError::Backend { message: format!("Store snapshot writer failed: {e}") },
		)?
	}
}
impl TokenStore for FileStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();

			Ok(self
				.inner
				.read()
				.get(key)
				.filter(|entry| entry.is_live_at(now))
				.map(|entry| entry.record.clone()))
		})
	}

	fn set_with_ttl<'a>(
		&'a self,
		key: &'a str,
		record: TokenRecord,
		ttl: StdDuration,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let evict_at = Duration::try_from(ttl)
				.ok()
				.and_then(|ttl| OffsetDateTime::now_utc().checked_add(ttl))
				.ok_or_else(|| StoreError::Backend {
					message: format!("TTL of {}s is out of range.", ttl.as_secs()),
				})?;
			let _persisting = self.persist_guard.lock().await;
			let serialized = {
				let mut guard = self.inner.write();

				guard.insert(key.to_owned(), Entry { record, evict_at });

				Self::serialize(&guard)?
			};

			self.persist(serialized).await
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let _persisting = self.persist_guard.lock().await;
			let serialized = {
				let mut guard = self.inner.write();

				match guard.remove(key) {
					Some(_) => Some(Self::serialize(&guard)?),
					None => None,
				}
			};

			match serialized {
				Some(serialized) => self.persist(serialized).await,
				None => Ok(()),
			}
		})
	}
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", parent.display()),
		})?;
	}

	Ok(())
}

/// Writes `serialized` to a sibling temp file, syncs it, then renames it over `path`.
fn write_snapshot(path: &Path, serialized: &[u8]) -> Result<(), StoreError> {
	ensure_parent_exists(path)?;

	let tmp_path = path.with_extension("tmp");

	{
		let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
			message: format!("Failed to create {}: {e}", tmp_path.display()),
		})?;

		file.write_all(serialized).map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", tmp_path.display()),
		})?;
		file.sync_all().map_err(|e| StoreError::Backend {
			message: format!("Failed to sync {}: {e}", tmp_path.display()),
		})?;
	}

	fs::rename(&tmp_path, path).map_err(|e| StoreError::Backend {
		message: format!("Failed to replace {}: {e}", path.display()),
	})
}
