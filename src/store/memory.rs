//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// std
use std::time::{Duration as StdDuration, Instant};
// self
use crate::{
	_prelude::*,
	auth::TokenRecord,
	store::{StoreError, StoreFuture, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<String, Entry>>>;

#[derive(Clone, Debug)]
struct Entry {
	record: TokenRecord,
	deadline: Instant,
}

/// Thread-safe storage backend that keeps records in-process, emulating native TTL expiry.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Remaining time-to-live for `key`, if a live entry exists.
	pub fn ttl(&self, key: &str) -> Option<StdDuration> {
		let now = Instant::now();

		self.0
			.read()
			.get(key)
			.filter(|entry| entry.deadline > now)
			.map(|entry| entry.deadline - now)
	}

	/// Number of live entries.
	pub fn len(&self) -> usize {
		let now = Instant::now();

		self.0.read().values().filter(|entry| entry.deadline > now).count()
	}

	/// Returns `true` when no live entry exists.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn get_now(map: &StoreMap, key: &str) -> Option<TokenRecord> {
		let now = Instant::now();

		{
			let guard = map.read();

			match guard.get(key) {
				Some(entry) if entry.deadline > now => return Some(entry.record.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		// Lazily drop the expired entry.
		let mut guard = map.write();

		if guard.get(key).is_some_and(|entry| entry.deadline <= now) {
			guard.remove(key);
		}

		None
	}

	fn set_now(
		map: &StoreMap,
		key: &str,
		record: TokenRecord,
		ttl: StdDuration,
	) -> Result<(), StoreError> {
		let deadline = Instant::now().checked_add(ttl).ok_or_else(|| StoreError::Backend {
			message: format!("TTL of {}s is out of range.", ttl.as_secs()),
		})?;

		map.write().insert(key.to_owned(), Entry { record, deadline });

		Ok(())
	}
}
impl TokenStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move { Ok(Self::get_now(&self.0, key)) })
	}

	fn set_with_ttl<'a>(
		&'a self,
		key: &'a str,
		record: TokenRecord,
		ttl: StdDuration,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move { Self::set_now(&self.0, key, record, ttl) })
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.0.write().remove(key);

			Ok(())
		})
	}
}
