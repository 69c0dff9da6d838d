//! Token store contract and built-in store implementations.
//!
//! A store holds at most one record per key, written with a time-to-live so backends with native
//! expiry (Redis) self-clean and in-process backends can emulate the same semantics. Writes
//! replace the previous record wholesale; there is no partial update.

pub mod file;
pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "redis")] pub use redis::RedisStore;

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, auth::TokenRecord};

/// Well-known key under which the current SignatureRx token is stored.
pub const TOKEN_KEY: &str = "signaturerx:token";

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable key-value slot contract shared by every token store backend.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Fetches the record stored under `key`, if present and not past its TTL.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Replaces the record under `key`, expiring it after `ttl`.
	fn set_with_ttl<'a>(
		&'a self,
		key: &'a str,
		record: TokenRecord,
		ttl: StdDuration,
	) -> StoreFuture<'a, ()>;

	/// Removes the record under `key`; succeeds when nothing is stored.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
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

/// TTL applied when persisting `record` at `now`: the remaining lifetime, floored at zero.
pub fn ttl_for(record: &TokenRecord, now: OffsetDateTime) -> StdDuration {
	record.remaining_at(now).try_into().unwrap_or(StdDuration::ZERO)
}
