//! Redis-backed [`TokenStore`] relying on native key expiry.

// std
use std::time::Duration as StdDuration;
// crates.io
use redis::{AsyncCommands, Client, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	auth::TokenRecord,
	store::{StoreError, StoreFuture, TokenStore},
};

/// Stores the token record as JSON under a Redis key written with `SETEX`.
#[derive(Clone)]
pub struct RedisStore {
	connection: ConnectionManager,
}
impl RedisStore {
	/// Connects to `url` and returns a store sharing one multiplexed connection.
	pub async fn connect(url: &str) -> Result<Self, StoreError> {
		let client = Client::open(url).map_err(|e| StoreError::Backend {
			message: format!("Failed to create Redis client: {e}"),
		})?;
		let connection = ConnectionManager::new(client).await.map_err(|e| StoreError::Backend {
			message: format!("Failed to connect to Redis: {e}"),
		})?;

		Ok(Self { connection })
	}
}
impl Debug for RedisStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisStore").finish_non_exhaustive()
	}
}
impl TokenStore for RedisStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move {
			let mut conn = self.connection.clone();
			let raw: Option<String> = conn
				.get(key)
				.await
				.map_err(|e| StoreError::Backend { message: format!("Redis GET failed: {e}") })?;

			raw.map(|json| {
				serde_json::from_str(&json).map_err(|e| StoreError::Serialization {
					message: format!("Failed to parse stored token record: {e}"),
				})
			})
			.transpose()
		})
	}

	fn set_with_ttl<'a>(
		&'a self,
		key: &'a str,
		record: TokenRecord,
		ttl: StdDuration,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let json = serde_json::to_string(&record).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize token record: {e}"),
			})?;
			let mut conn = self.connection.clone();

			// SETEX rejects a zero expiry.
			if ttl.as_secs() == 0 {
				return conn.del::<_, ()>(key).await.map_err(|e| StoreError::Backend {
					message: format!("Redis DEL failed: {e}"),
				});
			}

			conn.set_ex::<_, _, ()>(key, json, ttl.as_secs())
				.await
				.map_err(|e| StoreError::Backend { message: format!("Redis SETEX failed: {e}") })
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut conn = self.connection.clone();

			conn.del::<_, ()>(key)
				.await
				.map_err(|e| StoreError::Backend { message: format!("Redis DEL failed: {e}") })
		})
	}
}
