//! Store access shared by the fetch and refresh paths.
//!
//! Store failures never block token acquisition: a failed read is a miss, and a failed write
//! still hands the freshly issued token back to the caller.

// self
use crate::{_prelude::*, auth::TokenRecord, flows::TokenManager, store};

impl TokenManager {
	/// Reads the current record, treating store failures as a miss.
	pub(crate) async fn read_current(&self) -> Option<TokenRecord> {
		match self.store.get(&self.key).await {
			Ok(record) => record,
			Err(e) => {
				tracing::warn!(error = %e, "Token store read failed; treating as a cache miss.");

				None
			},
		}
	}

	/// Writes `record` with a TTL equal to its remaining lifetime.
	pub(crate) async fn persist(&self, record: &TokenRecord) {
		let ttl = store::ttl_for(record, OffsetDateTime::now_utc());

		if let Err(e) = self.store.set_with_ttl(&self.key, record.clone(), ttl).await {
			tracing::warn!(error = %e, "Token store write failed; returning the unsaved token.");
		}
	}
}
