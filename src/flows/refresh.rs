//! Refresh-grant path and the proactive refresh used by the background refresher.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSecret},
	flows::{self, TokenManager},
	oauth::TokenGrant,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl TokenManager {
	/// Unconditionally refreshes (or re-fetches) the current token and persists the result.
	///
	/// Does not consult the cached expiry first; the caller asked for a new token.
	pub async fn refresh_new_token(&self) -> Result<TokenSecret> {
		let span = FlowSpan::new(FlowKind::Refresh, "refresh_new_token");

		span.instrument(async move {
			let _singleflight = self.flow_guard.lock().await;
			let current = self.read_current().await;
			let record = self.refresh_or_fetch(current).await?;

			Ok(record.access_token)
		})
		.await
	}

	/// Runs the refresh grant with `refresh_token`, keeping it when the upstream rotates nothing.
	pub(crate) async fn refresh_with(&self, refresh_token: TokenSecret) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_grant");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let grant = TokenGrant::RefreshToken { refresh_token: refresh_token.expose() };
				let response = self.endpoint.request_token(&self.credentials, grant).await?;
				let record =
					response.into_record(OffsetDateTime::now_utc(), Some(refresh_token.clone()))?;

				self.persist(&record).await;

				tracing::info!(expires_at = %record.expires_at, "Refreshed the SignatureRx token.");

				Ok(record)
			})
			.await;

		flows::record_outcome(KIND, &result);

		result
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration as StdDuration;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		store::{TOKEN_KEY, TokenStore},
	};

	#[tokio::test]
	async fn proactive_refresh_replaces_a_valid_token() {
		let endpoint = Arc::new(
			ScriptedTokenEndpoint::new().respond("tok1", 3_600).respond("tok2", 3_600),
		);
		let (manager, _store) = manager_with(endpoint.clone(), false);

		manager.get_access_token().await.expect("Initial fetch should succeed.");

		let refreshed = manager.refresh_new_token().await.expect("Refresh should succeed.");

		assert_eq!(refreshed.expose(), "tok2");
		assert_eq!(
			manager.get_access_token().await.expect("Cache should hold tok2.").expose(),
			"tok2"
		);
		assert_eq!(endpoint.calls(), 2);
	}

	#[tokio::test]
	async fn proactive_refresh_prefers_refresh_grant_and_rotates() {
		let endpoint = Arc::new(ScriptedTokenEndpoint::new().respond_with_refresh("tok2", "refresh-2"));
		let (manager, store) = manager_with(endpoint.clone(), true);
		let seeded = TokenRecord::builder()
			.access_token("tok1")
			.refresh_token("refresh-1")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Seed record should build.");

		store
			.set_with_ttl(TOKEN_KEY, seeded, StdDuration::from_secs(3_540))
			.await
			.expect("Seeding should succeed.");
		manager.refresh_new_token().await.expect("Refresh should succeed.");

		let stored = store
			.get(TOKEN_KEY)
			.await
			.expect("Read should succeed.")
			.expect("Record should be stored.");

		assert_eq!(endpoint.grants(), vec!["refresh_token".to_string()]);
		assert_eq!(stored.access_token.expose(), "tok2");
		assert_eq!(stored.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-2"));
	}
}
