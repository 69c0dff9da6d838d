//! Client-credentials fetch, the fallback every acquisition path ends in.

// self
use crate::{
	_prelude::*,
	auth::TokenRecord,
	error::ConfigError,
	flows::{self, TokenManager},
	oauth::TokenGrant,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl TokenManager {
	/// Exchanges the client credentials for a new token and persists it.
	///
	/// Missing credentials are logged, not enforced; the upstream decides.
	pub(crate) async fn fetch_new_token(&self) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Fetch;

		let span = FlowSpan::new(KIND, "client_credentials");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				if !self.credentials.is_complete() {
					tracing::warn!(
						error = %ConfigError::MissingCredentials,
						"Requesting a SignatureRx token anyway."
					);
				}

				let response =
					self.endpoint.request_token(&self.credentials, TokenGrant::ClientCredentials).await?;
				let record = response.into_record(OffsetDateTime::now_utc(), None)?;

				self.persist(&record).await;

				tracing::info!(expires_at = %record.expires_at, "Fetched a new SignatureRx token.");

				Ok(record)
			})
			.await;

		flows::record_outcome(KIND, &result);

		if let Err(e) = &result {
			tracing::error!(error = %e, "SignatureRx token fetch failed.");
		}

		result
	}
}
