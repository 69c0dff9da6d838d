//! Token lifecycle orchestration over an injected [`TokenStore`] and [`TokenEndpoint`].
//!
//! [`TokenManager`] is the only component that acquires SignatureRx tokens. Callers ask for a
//! bearer credential; the manager serves it from the store while `now < expires_at`, and
//! otherwise refreshes (when the upstream supports the refresh grant) or fetches a new one with
//! client credentials. A singleflight guard collapses concurrent misses inside one process onto
//! a single upstream call; across processes the store's last-writer-wins semantics apply.
//!
//! Records are stored with a TTL equal to their remaining lifetime, so a TTL-honouring store
//! drops a record the moment it expires. On such stores [`TokenManager::get_access_token`] sees a
//! miss and fetches with client credentials; only [`TokenManager::refresh_new_token`], driven by
//! the background refresher while the record is still live, exercises the refresh grant.

pub mod common;
pub mod refresh;

mod client_credentials;

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSecret, TokenStatusReport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	oauth::{ClientCredentials, TokenEndpoint},
	store::{TOKEN_KEY, TokenStore},
};

/// Obtains, caches, refreshes, and invalidates SignatureRx bearer tokens.
#[derive(Clone)]
pub struct TokenManager {
	store: Arc<dyn TokenStore>,
	endpoint: Arc<dyn TokenEndpoint>,
	credentials: ClientCredentials,
	supports_refresh_grant: bool,
	key: String,
	flow_guard: Arc<AsyncMutex<()>>,
}
impl TokenManager {
	/// Creates a manager persisting under [`TOKEN_KEY`] with the refresh grant disabled.
	pub fn new(store: Arc<dyn TokenStore>, endpoint: Arc<dyn TokenEndpoint>) -> Self {
		Self {
			store,
			endpoint,
			credentials: ClientCredentials::default(),
			supports_refresh_grant: false,
			key: TOKEN_KEY.into(),
			flow_guard: Default::default(),
		}
	}

	/// Sets the client id and secret sent with every grant.
	pub fn with_credentials(
		mut self,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Self {
		self.credentials = ClientCredentials::new(client_id, client_secret);

		self
	}

	/// Enables or disables the refresh-grant branch.
	pub fn with_refresh_grant(mut self, supported: bool) -> Self {
		self.supports_refresh_grant = supported;

		self
	}

	/// Returns a usable bearer token, hitting the upstream only on a cache miss.
	pub async fn get_access_token(&self) -> Result<TokenSecret> {
		let span = FlowSpan::new(FlowKind::Fetch, "get_access_token");

		span.instrument(async move {
			if let Some(current) = self.cached_valid(OffsetDateTime::now_utc()).await {
				tracing::debug!("Serving cached SignatureRx token.");

				return Ok(current.access_token);
			}

			let _singleflight = self.flow_guard.lock().await;
			// Another caller may have stored a token while this one waited on the guard.
			let current = self.read_current().await;
			let now = OffsetDateTime::now_utc();

			if let Some(valid) = current.as_ref().filter(|record| record.is_valid_at(now)) {
				return Ok(valid.access_token.clone());
			}

			let record = self.refresh_or_fetch(current).await?;

			Ok(record.access_token)
		})
		.await
	}

	/// Deletes the current token record; succeeds when none exists.
	pub async fn reset_token_store(&self) -> Result<()> {
		self.store.delete(&self.key).await?;

		tracing::info!("SignatureRx token store reset.");

		Ok(())
	}

	/// Reports whether a record exists, its expiry, and whether it is expired.
	///
	/// Never mutates the store or calls the upstream.
	pub async fn get_token_status(&self) -> Result<TokenStatusReport> {
		let record = self.store.get(&self.key).await?;

		Ok(TokenStatusReport::at(record.as_ref(), OffsetDateTime::now_utc()))
	}

	async fn cached_valid(&self, now: OffsetDateTime) -> Option<TokenRecord> {
		self.read_current().await.filter(|record| record.is_valid_at(now))
	}

	/// Refresh grant when supported and a refresh credential is stored, client-credentials
	/// fetch otherwise or when the refresh fails.
	async fn refresh_or_fetch(&self, current: Option<TokenRecord>) -> Result<TokenRecord> {
		let refresh_token = current
			.and_then(|record| record.refresh_token)
			.filter(|_| self.supports_refresh_grant);

		if let Some(refresh_token) = refresh_token {
			match self.refresh_with(refresh_token).await {
				Ok(record) => return Ok(record),
				Err(e) => tracing::warn!(
					error = %e,
					"Refresh grant failed; falling back to client credentials."
				),
			}
		}

		self.fetch_new_token().await
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("key", &self.key)
			.field("client_id", &self.credentials.client_id)
			.field("supports_refresh_grant", &self.supports_refresh_grant)
			.finish()
	}
}

pub(crate) fn record_outcome<T>(kind: FlowKind, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(_) => obs::record_flow_outcome(kind, FlowOutcome::Failure),
	}
}
