//! SignatureRx e-prescription gateway: a TTL-backed OAuth token manager, a single-retry
//! prescription issuer, signed webhook intake, and the REST surface that ties them together.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod mock;
pub mod model;
pub mod oauth;
pub mod obs;
pub mod prescribing;
pub mod records;
pub mod refresher;
pub mod store;
pub mod webhook;

#[cfg(test)]
pub(crate) mod _preludet {
	//! Scripted upstream fakes shared by the unit tests.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// self
	use crate::{
		auth::TokenSecret,
		flows::TokenManager,
		model::CreatePrescriptionRequest,
		oauth::{ClientCredentials, EndpointFuture, TokenEndpoint, TokenEndpointResponse, TokenGrant},
		prescribing::{PrescribeFuture, PrescribeOutcome, PrescribingApi},
		store::{MemoryStore, TokenStore},
	};

	/// Token endpoint fake that replays a queue of responses and records every grant.
	#[derive(Default)]
	pub struct ScriptedTokenEndpoint {
		responses: Mutex<VecDeque<Result<TokenEndpointResponse>>>,
		grants: Mutex<Vec<String>>,
		calls: AtomicUsize,
	}
	impl ScriptedTokenEndpoint {
		pub fn new() -> Self {
			Self::default()
		}

		pub fn respond(self, access_token: &str, expires_in: i64) -> Self {
			self.responses.lock().push_back(Ok(token_response(access_token, expires_in, None)));

			self
		}

		pub fn respond_with_refresh(self, access_token: &str, refresh_token: &str) -> Self {
			self.responses.lock().push_back(Ok(token_response(
				access_token,
				3_600,
				Some(refresh_token),
			)));

			self
		}

		pub fn fail(self, status: u16, body: &str) -> Self {
			self.responses.lock().push_back(Err(crate::error::UpstreamAuthError::TokenEndpoint {
				grant: "client_credentials",
				status,
				body: body.into(),
			}
			.into()));

			self
		}

		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}

		pub fn grants(&self) -> Vec<String> {
			self.grants.lock().clone()
		}
	}
	impl TokenEndpoint for ScriptedTokenEndpoint {
		fn request_token<'a>(
			&'a self,
			_credentials: &'a ClientCredentials,
			grant: TokenGrant<'a>,
		) -> EndpointFuture<'a> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.grants.lock().push(grant.as_str().into());

			let next = self.responses.lock().pop_front();

			Box::pin(async move {
				next.unwrap_or_else(|| {
					Err(crate::error::UpstreamAuthError::TokenEndpoint {
						grant: "client_credentials",
						status: 500,
						body: "script exhausted".into(),
					}
					.into())
				})
			})
		}
	}

	/// Prescribing API fake that replays status codes and records the bearer tokens it saw.
	#[derive(Default)]
	pub struct ScriptedPrescribingApi {
		statuses: Mutex<VecDeque<u16>>,
		bearers: Mutex<Vec<String>>,
		calls: AtomicUsize,
	}
	impl ScriptedPrescribingApi {
		pub fn new(statuses: impl IntoIterator<Item = u16>) -> Self {
			Self { statuses: Mutex::new(statuses.into_iter().collect()), ..Default::default() }
		}

		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}

		pub fn bearers(&self) -> Vec<String> {
			self.bearers.lock().clone()
		}
	}
	impl PrescribingApi for ScriptedPrescribingApi {
		fn submit<'a>(
			&'a self,
			bearer: &'a TokenSecret,
			_payload: &'a CreatePrescriptionRequest,
		) -> PrescribeFuture<'a> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.bearers.lock().push(bearer.expose().into());

			let status = self.statuses.lock().pop_front().unwrap_or(500);

			Box::pin(async move {
				Ok(match status {
					200..=299 => PrescribeOutcome::Accepted(serde_json::json!({
						"prescription_id": "SRX-1",
						"status": "Sent",
					})),
					401 => PrescribeOutcome::Unauthorized { body: "{\"message\":\"Unauthenticated.\"}".into() },
					_ => PrescribeOutcome::Rejected { status, body: "{\"message\":\"boom\"}".into() },
				})
			})
		}
	}

	pub fn token_response(
		access_token: &str,
		expires_in: i64,
		refresh_token: Option<&str>,
	) -> TokenEndpointResponse {
		TokenEndpointResponse {
			access_token: access_token.into(),
			refresh_token: refresh_token.map(Into::into),
			expires_in,
			token_type: Some("bearer".into()),
		}
	}

	pub fn manager_with(
		endpoint: Arc<ScriptedTokenEndpoint>,
		supports_refresh_grant: bool,
	) -> (TokenManager, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::default());
		let shared: Arc<dyn TokenStore> = store.clone();
		let manager = TokenManager::new(shared, endpoint)
			.with_refresh_grant(supports_refresh_grant)
			.with_credentials("client-id", "client-secret");

		(manager, store)
	}

	pub fn sample_request() -> CreatePrescriptionRequest {
		serde_json::from_value(serde_json::json!({
			"action": "issueForDelivery",
			"clinic_id": 7,
			"secure_pin": "1234",
			"delivery_address": {
				"address_ln1": "1 High Street",
				"city": "London",
				"post_code": "N1 1AA",
				"country": "United Kingdom"
			},
			"patient": {
				"first_name": "Ada",
				"last_name": "Lovelace",
				"gender": "female",
				"email": "ada@example.com",
				"phone": "441234567890",
				"birth_day": "10",
				"birth_month": "12",
				"birth_year": "1985",
				"address_ln1": "1 High Street",
				"city": "London",
				"post_code": "N1 1AA",
				"country": "United Kingdom"
			},
			"medicines": [{
				"object": "medicine",
				"id": 1,
				"VPID": "39720311000001101",
				"description": "Paracetamol 500mg tablets",
				"qty": "32",
				"directions": "Two tablets every six hours"
			}]
		}))
		.expect("Sample prescription request should deserialize.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
use color_eyre as _;
#[cfg(test)] use httpmock as _;
