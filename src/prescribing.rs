//! Prescribing endpoint contract and the single-retry issuer built on [`TokenManager`].
//!
//! A 401 from the prescribing endpoint means the upstream no longer accepts the cached token.
//! The issuer then resets the token store and repeats the whole operation (token acquisition
//! through submission) exactly once. A second 401 is terminal.

// crates.io
use reqwest::{StatusCode, header::ACCEPT};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::TransportError,
	flows::{self, TokenManager},
	http::UpstreamResponse,
	mock,
	model::CreatePrescriptionRequest,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Boxed future returned by [`PrescribingApi::submit`].
pub type PrescribeFuture<'a> = Pin<Box<dyn Future<Output = Result<PrescribeOutcome>> + 'a + Send>>;

/// Upstream prescribing endpoint contract.
pub trait PrescribingApi
where
	Self: Send + Sync,
{
	/// Submits `payload` with `bearer` attached.
	fn submit<'a>(
		&'a self,
		bearer: &'a TokenSecret,
		payload: &'a CreatePrescriptionRequest,
	) -> PrescribeFuture<'a>;
}

/// Classified answer from the prescribing endpoint.
#[derive(Clone, Debug, PartialEq)]
pub enum PrescribeOutcome {
	/// 2xx with the decoded JSON body.
	Accepted(serde_json::Value),
	/// 401; the token was not accepted.
	Unauthorized {
		/// Verbatim response body.
		body: String,
	},
	/// Any other non-2xx status.
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Verbatim response body.
		body: String,
	},
}

/// Prescribing endpoint reached over HTTP with reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestPrescribingApi {
	client: ReqwestClient,
	url: Url,
}
impl ReqwestPrescribingApi {
	/// Creates an adapter posting to `url` (the full prescribing endpoint).
	pub fn new(client: ReqwestClient, url: Url) -> Self {
		Self { client, url }
	}

	async fn post(
		&self,
		bearer: &TokenSecret,
		payload: &CreatePrescriptionRequest,
	) -> Result<PrescribeOutcome, TransportError> {
		let response = self
			.client
			.post(self.url.clone())
			.bearer_auth(bearer.expose())
			.header(ACCEPT, "application/json")
			.json(payload)
			.send()
			.await?;
		let response = UpstreamResponse::read(response).await?;

		Ok(match response.status {
			status if status.is_success() => PrescribeOutcome::Accepted(decode_body(&response)),
			StatusCode::UNAUTHORIZED => PrescribeOutcome::Unauthorized { body: response.text() },
			status => PrescribeOutcome::Rejected { status: status.as_u16(), body: response.text() },
		})
	}
}
impl PrescribingApi for ReqwestPrescribingApi {
	fn submit<'a>(
		&'a self,
		bearer: &'a TokenSecret,
		payload: &'a CreatePrescriptionRequest,
	) -> PrescribeFuture<'a> {
		Box::pin(async move { self.post(bearer, payload).await.map_err(Error::from) })
	}
}

fn decode_body(response: &UpstreamResponse) -> serde_json::Value {
	if response.body.is_empty() {
		return serde_json::Value::Null;
	}

	serde_json::from_slice(&response.body).unwrap_or_else(|_| serde_json::Value::String(response.text()))
}

/// Prescribing API used in mock mode; always accepts with the canned draft prescription.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockPrescribingApi;
impl PrescribingApi for MockPrescribingApi {
	fn submit<'a>(
		&'a self,
		_bearer: &'a TokenSecret,
		_payload: &'a CreatePrescriptionRequest,
	) -> PrescribeFuture<'a> {
		Box::pin(async { Ok(PrescribeOutcome::Accepted(mock::draft_prescription())) })
	}
}

/// Source of the status recorded for an accepted prescription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusPolicy {
	/// Use the upstream body's `status`, or `fallback` when absent.
	Upstream {
		/// Status used when the upstream reports none.
		fallback: String,
	},
	/// Always record this status.
	Fixed(String),
}
impl StatusPolicy {
	/// Resolves the status for an accepted response body.
	pub fn resolve(&self, body: &serde_json::Value) -> String {
		match self {
			Self::Upstream { fallback } => body
				.get("status")
				.and_then(serde_json::Value::as_str)
				.filter(|status| !status.is_empty())
				.unwrap_or(fallback)
				.to_owned(),
			Self::Fixed(status) => status.clone(),
		}
	}
}
impl Default for StatusPolicy {
	fn default() -> Self {
		Self::Upstream { fallback: "Sent".into() }
	}
}

/// Accepted prescription as reported by the upstream.
#[derive(Clone, Debug, PartialEq)]
pub struct IssuedPrescription {
	/// SignatureRx prescription id, when present.
	pub prescription_id: Option<String>,
	/// Status resolved through the [`StatusPolicy`].
	pub status: String,
	/// Full upstream body.
	pub raw: serde_json::Value,
}

/// Issues prescriptions with the single-retry-on-401 policy.
#[derive(Clone)]
pub struct PrescriptionIssuer {
	manager: TokenManager,
	api: Arc<dyn PrescribingApi>,
	status_policy: StatusPolicy,
}
impl PrescriptionIssuer {
	/// Creates an issuer with the default [`StatusPolicy`].
	pub fn new(manager: TokenManager, api: Arc<dyn PrescribingApi>) -> Self {
		Self { manager, api, status_policy: StatusPolicy::default() }
	}

	/// Overrides the status policy.
	pub fn with_status_policy(mut self, policy: StatusPolicy) -> Self {
		self.status_policy = policy;

		self
	}

	/// Token manager backing this issuer.
	pub fn token_manager(&self) -> &TokenManager {
		&self.manager
	}

	/// Submits `request`, retrying exactly once with a fresh token after a 401.
	pub async fn issue(&self, request: &CreatePrescriptionRequest) -> Result<IssuedPrescription> {
		const KIND: FlowKind = FlowKind::Prescribe;

		let span = FlowSpan::new(KIND, "issue");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				tracing::info!(clinic_id = request.clinic_id, "Issuing prescription to SignatureRx.");

				match self.attempt(request).await? {
					PrescribeOutcome::Unauthorized { .. } => {
						tracing::warn!("SignatureRx rejected the token; resetting and retrying once.");

						if let Err(e) = self.manager.reset_token_store().await {
							tracing::warn!(error = %e, "Token reset failed; retrying anyway.");
						}

						match self.attempt(request).await? {
							PrescribeOutcome::Unauthorized { body } =>
								Err(Error::AuthenticationRetryExhausted { body }),
							outcome => self.finish(outcome),
						}
					},
					outcome => self.finish(outcome),
				}
			})
			.await;

		flows::record_outcome(KIND, &result);

		match &result {
			Ok(issued) => tracing::info!(
				prescription_id = issued.prescription_id.as_deref().unwrap_or_default(),
				status = %issued.status,
				"Prescription issued."
			),
			Err(e) => tracing::error!(error = %e, "Prescription issue failed."),
		}

		result
	}

	async fn attempt(&self, request: &CreatePrescriptionRequest) -> Result<PrescribeOutcome> {
		let token = self.manager.get_access_token().await?;

		self.api.submit(&token, request).await
	}

	fn finish(&self, outcome: PrescribeOutcome) -> Result<IssuedPrescription> {
		match outcome {
			PrescribeOutcome::Accepted(raw) => {
				let prescription_id = raw
					.get("prescription_id")
					.and_then(serde_json::Value::as_str)
					.filter(|id| !id.is_empty())
					.map(ToOwned::to_owned);
				let status = self.status_policy.resolve(&raw);

				Ok(IssuedPrescription { prescription_id, status, raw })
			},
			PrescribeOutcome::Unauthorized { body } =>
				Err(Error::UpstreamPrescription { status: StatusCode::UNAUTHORIZED.as_u16(), body }),
			PrescribeOutcome::Rejected { status, body } =>
				Err(Error::UpstreamPrescription { status, body }),
		}
	}
}
impl Debug for PrescriptionIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PrescriptionIssuer")
			.field("manager", &self.manager)
			.field("status_policy", &self.status_policy)
			.finish()
	}
}
