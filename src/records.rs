//! Persistence collaborator for prescriptions and webhook events.
//!
//! The gateway only needs a row-oriented contract here; [`MemoryRepository`] backs it in-process.

pub mod memory;

pub use memory::MemoryRepository;

// self
use crate::{
	_prelude::*,
	model::{CreatePrescriptionRequest, PrescriptionResponse},
	prescribing::IssuedPrescription,
};

/// Boxed future returned by [`PrescriptionRepository`] operations.
pub type RepositoryFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + 'a + Send>>;

/// Storage contract for prescription and webhook-event rows.
pub trait PrescriptionRepository
where
	Self: Send + Sync,
{
	/// Inserts a prescription row and returns it with generated id and timestamps.
	fn create(&self, prescription: NewPrescription) -> RepositoryFuture<'_, StoredPrescription>;

	/// Lists every prescription, newest first.
	fn list(&self) -> RepositoryFuture<'_, Vec<StoredPrescription>>;

	/// Fetches a prescription by local id.
	fn get<'a>(&'a self, id: &'a str) -> RepositoryFuture<'a, Option<StoredPrescription>>;

	/// Sets the status of every prescription carrying `external_id`.
	///
	/// Returns the number of affected rows; zero is not an error.
	fn update_status<'a>(
		&'a self,
		external_id: &'a str,
		status: &'a str,
	) -> RepositoryFuture<'a, u64>;

	/// Appends a webhook event row.
	fn record_webhook_event(
		&self,
		event: NewWebhookEvent,
	) -> RepositoryFuture<'_, WebhookEventRecord>;

	/// Lists webhook events received for `external_id`, oldest first.
	fn webhook_events<'a>(
		&'a self,
		external_id: &'a str,
	) -> RepositoryFuture<'a, Vec<WebhookEventRecord>>;
}

/// Error type produced by [`PrescriptionRepository`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RepositoryError {
	/// Backend-level failure for the storage engine.
	#[error("Repository backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Prescription row to insert.
#[derive(Clone, Debug, PartialEq)]
pub struct NewPrescription {
	/// SignatureRx prescription id, when the upstream returned one.
	pub signaturerx_prescription_id: Option<String>,
	#[allow(missing_docs)]
	pub patient_email: String,
	#[allow(missing_docs)]
	pub patient_name: String,
	#[allow(missing_docs)]
	pub status: String,
	/// Medicine lines, JSON-encoded.
	pub medicines: String,
	/// Full request payload.
	pub payload: serde_json::Value,
}
impl NewPrescription {
	/// Builds the row recorded after a successful issue.
	pub fn from_issue(
		request: &CreatePrescriptionRequest,
		issued: &IssuedPrescription,
	) -> Result<Self> {
		let encode = |e: serde_json::Error| Error::InvalidPayload { reason: e.to_string() };

		Ok(Self {
			signaturerx_prescription_id: issued.prescription_id.clone(),
			patient_email: request.patient.email.clone(),
			patient_name: request.patient.full_name(),
			status: issued.status.clone(),
			medicines: serde_json::to_string(&request.medicines).map_err(encode)?,
			payload: serde_json::to_value(request).map_err(encode)?,
		})
	}
}

/// Persisted prescription row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredPrescription {
	/// Local id.
	pub id: String,
	/// SignatureRx prescription id.
	pub signaturerx_prescription_id: Option<String>,
	#[allow(missing_docs)]
	pub patient_email: String,
	#[allow(missing_docs)]
	pub patient_name: String,
	#[allow(missing_docs)]
	pub status: String,
	/// Medicine lines, JSON-encoded.
	pub medicines: String,
	#[allow(missing_docs)]
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[allow(missing_docs)]
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
	/// Full request payload; not exposed over the API.
	#[serde(skip)]
	pub payload: serde_json::Value,
}
impl StoredPrescription {
	/// Response body returned after issuing.
	pub fn to_response(&self) -> PrescriptionResponse {
		PrescriptionResponse {
			id: self.id.clone(),
			status: self.status.clone(),
			prescription_id: self.signaturerx_prescription_id.clone(),
			message: None,
			created_at: self.created_at,
		}
	}
}

/// Webhook event row to insert.
#[derive(Clone, Debug, PartialEq)]
pub struct NewWebhookEvent {
	/// Upstream event type label.
	pub event_type: String,
	/// SignatureRx prescription id the event refers to.
	pub external_id: String,
	/// Status carried by the event.
	pub status: String,
	/// Full event body.
	pub payload: serde_json::Value,
}

/// Persisted webhook event row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WebhookEventRecord {
	/// Local id.
	pub id: String,
	#[allow(missing_docs)]
	pub event_type: String,
	#[allow(missing_docs)]
	pub external_id: String,
	#[allow(missing_docs)]
	pub status: String,
	#[allow(missing_docs)]
	pub payload: serde_json::Value,
	#[allow(missing_docs)]
	#[serde(with = "time::serde::rfc3339")]
	pub received_at: OffsetDateTime,
}
