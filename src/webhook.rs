//! Signed webhook intake mapping SignatureRx status events onto stored prescriptions.
//!
//! Every event is authenticated with HMAC-SHA256 over the exact request body, keyed by the shared
//! signing secret and sent as a hex digest in [`SIGNATURE_HEADER`]. One wire format is accepted per
//! deployment (see [`WebhookFormat`]); both normalize to an optional [`StatusUpdate`].

// crates.io
use hmac::{Hmac, Mac};
use sha2::Sha256;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	flows,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	records::{NewWebhookEvent, PrescriptionRepository},
};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 signature of the raw body.
pub const SIGNATURE_HEADER: &str = "signaturerx-signature";

/// Computes the hex signature SignatureRx sends for `body`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
	let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| Error::SignatureMismatch)?;

	mac.update(body);

	Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies `signature` (hex) against `body` in constant time.
///
/// An empty secret rejects every payload.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<()> {
	if secret.is_empty() {
		return Err(Error::SignatureMismatch);
	}

	let expected = hex::decode(signature.trim()).map_err(|_| Error::SignatureMismatch)?;
	let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| Error::SignatureMismatch)?;

	mac.update(body);
	mac.verify_slice(&expected).map_err(|_| Error::SignatureMismatch)
}

/// Webhook wire format accepted by a deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WebhookFormat {
	/// `{event_type, prescription_id, status}`.
	Flat,
	/// `{type, data: {prescription_token, status | order_status}}`.
	#[default]
	Enveloped,
}
impl FromStr for WebhookFormat {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"flat" => Ok(Self::Flat),
			"enveloped" => Ok(Self::Enveloped),
			_ => Err(()),
		}
	}
}

/// Flat event shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FlatEvent {
	#[allow(missing_docs)]
	#[serde(default)]
	pub event_type: String,
	#[allow(missing_docs)]
	#[serde(default)]
	pub prescription_id: Option<String>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub status: Option<String>,
}

/// Enveloped event shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct EnvelopedEvent {
	#[allow(missing_docs)]
	#[serde(default, rename = "type")]
	pub kind: String,
	#[allow(missing_docs)]
	#[serde(default)]
	pub data: EnvelopeData,
}

/// Payload of an [`EnvelopedEvent`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct EnvelopeData {
	/// SignatureRx prescription id.
	#[serde(default)]
	pub prescription_token: Option<String>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub status: Option<String>,
	/// Used when `status` is absent.
	#[serde(default)]
	pub order_status: Option<String>,
}

/// Inbound event, tagged by the deployment's wire format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
	#[allow(missing_docs)]
	Flat(FlatEvent),
	#[allow(missing_docs)]
	Enveloped(EnvelopedEvent),
}
impl WebhookEvent {
	/// Decodes `value` using `format`.
	pub fn decode(format: WebhookFormat, value: serde_json::Value) -> Result<Self> {
		let invalid = |e: serde_json::Error| Error::InvalidPayload { reason: e.to_string() };

		Ok(match format {
			WebhookFormat::Flat => Self::Flat(serde_json::from_value(value).map_err(invalid)?),
			WebhookFormat::Enveloped =>
				Self::Enveloped(serde_json::from_value(value).map_err(invalid)?),
		})
	}

	/// Upstream event type label.
	pub fn event_type(&self) -> &str {
		match self {
			Self::Flat(event) => &event.event_type,
			Self::Enveloped(event) => &event.kind,
		}
	}

	/// Extracts `(external_id, status)`; `None` when either is missing or empty.
	pub fn status_update(&self) -> Option<StatusUpdate> {
		let (external_id, status) = match self {
			Self::Flat(event) => (event.prescription_id.as_deref(), event.status.as_deref()),
			Self::Enveloped(event) => (
				event.data.prescription_token.as_deref(),
				non_empty(event.data.status.as_deref()).or(event.data.order_status.as_deref()),
			),
		};

		Some(StatusUpdate {
			external_id: non_empty(external_id)?.to_owned(),
			status: non_empty(status)?.to_owned(),
		})
	}
}

fn non_empty(value: Option<&str>) -> Option<&str> {
	value.filter(|value| !value.trim().is_empty())
}

/// Normalized status change carried by a webhook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusUpdate {
	/// SignatureRx prescription id.
	pub external_id: String,
	/// New status.
	pub status: String,
}

/// Result of handling one webhook.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WebhookReceipt {
	/// Extracted update, if any.
	pub update: Option<StatusUpdate>,
	/// Prescription rows whose status changed.
	pub rows_updated: u64,
}

/// Verifies, decodes, and applies inbound webhook events.
#[derive(Clone)]
pub struct WebhookHandler {
	repository: Arc<dyn PrescriptionRepository>,
	secret: TokenSecret,
	format: WebhookFormat,
}
impl WebhookHandler {
	/// Creates a handler; an empty `secret` rejects every event.
	pub fn new(
		repository: Arc<dyn PrescriptionRepository>,
		secret: impl Into<String>,
		format: WebhookFormat,
	) -> Self {
		Self { repository, secret: TokenSecret::new(secret), format }
	}

	/// Verifies `signature` over `body`, then applies the event.
	pub async fn handle(&self, signature: Option<&str>, body: &[u8]) -> Result<WebhookReceipt> {
		const KIND: FlowKind = FlowKind::Webhook;

		let span = FlowSpan::new(KIND, "handle");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				if self.secret.expose().is_empty() {
					tracing::warn!("Webhook signing secret is not configured; rejecting event.");

					return Err(Error::SignatureMismatch);
				}

				let Some(signature) = signature else {
					tracing::warn!("Webhook arrived without a signature.");

					return Err(Error::SignatureMismatch);
				};

				verify_signature(self.secret.expose(), body, signature).inspect_err(|_| {
					tracing::warn!("Webhook signature mismatch.");
				})?;

				let value: serde_json::Value = serde_json::from_slice(body)
					.map_err(|e| Error::InvalidPayload { reason: e.to_string() })?;
				let event = WebhookEvent::decode(self.format, value.clone())?;

				self.apply(event, value).await
			})
			.await;

		flows::record_outcome(KIND, &result);

		result
	}

	/// Applies an already-authenticated event.
	///
	/// Events without an `(id, status)` pair are acknowledged without any write; unknown
	/// prescription ids update zero rows.
	pub async fn apply(
		&self,
		event: WebhookEvent,
		payload: serde_json::Value,
	) -> Result<WebhookReceipt> {
		let Some(update) = event.status_update() else {
			tracing::info!(event_type = event.event_type(), "Webhook carries no status update.");

			return Ok(WebhookReceipt::default());
		};

		self.repository
			.record_webhook_event(NewWebhookEvent {
				event_type: event.event_type().to_owned(),
				external_id: update.external_id.clone(),
				status: update.status.clone(),
				payload,
			})
			.await?;

		let rows_updated =
			self.repository.update_status(&update.external_id, &update.status).await?;

		tracing::info!(
			external_id = %update.external_id,
			status = %update.status,
			rows_updated,
			"Webhook status update applied."
		);

		Ok(WebhookReceipt { update: Some(update), rows_updated })
	}
}
impl Debug for WebhookHandler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("WebhookHandler")
			.field("format", &self.format)
			.field("secret_set", &!self.secret.expose().is_empty())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::records::{MemoryRepository, NewPrescription};

	const SECRET: &str = "whsec_test";

	fn handler(repo: &MemoryRepository, format: WebhookFormat) -> WebhookHandler {
		WebhookHandler::new(Arc::new(repo.clone()), SECRET, format)
	}

	async fn seed(repo: &MemoryRepository, external_id: &str) -> String {
		repo.create(NewPrescription {
			signaturerx_prescription_id: Some(external_id.into()),
			patient_email: "ada@example.com".into(),
			patient_name: "Ada Lovelace".into(),
			status: "Sent".into(),
			medicines: "[]".into(),
			payload: serde_json::Value::Null,
		})
		.await
		.expect("Seeding should succeed.")
		.id
	}

	fn signed(body: &serde_json::Value) -> (Vec<u8>, String) {
		let bytes = serde_json::to_vec(body).expect("Body should serialize.");
		let signature = sign(SECRET, &bytes).expect("Signing should succeed.");

		(bytes, signature)
	}

	#[tokio::test]
	async fn enveloped_event_updates_status() {
		let repo = MemoryRepository::default();
		let id = seed(&repo, "SRX-1").await;
		let (body, signature) = signed(&serde_json::json!({
			"type": "prescription.updated",
			"data": { "prescription_token": "SRX-1", "status": "Dispensed" }
		}));
		let receipt = handler(&repo, WebhookFormat::Enveloped)
			.handle(Some(&signature), &body)
			.await
			.expect("Signed event should be accepted.");

		assert_eq!(receipt.rows_updated, 1);

		let row = repo.get(&id).await.expect("Get should succeed.").expect("Row should exist.");

		assert_eq!(row.status, "Dispensed");
		assert_eq!(repo.webhook_events("SRX-1").await.expect("List should succeed.").len(), 1);
	}

	#[tokio::test]
	async fn order_status_is_used_when_status_is_missing() {
		let repo = MemoryRepository::default();

		seed(&repo, "SRX-1").await;

		let (body, signature) = signed(&serde_json::json!({
			"type": "order.updated",
			"data": { "prescription_token": "SRX-1", "order_status": "Shipped" }
		}));
		let receipt = handler(&repo, WebhookFormat::Enveloped)
			.handle(Some(&signature), &body)
			.await
			.expect("Signed event should be accepted.");

		assert_eq!(receipt.update.map(|update| update.status).as_deref(), Some("Shipped"));
	}

	#[tokio::test]
	async fn flat_event_for_unknown_prescription_is_not_an_error() {
		let repo = MemoryRepository::default();
		let (body, signature) = signed(&serde_json::json!({
			"event_type": "prescription.updated",
			"prescription_id": "SRX-404",
			"status": "Dispensed"
		}));
		let receipt = handler(&repo, WebhookFormat::Flat)
			.handle(Some(&signature), &body)
			.await
			.expect("Unknown ids should not fail.");

		assert_eq!(receipt.rows_updated, 0);
	}

	#[tokio::test]
	async fn missing_fields_are_a_noop_without_writes() {
		let repo = MemoryRepository::default();

		seed(&repo, "SRX-1").await;

		for body in [
			serde_json::json!({ "type": "prescription.updated", "data": { "prescription_token": "SRX-1" } }),
			serde_json::json!({ "type": "prescription.updated", "data": { "status": "Dispensed" } }),
			serde_json::json!({ "type": "ping" }),
		] {
			let (bytes, signature) = signed(&body);
			let receipt = handler(&repo, WebhookFormat::Enveloped)
				.handle(Some(&signature), &bytes)
				.await
				.expect("Incomplete events should not fail.");

			assert_eq!(receipt, WebhookReceipt::default());
		}

		assert!(repo.webhook_events("SRX-1").await.expect("List should succeed.").is_empty());
		assert_eq!(repo.list().await.expect("List should succeed.")[0].status, "Sent");
	}

	#[tokio::test]
	async fn tampered_body_is_rejected() {
		let repo = MemoryRepository::default();
		let (_, signature) = signed(&serde_json::json!({ "type": "a" }));
		let err = handler(&repo, WebhookFormat::Enveloped)
			.handle(Some(&signature), b"{\"type\":\"b\"}")
			.await
			.expect_err("Tampered body should be rejected.");

		assert!(matches!(err, Error::SignatureMismatch));
	}

	#[tokio::test]
	async fn missing_signature_or_secret_is_rejected() {
		let repo = MemoryRepository::default();
		let (body, signature) = signed(&serde_json::json!({ "type": "a" }));

		assert!(matches!(
			handler(&repo, WebhookFormat::Enveloped).handle(None, &body).await,
			Err(Error::SignatureMismatch)
		));
		assert!(matches!(
			WebhookHandler::new(Arc::new(repo.clone()), "", WebhookFormat::Enveloped)
				.handle(Some(&signature), &body)
				.await,
			Err(Error::SignatureMismatch)
		));
	}

	#[test]
	fn non_hex_signatures_are_mismatches() {
		assert!(matches!(
			verify_signature(SECRET, b"{}", "not-hex"),
			Err(Error::SignatureMismatch)
		));
	}

	#[test]
	fn signature_round_trips_in_upper_case_hex() {
		let signature = sign(SECRET, b"{}").expect("Signing should succeed.");

		verify_signature(SECRET, b"{}", &signature.to_uppercase())
			.expect("Hex decoding should be case-insensitive.");
	}
}
