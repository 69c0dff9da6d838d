//! Route handlers mounted under `/api`.

// crates.io
use axum::{
	Json, Router,
	body::Bytes,
	extract::{Path, State},
	http::HeaderMap,
	routing::{get, post},
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
// self
use crate::{
	_prelude::*,
	api::{ApiError, SharedState},
	auth::TokenStatusReport,
	catalog,
	model::{CreatePrescriptionRequest, PrescriptionResponse},
	records::{NewPrescription, StoredPrescription},
	webhook::SIGNATURE_HEADER,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Routes relative to `/api`.
pub fn api_router(state: SharedState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/medications", get(medications))
		.route("/prescriptions", get(list_prescriptions))
		.route("/prescriptions/issue", post(issue_prescription))
		.route("/prescriptions/{id}", get(get_prescription))
		.route("/webhooks/signaturerx", post(signaturerx_webhook))
		.route("/token/status", get(token_status))
		.with_state(state)
}

async fn health() -> Json<Value> {
	let timestamp = OffsetDateTime::now_utc()
		.format(&time::format_description::well_known::Rfc3339)
		.unwrap_or_default();

	Json(json!({ "status": "ok", "timestamp": timestamp }))
}

async fn medications() -> Json<Value> {
	let meds = catalog::medications();

	Json(json!({ "total": meds.len(), "meds": meds }))
}

/// POST /api/prescriptions/issue: issue upstream, then persist the accepted prescription.
async fn issue_prescription(
	State(state): State<SharedState>,
	body: Bytes,
) -> ApiResult<PrescriptionResponse> {
	let request: CreatePrescriptionRequest = decode(&body)?;

	request.validate()?;

	let issued = state.issuer.issue(&request).await?;
	let row = state
		.repository
		.create(NewPrescription::from_issue(&request, &issued)?)
		.await
		.map_err(Error::from)?;

	Ok(Json(row.to_response()))
}

async fn list_prescriptions(State(state): State<SharedState>) -> ApiResult<Value> {
	let prescriptions = state.repository.list().await.map_err(Error::from)?;

	Ok(Json(json!({ "total": prescriptions.len(), "prescriptions": prescriptions })))
}

async fn get_prescription(
	State(state): State<SharedState>,
	Path(id): Path<String>,
) -> ApiResult<StoredPrescription> {
	state.repository.get(&id).await.map_err(Error::from)?.map(Json).ok_or(ApiError::NotFound)
}

/// POST /api/webhooks/signaturerx: the signature covers the raw body, so it is read as bytes.
async fn signaturerx_webhook(
	State(state): State<SharedState>,
	headers: HeaderMap,
	body: Bytes,
) -> ApiResult<Value> {
	let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());

	state.webhooks.handle(signature, &body).await?;

	Ok(Json(json!({ "received": true, "message": "Webhook event processed successfully" })))
}

async fn token_status(State(state): State<SharedState>) -> ApiResult<TokenStatusReport> {
	Ok(Json(state.issuer.token_manager().get_token_status().await?))
}

fn decode<T>(body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|e| Error::InvalidPayload { reason: e.to_string() })
}
