//! REST surface: axum router, shared state, and the HTTP mapping of gateway errors.
//!
//! Routes live under `/api`; see [`routes`] for the handlers. Upstream bodies carried by errors are
//! logged, never echoed to the caller.

pub mod routes;

// crates.io
use axum::{
	Json, Router,
	http::StatusCode,
	response::{IntoResponse, Response},
};
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
// self
use crate::{
	_prelude::*, prescribing::PrescriptionIssuer, records::PrescriptionRepository,
	webhook::WebhookHandler,
};

/// Collaborators shared by every handler.
pub struct AppState {
	/// Prescription issuer (and, through it, the token manager).
	pub issuer: PrescriptionIssuer,
	/// Prescription and webhook-event rows.
	pub repository: Arc<dyn PrescriptionRepository>,
	/// Signed webhook intake.
	pub webhooks: WebhookHandler,
}
impl Debug for AppState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppState")
			.field("issuer", &self.issuer)
			.field("webhooks", &self.webhooks)
			.finish_non_exhaustive()
	}
}

/// Reference-counted handle to [`AppState`].
pub type SharedState = Arc<AppState>;

/// Builds the gateway router with permissive CORS and request tracing.
pub fn router(state: SharedState) -> Router {
	let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

	Router::new()
		.nest("/api", routes::api_router(state))
		.layer(cors)
		.layer(TraceLayer::new_for_http())
}

/// Handler error rendered as `{"error": ...}`.
#[derive(Debug)]
pub enum ApiError {
	/// Requested prescription does not exist.
	NotFound,
	/// Any gateway failure.
	Gateway(Error),
}
impl From<Error> for ApiError {
	fn from(e: Error) -> Self {
		Self::Gateway(e)
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (status, message) = match self {
			Self::NotFound => (StatusCode::NOT_FOUND, "Prescription not found".to_owned()),
			Self::Gateway(e) if e.is_authentication_failure() => {
				tracing::error!(error = %e, "SignatureRx authentication failed.");

				(StatusCode::UNAUTHORIZED, "Authentication failed with SignatureRx".to_owned())
			},
			Self::Gateway(e @ (Error::SignatureMismatch | Error::InvalidPayload { .. })) => {
				tracing::warn!(error = %e, "Rejected invalid request.");

				(StatusCode::BAD_REQUEST, e.to_string())
			},
			Self::Gateway(e) => {
				tracing::error!(error = %e, "Request failed.");

				(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_owned())
			},
		};

		(status, Json(serde_json::json!({ "error": message }))).into_response()
	}
}
