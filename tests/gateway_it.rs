// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use tower::ServiceExt;
// self
use signaturerx_broker::{
	api::{self, AppState},
	flows::TokenManager,
	mock::MOCK_PRESCRIPTION_ID,
	oauth::MockTokenEndpoint,
	prescribing::{MockPrescribingApi, PrescriptionIssuer},
	records::MemoryRepository,
	refresher::BackgroundRefresher,
	store::MemoryStore,
	webhook::{self, SIGNATURE_HEADER, WebhookFormat, WebhookHandler},
};

const SECRET: &str = "whsec_gateway";

fn mock_gateway(format: WebhookFormat) -> (Router, TokenManager) {
	let manager = TokenManager::new(
		Arc::new(MemoryStore::default()),
		Arc::new(MockTokenEndpoint::default()),
	);
	let repository = Arc::new(MemoryRepository::default());
	let state = Arc::new(AppState {
		issuer: PrescriptionIssuer::new(manager.clone(), Arc::new(MockPrescribingApi)),
		repository: repository.clone(),
		webhooks: WebhookHandler::new(repository, SECRET, format),
	});

	(api::router(state), manager)
}

async fn call(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
	let response = router.clone().oneshot(request).await.expect("Router should respond.");
	let status = response.status();
	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("Body should be readable.");

	(status, serde_json::from_slice(&bytes).expect("Body should be JSON."))
}

fn issue_body() -> Body {
	Body::from(
		serde_json::to_vec(&serde_json::json!({
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
		.expect("Issue body should serialize."),
	)
}

fn signed_webhook(payload: &serde_json::Value) -> Request<Body> {
	let bytes = serde_json::to_vec(payload).expect("Webhook payload should serialize.");
	let signature = webhook::sign(SECRET, &bytes).expect("Signing should succeed.");

	Request::post("/api/webhooks/signaturerx")
		.header("content-type", "application/json")
		.header(SIGNATURE_HEADER, signature)
		.body(Body::from(bytes))
		.expect("Webhook request should build.")
}

#[tokio::test]
async fn mock_mode_issue_then_webhook_updates_status() {
	let (router, _manager) = mock_gateway(WebhookFormat::Enveloped);
	let issue = Request::post("/api/prescriptions/issue")
		.header("content-type", "application/json")
		.body(issue_body())
		.expect("Issue request should build.");
	let (status, issued) = call(&router, issue).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(issued["prescription_id"], MOCK_PRESCRIPTION_ID);

	let (status, ack) = call(
		&router,
		signed_webhook(&serde_json::json!({
			"type": "prescription.dispensed",
			"data": { "prescription_token": MOCK_PRESCRIPTION_ID, "status": "Dispensed" }
		})),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(ack["received"], true);

	let id = issued["id"].as_str().expect("Issued id should be a string.");
	let (status, stored) = call(
		&router,
		Request::get(format!("/api/prescriptions/{id}"))
			.body(Body::empty())
			.expect("Get request should build."),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(stored["status"], "Dispensed");
}

#[tokio::test]
async fn flat_webhooks_for_unknown_prescriptions_are_acknowledged() {
	let (router, _manager) = mock_gateway(WebhookFormat::Flat);
	let (status, ack) = call(
		&router,
		signed_webhook(&serde_json::json!({
			"event_type": "prescription.updated",
			"prescription_id": "SRX-UNKNOWN",
			"status": "Cancelled"
		})),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(ack["message"], "Webhook event processed successfully");
}

#[tokio::test]
async fn unsigned_webhooks_are_rejected() {
	let (router, _manager) = mock_gateway(WebhookFormat::Enveloped);
	let request = Request::post("/api/webhooks/signaturerx")
		.header("content-type", "application/json")
		.body(Body::from("{\"type\":\"ping\"}"))
		.expect("Webhook request should build.");
	let (status, body) = call(&router, request).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["error"].is_string());
}

#[tokio::test]
async fn refresher_keeps_the_token_warm() {
	let (router, manager) = mock_gateway(WebhookFormat::Enveloped);
	let refresher = BackgroundRefresher::new(manager, StdDuration::from_millis(20));

	assert!(refresher.start());

	tokio::time::sleep(StdDuration::from_millis(70)).await;

	assert!(refresher.stop().await);

	let (status, report) = call(
		&router,
		Request::get("/api/token/status").body(Body::empty()).expect("Status request should build."),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(report["hasToken"], true);
	assert_eq!(report["isExpired"], false);
}
