//! Canned upstream payloads used when mock mode bypasses SignatureRx entirely.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
// self
use crate::{_prelude::*, error::ConfigError};

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of tokens minted in mock mode.
pub const MOCK_TOKEN_LIFETIME: Duration = Duration::days(15);
/// Signing key used when no mock secret is configured.
pub const DEFAULT_MOCK_SECRET: &str = "mock-secret-key-for-development";
/// Prescription id carried by the canned draft prescription.
pub const MOCK_PRESCRIPTION_ID: &str = "SRXC49F3D4F66A7";

#[derive(Serialize)]
struct Claims {
	sub: String,
	iat: i64,
	exp: i64,
	jti: String,
}

/// Mints an HS256-signed, JWT-shaped access token issued at `now`.
///
/// `sub` and `jti` are random so consecutive tokens never collide.
pub fn mint_access_token(secret: &str, now: OffsetDateTime) -> Result<String, ConfigError> {
	let header = serde_json::json!({ "alg": "HS256", "typ": "JWT" });
	let claims = Claims {
		sub: hex::encode(rand::random::<[u8; 16]>()),
		iat: now.unix_timestamp(),
		exp: (now + MOCK_TOKEN_LIFETIME).unix_timestamp(),
		jti: hex::encode(rand::random::<[u8; 16]>()),
	};
	let encoded_header = URL_SAFE_NO_PAD.encode(header.to_string());
	let encoded_claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).map_err(|_| {
		ConfigError::InvalidValue { key: "SIGNATURERX_MOCK_JWT_SECRET", value: "<claims>".into() }
	})?);
	let signing_input = format!("{encoded_header}.{encoded_claims}");
	let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| {
		ConfigError::InvalidValue { key: "SIGNATURERX_MOCK_JWT_SECRET", value: "<redacted>".into() }
	})?;

	mac.update(signing_input.as_bytes());

	let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

	Ok(format!("{signing_input}.{signature}"))
}

/// Draft prescription returned by the prescribing API in mock mode.
pub fn draft_prescription() -> serde_json::Value {
	serde_json::json!({
		"action": "draft",
		"contact_id": 0,
		"aff_tag": "string",
		"secure_pin": "pa$$word",
		"integration_code": "pa$$word",
		"notify": true,
		"send_sms": true,
		"invoice_clinic": true,
		"delivery_address": {
			"address_ln1": "string",
			"address_ln2": "string",
			"city": "string",
			"post_code": "string",
			"country": "United Kingdom"
		},
		"prescription_id": MOCK_PRESCRIPTION_ID,
		"patient": {
			"first_name": "string",
			"last_name": "string",
			"gender": "string",
			"email": "string",
			"phone": "441234567890",
			"birth_day": "10",
			"birth_month": "01",
			"birth_year": "1990",
			"address_ln1": "string",
			"address_ln2": "string",
			"city": "string",
			"post_code": "string",
			"country": "string",
			"client_ref_id": "string",
			"appointment_id": "string",
			"site": "string",
			"location_id": "string",
			"nhs_number": "9434765919"
		},
		"notes": "string",
		"client_ref_id": "string",
		"medicines": [{
			"object": "medicine",
			"id": 0,
			"VPID": "string",
			"APID": "string",
			"VPPID": "string",
			"APPID": "string",
			"description": "string",
			"qty": "string",
			"directions": "string"
		}],
		"prescriber_ip": "192.168.0.1"
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn minted_token_is_jwt_shaped_and_verifiable() {
		let now = OffsetDateTime::now_utc();
		let token = mint_access_token(DEFAULT_MOCK_SECRET, now).expect("Mock token should mint.");
		let parts = token.split('.').collect::<Vec<_>>();

		assert_eq!(parts.len(), 3);

		let claims: serde_json::Value = serde_json::from_slice(
			&URL_SAFE_NO_PAD.decode(parts[1]).expect("Claims should be base64url."),
		)
		.expect("Claims should be JSON.");

		assert_eq!(claims["exp"].as_i64(), Some((now + MOCK_TOKEN_LIFETIME).unix_timestamp()));
		assert_eq!(claims["sub"].as_str().map(str::len), Some(32));

		let mut mac = HmacSha256::new_from_slice(DEFAULT_MOCK_SECRET.as_bytes())
			.expect("HMAC accepts any key length.");

		mac.update(format!("{}.{}", parts[0], parts[1]).as_bytes());
		mac.verify_slice(&URL_SAFE_NO_PAD.decode(parts[2]).expect("Signature should be base64url."))
			.expect("Signature should verify with the signing key.");
	}

	#[test]
	fn consecutive_tokens_differ() {
		let now = OffsetDateTime::now_utc();

		assert_ne!(
			mint_access_token(DEFAULT_MOCK_SECRET, now).expect("First token should mint."),
			mint_access_token(DEFAULT_MOCK_SECRET, now).expect("Second token should mint."),
		);
	}

	#[test]
	fn draft_prescription_carries_fixed_id() {
		assert_eq!(draft_prescription()["prescription_id"], MOCK_PRESCRIPTION_ID);
	}
}
