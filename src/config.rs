//! Environment-driven gateway configuration.
//!
//! Every setting has a default so a bare environment boots a working (if unauthenticated) gateway.
//! Missing credentials are tolerated here and reported when the first token is requested;
//! malformed numbers, URLs, and enum values fail fast with [`ConfigError`].

// std
use std::{path::PathBuf, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ConfigError,
	http,
	mock,
	oauth::{ClientCredentials, TokenRequestFormat},
	prescribing::StatusPolicy,
	refresher,
	webhook::WebhookFormat,
};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_BASE_URL: &str = "https://app.signaturerx.co.uk";
const DEFAULT_PRESCRIPTION_PATH: &str = "ehr-prescription-patient";
const DEFAULT_STATUS: &str = "Sent";
const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Token store backend selected by `TOKEN_STORE`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StoreBackend {
	/// Process-local map.
	#[default]
	Memory,
	/// JSON file at the given path.
	File(PathBuf),
	/// Redis at `REDIS_URL`.
	Redis,
}
impl StoreBackend {
	/// Label used in logs and errors.
	pub fn label(&self) -> &'static str {
		match self {
			Self::Memory => "memory",
			Self::File(_) => "file",
			Self::Redis => "redis",
		}
	}
}
impl FromStr for StoreBackend {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();

		if let Some(path) = s.strip_prefix("file:") {
			let path = path.trim();

			return if path.is_empty() { Err(()) } else { Ok(Self::File(path.into())) };
		}

		match s.to_ascii_lowercase().as_str() {
			"memory" => Ok(Self::Memory),
			"redis" => Ok(Self::Redis),
			_ => Err(()),
		}
	}
}

/// Fully resolved gateway configuration.
#[derive(Clone, Debug)]
pub struct Config {
	/// Listen host.
	pub host: String,
	/// Listen port.
	pub port: u16,
	/// SignatureRx client credentials; may be empty.
	pub credentials: ClientCredentials,
	/// OAuth token endpoint.
	pub token_url: Url,
	/// Prescribing API root.
	pub api_url: Url,
	/// Prescribing endpoint (`api_url` joined with the prescription path).
	pub prescription_url: Url,
	/// Body encoding for token requests.
	pub token_request_format: TokenRequestFormat,
	/// Whether the upstream honors the refresh grant.
	pub supports_refresh_grant: bool,
	/// Serve canned upstream responses instead of calling SignatureRx.
	pub mock: bool,
	/// HS256 key for mock-mode tokens.
	pub mock_jwt_secret: TokenSecret,
	/// Upstream request timeout.
	pub http_timeout: StdDuration,
	/// How accepted prescriptions get their status.
	pub status_policy: StatusPolicy,
	/// HMAC key for inbound webhooks; empty rejects every webhook.
	pub webhook_signing_secret: TokenSecret,
	/// Webhook wire format accepted by this deployment.
	pub webhook_format: WebhookFormat,
	/// Background refresher tick period.
	pub token_check_interval: StdDuration,
	/// Token store backend.
	pub token_store: StoreBackend,
	/// Redis connection string, used with [`StoreBackend::Redis`].
	pub redis_url: String,
}
impl Config {
	/// Loads `.env` (if present) and then reads the process environment.
	pub fn load() -> Result<Self, ConfigError> {
		if let Err(e) = dotenvy::dotenv()
			&& !e.not_found()
		{
			tracing::warn!(error = %e, "Ignoring unreadable .env file.");
		}

		Self::from_env()
	}

	/// Reads the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Builds the configuration from an arbitrary variable lookup.
	///
	/// Blank values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
		let base_url = var("SIGNATURERX_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
		let base_url = base_url.trim_end_matches('/');
		let token_url = parse_url(
			"SIGNATURERX_TOKEN_URL",
			var("SIGNATURERX_TOKEN_URL").unwrap_or_else(|| format!("{base_url}/oauth/token")),
		)?;
		let api_url = parse_url(
			"SIGNATURERX_API_URL",
			var("SIGNATURERX_API_URL").unwrap_or_else(|| format!("{base_url}/api/v1")),
		)?;
		let prescription_path = var("SIGNATURERX_PRESCRIPTION_PATH")
			.unwrap_or_else(|| DEFAULT_PRESCRIPTION_PATH.into());
		let prescription_url = parse_url(
			"SIGNATURERX_PRESCRIPTION_PATH",
			format!(
				"{}/{}",
				api_url.as_str().trim_end_matches('/'),
				prescription_path.trim_start_matches('/')
			),
		)?;
		let default_status =
			var("SIGNATURERX_DEFAULT_STATUS").unwrap_or_else(|| DEFAULT_STATUS.into());
		let status_policy = match var("SIGNATURERX_STATUS_SOURCE").as_deref() {
			None => StatusPolicy::Upstream { fallback: default_status },
			Some(source) => match source.to_ascii_lowercase().as_str() {
				"upstream" => StatusPolicy::Upstream { fallback: default_status },
				"fixed" => StatusPolicy::Fixed(default_status),
				_ => return Err(invalid("SIGNATURERX_STATUS_SOURCE", source)),
			},
		};
		let token_check_minutes: u64 = parse_or(
			"TOKEN_CHECK_INTERVAL_MINUTES",
			var("TOKEN_CHECK_INTERVAL_MINUTES"),
			refresher::DEFAULT_INTERVAL.as_secs() / 60,
		)?;

		if token_check_minutes == 0 {
			return Err(invalid("TOKEN_CHECK_INTERVAL_MINUTES", "0"));
		}

		let http_timeout_secs: u64 = parse_or(
			"SIGNATURERX_HTTP_TIMEOUT_SECS",
			var("SIGNATURERX_HTTP_TIMEOUT_SECS"),
			http::DEFAULT_TIMEOUT.as_secs(),
		)?;

		if http_timeout_secs == 0 {
			return Err(invalid("SIGNATURERX_HTTP_TIMEOUT_SECS", "0"));
		}

		Ok(Self {
			host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.into()),
			port: parse_or("PORT", var("PORT"), DEFAULT_PORT)?,
			credentials: ClientCredentials::new(
				var("SIGNATURERX_CLIENT_ID").unwrap_or_default(),
				var("SIGNATURERX_CLIENT_SECRET").unwrap_or_default(),
			),
			token_url,
			api_url,
			prescription_url,
			token_request_format: parse_or(
				"SIGNATURERX_TOKEN_REQUEST_FORMAT",
				var("SIGNATURERX_TOKEN_REQUEST_FORMAT"),
				TokenRequestFormat::default(),
			)?,
			supports_refresh_grant: parse_flag(
				"SIGNATURERX_SUPPORTS_REFRESH_GRANT",
				var("SIGNATURERX_SUPPORTS_REFRESH_GRANT"),
			)?,
			mock: parse_flag("SIGNATURERX_MOCK", var("SIGNATURERX_MOCK"))?,
			mock_jwt_secret: TokenSecret::new(
				var("SIGNATURERX_MOCK_JWT_SECRET").unwrap_or_else(|| mock::DEFAULT_MOCK_SECRET.into()),
			),
			http_timeout: StdDuration::from_secs(http_timeout_secs),
			status_policy,
			webhook_signing_secret: TokenSecret::new(
				var("SIGNATURERX_WEBHOOK_SIGNING_SECRET").unwrap_or_default(),
			),
			webhook_format: parse_or(
				"SIGNATURERX_WEBHOOK_FORMAT",
				var("SIGNATURERX_WEBHOOK_FORMAT"),
				WebhookFormat::default(),
			)?,
			token_check_interval: StdDuration::from_secs(token_check_minutes * 60),
			token_store: parse_or("TOKEN_STORE", var("TOKEN_STORE"), StoreBackend::default())?,
			redis_url: var("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.into()),
		})
	}

	/// `host:port` the server binds to.
	pub fn listen_addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}

fn invalid(key: &'static str, value: impl Into<String>) -> ConfigError {
	ConfigError::InvalidValue { key, value: value.into() }
}

fn parse_url(key: &'static str, value: String) -> Result<Url, ConfigError> {
	Url::parse(&value).map_err(|source| ConfigError::InvalidUrl { key, source })
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
	T: FromStr,
{
	match value {
		Some(value) => value.parse().map_err(|_| invalid(key, value)),
		None => Ok(default),
	}
}

fn parse_flag(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
	match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
		None => Ok(false),
		Some("true" | "1" | "yes" | "on") => Ok(true),
		Some("false" | "0" | "no" | "off") => Ok(false),
		Some(_) => Err(invalid(key, value.unwrap_or_default())),
	}
}
