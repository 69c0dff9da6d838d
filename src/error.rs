//! Gateway-level error types shared across the token manager, issuer, webhooks, and stores.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Persistence collaborator failure.
	#[error("{0}")]
	Repository(
		#[from]
		#[source]
		crate::records::RepositoryError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// OAuth fetch or refresh failed.
	#[error(transparent)]
	UpstreamAuth(#[from] UpstreamAuthError),
	/// Transport failure (DNS, TCP, TLS, timeout) outside the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Prescribing endpoint rejected the request with a non-401, non-2xx status.
	#[error("Prescribing endpoint returned HTTP {status}: {body}.")]
	UpstreamPrescription {
		/// HTTP status code returned by the prescribing endpoint.
		status: u16,
		/// Verbatim response body.
		body: String,
	},
	/// Prescribing endpoint answered 401 again after a forced token reset.
	#[error("Prescribing endpoint rejected a freshly issued token: {body}.")]
	AuthenticationRetryExhausted {
		/// Verbatim body of the second 401 response.
		body: String,
	},
	/// Webhook signature did not match the shared secret.
	#[error("Webhook signature does not match the payload.")]
	SignatureMismatch,
	/// Inbound payload could not be decoded.
	#[error("Payload is invalid: {reason}.")]
	InvalidPayload {
		/// Decoder-supplied reason string.
		reason: String,
	},
}
impl Error {
	/// Returns `true` for failures the HTTP layer surfaces as authentication errors.
	pub fn is_authentication_failure(&self) -> bool {
		matches!(self, Self::UpstreamAuth(_) | Self::AuthenticationRetryExhausted { .. })
	}
}

/// Configuration and validation failures raised while wiring the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A configured URL cannot be parsed.
	#[error("Configuration variable `{key}` is not a valid URL.")]
	InvalidUrl {
		/// Environment variable name.
		key: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A configured value is outside the accepted set.
	#[error("Configuration variable `{key}` has an invalid value `{value}`.")]
	InvalidValue {
		/// Environment variable name.
		key: &'static str,
		/// Offending value.
		value: String,
	},
	/// Client id or secret is empty; requests are still attempted.
	#[error("SignatureRx client credentials are not configured.")]
	MissingCredentials,
	/// The selected token store backend was not compiled in.
	#[error("Token store backend `{backend}` is not available in this build.")]
	UnsupportedStore {
		/// Backend label.
		backend: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// OAuth token endpoint failures (`UpstreamAuthError`).
#[derive(Debug, ThisError)]
pub enum UpstreamAuthError {
	/// Token endpoint answered with a non-2xx status.
	#[error("Token endpoint rejected the {grant} grant with HTTP {status}: {body}.")]
	TokenEndpoint {
		/// Grant label.
		grant: &'static str,
		/// HTTP status code.
		status: u16,
		/// Verbatim response body.
		body: String,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON for the {grant} grant.")]
	TokenResponseParse {
		/// Grant label.
		grant: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
	/// Issued token would already be expired once the safety margin is applied.
	#[error("Token endpoint issued a token living {expires_in}s, not longer than the safety margin.")]
	LifetimeTooShort {
		/// Lifetime reported by the endpoint, in seconds.
		expires_in: i64,
	},
	/// Issued lifetime pushes the expiry past the representable date range.
	#[error("Token endpoint issued a token living {expires_in}s, which is out of range.")]
	LifetimeOutOfRange {
		/// Lifetime reported by the endpoint, in seconds.
		expires_in: i64,
	},
	/// Refresh grant requested without a stored refresh credential.
	#[error("Cached token record is missing a refresh token.")]
	MissingRefreshToken,
	/// Network failure while calling the token endpoint.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl UpstreamAuthError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// HTTP status code, when the failure came from an HTTP response.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::TokenEndpoint { status, .. } => Some(*status),
			_ => None,
		}
	}
}

/// Transport-level failures (network, IO) while calling the prescribing endpoint.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the prescribing endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the prescribing endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
