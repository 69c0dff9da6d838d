//! OAuth token endpoint contract plus the reqwest and mock-mode implementations.
//!
//! The SignatureRx token endpoint accepts a JSON body carrying the grant, the client credentials
//! and (for the refresh grant) the refresh token. Non-2xx bodies are surfaced verbatim so operators
//! can see exactly what the upstream objected to.

// crates.io
use reqwest::header::ACCEPT;
// self
use crate::{
	_prelude::*,
	auth::{SAFETY_MARGIN, TokenRecord, TokenSecret},
	error::UpstreamAuthError,
	http::UpstreamResponse,
	mock,
};

/// Boxed future returned by [`TokenEndpoint::request_token`].
pub type EndpointFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenEndpointResponse>> + 'a + Send>>;

/// Upstream OAuth endpoint contract.
pub trait TokenEndpoint
where
	Self: Send + Sync,
{
	/// Performs a single grant request.
	fn request_token<'a>(
		&'a self,
		credentials: &'a ClientCredentials,
		grant: TokenGrant<'a>,
	) -> EndpointFuture<'a>;
}

/// Grant requested from the token endpoint.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TokenGrant<'a> {
	/// Client-credentials grant.
	ClientCredentials,
	/// Refresh-token grant.
	RefreshToken {
		/// Previously issued refresh credential.
		refresh_token: &'a str,
	},
}
impl TokenGrant<'_> {
	/// Returns the `grant_type` value sent upstream.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::ClientCredentials => "client_credentials",
			Self::RefreshToken { .. } => "refresh_token",
		}
	}
}
impl Debug for TokenGrant<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Client id and secret sent with every grant.
#[derive(Clone, Debug, Default)]
pub struct ClientCredentials {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
}
impl ClientCredentials {
	/// Creates a credential pair.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self { client_id: client_id.into(), client_secret: TokenSecret::new(client_secret) }
	}

	/// Returns `true` when both halves are non-empty.
	pub fn is_complete(&self) -> bool {
		!self.client_id.is_empty() && !self.client_secret.expose().is_empty()
	}
}

/// Successful token endpoint payload.
#[derive(Clone, Deserialize)]
pub struct TokenEndpointResponse {
	/// Issued bearer credential.
	pub access_token: String,
	/// Issued refresh credential, if any.
	#[serde(default)]
	pub refresh_token: Option<String>,
	/// Nominal lifetime in seconds.
	pub expires_in: i64,
	/// Token type; SignatureRx reports `bearer`.
	#[serde(default)]
	pub token_type: Option<String>,
}
impl TokenEndpointResponse {
	/// Converts the payload into a [`TokenRecord`] issued at `issued_at`.
	///
	/// `previous_refresh` is kept when the response carries no refresh token. Lifetimes that do
	/// not outlast [`SAFETY_MARGIN`] are rejected, since the record would already be expired.
	pub fn into_record(
		self,
		issued_at: OffsetDateTime,
		previous_refresh: Option<TokenSecret>,
	) -> Result<TokenRecord, UpstreamAuthError> {
		if self.expires_in <= SAFETY_MARGIN.whole_seconds() {
			return Err(UpstreamAuthError::LifetimeTooShort { expires_in: self.expires_in });
		}

		let refresh = self.refresh_token.map(TokenSecret::new).or(previous_refresh);

		TokenRecord::builder()
			.access_token(self.access_token)
			.maybe_refresh_token(refresh)
			.issued_at(issued_at)
			.expires_in(Duration::seconds(self.expires_in))
			.build()
			.map_err(|_| UpstreamAuthError::LifetimeOutOfRange { expires_in: self.expires_in })
	}
}
impl Debug for TokenEndpointResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEndpointResponse")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.field("token_type", &self.token_type)
			.finish()
	}
}

/// Encoding used for token request bodies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TokenRequestFormat {
	/// `application/json` body.
	#[default]
	Json,
	/// `application/x-www-form-urlencoded` body.
	Form,
}
impl FromStr for TokenRequestFormat {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"json" => Ok(Self::Json),
			"form" => Ok(Self::Form),
			_ => Err(()),
		}
	}
}

/// Token endpoint reached over HTTP with reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestTokenEndpoint {
	client: ReqwestClient,
	token_url: Url,
	format: TokenRequestFormat,
}
impl ReqwestTokenEndpoint {
	/// Creates an endpoint posting to `token_url`.
	pub fn new(client: ReqwestClient, token_url: Url) -> Self {
		Self { client, token_url, format: TokenRequestFormat::default() }
	}

	/// Overrides the request body encoding.
	pub fn with_format(mut self, format: TokenRequestFormat) -> Self {
		self.format = format;

		self
	}

	async fn exchange(
		&self,
		credentials: &ClientCredentials,
		grant: TokenGrant<'_>,
	) -> Result<TokenEndpointResponse, UpstreamAuthError> {
		let mut body = BTreeMap::from([
			("grant_type", grant.as_str()),
			("client_id", credentials.client_id.as_str()),
			("client_secret", credentials.client_secret.expose()),
		]);

		if let TokenGrant::RefreshToken { refresh_token } = grant {
			body.insert("refresh_token", refresh_token);
		}

		let request = self.client.post(self.token_url.clone()).header(ACCEPT, "application/json");
		let request = match self.format {
			TokenRequestFormat::Json => request.json(&body),
			TokenRequestFormat::Form => request.form(&body),
		};
		let response = request.send().await.map_err(UpstreamAuthError::network)?;
		let response = UpstreamResponse::read(response).await.map_err(UpstreamAuthError::network)?;

		if !response.is_success() {
			return Err(UpstreamAuthError::TokenEndpoint {
				grant: grant.as_str(),
				status: response.status.as_u16(),
				body: response.text(),
			});
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&response.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| UpstreamAuthError::TokenResponseParse { grant: grant.as_str(), source })
	}
}
impl TokenEndpoint for ReqwestTokenEndpoint {
	fn request_token<'a>(
		&'a self,
		credentials: &'a ClientCredentials,
		grant: TokenGrant<'a>,
	) -> EndpointFuture<'a> {
		Box::pin(async move { self.exchange(credentials, grant).await.map_err(Error::from) })
	}
}

/// Token endpoint used in mock mode; mints signed JWT-shaped tokens locally.
#[derive(Clone, Debug)]
pub struct MockTokenEndpoint {
	secret: String,
}
impl MockTokenEndpoint {
	/// Creates a mock endpoint signing with `secret`.
	pub fn new(secret: impl Into<String>) -> Self {
		Self { secret: secret.into() }
	}
}
impl Default for MockTokenEndpoint {
	fn default() -> Self {
		Self::new(mock::DEFAULT_MOCK_SECRET)
	}
}
impl TokenEndpoint for MockTokenEndpoint {
	fn request_token<'a>(
		&'a self,
		_credentials: &'a ClientCredentials,
		_grant: TokenGrant<'a>,
	) -> EndpointFuture<'a> {
		Box::pin(async move {
			let access_token = mock::mint_access_token(&self.secret, OffsetDateTime::now_utc())?;

			Ok(TokenEndpointResponse {
				access_token,
				refresh_token: None,
				expires_in: mock::MOCK_TOKEN_LIFETIME.whole_seconds(),
				token_type: Some("bearer".into()),
			})
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn into_record_applies_margin_and_keeps_previous_refresh() {
		let issued_at = OffsetDateTime::now_utc();
		let response = TokenEndpointResponse {
			access_token: "tok1".into(),
			refresh_token: None,
			expires_in: 3_600,
			token_type: Some("bearer".into()),
		};
		let record = response
			.into_record(issued_at, Some(TokenSecret::new("refresh-1")))
			.expect("Response should convert into a record.");

		assert_eq!(record.expires_at, issued_at + Duration::seconds(3_540));
		assert_eq!(record.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-1"));
	}

	#[test]
	fn into_record_rejects_lifetimes_within_margin() {
		let response = TokenEndpointResponse {
			access_token: "tok1".into(),
			refresh_token: None,
			expires_in: 60,
			token_type: None,
		};
		let err = response
			.into_record(OffsetDateTime::now_utc(), None)
			.expect_err("A 60s lifetime should be rejected.");

		assert!(matches!(err, UpstreamAuthError::LifetimeTooShort { expires_in: 60 }));
	}

	#[test]
	fn into_record_rejects_lifetimes_past_the_calendar() {
		let response = TokenEndpointResponse {
			access_token: "tok1".into(),
			refresh_token: None,
			expires_in: 1_000_000_000_000,
			token_type: None,
		};
		let err = response
			.into_record(OffsetDateTime::now_utc(), None)
			.expect_err("A lifetime beyond year 9999 should be rejected.");

		assert!(matches!(
			err,
			UpstreamAuthError::LifetimeOutOfRange { expires_in: 1_000_000_000_000 }
		));
	}

	#[test]
	fn format_parses_case_insensitively() {
		assert_eq!("JSON".parse(), Ok(TokenRequestFormat::Json));
		assert_eq!(" form ".parse(), Ok(TokenRequestFormat::Form));
		assert_eq!("xml".parse::<TokenRequestFormat>(), Err(()));
	}

	#[test]
	fn response_debug_redacts_secrets() {
		let response = TokenEndpointResponse {
			access_token: "tok1".into(),
			refresh_token: Some("refresh-1".into()),
			expires_in: 3_600,
			token_type: None,
		};
		let rendered = format!("{response:?}");

		assert!(!rendered.contains("tok1"));
		assert!(!rendered.contains("refresh-1"));
	}

	#[tokio::test]
	async fn mock_endpoint_mints_fifteen_day_tokens() {
		let endpoint = MockTokenEndpoint::default();
		let response = endpoint
			.request_token(&ClientCredentials::default(), TokenGrant::ClientCredentials)
			.await
			.expect("Mock endpoint should always succeed.");

		assert_eq!(response.expires_in, 15 * 24 * 60 * 60);
		assert_eq!(response.access_token.split('.').count(), 3);
	}
}
