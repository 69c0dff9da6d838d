//! Transport primitives shared by the token endpoint and prescribing adapters.
//!
//! Both upstream adapters need the same two things from the HTTP stack: a client with a bounded
//! timeout (so a hung upstream turns into an ordinary failure) and a way to read a response
//! without losing the verbatim body of non-2xx answers.

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::{Response, StatusCode, redirect::Policy};
// self
use crate::{_prelude::*, error::ConfigError};

/// Default upstream timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Builds the shared reqwest client used for every upstream call.
///
/// Redirects are not followed; both the OAuth and prescribing endpoints answer directly.
pub fn build_client(timeout: StdDuration) -> Result<ReqwestClient, ConfigError> {
	ReqwestClient::builder()
		.timeout(timeout)
		.redirect(Policy::none())
		.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
		.build()
		.map_err(ConfigError::from)
}

/// Fully buffered upstream response.
#[derive(Clone, Debug)]
pub struct UpstreamResponse {
	/// HTTP status returned by the upstream.
	pub status: StatusCode,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl UpstreamResponse {
	/// Buffers `response` into memory.
	pub async fn read(response: Response) -> Result<Self, ReqwestError> {
		let status = response.status();
		let body = response.bytes().await?.to_vec();

		Ok(Self { status, body })
	}

	/// Body decoded lossily as UTF-8, used when surfacing verbatim error bodies.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Returns `true` for 2xx responses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}
}
