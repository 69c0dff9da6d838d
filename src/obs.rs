//! Observability helpers for token and prescription flows.
//!
//! # Feature Flags
//!
//! - Spans named `signaturerx.flow` carry the `flow` and `stage` (call site) fields.
//! - Enable `metrics` to increment the `signaturerx_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;

// crates.io
use tracing_subscriber::EnvFilter;
// self
use crate::_prelude::*;

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "signaturerx_broker=info,tower_http=info";

/// Gateway flow kinds observed by the instrumentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Client-credentials fetch.
	Fetch,
	/// Refresh-token grant.
	Refresh,
	/// Prescription submission, including the single 401 retry.
	Prescribe,
	/// Inbound webhook handling.
	Webhook,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Fetch => "fetch",
			FlowKind::Refresh => "refresh",
			FlowKind::Prescribe => "prescribe",
			FlowKind::Webhook => "webhook",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Installs the global `fmt` subscriber, honoring `RUST_LOG` and falling back to
/// [`DEFAULT_LOG_FILTER`].
///
/// Returns `false` when a global subscriber was already installed.
pub fn install_subscriber() -> bool {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

	tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}
