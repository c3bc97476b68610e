//! Optional observability helpers for login flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_link.flow` with the `provider` and
//!   `stage` fields, plus a warning event for each failed stage.
//! - Enable `metrics` to increment the `oauth2_link_flow_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Login flow stages observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowStage {
	/// Authorization URL construction.
	Redirect,
	/// Code-for-token exchange.
	TokenExchange,
	/// Profile fetch with the cached token.
	ProfileFetch,
	/// Identity record upsert.
	Upsert,
	/// Whole callback handling.
	Callback,
}
impl FlowStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowStage::Redirect => "redirect",
			FlowStage::TokenExchange => "token_exchange",
			FlowStage::ProfileFetch => "profile_fetch",
			FlowStage::Upsert => "upsert",
			FlowStage::Callback => "callback",
		}
	}
}
impl Display for FlowStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow stage.
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

/// Runs `fut` inside a [`FlowSpan`] for `stage`, recording attempt and final outcome.
pub async fn observe<T, Fut>(provider: &str, stage: FlowStage, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(provider, stage);

	record_flow_outcome(stage, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_flow_outcome(stage, FlowOutcome::Success),
		Err(e) => {
			record_flow_failure(provider, stage, e);
			record_flow_outcome(stage, FlowOutcome::Failure);
		},
	}

	result
}
