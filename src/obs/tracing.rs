// self
use crate::{_prelude::*, obs::FlowStage};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by login flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provider name + stage.
	pub fn new(provider: &str, stage: FlowStage) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("oauth2_link.flow", provider, stage = stage.as_str());

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (provider, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a warning event for a failed stage. Only the error code and display text are logged.
pub fn record_flow_failure(provider: &str, stage: FlowStage, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			provider,
			stage = stage.as_str(),
			code = error.code(),
			status = error.status_code(),
			"{error}"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (provider, stage, error);
	}
}

/// Emits a debug event naming the last state a halted callback reached.
pub fn record_flow_halt(provider: &str, reached: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(provider, reached, "callback halted");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (provider, reached);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_flow_failure_accepts_any_error() {
		record_flow_failure("github", FlowStage::Callback, &Error::MissingCode);
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new("github", FlowStage::ProfileFetch);
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
