//! The query threshold interceptor.
//!
//! Every finished command produces a [`TraceEvent::CommandExecuted`] record.
//! Commands whose elapsed time reaches the threshold additionally produce a
//! `Query Exceeded Threshold` telemetry event with a [`DiagnosticRecord`].

use crate::config::{InsightsConfig, effective_threshold};
use crate::diagnostics::{DiagnosticRecord, QUERY_EXCEEDED_THRESHOLD, elapsed_millis};
use crate::interceptor::{CommandCall, CommandInterceptor, ExecutionOutcome};
use crate::telemetry::TelemetrySink;
use crate::trace::{TraceEvent, TraceLog};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

/// Times each command and reports the ones that reach a threshold.
///
/// Holds no per-call state: the stopwatch lives in the [`CommandCall`], so one
/// instance can serve any number of concurrent calls.
pub struct QueryThresholdInterceptor {
    threshold: Duration,
    telemetry: Arc<dyn TelemetrySink>,
    trace: Arc<dyn TraceLog>,
}

impl QueryThresholdInterceptor {
    /// Create an interceptor.
    ///
    /// The threshold is truncated to whole milliseconds; under one millisecond
    /// selects the 1000 ms default.
    pub fn new(
        threshold: Duration,
        telemetry: Arc<dyn TelemetrySink>,
        trace: Arc<dyn TraceLog>,
    ) -> Self {
        Self {
            threshold: effective_threshold(threshold),
            telemetry,
            trace,
        }
    }

    pub fn from_config(
        config: &InsightsConfig,
        telemetry: Arc<dyn TelemetrySink>,
        trace: Arc<dyn TraceLog>,
    ) -> Self {
        Self::new(config.query_threshold(), telemetry, trace)
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn telemetry(&self) -> &Arc<dyn TelemetrySink> {
        &self.telemetry
    }

    pub fn trace(&self) -> &Arc<dyn TraceLog> {
        &self.trace
    }

    fn instrumentation_failed(&self, message: impl Into<String>) {
        self.trace.record(&TraceEvent::InstrumentationFailed {
            message: message.into(),
        });
    }

    fn report_slow(&self, call: &CommandCall<'_>, outcome: &ExecutionOutcome, elapsed: Duration) {
        let event = match DiagnosticRecord::build(call, outcome, elapsed) {
            Ok(record) => record.into_event(QUERY_EXCEEDED_THRESHOLD),
            Err(e) => {
                self.instrumentation_failed(format!("failed to format diagnostics: {e}"));
                return;
            }
        };
        let telemetry = &self.telemetry;
        if catch_unwind(AssertUnwindSafe(|| telemetry.track_event(&event))).is_err() {
            self.instrumentation_failed("telemetry sink panicked");
        }
    }
}

impl CommandInterceptor for QueryThresholdInterceptor {
    fn executing(&self, call: &mut CommandCall<'_>) {
        call.stopwatch.restart();
    }

    fn executed(&self, call: &mut CommandCall<'_>, outcome: &ExecutionOutcome) {
        let Some(elapsed) = call.stopwatch.stop() else {
            self.instrumentation_failed(format!(
                "command {} finished without a start measurement",
                call.command().display_text()
            ));
            return;
        };

        let elapsed_ms = elapsed_millis(elapsed);
        self.trace.record(&TraceEvent::CommandExecuted {
            command: call.command().display_text().to_string(),
            elapsed_ms,
        });

        if exceeds_threshold(elapsed_ms, elapsed_millis(self.threshold)) {
            self.report_slow(call, outcome, elapsed);
        }
    }
}

/// Whether a call of `elapsed_ms` is slow. Reaching the threshold counts.
pub(crate) fn exceeds_threshold(elapsed_ms: u64, threshold_ms: u64) -> bool {
    elapsed_ms >= threshold_ms
}
