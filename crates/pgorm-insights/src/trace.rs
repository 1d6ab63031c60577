//! Low-level diagnostic channel.
//!
//! Every record has a stable numeric id so log pipelines can filter on it
//! without matching message text.

use std::fmt;
use tracing::Level;

/// A diagnostic record emitted by the insights module and interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// Registering the interceptor failed.
    ModuleInitializationFailed { message: String },
    /// Deregistering the interceptor failed.
    ModuleDisposalFailed { message: String },
    /// A command finished; emitted for every call regardless of threshold.
    CommandExecuted { command: String, elapsed_ms: u64 },
    /// Instrumentation of a single call failed; the command itself was not
    /// affected.
    InstrumentationFailed { message: String },
}

impl TraceEvent {
    pub const MODULE_INITIALIZATION_FAILED: u32 = 10;
    pub const MODULE_DISPOSAL_FAILED: u32 = 20;
    pub const COMMAND_EXECUTED: u32 = 30;
    pub const INSTRUMENTATION_FAILED: u32 = 40;

    /// Stable event id.
    pub fn id(&self) -> u32 {
        match self {
            TraceEvent::ModuleInitializationFailed { .. } => Self::MODULE_INITIALIZATION_FAILED,
            TraceEvent::ModuleDisposalFailed { .. } => Self::MODULE_DISPOSAL_FAILED,
            TraceEvent::CommandExecuted { .. } => Self::COMMAND_EXECUTED,
            TraceEvent::InstrumentationFailed { .. } => Self::INSTRUMENTATION_FAILED,
        }
    }

    pub fn level(&self) -> Level {
        match self {
            TraceEvent::CommandExecuted { .. } => Level::INFO,
            _ => Level::ERROR,
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::ModuleInitializationFailed { message } => write!(
                f,
                "QueryThresholdModule failed at initialization with error: {message}"
            ),
            TraceEvent::ModuleDisposalFailed { message } => write!(
                f,
                "QueryThresholdModule failed at disposal with error: {message}"
            ),
            TraceEvent::CommandExecuted {
                command,
                elapsed_ms,
            } => write!(
                f,
                "QueryThresholdInterceptor completed command {command} after {elapsed_ms} milliseconds"
            ),
            TraceEvent::InstrumentationFailed { message } => write!(
                f,
                "QueryThresholdInterceptor failed to instrument command: {message}"
            ),
        }
    }
}

/// Sink for [`TraceEvent`]s.
///
/// Implementations are called inline on the command path and from many
/// threads at once.
pub trait TraceLog: Send + Sync {
    fn record(&self, event: &TraceEvent);
}

/// Forwards trace events to `tracing` on the `pgorm_insights` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTraceLog;

impl TraceLog for TracingTraceLog {
    fn record(&self, event: &TraceEvent) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let event_id = event.id();
        match event {
            TraceEvent::CommandExecuted {
                command,
                elapsed_ms,
            } => emit_at_level!(
                event.level(),
                target: "pgorm_insights",
                event_id,
                command = %command,
                elapsed_ms,
                "{event}"
            ),
            _ => emit_at_level!(event.level(), target: "pgorm_insights", event_id, "{event}"),
        }
    }
}

/// A trace log that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTraceLog;

impl TraceLog for NoopTraceLog {
    fn record(&self, _event: &TraceEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_and_levels_are_stable() {
        let executed = TraceEvent::CommandExecuted {
            command: "SELECT 1".into(),
            elapsed_ms: 3,
        };
        assert_eq!(executed.id(), 30);
        assert_eq!(executed.level(), Level::INFO);

        let init = TraceEvent::ModuleInitializationFailed {
            message: "boom".into(),
        };
        assert_eq!(init.id(), 10);
        assert_eq!(init.level(), Level::ERROR);

        let dispose = TraceEvent::ModuleDisposalFailed {
            message: "boom".into(),
        };
        assert_eq!(dispose.id(), 20);
        assert_eq!(
            TraceEvent::InstrumentationFailed {
                message: "x".into()
            }
            .id(),
            40
        );
    }

    #[test]
    fn tracing_log_accepts_every_event() {
        let log = TracingTraceLog;
        log.record(&TraceEvent::CommandExecuted {
            command: "SELECT 1".into(),
            elapsed_ms: 1,
        });
        log.record(&TraceEvent::ModuleInitializationFailed {
            message: "boom".into(),
        });
        log.record(&TraceEvent::ModuleDisposalFailed {
            message: "boom".into(),
        });
        log.record(&TraceEvent::InstrumentationFailed {
            message: "boom".into(),
        });
    }

    #[test]
    fn executed_message_carries_command_and_elapsed() {
        let event = TraceEvent::CommandExecuted {
            command: "SELECT 1".into(),
            elapsed_ms: 12,
        };
        assert_eq!(
            event.to_string(),
            "QueryThresholdInterceptor completed command SELECT 1 after 12 milliseconds"
        );
    }
}
