//! # pgorm-insights
//!
//! Slow-query telemetry for Postgres command execution.
//!
//! Every command that runs through an [`InterceptedClient`] (or through
//! [`Interception::intercept`] / [`Interception::intercept_blocking`]) is
//! timed by the registered interceptors. The [`QueryThresholdInterceptor`]:
//!
//! - always emits a trace record with the command text and elapsed
//!   milliseconds, and
//! - when elapsed time reaches the configured threshold (default 1000 ms),
//!   emits a `Query Exceeded Threshold` telemetry event carrying the command
//!   text, a parameter dump, the completion status and whether the call was
//!   asynchronous.
//!
//! Instrumentation never interferes with the command itself: failures are
//! reported on the [`TraceLog`] and swallowed.
//!
//! ```ignore
//! use pgorm_insights::{
//!     Command, EnvSettings, Interception, InterceptedClient, QueryThresholdModule,
//!     TelemetryModule, TracingSink, TracingTraceLog,
//! };
//! use std::sync::Arc;
//!
//! let interception = Arc::new(Interception::new());
//! let mut module = QueryThresholdModule::new(
//!     &EnvSettings::new(),
//!     Arc::new(TracingSink),
//!     Arc::new(TracingTraceLog),
//! );
//! module.start(&interception);
//!
//! let client = InterceptedClient::new(pg_client, interception.clone());
//! let rows = client
//!     .query(&Command::new("SELECT * FROM users WHERE id = $1").bind_value("id", 42_i64))
//!     .await?;
//!
//! module.stop();
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod interceptor;
pub mod module;
pub mod param;
pub mod telemetry;
pub mod threshold;
pub mod trace;

pub use client::GenericClient;
pub use command::{Command, CommandKind, NULL_COMMAND_TEXT};
pub use config::{
    DEFAULT_QUERY_THRESHOLD, EnvSettings, InsightsConfig, QUERY_THRESHOLD_KEY, SettingsSource,
    TomlSettings, parse_threshold,
};
pub use diagnostics::{DiagnosticRecord, QUERY_EXCEEDED_THRESHOLD, render_parameters};
pub use error::{InsightsError, InsightsResult};
pub use interceptor::{
    CommandCall, CommandInterceptor, CommandStatus, ExecutionOutcome, InterceptedClient,
    Interception, Stopwatch,
};
pub use module::{QueryThresholdModule, TelemetryModule};
pub use param::{CommandParameter, DbType, ParamValue, ParameterDirection};
pub use telemetry::{
    CompositeSink, JsonLinesSink, NoopSink, TelemetryEvent, TelemetrySink, TracingSink,
};
pub use threshold::QueryThresholdInterceptor;
pub use trace::{NoopTraceLog, TraceEvent, TraceLog, TracingTraceLog};
