//! Diagnostic record assembly for slow commands.
//!
//! Output format for one parameter:
//!
//! ```text
//! -- <name>: '<value|null>' (Type = <type>[, Direction = <dir>][, IsNullable = false][, Size = <n>][, Precision = <p>][, Scale = <s>])
//! ```
//!
//! Optional segments only appear when they differ from the defaults
//! (`Input`, nullable, zero).

use crate::interceptor::{CommandCall, CommandStatus, ExecutionOutcome};
use crate::param::{CommandParameter, ParameterDirection};
use crate::telemetry::TelemetryEvent;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::time::Duration;

/// Name of the telemetry event emitted for slow commands.
pub const QUERY_EXCEEDED_THRESHOLD: &str = "Query Exceeded Threshold";

pub const PROP_COMMAND: &str = "Command";
pub const PROP_COMMAND_PARAMETERS: &str = "Command Parameters";
pub const PROP_COMMAND_STATUS: &str = "Command Status";
pub const PROP_ASYNCHRONOUS: &str = "Asynchronous";
pub const METRIC_ELAPSED_MILLISECONDS: &str = "Elapsed Milliseconds";

/// Render one parameter line, including the trailing newline.
pub fn render_parameter<W: Write>(parameter: &CommandParameter, out: &mut W) -> fmt::Result {
    write!(
        out,
        "-- {}: '{}' (Type = {}",
        parameter.name, parameter.value, parameter.db_type
    )?;
    if parameter.direction != ParameterDirection::Input {
        write!(out, ", Direction = {}", parameter.direction)?;
    }
    if !parameter.is_nullable {
        out.write_str(", IsNullable = false")?;
    }
    if parameter.size != 0 {
        write!(out, ", Size = {}", parameter.size)?;
    }
    if parameter.precision != 0 {
        write!(out, ", Precision = {}", parameter.precision)?;
    }
    if parameter.scale != 0 {
        write!(out, ", Scale = {}", parameter.scale)?;
    }
    out.write_str(")\n")
}

/// Render all parameters in declared order, or `None` when there are none.
pub fn render_parameters(parameters: &[CommandParameter]) -> Result<Option<String>, fmt::Error> {
    if parameters.is_empty() {
        return Ok(None);
    }
    let mut out = String::new();
    for parameter in parameters {
        render_parameter(parameter, &mut out)?;
    }
    Ok(Some(out))
}

/// Structured description of one slow command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticRecord {
    pub properties: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
}

impl DiagnosticRecord {
    /// Assemble the record for a finished call.
    pub fn build(
        call: &CommandCall<'_>,
        outcome: &ExecutionOutcome,
        elapsed: Duration,
    ) -> Result<Self, fmt::Error> {
        let command = call.command();
        let mut properties = BTreeMap::new();

        properties.insert(PROP_COMMAND.to_string(), command.display_text().to_string());
        if let Some(rendered) = render_parameters(command.parameters())? {
            properties.insert(PROP_COMMAND_PARAMETERS.to_string(), rendered);
        }
        properties.insert(
            PROP_COMMAND_STATUS.to_string(),
            CommandStatus::classify(outcome).to_string(),
        );
        properties.insert(PROP_ASYNCHRONOUS.to_string(), call.is_async().to_string());

        let mut metrics = BTreeMap::new();
        metrics.insert(
            METRIC_ELAPSED_MILLISECONDS.to_string(),
            elapsed_millis(elapsed) as f64,
        );

        Ok(Self {
            properties,
            metrics,
        })
    }

    /// Wrap the record in a telemetry event.
    pub fn into_event(self, name: impl Into<String>) -> TelemetryEvent {
        TelemetryEvent {
            name: name.into(),
            properties: self.properties,
            metrics: self.metrics,
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
pub fn elapsed_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
