//! Telemetry events and the sinks that receive them.

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// A named event with string properties and numeric metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    pub name: String,
    pub properties: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
}

impl TelemetryEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }
}

/// Trait for receiving telemetry events.
///
/// Delivery (batching, retry, loss) is up to the implementation. Sinks are
/// called inline on the command path from many threads, so they should hand
/// work off quickly.
pub trait TelemetrySink: Send + Sync {
    fn track_event(&self, event: &TelemetryEvent);
}

/// A sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn track_event(&self, _event: &TelemetryEvent) {}
}

/// Emits each event as a `tracing` INFO event on `pgorm_insights::telemetry`.
///
/// Properties and metrics are attached as JSON-encoded fields so a JSON
/// subscriber can forward them unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn track_event(&self, event: &TelemetryEvent) {
        let properties = serde_json::to_string(&event.properties).unwrap_or_default();
        let metrics = serde_json::to_string(&event.metrics).unwrap_or_default();
        tracing::info!(
            target: "pgorm_insights::telemetry",
            name = %event.name,
            properties = %properties,
            metrics = %metrics,
            "telemetry event"
        );
    }
}

/// Writes one JSON object per event, newline-delimited.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the sink and return the writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> TelemetrySink for JsonLinesSink<W> {
    fn track_event(&self, event: &TelemetryEvent) {
        let mut line = match serde_json::to_vec(event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(
                    target: "pgorm_insights::telemetry",
                    error = %e,
                    "failed to encode telemetry event"
                );
                return;
            }
        };
        line.push(b'\n');

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writer.write_all(&line).and_then(|()| writer.flush()) {
            tracing::warn!(
                target: "pgorm_insights::telemetry",
                error = %e,
                "failed to write telemetry event"
            );
        }
    }
}

/// A sink that forwards every event to multiple sinks.
pub struct CompositeSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl CompositeSink {
    /// Create an empty composite sink.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a sink.
    #[allow(clippy::should_implement_trait)]
    pub fn add<S: TelemetrySink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Add an Arc-wrapped sink.
    pub fn add_arc(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl Default for CompositeSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for CompositeSink {
    fn track_event(&self, event: &TelemetryEvent) {
        for sink in &self.sinks {
            sink.track_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_sink_writes_one_object_per_event() {
        let sink = JsonLinesSink::new(Vec::new());
        let event = TelemetryEvent::new("Query Exceeded Threshold")
            .with_property("Command", "SELECT 1")
            .with_metric("Elapsed Milliseconds", 1500.0);

        sink.track_event(&event);
        sink.track_event(&event);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["name"], "Query Exceeded Threshold");
        assert_eq!(parsed["properties"]["Command"], "SELECT 1");
        assert_eq!(parsed["metrics"]["Elapsed Milliseconds"], 1500.0);
    }

    #[test]
    fn composite_sink_fans_out() {
        #[derive(Default)]
        struct Count(std::sync::atomic::AtomicUsize);
        impl TelemetrySink for Count {
            fn track_event(&self, _event: &TelemetryEvent) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }

        let a = Arc::new(Count::default());
        let b = Arc::new(Count::default());
        let sink = CompositeSink::new()
            .add_arc(a.clone())
            .add_arc(b.clone())
            .add(NoopSink);
        sink.track_event(&TelemetryEvent::new("e"));

        assert_eq!(a.0.load(std::sync::atomic::Ordering::Relaxed), 1);
        assert_eq!(b.0.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
