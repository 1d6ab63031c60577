//! End-to-end wiring through the public API: module lifecycle, the blocking
//! pipeline and a JSON-lines telemetry sink.

use pgorm_insights::{
    Command, CommandKind, Interception, JsonLinesSink, NoopTraceLog, QueryThresholdModule,
    TelemetryModule, TomlSettings, TraceEvent, TraceLog,
};
use std::io::Write;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn lines(&self) -> Vec<serde_json::Value> {
        let raw = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
        raw.lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

#[derive(Default)]
struct ExecutedCounter(Mutex<u32>);

impl TraceLog for ExecutedCounter {
    fn record(&self, event: &TraceEvent) {
        if event.id() == TraceEvent::COMMAND_EXECUTED {
            *self.0.lock().unwrap() += 1;
        }
    }
}

#[test]
fn slow_commands_reach_the_sink_until_the_module_stops() {
    let settings = TomlSettings::from_str("[insights]\nquery_threshold = 15\n").unwrap();
    let buffer = SharedBuffer::default();
    let trace = Arc::new(ExecutedCounter::default());
    let interception = Arc::new(Interception::new());

    let mut module = QueryThresholdModule::new(
        &settings,
        Arc::new(JsonLinesSink::new(buffer.clone())),
        trace.clone(),
    );
    module.start(&interception);

    let slow = Command::new("SELECT * FROM orders WHERE customer_id = $1")
        .bind_value("customer_id", 7_i64);
    let fast = Command::new("SELECT 1");

    let result: Result<u64, String> =
        interception.intercept_blocking(CommandKind::Reader, &slow, || {
            std::thread::sleep(Duration::from_millis(30));
            Ok(12)
        });
    assert_eq!(result, Ok(12));
    let result: Result<u64, String> =
        interception.intercept_blocking(CommandKind::Scalar, &fast, || Ok(1));
    assert_eq!(result, Ok(1));

    module.stop();
    let result: Result<u64, String> =
        interception.intercept_blocking(CommandKind::Reader, &slow, || {
            std::thread::sleep(Duration::from_millis(30));
            Ok(12)
        });
    assert_eq!(result, Ok(12));

    assert_eq!(*trace.0.lock().unwrap(), 2);

    let events = buffer.lines();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event["name"], "Query Exceeded Threshold");
    assert_eq!(
        event["properties"]["Command"],
        "SELECT * FROM orders WHERE customer_id = $1"
    );
    assert_eq!(
        event["properties"]["Command Parameters"],
        "-- customer_id: '7' (Type = Int64)\n"
    );
    assert_eq!(event["properties"]["Command Status"], "Completed");
    assert_eq!(event["properties"]["Asynchronous"], "false");
    assert!(event["metrics"]["Elapsed Milliseconds"].as_f64().unwrap() >= 30.0);
}

#[test]
fn module_failures_never_panic() {
    let interception = Arc::new(Interception::new());
    let mut module = QueryThresholdModule::new(
        &TomlSettings::default(),
        Arc::new(pgorm_insights::NoopSink),
        Arc::new(NoopTraceLog),
    );
    module.stop();
    module.start(&interception);
    module.start(&interception);
    assert_eq!(interception.len(), 1);
    module.stop();
    module.stop();
    assert!(interception.is_empty());
}

// Compile-only: the real driver types plug into the intercepted client.

#[allow(dead_code)]
async fn _tokio_postgres_client_compiles(
    client: tokio_postgres::Client,
    interception: Arc<Interception>,
) -> pgorm_insights::InsightsResult<()> {
    let client = pgorm_insights::InterceptedClient::new(client, interception)
        .with_query_timeout(Duration::from_secs(5));
    client
        .execute(&Command::new("UPDATE t SET x = $1").bind_value("x", 1))
        .await?;
    let _rows = client.query(&Command::new("SELECT * FROM t")).await?;
    let _first = client.query_scalar(&Command::new("SELECT count(*) FROM t")).await?;
    Ok(())
}

#[allow(dead_code)]
async fn _transaction_compiles(
    client: &mut tokio_postgres::Client,
    interception: Arc<Interception>,
) -> pgorm_insights::InsightsResult<()> {
    let tx = client.transaction().await?;
    let intercepted = pgorm_insights::InterceptedClient::new(tx, interception);
    intercepted.execute(&Command::new("DELETE FROM t")).await?;
    intercepted.into_inner().commit().await?;
    Ok(())
}
