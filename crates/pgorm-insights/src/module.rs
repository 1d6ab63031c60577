//! Lifecycle wiring for telemetry modules.

use crate::config::{InsightsConfig, SettingsSource};
use crate::error::InsightsError;
use crate::interceptor::{CommandInterceptor, Interception};
use crate::telemetry::TelemetrySink;
use crate::threshold::QueryThresholdInterceptor;
use crate::trace::{TraceEvent, TraceLog};
use std::sync::Arc;

/// A pluggable telemetry module.
///
/// Neither operation may fail from the host's point of view: problems are
/// reported on the module's trace log and otherwise ignored.
pub trait TelemetryModule {
    /// Attach the module to a command pipeline.
    fn start(&mut self, interception: &Arc<Interception>);

    /// Detach the module from the pipeline it was started on.
    fn stop(&mut self);
}

/// Registers a [`QueryThresholdInterceptor`] with a command pipeline.
pub struct QueryThresholdModule {
    interceptor: Arc<QueryThresholdInterceptor>,
    trace: Arc<dyn TraceLog>,
    attached: Option<Arc<Interception>>,
}

impl QueryThresholdModule {
    /// Build the module, reading the threshold from `settings`.
    pub fn new<S: SettingsSource + ?Sized>(
        settings: &S,
        telemetry: Arc<dyn TelemetrySink>,
        trace: Arc<dyn TraceLog>,
    ) -> Self {
        Self::with_config(&InsightsConfig::from_source(settings), telemetry, trace)
    }

    pub fn with_config(
        config: &InsightsConfig,
        telemetry: Arc<dyn TelemetrySink>,
        trace: Arc<dyn TraceLog>,
    ) -> Self {
        let interceptor = Arc::new(QueryThresholdInterceptor::from_config(
            config,
            telemetry,
            trace.clone(),
        ));
        Self {
            interceptor,
            trace,
            attached: None,
        }
    }

    pub fn interceptor(&self) -> &Arc<QueryThresholdInterceptor> {
        &self.interceptor
    }

    /// Whether the interceptor is currently registered by this module.
    pub fn is_started(&self) -> bool {
        self.attached.is_some()
    }

    fn as_dyn(&self) -> Arc<dyn CommandInterceptor> {
        self.interceptor.clone()
    }
}

impl TelemetryModule for QueryThresholdModule {
    fn start(&mut self, interception: &Arc<Interception>) {
        if self.attached.is_some() {
            self.trace.record(&TraceEvent::ModuleInitializationFailed {
                message: "module is already started".to_string(),
            });
            return;
        }
        match interception.add(self.as_dyn()) {
            Ok(()) => {
                tracing::debug!(
                    target: "pgorm_insights",
                    threshold_ms = self.interceptor.threshold().as_millis() as u64,
                    "query threshold module started"
                );
                self.attached = Some(interception.clone());
            }
            Err(e) => self.trace.record(&TraceEvent::ModuleInitializationFailed {
                message: e.to_string(),
            }),
        }
    }

    fn stop(&mut self) {
        let result = match self.attached.take() {
            Some(interception) => interception.remove(&self.as_dyn()),
            None => Err(InsightsError::NotRegistered),
        };
        if let Err(e) = result {
            self.trace.record(&TraceEvent::ModuleDisposalFailed {
                message: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QUERY_THRESHOLD_KEY;
    use crate::telemetry::NoopSink;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct TraceCapture(Mutex<Vec<TraceEvent>>);

    impl TraceLog for TraceCapture {
        fn record(&self, event: &TraceEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    impl TraceCapture {
        fn ids(&self) -> Vec<u32> {
            self.0.lock().unwrap().iter().map(TraceEvent::id).collect()
        }
    }

    fn module(threshold: &str, trace: Arc<TraceCapture>) -> QueryThresholdModule {
        let mut settings = BTreeMap::new();
        settings.insert(QUERY_THRESHOLD_KEY.to_string(), threshold.to_string());
        QueryThresholdModule::new(&settings, Arc::new(NoopSink), trace)
    }

    #[test]
    fn start_and_stop_register_and_deregister() {
        let trace = Arc::new(TraceCapture::default());
        let interception = Arc::new(Interception::new());
        let mut module = module("250", trace.clone());
        assert_eq!(module.interceptor().threshold(), Duration::from_millis(250));

        module.start(&interception);
        assert!(module.is_started());
        assert_eq!(interception.len(), 1);

        module.stop();
        assert!(!module.is_started());
        assert!(interception.is_empty());
        assert!(trace.ids().is_empty());
    }

    #[test]
    fn unparseable_threshold_uses_default() {
        let module = module("soon", Arc::new(TraceCapture::default()));
        assert_eq!(module.interceptor().threshold(), Duration::from_millis(1000));
    }

    #[test]
    fn duplicate_start_is_logged_not_fatal() {
        let trace = Arc::new(TraceCapture::default());
        let interception = Arc::new(Interception::new());
        let mut module = module("100", trace.clone());

        interception.add(module.as_dyn()).unwrap();
        module.start(&interception);

        assert!(!module.is_started());
        assert_eq!(interception.len(), 1);
        assert_eq!(trace.ids(), [TraceEvent::MODULE_INITIALIZATION_FAILED]);
    }

    #[test]
    fn second_start_keeps_the_first_registration() {
        let trace = Arc::new(TraceCapture::default());
        let first = Arc::new(Interception::new());
        let second = Arc::new(Interception::new());
        let mut module = module("100", trace.clone());

        module.start(&first);
        module.start(&second);
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(trace.ids(), [TraceEvent::MODULE_INITIALIZATION_FAILED]);

        module.stop();
        assert!(first.is_empty());
        assert!(second.is_empty());
        assert!(!module.is_started());
        assert_eq!(trace.ids(), [TraceEvent::MODULE_INITIALIZATION_FAILED]);
    }

    #[test]
    fn stop_without_start_is_logged_not_fatal() {
        let trace = Arc::new(TraceCapture::default());
        let mut module = module("100", trace.clone());
        module.stop();
        assert_eq!(trace.ids(), [TraceEvent::MODULE_DISPOSAL_FAILED]);
    }

    #[test]
    fn stop_after_external_removal_is_logged() {
        let trace = Arc::new(TraceCapture::default());
        let interception = Arc::new(Interception::new());
        let mut module = module("100", trace.clone());

        module.start(&interception);
        interception.remove(&module.as_dyn()).unwrap();
        module.stop();

        assert_eq!(trace.ids(), [TraceEvent::MODULE_DISPOSAL_FAILED]);
        let events = trace.0.lock().unwrap();
        assert!(events[0].to_string().contains("not registered"));
    }
}
