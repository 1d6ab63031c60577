use super::types::{CommandCall, CommandInterceptor, ExecutionOutcome};
use crate::command::{Command, CommandKind};
use crate::error::{InsightsError, InsightsResult};
use crate::trace::TraceEvent;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of interceptors invoked around every command.
///
/// Share it behind an `Arc` between the clients that execute commands and the
/// modules that register interceptors. Dispatch works on a snapshot, so
/// registering or removing an interceptor never blocks in-flight calls.
#[derive(Default)]
pub struct Interception {
    interceptors: RwLock<Vec<Arc<dyn CommandInterceptor>>>,
}

impl fmt::Debug for Interception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interception")
            .field("interceptors", &self.len())
            .finish()
    }
}

impl Interception {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interceptor.
    ///
    /// Fails with [`InsightsError::AlreadyRegistered`] if this exact
    /// interceptor (same `Arc`) is already present.
    pub fn add(&self, interceptor: Arc<dyn CommandInterceptor>) -> InsightsResult<()> {
        let mut guard = self
            .interceptors
            .write()
            .map_err(|e| InsightsError::registration(e.to_string()))?;
        if guard.iter().any(|existing| Arc::ptr_eq(existing, &interceptor)) {
            return Err(InsightsError::AlreadyRegistered);
        }
        guard.push(interceptor);
        Ok(())
    }

    /// Deregister an interceptor previously passed to [`add`](Self::add).
    pub fn remove(&self, interceptor: &Arc<dyn CommandInterceptor>) -> InsightsResult<()> {
        let mut guard = self
            .interceptors
            .write()
            .map_err(|e| InsightsError::registration(e.to_string()))?;
        let pos = guard
            .iter()
            .position(|existing| Arc::ptr_eq(existing, interceptor))
            .ok_or(InsightsError::NotRegistered)?;
        guard.remove(pos);
        Ok(())
    }

    /// Number of registered interceptors.
    pub fn len(&self) -> usize {
        self.interceptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Currently registered interceptors, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<dyn CommandInterceptor>> {
        // A poisoned lock still holds a valid list; dispatch must not fail.
        self.interceptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run a synchronous command through every registered interceptor.
    pub fn intercept_blocking<T, E, F>(
        &self,
        kind: CommandKind,
        command: &Command,
        f: F,
    ) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        let scope = CallScope::begin(self.snapshot(), command, kind, false);
        let result = f();
        scope.finish(ExecutionOutcome::from_result(&result));
        result
    }

    /// Run an asynchronous command through every registered interceptor.
    ///
    /// If the returned future is dropped before the command finishes, the
    /// interceptors still observe the call, flagged as cancelled.
    pub async fn intercept<T, E, F>(
        &self,
        kind: CommandKind,
        command: &Command,
        future: F,
    ) -> Result<T, E>
    where
        E: fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        let scope = CallScope::begin(self.snapshot(), command, kind, true);
        let result = future.await;
        scope.finish(ExecutionOutcome::from_result(&result));
        result
    }

    /// Begin a call whose outcome the caller reports explicitly.
    pub(crate) fn begin<'a>(
        &self,
        command: &'a Command,
        kind: CommandKind,
        is_async: bool,
    ) -> CallScope<'a> {
        CallScope::begin(self.snapshot(), command, kind, is_async)
    }
}

/// In-flight call: one `CommandCall` per interceptor.
///
/// Dropping an unfinished scope reports the call as cancelled (or failed,
/// when the drop happens while unwinding).
pub(crate) struct CallScope<'a> {
    calls: Vec<(Arc<dyn CommandInterceptor>, CommandCall<'a>)>,
    finished: bool,
}

impl<'a> CallScope<'a> {
    fn begin(
        interceptors: Vec<Arc<dyn CommandInterceptor>>,
        command: &'a Command,
        kind: CommandKind,
        is_async: bool,
    ) -> Self {
        let mut calls: Vec<_> = interceptors
            .into_iter()
            .map(|i| (i, CommandCall::new(command, kind, is_async)))
            .collect();
        for (interceptor, call) in &mut calls {
            if catch_unwind(AssertUnwindSafe(|| interceptor.executing(call))).is_err() {
                tracing::error!(
                    target: "pgorm_insights",
                    event_id = TraceEvent::INSTRUMENTATION_FAILED,
                    kind = %kind,
                    "interceptor panicked in executing; command proceeds"
                );
            }
        }
        Self {
            calls,
            finished: false,
        }
    }

    pub(crate) fn finish(mut self, outcome: ExecutionOutcome) {
        self.report(&outcome);
    }

    fn report(&mut self, outcome: &ExecutionOutcome) {
        self.finished = true;
        for (interceptor, call) in &mut self.calls {
            if catch_unwind(AssertUnwindSafe(|| interceptor.executed(call, outcome))).is_err() {
                tracing::error!(
                    target: "pgorm_insights",
                    event_id = TraceEvent::INSTRUMENTATION_FAILED,
                    kind = %call.kind(),
                    "interceptor panicked in executed; command result is unaffected"
                );
            }
        }
    }
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let outcome = if std::thread::panicking() {
            ExecutionOutcome::failed("command panicked")
        } else {
            ExecutionOutcome::cancelled()
        };
        self.report(&outcome);
    }
}
