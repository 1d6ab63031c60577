use crate::command::{Command, CommandKind};
use std::fmt;
use std::time::{Duration, Instant};

/// Per-call monotonic timer.
///
/// `Idle -> Running -> Stopped`. Restarting discards any previous reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stopwatch {
    state: StopwatchState,
}

#[derive(Debug, Clone, Copy, Default)]
enum StopwatchState {
    #[default]
    Idle,
    Running(Instant),
    Stopped(Duration),
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing from now, discarding any running or stopped reading.
    pub fn restart(&mut self) {
        self.state = StopwatchState::Running(Instant::now());
    }

    /// Stop the timer and return the elapsed time.
    ///
    /// Returns `None` if the stopwatch was never started. Stopping twice keeps
    /// the first reading.
    pub fn stop(&mut self) -> Option<Duration> {
        match self.state {
            StopwatchState::Idle => None,
            StopwatchState::Running(start) => {
                let elapsed = start.elapsed();
                self.state = StopwatchState::Stopped(elapsed);
                Some(elapsed)
            }
            StopwatchState::Stopped(elapsed) => Some(elapsed),
        }
    }

    /// Elapsed time so far (live while running, frozen once stopped).
    pub fn elapsed(&self) -> Option<Duration> {
        match self.state {
            StopwatchState::Idle => None,
            StopwatchState::Running(start) => Some(start.elapsed()),
            StopwatchState::Stopped(elapsed) => Some(elapsed),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, StopwatchState::Running(_))
    }
}

/// One observed command execution, as seen by a single interceptor.
///
/// The pipeline creates a fresh `CommandCall` for every (call, interceptor)
/// pair, so the stopwatch is never shared across calls.
#[derive(Debug)]
pub struct CommandCall<'a> {
    command: &'a Command,
    kind: CommandKind,
    is_async: bool,
    /// Timer owned by this call.
    pub stopwatch: Stopwatch,
}

impl<'a> CommandCall<'a> {
    pub fn new(command: &'a Command, kind: CommandKind, is_async: bool) -> Self {
        Self {
            command,
            kind,
            is_async,
            stopwatch: Stopwatch::new(),
        }
    }

    pub fn command(&self) -> &'a Command {
        self.command
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Whether the call went through the asynchronous execution path.
    pub fn is_async(&self) -> bool {
        self.is_async
    }
}

/// How the underlying execution finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Error message, if execution failed.
    pub error: Option<String>,
    /// Whether the host flagged the call as cancelled.
    pub cancelled: bool,
}

impl ExecutionOutcome {
    pub fn completed() -> Self {
        Self::default()
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            cancelled: false,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            error: None,
            cancelled: true,
        }
    }

    /// Build an outcome from a command result.
    pub fn from_result<T, E: fmt::Display>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::completed(),
            Err(e) => Self::failed(e.to_string()),
        }
    }

    pub fn status(&self) -> CommandStatus {
        CommandStatus::classify(self)
    }
}

/// Final status of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandStatus {
    Completed,
    Failed,
    Cancelled,
}

impl CommandStatus {
    /// Classify an outcome: an error wins over cancellation, which wins over
    /// completion.
    pub fn classify(outcome: &ExecutionOutcome) -> Self {
        if outcome.error.is_some() {
            CommandStatus::Failed
        } else if outcome.cancelled {
            CommandStatus::Cancelled
        } else {
            CommandStatus::Completed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Completed => "Completed",
            CommandStatus::Failed => "Failed",
            CommandStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for intercepting command execution.
///
/// The pipeline calls [`executing`](CommandInterceptor::executing) right
/// before a command runs and [`executed`](CommandInterceptor::executed) once
/// it has finished, failed or been cancelled. Implementations must not panic
/// or block: they run inline on the host's data path.
pub trait CommandInterceptor: Send + Sync {
    /// Called before the command is executed.
    ///
    /// Default implementation does nothing.
    fn executing(&self, _call: &mut CommandCall<'_>) {}

    /// Called after the command has finished.
    fn executed(&self, call: &mut CommandCall<'_>, outcome: &ExecutionOutcome);
}
