//! Command interception pipeline.
//!
//! - [`CommandInterceptor`]: the two-phase callback contract
//!   (`executing` / `executed`), parameterized by [`CommandKind`](crate::CommandKind).
//! - [`Interception`]: the registry interceptors are added to and removed from.
//! - [`InterceptedClient`]: a client wrapper that drives the registry for
//!   every command it runs.
//!
//! Each call gets its own [`CommandCall`] per interceptor; nothing is shared
//! between calls.

mod intercepted;
mod registry;
mod types;

pub use intercepted::InterceptedClient;
pub use registry::Interception;
pub use types::{CommandCall, CommandInterceptor, CommandStatus, ExecutionOutcome, Stopwatch};
