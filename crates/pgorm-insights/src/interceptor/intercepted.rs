use super::registry::Interception;
use super::types::ExecutionOutcome;
use crate::client::GenericClient;
use crate::command::{Command, CommandKind};
use crate::error::{InsightsError, InsightsResult};
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::Row;

/// A database client that runs every command through an [`Interception`]
/// registry.
///
/// Interceptors are looked up per command, so modules may register or
/// deregister while the client is in use.
pub struct InterceptedClient<C> {
    client: C,
    interception: Arc<Interception>,
    query_timeout: Option<Duration>,
}

impl<C: GenericClient> InterceptedClient<C> {
    /// Wrap a client with a shared interceptor registry.
    pub fn new(client: C, interception: Arc<Interception>) -> Self {
        Self {
            client,
            interception,
            query_timeout: None,
        }
    }

    /// Set the query timeout.
    ///
    /// Queries exceeding this duration are cancelled server-side (best
    /// effort), return [`InsightsError::Timeout`], and are reported to
    /// interceptors as cancelled.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    pub fn interception(&self) -> &Arc<Interception> {
        &self.interception
    }

    /// Get a reference to the inner client.
    pub fn inner(&self) -> &C {
        &self.client
    }

    /// Get the inner client, consuming this wrapper.
    pub fn into_inner(self) -> C {
        self.client
    }

    /// Execute a statement and return the number of affected rows.
    pub async fn execute(&self, command: &Command) -> InsightsResult<u64> {
        let sql = command_sql(command)?;
        let params = command.to_sql_params();
        self.run(
            CommandKind::NonQuery,
            command,
            self.client.execute(sql, &params),
        )
        .await
    }

    /// Execute a query and return its first row, if any.
    pub async fn query_scalar(&self, command: &Command) -> InsightsResult<Option<Row>> {
        let sql = command_sql(command)?;
        let params = command.to_sql_params();
        self.run(
            CommandKind::Scalar,
            command,
            self.client.query_opt(sql, &params),
        )
        .await
    }

    /// Execute a query and return all rows.
    pub async fn query(&self, command: &Command) -> InsightsResult<Vec<Row>> {
        let sql = command_sql(command)?;
        let params = command.to_sql_params();
        self.run(CommandKind::Reader, command, self.client.query(sql, &params))
            .await
    }

    async fn run<T, F>(
        &self,
        kind: CommandKind,
        command: &Command,
        future: F,
    ) -> InsightsResult<T>
    where
        F: std::future::Future<Output = InsightsResult<T>> + Send,
    {
        let scope = self.interception.begin(command, kind, true);
        let result = self.execute_with_timeout(future).await;
        let outcome = match &result {
            // A timeout is a cancellation initiated by this client, not a
            // command failure.
            Err(InsightsError::Timeout(_)) => ExecutionOutcome::cancelled(),
            other => ExecutionOutcome::from_result(other),
        };
        scope.finish(outcome);
        result
    }

    async fn execute_with_timeout<T, F>(&self, future: F) -> InsightsResult<T>
    where
        F: std::future::Future<Output = InsightsResult<T>> + Send,
    {
        match self.query_timeout {
            Some(timeout) => {
                tokio::pin!(future);
                tokio::select! {
                    result = &mut future => result,
                    _ = tokio::time::sleep(timeout) => {
                        if let Some(cancel_token) = self.client.cancel_token() {
                            tokio::spawn(async move {
                                let _ = cancel_token.cancel_query(tokio_postgres::NoTls).await;
                            });
                        }
                        Err(InsightsError::Timeout(timeout))
                    }
                }
            }
            None => future.await,
        }
    }
}

fn command_sql(command: &Command) -> InsightsResult<&str> {
    command
        .text()
        .ok_or_else(|| InsightsError::Other("command has no SQL text".to_string()))
}
