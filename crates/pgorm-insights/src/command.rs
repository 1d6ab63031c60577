//! The command handed to the interception pipeline.

use crate::param::{CommandParameter, ParamValue};
use std::fmt;
use tokio_postgres::types::ToSql;

/// Placeholder rendered when a command carries no text.
pub const NULL_COMMAND_TEXT: &str = "<null>";

/// The kind of database operation a command performs.
///
/// A single kind tag replaces one callback pair per operation: interceptors
/// receive the kind on every call and can branch on it if they care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Statement executed for its affected-row count.
    NonQuery,
    /// Query whose first column of the first row is the result.
    Scalar,
    /// Query that returns a row set.
    Reader,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommandKind::NonQuery => "NonQuery",
            CommandKind::Scalar => "Scalar",
            CommandKind::Reader => "Reader",
        })
    }
}

/// SQL text plus its ordered parameter snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    text: Option<String>,
    parameters: Vec<CommandParameter>,
}

impl Command {
    /// Create a command from SQL text.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            text: Some(sql.into()),
            parameters: Vec::new(),
        }
    }

    /// Create a command whose text is absent.
    ///
    /// Such a command cannot be sent to Postgres, but hosts that replay
    /// externally-built commands through [`crate::Interception`] can still
    /// report on it.
    pub fn without_text() -> Self {
        Self::default()
    }

    /// Append a parameter.
    pub fn bind(mut self, parameter: CommandParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Append an input parameter with an inferred type tag.
    pub fn bind_value(self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.bind(CommandParameter::new(name, value))
    }

    /// The command text, if any.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// The command text, or [`NULL_COMMAND_TEXT`] when absent.
    pub fn display_text(&self) -> &str {
        self.text.as_deref().unwrap_or(NULL_COMMAND_TEXT)
    }

    pub fn parameters(&self) -> &[CommandParameter] {
        &self.parameters
    }

    /// Parameter values in declared order, ready for `tokio-postgres`.
    pub fn to_sql_params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.parameters
            .iter()
            .map(|p| &p.value as &(dyn ToSql + Sync))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_text_displays_placeholder() {
        assert_eq!(Command::without_text().text(), None);
        assert_eq!(Command::without_text().display_text(), "<null>");
        assert_eq!(Command::new("SELECT 1").display_text(), "SELECT 1");
    }

    #[test]
    fn parameters_keep_declared_order() {
        let cmd = Command::new("SELECT $1, $2")
            .bind_value("b", 2)
            .bind_value("a", 1);
        let names: Vec<_> = cmd.parameters().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(cmd.to_sql_params().len(), 2);
    }
}
