//! Token binding, statement splitting and script execution.

use std::path::Path;

use sqlx::SqliteConnection;
use thiserror::Error;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info};

use crate::db::anchor::{ANCHOR_TOKEN, SESSION_TOKEN};
use crate::db::emitter::quote_text;

/// Leading characters of a failing statement kept in the error.
const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("Failed to read script: {0}")]
    Io(#[from] std::io::Error),
    #[error("Statement {index} failed: {source} (statement: {preview})")]
    Statement {
        /// Zero-based position of the statement in the script.
        index: usize,
        /// Leading text of the statement.
        preview: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Concrete values substituted for the script's tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBindings {
    pub today: Date,
    pub session_id: String,
}

impl ScriptBindings {
    pub fn new(today: Date, session_id: impl Into<String>) -> Self {
        Self {
            today,
            session_id: session_id.into(),
        }
    }

    /// Binds `today` with a session id derived from the current time.
    pub fn for_today(today: Date) -> Self {
        let now = OffsetDateTime::now_utc();
        Self::new(today, default_session_id(PrimitiveDateTime::new(now.date(), now.time())))
    }
}

/// Session id of the form `session_YYYYmmdd_HHMMSS`.
pub fn default_session_id(at: PrimitiveDateTime) -> String {
    let stamp = at
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .unwrap_or_default();
    format!("session_{stamp}")
}

/// Outcome of a successful script run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub statements: usize,
    pub rows_affected: u64,
}

/// Replaces both tokens with SQL string expressions.
pub fn bind_tokens(script: &str, bindings: &ScriptBindings) -> String {
    script
        .replace(ANCHOR_TOKEN, &format!("'{}'", bindings.today))
        .replace(SESSION_TOKEN, &quote_text(&bindings.session_id))
}

/// Splits a script into statements in one pass.
///
/// Semicolons and quotes inside single-quoted literals never end a
/// statement. Inside a literal a backslash escapes the next character and a
/// doubled quote re-enters the literal. `--` comments outside literals run to
/// the end of the line and are dropped. Statements are trimmed, lose their
/// trailing semicolon, and empty ones are skipped.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '\'' {
                in_string = false;
            }
            continue;
        }

        match c {
            '\'' => {
                in_string = true;
                current.push(c);
            }
            '-' if chars.peek() == Some(&'-') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            ';' => {
                push_statement(&mut statements, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_statement(&mut statements, &current);

    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

/// Binds, splits and executes `script` in source order.
///
/// Stops at the first failing statement. Statements that already ran are
/// not rolled back.
pub async fn execute_script(
    conn: &mut SqliteConnection,
    script: &str,
    bindings: &ScriptBindings,
) -> Result<ExecutionReport, ExecuteError> {
    let statements = split_statements(&bind_tokens(script, bindings));
    info!(
        "Executing {} statements (anchor {}, session {})",
        statements.len(),
        bindings.today,
        bindings.session_id
    );

    let report = execute_statements(conn, &statements).await?;

    info!(
        "Executed {} statements, {} rows affected",
        report.statements, report.rows_affected
    );
    Ok(report)
}

/// Reads a script from disk and runs it through [`execute_script`].
pub async fn execute_script_file(
    conn: &mut SqliteConnection,
    path: impl AsRef<Path>,
    bindings: &ScriptBindings,
) -> Result<ExecutionReport, ExecuteError> {
    let script = tokio::fs::read_to_string(path.as_ref()).await?;
    execute_script(conn, &script, bindings).await
}

/// Executes already split statements in order.
pub async fn execute_statements(
    conn: &mut SqliteConnection,
    statements: &[String],
) -> Result<ExecutionReport, ExecuteError> {
    let mut report = ExecutionReport::default();

    for (index, statement) in statements.iter().enumerate() {
        let result = sqlx::query(statement)
            .persistent(false)
            .execute(&mut *conn)
            .await
            .map_err(|source| ExecuteError::Statement {
                index,
                preview: statement.chars().take(PREVIEW_CHARS).collect(),
                source,
            })?;

        report.statements += 1;
        report.rows_affected += result.rows_affected();

        if (index + 1) % 500 == 0 {
            debug!("Executed {}/{} statements", index + 1, statements.len());
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn test_semicolon_and_quote_inside_literal() {
        let statements = split_statements("INSERT INTO t (a) VALUES ('x;y''z');");
        assert_eq!(statements, vec!["INSERT INTO t (a) VALUES ('x;y''z')"]);
    }

    #[test]
    fn test_backslash_escapes_inside_literal() {
        let statements = split_statements(r"INSERT INTO t (a) VALUES ('it\'s;fine'); SELECT 1;");
        assert_eq!(
            statements,
            vec![r"INSERT INTO t (a) VALUES ('it\'s;fine')", "SELECT 1"]
        );

        // Outside a literal a backslash is plain text
        assert_eq!(split_statements(r"SELECT '\\'; SELECT 2"), vec![r"SELECT '\\'", "SELECT 2"]);
    }

    #[test]
    fn test_comments_are_dropped() {
        let script = "-- header; with a semicolon\n-- another\nINSERT INTO t VALUES (1);\nSELECT '--not a comment'; -- trailing\n";
        assert_eq!(
            split_statements(script),
            vec!["INSERT INTO t VALUES (1)", "SELECT '--not a comment'"]
        );
    }

    #[test]
    fn test_empty_statements_skipped() {
        assert_eq!(split_statements(" ; ;\n;SELECT 1"), vec!["SELECT 1"]);
        assert!(split_statements("").is_empty());
    }

    #[test]
    fn test_bind_tokens() {
        let bindings = ScriptBindings::new(date!(2024 - 01 - 15), "run'1");
        let bound = bind_tokens(
            "SELECT datetime(@TODAY, '+1 days'), @session_id, @session_id;",
            &bindings,
        );
        assert_eq!(
            bound,
            "SELECT datetime('2024-01-15', '+1 days'), 'run''1', 'run''1';"
        );

        let bindings = ScriptBindings::new(date!(2024 - 01 - 15), r"s\1");
        let bound = bind_tokens("SELECT @session_id;", &bindings);
        assert_eq!(bound, "SELECT 's' || char(92) || '1';");
        assert_eq!(split_statements(&bound), vec!["SELECT 's' || char(92) || '1'"]);
    }

    #[test]
    fn test_default_session_id() {
        assert_eq!(
            default_session_id(datetime!(2024-03-09 07:05:01)),
            "session_20240309_070501"
        );
    }
}
