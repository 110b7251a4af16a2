//! SQL script emission.
//!
//! The script is produced in two phases:
//!
//! 1. One `INSERT` per row of the base tables (`users`, `calendars`,
//!    `events`), in dependency order. Identity columns are left out so the
//!    database assigns them; event start and end times become
//!    [`DeferredDate`] expressions over [`ANCHOR_TOKEN`]; every `session_id`
//!    column becomes [`SESSION_TOKEN`].
//!    Right after the users, a temporary `user_mapping` table projects the
//!    assigned user ids of the current session next to their email; every
//!    user foreign key is written as a lookup into it.
//! 2. A temporary `event_mapping` table projecting the freshly assigned
//!    event ids next to their natural key, followed by one `INSERT ... SELECT`
//!    per attendee that joins the mapping on (owner, title) and takes the
//!    first match.
//!
//! Both mappings only see rows of the current session, so the same script
//! can be replayed into a populated database under a new session id.
//!
//! # Preconditions
//!
//! The emitter does not verify either of these:
//!
//! - (owner, title) identifies one event series per owner. Attendees are
//!   generated per series, so any duplicate title would bind to the
//!   earliest-inserted event with that title.
//! - Emails are unique within a session.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

use tracing::{info, warn};

use crate::db::anchor::{ANCHOR_TOKEN, DeferredDate, SESSION_TOKEN};
use crate::db::table::{Table, TableSet, Value};
use crate::timestamps::format_sql;

/// Name of the attendee draft table in a [`TableSet`].
pub const ATTENDEE_TABLE: &str = "attendees";

/// Name of the users table in a [`TableSet`].
pub const USER_TABLE: &str = "users";

/// Controls which tables are emitted and how.
#[derive(Debug, Clone)]
pub struct EmitConfig {
    /// Tables emitted in phase 1, in dependency order.
    pub base_tables: Vec<String>,
    /// Database-assigned columns per table, never emitted.
    pub identity_columns: BTreeMap<String, Vec<String>>,
    /// Timestamp columns rewritten as anchor-relative expressions.
    pub deferred_columns: BTreeMap<String, Vec<String>>,
    /// Name of the temporary natural-key mapping table.
    pub mapping_table: String,
    /// Columns holding a user id, rewritten as lookups by user key.
    pub user_reference_columns: BTreeMap<String, Vec<String>>,
    /// Natural key of a user within a session.
    pub user_key_column: String,
    /// Name of the temporary user mapping table.
    pub user_mapping_table: String,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            base_tables: vec!["users".into(), "calendars".into(), "events".into()],
            identity_columns: column_map(&[
                ("users", "id"),
                ("events", "id"),
                (ATTENDEE_TABLE, "id"),
            ]),
            deferred_columns: column_map(&[("events", "start_time"), ("events", "end_time")]),
            mapping_table: "event_mapping".into(),
            user_reference_columns: column_map(&[("calendars", "user_id"), ("events", "user_id")]),
            user_key_column: "email".into(),
            user_mapping_table: "user_mapping".into(),
        }
    }
}

fn column_map(pairs: &[(&str, &str)]) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (table, column) in pairs {
        map.entry(table.to_string()).or_default().push(column.to_string());
    }
    map
}

/// Turns a [`TableSet`] into a replayable SQL script.
pub struct SqlEmitter {
    config: EmitConfig,
}

impl SqlEmitter {
    pub fn new() -> Self {
        Self {
            config: EmitConfig::default(),
        }
    }

    pub fn with_config(config: EmitConfig) -> Self {
        Self { config }
    }

    /// Emits the complete script. Missing tables are logged and skipped.
    pub fn emit(&self, tables: &TableSet) -> String {
        let mut script = String::new();
        let mut statements = 0;

        self.write_header(&mut script);
        let user_keys = self.user_keys(tables);

        for name in &self.config.base_tables {
            match tables.get(name) {
                Some(table) => {
                    let _ = writeln!(script, "-- {name}");
                    statements += self.write_inserts(&mut script, table, &user_keys);
                    script.push('\n');
                    if name == USER_TABLE {
                        statements += self.write_user_mapping(&mut script);
                    }
                }
                None => warn!("Table '{}' not found, skipping", name),
            }
        }

        match tables.get(ATTENDEE_TABLE) {
            Some(attendees) => {
                statements += self.write_mapping(&mut script);
                statements += self.write_attendees(&mut script, attendees, &user_keys);
            }
            None => warn!("Table '{}' not found, skipping", ATTENDEE_TABLE),
        }

        info!("Emitted {} SQL statements", statements);
        script
    }

    fn write_header(&self, script: &mut String) {
        script.push_str("-- Calendar fixture data\n");
        let _ = writeln!(
            script,
            "-- Bind {ANCHOR_TOKEN} to the anchor date (YYYY-MM-DD) and {SESSION_TOKEN} to the session id before executing."
        );
        script.push_str("-- Event dates keep their weekday relative to the anchor.\n");
        script.push_str("-- User and event references resolve within the session, so replays may share a database.\n\n");
    }

    /// Natural keys of the generated users, by generated id.
    fn user_keys(&self, tables: &TableSet) -> HashMap<i64, String> {
        let Some(users) = tables.get(USER_TABLE) else {
            return HashMap::new();
        };

        (0..users.len())
            .filter_map(|row| {
                match (users.get(row, "id"), users.get(row, &self.config.user_key_column)) {
                    (Some(Value::Integer(id)), Some(Value::Text(key))) => Some((*id, key.clone())),
                    _ => None,
                }
            })
            .collect()
    }

    /// Renders a user id as a lookup into the user mapping.
    ///
    /// Ids without a known user are emitted as literals.
    fn user_reference(&self, value: &Value, user_keys: &HashMap<i64, String>) -> String {
        match value {
            Value::Integer(id) => match user_keys.get(id) {
                Some(key) => format!(
                    "(SELECT user_id FROM {} WHERE {} = {})",
                    self.config.user_mapping_table,
                    self.config.user_key_column,
                    quote_text(key)
                ),
                None => render_value(value),
            },
            other => render_value(other),
        }
    }

    fn write_inserts(
        &self,
        script: &mut String,
        table: &Table,
        user_keys: &HashMap<i64, String>,
    ) -> usize {
        let identity = self.config.identity_columns.get(&table.name);
        let deferred = self.config.deferred_columns.get(&table.name);
        let references = self.config.user_reference_columns.get(&table.name);
        let contains = |list: Option<&Vec<String>>, column: &str| {
            list.is_some_and(|cols| cols.iter().any(|c| c == column))
        };

        let emitted: Vec<usize> = (0..table.columns.len())
            .filter(|&i| !contains(identity, &table.columns[i]))
            .collect();
        let column_list = emitted
            .iter()
            .map(|&i| table.columns[i].as_str())
            .collect::<Vec<_>>()
            .join(", ");

        for row in &table.rows {
            let values = emitted
                .iter()
                .map(|&i| {
                    let column = &table.columns[i];
                    let value = row.get(i).unwrap_or(&Value::Null);
                    if column == "session_id" {
                        SESSION_TOKEN.to_string()
                    } else if contains(deferred, column) {
                        render_deferred(value)
                    } else if contains(references, column) {
                        self.user_reference(value, user_keys)
                    } else {
                        render_value(value)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");

            let _ = writeln!(
                script,
                "INSERT INTO {} ({column_list}) VALUES ({values});",
                table.name
            );
        }

        table.rows.len()
    }

    fn write_user_mapping(&self, script: &mut String) -> usize {
        let mapping = &self.config.user_mapping_table;
        let key = &self.config.user_key_column;
        let _ = writeln!(script, "-- {mapping}");
        let _ = writeln!(script, "DROP TABLE IF EXISTS {mapping};");
        let _ = writeln!(
            script,
            "CREATE TEMPORARY TABLE {mapping} AS SELECT id AS user_id, {key} FROM {USER_TABLE} WHERE session_id = {SESSION_TOKEN} ORDER BY id;"
        );
        script.push('\n');
        2
    }

    fn write_mapping(&self, script: &mut String) -> usize {
        let mapping = &self.config.mapping_table;
        let _ = writeln!(script, "-- {mapping}");
        let _ = writeln!(script, "DROP TABLE IF EXISTS {mapping};");
        let _ = writeln!(
            script,
            "CREATE TEMPORARY TABLE {mapping} AS SELECT id AS event_id, user_id, title, start_time, end_time, calendar_id FROM events WHERE session_id = {SESSION_TOKEN} ORDER BY id;"
        );
        script.push('\n');
        2
    }

    fn write_attendees(
        &self,
        script: &mut String,
        table: &Table,
        user_keys: &HashMap<i64, String>,
    ) -> usize {
        let mapping = &self.config.mapping_table;
        let mut written = 0;
        let _ = writeln!(script, "-- {}", table.name);

        for row in 0..table.len() {
            let cell = |column: &str| table.get(row, column).unwrap_or(&Value::Null);

            let owner = cell("event_user_id");
            let title = match (owner, cell("event_title")) {
                (Value::Integer(_), Value::Text(title)) => title,
                _ => {
                    warn!("Attendee row {} has no event key, skipping", row);
                    continue;
                }
            };

            let _ = writeln!(
                script,
                "INSERT INTO {} (event_id, user_id, role, status, responded_at, session_id) \
                 SELECT em.event_id, {}, {}, {}, {}, {SESSION_TOKEN} FROM {mapping} em \
                 WHERE em.user_id = {} AND em.title = {} ORDER BY em.event_id LIMIT 1;",
                table.name,
                self.user_reference(cell("user_id"), user_keys),
                render_value(cell("role")),
                render_value(cell("status")),
                render_value(cell("responded_at")),
                self.user_reference(owner, user_keys),
                quote_text(title),
            );
            written += 1;
        }

        written
    }
}

impl Default for SqlEmitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Escapes text for the inside of a single-quoted SQL literal.
pub fn escape_text(text: &str) -> String {
    text.replace('\'', "''")
}

/// Renders text as a SQL string expression.
///
/// SQLite keeps backslashes verbatim, but the statement splitter treats one
/// inside a literal as an escape. Backslashes are therefore emitted outside
/// the literal as `char(92)`, and `C:\temp` becomes `'C:' || char(92) || 'temp'`.
pub fn quote_text(text: &str) -> String {
    text.split('\\')
        .map(|part| format!("'{}'", escape_text(part)))
        .collect::<Vec<_>>()
        .join(" || char(92) || ")
}

/// Renders a value as a SQL literal or expression.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(n) => n.to_string(),
        Value::Bool(b) => i64::from(*b).to_string(),
        Value::Text(s) => quote_text(s),
        Value::Timestamp(ts) => format!("'{}'", format_sql(*ts)),
        Value::Deferred(d) => d.to_sql(),
    }
}

fn render_deferred(value: &Value) -> String {
    match value {
        Value::Timestamp(ts) => DeferredDate::encode(*ts).to_sql(),
        other => render_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, time};

    fn sample_tables() -> TableSet {
        let mut users = Table::new("users", &["id", "name", "email", "session_id"]);
        users.push(vec![1_i64.into(), "Ada O'Brien".into(), "ada@example.com".into()]);

        let mut events = Table::new(
            "events",
            &["user_id", "calendar_id", "title", "start_time", "end_time", "is_all_day", "session_id"],
        );
        events.push(vec![
            1_i64.into(),
            "user_1_work".into(),
            "Daily Standup".into(),
            datetime!(2024-01-03 09:30:00).into(),
            datetime!(2024-01-03 09:45:00).into(),
            false.into(),
        ]);

        let mut attendees = Table::new(
            ATTENDEE_TABLE,
            &["user_id", "event_user_id", "event_title", "role", "status", "responded_at"],
        );
        let responded = DeferredDate::encode(datetime!(2024-01-03 09:30:00)).shifted(-2, time!(10:00));
        attendees.push(vec![
            1_i64.into(),
            1_i64.into(),
            "Daily Standup".into(),
            "organizer".into(),
            "accepted".into(),
            Value::Deferred(responded),
        ]);
        attendees.push(vec![
            2_i64.into(),
            1_i64.into(),
            "Daily Standup".into(),
            "optional_attendee".into(),
            "no_response".into(),
            Value::Null,
        ]);

        let mut set = TableSet::new();
        set.insert(users);
        set.insert(events);
        set.insert(attendees);
        set
    }

    #[test]
    fn test_quote_text() {
        assert_eq!(escape_text("O'Brien"), "O''Brien");
        assert_eq!(quote_text("O'Brien"), "'O''Brien'");
        assert_eq!(quote_text(r"C:\temp"), "'C:' || char(92) || 'temp'");
        assert_eq!(quote_text("\\"), "'' || char(92) || ''");
    }

    #[test]
    fn test_identity_columns_excluded() {
        let script = SqlEmitter::new().emit(&sample_tables());
        assert!(script.contains(
            "INSERT INTO users (name, email, session_id) VALUES ('Ada O''Brien', 'ada@example.com', @session_id);"
        ));
    }

    #[test]
    fn test_event_times_are_deferred() {
        let script = SqlEmitter::new().emit(&sample_tables());
        let insert = script
            .lines()
            .find(|l| l.starts_with("INSERT INTO events"))
            .unwrap();

        assert!(!insert.contains("2024-01-03"));
        assert!(insert.contains("'+09:30:00'"));
        assert!(insert.contains("'+09:45:00'"));
        assert!(insert.ends_with(", 0, @session_id);"));
    }

    #[test]
    fn test_phase_order() {
        let script = SqlEmitter::new().emit(&sample_tables());
        let users = script.find("INSERT INTO users").unwrap();
        let events = script.find("INSERT INTO events").unwrap();
        let mapping = script.find("CREATE TEMPORARY TABLE event_mapping").unwrap();
        let attendees = script.find("INSERT INTO attendees").unwrap();

        assert!(users < events && events < mapping && mapping < attendees);
        assert!(script.contains("DROP TABLE IF EXISTS event_mapping;"));
    }

    #[test]
    fn test_attendee_join() {
        let script = SqlEmitter::new().emit(&sample_tables());
        let rows: Vec<&str> = script
            .lines()
            .filter(|l| l.starts_with("INSERT INTO attendees"))
            .collect();

        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains(
            "SELECT em.event_id, (SELECT user_id FROM user_mapping WHERE email = 'ada@example.com'), 'organizer', 'accepted', datetime(@TODAY"
        ));
        assert!(rows[0].contains(
            "WHERE em.user_id = (SELECT user_id FROM user_mapping WHERE email = 'ada@example.com') AND em.title = 'Daily Standup' ORDER BY em.event_id LIMIT 1;"
        ));
        // No user with id 2 in the set: the literal is kept
        assert!(rows[1].contains("SELECT em.event_id, 2, 'optional_attendee'"));
        assert!(rows[1].contains("'no_response', NULL, @session_id FROM event_mapping em"));
    }

    #[test]
    fn test_user_references_resolve_by_email() {
        let script = SqlEmitter::new().emit(&sample_tables());
        let users = script.find("INSERT INTO users").unwrap();
        let mapping = script
            .find("CREATE TEMPORARY TABLE user_mapping AS SELECT id AS user_id, email FROM users WHERE session_id = @session_id")
            .unwrap();
        let events = script.find("INSERT INTO events").unwrap();
        assert!(users < mapping && mapping < events);
        assert!(script.contains("DROP TABLE IF EXISTS user_mapping;"));

        let insert = script
            .lines()
            .find(|l| l.starts_with("INSERT INTO events"))
            .unwrap();
        assert!(insert.contains(
            "VALUES ((SELECT user_id FROM user_mapping WHERE email = 'ada@example.com'), 'user_1_work'"
        ));
    }

    #[test]
    fn test_missing_tables_skipped() {
        let mut tables = sample_tables();
        tables.remove("users");
        tables.remove(ATTENDEE_TABLE);

        let script = SqlEmitter::new().emit(&tables);
        assert!(!script.contains("INSERT INTO users"));
        assert!(!script.contains("user_mapping"));
        assert!(script.contains("INSERT INTO events (user_id, calendar_id"));
        assert!(script.contains("VALUES (1, 'user_1_work'"));
        assert!(!script.contains("event_mapping"));
    }
}
