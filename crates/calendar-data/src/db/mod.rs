//! SQL generation and execution.
//!
//! Generated rows pass through the tabular form in [`table`], are emitted as
//! an anchor-relative script by [`SqlEmitter`], and are replayed with
//! [`execute_script`] or a [`Seeder`].

pub mod anchor;
pub mod emitter;
pub mod executor;
pub mod schema;
mod seeder;
pub mod table;

pub use anchor::{ANCHOR_TOKEN, DeferredDate, SESSION_TOKEN};
pub use emitter::{EmitConfig, SqlEmitter};
pub use executor::{
    ExecuteError, ExecutionReport, ScriptBindings, bind_tokens, default_session_id,
    execute_script, execute_script_file, split_statements,
};
pub use seeder::{SeedError, Seeder, write_script};
pub use table::{Table, TableSet, Value};
