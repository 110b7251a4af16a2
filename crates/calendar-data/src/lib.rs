//! Calendar fixture generation.
//!
//! This crate synthesizes a company directory, personal and work calendars,
//! recurring work events, personal events and attendees, and emits them as a
//! SQL script whose dates are relative to an anchor ("today") bound at
//! execution time. Replaying the same script on a different day keeps every
//! event on its original weekday.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use calendar_data::prelude::*;
//!
//! let result = ScenarioBuilder::new()
//!     .with_synthetic_people(20)
//!     .with_seed(7)
//!     .build_data()
//!     .await;
//!
//! let mut conn = SqliteConnection::connect("sqlite::memory:").await?;
//! apply_schema(&mut conn).await?;
//! let bindings = ScriptBindings::new(date!(2024 - 01 - 15), "session_demo");
//! execute_script(&mut conn, &result.to_script(), &bindings).await?;
//! ```

pub mod api;
pub mod builders;
pub mod config;
pub mod db;
pub mod generators;
pub mod profiles;
pub mod timestamps;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::api::{ChatCompletionsProvider, ContentProvider, ContentRequest, ProviderError};
    pub use crate::builders::{ScenarioBuilder, ScenarioMetrics, ScenarioResult};
    pub use crate::config::{GenerationWindow, SeedConfig};
    pub use crate::db::schema::apply_schema;
    pub use crate::db::{
        DeferredDate, ScriptBindings, Seeder, SqlEmitter, TableSet, execute_script,
        execute_script_file, split_statements,
    };
    pub use crate::generators::{
        AttendeeGenerator, PersonalEventGenerator, ProfileGenerator, RecurrenceExpander,
        RecurrenceTemplate, UserGenerator, default_templates,
    };
    pub use crate::profiles::{OrgMember, PersonId, Roster};
}
