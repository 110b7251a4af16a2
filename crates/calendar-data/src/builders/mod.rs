//! Fluent builder APIs for calendar scenarios.
//!
//! The [`ScenarioBuilder`] runs the whole pipeline: directory, profiles,
//! users and calendars, work and personal events, attendees.

mod scenario;

pub use scenario::{ScenarioBuilder, ScenarioMetrics, ScenarioResult};
