//! Entity generators for calendar data.
//!
//! - [`RecurrenceExpander`]: expand work templates into events
//! - [`AttendeeGenerator`]: pick attendees, roles and RSVP outcomes
//! - [`UserGenerator`]: users and their personal/work calendars
//! - [`ProfileGenerator`]: profile enrichment, remote or local
//! - [`PersonalEventGenerator`]: personal events from the content provider

pub mod attendee;
pub mod personal;
pub mod profile;
pub mod recurrence;
pub mod user;

pub use attendee::{
    AttendeeGenConfig, AttendeeGenerator, AttendeeRole, CalendarKind, GeneratedAttendee,
    RsvpStatus, RsvpWeights, unique_events,
};
pub use personal::{PersonalEventError, PersonalEventGenerator, work_schedule_summary};
pub use profile::{ProfileError, ProfileGenConfig, ProfileGenerator};
pub use recurrence::{
    Frequency, GeneratedEvent, RecurrenceExpander, RecurrenceTemplate, default_templates,
    load_templates,
};
pub use user::{GeneratedCalendar, GeneratedUser, UserGenConfig, UserGenerator};
