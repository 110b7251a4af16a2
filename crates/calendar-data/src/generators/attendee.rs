//! Attendee selection and RSVP sampling.
//!
//! Attendees are generated once per distinct (owner, title) event: every
//! occurrence of a recurring series shares one attendee list. The SQL emitter
//! later binds each attendee to the first materialized event with that
//! owner and title.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use rand::Rng;
use time::{PrimitiveDateTime, Time};

use crate::db::anchor::DeferredDate;
use crate::generators::recurrence::GeneratedEvent;
use crate::profiles::{PersonId, Roster};

/// Calendar category, derived from the calendar id suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarKind {
    Personal,
    Work,
}

impl CalendarKind {
    /// `*_personal` is personal; everything else is treated as work.
    pub fn from_calendar_id(calendar_id: &str) -> Self {
        if calendar_id.ends_with("_personal") {
            CalendarKind::Personal
        } else {
            CalendarKind::Work
        }
    }
}

/// Meeting role of an attendee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendeeRole {
    Organizer,
    RequiredAttendee,
    OptionalAttendee,
    Resource,
}

impl AttendeeRole {
    /// Returns the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendeeRole::Organizer => "organizer",
            AttendeeRole::RequiredAttendee => "required_attendee",
            AttendeeRole::OptionalAttendee => "optional_attendee",
            AttendeeRole::Resource => "resource",
        }
    }
}

/// RSVP outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RsvpStatus {
    Accepted,
    Declined,
    Tentative,
    NoResponse,
}

impl RsvpStatus {
    const ALL: [RsvpStatus; 4] = [
        RsvpStatus::Accepted,
        RsvpStatus::Declined,
        RsvpStatus::Tentative,
        RsvpStatus::NoResponse,
    ];

    /// Returns the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RsvpStatus::Accepted => "accepted",
            RsvpStatus::Declined => "declined",
            RsvpStatus::Tentative => "tentative",
            RsvpStatus::NoResponse => "no_response",
        }
    }
}

/// Probability of each RSVP outcome, in the order
/// accepted, declined, tentative, no response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsvpWeights(pub [f64; 4]);

impl RsvpWeights {
    fn sample(&self, rng: &mut impl Rng) -> RsvpStatus {
        let total: f64 = self.0.iter().sum();
        let roll: f64 = rng.r#gen::<f64>() * total;
        let mut cumulative = 0.0;

        for (status, &weight) in RsvpStatus::ALL.iter().zip(self.0.iter()) {
            cumulative += weight;
            if roll < cumulative {
                return *status;
            }
        }

        RsvpStatus::NoResponse
    }
}

/// Configuration for attendee generation.
#[derive(Debug, Clone)]
pub struct AttendeeGenConfig {
    /// Outcome distribution for required attendees.
    pub required_rsvp: RsvpWeights,
    /// Outcome distribution for optional attendees.
    pub optional_rsvp: RsvpWeights,
    /// Outcome distribution for any other non-organizer role.
    pub baseline_rsvp: RsvpWeights,
    /// Probability that a sampled role is required rather than optional.
    pub required_probability: f64,
    /// Days before the event an acceptance arrives.
    pub accepted_lag_days: RangeInclusive<i64>,
    /// Days before the event a decline arrives.
    pub declined_lag_days: RangeInclusive<i64>,
    /// Days before the event a tentative reply arrives.
    pub tentative_lag_days: RangeInclusive<i64>,
    /// Time of day responses are recorded at.
    pub response_time: Time,
}

impl Default for AttendeeGenConfig {
    fn default() -> Self {
        Self {
            required_rsvp: RsvpWeights([0.85, 0.05, 0.08, 0.02]),
            optional_rsvp: RsvpWeights([0.60, 0.20, 0.15, 0.05]),
            baseline_rsvp: RsvpWeights([0.75, 0.10, 0.10, 0.05]),
            required_probability: 0.6,
            accepted_lag_days: 1..=7,
            declined_lag_days: 1..=5,
            tentative_lag_days: 3..=14,
            response_time: time::macros::time!(10:00),
        }
    }
}

/// Generated attendee data, keyed to its event by natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAttendee {
    /// The attending person.
    pub user_id: PersonId,
    /// Owner of the event.
    pub event_user_id: PersonId,
    pub event_title: String,
    pub event_start_time: PrimitiveDateTime,
    pub event_end_time: PrimitiveDateTime,
    pub role: AttendeeRole,
    pub status: RsvpStatus,
    /// `None` exactly when `status` is [`RsvpStatus::NoResponse`].
    pub responded_at: Option<DeferredDate>,
}

const FAMILY_KEYWORDS: [&str; 4] = ["family", "birthday", "anniversary", "wedding"];
const SPRINT_KEYWORDS: [&str; 4] = ["sprint", "planning", "review", "retrospective"];

/// Generates attendee lists with roles and RSVP outcomes.
pub struct AttendeeGenerator {
    config: AttendeeGenConfig,
}

impl AttendeeGenerator {
    /// Creates a new attendee generator with default configuration.
    pub fn new() -> Self {
        Self {
            config: AttendeeGenConfig::default(),
        }
    }

    /// Creates a generator with custom configuration.
    pub fn with_config(config: AttendeeGenConfig) -> Self {
        Self { config }
    }

    /// Generates the attendees of one event. The owner is always included
    /// as the organizer.
    pub fn generate_for_event(
        &self,
        event: &GeneratedEvent,
        roster: &Roster,
        rng: &mut impl Rng,
    ) -> Vec<GeneratedAttendee> {
        let organizer = event.user_id;
        let attendee_ids = self.select_attendees(event, roster);
        let total = attendee_ids.len();

        attendee_ids
            .into_iter()
            .enumerate()
            .map(|(position, user_id)| {
                let role = self.determine_role(user_id, organizer, position, total, rng);
                let status = self.determine_rsvp(role, rng);
                let responded_at = self.response_lag(status, rng).map(|lag| {
                    DeferredDate::encode(event.start_time).shifted(-lag, self.config.response_time)
                });

                GeneratedAttendee {
                    user_id,
                    event_user_id: organizer,
                    event_title: event.title.clone(),
                    event_start_time: event.start_time,
                    event_end_time: event.end_time,
                    role,
                    status,
                    responded_at,
                }
            })
            .collect()
    }

    /// Chooses who attends, based on calendar kind and title.
    pub fn select_attendees(&self, event: &GeneratedEvent, roster: &Roster) -> Vec<PersonId> {
        let owner = event.user_id;
        let title = event.title.as_str();
        let lowered = title.to_lowercase();

        match CalendarKind::from_calendar_id(&event.calendar_id) {
            CalendarKind::Personal => {
                if FAMILY_KEYWORDS.iter().any(|k| lowered.contains(k)) {
                    let mut ids = vec![owner];
                    ids.extend(self.family_members(owner, roster));
                    ids
                } else {
                    vec![owner]
                }
            }
            CalendarKind::Work => {
                if title.contains("1:1 with Manager") {
                    match roster.manager_of(owner) {
                        Some(manager) => vec![owner, manager],
                        None => vec![owner],
                    }
                } else if title.contains("Daily Standup")
                    || SPRINT_KEYWORDS.iter().any(|k| lowered.contains(k))
                {
                    self.team_members(owner, roster)
                } else if title.contains("All Hands") {
                    roster.ids()
                } else if title.contains("Team Meeting") {
                    self.team_members(owner, roster)
                } else if title.contains("Code Review") {
                    let mut seen = HashSet::new();
                    self.team_members(owner, roster)
                        .into_iter()
                        .chain(self.code_reviewers(owner, roster))
                        .filter(|id| seen.insert(*id))
                        .collect()
                } else {
                    self.team_members(owner, roster)
                }
            }
        }
    }

    /// Assigns a role by position in the attendee list.
    pub fn determine_role(
        &self,
        attendee: PersonId,
        organizer: PersonId,
        position: usize,
        total: usize,
        rng: &mut impl Rng,
    ) -> AttendeeRole {
        if attendee == organizer {
            AttendeeRole::Organizer
        } else if position == 1 && total > 1 {
            AttendeeRole::RequiredAttendee
        } else if rng.r#gen::<f64>() < self.config.required_probability {
            AttendeeRole::RequiredAttendee
        } else {
            AttendeeRole::OptionalAttendee
        }
    }

    /// Samples an RSVP outcome for `role`. Organizers always accept.
    pub fn determine_rsvp(&self, role: AttendeeRole, rng: &mut impl Rng) -> RsvpStatus {
        match role {
            AttendeeRole::Organizer => RsvpStatus::Accepted,
            AttendeeRole::RequiredAttendee => self.config.required_rsvp.sample(rng),
            AttendeeRole::OptionalAttendee => self.config.optional_rsvp.sample(rng),
            AttendeeRole::Resource => self.config.baseline_rsvp.sample(rng),
        }
    }

    /// Days before the event the response was sent, `None` without a response.
    pub fn response_lag(&self, status: RsvpStatus, rng: &mut impl Rng) -> Option<i64> {
        let range = match status {
            RsvpStatus::Accepted => &self.config.accepted_lag_days,
            RsvpStatus::Declined => &self.config.declined_lag_days,
            RsvpStatus::Tentative => &self.config.tentative_lag_days,
            RsvpStatus::NoResponse => return None,
        };
        Some(rng.gen_range(range.clone()))
    }

    /// Everyone on the owner's team; just the owner when the lookup fails.
    fn team_members(&self, owner: PersonId, roster: &Roster) -> Vec<PersonId> {
        match roster.team_of(owner) {
            Some(team) if !team.is_empty() => team,
            _ => vec![owner],
        }
    }

    /// Relatives invited to family events. The directory carries no family
    /// relationships, so nobody is added.
    fn family_members(&self, _owner: PersonId, _roster: &Roster) -> Vec<PersonId> {
        Vec::new()
    }

    /// Reviewers for code review events; currently the owner's team.
    fn code_reviewers(&self, owner: PersonId, roster: &Roster) -> Vec<PersonId> {
        self.team_members(owner, roster)
    }
}

impl Default for AttendeeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// First event per (owner, title), in input order.
///
/// Attendee generation runs on this list so that every occurrence of a
/// series shares one attendee definition.
pub fn unique_events(events: &[GeneratedEvent]) -> Vec<&GeneratedEvent> {
    let mut seen = HashSet::new();
    events
        .iter()
        .filter(|e| seen.insert((e.user_id, e.title.as_str())))
        .collect()
}
