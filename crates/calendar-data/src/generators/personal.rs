//! Personal events from the content provider.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use thiserror::Error;
use time::PrimitiveDateTime;
use tracing::{debug, warn};

use crate::api::{ContentProvider, ContentRequest, ProviderError};
use crate::generators::recurrence::GeneratedEvent;
use crate::profiles::Person;
use crate::timestamps::{normalize_or, normalize_timestamp};

#[derive(Debug, Error)]
pub enum PersonalEventError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Response has no personal_events array")]
    MissingEvents,
}

/// Generates personal calendar events for one person at a time.
pub struct PersonalEventGenerator {
    /// Stamps `created_at`/`updated_at` and replaces unusable timestamps.
    now: PrimitiveDateTime,
}

impl PersonalEventGenerator {
    pub fn new(now: PrimitiveDateTime) -> Self {
        Self { now }
    }

    /// Requests and parses the personal events of `person`.
    pub async fn fetch(
        &self,
        provider: &dyn ContentProvider,
        person: &Person,
        work_events: &[GeneratedEvent],
    ) -> Result<Vec<GeneratedEvent>, PersonalEventError> {
        let response = provider.generate(&self.request(person, work_events)).await?;
        self.parse(&response, person)
    }

    /// Content request for `person`, including their weekly work schedule.
    pub fn request(&self, person: &Person, work_events: &[GeneratedEvent]) -> ContentRequest {
        let profile = &person.profile;
        let prompt = format!(
            "Generate 15-25 realistic personal calendar events for the next six months.\n\n\
             Name: {}\nAge: {}\nRole: {}\nTeam: {}\nFamily status: {}\nHobbies: {}\nGym member: {}\n\n\
             {}\n\
             Avoid conflicts with the work schedule. Mix one-time and recurring events, \
             including evenings and weekends, with durations between 15 minutes and 4 hours. \
             Use ISO timestamps (YYYY-MM-DDTHH:MM:SS). Use an RRULE such as \
             \"FREQ=WEEKLY;BYDAY=MO\" for recurring events and an empty string otherwise.",
            person.name,
            profile.age.map_or_else(|| "unknown".to_string(), |a| a.to_string()),
            person.role,
            person.team,
            profile.marital_status.as_deref().unwrap_or("unknown"),
            profile.hobbies.join(", "),
            profile.gym_member,
            work_schedule_summary(work_events),
        );

        ContentRequest::new(prompt).with_schema("personal_events", personal_events_schema())
    }

    /// Converts the `personal_events` array into events on the personal calendar.
    ///
    /// Entries without a title are skipped. Timestamps are normalized and fall
    /// back to the generation time when unusable.
    pub fn parse(
        &self,
        value: &Value,
        person: &Person,
    ) -> Result<Vec<GeneratedEvent>, PersonalEventError> {
        let entries = value
            .get("personal_events")
            .and_then(Value::as_array)
            .ok_or(PersonalEventError::MissingEvents)?;

        let calendar_id = person.personal_calendar_id();
        let mut events = Vec::with_capacity(entries.len());

        for (idx, entry) in entries.iter().enumerate() {
            let text = |key: &str| entry.get(key).and_then(Value::as_str).unwrap_or_default();

            let title = text("title").trim();
            if title.is_empty() {
                warn!("Skipping personal event {} for user {}: no title", idx, person.id);
                continue;
            }

            let start_time = normalize_or(text("start_time"), self.now);
            let end_time = match normalize_timestamp(text("end_time")) {
                Some(end) if end >= start_time => end,
                _ => start_time,
            };
            let rrule = Some(text("recurrence_rule").trim())
                .filter(|r| !r.is_empty())
                .map(str::to_string);

            events.push(GeneratedEvent {
                user_id: person.id,
                title: title.to_string(),
                description: text("description").to_string(),
                start_time,
                end_time,
                location: text("location").to_string(),
                all_day: entry
                    .get("is_all_day")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                calendar_id: calendar_id.clone(),
                rrule,
                created_at: self.now,
                updated_at: self.now,
            });
        }

        debug!("Parsed {} personal events for user {}", events.len(), person.id);
        Ok(events)
    }
}

/// Summarizes work events by weekday, first occurrence per title.
pub fn work_schedule_summary(work_events: &[GeneratedEvent]) -> String {
    if work_events.is_empty() {
        return "No work events scheduled".to_string();
    }

    let mut by_day: BTreeMap<u8, (time::Weekday, Vec<String>)> = BTreeMap::new();
    for event in work_events {
        let weekday = event.start_time.weekday();
        let (_, entries) = by_day
            .entry(weekday.number_days_from_monday())
            .or_insert_with(|| (weekday, Vec::new()));

        let line = format!(
            "{} at {:02}:{:02}",
            event.title,
            event.start_time.hour(),
            event.start_time.minute()
        );
        if !entries.contains(&line) {
            entries.push(line);
        }
    }

    let mut summary = String::from("Weekly work schedule:\n");
    for (weekday, entries) in by_day.values() {
        summary.push_str(&format!("- {}: {}\n", weekday, entries.join(", ")));
    }
    summary
}

fn personal_events_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "personal_events": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "description": { "type": "string" },
                        "start_time": { "type": "string" },
                        "end_time": { "type": "string" },
                        "location": { "type": "string" },
                        "is_all_day": { "type": "boolean" },
                        "recurrence_rule": { "type": "string" }
                    },
                    "required": ["title", "description", "start_time", "end_time", "location", "is_all_day"]
                }
            }
        },
        "required": ["personal_events"]
    })
}
