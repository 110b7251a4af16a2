//! Expansion of recurring work-event templates into concrete events.
//!
//! Every occurrence is materialized as its own row; the `rrule` string on each
//! row only describes the series it came from.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{Date, Duration, Month, PrimitiveDateTime, Time, Weekday};
use tracing::warn;

use crate::config::{GenerationWindow, is_workday};
use crate::profiles::{DirectoryError, PersonId};
use crate::timestamps::{format_time, parse_time_of_day};

/// How often a template recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Every weekday, Monday to Friday.
    Daily,
    /// Once a week on the template's day.
    Weekly,
    /// Every 14 days on the template's day.
    Biweekly,
    /// First Friday of every month.
    Monthly,
}

impl Frequency {
    /// Room used when a template does not name a location.
    pub fn default_location(&self) -> &'static str {
        match self {
            Frequency::Daily => "Conference Room A",
            Frequency::Weekly => "Conference Room B",
            Frequency::Biweekly => "Conference Room C",
            Frequency::Monthly => "Main Conference Room",
        }
    }
}

/// Declarative description of a recurring work activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceTemplate {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub frequency: Frequency,
    /// Start time of each occurrence.
    #[serde(with = "time_of_day")]
    pub time: Time,
    /// Length of each occurrence in minutes.
    pub duration: u32,
    /// Day name (`"Monday"`) for weekly and biweekly templates.
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl RecurrenceTemplate {
    /// Weekday occurrences fall on. Unknown or missing names mean Monday.
    pub fn target_weekday(&self) -> Weekday {
        match self.day.as_deref() {
            None => Weekday::Monday,
            Some(name) => parse_weekday(name).unwrap_or_else(|| {
                warn!("Unknown day '{name}' in template '{}', using Monday", self.name);
                Weekday::Monday
            }),
        }
    }

    /// Recurrence descriptor attached to every generated occurrence.
    pub fn rrule(&self) -> String {
        match self.frequency {
            Frequency::Daily => "RRULE:FREQ=DAILY;BYDAY=MO,TU,WE,TH,FR".to_string(),
            Frequency::Weekly => {
                format!("RRULE:FREQ=WEEKLY;BYDAY={}", weekday_code(self.target_weekday()))
            }
            Frequency::Biweekly => format!(
                "RRULE:FREQ=WEEKLY;INTERVAL=2;BYDAY={}",
                weekday_code(self.target_weekday())
            ),
            Frequency::Monthly => "RRULE:FREQ=MONTHLY;BYDAY=1FR".to_string(),
        }
    }

    pub fn location(&self) -> &str {
        self.location
            .as_deref()
            .unwrap_or_else(|| self.frequency.default_location())
    }
}

mod time_of_day {
    use super::*;

    pub fn serialize<S: Serializer>(t: &Time, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_time(*t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Time, D::Error> {
        let raw = String::deserialize(d)?;
        parse_time_of_day(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day '{raw}'")))
    }
}

/// Parses an English day name, case-insensitively.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let day = match name.trim().to_lowercase().as_str() {
        "monday" => Weekday::Monday,
        "tuesday" => Weekday::Tuesday,
        "wednesday" => Weekday::Wednesday,
        "thursday" => Weekday::Thursday,
        "friday" => Weekday::Friday,
        "saturday" => Weekday::Saturday,
        "sunday" => Weekday::Sunday,
        _ => return None,
    };
    Some(day)
}

/// Two-letter iCalendar day code.
pub fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Monday => "MO",
        Weekday::Tuesday => "TU",
        Weekday::Wednesday => "WE",
        Weekday::Thursday => "TH",
        Weekday::Friday => "FR",
        Weekday::Saturday => "SA",
        Weekday::Sunday => "SU",
    }
}

/// Loads recurrence templates from a JSON array.
pub fn load_templates(path: impl AsRef<Path>) -> Result<Vec<RecurrenceTemplate>, DirectoryError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Templates used when none are supplied.
pub fn default_templates() -> Vec<RecurrenceTemplate> {
    let template = |name: &str,
                    description: &str,
                    frequency: Frequency,
                    time: Time,
                    duration: u32,
                    day: Option<&str>| {
        RecurrenceTemplate {
            name: name.to_string(),
            description: description.to_string(),
            frequency,
            time,
            duration,
            day: day.map(str::to_string),
            location: None,
        }
    };

    vec![
        template(
            "Daily Standup",
            "Quick sync on progress and blockers",
            Frequency::Daily,
            time::macros::time!(09:30),
            15,
            None,
        ),
        template(
            "Team Meeting",
            "Weekly team sync and announcements",
            Frequency::Weekly,
            time::macros::time!(14:00),
            60,
            Some("Tuesday"),
        ),
        template(
            "1:1 with Manager",
            "Career and project check-in",
            Frequency::Weekly,
            time::macros::time!(11:00),
            30,
            Some("Thursday"),
        ),
        template(
            "Code Review Session",
            "Walk through open pull requests",
            Frequency::Weekly,
            time::macros::time!(16:00),
            60,
            Some("Wednesday"),
        ),
        template(
            "Sprint Planning",
            "Plan the upcoming sprint",
            Frequency::Biweekly,
            time::macros::time!(10:00),
            90,
            Some("Monday"),
        ),
        template(
            "Sprint Retrospective",
            "Reflect on the last sprint",
            Frequency::Biweekly,
            time::macros::time!(15:00),
            60,
            Some("Friday"),
        ),
        template(
            "All Hands",
            "Company-wide update",
            Frequency::Monthly,
            time::macros::time!(16:00),
            60,
            None,
        ),
    ]
}

/// Generated event data ready for tabulation.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedEvent {
    pub user_id: PersonId,
    pub title: String,
    pub description: String,
    pub start_time: PrimitiveDateTime,
    pub end_time: PrimitiveDateTime,
    pub location: String,
    pub all_day: bool,
    pub calendar_id: String,
    pub rrule: Option<String>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

/// Expands templates over a fixed window.
pub struct RecurrenceExpander {
    window: GenerationWindow,
    created_at: PrimitiveDateTime,
}

impl RecurrenceExpander {
    /// `created_at` stamps the creation/update columns of every event.
    pub fn new(window: GenerationWindow, created_at: PrimitiveDateTime) -> Self {
        Self { window, created_at }
    }

    pub fn window(&self) -> GenerationWindow {
        self.window
    }

    /// Dates on which `template` occurs inside the window, in order.
    pub fn occurrence_dates(&self, template: &RecurrenceTemplate) -> Vec<Date> {
        match template.frequency {
            Frequency::Daily => self
                .window
                .days()
                .filter(|d| is_workday(d.weekday()))
                .collect(),
            Frequency::Weekly => self.stepped(template.target_weekday(), 7),
            Frequency::Biweekly => self.stepped(template.target_weekday(), 14),
            Frequency::Monthly => self.first_fridays(),
        }
    }

    /// Materializes every occurrence of `template` for one owner.
    pub fn expand(
        &self,
        template: &RecurrenceTemplate,
        owner: PersonId,
        calendar_id: &str,
    ) -> Vec<GeneratedEvent> {
        let rrule = template.rrule();
        let duration = Duration::minutes(i64::from(template.duration));

        self.occurrence_dates(template)
            .into_iter()
            .map(|date| {
                let start_time = PrimitiveDateTime::new(date, template.time);
                GeneratedEvent {
                    user_id: owner,
                    title: template.name.clone(),
                    description: template.description.clone(),
                    start_time,
                    end_time: start_time + duration,
                    location: template.location().to_string(),
                    all_day: false,
                    calendar_id: calendar_id.to_string(),
                    rrule: Some(rrule.clone()),
                    created_at: self.created_at,
                    updated_at: self.created_at,
                }
            })
            .collect()
    }

    /// Expands every template for one owner, template by template.
    pub fn expand_all(
        &self,
        templates: &[RecurrenceTemplate],
        owner: PersonId,
        calendar_id: &str,
    ) -> Vec<GeneratedEvent> {
        templates
            .iter()
            .flat_map(|t| self.expand(t, owner, calendar_id))
            .collect()
    }

    /// Target weekdays strictly after the window start, `step` days apart.
    ///
    /// When the window starts on the target weekday that day counts as
    /// already passed and the series begins a week later.
    fn stepped(&self, target: Weekday, step: i64) -> Vec<Date> {
        let start = self.window.start;
        let mut days_ahead = i64::from(target.number_days_from_monday())
            - i64::from(start.weekday().number_days_from_monday());
        if days_ahead <= 0 {
            days_ahead += 7;
        }

        let first = start + Duration::days(days_ahead);
        std::iter::successors(Some(first), |d| d.checked_add(Duration::days(step)))
            .take_while(|d| *d <= self.window.end)
            .collect()
    }

    /// First Friday of each calendar month the window touches, when inside the window.
    fn first_fridays(&self) -> Vec<Date> {
        let mut dates = Vec::new();
        let (mut year, mut month) = (self.window.start.year(), self.window.start.month());

        loop {
            if let Some(friday) = first_friday(year, month)
                && self.window.contains(friday)
            {
                dates.push(friday);
            }

            if (year, month) == (self.window.end.year(), self.window.end.month()) {
                break;
            }
            if month == Month::December {
                year += 1;
            }
            month = month.next();
        }

        dates
    }
}

fn first_friday(year: i32, month: Month) -> Option<Date> {
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    let offset = (i64::from(Weekday::Friday.number_days_from_monday()) + 7
        - i64::from(first.weekday().number_days_from_monday()))
        % 7;
    Some(first + Duration::days(offset))
}
