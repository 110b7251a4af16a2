//! User and calendar rows derived from the roster.

use time::PrimitiveDateTime;

use crate::config::CalendarStyle;
use crate::profiles::{Person, PersonId, Profile, Roster};

/// Generated user data ready for tabulation.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedUser {
    pub id: PersonId,
    pub name: String,
    pub email: String,
    pub role: String,
    pub team: String,
    pub reports_to: Option<String>,
    pub profile: Profile,
    pub created_at: PrimitiveDateTime,
}

/// Generated calendar data. Calendar ids are derived from the owner id.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCalendar {
    pub id: String,
    pub user_id: PersonId,
    pub name: String,
    pub color: String,
    pub text_color: String,
    pub created_at: PrimitiveDateTime,
}

/// Configuration for user generation.
#[derive(Debug, Clone)]
pub struct UserGenConfig {
    /// Style of everyone's personal calendar.
    pub personal_calendar: CalendarStyle,
    /// Style of everyone's work calendar.
    pub work_calendar: CalendarStyle,
}

impl Default for UserGenConfig {
    fn default() -> Self {
        Self {
            personal_calendar: CalendarStyle::personal(),
            work_calendar: CalendarStyle::work(),
        }
    }
}

/// Turns roster entries into users and their two calendars.
pub struct UserGenerator {
    config: UserGenConfig,
    created_at: PrimitiveDateTime,
}

impl UserGenerator {
    /// Creates a new user generator with default configuration.
    pub fn new(created_at: PrimitiveDateTime) -> Self {
        Self::with_config(UserGenConfig::default(), created_at)
    }

    /// Creates a generator with custom configuration.
    pub fn with_config(config: UserGenConfig, created_at: PrimitiveDateTime) -> Self {
        Self { config, created_at }
    }

    /// Generates the user row of one person.
    pub fn generate(&self, person: &Person) -> GeneratedUser {
        GeneratedUser {
            id: person.id,
            name: person.name.clone(),
            email: person.email.clone(),
            role: person.role.clone(),
            team: person.team.clone(),
            reports_to: person.reports_to.clone(),
            profile: person.profile.clone(),
            created_at: self.created_at,
        }
    }

    /// Personal and work calendars of one person, in that order.
    pub fn calendars(&self, person: &Person) -> Vec<GeneratedCalendar> {
        [
            (person.personal_calendar_id(), &self.config.personal_calendar),
            (person.work_calendar_id(), &self.config.work_calendar),
        ]
        .into_iter()
        .map(|(id, style)| GeneratedCalendar {
            id,
            user_id: person.id,
            name: style.name.clone(),
            color: style.color.clone(),
            text_color: style.text_color.clone(),
            created_at: self.created_at,
        })
        .collect()
    }

    /// Users and calendars for the whole roster, in id order.
    pub fn generate_batch(&self, roster: &Roster) -> (Vec<GeneratedUser>, Vec<GeneratedCalendar>) {
        let users = roster.iter().map(|p| self.generate(p)).collect();
        let calendars = roster.iter().flat_map(|p| self.calendars(p)).collect();
        (users, calendars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::tests::sample_roster;
    use time::macros::datetime;

    #[test]
    fn test_generate_batch() {
        let roster = sample_roster();
        let generator = UserGenerator::new(datetime!(2024-01-15 08:00:00));
        let (users, calendars) = generator.generate_batch(&roster);

        assert_eq!(users.len(), roster.len());
        assert_eq!(calendars.len(), roster.len() * 2);
        assert_eq!(users[0].id, PersonId(1));
        assert_eq!(users[1].reports_to.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_calendar_styles() {
        let roster = sample_roster();
        let person = roster.get(PersonId(2)).unwrap();
        let calendars = UserGenerator::new(datetime!(2024-01-15 08:00:00)).calendars(person);

        assert_eq!(calendars[0].id, "user_2_personal");
        assert_eq!(calendars[0].name, "Personal");
        assert_eq!(calendars[0].color, "#34a853");
        assert_eq!(calendars[1].id, "user_2_work");
        assert_eq!(calendars[1].color, "#4285f4");
        assert!(calendars.iter().all(|c| c.text_color == "#ffffff"));
    }
}
