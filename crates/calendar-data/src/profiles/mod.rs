//! Company directory and person records.
//!
//! The [`Roster`] maps a stable [`PersonId`] to a typed [`Person`]. Ids are
//! assigned once, in directory order starting at 1, which is also the order
//! users are inserted in. The generated script therefore assumes it runs
//! against an empty `users` table.

mod directory;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::Date;

pub use directory::{DirectoryError, DirectoryGenerator, load_directory};

/// Stable identifier of a person; matches the `users.id` the database assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonId(pub i64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the company directory, as supplied by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgMember {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: String,
    pub team: String,
    /// Full name of the manager, `-` or empty when there is none.
    #[serde(default)]
    pub reports_to: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub work_behavior: String,
    #[serde(default)]
    pub personal_life: String,
}

impl OrgMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Personal details that enrich a directory entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub pronouns: Option<String>,
    #[serde(default)]
    pub start_date: Option<Date>,
    #[serde(default)]
    pub marital_status: Option<String>,
    #[serde(default)]
    pub hobbies: Vec<String>,
    #[serde(default)]
    pub gym_member: bool,
}

/// A member of the roster.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub email: String,
    pub role: String,
    pub team: String,
    /// Manager's full name, if any.
    pub reports_to: Option<String>,
    pub profile: Profile,
}

impl Person {
    /// Calendar id of this person's personal calendar.
    pub fn personal_calendar_id(&self) -> String {
        format!("user_{}_personal", self.id)
    }

    /// Calendar id of this person's work calendar.
    pub fn work_calendar_id(&self) -> String {
        format!("user_{}_work", self.id)
    }
}

/// Immutable directory of people keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    people: BTreeMap<PersonId, Person>,
}

impl Roster {
    /// Builds a roster from directory entries, assigning ids 1..=n in order.
    pub fn from_members(members: impl IntoIterator<Item = (OrgMember, Profile)>) -> Self {
        let people = members
            .into_iter()
            .enumerate()
            .map(|(idx, (member, profile))| {
                let id = PersonId(idx as i64 + 1);
                let reports_to = Some(member.reports_to.trim())
                    .filter(|name| !name.is_empty() && *name != "-")
                    .map(str::to_string);
                let person = Person {
                    id,
                    name: member.full_name(),
                    email: member.email,
                    role: member.position,
                    team: member.team,
                    reports_to,
                    profile,
                };
                (id, person)
            })
            .collect();

        Self { people }
    }

    pub fn get(&self, id: PersonId) -> Option<&Person> {
        self.people.get(&id)
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    /// People in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Person> {
        self.people.values()
    }

    /// All ids in order.
    pub fn ids(&self) -> Vec<PersonId> {
        self.people.keys().copied().collect()
    }

    /// Finds a person by exact full name.
    pub fn find_by_name(&self, name: &str) -> Option<&Person> {
        self.people.values().find(|p| p.name == name)
    }

    /// Resolves the manager of `id` through the `reports_to` name.
    pub fn manager_of(&self, id: PersonId) -> Option<PersonId> {
        let person = self.get(id)?;
        let manager_name = person.reports_to.as_deref()?;
        self.find_by_name(manager_name).map(|m| m.id)
    }

    /// Everyone sharing `id`'s team, in id order. `None` if `id` is unknown.
    pub fn team_of(&self, id: PersonId) -> Option<Vec<PersonId>> {
        let team = &self.get(id)?.team;
        Some(
            self.people
                .values()
                .filter(|p| &p.team == team)
                .map(|p| p.id)
                .collect(),
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn member(first: &str, last: &str, team: &str, reports_to: &str) -> OrgMember {
        OrgMember {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase()),
            position: "Software Engineer".to_string(),
            team: team.to_string(),
            reports_to: reports_to.to_string(),
            description: String::new(),
            work_behavior: String::new(),
            personal_life: String::new(),
        }
    }

    pub(crate) fn sample_roster() -> Roster {
        Roster::from_members(
            [
                member("Ada", "Lovelace", "Leadership", "-"),
                member("Grace", "Hopper", "Platform", "Ada Lovelace"),
                member("Alan", "Turing", "Platform", "Grace Hopper"),
                member("Edsger", "Dijkstra", "Platform", "Grace Hopper"),
                member("Barbara", "Liskov", "Mobile", "Ada Lovelace"),
                member("Ken", "Thompson", "Mobile", "Nobody Known"),
            ]
            .into_iter()
            .map(|m| (m, Profile::default())),
        )
    }

    #[test]
    fn test_ids_assigned_in_order() {
        let roster = sample_roster();
        assert_eq!(roster.len(), 6);
        assert_eq!(roster.ids().first(), Some(&PersonId(1)));
        assert_eq!(roster.get(PersonId(3)).map(|p| p.name.as_str()), Some("Alan Turing"));
    }

    #[test]
    fn test_manager_resolution() {
        let roster = sample_roster();
        assert_eq!(roster.manager_of(PersonId(3)), Some(PersonId(2)));
        // "-" means no manager
        assert_eq!(roster.manager_of(PersonId(1)), None);
        // Unknown names do not resolve
        assert_eq!(roster.manager_of(PersonId(6)), None);
    }

    #[test]
    fn test_team_lookup() {
        let roster = sample_roster();
        assert_eq!(
            roster.team_of(PersonId(3)),
            Some(vec![PersonId(2), PersonId(3), PersonId(4)])
        );
        assert_eq!(roster.team_of(PersonId(99)), None);
    }

    #[test]
    fn test_calendar_ids() {
        let roster = sample_roster();
        let person = roster.get(PersonId(2)).unwrap();
        assert_eq!(person.personal_calendar_id(), "user_2_personal");
        assert_eq!(person.work_calendar_id(), "user_2_work");
    }
}
