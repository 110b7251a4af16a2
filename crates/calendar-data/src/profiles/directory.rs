//! Directory loading and synthetic directory generation.

use std::path::Path;

use fake::Fake;
use fake::faker::name::en::{FirstName, LastName};
use rand::Rng;
use thiserror::Error;

use super::OrgMember;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Loads a company directory from a JSON array of [`OrgMember`] entries.
pub fn load_directory(path: impl AsRef<Path>) -> Result<Vec<OrgMember>, DirectoryError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Generates a plausible software company directory.
///
/// The first member leads the company, each team gets a lead reporting to
/// them, and everyone else reports to their team lead.
pub struct DirectoryGenerator {
    teams: Vec<String>,
    positions: Vec<String>,
    domain: String,
}

impl DirectoryGenerator {
    pub fn new() -> Self {
        Self {
            teams: vec![
                "Platform".into(),
                "Mobile".into(),
                "Data".into(),
                "Growth".into(),
            ],
            positions: vec![
                "Software Engineer".into(),
                "Senior Software Engineer".into(),
                "QA Engineer".into(),
                "Product Designer".into(),
                "Data Analyst".into(),
            ],
            domain: "example.com".into(),
        }
    }

    /// Overrides the team names members are spread across.
    pub fn with_teams(mut self, teams: Vec<String>) -> Self {
        if !teams.is_empty() {
            self.teams = teams;
        }
        self
    }

    /// Generates `count` members.
    pub fn generate(&self, count: usize, rng: &mut impl Rng) -> Vec<OrgMember> {
        let mut members: Vec<OrgMember> = Vec::with_capacity(count);
        let mut leads: Vec<Option<String>> = vec![None; self.teams.len()];

        for idx in 0..count {
            let first_name: String = FirstName().fake_with_rng(rng);
            let last_name: String = LastName().fake_with_rng(rng);
            let email = format!(
                "{}.{}{}@{}",
                first_name.to_lowercase(),
                last_name.to_lowercase(),
                idx + 1,
                self.domain
            );

            let (position, team, reports_to) = if idx == 0 {
                ("CEO".to_string(), "Leadership".to_string(), "-".to_string())
            } else {
                let team_idx = (idx - 1) % self.teams.len();
                let team = self.teams[team_idx].clone();
                match &leads[team_idx] {
                    None => {
                        let ceo = members[0].full_name();
                        leads[team_idx] = Some(format!("{first_name} {last_name}"));
                        ("Engineering Manager".to_string(), team, ceo)
                    }
                    Some(lead) => {
                        let position = self.positions[rng.gen_range(0..self.positions.len())].clone();
                        (position, team, lead.clone())
                    }
                }
            };

            members.push(OrgMember {
                first_name,
                last_name,
                email,
                position,
                team,
                reports_to,
                description: String::new(),
                work_behavior: String::new(),
                personal_life: String::new(),
            });
        }

        members
    }
}

impl Default for DirectoryGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::{PersonId, Profile, Roster};
    use std::io::Write;

    #[test]
    fn test_generate_directory() {
        let generator = DirectoryGenerator::new();
        let mut rng = rand::thread_rng();
        let members = generator.generate(10, &mut rng);

        assert_eq!(members.len(), 10);
        assert_eq!(members[0].reports_to, "-");

        // Emails are unique even when fake names repeat
        let emails: std::collections::HashSet<_> = members.iter().map(|m| &m.email).collect();
        assert_eq!(emails.len(), 10);
    }

    #[test]
    fn test_generated_managers_resolve() {
        let generator = DirectoryGenerator::new();
        let mut rng = rand::thread_rng();
        let members = generator.generate(9, &mut rng);
        let roster = Roster::from_members(members.into_iter().map(|m| (m, Profile::default())));

        for person in roster.iter().skip(1) {
            assert!(
                roster.manager_of(person.id).is_some(),
                "{} should have a resolvable manager",
                person.name
            );
        }
        assert_eq!(roster.manager_of(PersonId(1)), None);
    }

    #[test]
    fn test_load_directory() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"first_name":"Ada","last_name":"Lovelace","email":"ada@example.com",
                "position":"CTO","team":"Leadership","reports_to":"-"}}]"#
        )
        .unwrap();

        let members = load_directory(file.path()).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].full_name(), "Ada Lovelace");
        assert!(members[0].description.is_empty());
    }
}
