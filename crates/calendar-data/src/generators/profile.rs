//! Profile enrichment for directory members.
//!
//! With a provider, each member's profile comes from one content request.
//! Offline, profiles are synthesized locally from configured distributions.

use rand::Rng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Normal};
use serde_json::{Value, json};
use thiserror::Error;
use time::{Date, Duration};

use crate::api::{ContentProvider, ContentRequest, ProviderError};
use crate::profiles::{OrgMember, Profile};
use crate::timestamps::normalize_timestamp;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Unusable profile: {0}")]
    Malformed(String),
}

/// Configuration for locally synthesized profiles.
#[derive(Debug, Clone)]
pub struct ProfileGenConfig {
    /// Mean age in years.
    pub age_mean: f64,
    /// Standard deviation of age.
    pub age_std: f64,
    pub min_age: u8,
    pub max_age: u8,
    /// Longest tenure in days.
    pub max_tenure_days: i64,
    /// Probability of a gym membership.
    pub gym_rate: f64,
    pub pronouns: Vec<String>,
    pub marital_statuses: Vec<String>,
    pub hobbies: Vec<String>,
}

impl Default for ProfileGenConfig {
    fn default() -> Self {
        fn strings(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            age_mean: 36.0,
            age_std: 9.0,
            min_age: 22,
            max_age: 65,
            max_tenure_days: 3650,
            gym_rate: 0.4,
            pronouns: strings(&["she/her", "he/him", "they/them"]),
            marital_statuses: strings(&["Single", "Married", "In a relationship", "Divorced"]),
            hobbies: strings(&[
                "Running",
                "Cooking",
                "Photography",
                "Hiking",
                "Board games",
                "Gardening",
                "Cycling",
                "Reading",
                "Yoga",
                "Woodworking",
            ]),
        }
    }
}

/// Builds profiles for directory members.
pub struct ProfileGenerator {
    config: ProfileGenConfig,
}

impl ProfileGenerator {
    /// Creates a new profile generator with default configuration.
    pub fn new() -> Self {
        Self {
            config: ProfileGenConfig::default(),
        }
    }

    /// Creates a generator with custom configuration.
    pub fn with_config(config: ProfileGenConfig) -> Self {
        Self { config }
    }

    /// Requests and parses the profile of one member.
    pub async fn fetch(
        &self,
        provider: &dyn ContentProvider,
        member: &OrgMember,
    ) -> Result<Profile, ProfileError> {
        let response = provider.generate(&self.request(member)).await?;
        self.parse(&response)
    }

    /// Content request describing `member`.
    pub fn request(&self, member: &OrgMember) -> ContentRequest {
        let prompt = format!(
            "Create a realistic profile for an employee of a software company.\n\n\
             Name: {}\nEmail: {}\nPosition: {}\nTeam: {}\nReports to: {}\n\
             Description: {}\nWork behavior: {}\nPersonal life: {}\n\n\
             Keep the profile consistent with the description. Dates use YYYY-MM-DD.",
            member.full_name(),
            member.email,
            member.position,
            member.team,
            member.reports_to,
            member.description,
            member.work_behavior,
            member.personal_life,
        );

        ContentRequest::new(prompt).with_schema("user_profile", profile_schema())
    }

    /// Extracts a [`Profile`] from a provider response.
    ///
    /// Accepts both the nested layout (`personal`, `professional`,
    /// `personal_life`) and a flat object. Only a missing age is fatal;
    /// other fields fall back to empty values.
    pub fn parse(&self, value: &Value) -> Result<Profile, ProfileError> {
        if !value.is_object() {
            return Err(ProfileError::Malformed("response is not an object".to_string()));
        }
        let field = |nested: &str, flat: &str| {
            value
                .pointer(nested)
                .or_else(|| value.get(flat))
                .filter(|v| !v.is_null())
        };

        let age = field("/personal/age", "age")
            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.trim().parse().ok()))
            .and_then(|age| u8::try_from(age).ok())
            .ok_or_else(|| ProfileError::Malformed("missing age".to_string()))?;

        let text = |nested: &str, flat: &str| {
            field(nested, flat)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let hobbies = field("/personal_life/hobbies", "hobbies")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|h| h.as_str().or_else(|| h.get("name")?.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Profile {
            age: Some(age),
            pronouns: text("/personal/pronouns", "pronouns"),
            start_date: text("/professional/start_date", "start_date")
                .and_then(|s| normalize_timestamp(&s))
                .map(|ts| ts.date()),
            marital_status: text("/personal_life/family/marital_status", "marital_status"),
            hobbies,
            gym_member: field("/personal_life/health/gym_member", "gym_member")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    /// Synthesizes a profile without a provider.
    pub fn synthesize(&self, today: Date, rng: &mut impl Rng) -> Profile {
        let sampled = match Normal::new(self.config.age_mean, self.config.age_std) {
            Ok(normal) => normal.sample(rng),
            Err(_) => self.config.age_mean,
        };
        let age = sampled
            .round()
            .clamp(f64::from(self.config.min_age), f64::from(self.config.max_age)) as u8;

        let tenure = rng.gen_range(0..=self.config.max_tenure_days.max(0));
        let hobby_count = rng.gen_range(1..=3);

        Profile {
            age: Some(age),
            pronouns: self.config.pronouns.choose(rng).cloned(),
            start_date: Some(today - Duration::days(tenure)),
            marital_status: self.config.marital_statuses.choose(rng).cloned(),
            hobbies: self
                .config
                .hobbies
                .choose_multiple(rng, hobby_count)
                .cloned()
                .collect(),
            gym_member: rng.gen_bool(self.config.gym_rate.clamp(0.0, 1.0)),
        }
    }
}

impl Default for ProfileGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn profile_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "personal": {
                "type": "object",
                "properties": {
                    "age": { "type": "integer", "minimum": 18, "maximum": 70 },
                    "pronouns": { "type": "string" }
                },
                "required": ["age", "pronouns"]
            },
            "professional": {
                "type": "object",
                "properties": { "start_date": { "type": "string" } },
                "required": ["start_date"]
            },
            "personal_life": {
                "type": "object",
                "properties": {
                    "family": {
                        "type": "object",
                        "properties": { "marital_status": { "type": "string" } }
                    },
                    "hobbies": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": { "name": { "type": "string" } }
                        }
                    },
                    "health": {
                        "type": "object",
                        "properties": { "gym_member": { "type": "boolean" } }
                    }
                }
            }
        },
        "required": ["personal", "professional", "personal_life"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::tests::member;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use time::macros::date;

    #[test]
    fn test_parse_nested() {
        let response = json!({
            "personal": { "age": 34, "pronouns": "she/her" },
            "professional": { "start_date": "2019-3-4" },
            "personal_life": {
                "family": { "marital_status": "Married" },
                "hobbies": [{ "name": "Climbing" }, { "name": "Chess" }],
                "health": { "gym_member": true }
            }
        });

        let profile = ProfileGenerator::new().parse(&response).unwrap();
        assert_eq!(profile.age, Some(34));
        assert_eq!(profile.pronouns.as_deref(), Some("she/her"));
        assert_eq!(profile.start_date, Some(date!(2019 - 03 - 04)));
        assert_eq!(profile.marital_status.as_deref(), Some("Married"));
        assert_eq!(profile.hobbies, vec!["Climbing", "Chess"]);
        assert!(profile.gym_member);
    }

    #[test]
    fn test_parse_flat() {
        let response = json!({ "age": "41", "hobbies": ["Sailing"], "start_date": "soon" });

        let profile = ProfileGenerator::new().parse(&response).unwrap();
        assert_eq!(profile.age, Some(41));
        assert_eq!(profile.hobbies, vec!["Sailing"]);
        assert_eq!(profile.start_date, None);
        assert!(!profile.gym_member);
    }

    #[test]
    fn test_parse_rejects_unusable() {
        let generator = ProfileGenerator::new();
        assert!(generator.parse(&json!("text")).is_err());
        assert!(generator.parse(&json!({ "pronouns": "he/him" })).is_err());
        assert!(generator.parse(&json!({ "age": 700 })).is_err());
    }

    #[test]
    fn test_request_mentions_member() {
        let request = ProfileGenerator::new().request(&member("Ada", "Lovelace", "Platform", "-"));
        assert!(request.prompt.contains("Ada Lovelace"));
        assert!(request.prompt.contains("Team: Platform"));
        assert!(request.schema.is_some());
    }

    #[test]
    fn test_synthesize_within_bounds() {
        let generator = ProfileGenerator::new();
        let mut rng = StdRng::seed_from_u64(11);
        let today = date!(2024 - 01 - 15);

        for _ in 0..100 {
            let profile = generator.synthesize(today, &mut rng);
            let age = profile.age.unwrap();
            assert!((22..=65).contains(&age));
            assert!(profile.start_date.unwrap() <= today);
            assert!((1..=3).contains(&profile.hobbies.len()));
        }
    }
}
