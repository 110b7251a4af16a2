//! Configuration types for calendar data generation.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::{Date, Duration, Weekday};

/// Inclusive date range that recurring events are materialized over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationWindow {
    /// First day of the window.
    pub start: Date,
    /// Last day of the window (inclusive).
    pub end: Date,
}

impl GenerationWindow {
    /// Days of history included before the reference date.
    pub const DAYS_BACK: i64 = 30;
    /// Days of future included after the reference date.
    pub const DAYS_AHEAD: i64 = 180;

    pub const fn new(start: Date, end: Date) -> Self {
        Self { start, end }
    }

    /// The standard window: one month back, six months ahead.
    pub fn around(today: Date) -> Self {
        Self::spanning(today, Self::DAYS_BACK, Self::DAYS_AHEAD)
    }

    /// A window with custom reach on both sides of `today`.
    pub fn spanning(today: Date, days_back: i64, days_ahead: i64) -> Self {
        Self {
            start: today - Duration::days(days_back),
            end: today + Duration::days(days_ahead),
        }
    }

    /// Returns true if `date` lies within the window.
    pub fn contains(&self, date: Date) -> bool {
        date >= self.start && date <= self.end
    }

    /// Iterates every date in the window in order.
    pub fn days(&self) -> impl Iterator<Item = Date> + '_ {
        std::iter::successors(Some(self.start), |d| d.next_day()).take_while(|d| *d <= self.end)
    }

    /// Number of Monday–Friday dates in the window.
    pub fn weekday_count(&self) -> usize {
        self.days().filter(|d| is_workday(d.weekday())).count()
    }
}

/// Returns true for Monday through Friday.
pub fn is_workday(day: Weekday) -> bool {
    !matches!(day, Weekday::Saturday | Weekday::Sunday)
}

/// Display attributes for one of the two calendars every person owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarStyle {
    pub name: String,
    pub color: String,
    pub text_color: String,
}

impl CalendarStyle {
    pub fn personal() -> Self {
        Self {
            name: "Personal".to_string(),
            color: "#34a853".to_string(),
            text_color: "#ffffff".to_string(),
        }
    }

    pub fn work() -> Self {
        Self {
            name: "Work".to_string(),
            color: "#4285f4".to_string(),
            text_color: "#ffffff".to_string(),
        }
    }
}

/// Connection settings for the external content provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of an OpenAI-compatible endpoint.
    pub base_url: String,
    /// Model name sent with every request.
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Attempts per unit for retryable failures.
    pub max_attempts: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_attempts: 2,
        }
    }
}

/// Configuration for a full seeding run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Days of history before the reference date.
    pub days_back: i64,

    /// Days of future after the reference date.
    pub days_ahead: i64,

    /// Seed for the per-unit random number generators.
    pub rng_seed: u64,

    /// Maximum number of generation units in flight at once.
    pub concurrency: usize,

    /// Where the generated script is written.
    pub output: PathBuf,

    /// SQLite database the script is executed against, if any.
    pub database_url: Option<String>,

    /// Company directory JSON. A synthetic directory is used when absent.
    pub org_file: Option<PathBuf>,

    /// Recurrence template JSON. Built-in templates are used when absent.
    pub templates_file: Option<PathBuf>,

    /// Concrete anchor date used at execution time (`YYYY-MM-DD`).
    pub today: Option<String>,

    /// Concrete session identifier used at execution time.
    pub session_id: Option<String>,

    /// Content provider settings. Generation runs offline when absent.
    pub provider: Option<ProviderConfig>,

    /// Size of the synthetic directory when no org file is given.
    pub synthetic_people: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            days_back: GenerationWindow::DAYS_BACK,
            days_ahead: GenerationWindow::DAYS_AHEAD,
            rng_seed: 42,
            concurrency: 8,
            output: PathBuf::from("output/calendar_data.sql"),
            database_url: None,
            org_file: None,
            templates_file: None,
            today: None,
            session_id: None,
            provider: None,
            synthetic_people: 12,
        }
    }
}

impl SeedConfig {
    /// Builds a configuration from defaults overlaid with `SEED_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(output) = env::var("SEED_OUTPUT") {
            config.output = PathBuf::from(output);
        }
        config.database_url = env::var("DATABASE_URL").ok();
        config.org_file = env::var("SEED_ORG_FILE").ok().map(PathBuf::from);
        config.templates_file = env::var("SEED_TEMPLATES_FILE").ok().map(PathBuf::from);
        config.today = env::var("SEED_TODAY").ok();
        config.session_id = env::var("SEED_SESSION_ID").ok();

        if let Some(seed) = env::var("SEED_RNG_SEED").ok().and_then(|s| s.parse().ok()) {
            config.rng_seed = seed;
        }
        if let Some(n) = env::var("SEED_CONCURRENCY").ok().and_then(|s| s.parse().ok()) {
            config.concurrency = n;
        }
        if let Some(n) = env::var("SEED_PEOPLE").ok().and_then(|s| s.parse().ok()) {
            config.synthetic_people = n;
        }

        if let Ok(base_url) = env::var("SEED_PROVIDER_URL") {
            let mut provider = ProviderConfig {
                base_url,
                ..Default::default()
            };
            if let Ok(model) = env::var("SEED_MODEL") {
                provider.model = model;
            }
            config.provider = Some(provider);
        }

        config
    }

    /// The generation window around `today` using the configured reach.
    pub fn window(&self, today: Date) -> GenerationWindow {
        GenerationWindow::spanning(today, self.days_back, self.days_ahead)
    }
}
