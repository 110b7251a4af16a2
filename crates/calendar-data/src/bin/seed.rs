//! Default seed script - generates a calendar fixture script and optionally runs it
//!
//! Run with:
//! ```
//! SEED_OUTPUT=output/calendar.sql DATABASE_URL=sqlite://calendar.db?mode=rwc \
//!     cargo run -p calendar-data --bin seed
//! ```

use std::sync::Arc;

use anyhow::Context;
use calendar_data::api::ChatCompletionsProvider;
use calendar_data::builders::ScenarioBuilder;
use calendar_data::config::SeedConfig;
use calendar_data::db::{ScriptBindings, Seeder, default_session_id, write_script};
use calendar_data::generators::load_templates;
use calendar_data::profiles::load_directory;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SeedConfig::from_env();
    let now = OffsetDateTime::now_utc();
    let now = PrimitiveDateTime::new(now.date(), now.time());

    let today = match config.today.as_deref() {
        Some(raw) => Date::parse(raw, format_description!("[year]-[month]-[day]"))
            .with_context(|| format!("SEED_TODAY must be YYYY-MM-DD, got {raw}"))?,
        None => now.date(),
    };

    let mut builder = ScenarioBuilder::from_config(&config).with_now(now);

    if let Some(path) = &config.org_file {
        let members = load_directory(path)
            .with_context(|| format!("Failed to load directory {}", path.display()))?;
        builder = builder.with_members(members);
    }
    if let Some(path) = &config.templates_file {
        let templates = load_templates(path)
            .with_context(|| format!("Failed to load templates {}", path.display()))?;
        builder = builder.with_templates(templates);
    }
    if let Some(provider_config) = &config.provider {
        match ChatCompletionsProvider::from_config(provider_config) {
            Ok(provider) => builder = builder.with_provider(Arc::new(provider)),
            Err(e) => tracing::warn!("Content provider disabled: {e}"),
        }
    }

    tracing::info!(
        "Generating window {} to {}",
        builder.window().start,
        builder.window().end
    );
    let result = builder.with_metrics(true).build_data().await;
    write_script(&config.output, &result.to_script()).await?;

    if let Some(database_url) = &config.database_url {
        let session_id = config
            .session_id
            .clone()
            .unwrap_or_else(|| default_session_id(now));
        let bindings = ScriptBindings::new(today, session_id);

        let mut seeder = Seeder::connect(database_url).await?;
        tracing::info!("Connected to database");
        seeder.prepare().await?;
        seeder.seed_file(&config.output, &bindings).await?;
        seeder.close().await?;
    }

    // Summary output
    tracing::info!("Seed completed!");
    tracing::info!("  Users: {}", result.users.len());
    tracing::info!("  Calendars: {}", result.calendars.len());
    tracing::info!("  Events: {}", result.events.len());
    tracing::info!("  Attendees: {}", result.attendees.len());
    if let Some(metrics) = &result.metrics {
        tracing::info!("  Dropped members: {}", metrics.dropped_members);
        tracing::info!("  Generation time: {} ms", metrics.generation_time_ms);
    }

    Ok(())
}
