use cleanup::Cleaner;
use config::Config;
use envconfig::Envconfig;
use eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cleanup_common::session::MySqlConnector;
use cleanup_common::store::MySqlConfigStore;

mod cleanup;
mod config;
mod report;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::init_from_env().expect("failed to load configuration from env");

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        group_id = ?config.group_id,
        dry_run = config.dry_run,
        profiles = ?config.connection_profiles,
        "starting cleanup-janitor"
    );

    if config.connection_profiles.is_empty() && !config.dry_run {
        warn!("CONNECTION_PROFILES is empty, every cleanup config will fail to connect");
    }

    let store = MySqlConfigStore::connect(&config.config_database_url, &config.config_table).await?;
    let connector = MySqlConnector::new(config.connection_profiles.clone());
    let cleaner = Cleaner::new(store, connector, config.dry_run);

    let report = cleaner.run(config.group_id).await?;
    report.log_summary();

    if config.report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    // A non-zero exit lets the scheduler decide whether to retry the group.
    if report.has_failures() {
        eyre::bail!(
            "{} of {} cleanup configs failed",
            report.failed(),
            report.outcomes.len()
        );
    }

    Ok(())
}
