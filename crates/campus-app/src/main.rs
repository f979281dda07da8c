//! Campus assistant binary - composition root.
//!
//! 1. Resolve configuration (CLI > env > TOML > defaults)
//! 2. Load the venue catalog and build the crowd estimator
//! 3. Build the generative backend named in `[generative]`
//! 4. Start the axum API server

mod cli;

use std::sync::Arc;

use clap::Parser;

use campus_api::state::AppState;
use campus_chat::{build_generator, GenerativeAdapter};
use campus_core::{CampusConfig, Clock, SystemClock};
use campus_crowd::CrowdEstimator;

use crate::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_file = args.resolve_config_path();
    let loaded = CampusConfig::load(&config_file);

    let default_level = args
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|c| c.general.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&default_level)),
        )
        .init();

    tracing::info!("Starting campus assistant v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(config) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Err(e) => {
            tracing::warn!(path = %config_file.display(), error = %e, "Using default configuration");
            CampusConfig::default()
        }
    };
    args.apply(&mut config);
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let crowd = Arc::new(CrowdEstimator::from_config(&config.crowd, clock.clone())?);
    tracing::info!(catalog = %config.crowd.catalog_path, "Venue catalog loaded");

    let generator = build_generator(&config.generative)?;
    tracing::info!(generator = generator.name(), "Generative backend ready");

    let state = AppState::without_records(config, crowd, generator, clock);
    campus_api::start_server(state).await?;

    Ok(())
}
