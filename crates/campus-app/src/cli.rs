//! Command-line arguments for the campus assistant server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use campus_core::CampusConfig;

/// Campus assistant: answers questions about venue crowds, dining, hours and events.
#[derive(Parser, Debug, Default)]
#[command(name = "campus", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Address to bind the API server to.
    #[arg(short = 'b', long = "bind")]
    pub bind: Option<String>,

    /// Venue catalog JSON file.
    #[arg(long = "catalog")]
    pub catalog: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Priority: --config flag > CAMPUS_CONFIG env var > ./campus.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CAMPUS_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("campus.toml")
    }

    /// Priority: --port flag > CAMPUS_PORT env var > config file value > 3030.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        self.resolve_port_with(config_port, std::env::var("CAMPUS_PORT").ok())
    }

    fn resolve_port_with(&self, config_port: u16, env_port: Option<String>) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Some(p) = env_port.and_then(|val| val.parse::<u16>().ok()) {
            return p;
        }
        if config_port != 0 {
            return config_port;
        }
        3030
    }

    /// Write CLI and environment overrides into `config`.
    pub fn apply(&self, config: &mut CampusConfig) {
        config.general.port = self.resolve_port(config.general.port);
        if let Some(ref bind) = self.bind {
            config.general.bind_address = bind.clone();
        }
        if let Some(ref catalog) = self.catalog {
            config.crowd.catalog_path = catalog.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_priority() {
        let args = CliArgs {
            port: Some(9000),
            ..Default::default()
        };
        assert_eq!(args.resolve_port_with(4000, Some("5000".to_string())), 9000);

        let args = CliArgs::default();
        assert_eq!(args.resolve_port_with(4000, Some("5000".to_string())), 5000);
        assert_eq!(args.resolve_port_with(4000, Some("nope".to_string())), 4000);
        assert_eq!(args.resolve_port_with(0, None), 3030);
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let args = CliArgs::parse_from(["campus", "--config", "/tmp/x.toml"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/x.toml"));
    }

    #[test]
    fn test_apply_overrides() {
        let args = CliArgs::parse_from([
            "campus",
            "--port",
            "8080",
            "--bind",
            "0.0.0.0",
            "--catalog",
            "/srv/venues.json",
            "-l",
            "debug",
        ]);
        let mut config = CampusConfig::default();
        args.apply(&mut config);
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.general.bind_address, "0.0.0.0");
        assert_eq!(config.crowd.catalog_path, "/srv/venues.json");
        assert_eq!(config.general.log_level, "debug");
    }
}
