use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CampusError, Result};

/// Top-level configuration for the campus assistant.
///
/// Loaded from `~/.campus/config.toml` by default. Each section corresponds
/// to one subsystem of the query pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampusConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub crowd: CrowdConfig,
    #[serde(default)]
    pub generative: GenerativeConfig,
}

impl CampusConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CampusConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.dispatcher.worker_pool_size == 0 {
            return Err(CampusError::Config(
                "dispatcher.worker_pool_size must be at least 1".to_string(),
            ));
        }
        if self.dispatcher.source_deadline_ms == 0 {
            return Err(CampusError::Config(
                "dispatcher.source_deadline_ms must be positive".to_string(),
            ));
        }
        if self.chat.stream_idle_timeout_secs == 0 {
            return Err(CampusError::Config(
                "chat.stream_idle_timeout_secs must be positive".to_string(),
            ));
        }
        let crowd = &self.crowd;
        if crowd.operating_start_hour >= crowd.operating_end_hour || crowd.operating_end_hour > 24
        {
            return Err(CampusError::Config(format!(
                "crowd operating window {}..{} is not a valid hour range",
                crowd.operating_start_hour, crowd.operating_end_hour
            )));
        }
        if crowd.high_threshold > 100 {
            return Err(CampusError::Config(format!(
                "crowd.high_threshold {} exceeds 100",
                crowd.high_threshold
            )));
        }
        if crowd.area_sigma_m <= 0.0 || crowd.area_radius_m <= 0.0 {
            return Err(CampusError::Config(
                "crowd.area_radius_m and crowd.area_sigma_m must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// HTTP server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bind_address: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

/// Conversational front-door settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Whether the chat endpoints accept turns.
    pub enabled: bool,
    /// Maximum message length in characters.
    pub max_message_length: usize,
    /// Sentence budget requested from the model for voice turns.
    pub voice_sentence_limit: u32,
    /// Longest wait for the next chunk of a generated answer before the
    /// turn is failed and its session released.
    pub stream_idle_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_message_length: 2000,
            voice_sentence_limit: 3,
            stream_idle_timeout_secs: 30,
        }
    }
}

/// Source fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Process-wide number of concurrently running source calls.
    pub worker_pool_size: usize,
    /// Per-source deadline in milliseconds, including time spent queued.
    pub source_deadline_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 8,
            source_deadline_ms: 3000,
        }
    }
}

/// How sub-venue readings are blended into one estimate for their place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubVenueWeighting {
    /// Weight by recorded visit share when every contributor has one.
    #[default]
    VisitShare,
    /// Plain arithmetic mean.
    Unweighted,
}

/// Crowd-level estimator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrowdConfig {
    /// Path to the JSON venue catalog.
    pub catalog_path: String,
    /// Popularity at or above which an hour counts toward the peak window.
    pub high_threshold: u8,
    /// First hour (inclusive) sampled for peak profiles.
    pub operating_start_hour: u32,
    /// Last hour (exclusive) sampled for peak profiles.
    pub operating_end_hour: u32,
    /// Radius in meters for the area-weighted fallback.
    pub area_radius_m: f64,
    /// Gaussian kernel width in meters for the area-weighted fallback.
    pub area_sigma_m: f64,
    /// An explicit target within this many minutes of the clock counts as "now".
    pub now_tolerance_minutes: i64,
    /// Sub-venue blending policy.
    pub sub_venue_weighting: SubVenueWeighting,
}

impl Default for CrowdConfig {
    fn default() -> Self {
        Self {
            catalog_path: "data/venues.json".to_string(),
            high_threshold: 60,
            operating_start_hour: 7,
            operating_end_hour: 23,
            area_radius_m: 300.0,
            area_sigma_m: 150.0,
            now_tolerance_minutes: 30,
            sub_venue_weighting: SubVenueWeighting::VisitShare,
        }
    }
}

/// Which generative backend produces answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerativeProvider {
    /// Template answers composed from the context, no network.
    #[default]
    Offline,
    /// Google Gemini REST API.
    Gemini,
}

/// Generative service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerativeConfig {
    pub provider: GenerativeProvider,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout in seconds for opening a generation stream.
    pub request_timeout_secs: u64,
    /// System instruction attached to every conversation.
    pub system_prompt: String,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            provider: GenerativeProvider::Offline,
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.7,
            api_key_env: "GEMINI_API_KEY".to_string(),
            request_timeout_secs: 30,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Default system instruction for campus conversations.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful campus assistant with access to \
information about dining menus, dining hall and restaurant hours, gym hours, library hours, \
campus events, and how crowded campus venues are. When a data source reports that information \
is unavailable, say so plainly instead of guessing. Never invent crowd percentages. Be concise, \
friendly, and helpful. You remember everything said earlier in this conversation.";
