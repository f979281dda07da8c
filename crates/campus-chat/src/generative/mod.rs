//! Generative answer backends.

pub mod gemini;
pub mod offline;

use std::sync::Arc;

use campus_core::config::{GenerativeConfig, GenerativeProvider};
use tracing::info;

use crate::adapters::GenerativeAdapter;
use crate::error::GenerativeError;

pub use gemini::GeminiGenerator;
pub use offline::OfflineGenerator;

/// Build the configured generator.
///
/// Fails when the provider needs a credential that is not set.
pub fn build_generator(config: &GenerativeConfig) -> Result<Arc<dyn GenerativeAdapter>, GenerativeError> {
    let generator: Arc<dyn GenerativeAdapter> = match config.provider {
        GenerativeProvider::Offline => Arc::new(OfflineGenerator::new()),
        GenerativeProvider::Gemini => Arc::new(GeminiGenerator::from_config(config)?),
    };
    info!(generator = generator.name(), "Generative backend ready");
    Ok(generator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_offline_by_default() {
        let generator = build_generator(&GenerativeConfig::default()).unwrap();
        assert_eq!(generator.name(), "offline");
    }

    #[test]
    fn test_build_gemini_without_key_fails() {
        let config = GenerativeConfig {
            provider: GenerativeProvider::Gemini,
            api_key_env: "CAMPUS_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..GenerativeConfig::default()
        };
        let err = build_generator(&config).err().unwrap();
        assert!(matches!(err, GenerativeError::NotConfigured(_)));
    }
}
