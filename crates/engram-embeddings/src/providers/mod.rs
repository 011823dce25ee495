//! Embedding providers and the config-driven factory.

mod hashed_provider;
mod http_provider;

pub use hashed_provider::HashedProvider;
pub use http_provider::HttpProvider;

use engram_core::config::EmbeddingConfig;
use engram_core::errors::{EmbeddingError, EngramResult};
use engram_core::traits::IEmbeddingProvider;
use tracing::info;

/// Build the provider named by `config.provider`.
pub fn create_provider(config: &EmbeddingConfig) -> EngramResult<Box<dyn IEmbeddingProvider>> {
    let provider: Box<dyn IEmbeddingProvider> = match config.provider.as_str() {
        "http" => Box::new(HttpProvider::from_config(config)?),
        "hashed" => Box::new(HashedProvider::new(config.dimensions)),
        other => {
            return Err(EmbeddingError::ProviderUnavailable {
                provider: other.to_string(),
            }
            .into())
        }
    };
    info!(provider = provider.name(), dims = provider.dimensions(), "embedding provider ready");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_selects_by_name() {
        let mut config = EmbeddingConfig::default();
        config.provider = "hashed".into();
        config.dimensions = 16;
        let p = create_provider(&config).unwrap();
        assert_eq!(p.name(), "hashed");
        assert_eq!(p.dimensions(), 16);

        config.provider = "onnx".into();
        assert!(create_provider(&config).is_err());
    }
}
