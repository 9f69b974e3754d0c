use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::{PipelineError, Result, Source};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Sqlite connection string, e.g. `articles.db`.
    pub conn: String,
}

/// Translation policy. Everything here has a default so a minimal config
/// only needs sources and a database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub api_url: String,
    pub model: String,
    /// Language the source feeds are written in.
    pub language: String,
    /// Maximum number of in-flight translation requests per sweep.
    pub max_in_flight: usize,
    /// Minimum interval between the content sweep and the title sweep.
    pub sweep_pause_secs: u64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.together.xyz/v1/chat/completions".to_string(),
            model: "mistralai/Mistral-7B-Instruct-v0.2".to_string(),
            language: "Danish".to_string(),
            max_in_flight: 8,
            sweep_pause_secs: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sources: Vec<Source>,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let config: Config = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations whose feed endpoints are not http(s) URLs.
    fn validate(&self) -> Result<()> {
        for source in &self.sources {
            let parsed = Url::parse(&source.feed)?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(PipelineError::Config(format!(
                    "source {} uses unsupported feed scheme {}",
                    source.name,
                    parsed.scheme()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExtractionMode;

    #[test]
    fn minimal_config_uses_translator_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "sources": [
                    {"name": "paper", "feed": "https://paper.example/rss", "extraction": "content", "category": "news"}
                ],
                "database": {"conn": "articles.db"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].extraction, ExtractionMode::Content);
        assert_eq!(config.database.conn, "articles.db");
        assert_eq!(config.translator.max_in_flight, 8);
        assert_eq!(config.translator.sweep_pause_secs, 4);
        assert_eq!(config.translator.language, "Danish");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn non_http_feed_is_rejected() {
        let config: Config = serde_json::from_str(
            r#"{
                "sources": [{"name": "bad", "feed": "ftp://bad.example/feed"}],
                "database": {"conn": "articles.db"}
            }"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Config(_))
        ));
    }
}
