use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// How an article's body is obtained from a feed entry.
///
/// Resolved once when the configuration is deserialized; there is no
/// runtime field lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Read the entry's summary/description field.
    #[default]
    Summary,
    /// Read the entry's full content body.
    Content,
    /// Fetch the linked page and use its text.
    FetchWebsite,
}

/// A configured feed endpoint plus its extraction and category metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub feed: String,
    #[serde(default)]
    pub extraction: ExtractionMode,
    #[serde(default)]
    pub category: String,
}

/// One ingested content item, identified by the SHA-256 of its link.
///
/// `translated_content` and `translated_title` start empty and stay empty
/// when translation fails; that is a valid terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub content: String,
    pub source: String,
    pub category: String,
    pub translated_content: String,
    pub translated_title: String,
}

impl Article {
    pub fn new(
        title: String,
        link: String,
        published_at: DateTime<Utc>,
        content: String,
        source: &Source,
    ) -> Self {
        Self {
            id: article_id(&link),
            title,
            link,
            published_at,
            content,
            source: source.name.clone(),
            category: source.category.clone(),
            translated_content: String::new(),
            translated_title: String::new(),
        }
    }
}

/// Derive the stable identity of an article from its link.
///
/// Same link ⇒ same id, always; the id doubles as the storage primary key
/// and the dedup key.
pub fn article_id(link: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(link.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("API credential is not set")]
    MissingCredential,

    #[error("input text is empty")]
    EmptyInput,

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic() {
        let link = "https://example.com/articles/1";
        assert_eq!(article_id(link), article_id(link));
    }

    #[test]
    fn id_differs_for_different_links() {
        assert_ne!(
            article_id("https://example.com/articles/1"),
            article_id("https://example.com/articles/2")
        );
    }

    #[test]
    fn id_is_hex_sha256() {
        let id = article_id("https://example.com");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn extraction_mode_from_config_json() {
        let source: Source = serde_json::from_str(
            r#"{"name": "a", "feed": "https://a.example/feed", "extraction": "fetch_website"}"#,
        )
        .unwrap();
        assert_eq!(source.extraction, ExtractionMode::FetchWebsite);
        assert_eq!(source.category, "");

        let source: Source =
            serde_json::from_str(r#"{"name": "b", "feed": "https://b.example/feed"}"#).unwrap();
        assert_eq!(source.extraction, ExtractionMode::Summary);
    }
}
