use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::extract::html_to_text;
use crate::types::{Article, ExtractionMode, PipelineError, Result, Source};

/// Minimum plain-text length for an item to count as a full article.
/// Shorter items are excerpts or placeholders and are silently dropped.
pub const MIN_CONTENT_LENGTH: usize = 100;

#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(concat!("feed-translator/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Fetch one source's feed and turn it into candidate articles.
    pub async fn fetch(&self, source: &Source) -> Result<Vec<Article>> {
        debug!("Fetching feed {} ({})", source.name, source.feed);
        let body = self.get_text(&source.feed).await?;
        self.articles_from_feed(source, &body).await
    }

    /// Parse a raw feed document into articles. Split out from `fetch` so
    /// the parse path can also run against fixture documents.
    pub async fn articles_from_feed(&self, source: &Source, body: &str) -> Result<Vec<Article>> {
        let feed = feed_rs::parser::parse(body.as_bytes())
            .map_err(|e| PipelineError::Parse(format!("{}: {}", source.name, e)))?;

        let mut articles = Vec::new();
        for entry in feed.entries {
            if let Some(article) = self.article_from_entry(source, entry).await {
                articles.push(article);
            }
        }

        info!("Source {} yielded {} articles", source.name, articles.len());
        Ok(articles)
    }

    async fn article_from_entry(&self, source: &Source, entry: Entry) -> Option<Article> {
        let link = entry.links.first()?.href.clone();
        let title = entry.title.map(|t| t.content).unwrap_or_default();
        let published = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let raw = match source.extraction {
            ExtractionMode::Summary => entry.summary.map(|s| s.content),
            ExtractionMode::Content => entry.content.and_then(|c| c.body),
            ExtractionMode::FetchWebsite => match self.get_text(&link).await {
                Ok(page) => Some(page),
                Err(e) => {
                    warn!("Error getting website content for {}: {}", link, e);
                    None
                }
            },
        }?;

        build_article(source, title, link, published, &raw)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn one entry's extracted raw content into an article, dropping items
/// whose plain text falls below the minimum length.
fn build_article(
    source: &Source,
    title: String,
    link: String,
    published_at: DateTime<Utc>,
    raw_content: &str,
) -> Option<Article> {
    let text = html_to_text(raw_content);
    if text.len() < MIN_CONTENT_LENGTH {
        debug!("Skipping short item {} ({} bytes)", link, text.len());
        return None;
    }
    Some(Article::new(title, link, published_at, text, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::article_id;

    fn source(extraction: ExtractionMode) -> Source {
        Source {
            name: "test".to_string(),
            feed: "https://test.example/feed".to_string(),
            extraction,
            category: "news".to_string(),
        }
    }

    #[test]
    fn length_filter_is_boundary_exact() {
        let src = source(ExtractionMode::Summary);
        let short = "x".repeat(99);
        let exact = "x".repeat(100);
        let link = "https://test.example/a".to_string();

        assert!(build_article(&src, "t".into(), link.clone(), Utc::now(), &short).is_none());

        let article = build_article(&src, "t".into(), link.clone(), Utc::now(), &exact)
            .expect("100-byte content should be kept");
        assert_eq!(article.content.len(), 100);
        assert_eq!(article.id, article_id(&link));
        assert_eq!(article.source, "test");
        assert_eq!(article.category, "news");
        assert!(article.translated_content.is_empty());
        assert!(article.translated_title.is_empty());
    }

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Avisen</title>
    <link>https://avisen.example/</link>
    <description>Dagens nyheder</description>
    <item>
      <title>Stor nyhed fra hovedstaden</title>
      <link>https://avisen.example/artikler/1</link>
      <description><![CDATA[<p>Dette er en lang artikel om dagens begivenheder i hovedstaden, med rigeligt indhold til at passere laengdefilteret uden problemer overhovedet.</p>]]></description>
      <pubDate>Thu, 28 Dec 2023 08:00:00 +0000</pubDate>
      <guid>https://avisen.example/artikler/1</guid>
    </item>
    <item>
      <title>Kort notits</title>
      <link>https://avisen.example/artikler/2</link>
      <description><![CDATA[For kort.]]></description>
      <pubDate>Thu, 28 Dec 2023 09:00:00 +0000</pubDate>
      <guid>https://avisen.example/artikler/2</guid>
    </item>
  </channel>
</rss>"#;

    #[tokio::test]
    async fn parses_feed_and_drops_short_items() {
        let fetcher = Fetcher::new();
        let src = source(ExtractionMode::Summary);

        let articles = fetcher.articles_from_feed(&src, SAMPLE_RSS).await.unwrap();
        assert_eq!(articles.len(), 1);

        let article = &articles[0];
        assert_eq!(article.title, "Stor nyhed fra hovedstaden");
        assert_eq!(article.link, "https://avisen.example/artikler/1");
        assert_eq!(article.id, article_id("https://avisen.example/artikler/1"));
        assert!(!article.content.contains('<'), "content must be plain text");
        assert_eq!(
            article.published_at,
            DateTime::parse_from_rfc3339("2023-12-28T08:00:00+00:00").unwrap()
        );
    }

    #[tokio::test]
    async fn bad_feed_document_is_a_parse_error() {
        let fetcher = Fetcher::new();
        let src = source(ExtractionMode::Summary);
        let result = fetcher.articles_from_feed(&src, "this is not a feed").await;
        assert!(matches!(result, Err(PipelineError::Parse(_))));
    }
}
