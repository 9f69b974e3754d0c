use std::collections::HashSet;

use tracing::debug;

use crate::types::Article;

/// Keep only the first article observed for each distinct id.
pub fn dedup_batch(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(articles.len());
    for article in articles {
        if seen.insert(article.id.clone()) {
            unique.push(article);
        } else {
            debug!("Duplicate article in batch: {}", article.id);
        }
    }
    unique
}

/// Drop candidates whose id is already persisted.
pub fn filter_known(articles: Vec<Article>, known: &HashSet<String>) -> Vec<Article> {
    articles
        .into_iter()
        .filter(|article| {
            if known.contains(&article.id) {
                debug!("Article already stored: {}", article.id);
                false
            } else {
                true
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Source, ExtractionMode};
    use chrono::Utc;

    fn article(link: &str, source_name: &str) -> Article {
        let source = Source {
            name: source_name.to_string(),
            feed: format!("https://{source_name}.example/feed"),
            extraction: ExtractionMode::Summary,
            category: String::new(),
        };
        Article::new(
            "title".to_string(),
            link.to_string(),
            Utc::now(),
            "content".to_string(),
            &source,
        )
    }

    #[test]
    fn first_occurrence_wins() {
        let batch = vec![
            article("https://example.com/shared", "first"),
            article("https://example.com/other", "first"),
            article("https://example.com/shared", "second"),
        ];
        let unique = dedup_batch(batch);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].source, "first");
    }

    #[test]
    fn known_ids_are_filtered_out() {
        let kept = article("https://example.com/new", "s");
        let dropped = article("https://example.com/old", "s");
        let known: HashSet<String> = [dropped.id.clone()].into_iter().collect();

        let fresh = filter_known(vec![dropped, kept.clone()], &known);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, kept.id);
    }

    #[test]
    fn empty_known_set_keeps_everything() {
        let batch = vec![article("https://example.com/a", "s")];
        let fresh = filter_known(batch, &HashSet::new());
        assert_eq!(fresh.len(), 1);
    }
}
