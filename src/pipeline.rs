use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dedup::{dedup_batch, filter_known};
use crate::fetcher::Fetcher;
use crate::store::ArticleStore;
use crate::translator::{CompletionBackend, Translator};
use crate::types::{Article, Source};

/// Minimum-interval gate between translation sweeps. The pause is policy,
/// not a literal sleep: `wait` only sleeps out whatever remains of the
/// interval since the last `mark`.
pub struct MinIntervalGate {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl MinIntervalGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Record the moment the rate-limited activity last finished.
    pub fn mark(&self) {
        *self.last.lock().expect("gate lock poisoned") = Some(Instant::now());
    }

    /// Wait until at least the configured interval has passed since the
    /// last mark. Returns immediately if nothing was marked yet.
    pub async fn wait(&self) {
        let remaining = {
            let last = self.last.lock().expect("gate lock poisoned");
            last.map(|at| self.min_interval.saturating_sub(at.elapsed()))
        };
        if let Some(remaining) = remaining {
            if !remaining.is_zero() {
                sleep(remaining).await;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepField {
    Content,
    Title,
}

/// Outcome counts for one pipeline run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub unique: usize,
    pub fresh: usize,
    pub translated_contents: usize,
    pub translated_titles: usize,
    pub persisted: usize,
}

/// Sequences fetch, dedup, translation and persistence for one run.
/// Stage failures shrink the result set; none of them abort the run.
pub struct Pipeline {
    sources: Vec<Source>,
    fetcher: Fetcher,
    translator: Arc<Translator>,
    store: ArticleStore,
    gate: MinIntervalGate,
    max_in_flight: usize,
}

impl Pipeline {
    pub fn new(config: Config, backend: Box<dyn CompletionBackend>) -> Self {
        let translator = Arc::new(Translator::new(backend, config.translator.language.clone()));
        Self {
            fetcher: Fetcher::new(),
            translator,
            store: ArticleStore::new(config.database.conn.clone()),
            gate: MinIntervalGate::new(Duration::from_secs(config.translator.sweep_pause_secs)),
            max_in_flight: config.translator.max_in_flight.max(1),
            sources: config.sources,
        }
    }

    /// Run the full pipeline once.
    pub async fn run(&self) -> RunSummary {
        let articles = self.fetch_all().await;
        self.process(articles).await
    }

    /// Fan out one fetch task per source and wait for all of them. A
    /// failing source is logged and contributes zero articles.
    async fn fetch_all(&self) -> Vec<Article> {
        info!("Fetching articles from {} sources", self.sources.len());
        let start = std::time::Instant::now();

        let mut tasks = JoinSet::new();
        for source in self.sources.iter().cloned() {
            let fetcher = self.fetcher.clone();
            tasks.spawn(async move {
                let articles = fetcher.fetch(&source).await;
                (source.name, articles)
            });
        }

        // Full barrier: exactly as many joins as tasks dispatched.
        let mut articles = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(batch))) => articles.extend(batch),
                Ok((name, Err(e))) => warn!("Error processing feed {}: {}", name, e),
                Err(e) => error!("Fetch task failed: {}", e),
            }
        }

        info!(
            "Received {} articles in {:?}",
            articles.len(),
            start.elapsed()
        );
        articles
    }

    /// Everything after the fetch stage: dedup, both translation sweeps and
    /// persistence. Public so a prepared batch can be driven through the
    /// same stages the scheduler uses.
    pub async fn process(&self, articles: Vec<Article>) -> RunSummary {
        let mut summary = RunSummary {
            fetched: articles.len(),
            ..RunSummary::default()
        };

        let articles = dedup_batch(articles);
        summary.unique = articles.len();

        let known = match self.store.known_ids().await {
            Ok(known) => known,
            Err(e) => {
                // Insert-or-ignore keeps correctness if dedup runs blind.
                warn!("Error reading stored ids, skipping storage dedup: {}", e);
                HashSet::new()
            }
        };
        let mut articles = filter_known(articles, &known);
        summary.fresh = articles.len();

        if articles.is_empty() {
            info!("No articles to process");
            return summary;
        }

        info!("Translating {} article contents", articles.len());
        summary.translated_contents = self.sweep(&mut articles, SweepField::Content).await;
        self.gate.mark();

        self.gate.wait().await;
        info!("Translating {} article titles", articles.len());
        summary.translated_titles = self.sweep(&mut articles, SweepField::Title).await;

        summary.persisted = match self.store.insert_articles(&articles).await {
            Ok(inserted) => inserted,
            Err(e) => {
                error!("Error inserting articles into the database: {}", e);
                0
            }
        };

        info!(
            "Done: {} fetched, {} unique, {} fresh, {} persisted",
            summary.fetched, summary.unique, summary.fresh, summary.persisted
        );
        summary
    }

    /// One translation sweep over a single field. Fan-out is bounded by the
    /// semaphore; each task owns exactly one pre-identified slot and the
    /// join loop is a full barrier over exactly the tasks dispatched.
    async fn sweep(&self, articles: &mut [Article], field: SweepField) -> usize {
        let start = std::time::Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();

        for (index, article) in articles.iter().enumerate() {
            let translator = self.translator.clone();
            let semaphore = semaphore.clone();
            let text = match field {
                SweepField::Content => article.content.clone(),
                SweepField::Title => article.title.clone(),
            };
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let result = match field {
                    SweepField::Content => translator.translate_content(&text).await,
                    SweepField::Title => translator.translate_title(&text).await,
                };
                (index, result)
            });
        }

        // Disjoint pre-allocated slots; no task appends to shared state.
        let mut slots: Vec<Option<String>> = vec![None; articles.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(translation))) => slots[index] = Some(translation),
                Ok((index, Err(e))) => warn!("Error translating item {}: {}", index, e),
                Err(e) => error!("Translation task failed: {}", e),
            }
        }

        let mut translated = 0;
        for (article, slot) in articles.iter_mut().zip(slots) {
            if let Some(translation) = slot {
                match field {
                    SweepField::Content => article.translated_content = translation,
                    SweepField::Title => article.translated_title = translation,
                }
                translated += 1;
            }
        }

        info!(
            "Translated {}/{} items in {:?}",
            translated,
            articles.len(),
            start.elapsed()
        );
        translated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn gate_waits_out_the_remaining_interval() {
        let gate = MinIntervalGate::new(Duration::from_secs(4));

        // Nothing marked yet: wait returns immediately.
        let before = Instant::now();
        gate.wait().await;
        assert_eq!(Instant::now(), before);

        gate.mark();
        gate.wait().await;
        assert!(Instant::now() - before >= Duration::from_secs(4));
    }
}
