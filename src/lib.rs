pub mod config;
pub mod dedup;
pub mod extract;
pub mod fetcher;
pub mod pipeline;
pub mod store;
pub mod translator;
pub mod types;

pub use config::{Config, DatabaseConfig, TranslatorConfig};
pub use fetcher::Fetcher;
pub use pipeline::{MinIntervalGate, Pipeline, RunSummary};
pub use store::ArticleStore;
pub use translator::{CompletionBackend, CompletionClient, Translator};
pub use types::{article_id, Article, ExtractionMode, PipelineError, Result, Source};
