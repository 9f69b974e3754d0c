use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::TranslatorConfig;
use crate::types::{PipelineError, Result};

/// Output cap for title translations: one concise sentence.
pub const TITLE_MAX_TOKENS: u32 = 50;
/// Output cap for full-article translations.
pub const CONTENT_MAX_TOKENS: u32 = 8400;

/// Stop sequences sent with every completion request.
const STOP_SEQUENCES: [&str; 2] = ["</s>", "[/INST]"];

/// Ratio below which a translation is logged as suspiciously short but
/// kept as-is.
const LOW_RATIO: f64 = 0.5;
/// Ratio above which a title translation is treated as runaway generation.
const TITLE_OVERRUN_RATIO: f64 = 2.0;

/// Seam to the external completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    stop: [&'a str; 2],
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Production backend: a chat-completions endpoint reached over HTTPS.
pub struct CompletionClient {
    client: reqwest::Client,
    api_url: String,
    model: String,
    api_key: Option<String>,
}

impl CompletionClient {
    /// The bearer credential is threaded in once at construction; a missing
    /// credential fails individual requests, never the whole run.
    pub fn new(config: &TranslatorConfig, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            api_key,
        }
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(PipelineError::MissingCredential)?;

        let request = CompletionRequest {
            model: &self.model,
            max_tokens,
            stop: STOP_SEQUENCES,
            temperature: 0.0,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("accept", "application/json")
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Translation(format!(
                "completion endpoint returned {}",
                status
            )));
        }

        let body: CompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                PipelineError::Translation("no content in completion response".to_string())
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Content,
    Title,
}

impl Role {
    fn max_tokens(self) -> u32 {
        match self {
            Role::Content => CONTENT_MAX_TOKENS,
            Role::Title => TITLE_MAX_TOKENS,
        }
    }
}

/// Translates article fields into English through a completion backend,
/// one request per field.
pub struct Translator {
    backend: Box<dyn CompletionBackend>,
    language: String,
}

impl Translator {
    pub fn new(backend: Box<dyn CompletionBackend>, language: impl Into<String>) -> Self {
        Self {
            backend,
            language: language.into(),
        }
    }

    /// Translate an article body. The ratio guard never truncates content
    /// translations.
    pub async fn translate_content(&self, text: &str) -> Result<String> {
        self.translate(text, Role::Content).await
    }

    /// Translate a title into a single concise sentence.
    pub async fn translate_title(&self, text: &str) -> Result<String> {
        self.translate(text, Role::Title).await
    }

    async fn translate(&self, text: &str, role: Role) -> Result<String> {
        if text.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        let prompt = self.prompt_for(text, role);
        let translation = self.backend.complete(&prompt, role.max_tokens()).await?;
        debug!("Translated {:?} item ({} bytes)", role, translation.len());
        Ok(apply_ratio_guard(text, translation, role))
    }

    fn prompt_for(&self, text: &str, role: Role) -> String {
        match role {
            Role::Title => format!(
                "You are a highly skilled and concise professional translator. \
                 When you receive a sentence in {lang}, your task is to translate it into English. \
                 VERY IMPORTANT: Do not output any notes, explanations, alternatives or comments \
                 before or after the translation.\n\n\
                 {lang} sentence: {text}\n\n\
                 English translation:",
                lang = self.language,
                text = text,
            ),
            Role::Content => format!(
                "You are a highly skilled professional translator.\n\n\
                 Here are your instructions:\n\
                 - When you receive an article in {lang}, your critical task is to translate it into English.\n\
                 - You do not output any html, but the actual text of the article.\n\
                 - You do not add any notes or explanations.\n\
                 - The article to translate will be inside the <article> tags.\n\
                 - Once prompted, just output the English translation.\n\
                 - Do not output the title of the article, only the content.\n\
                 - Make sure the translation is well formatted and easy to read (no useless line breaks, no extra spaces, etc.)\n\n\
                 <article>\n\n{text}\n\n</article>\n\n\
                 Here is the best English translation of the article above:",
                lang = self.language,
                text = text,
            ),
        }
    }
}

/// Length-ratio sanity check. Short translations are accepted but logged;
/// a title more than twice the source length is cut to its first line.
fn apply_ratio_guard(source: &str, translation: String, role: Role) -> String {
    let ratio = translation.len() as f64 / source.len() as f64;

    if ratio < LOW_RATIO {
        warn!(
            "Translation ratio {:.2} is below {}, translation likely truncated",
            ratio, LOW_RATIO
        );
    }

    if role == Role::Title && ratio > TITLE_OVERRUN_RATIO {
        warn!(
            "Title translation ratio {:.2} is above {}, keeping first line only",
            ratio, TITLE_OVERRUN_RATIO
        );
        return translation.lines().next().unwrap_or_default().to_string();
    }

    translation
}
