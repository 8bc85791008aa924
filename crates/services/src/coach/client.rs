use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::heuristic::HeuristicAnalyzer;
use super::parse::{SYSTEM_PROMPT, coaching_prompt, parse_analysis};
use super::{FluencyAnalysis, FluencyAnalyzer};
use crate::error::CoachError;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama3-8b-8192";

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoachConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl CoachConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
        }
    }
}

/// Chat-completions backed analyzer with heuristic fallback.
#[derive(Clone)]
pub struct CoachService {
    client: Client,
    config: Option<CoachConfig>,
    fallback: HeuristicAnalyzer,
}

impl CoachService {
    #[must_use]
    pub fn new(config: Option<CoachConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
            fallback: HeuristicAnalyzer::new(),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Ask the completion API for an analysis of `text`.
    ///
    /// # Errors
    ///
    /// Returns `CoachError` when the service is disabled, the request fails,
    /// or the reply is empty or not a usable analysis.
    pub async fn request_analysis(&self, text: &str) -> Result<FluencyAnalysis, CoachError> {
        let content = self.complete(&coaching_prompt(text)).await?;
        parse_analysis(&content)
    }

    async fn complete(&self, prompt: &str) -> Result<String, CoachError> {
        let config = self.config.as_ref().ok_or(CoachError::Disabled)?;
        let endpoint = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        let request = CompletionRequest {
            model: &config.model,
            messages: [
                Message {
                    role: Role::System,
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: Role::User,
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&config.api_key)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoachError::HttpStatus(status));
        }

        let completion: CompletionResponse = response.json().await?;
        tracing::debug!(model = %config.model, choices = completion.choices.len(), "coach replied");
        completion
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|content| content.trim().to_owned())
            .filter(|content| !content.is_empty())
            .ok_or(CoachError::EmptyResponse)
    }
}

#[async_trait]
impl FluencyAnalyzer for CoachService {
    async fn analyze(&self, text: &str) -> FluencyAnalysis {
        match self.request_analysis(text).await {
            Ok(analysis) => analysis,
            Err(CoachError::Disabled) => {
                tracing::debug!("coach disabled, using heuristic analysis");
                self.fallback.analyze_text(text)
            }
            Err(err) => {
                tracing::warn!(error = %err, "coach analysis failed, using heuristic analysis");
                self.fallback.analyze_text(text)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    System,
    User,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}
