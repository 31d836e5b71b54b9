use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::AiConfig;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GROQ_MODEL: &str = "llama-3.3-70b-versatile";
const GROQ_KEY_PREFIX: &str = "gsk_";

const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("No AI API key configured")]
    NotConfigured,

    #[error("Request to {provider} failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("No content generated")]
    EmptyContent,

    #[error("Generated content is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Generated content has an unexpected shape: {0}")]
    Shape(String),
}

/// Chat-completion providers speaking the OpenAI wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Groq,
}

impl Provider {
    /// Groq keys carry a recognisable prefix; everything else goes to OpenAI.
    pub fn for_api_key(api_key: &str) -> Self {
        if api_key.starts_with(GROQ_KEY_PREFIX) {
            Provider::Groq
        } else {
            Provider::OpenAi
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Groq => "groq",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => OPENAI_BASE_URL,
            Provider::Groq => GROQ_BASE_URL,
        }
    }

    pub fn model(&self) -> &'static str {
        match self {
            Provider::OpenAi => OPENAI_MODEL,
            Provider::Groq => GROQ_MODEL,
        }
    }
}

/// Produces a JSON document for a system instruction and a user prompt.
#[rocket::async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String, GeneratorError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseChoice {
    message: ChatMessage,
}

pub struct ChatCompletionClient {
    client: Client,
    api_key: String,
    provider: Provider,
    endpoint: String,
    model: String,
}

impl ChatCompletionClient {
    pub fn new(client: Client, api_key: &str) -> Self {
        let provider = Provider::for_api_key(api_key);
        Self {
            client,
            api_key: api_key.to_string(),
            provider,
            endpoint: completions_endpoint(provider.base_url()),
            model: provider.model().to_string(),
        }
    }

    /// Builds a client from config, or `None` when no key is set.
    pub fn from_config(client: Client, config: &AiConfig) -> Option<Self> {
        let api_key = config.api_key.as_deref()?;
        let mut generator = Self::new(client, api_key);

        if let Some(base_url) = &config.base_url {
            generator.endpoint = completions_endpoint(base_url);
        }
        if let Some(model) = &config.model {
            generator.model = model.clone();
        }

        Some(generator)
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn completions_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

#[rocket::async_trait]
impl ContentGenerator for ChatCompletionClient {
    #[instrument(skip_all, fields(provider = self.provider.name(), model = %self.model))]
    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String, GeneratorError> {
        let provider = self.provider.name();
        let req = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(system.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(prompt.to_string()),
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            temperature: TEMPERATURE,
        };

        debug!(endpoint = %self.endpoint, "Requesting chat completion");

        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|source| GeneratorError::Transport { provider, source })?;

        if !res.status().is_success() {
            return Err(GeneratorError::Status {
                provider,
                status: res.status().as_u16(),
            });
        }

        let mut out: ChatResponse = res
            .json()
            .await
            .map_err(|source| GeneratorError::Transport { provider, source })?;

        let Some(c0) = out.choices.drain(..).next() else {
            return Err(GeneratorError::EmptyContent);
        };

        match c0.message.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(GeneratorError::EmptyContent),
        }
    }
}
