//! OpenAI chat-completions adapter for structured synthesis.
//!
//! ```rust,ignore
//! use research::synthesis::OpenAiModel;
//!
//! let model = OpenAiModel::new(api_key).with_model("gpt-4o-mini");
//! let engine = SynthesisEngine::new(Some(Arc::new(model)));
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, Result};
use crate::security::ApiKey;
use crate::traits::ai::LanguageModel;

const PROVIDER: &str = "openai";

/// OpenAI model using the `json_schema` response format.
#[derive(Clone)]
pub struct OpenAiModel {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl OpenAiModel {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Create from `OPENAI_API_KEY`, honoring `OPENAI_MODEL` when set.
    pub fn from_env() -> Option<Self> {
        let model = Self::new(ApiKey::from_env("OPENAI_API_KEY")?);
        Some(match std::env::var("OPENAI_MODEL") {
            Ok(name) if !name.trim().is_empty() => model.with_model(name.trim()),
            _ => model,
        })
    }

    /// Set the chat model (default: gpt-4o).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (for Azure, proxies, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct StructuredRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate_structured(
        &self,
        system: &str,
        user: &str,
        schema: serde_json::Value,
    ) -> Result<String> {
        let request = StructuredRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: "research_findings",
                    strict: true,
                    schema,
                },
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ResearchError::provider(PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ResearchError::provider(
                PROVIDER,
                format!("structured output error {status}: {error_text}"),
            ));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ResearchError::provider(PROVIDER, e))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ResearchError::provider(PROVIDER, "no response content"))
    }
}
