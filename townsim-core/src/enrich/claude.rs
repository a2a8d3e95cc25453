//! Claude-backed enricher.
//!
//! Sends each prompt as a single user message to the Messages API and joins
//! the text blocks of the reply.

use super::{EnrichError, EnrichmentKind, EnrichmentRequest, Enricher};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Maximum tokens for a single reaction.
const REACTION_MAX_TOKENS: usize = 150;

/// Maximum tokens for a batch of talk lines.
const TALK_POOL_MAX_TOKENS: usize = 400;

/// Enricher that calls the Anthropic Messages API.
#[derive(Clone)]
pub struct ClaudeEnricher {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
}

impl ClaudeEnricher {
    /// Create a new enricher with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .connect_timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
            temperature: Some(0.9),
        }
    }

    /// Create an enricher from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, EnrichError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| EnrichError::NoApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set the model used for every request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Cap the reply length of every request, whatever its kind.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature, or `None` for the API default.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_headers(&self) -> Result<HeaderMap, EnrichError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| EnrichError::Unavailable(format!("Invalid API key: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn build_api_request<'a>(&'a self, request: &'a EnrichmentRequest) -> ApiRequest<'a> {
        let max_tokens = self.max_tokens.unwrap_or(match request.kind {
            EnrichmentKind::Reaction => REACTION_MAX_TOKENS,
            EnrichmentKind::TalkPool => TALK_POOL_MAX_TOKENS,
        });

        ApiRequest {
            model: &self.model,
            max_tokens,
            messages: vec![ApiMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl Enricher for ClaudeEnricher {
    async fn enrich(&self, request: &EnrichmentRequest) -> Result<String, EnrichError> {
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{API_BASE}/messages"))
            .headers(headers)
            .json(&self.build_api_request(request))
            .send()
            .await
            .map_err(|e| EnrichError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichError::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::Parse(e.to_string()))?;

        let text = api_response.text();
        if text.trim().is_empty() {
            return Err(EnrichError::Empty);
        }
        Ok(text)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContent>,
}

impl ApiResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ApiContent::Text { text } => Some(text.as_str()),
                ApiContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}
