use crate::answer::{build_prompt, parse_answer, Answer, AnswerService};
use crate::config::GeminiConfig;
use crate::embeddings::EmbeddingClient;
use crate::error::{RagError, Result};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(GeminiClient { config, client })
    }

    /// Generate embeddings for a text
    pub async fn get_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let model = format!("models/{}", self.config.embed_model);
        let request = EmbeddingRequest {
            model: &model,
            content: Content {
                parts: vec![Part { text }],
                role: None,
            },
        };

        let url = format!("{}?key={}", self.config.embeddings_url(), self.config.api_key);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Embedding(format!(
                "API request failed: {} {}",
                status, error_text
            )));
        }

        let response_data: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("invalid response: {e}")))?;

        let values = response_data.embedding.values;
        if values.is_empty() {
            return Err(RagError::Embedding("provider returned an empty vector".to_string()));
        }
        Ok(values)
    }

    /// Generate text using the configured answer model
    pub async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content::new_with_role(prompt, "user")],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 2048,
            },
        };

        let url = format!("{}?key={}", self.config.generate_url(), self.config.api_key);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::provider("Gemini", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::provider(
                "Gemini",
                format!("{} {}", status, error_text),
            ));
        }

        let response_data: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RagError::provider("Gemini", format!("invalid response: {e}")))?;

        // Extract the generated text from the response
        response_data
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| RagError::provider("Gemini", "No response generated"))
    }
}

#[async_trait]
impl EmbeddingClient for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.get_embedding(text).await
    }
}

#[async_trait]
impl AnswerService for GeminiClient {
    async fn answer(&self, query: &str, context: Option<&str>) -> Result<Answer> {
        let prompt = build_prompt(query, context);
        let raw = self.generate_text(&prompt).await?;
        debug!("Gemini returned {} characters", raw.len());
        parse_answer(&raw)
    }

    fn model(&self) -> &str {
        &self.config.answer_model
    }
}

// Request/response structures for the Gemini API

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embedding: EmbeddingData,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
}

impl<'a> Content<'a> {
    fn new_with_role(text: &'a str, role: &'static str) -> Self {
        Content {
            parts: vec![Part { text }],
            role: Some(role),
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: String,
}
