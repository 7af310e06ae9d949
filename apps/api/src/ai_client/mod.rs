// AI Service Client — the single point of entry for all calls to the AI
// microservice (chat completions, document text extraction, personality
// profiles). No other module may talk to the AI service directly.
//
// Upstream failures surface as AiError; callers translate them into a single
// user-facing message per operation. There is deliberately no retry here.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const COMPLETION_PATH: &str = "/api/v1/chat/completion";
const COMPLETION_STREAM_PATH: &str = "/api/v1/chat/completion/stream";
const EXTRACT_TEXT_PATH: &str = "/api/v1/documents/extract-text";
const PERSONALITY_PATH: &str = "/api/v1/personality/generate";

const DEFAULT_TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 2000;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI service error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One turn of conversation history, in the wire shape the AI service expects.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<Uuid>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tokens_used: Option<u32>,
    /// Set when the assistant produced a downloadable PDF. Relative to the
    /// AI service base URL; callers prefix it via [`AiClient::absolute_url`].
    #[serde(default)]
    pub pdf_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractTextResponse {
    text: String,
}

/// Nulls are sent explicitly: anonymous callers have no user_id and no
/// collected profile data.
#[derive(Debug, Serialize)]
struct PersonalityRequest<'a> {
    user_id: Option<Uuid>,
    user_data: Option<&'a Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PersonalityResponse {
    pub personality: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// FastAPI-style error body: `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
struct AiErrorBody {
    detail: String,
}

/// Typed client for the AI microservice.
#[derive(Clone)]
pub struct AiClient {
    client: Client,
    base_url: String,
}

impl AiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolves a path returned by the AI service (e.g. a PDF download URL)
    /// against the service base URL.
    pub fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Requests a full (non-streaming) chat completion over the given history.
    pub async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        user_id: Option<Uuid>,
    ) -> Result<CompletionResponse, AiError> {
        let body = CompletionRequest {
            messages,
            user_id,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}{}", self.base_url, COMPLETION_PATH))
            .json(&body)
            .send()
            .await?;

        let response = check_status(response).await?;
        let completion: CompletionResponse = response.json().await?;

        debug!(
            "AI completion succeeded: model={:?}, tokens_used={:?}",
            completion.model, completion.tokens_used
        );

        Ok(completion)
    }

    /// Opens a streaming chat completion. Returns the raw response after the
    /// status check; the caller consumes it as an SSE byte stream
    /// (`data: <chunk>` lines terminated by `data: [DONE]`).
    pub async fn chat_completion_stream(
        &self,
        messages: &[ChatMessage],
        user_id: Option<Uuid>,
    ) -> Result<reqwest::Response, AiError> {
        let body = CompletionRequest {
            messages,
            user_id,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}{}", self.base_url, COMPLETION_STREAM_PATH))
            .json(&body)
            .send()
            .await?;

        check_status(response).await
    }

    /// Extracts plain text from an uploaded document (multipart upload).
    pub async fn extract_text(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, AiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}{}", self.base_url, EXTRACT_TEXT_PATH))
            .multipart(form)
            .send()
            .await?;

        let response = check_status(response).await?;
        let extracted: ExtractTextResponse = response.json().await?;
        Ok(extracted.text)
    }

    /// Generates a personality profile from collected user data. Both fields
    /// are optional: anonymous visitors get a generic profile.
    pub async fn generate_personality(
        &self,
        user_id: Option<Uuid>,
        user_data: Option<&Value>,
    ) -> Result<PersonalityResponse, AiError> {
        let body = PersonalityRequest { user_id, user_data };

        let response = self
            .client
            .post(format!("{}{}", self.base_url, PERSONALITY_PATH))
            .json(&body)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Maps non-2xx responses to `AiError::Api`, extracting the FastAPI `detail`
/// message when present.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<AiErrorBody>(&body)
        .map(|e| e.detail)
        .unwrap_or(body);

    Err(AiError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_url_prefixes_relative_path() {
        let client = AiClient::new("http://localhost:8000".to_string());
        assert_eq!(
            client.absolute_url("/api/v1/pdf/download/abc.pdf"),
            "http://localhost:8000/api/v1/pdf/download/abc.pdf"
        );
    }

    #[test]
    fn test_absolute_url_keeps_full_urls() {
        let client = AiClient::new("http://localhost:8000".to_string());
        assert_eq!(
            client.absolute_url("https://cdn.example.com/x.pdf"),
            "https://cdn.example.com/x.pdf"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = AiClient::new("http://localhost:8000/".to_string());
        assert_eq!(
            client.absolute_url("/files/1.pdf"),
            "http://localhost:8000/files/1.pdf"
        );
    }

    #[test]
    fn test_chat_message_constructors() {
        let m = ChatMessage::user("hello");
        assert_eq!(m.role, "user");
        assert_eq!(m.content, "hello");
        let m = ChatMessage::assistant("hi");
        assert_eq!(m.role, "assistant");
    }
}
