//! Text- and image-generation API interaction.
//!
//! The pipeline talks to the generative services through two traits so the
//! stages can be exercised against fakes:
//! - [`TextService`]: one chat-completion round trip, returning the reply text
//! - [`ImageService`]: one image generation, returning the encoded image bytes
//!
//! [`OpenAiClient`] implements both against an OpenAI-compatible HTTP API.
//! Retrying is a policy of the caller (see [`crate::generate::topic`]); the
//! client makes exactly one attempt and reports timeouts as
//! [`ServiceError::Timeout`].

use crate::error::{ServiceError, check_status};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// One single-turn completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ImageRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub size: &'a str,
    pub timeout: Duration,
}

/// Trait for async text generation.
pub trait TextService {
    /// Send `request` and return the trimmed reply text.
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, ServiceError>;
}

/// Trait for async image generation.
pub trait ImageService {
    /// Generate one image and return its encoded bytes.
    async fn generate_image(&self, request: &ImageRequest<'_>) -> Result<Vec<u8>, ServiceError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageBody<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

/// Client for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl TextService for OpenAiClient {
    #[instrument(level = "info", skip_all, fields(model = %request.model))]
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, ServiceError> {
        let t0 = Instant::now();
        let body = ChatBody {
            model: request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let res: Result<String, ServiceError> = async {
            let resp = self
                .http
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .timeout(request.timeout)
                .json(&body)
                .send()
                .await?;
            let parsed: ChatResponse = check_status("openai", resp).await?.json().await?;
            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or(ServiceError::Empty("openai chat completion"))
        }
        .await;

        let dt = t0.elapsed();
        match &res {
            Ok(text) => info!(elapsed_ms = dt.as_millis() as u64, chars = text.len(), "Completion succeeded"),
            Err(e) => warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "Completion failed"),
        }
        res
    }
}

impl ImageService for OpenAiClient {
    #[instrument(level = "info", skip_all, fields(model = %request.model, size = %request.size))]
    async fn generate_image(&self, request: &ImageRequest<'_>) -> Result<Vec<u8>, ServiceError> {
        let t0 = Instant::now();
        let body = ImageBody {
            model: request.model,
            prompt: request.prompt,
            n: 1,
            size: request.size,
        };

        let resp = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await?;
        let parsed: ImageResponse = check_status("openai", resp).await?.json().await?;
        let url = parsed
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or(ServiceError::Empty("openai image generation"))?;

        let bytes = check_status("image download", self.http.get(&url).timeout(request.timeout).send().await?)
            .await?
            .bytes()
            .await?;
        if bytes.is_empty() {
            return Err(ServiceError::Empty("image download"));
        }
        info!(elapsed_ms = t0.elapsed().as_millis() as u64, bytes = bytes.len(), "Image generated");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat<'a>(prompt: &'a str, timeout: Duration) -> ChatRequest<'a> {
        ChatRequest {
            model: "gpt-4",
            prompt,
            max_tokens: 20,
            temperature: Some(0.7),
            timeout,
        }
    }

    #[tokio::test]
    async fn complete_returns_trimmed_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4",
                "max_tokens": 20,
                "messages": [{ "role": "user", "content": "topic please" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "  Zero Trust Basics \n" } }]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", &server.uri());
        let reply = client
            .complete(&chat("topic please", Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(reply, "Zero Trust Basics");
    }

    #[tokio::test]
    async fn slow_reply_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", &server.uri());
        let err = client
            .complete(&chat("x", Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "got {err:?}");
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", &server.uri());
        let err = client.complete(&chat("x", Duration::from_secs(5))).await.unwrap_err();
        assert!(matches!(err, ServiceError::Empty(_)));
    }

    #[tokio::test]
    async fn server_error_is_not_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", &server.uri());
        let err = client.complete(&chat("x", Duration::from_secs(5))).await.unwrap_err();
        assert!(matches!(err, ServiceError::Api { status: 500, .. }));
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn generate_image_downloads_returned_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .and(body_partial_json(serde_json::json!({ "n": 1, "size": "1024x1024" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "url": format!("{}/files/img.png", server.uri()) }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/img.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", &server.uri());
        let bytes = client
            .generate_image(&ImageRequest {
                model: "dall-e-3",
                prompt: "a shield",
                size: "1024x1024",
                timeout: Duration::from_secs(5),
            })
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn generate_image_without_url_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", &server.uri());
        let err = client
            .generate_image(&ImageRequest {
                model: "dall-e-3",
                prompt: "a shield",
                size: "1024x1024",
                timeout: Duration::from_secs(5),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Empty(_)));
    }
}
