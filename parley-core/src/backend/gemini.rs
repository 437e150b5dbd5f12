//! Gemini `generateContent` backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Content, DialogueBackend, ModelInfo, build_contents};
use crate::config::{BackendConfig, GenerationConfig};
use crate::dialogue::ChatMessage;
use crate::error::{ParleyError, Result};

/// Backend talking to Google's generative language API.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    generation: GenerationConfig,
}

impl GeminiBackend {
    /// Create a new Gemini backend with default generation settings.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Gemini API key
    /// * `model` - Model name (e.g., "gemini-2.0-flash")
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let defaults = BackendConfig::default();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: defaults.base_url,
            generation: defaults.generation,
        }
    }

    /// Create from backend configuration, with an already resolved key.
    pub fn from_config(api_key: impl Into<String>, config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            generation: config.generation.clone(),
        }
    }

    /// Point the backend at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn request_body(&self, contents: Vec<Content>) -> GeminiRequest {
        GeminiRequest {
            contents,
            generation_config: GeminiGenerationConfig {
                temperature: self.generation.temperature,
                top_k: self.generation.top_k,
                top_p: self.generation.top_p,
                max_output_tokens: self.generation.max_output_tokens,
                response_mime_type: self.generation.response_mime_type.clone(),
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<Content>,
}

impl GeminiResponse {
    /// Text of the first part of the first candidate.
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .map(|part| part.text)
    }
}

#[async_trait]
impl DialogueBackend for GeminiBackend {
    async fn generate(
        &self,
        user_input: &str,
        history: &[ChatMessage],
        system_instruction: &str,
    ) -> Result<String> {
        let body = self.request_body(build_contents(user_input, history, system_instruction));

        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload = serde_json::to_string(&body)?;
            tracing::debug!(model = %self.model, %payload, "Gemini request payload");
        }

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ParleyError::Backend(format!("Failed to send request to Gemini: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ParleyError::Backend(format!("Failed to read Gemini response: {}", e)))?;
        tracing::debug!(%status, response = %text, "Gemini response");

        if !status.is_success() {
            return Err(ParleyError::Backend(format!(
                "Gemini API error ({}): {}",
                status, text
            )));
        }

        let parsed: GeminiResponse = serde_json::from_str(&text).map_err(|e| {
            ParleyError::Backend(format!("Failed to parse Gemini response: {}", e))
        })?;

        parsed
            .into_text()
            .ok_or_else(|| ParleyError::Backend("Gemini API returned no candidates".to_string()))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "gemini".to_string(),
            model_name: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_gemini_backend_creation() {
        let backend = GeminiBackend::new("test-key", "gemini-2.0-flash");
        assert_eq!(backend.model(), "gemini-2.0-flash");
        assert_eq!(
            backend.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent?key=test-key"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let backend = GeminiBackend::new("k", "m");
        let body = backend.request_body(build_contents("Hi", &[], "Be brief."));
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Be brief.\nHi");
        assert_eq!(json["generationConfig"]["topK"], 40);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(json["generationConfig"]["responseMimeType"], "text/plain");
    }

    #[test]
    fn test_response_text_extraction() {
        let parsed: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Ahoy."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.into_text().as_deref(), Some("Ahoy."));

        let empty: GeminiResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(empty.into_text().is_none());

        let missing: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(missing.into_text().is_none());
    }

    /// Serve one canned HTTP response and hand back the request body.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < header_end + content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();

            String::from_utf8_lossy(&buf[header_end..]).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    #[tokio::test]
    async fn test_generate_against_local_server() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"Fresh bread! Want some?"}]}}]}"#,
        )
        .await;
        let backend = GeminiBackend::new("k", "gemini-2.0-flash").with_base_url(url);

        let history = vec![ChatMessage::user("Hello"), ChatMessage::model("Morning!")];
        let reply = backend
            .generate("Anything fresh?", &history, "You are a baker.")
            .await
            .unwrap();
        assert_eq!(reply, "Fresh bread! Want some?");

        let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        let contents = sent["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["parts"][0]["text"], "You are a baker.\nHello");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "Anything fresh?");
    }

    #[tokio::test]
    async fn test_generate_non_success_status() {
        let (url, server) =
            serve_once("403 Forbidden", r#"{"error":{"message":"bad key"}}"#).await;
        let backend = GeminiBackend::new("k", "m").with_base_url(url);

        let result = backend.generate("hi", &[], "").await;
        server.await.unwrap();
        match result {
            Err(ParleyError::Backend(message)) => assert!(message.contains("403")),
            other => panic!("expected backend error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_transport_error() {
        // nothing listens on the discard port of localhost
        let backend = GeminiBackend::new("k", "m").with_base_url("http://127.0.0.1:9");
        let result = backend.generate("hi", &[], "").await;
        assert!(matches!(result, Err(ParleyError::Backend(_))));
    }
}
