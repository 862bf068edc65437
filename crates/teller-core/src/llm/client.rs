//! OpenAI-compatible streaming client

use super::backend::{Completion, InferenceBackend};
use super::sse_decoder::{SseDecoder, SseEvent};
use crate::config::InferenceSettings;
use crate::error::{TellerError, TellerResult};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Instant;
use tracing::{debug, instrument};

/// Streams `POST {base_url}/chat/completions` and times the first content token
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    http: Client,
    endpoint: String,
    settings: InferenceSettings,
}

impl OpenAiCompatClient {
    /// Build a client from settings.
    ///
    /// Only the connect timeout is set on the HTTP client; the per-call budget is
    /// enforced by the caller so that a slow stream is reported as a timeout.
    pub fn new(settings: InferenceSettings) -> TellerResult<Self> {
        let http = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| TellerError::config(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = format!("{}/chat/completions", settings.base_url.trim_end_matches('/'));
        Ok(Self {
            http,
            endpoint,
            settings,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.settings.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": true,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        })
    }
}

#[async_trait]
impl InferenceBackend for OpenAiCompatClient {
    #[instrument(skip(self, prompt), fields(model = %self.settings.model, prompt_chars = prompt.len()))]
    async fn complete(&self, prompt: &str) -> TellerResult<Completion> {
        let started = Instant::now();

        let mut request = self.http.post(&self.endpoint).json(&self.request_body(prompt));
        if let Some(api_key) = &self.settings.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TellerError::inference_status(
                format!("inference endpoint returned {}: {}", status, body.trim()),
                status.as_u16(),
            ));
        }

        let mut stream = Box::pin(response.bytes_stream());
        let mut decoder = SseDecoder::new();
        let mut content = String::new();
        let mut first_token: Option<f64> = None;
        let mut done = false;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TellerError::inference(format!("stream error: {}", e)))?;
            for event in decoder.feed(&chunk) {
                if apply_event(&event, &mut content, &mut first_token, started)? {
                    done = true;
                    break;
                }
            }
            if done {
                break;
            }
        }
        if !done {
            if let Some(event) = decoder.finish() {
                apply_event(&event, &mut content, &mut first_token, started)?;
            }
        }

        let ttft_seconds = first_token
            .ok_or_else(|| TellerError::inference("stream ended without any content"))?;
        let total_seconds = started.elapsed().as_secs_f64();

        debug!(
            ttft_seconds,
            total_seconds,
            completion_chars = content.len(),
            "streamed completion finished"
        );

        Ok(Completion {
            content,
            ttft_seconds,
            total_seconds,
        })
    }
}

/// Fold one event into the completion; returns `true` at end of stream
fn apply_event(
    event: &SseEvent,
    content: &mut String,
    first_token: &mut Option<f64>,
    started: Instant,
) -> TellerResult<bool> {
    if event.is_done() {
        return Ok(true);
    }
    match delta_content(&event.data)? {
        Some(delta) if !delta.is_empty() => {
            if first_token.is_none() {
                *first_token = Some(started.elapsed().as_secs_f64());
            }
            content.push_str(&delta);
        }
        _ => {}
    }
    Ok(false)
}

/// `choices[0].delta.content` of one chunk; an `error` object fails the call
fn delta_content(data: &str) -> TellerResult<Option<String>> {
    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "skipping non-JSON stream event");
            return Ok(None);
        }
    };

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(TellerError::inference(format!("stream reported error: {}", message)));
    }

    Ok(value["choices"][0]["delta"]["content"]
        .as_str()
        .map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one HTTP response on a random local port
    async fn serve_once(status_line: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 64 * 1024];
            let mut read = 0;
            loop {
                let n = socket.read(&mut buf[read..]).await.unwrap();
                read += n;
                let text = String::from_utf8_lossy(&buf[..read]).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if read >= header_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n{}",
                status_line, body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    fn settings(base_url: String) -> InferenceSettings {
        InferenceSettings {
            base_url,
            connect_timeout: Duration::from_secs(2),
            ..InferenceSettings::default()
        }
    }

    #[test]
    fn test_delta_content_extraction() {
        let data = r#"{"choices":[{"delta":{"content":"Cutoff"}}]}"#;
        assert_eq!(delta_content(data).unwrap().as_deref(), Some("Cutoff"));
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(delta_content(role_only).unwrap(), None);
        assert_eq!(delta_content("keep-alive").unwrap(), None);
    }

    #[test]
    fn test_error_event_fails() {
        let err = delta_content(r#"{"error":{"message":"model overloaded"}}"#).unwrap_err();
        assert!(err.to_string().contains("model overloaded"));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = OpenAiCompatClient::new(settings("http://gpu-01:8000/v1/".into())).unwrap();
        assert_eq!(client.endpoint(), "http://gpu-01:8000/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_streamed_completion() {
        let body = [
            r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"Domestic wires "}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"close at 17:00 ET."}}]}"#,
            "data: [DONE]",
        ]
        .iter()
        .map(|line| format!("{}\n\n", line))
        .collect::<String>();

        let base_url = serve_once("200 OK", body).await;
        let client = OpenAiCompatClient::new(settings(base_url)).unwrap();
        let completion = client.complete("prompt").await.unwrap();

        assert_eq!(completion.content, "Domestic wires close at 17:00 ET.");
        assert!(completion.ttft_seconds > 0.0);
        assert!(completion.total_seconds >= completion.ttft_seconds);
    }

    #[tokio::test]
    async fn test_error_status_is_inference_failure() {
        let base_url = serve_once("503 Service Unavailable", "overloaded".to_string()).await;
        let client = OpenAiCompatClient::new(settings(base_url)).unwrap();
        let err = client.complete("prompt").await.unwrap_err();
        match err {
            TellerError::InferenceCallFailed { status_code, .. } => {
                assert_eq!(status_code, Some(503))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_stream_is_failure() {
        let base_url = serve_once("200 OK", "data: [DONE]\n\n".to_string()).await;
        let client = OpenAiCompatClient::new(settings(base_url)).unwrap();
        assert!(client.complete("prompt").await.is_err());
    }
}
