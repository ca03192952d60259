//! `POST {base_url}/responses` over reqwest.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, warn};

use super::sse::{SseDecoder, SseFrame};
use super::{CreateRequest, Transport, WireEvent, WireStream};
use crate::config::RondoConfig;
use crate::error::RondoError;
use crate::types::Response;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// HTTP transport for a Responses-style endpoint with bearer auth.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl HttpTransport {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, RondoError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build from `api_key` and `base_url` of a loaded configuration.
    pub fn from_config(config: &RondoConfig) -> Result<Self, RondoError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            RondoError::Configuration("OPENAI_API_KEY is not set".into())
        })?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(api_key, base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self, stream: bool) -> Result<HeaderMap, RondoError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if stream {
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        }
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| RondoError::Configuration(format!("invalid API key header: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }

    async fn post(&self, request: &CreateRequest, stream: bool) -> Result<reqwest::Response, RondoError> {
        let mut body = request.to_body();
        body["stream"] = Value::Bool(stream);
        let url = format!("{}/responses", self.base_url);
        debug!(
            model = request.model.as_str(),
            stream,
            inputs = request.input.len(),
            previous_response_id = request.previous_response_id.as_deref(),
            "POST /responses"
        );

        let resp = self
            .client
            .post(&url)
            .headers(self.headers(stream)?)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }
        Ok(resp)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn create(&self, request: &CreateRequest) -> Result<Response, RondoError> {
        let resp = self.post(request, false).await?;
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn stream(&self, request: &CreateRequest) -> Result<WireStream, RondoError> {
        let resp = self.post(request, true).await?;
        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            let mut logged = 0usize;
            futures::pin_mut!(byte_stream);

            'read: while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(RondoError::Network(e));
                        return;
                    }
                };
                for frame in decoder.push(&chunk) {
                    match frame {
                        SseFrame::Done => break 'read,
                        SseFrame::Data(data) => match decode_event(&data, &mut logged) {
                            Ok(event) => {
                                yield Ok(event);
                            }
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        },
                    }
                }
            }
            if let Some(SseFrame::Data(data)) = decoder.finish() {
                yield decode_event(&data, &mut logged);
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Unrecognized event types decode to `WireEvent::Other`; a recognized type
/// with a body that does not parse is a serialization error.
fn decode_event(data: &str, logged: &mut usize) -> Result<WireEvent, RondoError> {
    if debug_enabled() && *logged < 5 {
        debug!(data = %data, "SSE raw");
        *logged += 1;
    }
    serde_json::from_str::<WireEvent>(data).map_err(|e| {
        warn!(error = %e, data = %data, "SSE payload did not parse");
        RondoError::Serialization(e)
    })
}

/// Map a non-2xx response to a transport error, preferring the API's own
/// error message.
pub fn status_to_error(status: u16, body: &str) -> RondoError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());
    RondoError::transport(status, message)
}

fn debug_enabled() -> bool {
    matches!(env::var("RONDO_DEBUG").as_deref(), Ok("1" | "true" | "TRUE"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_prefers_api_message() {
        let err = status_to_error(401, r#"{"error":{"message":"Incorrect API key"}}"#);
        assert_eq!(err.to_string(), "Transport error (status Some(401)): Incorrect API key");
        let err = status_to_error(502, "bad gateway");
        assert!(err.to_string().ends_with("bad gateway"));
    }

    #[test]
    fn from_config_requires_api_key() {
        let err = HttpTransport::from_config(&RondoConfig::default()).unwrap_err();
        assert!(matches!(err, RondoError::Configuration(_)));

        let config = RondoConfig {
            api_key: Some("sk-test".into()),
            base_url: Some("http://localhost:9/v1/".into()),
            ..Default::default()
        };
        let transport = HttpTransport::from_config(&config).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:9/v1");
    }
}
