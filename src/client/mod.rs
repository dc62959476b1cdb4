//! Model server transport
//!
//! Architecture: Gateway - All traffic with the validation server goes through ModelServerApi
//! - The framework only depends on the trait, so tests can substitute the server
//! - ModelServerClient speaks HTTP for requests and WebSocket for subscriptions
//! - Response envelopes are unwrapped here; payload interpretation happens upstream

#[cfg(test)]
pub(crate) mod mock;

use crate::config::ServerConfig;
use crate::domain::results::{ValidationError, ValidationResult};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

/// Notification kind carrying a pushed diagnostic
pub const VALIDATION_RESULT_KIND: &str = "validationResult";

const SUBSCRIPTION_BUFFER: usize = 64;

/// A notification pushed by the server over a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelServerNotification {
    pub kind: String,
    pub payload: Option<String>,
}

impl ModelServerNotification {
    pub fn new(kind: impl Into<String>, payload: Option<String>) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// A `validationResult` notification
    pub fn validation_result(payload: impl Into<String>) -> Self {
        Self::new(VALIDATION_RESULT_KIND, Some(payload.into()))
    }
}

/// Lifecycle events delivered by a subscription channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// The channel is established
    Open,
    /// The server pushed a notification
    Notification(ModelServerNotification),
    /// The transport reported an error; the channel closes afterwards
    Error(String),
    /// The channel closed
    Closed,
}

/// Operations the framework needs from the validation server
#[async_trait]
pub trait ModelServerApi: Send + Sync {
    /// Two-level constraint map for the model, still in wire form
    async fn fetch_constraints(&self, model_uri: &str) -> ValidationResult<JsonValue>;

    /// Fresh diagnostic for the model, still in wire form
    async fn fetch_validation(&self, model_uri: &str) -> ValidationResult<JsonValue>;

    /// Open a notification channel for the model
    async fn subscribe(&self, model_uri: &str)
        -> ValidationResult<mpsc::Receiver<SubscriptionEvent>>;
}

/// Response envelope used by every server endpoint and notification
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<JsonValue>,
}

impl Envelope {
    fn payload(self) -> Option<String> {
        match self.data {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// HTTP/WebSocket client for a model server
#[derive(Debug, Clone)]
pub struct ModelServerClient {
    client: Client,
    base_url: String,
    subscribe_url: String,
}

impl ModelServerClient {
    /// Create a client for the configured server
    pub fn new(config: &ServerConfig) -> ValidationResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ValidationError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            subscribe_url: config.subscribe_url(),
        })
    }

    async fn get_envelope(&self, path: &str, model_uri: &str) -> ValidationResult<Envelope> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, model_uri = %model_uri, "Requesting from model server");

        let response = self
            .client
            .get(&url)
            .query(&[("modeluri", model_uri)])
            .send()
            .await
            .map_err(|e| ValidationError::fetch(format!("Request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Model server request failed");
            return Err(ValidationError::fetch(format!("HTTP {}: {}", status, error_text)));
        }

        let envelope = response
            .json::<Envelope>()
            .await
            .map_err(|e| ValidationError::fetch(format!("Invalid response body: {e}")))?;

        if envelope.kind == "error" {
            let message = envelope.payload().unwrap_or_else(|| "unspecified error".to_string());
            return Err(ValidationError::fetch(format!("Server reported error: {message}")));
        }

        Ok(envelope)
    }

    fn subscription_url(&self, model_uri: &str) -> String {
        format!(
            "{}?modeluri={}&livevalidation=true",
            self.subscribe_url,
            urlencoding::encode(model_uri)
        )
    }

    async fn get_data(&self, path: &str, model_uri: &str) -> ValidationResult<JsonValue> {
        self.get_envelope(path, model_uri)
            .await?
            .data
            .ok_or_else(|| ValidationError::fetch(format!("Response from '{path}' has no data")))
    }
}

#[async_trait]
impl ModelServerApi for ModelServerClient {
    async fn fetch_constraints(&self, model_uri: &str) -> ValidationResult<JsonValue> {
        self.get_data("validation/constraints", model_uri).await
    }

    async fn fetch_validation(&self, model_uri: &str) -> ValidationResult<JsonValue> {
        self.get_data("validation", model_uri).await
    }

    async fn subscribe(
        &self,
        model_uri: &str,
    ) -> ValidationResult<mpsc::Receiver<SubscriptionEvent>> {
        let url = self.subscription_url(model_uri);
        debug!(url = %url, "Opening subscription");

        let (mut stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ValidationError::subscription(format!("Failed to connect to {url}: {e}")))?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        tokio::spawn(async move {
            if tx.send(SubscriptionEvent::Open).await.is_err() {
                return;
            }

            while let Some(message) = stream.next().await {
                let event = match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Envelope>(&text) {
                        Ok(envelope) => {
                            let kind = envelope.kind.clone();
                            SubscriptionEvent::Notification(ModelServerNotification::new(
                                kind,
                                envelope.payload(),
                            ))
                        }
                        Err(e) => {
                            warn!(error = %e, "Ignoring malformed subscription frame");
                            continue;
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "Subscription closed by server");
                        break;
                    }
                    Ok(other) => {
                        trace!(?other, "Ignoring non-text subscription frame");
                        continue;
                    }
                    Err(e) => SubscriptionEvent::Error(e.to_string()),
                };

                let is_error = matches!(event, SubscriptionEvent::Error(_));
                if tx.send(event).await.is_err() || is_error {
                    break;
                }
            }

            let _ = tx.send(SubscriptionEvent::Closed).await;
        });

        Ok(rx)
    }
}
