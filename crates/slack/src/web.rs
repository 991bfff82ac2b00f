//! Outbound Slack Web API calls: opening Socket Mode connections, replying via
//! `response_url` and posting to channels.

use std::time::Duration;

use async_trait::async_trait;
use bookbot_core::config::SlackConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::blocks::{MessageTemplate, Visibility};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebApiError {
    #[error("slack http request failed: {0}")]
    Http(String),
    #[error("slack responded with status {0}")]
    Status(u16),
    #[error("slack api error on {method}: {error}")]
    Api { method: String, error: String },
    #[error("slack response could not be decoded: {0}")]
    Decode(String),
}

/// Sends rendered messages back to Slack.
#[async_trait]
pub trait MessageDelivery: Send + Sync {
    async fn respond(&self, response_url: &str, message: &MessageTemplate)
        -> Result<(), WebApiError>;
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), WebApiError>;
}

#[derive(Clone)]
pub struct SlackWebClient {
    http: Client,
    api_base_url: String,
    app_token: SecretString,
    bot_token: SecretString,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl SlackWebClient {
    pub fn new(
        api_base_url: impl Into<String>,
        app_token: SecretString,
        bot_token: SecretString,
    ) -> Result<Self, WebApiError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| WebApiError::Http(error.to_string()))?;
        Ok(Self {
            http,
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
            app_token,
            bot_token,
        })
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, WebApiError> {
        Self::new(config.api_base_url.clone(), config.app_token.clone(), config.bot_token.clone())
    }

    /// Asks Slack for a fresh Socket Mode WebSocket URL.
    pub async fn open_connection(&self) -> Result<String, WebApiError> {
        let envelope =
            self.call("apps.connections.open", &self.app_token, &Value::Object(Default::default()))
                .await?;
        envelope.url.ok_or_else(|| {
            WebApiError::Decode("apps.connections.open returned no url".to_owned())
        })
    }

    async fn call(
        &self,
        method: &str,
        token: &SecretString,
        body: &Value,
    ) -> Result<ApiEnvelope, WebApiError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.api_base_url))
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| WebApiError::Http(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebApiError::Status(status.as_u16()));
        }

        let envelope: ApiEnvelope =
            response.json().await.map_err(|error| WebApiError::Decode(error.to_string()))?;
        if !envelope.ok {
            let error = envelope.error.unwrap_or_else(|| "unknown_error".to_owned());
            warn!(
                event_name = "slack.web.api_error",
                method,
                error = %error,
                "slack api call rejected"
            );
            return Err(WebApiError::Api { method: method.to_owned(), error });
        }
        Ok(envelope)
    }
}

#[async_trait]
impl MessageDelivery for SlackWebClient {
    async fn respond(
        &self,
        response_url: &str,
        message: &MessageTemplate,
    ) -> Result<(), WebApiError> {
        let response = self
            .http
            .post(response_url)
            .json(&response_payload(message))
            .send()
            .await
            .map_err(|error| WebApiError::Http(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebApiError::Status(status.as_u16()));
        }
        debug!(event_name = "slack.web.responded", "delivered reply to response_url");
        Ok(())
    }

    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), WebApiError> {
        self.call("chat.postMessage", &self.bot_token, &channel_payload(channel_id, message))
            .await?;
        debug!(event_name = "slack.web.posted", channel_id, "posted message to channel");
        Ok(())
    }
}

pub fn response_payload(message: &MessageTemplate) -> Value {
    let response_type = match message.visibility {
        Visibility::Ephemeral => "ephemeral",
        Visibility::InChannel => "in_channel",
    };
    json!({
        "response_type": response_type,
        "replace_original": message.replace_original,
        "text": message.fallback_text,
        "blocks": message.blocks,
    })
}

pub fn channel_payload(channel_id: &str, message: &MessageTemplate) -> Value {
    json!({
        "channel": channel_id,
        "text": message.fallback_text,
        "blocks": message.blocks,
        "unfurl_links": false,
    })
}
