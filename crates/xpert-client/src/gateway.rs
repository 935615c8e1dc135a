use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::warn;
use url::Url;
use xpert_core::config::ChatConfig;
use xpert_core::Message;

use crate::error::ApiTransportError;

/// One element of a send-message reply that carried both `role` and `content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMessage {
    pub role: String,
    pub content: String,
}

impl ReplyMessage {
    fn from_value(value: &Value) -> Option<Self> {
        let role = value.get("role")?.as_str()?;
        let content = value.get("content")?.as_str()?;
        Some(Self {
            role: role.to_string(),
            content: content.to_string(),
        })
    }
}

/// The shapes a send-message reply can take on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    Single(ReplyMessage),
    Many(Vec<ReplyMessage>),
    Malformed,
}

impl ChatReply {
    pub fn decode(value: &Value) -> Self {
        match value {
            Value::Object(_) => ReplyMessage::from_value(value)
                .map(Self::Single)
                .unwrap_or(Self::Malformed),
            Value::Array(items) => {
                let messages: Vec<ReplyMessage> =
                    items.iter().filter_map(ReplyMessage::from_value).collect();
                let dropped = items.len() - messages.len();
                if dropped > 0 {
                    warn!(dropped, "discarding reply elements without role or content");
                }
                if messages.is_empty() {
                    Self::Malformed
                } else {
                    Self::Many(messages)
                }
            }
            _ => Self::Malformed,
        }
    }
}

/// Entry of a stored conversation as the backend returns it. Fields stay
/// optional so one bad entry cannot fail the whole reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMessage {
    pub role: Option<String>,
    pub content: Option<String>,
    pub timestamp: Option<String>,
}

impl RawMessage {
    pub fn to_message(&self) -> Option<Message> {
        Message::from_history(
            self.role.as_deref()?,
            self.content.as_deref()?,
            self.timestamp.as_deref()?,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTrial {
    pub start_date: Option<String>,
    pub expiration_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSummary {
    pub enabled: bool,
    pub message_history: Vec<RawMessage>,
    pub audit_trial: Option<RawTrial>,
    pub audit_trial_length_days: Option<u32>,
}

/// Routing hints keyed in camelCase; snake-cased onto the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraParams {
    params: BTreeMap<String, String>,
}

impl ExtraParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn response_variation(variation_key: Option<&str>) -> Self {
        let mut params = Self::new();
        if let Some(key) = variation_key {
            params.insert("responseVariation", key);
        }
        params
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.params.insert(key.to_string(), value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn query_pairs(&self) -> impl Iterator<Item = (String, &str)> {
        self.params
            .iter()
            .map(|(key, value)| (snake_case(key), value.as_str()))
    }
}

pub fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (index, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if index > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// `messages` must be the full ordered history; the backend keeps no state.
    async fn send_message(
        &self,
        course_id: &str,
        unit_id: Option<&str>,
        messages: &[Message],
        extra: &ExtraParams,
    ) -> Result<ChatReply, ApiTransportError>;

    async fn fetch_summary(&self, course_id: &str) -> Result<ChatSummary, ApiTransportError>;

    async fn fetch_message_history(
        &self,
        course_id: &str,
    ) -> Result<Vec<RawMessage>, ApiTransportError>;
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpChatGateway {
    client: reqwest::Client,
    base_url: Url,
    summary_path: String,
    history_path: String,
    v2_endpoint: bool,
}

impl HttpChatGateway {
    pub fn from_config(config: &ChatConfig) -> Result<Self, ApiTransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let base_url = Url::parse(config.base_url.trim())?;
        if base_url.cannot_be_a_base() {
            return Err(ApiTransportError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            summary_path: config.summary_path.clone(),
            history_path: config.history_path.clone(),
            v2_endpoint: config.v2_endpoint,
        })
    }

    fn endpoint<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, ApiTransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiTransportError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments.into_iter().filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    pub fn send_message_url(
        &self,
        course_id: &str,
        unit_id: Option<&str>,
        extra: &ExtraParams,
    ) -> Result<Url, ApiTransportError> {
        let mut url = if self.v2_endpoint {
            self.endpoint(["v2", course_id])?
        } else {
            self.endpoint([course_id])?
        };

        if unit_id.is_some() || !extra.is_empty() {
            let mut query = url.query_pairs_mut();
            if let Some(unit_id) = unit_id {
                query.append_pair("unit_id", unit_id);
            }
            for (key, value) in extra.query_pairs() {
                query.append_pair(&key, value);
            }
        }
        Ok(url)
    }

    pub fn summary_url(&self, course_id: &str) -> Result<Url, ApiTransportError> {
        self.endpoint(std::iter::once(course_id).chain(self.summary_path.split('/')))
    }

    pub fn history_url(&self, course_id: &str) -> Result<Url, ApiTransportError> {
        self.endpoint(std::iter::once(course_id).chain(self.history_path.split('/')))
    }

    async fn read_body<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiTransportError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiTransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ChatGateway for HttpChatGateway {
    async fn send_message(
        &self,
        course_id: &str,
        unit_id: Option<&str>,
        messages: &[Message],
        extra: &ExtraParams,
    ) -> Result<ChatReply, ApiTransportError> {
        let url = self.send_message_url(course_id, unit_id, extra)?;
        let payload: Vec<WireMessage<'_>> = messages
            .iter()
            .map(|message| WireMessage {
                role: message.role.label(),
                content: &message.content,
            })
            .collect();

        debug!(%url, messages = payload.len(), "posting conversation");
        let response = self.client.post(url).json(&payload).send().await?;
        let value: Value = Self::read_body(response).await?;
        Ok(ChatReply::decode(&value))
    }

    async fn fetch_summary(&self, course_id: &str) -> Result<ChatSummary, ApiTransportError> {
        let url = self.summary_url(course_id)?;
        debug!(%url, "fetching chat summary");
        let response = self.client.get(url).send().await?;
        Self::read_body(response).await
    }

    async fn fetch_message_history(
        &self,
        course_id: &str,
    ) -> Result<Vec<RawMessage>, ApiTransportError> {
        let url = self.history_url(course_id)?;
        debug!(%url, "fetching message history");
        let response = self.client.get(url).send().await?;
        Self::read_body(response).await
    }
}
