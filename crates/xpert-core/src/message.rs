use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A single chat entry. The timestamp stays in its serialized form so the
/// message list can be stored and compared without re-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: format_timestamp(at),
        }
    }

    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self::new(role, content, Utc::now())
    }

    /// Builds a message from a stored history entry. Returns `None` when the
    /// role is unknown or the timestamp does not parse.
    pub fn from_history(role: &str, content: &str, timestamp: &str) -> Option<Self> {
        let role = Role::parse(role)?;
        let timestamp = canonical_timestamp(timestamp)?;
        Some(Self {
            role,
            content: content.to_string(),
            timestamp,
        })
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

pub fn canonical_timestamp(raw: &str) -> Option<String> {
    parse_timestamp(raw).map(format_timestamp)
}
