use serde::Serialize;

use crate::experiments::ExperimentTag;
use crate::message::Role;
use crate::state::ConversationId;

pub const MESSAGE_SENT_EVENT: &str = "edx.ui.lms.learning_assistant.message";
pub const CONVERSATION_CLEARED_EVENT: &str = "edx.ui.lms.learning_assistant.conversation_cleared";
pub const DISCLOSURE_ACKNOWLEDGED_EVENT: &str =
    "edx.ui.lms.learning_assistant.disclosure_acknowledged";
pub const LAUNCH_EVENT: &str = "edx.ui.lms.learning_assistant.launch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchSource {
    Toggle,
    Cta,
    ProductTour,
}

impl LaunchSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Toggle => "toggle",
            Self::Cta => "cta",
            Self::ProductTour => "product-tour",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TelemetryEvent {
    MessageSent {
        conversation_id: ConversationId,
        course_id: String,
        user_id: Option<String>,
        timestamp: String,
        role: Role,
        #[serde(flatten)]
        experiment: Option<ExperimentTag>,
    },
    ConversationCleared {
        conversation_id: ConversationId,
    },
    DisclosureAcknowledged {
        conversation_id: ConversationId,
    },
    Launched {
        conversation_id: ConversationId,
        source: LaunchSource,
    },
}

impl TelemetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageSent { .. } => MESSAGE_SENT_EVENT,
            Self::ConversationCleared { .. } => CONVERSATION_CLEARED_EVENT,
            Self::DisclosureAcknowledged { .. } => DISCLOSURE_ACKNOWLEDGED_EVENT,
            Self::Launched { .. } => LAUNCH_EVENT,
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        match self {
            Self::MessageSent {
                conversation_id, ..
            }
            | Self::ConversationCleared { conversation_id }
            | Self::DisclosureAcknowledged { conversation_id }
            | Self::Launched {
                conversation_id, ..
            } => *conversation_id,
        }
    }

    pub fn properties(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
