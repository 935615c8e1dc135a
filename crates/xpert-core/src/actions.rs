use super::experiments::ExperimentDecision;
use super::experiments::ExperimentFlag;
use super::experiments::ExperimentTag;
use super::message::Message;
use super::telemetry::LaunchSource;
use super::trial::AuditTrial;

#[derive(Debug, Clone)]
pub enum XpertAction {
    User(UserAction),
    Runtime(RuntimeAction),
}

impl XpertAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::User(action) => action.label(),
            Self::Runtime(action) => action.label(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum UserAction {
    UpdateDraft(String),
    AppendMessage {
        message: Message,
        course_id: String,
        user_id: Option<String>,
        experiment: Option<ExperimentTag>,
    },
    ClearConversation,
    AcknowledgeDisclosure(bool),
    SetSidebarOpen {
        open: bool,
        source: LaunchSource,
    },
}

impl UserAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::UpdateDraft(_) => "update-draft",
            Self::AppendMessage { .. } => "append-message",
            Self::ClearConversation => "clear-conversation",
            Self::AcknowledgeDisclosure(_) => "acknowledge-disclosure",
            Self::SetSidebarOpen { .. } => "set-sidebar-open",
        }
    }
}

#[derive(Debug, Clone)]
pub enum RuntimeAction {
    SetApiIsLoading(bool),
    SetApiError,
    SetMessageList(Vec<Message>),
    /// Restores consent implied by stored history; never tracked.
    SetDisclosureAcknowledged(bool),
    SetIsEnabled(bool),
    SetAuditTrial(AuditTrial),
    SetAuditTrialLengthDays(u32),
    SetExperiment {
        flag: ExperimentFlag,
        decision: ExperimentDecision,
    },
}

impl RuntimeAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SetApiIsLoading(_) => "set-api-is-loading",
            Self::SetApiError => "set-api-error",
            Self::SetMessageList(_) => "set-message-list",
            Self::SetDisclosureAcknowledged(_) => "set-disclosure-acknowledged",
            Self::SetIsEnabled(_) => "set-is-enabled",
            Self::SetAuditTrial(_) => "set-audit-trial",
            Self::SetAuditTrialLengthDays(_) => "set-audit-trial-length-days",
            Self::SetExperiment { .. } => "set-experiment",
        }
    }
}
