use super::actions::RuntimeAction;
use super::actions::UserAction;
use super::actions::XpertAction;
use super::state::ConversationState;
use super::telemetry::TelemetryEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XpertEffect {
    Track(TelemetryEvent),
    ShowSurvey,
}

pub const SURVEY_MIN_MESSAGES: usize = 2;

pub fn reduce(state: &mut ConversationState, action: XpertAction) -> Vec<XpertEffect> {
    match action {
        XpertAction::User(user) => reduce_user(state, user),
        XpertAction::Runtime(runtime) => {
            reduce_runtime(state, runtime);
            Vec::new()
        }
    }
}

fn reduce_user(state: &mut ConversationState, action: UserAction) -> Vec<XpertEffect> {
    match action {
        UserAction::UpdateDraft(content) => {
            state.current_draft = content;
            Vec::new()
        }
        UserAction::AppendMessage {
            message,
            course_id,
            user_id,
            experiment,
        } => {
            let event = TelemetryEvent::MessageSent {
                conversation_id: state.conversation_id,
                course_id,
                user_id,
                timestamp: message.timestamp.clone(),
                role: message.role,
                experiment,
            };
            // Receipt order, never sorted by timestamp.
            state.message_list.push(message);
            state.current_draft.clear();
            state.api_error = false;
            vec![XpertEffect::Track(event)]
        }
        UserAction::ClearConversation => {
            state.message_list = Vec::new();
            state.current_draft.clear();
            state.api_error = false;
            vec![XpertEffect::Track(TelemetryEvent::ConversationCleared {
                conversation_id: state.conversation_id,
            })]
        }
        UserAction::AcknowledgeDisclosure(value) => {
            let was_acknowledged = state.disclosure_acknowledged;
            state.disclosure_acknowledged = value;
            if value && !was_acknowledged {
                return vec![XpertEffect::Track(TelemetryEvent::DisclosureAcknowledged {
                    conversation_id: state.conversation_id,
                })];
            }
            Vec::new()
        }
        UserAction::SetSidebarOpen { open, source } => {
            let was_open = state.sidebar_is_open;
            state.sidebar_is_open = open;
            match (was_open, open) {
                (false, true) => vec![XpertEffect::Track(TelemetryEvent::Launched {
                    conversation_id: state.conversation_id,
                    source,
                })],
                (true, false) if state.message_list.len() >= SURVEY_MIN_MESSAGES => {
                    vec![XpertEffect::ShowSurvey]
                }
                _ => Vec::new(),
            }
        }
    }
}

fn reduce_runtime(state: &mut ConversationState, action: RuntimeAction) {
    match action {
        RuntimeAction::SetApiIsLoading(loading) => {
            state.api_is_loading = loading;
        }
        RuntimeAction::SetApiError => {
            state.api_error = true;
        }
        RuntimeAction::SetMessageList(messages) => {
            state.message_list = messages;
        }
        RuntimeAction::SetDisclosureAcknowledged(value) => {
            state.disclosure_acknowledged = value;
        }
        RuntimeAction::SetIsEnabled(enabled) => {
            state.is_enabled = enabled;
        }
        RuntimeAction::SetAuditTrial(trial) => {
            state.audit_trial = Some(trial);
        }
        RuntimeAction::SetAuditTrialLengthDays(days) => {
            state.audit_trial_length_days = Some(days);
        }
        RuntimeAction::SetExperiment { flag, decision } => {
            state.experiments.set(flag, decision);
        }
    }
}

#[cfg(test)]
mod tests;
