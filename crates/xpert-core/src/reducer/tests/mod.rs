use chrono::TimeZone;
use chrono::Utc;
use uuid::Uuid;

pub(super) use super::reduce;
pub(super) use super::XpertEffect;
pub(super) use super::SURVEY_MIN_MESSAGES;
pub(super) use crate::actions::RuntimeAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::actions::XpertAction;
pub(super) use crate::experiments::ExperimentDecision;
pub(super) use crate::experiments::ExperimentFlag;
pub(super) use crate::experiments::ExperimentTag;
pub(super) use crate::message::Message;
pub(super) use crate::message::Role;
pub(super) use crate::state::ConversationId;
pub(super) use crate::state::ConversationState;
pub(super) use crate::state::TransitionLog;
pub(super) use crate::telemetry::LaunchSource;
pub(super) use crate::telemetry::DISCLOSURE_ACKNOWLEDGED_EVENT;
pub(super) use crate::telemetry::LAUNCH_EVENT;
pub(super) use crate::telemetry::TelemetryEvent;
pub(super) use crate::trial::AuditTrial;


const COURSE_ID: &str = "course-v1:edx+test+23";

fn conversation_id() -> ConversationId {
    ConversationId(Uuid::nil())
}

fn state() -> ConversationState {
    ConversationState::with_id(conversation_id())
}

fn message(role: Role, content: &str, minute: u32) -> Message {
    let at = Utc.with_ymd_and_hms(2025, 3, 4, 12, minute, 0).unwrap();
    Message::new(role, content, at)
}

fn append(state: &mut ConversationState, message: Message) -> Vec<XpertEffect> {
    reduce(
        state,
        XpertAction::User(UserAction::AppendMessage {
            message,
            course_id: COURSE_ID.to_string(),
            user_id: Some("3".to_string()),
            experiment: None,
        }),
    )
}

fn run_user(state: &mut ConversationState, action: UserAction) -> Vec<XpertEffect> {
    reduce(state, XpertAction::User(action))
}

fn run_runtime(state: &mut ConversationState, action: RuntimeAction) {
    let effects = reduce(state, XpertAction::Runtime(action));
    assert!(effects.is_empty(), "runtime actions never emit effects");
}

fn tracked(effects: &[XpertEffect]) -> Vec<&'static str> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            XpertEffect::Track(event) => Some(event.name()),
            XpertEffect::ShowSurvey => None,
        })
        .collect()
}
