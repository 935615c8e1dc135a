use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

pub(super) use super::CourseContext;
pub(super) use super::MessageDispatcher;
pub(super) use crate::error::ApiTransportError;
pub(super) use crate::gateway::ChatGateway;
pub(super) use crate::gateway::ChatReply;
pub(super) use crate::gateway::ChatSummary;
pub(super) use crate::gateway::ExtraParams;
pub(super) use crate::gateway::RawMessage;
pub(super) use crate::gateway::RawTrial;
pub(super) use crate::gateway::ReplyMessage;
pub(super) use crate::telemetry::TelemetrySink;
pub(super) use xpert_core::experiments::ExperimentDecision;
pub(super) use xpert_core::experiments::ExperimentFlag;
pub(super) use xpert_core::experiments::ExperimentResolver;
pub(super) use xpert_core::experiments::StaticDecisionProvider;
pub(super) use xpert_core::experiments::PROMPT_EXPERIMENT_KEY;
pub(super) use xpert_core::telemetry::LaunchSource;
pub(super) use xpert_core::telemetry::TelemetryEvent;
pub(super) use xpert_core::ConversationId;
pub(super) use xpert_core::ConversationState;
pub(super) use xpert_core::ConversationStore;
pub(super) use xpert_core::Role;


const COURSE_ID: &str = "course-v1:edx+test+23";

struct Scripted<T> {
    delay: Duration,
    result: Result<T, ApiTransportError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SentRequest {
    course_id: String,
    unit_id: Option<String>,
    contents: Vec<String>,
    query: Vec<(String, String)>,
}

#[derive(Default)]
struct ScriptedGateway {
    replies: Mutex<VecDeque<Scripted<ChatReply>>>,
    summaries: Mutex<VecDeque<Scripted<ChatSummary>>>,
    histories: Mutex<VecDeque<Scripted<Vec<RawMessage>>>>,
    sent: Mutex<Vec<SentRequest>>,
    summary_calls: AtomicUsize,
    history_calls: AtomicUsize,
}

fn unscripted() -> ApiTransportError {
    ApiTransportError::Status {
        status: 404,
        body: "unscripted".to_string(),
    }
}

fn server_error() -> ApiTransportError {
    ApiTransportError::Status {
        status: 500,
        body: "boom".to_string(),
    }
}

async fn play<T>(queue: &Mutex<VecDeque<Scripted<T>>>) -> Result<T, ApiTransportError> {
    let next = queue.lock().unwrap().pop_front();
    let Some(Scripted { delay, result }) = next else {
        return Err(unscripted());
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    result
}

impl ScriptedGateway {
    fn reply(self, result: Result<ChatReply, ApiTransportError>) -> Self {
        self.delayed_reply(Duration::ZERO, result)
    }

    fn delayed_reply(self, delay: Duration, result: Result<ChatReply, ApiTransportError>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Scripted { delay, result });
        self
    }

    fn summary(self, result: Result<ChatSummary, ApiTransportError>) -> Self {
        self.summaries.lock().unwrap().push_back(Scripted {
            delay: Duration::ZERO,
            result,
        });
        self
    }

    fn history(self, result: Result<Vec<RawMessage>, ApiTransportError>) -> Self {
        self.histories.lock().unwrap().push_back(Scripted {
            delay: Duration::ZERO,
            result,
        });
        self
    }

    fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }

    fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }

    fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatGateway for ScriptedGateway {
    async fn send_message(
        &self,
        course_id: &str,
        unit_id: Option<&str>,
        messages: &[xpert_core::Message],
        extra: &ExtraParams,
    ) -> Result<ChatReply, ApiTransportError> {
        self.sent.lock().unwrap().push(SentRequest {
            course_id: course_id.to_string(),
            unit_id: unit_id.map(str::to_string),
            contents: messages
                .iter()
                .map(|message| message.content.clone())
                .collect(),
            query: extra
                .query_pairs()
                .map(|(key, value)| (key, value.to_string()))
                .collect(),
        });
        play(&self.replies).await
    }

    async fn fetch_summary(&self, _course_id: &str) -> Result<ChatSummary, ApiTransportError> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        play(&self.summaries).await
    }

    async fn fetch_message_history(
        &self,
        _course_id: &str,
    ) -> Result<Vec<RawMessage>, ApiTransportError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        play(&self.histories).await
    }
}

#[derive(Default)]
struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
    surveys: Mutex<Vec<ConversationId>>,
}

impl RecordingTelemetry {
    fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(TelemetryEvent::name)
            .collect()
    }

    fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn track(&self, event: &TelemetryEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn survey_requested(&self, conversation_id: ConversationId) {
        self.surveys.lock().unwrap().push(conversation_id);
    }
}

struct Session {
    dispatcher: MessageDispatcher,
    gateway: Arc<ScriptedGateway>,
    telemetry: Arc<RecordingTelemetry>,
}

impl Session {
    fn state(&self) -> ConversationState {
        self.dispatcher.store().snapshot()
    }

    fn transitions(&self) -> Vec<&'static str> {
        self.dispatcher
            .store()
            .transitions()
            .iter()
            .map(|entry| entry.action)
            .collect()
    }

    fn contents(&self) -> Vec<String> {
        self.state()
            .message_list
            .into_iter()
            .map(|message| message.content)
            .collect()
    }
}

fn session(gateway: ScriptedGateway) -> Session {
    let gateway = Arc::new(gateway);
    let telemetry = Arc::new(RecordingTelemetry::default());
    let dispatcher = MessageDispatcher::new(
        Arc::new(ConversationStore::default()),
        gateway.clone(),
        telemetry.clone(),
    )
    .with_user_id("3");
    Session {
        dispatcher,
        gateway,
        telemetry,
    }
}

fn assistant(content: &str) -> ReplyMessage {
    ReplyMessage {
        role: "assistant".to_string(),
        content: content.to_string(),
    }
}

fn raw(role: &str, content: &str, timestamp: &str) -> RawMessage {
    RawMessage {
        role: Some(role.to_string()),
        content: Some(content.to_string()),
        timestamp: Some(timestamp.to_string()),
    }
}

fn trial(start: &str, expiration: &str) -> RawTrial {
    RawTrial {
        start_date: Some(start.to_string()),
        expiration_date: Some(expiration.to_string()),
    }
}
