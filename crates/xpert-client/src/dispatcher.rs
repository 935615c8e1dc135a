use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use tracing::warn;
use xpert_core::experiments::ExperimentFlag;
use xpert_core::experiments::ExperimentResolver;
use xpert_core::experiments::ExperimentTag;
use xpert_core::telemetry::LaunchSource;
use xpert_core::trial::AuditTrial;
use xpert_core::ConversationStore;
use xpert_core::Message;
use xpert_core::Role;
use xpert_core::RuntimeAction;
use xpert_core::UserAction;
use xpert_core::XpertAction;
use xpert_core::XpertEffect;

use crate::gateway::ChatGateway;
use crate::gateway::ChatReply;
use crate::gateway::ChatSummary;
use crate::gateway::ExtraParams;
use crate::gateway::RawMessage;
use crate::telemetry::TelemetrySink;

/// Where the learner is chatting from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseContext {
    pub course_id: String,
    pub unit_id: Option<String>,
    pub is_upgrade_eligible: bool,
}

impl CourseContext {
    pub fn new(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            unit_id: None,
            is_upgrade_eligible: false,
        }
    }
}

/// Orchestrates every session procedure: store mutations, gateway calls and
/// the telemetry they produce.
///
/// Gateway round-trips are serialized per session. A learner message is
/// appended under the same turn gate as its request, so every request ends
/// with its own message and carries the replies that preceded it.
pub struct MessageDispatcher {
    store: Arc<ConversationStore>,
    gateway: Arc<dyn ChatGateway>,
    telemetry: Arc<dyn TelemetrySink>,
    user_id: Option<String>,
    turn: Mutex<()>,
}

/// Clears the loading flag on every exit from a round-trip, including a
/// dropped future.
struct LoadingGuard<'a> {
    dispatcher: &'a MessageDispatcher,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.dispatcher.runtime(RuntimeAction::SetApiIsLoading(false));
    }
}

impl MessageDispatcher {
    pub fn new(
        store: Arc<ConversationStore>,
        gateway: Arc<dyn ChatGateway>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            store,
            gateway,
            telemetry,
            user_id: None,
            turn: Mutex::new(()),
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    fn dispatch(&self, action: XpertAction) {
        debug!(action = action.label(), "dispatch");
        for effect in self.store.dispatch(action) {
            match effect {
                XpertEffect::Track(event) => self.telemetry.track(&event),
                XpertEffect::ShowSurvey => {
                    let conversation_id = self.store.read(|state| state.conversation_id);
                    self.telemetry.survey_requested(conversation_id);
                }
            }
        }
    }

    fn runtime(&self, action: RuntimeAction) {
        self.dispatch(XpertAction::Runtime(action));
    }

    fn user(&self, action: UserAction) {
        self.dispatch(XpertAction::User(action));
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        self.runtime(RuntimeAction::SetApiIsLoading(true));
        LoadingGuard { dispatcher: self }
    }

    pub fn update_draft(&self, content: impl Into<String>) {
        self.user(UserAction::UpdateDraft(content.into()));
    }

    pub fn append_user_message(
        &self,
        role: Role,
        content: impl Into<String>,
        course_id: &str,
        variation_key: Option<&str>,
    ) {
        self.user(UserAction::AppendMessage {
            message: Message::now(role, content),
            course_id: course_id.to_string(),
            user_id: self.user_id.clone(),
            experiment: variation_key.map(ExperimentTag::prompt),
        });
    }

    pub async fn request_assistant_reply(
        &self,
        course_id: &str,
        unit_id: Option<&str>,
        is_upgrade_eligible: bool,
        variation_key: Option<&str>,
    ) {
        let _turn = self.turn.lock().await;
        self.request_in_turn(course_id, unit_id, is_upgrade_eligible, variation_key)
            .await;
    }

    /// Appends a learner message and requests its reply as one turn.
    pub async fn send_user_message(
        &self,
        content: impl Into<String>,
        ctx: &CourseContext,
        variation_key: Option<&str>,
    ) {
        let _turn = self.turn.lock().await;
        self.append_user_message(Role::User, content, &ctx.course_id, variation_key);
        self.request_in_turn(
            &ctx.course_id,
            ctx.unit_id.as_deref(),
            ctx.is_upgrade_eligible,
            variation_key,
        )
        .await;
    }

    async fn request_in_turn(
        &self,
        course_id: &str,
        unit_id: Option<&str>,
        is_upgrade_eligible: bool,
        variation_key: Option<&str>,
    ) {
        let _loading = self.begin_loading();

        let (messages, is_first_message) = self.store.read(|state| {
            (state.message_list.clone(), state.user_message_count() == 1)
        });
        let extra = ExtraParams::response_variation(variation_key);

        match self
            .gateway
            .send_message(course_id, unit_id, &messages, &extra)
            .await
        {
            Ok(reply) => {
                let replies = match reply {
                    ChatReply::Single(message) => vec![message],
                    ChatReply::Many(messages) => messages,
                    ChatReply::Malformed => {
                        warn!(course_id, "chat reply carried no usable message");
                        Vec::new()
                    }
                };
                for reply in replies {
                    self.append_user_message(Role::Assistant, reply.content, course_id, None);
                }

                // A trial may have been created server-side by the first message.
                if is_first_message && is_upgrade_eligible {
                    self.refresh_summary_in_turn(course_id).await;
                }
            }
            Err(err) => {
                warn!(course_id, error = %err, "chat request failed");
                self.runtime(RuntimeAction::SetApiError);
            }
        }
    }

    pub async fn refresh_summary(&self, course_id: &str) {
        let _turn = self.turn.lock().await;
        self.refresh_summary_in_turn(course_id).await;
    }

    async fn refresh_summary_in_turn(&self, course_id: &str) {
        let _loading = self.begin_loading();
        match self.gateway.fetch_summary(course_id).await {
            Ok(summary) => self.apply_summary(summary),
            Err(err) => {
                warn!(course_id, error = %err, "chat summary request failed");
                self.runtime(RuntimeAction::SetApiError);
            }
        }
    }

    fn apply_summary(&self, summary: ChatSummary) {
        self.runtime(RuntimeAction::SetIsEnabled(summary.enabled));
        self.hydrate_history(&summary.message_history);

        if let Some(raw) = summary.audit_trial {
            match AuditTrial::from_raw(raw.start_date.as_deref(), raw.expiration_date.as_deref()) {
                Ok(Some(trial)) => self.runtime(RuntimeAction::SetAuditTrial(trial)),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "ignoring audit trial"),
            }
        }

        if let Some(days) = summary.audit_trial_length_days {
            self.runtime(RuntimeAction::SetAuditTrialLengthDays(days));
        }
    }

    /// Stored history replaces the conversation and implies prior consent.
    fn hydrate_history(&self, history: &[RawMessage]) {
        if history.is_empty() {
            return;
        }

        let messages: Vec<Message> = history
            .iter()
            .filter_map(|raw| {
                let message = raw.to_message();
                if message.is_none() {
                    warn!(role = ?raw.role, timestamp = ?raw.timestamp, "dropping history entry");
                }
                message
            })
            .collect();

        self.runtime(RuntimeAction::SetMessageList(messages));
        self.runtime(RuntimeAction::SetDisclosureAcknowledged(true));
    }

    pub async fn load_message_history(&self, course_id: &str) {
        if !self.store.read(|state| state.is_enabled) {
            debug!(course_id, "assistant disabled; skipping history");
            return;
        }

        let _turn = self.turn.lock().await;
        let _loading = self.begin_loading();
        match self.gateway.fetch_message_history(course_id).await {
            Ok(history) => self.hydrate_history(&history),
            Err(err) => {
                warn!(course_id, error = %err, "message history request failed");
                self.runtime(RuntimeAction::SetApiError);
            }
        }
    }

    pub fn clear_conversation(&self) {
        self.user(UserAction::ClearConversation);
    }

    pub fn acknowledge_disclosure(&self, value: bool) {
        self.user(UserAction::AcknowledgeDisclosure(value));
    }

    pub fn set_sidebar_open(&self, open: bool, source: LaunchSource) {
        self.user(UserAction::SetSidebarOpen { open, source });
    }

    pub fn sync_experiments(&self, resolver: &ExperimentResolver) {
        let user_id = self.user_id.as_deref().unwrap_or_default();
        for flag in ExperimentFlag::all() {
            let decision = resolver.resolve(flag, user_id);
            self.runtime(RuntimeAction::SetExperiment { flag, decision });
        }
    }

    /// Sends the current draft. Returns false when the draft is blank.
    pub async fn submit_draft(&self, ctx: &CourseContext, resolver: &ExperimentResolver) -> bool {
        let draft = self.store.read(|state| state.current_draft.clone());
        if draft.trim().is_empty() {
            return false;
        }
        // Taken now so a submit queued behind this turn cannot resend it.
        self.update_draft(String::new());

        let user_id = self.user_id.as_deref().unwrap_or_default();
        let prompt = resolver.prompt_decision(user_id);
        self.runtime(RuntimeAction::SetExperiment {
            flag: ExperimentFlag::PromptVariant,
            decision: prompt.clone(),
        });
        let variation_key = prompt.active_variation();

        self.acknowledge_disclosure(true);
        self.send_user_message(draft, ctx, variation_key).await;
        true
    }
}

#[cfg(test)]
mod tests;
