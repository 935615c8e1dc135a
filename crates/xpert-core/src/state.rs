use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::experiments::ExperimentDecision;
use crate::experiments::ExperimentFlag;
use crate::message::Message;
use crate::message::Role;
use crate::trial::AuditTrial;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEntry {
    pub seq: u64,
    pub action: &'static str,
}

#[derive(Debug, Clone)]
pub struct TransitionLog {
    cap: usize,
    next_seq: u64,
    buf: VecDeque<TransitionEntry>,
}

impl TransitionLog {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            next_seq: 1,
            buf: VecDeque::with_capacity(cap),
        }
    }

    pub fn append(&mut self, action: &'static str) {
        let entry = TransitionEntry {
            seq: self.next_seq,
            action,
        };
        self.next_seq += 1;

        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransitionEntry> {
        self.buf.iter()
    }

    pub fn actions(&self) -> Vec<&'static str> {
        self.buf.iter().map(|entry| entry.action).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Default for TransitionLog {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Last decision seen per flag. Informational only: callers re-resolve
/// through the resolver before acting on a decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentCache {
    decisions: BTreeMap<ExperimentFlag, ExperimentDecision>,
}

impl ExperimentCache {
    pub fn get(&self, flag: ExperimentFlag) -> Option<&ExperimentDecision> {
        self.decisions.get(&flag)
    }

    pub fn set(&mut self, flag: ExperimentFlag, decision: ExperimentDecision) {
        self.decisions.insert(flag, decision);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    pub conversation_id: ConversationId,
    pub current_draft: String,
    pub message_list: Vec<Message>,
    pub api_is_loading: bool,
    pub api_error: bool,
    pub disclosure_acknowledged: bool,
    pub sidebar_is_open: bool,
    pub is_enabled: bool,
    pub audit_trial: Option<AuditTrial>,
    pub audit_trial_length_days: Option<u32>,
    pub experiments: ExperimentCache,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::with_id(ConversationId::generate())
    }

    pub fn with_id(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            current_draft: String::new(),
            message_list: Vec::new(),
            api_is_loading: false,
            api_error: false,
            disclosure_acknowledged: false,
            sidebar_is_open: false,
            is_enabled: false,
            audit_trial: None,
            audit_trial_length_days: None,
            experiments: ExperimentCache::default(),
        }
    }

    pub fn user_message_count(&self) -> usize {
        self.message_list
            .iter()
            .filter(|message| message.role == Role::User)
            .count()
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}
