use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use crate::actions::XpertAction;
use crate::reducer::reduce;
use crate::reducer::XpertEffect;
use crate::state::ConversationState;
use crate::state::TransitionEntry;
use crate::state::TransitionLog;

#[derive(Debug)]
struct StoreInner {
    state: ConversationState,
    transitions: TransitionLog,
}

/// Single owner of the conversation state. Every mutation runs the reducer
/// under one lock, so readers never observe a half-applied action.
#[derive(Debug)]
pub struct ConversationStore {
    inner: Mutex<StoreInner>,
}

impl ConversationStore {
    pub fn new(state: ConversationState) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                state,
                transitions: TransitionLog::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn dispatch(&self, action: XpertAction) -> Vec<XpertEffect> {
        let mut inner = self.lock();
        inner.transitions.append(action.label());
        reduce(&mut inner.state, action)
    }

    pub fn read<R>(&self, f: impl FnOnce(&ConversationState) -> R) -> R {
        f(&self.lock().state)
    }

    pub fn snapshot(&self) -> ConversationState {
        self.read(Clone::clone)
    }

    pub fn transitions(&self) -> Vec<TransitionEntry> {
        self.lock().transitions.iter().cloned().collect()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(ConversationState::new())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::actions::RuntimeAction;
    use crate::actions::UserAction;

    #[test]
    fn dispatch_records_transitions_in_order() {
        let store = ConversationStore::default();
        store.dispatch(XpertAction::Runtime(RuntimeAction::SetApiIsLoading(true)));
        store.dispatch(XpertAction::User(UserAction::ClearConversation));
        store.dispatch(XpertAction::Runtime(RuntimeAction::SetApiIsLoading(false)));

        let transitions = store.transitions();
        let labels: Vec<&str> = transitions.iter().map(|entry| entry.action).collect();
        assert_eq!(
            labels,
            vec![
                "set-api-is-loading",
                "clear-conversation",
                "set-api-is-loading"
            ]
        );
        let seqs: Vec<u64> = transitions.iter().map(|entry| entry.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn snapshot_is_detached_from_later_dispatches() {
        let store = ConversationStore::default();
        let before = store.snapshot();
        store.dispatch(XpertAction::User(UserAction::UpdateDraft("hi".to_string())));
        assert_eq!(before.current_draft, "");
        assert_eq!(store.read(|state| state.current_draft.clone()), "hi");
        assert_eq!(before.conversation_id, store.snapshot().conversation_id);
    }
}
