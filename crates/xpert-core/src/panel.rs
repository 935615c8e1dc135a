use chrono::DateTime;
use chrono::Utc;

use crate::state::ConversationState;
use crate::trial::is_expired;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelView {
    Closed,
    DisclosurePending,
    ChatOpen,
    UpgradePanel,
}

impl PanelView {
    pub fn label(self) -> &'static str {
        match self {
            Self::Closed => "Closed",
            Self::DisclosurePending => "Disclosure pending",
            Self::ChatOpen => "Chat open",
            Self::UpgradePanel => "Upgrade panel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelInputs {
    pub sidebar_is_open: bool,
    pub disclosure_acknowledged: bool,
    pub upgrade_eligible: bool,
    pub audit_trial_expired: bool,
}

impl PanelInputs {
    pub fn from_state(
        state: &ConversationState,
        upgrade_eligible: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            sidebar_is_open: state.sidebar_is_open,
            disclosure_acknowledged: state.disclosure_acknowledged,
            upgrade_eligible,
            audit_trial_expired: state
                .audit_trial
                .as_ref()
                .is_some_and(|trial| is_expired(trial, now)),
        }
    }
}

/// Closed is governed only by the sidebar toggle. Once open, an expired
/// trial for an upgrade-eligible learner always wins over the chat.
pub fn derive_panel(inputs: PanelInputs) -> PanelView {
    if !inputs.sidebar_is_open {
        return PanelView::Closed;
    }

    if inputs.upgrade_eligible && inputs.audit_trial_expired {
        return PanelView::UpgradePanel;
    }

    if inputs.disclosure_acknowledged {
        return PanelView::ChatOpen;
    }

    PanelView::DisclosurePending
}
