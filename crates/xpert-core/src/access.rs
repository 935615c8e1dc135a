use chrono::DateTime;
use chrono::Utc;

use crate::experiments::trial_upgrade_eligible;
use crate::experiments::ExperimentDecision;
use crate::trial::is_expired;
use crate::trial::AuditTrial;

pub const VERIFIED_MODES: &[&str] = &[
    "professional",
    "verified",
    "no-id-professional",
    "credit",
    "masters",
    "executive-education",
    "paid-executive-education",
    "paid-bootcamp",
];

pub const ALLOW_UPSELL_MODES: &[&str] = &[
    "audit",
    "honor",
    "unpaid-executive-education",
    "unpaid-bootcamp",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LearnerContext {
    pub is_staff: bool,
    pub enrollment_mode: Option<String>,
    pub in_active_exam: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseMeta {
    pub learning_assistant_enabled: Option<bool>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub access_expiration: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiddenReason {
    AssistantDisabled,
    ActiveExam,
    NotEnrolled,
    ModeNotAllowed,
    OutsideCourseDates,
}

impl HiddenReason {
    pub fn label(self) -> &'static str {
        match self {
            Self::AssistantDisabled => "assistant-disabled",
            Self::ActiveExam => "active-exam",
            Self::NotEnrolled => "not-enrolled",
            Self::ModeNotAllowed => "mode-not-allowed",
            Self::OutsideCourseDates => "outside-course-dates",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetAccess {
    Hidden(HiddenReason),
    Visible {
        is_upgrade_eligible: bool,
        has_active_audit_trial: bool,
    },
}

impl WidgetAccess {
    pub fn is_visible(self) -> bool {
        matches!(self, Self::Visible { .. })
    }
}

pub fn is_verified_mode(mode: &str) -> bool {
    VERIFIED_MODES.contains(&mode)
}

pub fn is_upsell_mode(mode: &str) -> bool {
    ALLOW_UPSELL_MODES.contains(&mode)
}

pub struct AccessInputs<'a> {
    pub learner: &'a LearnerContext,
    pub course: &'a CourseMeta,
    pub audit_feature_enabled: bool,
    pub trial_length: &'a ExperimentDecision,
    pub audit_trial: Option<&'a AuditTrial>,
    pub now: DateTime<Utc>,
}

/// Decides whether the assistant is offered at all for a learner in a course,
/// and whether that learner is on the audit-trial upgrade path.
///
/// Audit learners stay visible after their trial expires so the upgrade
/// panel can be shown; only an active trial is bound by access expiration.
pub fn evaluate_widget_access(inputs: AccessInputs<'_>) -> WidgetAccess {
    let AccessInputs {
        learner,
        course,
        audit_feature_enabled,
        trial_length,
        audit_trial,
        now,
    } = inputs;

    if course.learning_assistant_enabled == Some(false) {
        return WidgetAccess::Hidden(HiddenReason::AssistantDisabled);
    }

    if learner.in_active_exam {
        return WidgetAccess::Hidden(HiddenReason::ActiveExam);
    }

    let mode = learner.enrollment_mode.as_deref().filter(|mode| !mode.is_empty());
    if !learner.is_staff && mode.is_none() {
        return WidgetAccess::Hidden(HiddenReason::NotEnrolled);
    }

    let verified = mode.is_some_and(is_verified_mode);
    let audit_eligible = !learner.is_staff
        && !verified
        && mode.is_some_and(is_upsell_mode)
        && audit_feature_enabled
        && trial_upgrade_eligible(trial_length);

    if !learner.is_staff && !(verified || audit_eligible) {
        return WidgetAccess::Hidden(HiddenReason::ModeNotAllowed);
    }

    let audit_expired = audit_trial.is_some_and(|trial| is_expired(trial, now));
    let has_active_audit_trial = audit_eligible && !audit_expired;

    let started = course.start.map_or(true, |start| start <= now);
    let not_ended = course.end.map_or(true, |end| end >= now);
    let access_valid =
        !has_active_audit_trial || course.access_expiration.map_or(true, |expiry| expiry >= now);

    if !(started && not_ended && access_valid) {
        return WidgetAccess::Hidden(HiddenReason::OutsideCourseDates);
    }

    WidgetAccess::Visible {
        is_upgrade_eligible: audit_eligible,
        has_active_audit_trial,
    }
}
