use chrono::DateTime;
use chrono::Utc;

use crate::trial::days_remaining;
use crate::trial::AuditTrial;

/// What the course metadata says about purchasing the verified track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeOffer {
    pub offer_upgrade_url: Option<String>,
    pub verified_mode_upgrade_url: Option<String>,
    pub access_expiration: Option<DateTime<Utc>>,
    pub content_type_gating_enabled: bool,
}

impl UpgradeOffer {
    /// The offer's own URL wins over the verified mode's.
    pub fn upgrade_url(&self) -> Option<&str> {
        [&self.offer_upgrade_url, &self.verified_mode_upgrade_url]
            .into_iter()
            .flatten()
            .map(|url| url.trim())
            .find(|url| !url.is_empty())
    }

    /// Fee-based enrollment: access expires and graded content is gated.
    pub fn is_fbe(&self) -> bool {
        self.access_expiration.is_some() && self.content_type_gating_enabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseUpgrade {
    pub upgradeable: bool,
    pub upgrade_url: Option<String>,
    pub audit_trial: Option<AuditTrial>,
    pub audit_trial_length_days: Option<u32>,
    pub audit_trial_days_remaining: Option<i64>,
    pub audit_trial_expired: bool,
    pub is_fbe: bool,
}

impl CourseUpgrade {
    fn not_upgradeable() -> Self {
        Self {
            upgradeable: false,
            upgrade_url: None,
            audit_trial: None,
            audit_trial_length_days: None,
            audit_trial_days_remaining: None,
            audit_trial_expired: false,
            is_fbe: false,
        }
    }

    pub fn evaluate(
        is_upgrade_eligible: bool,
        offer: &UpgradeOffer,
        audit_trial: Option<&AuditTrial>,
        audit_trial_length_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Self {
        let Some(upgrade_url) = offer.upgrade_url().filter(|_| is_upgrade_eligible) else {
            return Self::not_upgradeable();
        };

        let audit_trial_days_remaining = audit_trial.and_then(|trial| days_remaining(trial, now));

        Self {
            upgradeable: true,
            upgrade_url: Some(upgrade_url.to_string()),
            audit_trial: audit_trial.copied(),
            audit_trial_length_days,
            audit_trial_days_remaining,
            audit_trial_expired: audit_trial_days_remaining.is_some_and(|days| days <= 0),
            is_fbe: offer.is_fbe(),
        }
    }

    pub fn days_remaining_banner(&self) -> DaysRemainingBanner {
        if !self.upgradeable {
            return DaysRemainingBanner::Hidden;
        }
        match self.audit_trial_days_remaining {
            None => DaysRemainingBanner::Loading,
            Some(days) if days < 1 => DaysRemainingBanner::Hidden,
            Some(1) => DaysRemainingBanner::EndsToday,
            Some(days) => DaysRemainingBanner::DaysRemaining(days),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaysRemainingBanner {
    Hidden,
    Loading,
    EndsToday,
    DaysRemaining(i64),
}

impl DaysRemainingBanner {
    pub fn text(self) -> Option<String> {
        match self {
            Self::Hidden | Self::Loading => None,
            Self::EndsToday => Some("Your trial ends today!".to_string()),
            Self::DaysRemaining(days) => Some(format!("{days} days remaining.")),
        }
    }
}
