use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

pub const PROMPT_EXPERIMENT_KEY: &str = "_cosmo__xpert_gpt_4_0_prompt";
pub const PROMPT_EXPERIMENT_UPDATED_PROMPT: &str = "updated_prompt";

pub const AUDIT_TRIAL_LENGTH_EXPERIMENT_KEY: &str = "_cosmo__xpert_audit_trial_length";
pub const AUDIT_TRIAL_LENGTH_CONTROL: &str = "control";
pub const AUDIT_TRIAL_LENGTH_TREATMENTS: &[&str] =
    &["xpert_audit_14_day_trial", "xpert_audit_28_day_trial"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExperimentFlag {
    PromptVariant,
    TrialLength,
}

impl ExperimentFlag {
    pub fn key(self) -> &'static str {
        match self {
            Self::PromptVariant => PROMPT_EXPERIMENT_KEY,
            Self::TrialLength => AUDIT_TRIAL_LENGTH_EXPERIMENT_KEY,
        }
    }

    pub fn all() -> [Self; 2] {
        [Self::PromptVariant, Self::TrialLength]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentDecision {
    pub enabled: bool,
    pub variation_key: Option<String>,
}

impl ExperimentDecision {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn enabled(variation_key: impl Into<String>) -> Self {
        Self {
            enabled: true,
            variation_key: Some(variation_key.into()),
        }
    }

    /// Variation key to route with, only while the decision is enabled.
    pub fn active_variation(&self) -> Option<&str> {
        if self.enabled {
            self.variation_key.as_deref()
        } else {
            None
        }
    }
}

/// Experiment tag attached to outgoing telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentTag {
    pub experiment_name: String,
    pub variation_key: String,
}

impl ExperimentTag {
    pub fn prompt(variation_key: &str) -> Self {
        Self {
            experiment_name: PROMPT_EXPERIMENT_KEY.to_string(),
            variation_key: variation_key.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError(pub String);

/// External experiment-decision capability, e.g. a feature-flag SDK client.
pub trait DecisionProvider: Send + Sync {
    fn decide(
        &self,
        flag_key: &str,
        user_id: &str,
    ) -> Result<Option<ExperimentDecision>, ProviderError>;
}

/// Decisions fixed up-front, keyed by flag. Every user receives the same verdict.
#[derive(Debug, Clone, Default)]
pub struct StaticDecisionProvider {
    decisions: BTreeMap<String, ExperimentDecision>,
}

impl StaticDecisionProvider {
    pub fn new(decisions: BTreeMap<String, ExperimentDecision>) -> Self {
        Self { decisions }
    }

    pub fn with_decision(mut self, flag_key: &str, decision: ExperimentDecision) -> Self {
        self.decisions.insert(flag_key.to_string(), decision);
        self
    }
}

impl DecisionProvider for StaticDecisionProvider {
    fn decide(
        &self,
        flag_key: &str,
        _user_id: &str,
    ) -> Result<Option<ExperimentDecision>, ProviderError> {
        Ok(self.decisions.get(flag_key).cloned())
    }
}

pub struct ExperimentResolver {
    provider: Option<Box<dyn DecisionProvider>>,
}

impl ExperimentResolver {
    pub fn new(provider: Box<dyn DecisionProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn unconfigured() -> Self {
        Self { provider: None }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Never fails: a missing provider, a missing decision or a provider
    /// error all resolve to a disabled decision.
    pub fn resolve(&self, flag: ExperimentFlag, user_id: &str) -> ExperimentDecision {
        let Some(provider) = self.provider.as_ref() else {
            return ExperimentDecision::disabled();
        };
        match provider.decide(flag.key(), user_id) {
            Ok(Some(decision)) => decision,
            Ok(None) | Err(_) => ExperimentDecision::disabled(),
        }
    }

    pub fn prompt_decision(&self, user_id: &str) -> ExperimentDecision {
        self.resolve(ExperimentFlag::PromptVariant, user_id)
    }

    pub fn trial_length_decision(&self, user_id: &str) -> ExperimentDecision {
        self.resolve(ExperimentFlag::TrialLength, user_id)
    }
}

impl std::fmt::Debug for ExperimentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentResolver")
            .field("configured", &self.is_configured())
            .finish()
    }
}

/// A learner may only be offered a trial while bucketed into one of the
/// treatment arms of the trial-length experiment.
pub fn trial_upgrade_eligible(trial_length: &ExperimentDecision) -> bool {
    trial_length.active_variation().is_some_and(|key| {
        key != AUDIT_TRIAL_LENGTH_CONTROL && AUDIT_TRIAL_LENGTH_TREATMENTS.contains(&key)
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    struct FailingProvider;

    impl DecisionProvider for FailingProvider {
        fn decide(
            &self,
            _flag_key: &str,
            _user_id: &str,
        ) -> Result<Option<ExperimentDecision>, ProviderError> {
            Err(ProviderError("datafile not ready".to_string()))
        }
    }

    #[test]
    fn unconfigured_resolver_disables_every_flag() {
        let resolver = ExperimentResolver::unconfigured();
        for flag in ExperimentFlag::all() {
            assert_eq!(resolver.resolve(flag, "7"), ExperimentDecision::disabled());
        }
    }

    #[test]
    fn provider_errors_degrade_to_disabled() {
        let resolver = ExperimentResolver::new(Box::new(FailingProvider));
        assert_eq!(resolver.prompt_decision("7"), ExperimentDecision::disabled());
    }

    #[test]
    fn flags_resolve_independently() {
        let provider = StaticDecisionProvider::default().with_decision(
            PROMPT_EXPERIMENT_KEY,
            ExperimentDecision::enabled(PROMPT_EXPERIMENT_UPDATED_PROMPT),
        );
        let resolver = ExperimentResolver::new(Box::new(provider));

        assert_eq!(
            resolver.prompt_decision("7").active_variation(),
            Some(PROMPT_EXPERIMENT_UPDATED_PROMPT)
        );
        assert_eq!(resolver.trial_length_decision("7"), ExperimentDecision::disabled());
    }

    #[test]
    fn disabled_decision_has_no_active_variation() {
        let decision = ExperimentDecision {
            enabled: false,
            variation_key: Some("updated_prompt".to_string()),
        };
        assert_eq!(decision.active_variation(), None);
    }

    #[test]
    fn only_treatment_arms_are_trial_eligible() {
        assert!(!trial_upgrade_eligible(&ExperimentDecision::disabled()));
        assert!(!trial_upgrade_eligible(&ExperimentDecision::enabled(
            AUDIT_TRIAL_LENGTH_CONTROL
        )));
        assert!(!trial_upgrade_eligible(&ExperimentDecision::enabled("unknown_arm")));
        assert!(!trial_upgrade_eligible(&ExperimentDecision {
            enabled: false,
            variation_key: Some("xpert_audit_14_day_trial".to_string()),
        }));
        for treatment in AUDIT_TRIAL_LENGTH_TREATMENTS {
            assert!(trial_upgrade_eligible(&ExperimentDecision::enabled(*treatment)));
        }
    }
}
