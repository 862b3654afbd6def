use serde::{Deserialize, Serialize};

use crate::device::LaunchPlan;
use crate::error::AutomationError;

/// Strictness presets exposed by the UI. Each maps to a similarity
/// threshold tuned for the perceptual-hash scorer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SimilarityMode {
    Similar,
    VerySimilar,
    Clone,
}

impl SimilarityMode {
    pub fn threshold(&self) -> f64 {
        match self {
            SimilarityMode::Similar => 0.55,
            SimilarityMode::VerySimilar => 0.70,
            SimilarityMode::Clone => 0.85,
        }
    }
}

/// Immutable snapshot of the knobs for one automation run. Captured at
/// `start` and never mutated while the loop is alive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationConfig {
    /// Minimum similarity for a Like, in [0, 1].
    pub similarity_threshold: f64,

    /// Wait between iterations, in milliseconds.
    pub delay_between_swipes_ms: u64,

    /// Hard budget of swipes for the run. Errored iterations do not count.
    pub max_swipes: u32,

    /// After a Like, look for the match popup and dismiss it.
    #[serde(default)]
    pub detect_matches: bool,

    /// Optional scripted navigation executed once before the first iteration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch: Option<LaunchPlan>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: SimilarityMode::Similar.threshold(),
            delay_between_swipes_ms: 500,
            max_swipes: 100,
            detect_matches: false,
            launch: None,
        }
    }
}

impl AutomationConfig {
    pub fn for_mode(mode: SimilarityMode) -> Self {
        Self {
            similarity_threshold: mode.threshold(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), AutomationError> {
        if !self.similarity_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.similarity_threshold)
        {
            return Err(AutomationError::configuration(format!(
                "similarityThreshold must be in [0, 1], got {}",
                self.similarity_threshold
            )));
        }

        if self.max_swipes < 1 {
            return Err(AutomationError::configuration(
                "maxSwipes must be at least 1",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AutomationConfig::default().validate().is_ok());
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        let mut config = AutomationConfig::default();
        config.similarity_threshold = 1.2;
        assert!(config.validate().is_err());

        config.similarity_threshold = -0.1;
        assert!(config.validate().is_err());

        config.similarity_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_swipes_is_rejected() {
        let mut config = AutomationConfig::default();
        config.max_swipes = 0;
        assert!(matches!(
            config.validate(),
            Err(AutomationError::Configuration(_))
        ));
    }

    #[test]
    fn modes_tighten_monotonically() {
        assert!(SimilarityMode::Similar.threshold() < SimilarityMode::VerySimilar.threshold());
        assert!(SimilarityMode::VerySimilar.threshold() < SimilarityMode::Clone.threshold());
    }
}
