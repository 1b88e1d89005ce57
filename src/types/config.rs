//! Method configuration: one immutable value threaded through every stage.
//!
//! The configuration is constructed once, before the pipeline runs, and is
//! passed by reference to each stage. No stage mutates it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strijbos convention for forming the analysis universe.
///
/// Determines how omitted/silent codings and true negatives are treated
/// when selecting which units enter the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrijbosMethod {
    /// (a) Intersection: only units coded by all coders. True negatives
    /// and pure omissions are excluded.
    MethodA,
    /// (b) Union: every coded unit counts; true negatives are excluded.
    MethodB,
    /// (c) Full master list: true negatives count as agreements.
    MethodC,
}

impl StrijbosMethod {
    /// Parse from the configuration spelling (`METHOD_A` / `METHOD_B` / `METHOD_C`).
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "METHOD_A" => Some(Self::MethodA),
            "METHOD_B" => Some(Self::MethodB),
            "METHOD_C" => Some(Self::MethodC),
            _ => None,
        }
    }

    /// One-line description used in report headers.
    pub fn description(&self) -> &'static str {
        match self {
            Self::MethodA => {
                "(Intersection) True Negatives = ignored, and coded MATCHING segments = \
                 agreement or disagreement. Cases where one coder missed a segment \
                 (Omissions) are ignored."
            }
            Self::MethodB => {
                "(Union) True Negatives = ignored, and EVERY coded segment is counted \
                 as either agreement or disagreement."
            }
            Self::MethodC => {
                "(Full) True Negatives = agreements, and EVERY coded segment is counted \
                 as either agreement or disagreement."
            }
        }
    }
}

impl fmt::Display for StrijbosMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MethodA => write!(f, "METHOD_A"),
            Self::MethodB => write!(f, "METHOD_B"),
            Self::MethodC => write!(f, "METHOD_C"),
        }
    }
}

/// How agreement between code strings is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgreementMode {
    /// Mode 1: coders must select the exact same code string.
    Exact,
    /// Mode 2: codes sharing a `Category:` prefix are partially equivalent.
    /// Statistics collapse codes to categories before computing metrics.
    Weighted,
}

impl AgreementMode {
    /// Parse from the numeric configuration value. Unknown values fall
    /// back to `Exact`, matching the original behavior.
    pub fn from_config_value(v: u8) -> Self {
        if v == 2 {
            Self::Weighted
        } else {
            Self::Exact
        }
    }
}

/// Immutable method configuration for an agreement run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodConfig {
    /// Jaccard token-overlap threshold τ in `[0, 1]`. 1.0 means exact
    /// word-set match only; 0.3 catches "segment vs sub-segment" pairs.
    pub overlap_threshold: f64,
    /// Unify text boundaries across different codes (merge pass 1).
    pub align_across_codes: bool,
    /// Score only segments identified by all coders: omissions are imputed
    /// as agreements instead of counted as conflicts.
    pub mutual_segments_only: bool,
    /// Strijbos universe convention.
    pub method: StrijbosMethod,
    /// Exact vs weighted (category/hierarchy) agreement.
    pub mode: AgreementMode,
    /// Fraction of transcript word counts assumed non-codable (headers,
    /// footers, metadata), deducted before estimating true negatives.
    pub non_codable_margin: f64,
}

impl Default for MethodConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: 1.0,
            align_across_codes: false,
            mutual_segments_only: false,
            method: StrijbosMethod::MethodC,
            mode: AgreementMode::Exact,
            non_codable_margin: 0.0,
        }
    }
}

impl MethodConfig {
    /// Validate ranges. Thresholds and margins outside `[0, 1]` are
    /// configuration mistakes, not recoverable states.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.overlap_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.overlap_threshold));
        }
        if !(0.0..=1.0).contains(&self.non_codable_margin) {
            return Err(ConfigError::MarginOutOfRange(self.non_codable_margin));
        }
        Ok(())
    }

    /// True when the threshold demands identical token sets.
    pub fn is_exact_match(&self) -> bool {
        self.overlap_threshold >= 1.0
    }
}

/// Error type for configuration validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Overlap threshold outside `[0, 1]`.
    #[error("Overlap threshold {0} outside [0, 1]")]
    ThresholdOutOfRange(f64),
    /// Non-codable margin outside `[0, 1]`.
    #[error("Non-codable margin {0} outside [0, 1]")]
    MarginOutOfRange(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_config_spelling() {
        assert_eq!(
            StrijbosMethod::from_config_str("METHOD_A"),
            Some(StrijbosMethod::MethodA)
        );
        assert_eq!(
            StrijbosMethod::from_config_str("method_c"),
            Some(StrijbosMethod::MethodC)
        );
        assert_eq!(StrijbosMethod::from_config_str("METHOD_D"), None);
    }

    #[test]
    fn mode_defaults_to_exact_on_unknown_value() {
        assert_eq!(AgreementMode::from_config_value(1), AgreementMode::Exact);
        assert_eq!(AgreementMode::from_config_value(2), AgreementMode::Weighted);
        assert_eq!(AgreementMode::from_config_value(7), AgreementMode::Exact);
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let cfg = MethodConfig {
            overlap_threshold: 1.5,
            ..MethodConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(MethodConfig::default().validate().is_ok());
    }
}
