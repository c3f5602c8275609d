//! Engine-wide tunables.
//!
//! Every field has a serde default so a partial YAML/JSON file only needs to
//! name the values it overrides.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::EngineResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Correlation given to every pair involving a newly added asset.
    #[serde(default = "default_correlation")]
    pub default_correlation: f64,
    /// Risk-free rate (percent) used for Sharpe ratios.
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Rounds run by the equal-risk-contribution solver.
    #[serde(default = "default_erc_max_iterations")]
    pub erc_max_iterations: u32,
    /// Optional early-exit tolerance for the ERC solver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub erc_tolerance: Option<f64>,
    /// Asset ids left out of ERC allocations (cash sleeves).
    #[serde(default = "default_erc_exclude_ids")]
    pub erc_exclude_ids: Vec<String>,
    /// Random candidates drawn by the frontier search.
    #[serde(default = "default_frontier_samples")]
    pub frontier_samples: u32,
    /// Width of the volatility bins used for the display curve.
    #[serde(default = "default_frontier_bin_width")]
    pub frontier_bin_width: f64,
    /// Seed for reproducible frontier searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontier_seed: Option<u64>,
    /// Number of blend ratios (inclusive of 0 and 1) in the pairwise seeds.
    #[serde(default = "default_blend_steps")]
    pub blend_steps: u32,
    /// Position size (percent) above which a concentration warning is raised.
    #[serde(default = "default_concentration_warning_pct")]
    pub concentration_warning_pct: f64,
}

pub(crate) fn default_correlation() -> f64 {
    0.10
}

pub(crate) fn default_risk_free_rate() -> f64 {
    4.0
}

pub(crate) fn default_erc_max_iterations() -> u32 {
    300
}

pub(crate) fn default_erc_exclude_ids() -> Vec<String> {
    vec!["cash".to_string()]
}

pub(crate) fn default_frontier_samples() -> u32 {
    10_000
}

pub(crate) fn default_frontier_bin_width() -> f64 {
    0.5
}

pub(crate) fn default_blend_steps() -> u32 {
    11
}

pub(crate) fn default_concentration_warning_pct() -> f64 {
    50.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_correlation: default_correlation(),
            risk_free_rate: default_risk_free_rate(),
            erc_max_iterations: default_erc_max_iterations(),
            erc_tolerance: None,
            erc_exclude_ids: default_erc_exclude_ids(),
            frontier_samples: default_frontier_samples(),
            frontier_bin_width: default_frontier_bin_width(),
            frontier_seed: None,
            blend_steps: default_blend_steps(),
            concentration_warning_pct: default_concentration_warning_pct(),
        }
    }
}

impl EngineConfig {
    /// Check the tunables are usable before any computation relies on them.
    pub fn validate(&self) -> EngineResult<()> {
        if !(-1.0..=1.0).contains(&self.default_correlation) {
            return Err(EngineError::invalid(
                "default_correlation",
                "must lie in [-1, 1]",
            ));
        }
        if self.erc_max_iterations == 0 {
            return Err(EngineError::invalid(
                "erc_max_iterations",
                "must be at least 1",
            ));
        }
        if let Some(tol) = self.erc_tolerance {
            if !(tol > 0.0) {
                return Err(EngineError::invalid("erc_tolerance", "must be positive"));
            }
        }
        if !(self.frontier_bin_width > 0.0) {
            return Err(EngineError::invalid(
                "frontier_bin_width",
                "must be positive",
            ));
        }
        if self.blend_steps < 2 {
            return Err(EngineError::invalid("blend_steps", "must be at least 2"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{ "frontier_samples": 500, "frontier_seed": 7 }"#).unwrap();
        assert_eq!(cfg.frontier_samples, 500);
        assert_eq!(cfg.frontier_seed, Some(7));
        assert_eq!(cfg.erc_max_iterations, 300);
        assert_eq!(cfg.erc_exclude_ids, vec!["cash".to_string()]);
        assert_eq!(cfg.default_correlation, 0.10);
    }

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_bin_width() {
        let cfg = EngineConfig {
            frontier_bin_width: 0.0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_correlation() {
        let cfg = EngineConfig {
            default_correlation: 1.5,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
