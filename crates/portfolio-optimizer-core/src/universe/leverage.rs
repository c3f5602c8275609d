use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::types::{Fraction, Percent};
use crate::EngineResult;

/// Per-asset leverage ratios plus the financing rate on borrowed exposure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeverageProfile {
    /// Asset index -> ratio (>= 1). Missing assets are unlevered.
    #[serde(default)]
    pub ratios: BTreeMap<usize, f64>,
    /// Financing cost on exposure above 100%, percent per year.
    #[serde(default)]
    pub borrow_cost: Percent,
}

impl LeverageProfile {
    pub fn unlevered(borrow_cost: Percent) -> Self {
        Self {
            ratios: BTreeMap::new(),
            borrow_cost,
        }
    }

    /// A single levered sleeve.
    pub fn single(idx: usize, ratio: f64, borrow_cost: Percent) -> Self {
        let mut ratios = BTreeMap::new();
        ratios.insert(idx, ratio);
        Self {
            ratios,
            borrow_cost,
        }
    }

    pub fn ratio(&self, idx: usize) -> f64 {
        self.ratios.get(&idx).copied().unwrap_or(1.0)
    }

    pub fn is_levered(&self) -> bool {
        self.ratios.values().any(|r| *r != 1.0)
    }

    pub fn validate(&self, n: usize) -> EngineResult<()> {
        for (&idx, &ratio) in &self.ratios {
            if idx >= n {
                return Err(EngineError::invalid(
                    format!("leverage.ratios[{idx}]"),
                    format!("Asset index {idx} out of range (n={n})"),
                ));
            }
            if !ratio.is_finite() || ratio < 1.0 {
                return Err(EngineError::invalid(
                    format!("leverage.ratios[{idx}]"),
                    "ratio must be finite and >= 1",
                ));
            }
        }
        if !self.borrow_cost.is_finite() {
            return Err(EngineError::invalid(
                "leverage.borrow_cost",
                "must be finite",
            ));
        }
        Ok(())
    }

    /// w_i * ratio_i for every asset.
    pub fn adjust(&self, weights: &[Fraction]) -> Vec<Fraction> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| w * self.ratio(i))
            .collect()
    }

    pub(crate) fn remove_asset(&mut self, idx: usize) {
        self.ratios = std::mem::take(&mut self.ratios)
            .into_iter()
            .filter(|(i, _)| *i != idx)
            .map(|(i, r)| if i > idx { (i - 1, r) } else { (i, r) })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_ratio_is_one() {
        let lev = LeverageProfile::single(2, 1.5, 5.0);
        assert_eq!(lev.ratio(0), 1.0);
        assert_eq!(lev.ratio(2), 1.5);
        assert_eq!(lev.adjust(&[0.2, 0.3, 0.5]), vec![0.2, 0.3, 0.75]);
    }

    #[test]
    fn test_ratio_below_one_rejected() {
        let lev = LeverageProfile::single(0, 0.5, 5.0);
        assert!(lev.validate(3).is_err());
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let lev = LeverageProfile::single(5, 2.0, 5.0);
        assert!(lev.validate(3).is_err());
    }

    #[test]
    fn test_remove_asset_reindexes() {
        let mut lev = LeverageProfile::single(2, 2.0, 5.0);
        lev.ratios.insert(0, 1.5);
        lev.remove_asset(0);
        assert_eq!(lev.ratio(1), 2.0);
        assert_eq!(lev.ratio(0), 1.0);
    }
}
