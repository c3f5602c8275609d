use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::asset::AssetUniverse;
use crate::error::EngineError;
use crate::types::{Percent, BOUND_TOLERANCE};
use crate::EngineResult;

/// Per-asset weight constraint, in percent of the portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    Fixed { value: Percent },
    Min { min: Percent },
    Max { max: Percent },
    Range { min: Percent, max: Percent },
}

impl Constraint {
    /// Resolved (min, max) bounds.
    pub fn bounds(&self) -> (Percent, Percent) {
        match *self {
            Constraint::Fixed { value } => (value, value),
            Constraint::Min { min } => (min, 100.0),
            Constraint::Max { max } => (0.0, max),
            Constraint::Range { min, max } => (min, max),
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Constraint::Fixed { .. })
    }
}

/// Cap on the aggregate weight of assets flagged `liquid = false`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityConstraint {
    pub max_illiquid_pct: Percent,
}

/// A bound that a weight vector breaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintViolation {
    BelowMin {
        asset_index: usize,
        weight: Percent,
        min: Percent,
    },
    AboveMax {
        asset_index: usize,
        weight: Percent,
        max: Percent,
    },
    IlliquidCap {
        illiquid_weight: Percent,
        max_illiquid_pct: Percent,
    },
}

/// All constraints in force for one universe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    /// Keyed by asset index.
    #[serde(default)]
    pub per_asset: BTreeMap<usize, Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<LiquidityConstraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, idx: usize, constraint: Constraint) -> Self {
        self.per_asset.insert(idx, constraint);
        self
    }

    pub fn with_liquidity_cap(mut self, max_illiquid_pct: Percent) -> Self {
        self.liquidity = Some(LiquidityConstraint { max_illiquid_pct });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.per_asset.is_empty() && self.liquidity.is_none()
    }

    pub fn get(&self, idx: usize) -> Option<&Constraint> {
        self.per_asset.get(&idx)
    }

    pub fn bounds(&self, idx: usize) -> (Percent, Percent) {
        self.per_asset
            .get(&idx)
            .map(Constraint::bounds)
            .unwrap_or((0.0, 100.0))
    }

    pub fn is_fixed(&self, idx: usize) -> bool {
        self.per_asset.get(&idx).is_some_and(Constraint::is_fixed)
    }

    /// Indices carrying a `Fixed` constraint, ascending.
    pub fn fixed_indices(&self) -> Vec<usize> {
        self.per_asset
            .iter()
            .filter(|(_, c)| c.is_fixed())
            .map(|(&i, _)| i)
            .collect()
    }

    /// Lower bound of every asset (the floor allocation), in percent.
    pub fn floors(&self, n: usize) -> Vec<Percent> {
        (0..n).map(|i| self.bounds(i).0).collect()
    }

    /// Upper bound of every asset, in percent.
    pub fn caps(&self, n: usize) -> Vec<Percent> {
        (0..n).map(|i| self.bounds(i).1).collect()
    }

    /// True when any asset must hold a strictly positive weight.
    pub fn has_floors(&self) -> bool {
        self.per_asset.values().any(|c| c.bounds().0 > 0.0)
    }

    /// Check every constraint is well formed for an `n`-asset universe.
    pub fn validate(&self, n: usize) -> EngineResult<()> {
        for (&idx, c) in &self.per_asset {
            if idx >= n {
                return Err(EngineError::invalid(
                    format!("constraints.per_asset[{idx}]"),
                    format!("Asset index {idx} out of range (n={n})"),
                ));
            }
            let (lo, hi) = c.bounds();
            if !lo.is_finite() || !hi.is_finite() || lo < 0.0 || hi > 100.0 || lo > hi {
                return Err(EngineError::invalid(
                    format!("constraints.per_asset[{idx}]"),
                    format!("bounds must satisfy 0 <= min <= max <= 100, got [{lo}, {hi}]"),
                ));
            }
        }
        if let Some(liq) = self.liquidity {
            if !liq.max_illiquid_pct.is_finite() || !(0.0..=100.0).contains(&liq.max_illiquid_pct)
            {
                return Err(EngineError::invalid(
                    "constraints.liquidity.max_illiquid_pct",
                    "must lie in [0, 100]",
                ));
            }
        }
        Ok(())
    }

    /// Aggregate percent weight held in illiquid assets.
    pub fn illiquid_weight(weights_pct: &[Percent], universe: &AssetUniverse) -> Percent {
        universe
            .assets()
            .iter()
            .zip(weights_pct)
            .filter(|(a, _)| !a.liquid)
            .map(|(_, w)| *w)
            .sum()
    }

    /// Every bound the percent weight vector breaks.
    pub fn violations(
        &self,
        weights_pct: &[Percent],
        universe: &AssetUniverse,
    ) -> Vec<ConstraintViolation> {
        let mut out = Vec::new();
        for (i, &w) in weights_pct.iter().enumerate() {
            let (lo, hi) = self.bounds(i);
            if w < lo - BOUND_TOLERANCE {
                out.push(ConstraintViolation::BelowMin {
                    asset_index: i,
                    weight: w,
                    min: lo,
                });
            }
            if w > hi + BOUND_TOLERANCE {
                out.push(ConstraintViolation::AboveMax {
                    asset_index: i,
                    weight: w,
                    max: hi,
                });
            }
        }
        if let Some(liq) = self.liquidity {
            let illiquid = Self::illiquid_weight(weights_pct, universe);
            if illiquid > liq.max_illiquid_pct + BOUND_TOLERANCE {
                out.push(ConstraintViolation::IlliquidCap {
                    illiquid_weight: illiquid,
                    max_illiquid_pct: liq.max_illiquid_pct,
                });
            }
        }
        out
    }

    /// Feasible iff every weight lies in its bounds and the illiquid cap
    /// (when set) holds.
    pub fn is_feasible(&self, weights_pct: &[Percent], universe: &AssetUniverse) -> bool {
        for (i, &w) in weights_pct.iter().enumerate() {
            let (lo, hi) = self.bounds(i);
            if w < lo - BOUND_TOLERANCE || w > hi + BOUND_TOLERANCE {
                return false;
            }
        }
        match self.liquidity {
            Some(liq) => {
                Self::illiquid_weight(weights_pct, universe)
                    <= liq.max_illiquid_pct + BOUND_TOLERANCE
            }
            None => true,
        }
    }

    /// Shift indices after asset `idx` was removed; its own constraint goes.
    pub(crate) fn remove_asset(&mut self, idx: usize) {
        self.per_asset = std::mem::take(&mut self.per_asset)
            .into_iter()
            .filter(|(i, _)| *i != idx)
            .map(|(i, c)| if i > idx { (i - 1, c) } else { (i, c) })
            .collect();
    }
}
