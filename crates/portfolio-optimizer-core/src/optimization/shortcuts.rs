//! One-click allocations that respect fixed weights and per-asset bounds.
//!
//! Both shortcuts clamp each free weight into its own bounds after splitting
//! the budget, so the result can miss 100%. The gap is reported as
//! `sum_deviation`; it is never redistributed.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::risk_parity::RiskParitySolver;
use crate::analytics::{portfolio_stats, PortfolioStats};
use crate::types::{with_metadata, ComputationOutput, Percent, BOUND_TOLERANCE};
use crate::universe::{AssetUniverse, ConstraintSet, ConstraintViolation, WeightVector};
use crate::EngineResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortcutWeights {
    /// Raw percent weights, one per asset.
    pub weights: Vec<Percent>,
    pub total: Percent,
    /// total - 100.
    pub sum_deviation: Percent,
}

impl ShortcutWeights {
    fn from_weights(weights: Vec<Percent>) -> Self {
        let total: Percent = weights.iter().sum();
        Self {
            weights,
            total,
            sum_deviation: total - 100.0,
        }
    }
}

/// Fixed assets take their value; the rest of the budget is split equally
/// across the free assets.
pub fn equal_weight_with_constraints(
    universe: &AssetUniverse,
    constraints: &ConstraintSet,
) -> EngineResult<ShortcutWeights> {
    let n = universe.len();
    constraints.validate(n)?;
    let (mut weights, free, remaining) = fixed_allocation(n, constraints);

    if !free.is_empty() {
        let share = remaining / free.len() as f64;
        for &i in &free {
            weights[i] = share;
        }
    }
    clamp_free(&mut weights, &free, constraints);
    Ok(ShortcutWeights::from_weights(weights))
}

/// Fixed assets take their value; the rest of the budget is split in ERC
/// proportions computed with the fixed assets excluded.
pub fn erc_with_constraints(
    universe: &AssetUniverse,
    constraints: &ConstraintSet,
    solver: &RiskParitySolver,
) -> EngineResult<ShortcutWeights> {
    let n = universe.len();
    constraints.validate(n)?;
    let (mut weights, free, remaining) = fixed_allocation(n, constraints);

    let fixed = constraints.fixed_indices();
    let solution = solver.solve(universe, &fixed)?;
    for &i in &free {
        weights[i] = solution.weights[i] * remaining;
    }
    clamp_free(&mut weights, &free, constraints);
    Ok(ShortcutWeights::from_weights(weights))
}

/// Weights holding only the fixed values, the free indices, and the budget
/// left for them (floored at zero).
fn fixed_allocation(n: usize, constraints: &ConstraintSet) -> (Vec<Percent>, Vec<usize>, Percent) {
    let mut weights = vec![0.0; n];
    let mut free = Vec::with_capacity(n);
    let mut fixed_sum = 0.0;
    for (i, slot) in weights.iter_mut().enumerate() {
        if constraints.is_fixed(i) {
            let (value, _) = constraints.bounds(i);
            *slot = value;
            fixed_sum += value;
        } else {
            free.push(i);
        }
    }
    (weights, free, (100.0 - fixed_sum).max(0.0))
}

fn clamp_free(weights: &mut [Percent], free: &[usize], constraints: &ConstraintSet) {
    for &i in free {
        let (lo, hi) = constraints.bounds(i);
        weights[i] = weights[i].clamp(lo, hi);
    }
}

// ---------------------------------------------------------------------------
// Wrapper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutMethod {
    EqualWeight,
    Erc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortcutInput {
    pub universe: AssetUniverse,
    #[serde(default)]
    pub constraints: ConstraintSet,
    pub method: ShortcutMethod,
    #[serde(default)]
    pub solver: RiskParitySolver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortcutOutput {
    pub method: ShortcutMethod,
    #[serde(flatten)]
    pub allocation: ShortcutWeights,
    /// Statistics of the weights after normalization to 100%.
    pub stats: PortfolioStats,
    pub violations: Vec<ConstraintViolation>,
}

/// Run a shortcut and report the resulting allocation, its statistics and
/// any constraint it still breaks.
pub fn apply_shortcut(input: &ShortcutInput) -> EngineResult<ComputationOutput<ShortcutOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let universe = &input.universe;

    let allocation = match input.method {
        ShortcutMethod::EqualWeight => equal_weight_with_constraints(universe, &input.constraints)?,
        ShortcutMethod::Erc => erc_with_constraints(universe, &input.constraints, &input.solver)?,
    };

    let fixed_sum: Percent = input
        .constraints
        .fixed_indices()
        .iter()
        .map(|&i| input.constraints.bounds(i).0)
        .sum();
    if fixed_sum > 100.0 + BOUND_TOLERANCE {
        warnings.push(format!(
            "Fixed weights sum to {fixed_sum:.2}%; no budget left for free assets"
        ));
    }
    if allocation.sum_deviation.abs() > BOUND_TOLERANCE {
        warnings.push(format!(
            "Weights sum to {:.2}% after clamping to bounds ({:+.2} points)",
            allocation.total, allocation.sum_deviation
        ));
    }

    let violations = input.constraints.violations(&allocation.weights, universe);
    if !violations.is_empty() {
        warnings.push(format!(
            "{} constraint(s) remain violated",
            violations.len()
        ));
    }

    let normalized = WeightVector::new(allocation.weights.clone()).normalized();
    let stats = portfolio_stats(&normalized, universe)?;

    tracing::debug!(
        method = ?input.method,
        total = allocation.total,
        violations = violations.len(),
        "shortcut applied"
    );

    let output = ShortcutOutput {
        method: input.method,
        allocation,
        stats,
        violations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        match input.method {
            ShortcutMethod::EqualWeight => "Equal weight across free assets, clamped to bounds",
            ShortcutMethod::Erc => "Equal risk contribution across free assets, clamped to bounds",
        },
        &serde_json::json!({
            "method": input.method,
            "fixed_assets": input.constraints.fixed_indices(),
            "max_iterations": input.solver.max_iterations,
        }),
        warnings,
        elapsed,
        output,
    ))
}
