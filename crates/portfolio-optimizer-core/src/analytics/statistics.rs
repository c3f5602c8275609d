use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::EngineError;
use crate::types::{Fraction, Percent, RISK_EPSILON, Z_SCORE_95};
use crate::universe::{Asset, AssetUniverse, LeverageProfile};
use crate::EngineResult;

/// Exposure shortfall below this is normalization round-off, not cash.
const EXPOSURE_SNAP: f64 = 1e-12;

/// Single-period statistics of one weight vector. All figures in percent
/// except `total_exposure`, which is a fraction of capital (1.0 = 100%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub expected_return: Percent,
    pub volatility: Percent,
    /// Parametric 95% one-tailed VaR: return - 1.645 * volatility.
    pub var5: Percent,
    pub total_exposure: Fraction,
}

impl PortfolioStats {
    pub fn zero() -> Self {
        Self {
            expected_return: 0.0,
            volatility: 0.0,
            var5: 0.0,
            total_exposure: 0.0,
        }
    }

    fn from_parts(expected_return: Percent, volatility: Percent, total_exposure: Fraction) -> Self {
        Self {
            expected_return,
            volatility,
            var5: expected_return - Z_SCORE_95 * volatility,
            total_exposure,
        }
    }
}

/// Straight line from the financing rate through the portfolio in
/// (volatility, return) space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapitalAllocationLine {
    pub rate: Percent,
    pub slope: f64,
    pub end_volatility: Percent,
    pub end_return: Percent,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Expected return, volatility and 95% VaR of normalized weights.
///
/// Weights that sum to zero give all-zero statistics.
pub fn portfolio_stats(weights: &[Fraction], universe: &AssetUniverse) -> EngineResult<PortfolioStats> {
    validate_weights(weights, universe)?;
    let (ret, vol) = return_and_volatility(weights, universe);
    Ok(PortfolioStats::from_parts(ret, vol, weights.iter().sum()))
}

/// Statistics after scaling each weight by its leverage ratio and charging
/// `borrow_cost` on exposure above 100% (or crediting it below 100%).
///
/// With every ratio at 1 this returns exactly what [`portfolio_stats`]
/// returns, whatever the borrow cost.
pub fn portfolio_stats_leveraged(
    weights: &[Fraction],
    universe: &AssetUniverse,
    leverage: &LeverageProfile,
) -> EngineResult<PortfolioStats> {
    validate_weights(weights, universe)?;
    leverage.validate(universe.len())?;

    let unlevered_sum: f64 = weights.iter().sum();
    if unlevered_sum == 0.0 {
        return Ok(PortfolioStats::zero());
    }

    let adjusted = leverage.adjust(weights);
    let total_exposure: f64 = adjusted.iter().sum();

    // total_exposure - 1, split so that unit ratios contribute an exact zero
    let added: f64 = weights
        .iter()
        .enumerate()
        .map(|(i, w)| w * (leverage.ratio(i) - 1.0))
        .sum();
    let shortfall = unlevered_sum - 1.0;
    let shortfall = if shortfall.abs() <= EXPOSURE_SNAP {
        0.0
    } else {
        shortfall
    };
    let excess = added + shortfall;

    let (gross_ret, vol) = return_and_volatility(&adjusted, universe);
    let ret = gross_ret - excess * leverage.borrow_cost;
    Ok(PortfolioStats::from_parts(ret, vol, total_exposure))
}

/// (return - rf) / volatility, guarded for zero-risk portfolios.
pub fn sharpe_ratio(stats: &PortfolioStats, risk_free_rate: Percent) -> f64 {
    (stats.expected_return - risk_free_rate) / (stats.volatility + RISK_EPSILON)
}

/// 95% VaR of holding the asset on its own.
pub fn standalone_var5(asset: &Asset) -> Percent {
    asset.expected_return - Z_SCORE_95 * asset.annualized_vol
}

/// Parametric one-tailed VaR at an arbitrary confidence level.
///
/// Uses the exact normal quantile, so at 0.95 it differs from `var5` in the
/// fourth decimal of the z-score.
pub fn parametric_var(stats: &PortfolioStats, confidence: f64) -> EngineResult<Percent> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(EngineError::invalid(
            "confidence",
            "must lie strictly between 0 and 1",
        ));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| EngineError::InvalidInput {
        field: "confidence".into(),
        reason: format!("Invalid Normal parameters: {e}"),
    })?;
    let z = normal.inverse_cdf(1.0 - confidence);
    Ok(stats.expected_return + z * stats.volatility)
}

/// Weighted-average asset volatility over portfolio volatility (>= 1 for a
/// PSD correlation matrix).
pub fn diversification_ratio(weights: &[Fraction], universe: &AssetUniverse, volatility: Percent) -> f64 {
    let weighted_avg_vol: f64 = weights
        .iter()
        .zip(universe.assets())
        .map(|(w, a)| w * a.annualized_vol)
        .sum();
    if volatility <= 0.0 {
        1.0
    } else {
        weighted_avg_vol / volatility
    }
}

/// Herfindahl-based effective number of assets: 1 / sum(w_i^2).
pub fn effective_num_assets(weights: &[Fraction]) -> f64 {
    let hhi: f64 = weights.iter().map(|w| w * w).sum();
    if hhi == 0.0 {
        0.0
    } else {
        1.0 / hhi
    }
}

/// Line from `rate` through the portfolio, extended to `max_volatility`.
pub fn capital_allocation_line(
    stats: &PortfolioStats,
    rate: Percent,
    max_volatility: Percent,
) -> CapitalAllocationLine {
    let slope = (stats.expected_return - rate) / (stats.volatility + RISK_EPSILON);
    CapitalAllocationLine {
        rate,
        slope,
        end_volatility: max_volatility,
        end_return: rate + slope * max_volatility,
    }
}

// ---------------------------------------------------------------------------
// Kernels
// ---------------------------------------------------------------------------

/// (expected return, volatility) in percent with no input checks. Callers
/// validate the weight length once and may then call this in a hot loop.
pub(crate) fn return_and_volatility(weights: &[Fraction], universe: &AssetUniverse) -> (Percent, Percent) {
    let assets = universe.assets();
    let corr = universe.correlation();
    let n = weights.len();

    let mut ret = 0.0;
    for i in 0..n {
        ret += weights[i] * assets[i].expected_return;
    }

    let mut variance = 0.0;
    for i in 0..n {
        for j in 0..n {
            variance += weights[i]
                * weights[j]
                * assets[i].annualized_vol
                * assets[j].annualized_vol
                * corr.get(i, j)
                / 10_000.0;
        }
    }
    // non-PSD user correlations can push this below zero
    let vol = variance.max(0.0).sqrt() * 100.0;
    (ret, vol)
}

pub(crate) fn validate_weights(weights: &[Fraction], universe: &AssetUniverse) -> EngineResult<()> {
    universe.check_len("weights", weights.len())?;
    for (i, w) in weights.iter().enumerate() {
        if !w.is_finite() || *w < 0.0 {
            return Err(EngineError::invalid(
                format!("weights[{i}]"),
                "must be finite and non-negative",
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
