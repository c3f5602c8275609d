use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::risk_budget::{risk_budget, RiskContribution};
use super::statistics::{
    capital_allocation_line, diversification_ratio, effective_num_assets, portfolio_stats,
    portfolio_stats_leveraged, sharpe_ratio, standalone_var5, CapitalAllocationLine,
    PortfolioStats,
};
use crate::types::{with_metadata, ComputationOutput, Percent};
use crate::universe::{AssetUniverse, LeverageProfile, WeightVector};
use crate::EngineResult;

/// Weight totals further than this from 100 earn a normalization warning.
const WEIGHT_SUM_TOLERANCE: f64 = 0.1;

/// Volatility the capital allocation line is extended to.
const CAL_MAX_VOLATILITY: Percent = 25.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioAnalysisInput {
    pub universe: AssetUniverse,
    /// Raw percent weights; normalized before use.
    pub weights: WeightVector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<LeverageProfile>,
    #[serde(default = "crate::config::default_risk_free_rate")]
    pub risk_free_rate: Percent,
    #[serde(default = "crate::config::default_concentration_warning_pct")]
    pub concentration_warning_pct: Percent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetVar {
    pub asset_id: String,
    pub var5: Percent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioAnalysisOutput {
    /// Normalized weights, percent.
    pub weights: Vec<Percent>,
    /// Sum of the raw weights before normalization.
    pub raw_total: Percent,
    /// Statistics with leverage applied when a profile was supplied.
    pub stats: PortfolioStats,
    /// Statistics of the same weights without leverage, present only when
    /// the profile actually levers something.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlevered_stats: Option<PortfolioStats>,
    pub sharpe_ratio: f64,
    pub diversification_ratio: f64,
    pub effective_num_assets: f64,
    pub risk_budget: Vec<RiskContribution>,
    pub standalone_var5: Vec<AssetVar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capital_allocation_line: Option<CapitalAllocationLine>,
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Full single-portfolio report: statistics, risk budget and per-asset VaR,
/// with warnings for unusual inputs.
pub fn analyze_portfolio(
    input: &PortfolioAnalysisInput,
) -> EngineResult<ComputationOutput<PortfolioAnalysisOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let universe = &input.universe;

    universe.check_len("weights", input.weights.len())?;
    let raw_total = input.weights.total();
    let weights = input.weights.normalized();

    if raw_total <= 0.0 {
        warnings.push("All weights are zero; statistics are zero".into());
    } else if (raw_total - 100.0).abs() >= WEIGHT_SUM_TOLERANCE {
        warnings.push(format!(
            "Weights sum to {raw_total:.2}%, normalized to 100%"
        ));
    }

    if !universe.correlation().is_positive_semidefinite() {
        warnings.push(
            "Correlation matrix is not positive semi-definite; volatility may be understated".into(),
        );
    }

    for (asset, w) in universe.assets().iter().zip(&weights) {
        let pct = w * 100.0;
        if pct > input.concentration_warning_pct {
            warnings.push(format!(
                "Concentrated position: {} at {pct:.1}%",
                asset.id
            ));
        }
    }

    let levered = input.leverage.as_ref().filter(|l| l.is_levered());
    let unlevered = portfolio_stats(&weights, universe)?;
    let (stats, unlevered_stats, cal) = match (&input.leverage, levered) {
        (Some(lev), Some(_)) => {
            let s = portfolio_stats_leveraged(&weights, universe, lev)?;
            if s.total_exposure > 1.0 {
                warnings.push(format!(
                    "Gross exposure {:.1}% financed at {:.2}%",
                    s.total_exposure * 100.0,
                    lev.borrow_cost
                ));
            }
            let cal = capital_allocation_line(&s, lev.borrow_cost, CAL_MAX_VOLATILITY);
            (s, Some(unlevered), Some(cal))
        }
        (Some(lev), None) => (portfolio_stats_leveraged(&weights, universe, lev)?, None, None),
        (None, _) => (unlevered, None, None),
    };

    let budget = risk_budget(&weights, universe, input.leverage.as_ref())?;

    let output = PortfolioAnalysisOutput {
        weights: weights.iter().map(|w| w * 100.0).collect(),
        raw_total,
        sharpe_ratio: sharpe_ratio(&stats, input.risk_free_rate),
        diversification_ratio: diversification_ratio(&weights, universe, unlevered.volatility),
        effective_num_assets: effective_num_assets(&weights),
        risk_budget: budget,
        standalone_var5: universe
            .assets()
            .iter()
            .map(|a| AssetVar {
                asset_id: a.id.clone(),
                var5: standalone_var5(a),
            })
            .collect(),
        capital_allocation_line: cal,
        stats,
        unlevered_stats,
    };

    tracing::debug!(
        expected_return = output.stats.expected_return,
        volatility = output.stats.volatility,
        warnings = warnings.len(),
        "portfolio analyzed"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Mean-variance portfolio statistics with Euler risk decomposition",
        &serde_json::json!({
            "assets": universe.len(),
            "universe_version": universe.version(),
            "risk_free_rate": input.risk_free_rate,
            "var_z_score": crate::types::Z_SCORE_95,
            "levered": levered.is_some(),
        }),
        warnings,
        elapsed,
        output,
    ))
}
