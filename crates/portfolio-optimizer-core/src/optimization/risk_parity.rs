use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::analytics::{portfolio_stats, risk_budget, PortfolioStats, RiskContribution};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::types::{with_metadata, ComputationOutput, Fraction, Percent, RISK_EPSILON};
use crate::universe::{AssetUniverse, WeightVector};
use crate::EngineResult;

/// Assets with volatility at or below this carry no risk to equalize.
const MIN_ERC_VOL: Percent = 1e-9;

/// Dispersion under which a run without an explicit tolerance still
/// reports `converged`.
const REPORT_TOLERANCE: f64 = 1e-8;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Multiplicative fixed-point solver for equal risk contribution weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParitySolver {
    #[serde(default = "crate::config::default_erc_max_iterations")]
    pub max_iterations: u32,
    /// Stop early once the largest contribution gap, relative to portfolio
    /// volatility, falls below this. `None` runs every round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

impl Default for RiskParitySolver {
    fn default() -> Self {
        Self {
            max_iterations: crate::config::default_erc_max_iterations(),
            tolerance: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErcSolution {
    /// One fraction per universe asset; excluded assets hold 0.
    pub weights: Vec<Fraction>,
    pub iterations: u32,
    pub converged: bool,
    /// Share of portfolio volatility per universe asset, percent.
    pub risk_contributions: Vec<Percent>,
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

impl RiskParitySolver {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_iterations: config.erc_max_iterations,
            tolerance: config.erc_tolerance,
        }
    }

    /// Solve over every asset not listed in `excluded` and with non-zero
    /// volatility.
    pub fn solve(&self, universe: &AssetUniverse, excluded: &[usize]) -> EngineResult<ErcSolution> {
        let total_assets = universe.len();
        for &idx in excluded {
            if idx >= total_assets {
                return Err(EngineError::invalid(
                    "excluded",
                    format!("Asset index {idx} out of range (n={total_assets})"),
                ));
            }
        }
        if let Some(tol) = self.tolerance {
            if !(tol > 0.0) {
                return Err(EngineError::invalid("tolerance", "must be positive"));
            }
        }

        let indices: Vec<usize> = (0..total_assets)
            .filter(|i| !excluded.contains(i))
            .filter(|&i| universe.assets()[i].annualized_vol > MIN_ERC_VOL)
            .collect();
        let n = indices.len();

        if n == 0 {
            return Ok(ErcSolution {
                weights: vec![0.0; total_assets],
                iterations: 0,
                converged: true,
                risk_contributions: vec![0.0; total_assets],
            });
        }

        let vols: Vec<f64> = indices
            .iter()
            .map(|&i| universe.assets()[i].annualized_vol / 100.0)
            .collect();
        let corr = universe.correlation().select(&indices);
        let cov: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| vols[i] * vols[j] * corr[i][j]).collect())
            .collect();

        let mut w = vec![1.0 / n as f64; n];
        let mut iterations = 0;

        for iter in 0..self.max_iterations {
            let (pv, rc) = contributions(&w, &cov);
            let target = pv / n as f64;

            if let Some(tol) = self.tolerance {
                if dispersion(&rc, target, pv) < tol {
                    tracing::trace!(iter, "erc converged early");
                    break;
                }
            }

            let next: Vec<f64> = w
                .iter()
                .zip(&rc)
                .map(|(wi, rci)| wi * (target / (rci + RISK_EPSILON)))
                .collect();
            let sum: f64 = next.iter().sum();
            if sum > 0.0 {
                w = next.into_iter().map(|x| x / sum).collect();
            }
            iterations = iter + 1;
        }

        let (pv, rc) = contributions(&w, &cov);
        let gap = dispersion(&rc, pv / n as f64, pv);
        let converged = gap < self.tolerance.unwrap_or(REPORT_TOLERANCE);

        tracing::debug!(assets = n, iterations, converged, gap, "erc solved");

        let mut weights = vec![0.0; total_assets];
        let mut risk_contributions = vec![0.0; total_assets];
        for (k, &idx) in indices.iter().enumerate() {
            weights[idx] = w[k];
            risk_contributions[idx] = rc[k] / (pv + RISK_EPSILON) * 100.0;
        }

        Ok(ErcSolution {
            weights,
            iterations,
            converged,
            risk_contributions,
        })
    }
}

/// ERC weights with the default 300-round solver.
pub fn erc_weights(universe: &AssetUniverse, excluded: &[usize]) -> EngineResult<Vec<Fraction>> {
    Ok(RiskParitySolver::default().solve(universe, excluded)?.weights)
}

/// (portfolio vol, per-asset risk contribution), both as fractions.
fn contributions(w: &[f64], cov: &[Vec<f64>]) -> (f64, Vec<f64>) {
    let n = w.len();
    let sigma_w: Vec<f64> = (0..n)
        .map(|i| (0..n).map(|j| cov[i][j] * w[j]).sum())
        .collect();
    let variance: f64 = (0..n).map(|i| w[i] * sigma_w[i]).sum();
    let pv = variance.max(0.0).sqrt();
    if pv <= 0.0 {
        return (0.0, vec![0.0; n]);
    }
    let rc = (0..n)
        .map(|i| w[i] * sigma_w[i] / (pv + RISK_EPSILON))
        .collect();
    (pv, rc)
}

fn dispersion(rc: &[f64], target: f64, pv: f64) -> f64 {
    rc.iter()
        .map(|r| (r - target).abs())
        .fold(0.0, f64::max)
        / (pv + RISK_EPSILON)
}

// ---------------------------------------------------------------------------
// Wrapper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErcInput {
    pub universe: AssetUniverse,
    /// Asset ids left out of the allocation.
    #[serde(default = "crate::config::default_erc_exclude_ids")]
    pub exclude_ids: Vec<String>,
    #[serde(default)]
    pub solver: RiskParitySolver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErcOutput {
    pub weights: Vec<Fraction>,
    /// Percent weights rounded to 0.1, as applied to an allocation.
    pub display_weights: Vec<Percent>,
    pub stats: PortfolioStats,
    pub risk_budget: Vec<RiskContribution>,
    pub iterations: u32,
    pub converged: bool,
}

/// Equal risk contribution allocation with statistics of the result.
pub fn solve_erc(input: &ErcInput) -> EngineResult<ComputationOutput<ErcOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let universe = &input.universe;

    let excluded = universe.indices_of(&input.exclude_ids)?;
    let solution = input.solver.solve(universe, &excluded)?;

    let zero_vol: Vec<&str> = universe
        .assets()
        .iter()
        .enumerate()
        .filter(|(i, a)| !excluded.contains(i) && a.annualized_vol <= MIN_ERC_VOL)
        .map(|(_, a)| a.id.as_str())
        .collect();
    if !zero_vol.is_empty() {
        warnings.push(format!(
            "Zero-volatility assets left out of the allocation: {}",
            zero_vol.join(", ")
        ));
    }
    if solution.weights.iter().all(|w| *w == 0.0) {
        warnings.push("No assets remain after exclusions; all weights are zero".into());
    } else if input.solver.tolerance.is_some() && !solution.converged {
        warnings.push(format!(
            "Solver did not reach tolerance within {} iterations",
            input.solver.max_iterations
        ));
    }

    let stats = portfolio_stats(&solution.weights, universe)?;
    let budget = risk_budget(&solution.weights, universe, None)?;

    let output = ErcOutput {
        display_weights: WeightVector::from_fractions(&solution.weights).rounded(1),
        weights: solution.weights,
        stats,
        risk_budget: budget,
        iterations: solution.iterations,
        converged: solution.converged,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Equal risk contribution (multiplicative fixed-point iteration)",
        &serde_json::json!({
            "max_iterations": input.solver.max_iterations,
            "tolerance": input.solver.tolerance,
            "exclude_ids": input.exclude_ids,
            "assets": universe.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::{default_universe, Asset, CorrelationMatrix};
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn two_asset(rho: f64) -> AssetUniverse {
        AssetUniverse::new(
            vec![Asset::new("low", 5.0, 10.0, true), Asset::new("high", 9.0, 20.0, true)],
            CorrelationMatrix::new(vec![vec![1.0, rho], vec![rho, 1.0]]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_two_asset_inverse_vol() {
        let w = erc_weights(&two_asset(0.0), &[]).unwrap();
        assert_relative_eq!(w[0], 2.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(w[1], 1.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_two_asset_correlated_still_inverse_vol() {
        let w = erc_weights(&two_asset(0.6), &[]).unwrap();
        assert_relative_eq!(w[0], 2.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_excluded_asset_gets_zero() {
        let u = default_universe();
        let sol = RiskParitySolver::default().solve(&u, &[0]).unwrap();
        assert_eq!(sol.weights[0], 0.0);
        assert_relative_eq!(sol.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_eq!(sol.iterations, 300);
        let included: Vec<f64> = sol.risk_contributions[1..].to_vec();
        for rc in &included {
            assert_relative_eq!(*rc, 100.0 / 6.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_all_excluded_returns_zeros() {
        let u = two_asset(0.0);
        let sol = RiskParitySolver::default().solve(&u, &[0, 1]).unwrap();
        assert_eq!(sol.weights, vec![0.0, 0.0]);
        assert_eq!(sol.iterations, 0);
    }

    #[test]
    fn test_out_of_range_exclusion_rejected() {
        assert!(erc_weights(&two_asset(0.0), &[5]).is_err());
    }

    #[test]
    fn test_zero_vol_asset_left_out() {
        let u = AssetUniverse::new(
            vec![
                Asset::new("flat", 3.0, 0.0, true),
                Asset::new("a", 5.0, 10.0, true),
                Asset::new("b", 9.0, 20.0, true),
            ],
            CorrelationMatrix::identity(3),
        )
        .unwrap();
        let w = erc_weights(&u, &[]).unwrap();
        assert_eq!(w[0], 0.0);
        assert!(w.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_clamped_variance_keeps_contributions_finite() {
        let corr = vec![
            vec![1.0, -1.0, -1.0],
            vec![-1.0, 1.0, -1.0],
            vec![-1.0, -1.0, 1.0],
        ];
        let u = AssetUniverse::new(
            vec![
                Asset::new("a", 5.0, 10.0, true),
                Asset::new("b", 6.0, 10.0, true),
                Asset::new("c", 7.0, 10.0, true),
            ],
            CorrelationMatrix::new(corr).unwrap(),
        )
        .unwrap();
        let sol = RiskParitySolver::default().solve(&u, &[]).unwrap();
        assert_eq!(sol.risk_contributions, vec![0.0; 3]);
        for w in &sol.weights {
            assert_relative_eq!(*w, 1.0 / 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_tolerance_stops_early() {
        let solver = RiskParitySolver {
            max_iterations: 300,
            tolerance: Some(1e-6),
        };
        let sol = solver.solve(&default_universe(), &[0]).unwrap();
        assert!(sol.converged);
        assert!(sol.iterations < 300);
    }

    #[test]
    fn test_solve_erc_wrapper_excludes_cash_by_default() {
        let input: ErcInput = serde_json::from_value(serde_json::json!({
            "universe": default_universe(),
        }))
        .unwrap();
        let out = solve_erc(&input).unwrap();
        assert_eq!(out.result.weights[0], 0.0);
        assert_eq!(out.result.display_weights[0], 0.0);
        assert_relative_eq!(out.result.display_weights.iter().sum::<f64>(), 100.0, epsilon = 0.5);
    }

    #[test]
    fn test_solve_erc_unknown_exclusion() {
        let input = ErcInput {
            universe: default_universe(),
            exclude_ids: vec!["gold".into()],
            solver: RiskParitySolver::default(),
        };
        assert!(matches!(solve_erc(&input), Err(EngineError::UnknownAsset(_))));
    }
}
