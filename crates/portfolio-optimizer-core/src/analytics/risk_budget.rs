use serde::{Deserialize, Serialize};

use super::statistics::validate_weights;
use crate::types::{Fraction, Percent, RISK_EPSILON};
use crate::universe::{AssetUniverse, LeverageProfile};
use crate::EngineResult;

/// One asset's share of portfolio volatility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskContribution {
    pub asset_id: String,
    /// Normalized weight, percent.
    pub weight: Percent,
    /// Weight after leverage, percent of capital.
    pub adjusted_weight: Percent,
    /// d(vol)/d(w_i): (Sigma w)_i / vol.
    pub marginal: f64,
    /// w_i * marginal_i, percent of volatility.
    pub contribution: Percent,
    /// contribution / vol * 100.
    pub pct_of_risk: Percent,
}

/// Euler decomposition of portfolio volatility into per-asset
/// contributions that sum to the portfolio volatility.
///
/// Weights are normalized fractions; when `leverage` is given the
/// decomposition runs on the leverage-adjusted weights.
pub fn risk_budget(
    weights: &[Fraction],
    universe: &AssetUniverse,
    leverage: Option<&LeverageProfile>,
) -> EngineResult<Vec<RiskContribution>> {
    validate_weights(weights, universe)?;
    let adjusted = match leverage {
        Some(lev) => {
            lev.validate(universe.len())?;
            lev.adjust(weights)
        }
        None => weights.to_vec(),
    };

    let cov = universe.covariance();
    let n = adjusted.len();

    // Sigma * w in percent squared
    let sigma_w: Vec<f64> = (0..n)
        .map(|i| (0..n).map(|j| cov[i][j] * adjusted[j]).sum())
        .collect();
    let variance: f64 = (0..n).map(|i| adjusted[i] * sigma_w[i]).sum();
    let vol = variance.max(0.0).sqrt();

    // zero or clamped (non-PSD) variance leaves nothing to decompose
    let marginals: Vec<f64> = if vol > 0.0 {
        sigma_w.iter().map(|s| s / (vol + RISK_EPSILON)).collect()
    } else {
        vec![0.0; n]
    };
    let contributions: Vec<f64> = (0..n).map(|i| adjusted[i] * marginals[i]).collect();

    tracing::debug!(assets = n, volatility = vol, "risk budget decomposed");

    Ok(universe
        .assets()
        .iter()
        .enumerate()
        .map(|(i, asset)| RiskContribution {
            asset_id: asset.id.clone(),
            weight: weights[i] * 100.0,
            adjusted_weight: adjusted[i] * 100.0,
            marginal: marginals[i],
            contribution: contributions[i],
            pct_of_risk: if vol > 0.0 {
                contributions[i] / (vol + RISK_EPSILON) * 100.0
            } else {
                0.0
            },
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::statistics::{portfolio_stats, portfolio_stats_leveraged};
    use crate::universe::{default_universe, Asset, CorrelationMatrix, WeightVector};
    use approx::assert_relative_eq;

    #[test]
    fn test_contributions_sum_to_volatility() {
        let u = default_universe();
        let w = WeightVector::new(vec![3.0, 10.0, 25.0, 15.0, 7.0, 25.0, 15.0]).normalized();
        let stats = portfolio_stats(&w, &u).unwrap();
        let rb = risk_budget(&w, &u, None).unwrap();
        let sum: f64 = rb.iter().map(|r| r.contribution).sum();
        assert_relative_eq!(sum, stats.volatility, epsilon = 1e-9);
        let pct: f64 = rb.iter().map(|r| r.pct_of_risk).sum();
        assert_relative_eq!(pct, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_uncorrelated_equal_vol_split_evenly() {
        let u = AssetUniverse::new(
            vec![Asset::new("a", 5.0, 10.0, true), Asset::new("b", 7.0, 10.0, true)],
            CorrelationMatrix::identity(2),
        )
        .unwrap();
        let rb = risk_budget(&[0.5, 0.5], &u, None).unwrap();
        assert_relative_eq!(rb[0].pct_of_risk, 50.0, epsilon = 1e-9);
        assert_relative_eq!(rb[1].pct_of_risk, 50.0, epsilon = 1e-9);
        assert_eq!(rb[0].asset_id, "a");
    }

    #[test]
    fn test_zero_weights_give_zero_contributions() {
        let u = default_universe();
        let rb = risk_budget(&[0.0; 7], &u, None).unwrap();
        assert!(rb.iter().all(|r| r.contribution == 0.0 && r.pct_of_risk == 0.0));
    }

    fn anti_correlated_triple() -> AssetUniverse {
        let corr = vec![
            vec![1.0, -1.0, -1.0],
            vec![-1.0, 1.0, -1.0],
            vec![-1.0, -1.0, 1.0],
        ];
        AssetUniverse::new(
            vec![
                Asset::new("a", 5.0, 10.0, true),
                Asset::new("b", 6.0, 10.0, true),
                Asset::new("c", 7.0, 10.0, true),
            ],
            CorrelationMatrix::new(corr).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_clamped_variance_gives_zero_budget() {
        let u = anti_correlated_triple();
        let w = [1.0 / 3.0; 3];
        assert_eq!(portfolio_stats(&w, &u).unwrap().volatility, 0.0);
        let rb = risk_budget(&w, &u, None).unwrap();
        for r in &rb {
            assert_eq!(r.marginal, 0.0);
            assert_eq!(r.contribution, 0.0);
            assert_eq!(r.pct_of_risk, 0.0);
        }
    }

    #[test]
    fn test_leveraged_budget_matches_leveraged_vol() {
        let u = default_universe();
        let w = WeightVector::new(vec![5.0, 35.0, 40.0, 5.0, 5.0, 5.0, 5.0]).normalized();
        let lev = LeverageProfile::single(2, 1.5, 5.0);
        let stats = portfolio_stats_leveraged(&w, &u, &lev).unwrap();
        let rb = risk_budget(&w, &u, Some(&lev)).unwrap();
        let sum: f64 = rb.iter().map(|r| r.contribution).sum();
        assert_relative_eq!(sum, stats.volatility, epsilon = 1e-9);
        assert_relative_eq!(rb[2].adjusted_weight, 60.0, epsilon = 1e-9);
    }
}
