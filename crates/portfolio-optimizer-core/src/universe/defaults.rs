//! Built-in seven-asset-class universe and named allocation presets.
//!
//! This is only a starting payload: callers may replace it wholesale (the CLI
//! accepts any universe file) and nothing in the engine reads it implicitly.

use serde::{Deserialize, Serialize};

use super::asset::{Asset, AssetUniverse};
use super::correlation::CorrelationMatrix;
use super::weights::WeightVector;

/// A named starting allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub key: String,
    pub name: String,
    pub weights: WeightVector,
    pub description: String,
}

/// Universe plus presets, serializable so it can be swapped for a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultPayload {
    pub universe: AssetUniverse,
    pub presets: Vec<Preset>,
}

impl DefaultPayload {
    pub fn builtin() -> Self {
        Self {
            universe: default_universe(),
            presets: default_presets(),
        }
    }

    pub fn preset(&self, key: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.key == key)
    }
}

fn asset(
    id: &str,
    name: &str,
    expected_return: f64,
    annualized_vol: f64,
    liquid: bool,
    description: &str,
) -> Asset {
    Asset {
        id: id.to_string(),
        name: name.to_string(),
        expected_return,
        annualized_vol,
        liquid,
        description: Some(description.to_string()),
    }
}

pub fn default_assets() -> Vec<Asset> {
    vec![
        asset("cash", "Cash", 4.0, 1.0, true, "T-Bills, money market"),
        asset("fixed_income", "Fixed Income", 5.0, 7.0, true, "US Agg / IG bonds"),
        asset("equity", "Equity", 9.5, 16.0, true, "Global equities (MSCI ACWI)"),
        asset("hedge_funds", "Hedge Funds", 7.0, 7.5, false, "HFRI fund-weighted composite proxy"),
        asset("commodities_crypto", "Comm & Crypto", 10.0, 22.0, true, "Gold, miners and BTC blend"),
        asset("private_equity", "Private Equity", 12.0, 17.0, false, "Buyout index, de-smoothed"),
        asset("real_estate", "Real Estate", 7.5, 19.0, true, "Listed REITs / REOCs"),
    ]
}

pub fn default_correlation() -> CorrelationMatrix {
    let rows = vec![
        vec![1.0, 0.15, -0.02, 0.05, 0.0, -0.02, -0.05],
        vec![0.15, 1.0, 0.15, 0.10, -0.10, 0.10, 0.20],
        vec![-0.02, 0.15, 1.0, 0.75, 0.15, 0.85, 0.65],
        vec![0.05, 0.10, 0.75, 1.0, 0.20, 0.70, 0.50],
        vec![0.0, -0.10, 0.15, 0.20, 1.0, 0.15, 0.10],
        vec![-0.02, 0.10, 0.85, 0.70, 0.15, 1.0, 0.55],
        vec![-0.05, 0.20, 0.65, 0.50, 0.10, 0.55, 1.0],
    ];
    CorrelationMatrix::from_trusted(rows)
}

/// The built-in universe. Always seven assets.
pub fn default_universe() -> AssetUniverse {
    AssetUniverse::from_trusted(default_assets(), default_correlation())
}

fn preset(key: &str, name: &str, weights: Vec<f64>, description: &str) -> Preset {
    Preset {
        key: key.to_string(),
        name: name.to_string(),
        weights: WeightVector::new(weights),
        description: description.to_string(),
    }
}

pub fn default_presets() -> Vec<Preset> {
    vec![
        preset(
            "classic_6040",
            "Adapted 60/40",
            vec![5.0, 35.0, 40.0, 5.0, 5.0, 5.0, 5.0],
            "60% risk assets, 40% defensive, small satellite alternatives sleeve",
        ),
        preset(
            "aggressive",
            "Aggressive Long-Horizon",
            vec![2.0, 8.0, 40.0, 10.0, 15.0, 15.0, 10.0],
            "Equity and private equity heavy, commodities as inflation hedge",
        ),
        preset(
            "endowment",
            "Endowment Model",
            vec![3.0, 10.0, 25.0, 15.0, 7.0, 25.0, 15.0],
            "Large private equity and hedge fund sleeves harvesting an illiquidity premium",
        ),
        preset(
            "equal_weight",
            "Equal Weight",
            vec![100.0 / 7.0; 7],
            "Naive 1/N baseline",
        ),
        preset(
            "max_diversification",
            "Max Diversification",
            vec![5.0, 15.0, 25.0, 15.0, 15.0, 10.0, 15.0],
            "Spreads risk across low-correlation sleeves",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_shapes_agree() {
        let payload = DefaultPayload::builtin();
        assert_eq!(payload.universe.len(), 7);
        assert_eq!(payload.universe.correlation().len(), 7);
        for p in &payload.presets {
            assert_eq!(p.weights.len(), 7, "preset {} has wrong length", p.key);
            assert!((p.weights.total() - 100.0).abs() < 1e-9, "preset {} does not sum to 100", p.key);
        }
    }

    #[test]
    fn test_default_correlation_is_psd() {
        assert!(default_correlation().is_positive_semidefinite());
    }

    #[test]
    fn test_payload_round_trips_through_json() {
        let payload = DefaultPayload::builtin();
        let json = serde_json::to_string(&payload).unwrap();
        let back: DefaultPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_preset_lookup() {
        let payload = DefaultPayload::builtin();
        assert!(payload.preset("endowment").is_some());
        assert!(payload.preset("unknown").is_none());
    }
}
