use serde::{Deserialize, Serialize};

use super::correlation::CorrelationMatrix;
use crate::error::EngineError;
use crate::types::Percent;
use crate::EngineResult;

/// A single asset class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Stable identifier, unique within a universe.
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Expected return, percent per year.
    pub expected_return: Percent,
    /// Annualized volatility, percent per year.
    pub annualized_vol: Percent,
    /// Whether the asset can be sold at short notice.
    #[serde(default = "default_liquid")]
    pub liquid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_liquid() -> bool {
    true
}

impl Asset {
    pub fn new(id: &str, expected_return: Percent, annualized_vol: Percent, liquid: bool) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            expected_return,
            annualized_vol,
            liquid,
            description: None,
        }
    }

    fn validate(&self, idx: usize) -> EngineResult<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::invalid(
                format!("assets[{idx}].id"),
                "must not be empty",
            ));
        }
        if !self.expected_return.is_finite() {
            return Err(EngineError::invalid(
                format!("assets[{idx}].expected_return"),
                "must be finite",
            ));
        }
        if !self.annualized_vol.is_finite() || self.annualized_vol < 0.0 {
            return Err(EngineError::invalid(
                format!("assets[{idx}].annualized_vol"),
                "must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Ordered asset list plus its correlation matrix.
///
/// Every mutation goes through this type so the matrix can never drift out
/// of step with the asset list; `version` increments on each one so callers
/// can key memoized results on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawUniverse")]
pub struct AssetUniverse {
    assets: Vec<Asset>,
    correlation: CorrelationMatrix,
    version: u64,
}

#[derive(Deserialize)]
struct RawUniverse {
    assets: Vec<Asset>,
    correlation: CorrelationMatrix,
    #[serde(default)]
    version: u64,
}

impl TryFrom<RawUniverse> for AssetUniverse {
    type Error = EngineError;

    fn try_from(raw: RawUniverse) -> Result<Self, Self::Error> {
        let mut universe = AssetUniverse::new(raw.assets, raw.correlation)?;
        universe.version = raw.version;
        Ok(universe)
    }
}

impl AssetUniverse {
    pub fn new(assets: Vec<Asset>, correlation: CorrelationMatrix) -> EngineResult<Self> {
        if correlation.len() != assets.len() {
            return Err(EngineError::invalid(
                "correlation",
                format!(
                    "Expected {}x{} matrix but got {} rows",
                    assets.len(),
                    assets.len(),
                    correlation.len()
                ),
            ));
        }
        for (i, asset) in assets.iter().enumerate() {
            asset.validate(i)?;
            if assets[..i].iter().any(|a| a.id == asset.id) {
                return Err(EngineError::invalid(
                    format!("assets[{i}].id"),
                    format!("duplicate id '{}'", asset.id),
                ));
            }
        }
        Ok(Self {
            assets,
            correlation,
            version: 0,
        })
    }

    pub(crate) fn from_trusted(assets: Vec<Asset>, correlation: CorrelationMatrix) -> Self {
        debug_assert_eq!(assets.len(), correlation.len());
        Self {
            assets,
            correlation,
            version: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn asset(&self, idx: usize) -> Option<&Asset> {
        self.assets.get(idx)
    }

    pub fn correlation(&self) -> &CorrelationMatrix {
        &self.correlation
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.assets.iter().position(|a| a.id == id)
    }

    /// Resolve asset ids to indices, failing on the first unknown id.
    pub fn indices_of(&self, ids: &[String]) -> EngineResult<Vec<usize>> {
        ids.iter()
            .map(|id| {
                self.index_of(id)
                    .ok_or_else(|| EngineError::UnknownAsset(id.clone()))
            })
            .collect()
    }

    pub fn vols(&self) -> Vec<Percent> {
        self.assets.iter().map(|a| a.annualized_vol).collect()
    }

    pub fn returns(&self) -> Vec<Percent> {
        self.assets.iter().map(|a| a.expected_return).collect()
    }

    /// Covariance in percent squared: sigma_i * sigma_j * rho_ij.
    pub fn covariance(&self) -> Vec<Vec<f64>> {
        let vols = self.vols();
        let n = vols.len();
        (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| vols[i] * vols[j] * self.correlation.get(i, j))
                    .collect()
            })
            .collect()
    }

    /// Append an asset. Its correlation with every existing asset starts at
    /// `default_rho`. Returns the new asset's index.
    pub fn add_asset(&mut self, asset: Asset, default_rho: f64) -> EngineResult<usize> {
        asset.validate(self.assets.len())?;
        if self.index_of(&asset.id).is_some() {
            return Err(EngineError::invalid(
                "asset.id",
                format!("duplicate id '{}'", asset.id),
            ));
        }
        self.assets.push(asset);
        self.correlation.push_asset(default_rho);
        self.version += 1;
        Ok(self.assets.len() - 1)
    }

    /// Remove an asset by id, returning its former index and the asset.
    pub fn remove_asset(&mut self, id: &str) -> EngineResult<(usize, Asset)> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| EngineError::UnknownAsset(id.to_string()))?;
        self.correlation.remove_asset(idx)?;
        let asset = self.assets.remove(idx);
        self.version += 1;
        Ok((idx, asset))
    }

    /// Replace the return/vol/liquidity assumptions of an existing asset.
    pub fn update_asset(&mut self, asset: Asset) -> EngineResult<()> {
        let idx = self
            .index_of(&asset.id)
            .ok_or_else(|| EngineError::UnknownAsset(asset.id.clone()))?;
        asset.validate(idx)?;
        self.assets[idx] = asset;
        self.version += 1;
        Ok(())
    }

    pub fn set_correlation(&mut self, i: usize, j: usize, value: f64) -> EngineResult<()> {
        self.correlation.set(i, j, value)?;
        self.version += 1;
        Ok(())
    }

    /// Check a weight-like vector has one entry per asset.
    pub fn check_len(&self, field: &str, len: usize) -> EngineResult<()> {
        if len != self.len() {
            return Err(EngineError::invalid(
                field,
                format!("Expected {} values but got {}", self.len(), len),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn two_assets() -> AssetUniverse {
        AssetUniverse::new(
            vec![
                Asset::new("bonds", 5.0, 7.0, true),
                Asset::new("equity", 9.5, 16.0, true),
            ],
            CorrelationMatrix::new(vec![vec![1.0, 0.15], vec![0.15, 1.0]]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_mismatched_correlation_rejected() {
        let res = AssetUniverse::new(
            vec![Asset::new("a", 1.0, 1.0, true)],
            CorrelationMatrix::identity(2),
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let res = AssetUniverse::new(
            vec![Asset::new("a", 1.0, 1.0, true), Asset::new("a", 2.0, 2.0, true)],
            CorrelationMatrix::identity(2),
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_negative_vol_rejected() {
        let res = AssetUniverse::new(
            vec![Asset::new("a", 1.0, -1.0, true)],
            CorrelationMatrix::identity(1),
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_add_remove_bumps_version() {
        let mut u = two_assets();
        let idx = u.add_asset(Asset::new("pe", 12.0, 17.0, false), 0.1).unwrap();
        assert_eq!(idx, 2);
        assert_eq!(u.correlation().len(), 3);
        assert_eq!(u.version(), 1);
        let (removed_idx, removed) = u.remove_asset("pe").unwrap();
        assert_eq!(removed_idx, 2);
        assert_eq!(removed.id, "pe");
        assert_eq!(u.version(), 2);
        assert_eq!(u.correlation(), two_assets().correlation());
    }

    #[test]
    fn test_remove_unknown_asset() {
        let mut u = two_assets();
        assert!(matches!(
            u.remove_asset("gold"),
            Err(EngineError::UnknownAsset(_))
        ));
    }

    #[test]
    fn test_covariance_in_percent_squared() {
        let cov = two_assets().covariance();
        assert_eq!(cov[0][0], 49.0);
        assert!((cov[0][1] - 7.0 * 16.0 * 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_deserialize_checks_shape() {
        let json = r#"{
            "assets": [{"id": "a", "expected_return": 5.0, "annualized_vol": 7.0}],
            "correlation": [[1.0, 0.0], [0.0, 1.0]]
        }"#;
        let res: Result<AssetUniverse, _> = serde_json::from_str(json);
        assert!(res.is_err());
    }
}
