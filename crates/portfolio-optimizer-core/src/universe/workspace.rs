use serde::{Deserialize, Serialize};

use super::asset::{Asset, AssetUniverse};
use super::constraints::ConstraintSet;
use super::leverage::LeverageProfile;
use super::weights::WeightVector;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::EngineResult;

/// Universe plus every structure indexed by asset position.
///
/// Adding or removing an asset resizes the correlation matrix, the weight
/// vector, the constraint map and the leverage map in one step, so no caller
/// can observe them at different sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWorkspace")]
pub struct AllocationWorkspace {
    universe: AssetUniverse,
    weights: WeightVector,
    #[serde(default)]
    constraints: ConstraintSet,
    #[serde(default)]
    leverage: LeverageProfile,
}

#[derive(Deserialize)]
struct RawWorkspace {
    universe: AssetUniverse,
    weights: WeightVector,
    #[serde(default)]
    constraints: ConstraintSet,
    #[serde(default)]
    leverage: LeverageProfile,
}

impl TryFrom<RawWorkspace> for AllocationWorkspace {
    type Error = EngineError;

    fn try_from(raw: RawWorkspace) -> Result<Self, Self::Error> {
        AllocationWorkspace::new(raw.universe, raw.weights, raw.constraints, raw.leverage)
    }
}

impl AllocationWorkspace {
    pub fn new(
        universe: AssetUniverse,
        weights: WeightVector,
        constraints: ConstraintSet,
        leverage: LeverageProfile,
    ) -> EngineResult<Self> {
        let n = universe.len();
        universe.check_len("weights", weights.len())?;
        constraints.validate(n)?;
        leverage.validate(n)?;
        Ok(Self {
            universe,
            weights,
            constraints,
            leverage,
        })
    }

    /// Unconstrained, unlevered workspace holding equal weights.
    pub fn equal_weighted(universe: AssetUniverse) -> Self {
        let weights = WeightVector::equal(universe.len());
        Self {
            universe,
            weights,
            constraints: ConstraintSet::default(),
            leverage: LeverageProfile::default(),
        }
    }

    pub fn universe(&self) -> &AssetUniverse {
        &self.universe
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn leverage(&self) -> &LeverageProfile {
        &self.leverage
    }

    pub fn version(&self) -> u64 {
        self.universe.version()
    }

    pub fn set_weight(&mut self, idx: usize, value: f64) {
        self.weights.set(idx, value);
    }

    pub fn set_weights(&mut self, weights: WeightVector) -> EngineResult<()> {
        self.universe.check_len("weights", weights.len())?;
        self.weights = weights;
        Ok(())
    }

    pub fn set_constraints(&mut self, constraints: ConstraintSet) -> EngineResult<()> {
        constraints.validate(self.universe.len())?;
        self.constraints = constraints;
        Ok(())
    }

    pub fn set_leverage(&mut self, leverage: LeverageProfile) -> EngineResult<()> {
        leverage.validate(self.universe.len())?;
        self.leverage = leverage;
        Ok(())
    }

    pub fn set_correlation(&mut self, i: usize, j: usize, value: f64) -> EngineResult<()> {
        self.universe.set_correlation(i, j, value)
    }

    /// Append an asset holding `initial_weight` percent.
    pub fn add_asset(
        &mut self,
        asset: Asset,
        initial_weight: f64,
        default_rho: f64,
    ) -> EngineResult<usize> {
        let idx = self.universe.add_asset(asset, default_rho)?;
        self.weights.insert(idx, initial_weight);
        tracing::debug!(idx, version = self.version(), "asset added to workspace");
        Ok(idx)
    }

    /// [`add_asset`](Self::add_asset) correlated with every existing asset
    /// at the configured `default_correlation`.
    pub fn add_asset_with_config(
        &mut self,
        asset: Asset,
        initial_weight: f64,
        config: &EngineConfig,
    ) -> EngineResult<usize> {
        self.add_asset(asset, initial_weight, config.default_correlation)
    }

    /// Remove an asset and every entry indexed by it.
    pub fn remove_asset(&mut self, id: &str) -> EngineResult<Asset> {
        let (idx, asset) = self.universe.remove_asset(id)?;
        self.weights.remove(idx);
        self.constraints.remove_asset(idx);
        self.leverage.remove_asset(idx);
        tracing::debug!(id, idx, version = self.version(), "asset removed from workspace");
        Ok(asset)
    }
}
