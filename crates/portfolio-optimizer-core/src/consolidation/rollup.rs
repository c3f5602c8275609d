use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use super::graph::{ConsolidationEntity, ConsolidationGraph};
use crate::analytics::{portfolio_stats, PortfolioStats};
use crate::error::EngineError;
use crate::types::{with_metadata, ComputationOutput, Fraction, Money, Percent, BOUND_TOLERANCE};
use crate::universe::AssetUniverse;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An entity's exposure after blending in its inherited share of the parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedPosition {
    pub entity_id: String,
    /// Own weights, normalized, percent.
    pub own_weights: Vec<Percent>,
    /// Value-weighted blend of own and inherited weights, percent.
    pub cons_weights: Vec<Percent>,
    pub own_value: Money,
    pub inherited_value: Money,
    pub total_value: Money,
    pub stats: PortfolioStats,
    /// Parent's consolidated weights when something was inherited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_weights: Option<Vec<Percent>>,
}

/// An asset whose consolidated holding falls short of what was inherited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorViolation {
    pub asset_index: usize,
    /// Value held in the asset after consolidation.
    pub held: f64,
    /// Value inherited in the asset from the parent.
    pub inherited: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyAggregate {
    pub entity_count: usize,
    /// Sum of own values; inherited value is never counted twice.
    pub total_value: Money,
    pub weights: Vec<Percent>,
    pub stats: PortfolioStats,
}

fn money_f64(m: Money) -> f64 {
    m.to_f64().unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Consolidation
// ---------------------------------------------------------------------------

impl ConsolidationGraph {
    /// Resolve an entity's consolidated position, walking up its parent
    /// chain.
    pub fn consolidated(&self, entity_id: &str, universe: &AssetUniverse) -> EngineResult<ConsolidatedPosition> {
        self.resolve(entity_id, universe, 0)
    }

    fn resolve(&self, entity_id: &str, universe: &AssetUniverse, depth: usize) -> EngineResult<ConsolidatedPosition> {
        let entity = self
            .entity(entity_id)
            .ok_or_else(|| EngineError::UnknownEntity(entity_id.to_string()))?;
        if depth > self.len() {
            return Err(EngineError::CyclicOwnership {
                entity: entity_id.to_string(),
                parent: entity.parent_id.clone().unwrap_or_default(),
            });
        }
        universe.check_len(&format!("entities[{entity_id}].own_weights"), entity.own_weights.len())?;

        let own = entity.own_weights.normalized();
        let parent = entity
            .parent_id
            .as_deref()
            .filter(|_| entity.inherit_pct > Decimal::ZERO)
            .filter(|p| self.entity(p).is_some());

        let Some(parent_id) = parent else {
            return standalone(entity, own, universe);
        };

        let parent_pos = self.resolve(parent_id, universe, depth + 1)?;
        let inherited_value = parent_pos.total_value * entity.inherit_pct / dec!(100);
        let total_value = entity.own_value + inherited_value;
        tracing::trace!(
            entity = entity_id,
            parent = parent_id,
            inherited = %inherited_value,
            "consolidation resolved"
        );

        let n = universe.len();
        let cons: Vec<Fraction> = if total_value <= Decimal::ZERO {
            vec![0.0; n]
        } else {
            let own_v = money_f64(entity.own_value);
            let inh_v = money_f64(inherited_value);
            let tot_v = money_f64(total_value);
            own.iter()
                .zip(&parent_pos.cons_weights)
                .map(|(o, p)| (o * own_v + p / 100.0 * inh_v) / tot_v)
                .collect()
        };
        let stats = if total_value <= Decimal::ZERO {
            PortfolioStats::zero()
        } else {
            portfolio_stats(&cons, universe)?
        };

        Ok(ConsolidatedPosition {
            entity_id: entity.id.clone(),
            own_weights: to_percent(&own),
            cons_weights: to_percent(&cons),
            own_value: entity.own_value,
            inherited_value,
            total_value,
            stats,
            parent_weights: Some(parent_pos.cons_weights),
        })
    }

    /// Family-wide rollup over own values and own weights only.
    pub fn family_aggregate(&self, universe: &AssetUniverse) -> EngineResult<FamilyAggregate> {
        let n = universe.len();
        let total_value: Money = self.entities().iter().map(|e| e.own_value).sum();
        let mut weights = vec![0.0; n];
        if total_value > Decimal::ZERO {
            let tot = money_f64(total_value);
            for e in self.entities() {
                universe.check_len(&format!("entities[{}].own_weights", e.id), e.own_weights.len())?;
                let value = money_f64(e.own_value);
                for (slot, w) in weights.iter_mut().zip(e.own_weights.normalized()) {
                    *slot += value * w / tot;
                }
            }
        }
        let stats = portfolio_stats(&weights, universe)?;
        Ok(FamilyAggregate {
            entity_count: self.len(),
            total_value,
            weights: to_percent(&weights),
            stats,
        })
    }
}

fn standalone(
    entity: &ConsolidationEntity,
    own: Vec<Fraction>,
    universe: &AssetUniverse,
) -> EngineResult<ConsolidatedPosition> {
    let stats = portfolio_stats(&own, universe)?;
    let pct = to_percent(&own);
    Ok(ConsolidatedPosition {
        entity_id: entity.id.clone(),
        own_weights: pct.clone(),
        cons_weights: pct,
        own_value: entity.own_value,
        inherited_value: Decimal::ZERO,
        total_value: entity.own_value,
        stats,
        parent_weights: None,
    })
}

fn to_percent(fractions: &[Fraction]) -> Vec<Percent> {
    fractions.iter().map(|w| w * 100.0).collect()
}

/// Assets where `weights` (or the position's own consolidated weights) hold
/// less value than was inherited from the parent. Advisory only.
pub fn inheritance_floor_violations(
    position: &ConsolidatedPosition,
    parent_weights: &[Percent],
    weights_override: Option<&[Percent]>,
) -> Vec<FloorViolation> {
    let weights = weights_override.unwrap_or(position.cons_weights.as_slice());
    let total = money_f64(position.total_value);
    let inherited = money_f64(position.inherited_value);
    // compared in percent of the position so the tolerance is scale-free
    let inherited_share = if total > 0.0 { inherited / total } else { 0.0 };
    weights
        .iter()
        .zip(parent_weights)
        .enumerate()
        .filter_map(|(i, (w, p))| {
            let floor_pct = p * inherited_share;
            (*w < floor_pct - BOUND_TOLERANCE).then(|| FloorViolation {
                asset_index: i,
                held: w / 100.0 * total,
                inherited: p / 100.0 * inherited,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Wrapper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationInput {
    pub universe: AssetUniverse,
    pub entities: Vec<ConsolidationEntity>,
    /// Manually edited consolidated weights (percent) keyed by entity id.
    #[serde(default)]
    pub overrides: BTreeMap<String, Vec<Percent>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFloorViolations {
    pub entity_id: String,
    pub violations: Vec<FloorViolation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationOutput {
    pub positions: Vec<ConsolidatedPosition>,
    pub family: FamilyAggregate,
    pub floor_violations: Vec<EntityFloorViolations>,
}

/// Consolidate every entity of a family and roll the family up.
pub fn consolidate_family(input: &ConsolidationInput) -> EngineResult<ComputationOutput<ConsolidationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let universe = &input.universe;
    let graph = ConsolidationGraph::from_entities(input.entities.clone())?;

    for id in input.overrides.keys() {
        if graph.entity(id).is_none() {
            return Err(EngineError::UnknownEntity(id.clone()));
        }
    }

    for e in graph.entities() {
        match &e.parent_id {
            Some(p) if graph.entity(p).is_none() => warnings.push(format!(
                "Parent '{p}' of '{}' not found; consolidated as standalone",
                e.id
            )),
            None if e.inherit_pct > Decimal::ZERO => warnings.push(format!(
                "'{}' has inherit_pct {} but no parent",
                e.id, e.inherit_pct
            )),
            _ => {}
        }
        let total = e.own_weights.total();
        if total > 0.0 && (total - 100.0).abs() >= 0.1 {
            warnings.push(format!(
                "Own weights of '{}' sum to {total:.2}%, normalized to 100%",
                e.id
            ));
        }
    }

    let mut positions = Vec::with_capacity(graph.len());
    let mut floor_violations = Vec::new();
    for e in graph.entities() {
        let pos = graph.consolidated(&e.id, universe)?;
        if let Some(parent_weights) = &pos.parent_weights {
            let override_weights = input.overrides.get(&e.id);
            if let Some(w) = override_weights {
                universe.check_len(&format!("overrides[{}]", e.id), w.len())?;
            }
            let violations =
                inheritance_floor_violations(&pos, parent_weights, override_weights.map(|w| w.as_slice()));
            if !violations.is_empty() {
                warnings.push(format!(
                    "'{}' holds less than its inherited exposure in {} asset(s)",
                    e.id,
                    violations.len()
                ));
                floor_violations.push(EntityFloorViolations {
                    entity_id: e.id.clone(),
                    violations,
                });
            }
        } else if input.overrides.contains_key(&e.id) {
            warnings.push(format!(
                "Override for '{}' ignored: it inherits nothing",
                e.id
            ));
        }
        positions.push(pos);
    }

    let family = graph.family_aggregate(universe)?;
    tracing::debug!(
        entities = graph.len(),
        total_value = %family.total_value,
        floor_violations = floor_violations.len(),
        "family consolidated"
    );

    let output = ConsolidationOutput {
        positions,
        family,
        floor_violations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Value-weighted inheritance consolidation; family rollup over own values",
        &serde_json::json!({
            "entities": graph.len(),
            "overrides": input.overrides.len(),
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
    use crate::universe::{default_universe, WeightVector};
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn weights(w: &[f64]) -> WeightVector {
        WeightVector::new(w.to_vec())
    }

    fn graph() -> ConsolidationGraph {
        let mut g = ConsolidationGraph::new();
        g.add_entity(ConsolidationEntity::new(
            "parent",
            weights(&[0.0, 0.0, 100.0, 0.0, 0.0, 0.0, 0.0]),
            dec!(300),
        ))
        .unwrap();
        g.add_entity(
            ConsolidationEntity::new("child", weights(&[0.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0]), dec!(100))
                .with_parent("parent", dec!(50)),
        )
        .unwrap();
        g
    }

    #[test]
    fn test_value_weighted_blend() {
        let u = default_universe();
        let pos = graph().consolidated("child", &u).unwrap();
        assert_eq!(pos.inherited_value, dec!(150));
        assert_eq!(pos.total_value, dec!(250));
        // 100 own in bonds, 150 inherited in equity
        assert_relative_eq!(pos.cons_weights[1], 40.0, epsilon = 1e-9);
        assert_relative_eq!(pos.cons_weights[2], 60.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_inherit_equals_own_exactly() {
        let u = default_universe();
        let mut g = graph();
        g.set_parent("child", Some("parent"), Decimal::ZERO).unwrap();
        let pos = g.consolidated("child", &u).unwrap();
        let own = weights(&[0.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0]).normalized();
        assert_eq!(pos.stats, portfolio_stats(&own, &u).unwrap());
        assert_eq!(pos.cons_weights, pos.own_weights);
        assert_eq!(pos.total_value, dec!(100));
    }

    #[test]
    fn test_recursive_resolution() {
        let u = default_universe();
        let mut g = graph();
        g.add_entity(
            ConsolidationEntity::new("grandchild", WeightVector::zeros(7), dec!(0))
                .with_parent("child", dec!(100)),
        )
        .unwrap();
        let pos = g.consolidated("grandchild", &u).unwrap();
        // inherits all of child's 250 consolidated
        assert_eq!(pos.total_value, dec!(250));
        assert_relative_eq!(pos.cons_weights[2], 60.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_total_gives_zero_stats() {
        let u = default_universe();
        let mut g = ConsolidationGraph::new();
        g.add_entity(ConsolidationEntity::new("p", WeightVector::equal(7), dec!(0)))
            .unwrap();
        g.add_entity(
            ConsolidationEntity::new("c", WeightVector::equal(7), dec!(0)).with_parent("p", dec!(50)),
        )
        .unwrap();
        let pos = g.consolidated("c", &u).unwrap();
        assert_eq!(pos.stats, PortfolioStats::zero());
        assert!(pos.cons_weights.iter().all(|w| *w == 0.0));
    }

    #[test]
    fn test_family_aggregate_uses_own_values() {
        let u = default_universe();
        let mut g = graph();
        g.add_entity(ConsolidationEntity::new("other", WeightVector::equal(7), dec!(200)))
            .unwrap();
        let fam = g.family_aggregate(&u).unwrap();
        assert_eq!(fam.total_value, dec!(600));
        assert_relative_eq!(fam.weights.iter().sum::<f64>(), 100.0, epsilon = 1e-9);
        assert_relative_eq!(fam.weights[2], 50.0 + 200.0 / 600.0 * 100.0 / 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_floor_violation_flagged_on_override() {
        let u = default_universe();
        let pos = graph().consolidated("child", &u).unwrap();
        let parent_w = pos.parent_weights.clone().unwrap();
        assert!(inheritance_floor_violations(&pos, &parent_w, None).is_empty());
        let manual = [0.0, 70.0, 30.0, 0.0, 0.0, 0.0, 0.0];
        let v = inheritance_floor_violations(&pos, &parent_w, Some(&manual));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].asset_index, 2);
    }

    #[test]
    fn test_floor_holds_at_large_values() {
        let u = default_universe();
        let mut entities = Vec::new();
        for (k, value) in [dec!(1000000000), dec!(25000000000), dec!(1000000000000)]
            .into_iter()
            .enumerate()
        {
            let parent_id = format!("parent_{k}");
            entities.push(ConsolidationEntity::new(
                &parent_id,
                weights(&[0.0, 13.0, 41.0, 0.0, 17.0, 0.0, 29.0]),
                value,
            ));
            for (j, pct) in [dec!(3.7), dec!(37), dec!(99.9)].into_iter().enumerate() {
                entities.push(
                    ConsolidationEntity::new(
                        &format!("child_{k}_{j}"),
                        weights(&[7.0, 0.0, 0.0, 51.0, 0.0, 42.0, 0.0]),
                        value * dec!(0.037),
                    )
                    .with_parent(&parent_id, pct),
                );
            }
        }
        let input = ConsolidationInput {
            universe: u,
            entities,
            overrides: BTreeMap::new(),
        };
        let out = consolidate_family(&input).unwrap();
        assert!(out.result.floor_violations.is_empty(), "{:?}", out.result.floor_violations);
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    }

    #[test]
    fn test_consolidate_family_wrapper() {
        let input = ConsolidationInput {
            universe: default_universe(),
            entities: graph().entities().to_vec(),
            overrides: BTreeMap::from([(
                "child".to_string(),
                vec![0.0, 70.0, 30.0, 0.0, 0.0, 0.0, 0.0],
            )]),
        };
        let out = consolidate_family(&input).unwrap();
        assert_eq!(out.result.positions.len(), 2);
        assert_eq!(out.result.family.total_value, dec!(400));
        assert_eq!(out.result.floor_violations.len(), 1);
        assert!(out.warnings.iter().any(|w| w.contains("inherited exposure")));
    }

    #[test]
    fn test_unknown_override_rejected() {
        let input = ConsolidationInput {
            universe: default_universe(),
            entities: graph().entities().to_vec(),
            overrides: BTreeMap::from([("ghost".to_string(), vec![0.0; 7])]),
        };
        assert!(matches!(
            consolidate_family(&input),
            Err(EngineError::UnknownEntity(_))
        ));
    }
}
