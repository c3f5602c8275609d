use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::Money;
use crate::universe::WeightVector;
use crate::EngineResult;

/// A family-office entity holding its own portfolio and optionally
/// inheriting part of a parent's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationEntity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub own_weights: WeightVector,
    pub own_value: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Share of the parent's consolidated value inherited, percent.
    #[serde(default)]
    pub inherit_pct: Decimal,
}

impl ConsolidationEntity {
    pub fn new(id: &str, own_weights: WeightVector, own_value: Money) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            own_weights,
            own_value,
            parent_id: None,
            inherit_pct: Decimal::ZERO,
        }
    }

    pub fn with_parent(mut self, parent_id: &str, inherit_pct: Decimal) -> Self {
        self.parent_id = Some(parent_id.to_string());
        self.inherit_pct = inherit_pct;
        self
    }

    fn validate(&self) -> EngineResult<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::invalid("entity.id", "must not be empty"));
        }
        validate_value(&self.id, self.own_value)?;
        validate_inherit_pct(&self.id, self.inherit_pct)
    }
}

fn validate_value(id: &str, value: Money) -> EngineResult<()> {
    if value < Decimal::ZERO {
        return Err(EngineError::invalid(
            format!("entities[{id}].own_value"),
            "must be non-negative",
        ));
    }
    Ok(())
}

fn validate_inherit_pct(id: &str, pct: Decimal) -> EngineResult<()> {
    if pct < Decimal::ZERO || pct > dec!(100) {
        return Err(EngineError::invalid(
            format!("entities[{id}].inherit_pct"),
            format!("must lie in [0, 100], got {pct}"),
        ));
    }
    Ok(())
}

/// Entities in insertion order. Parent links always form a forest: every
/// mutation that could close a loop is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ConsolidationEntity>", into = "Vec<ConsolidationEntity>")]
pub struct ConsolidationGraph {
    entities: Vec<ConsolidationEntity>,
}

impl ConsolidationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from a snapshot. Parent ids that name no entity are
    /// kept; such entities consolidate as standalone.
    pub fn from_entities(entities: Vec<ConsolidationEntity>) -> EngineResult<Self> {
        let mut graph = Self::new();
        let mut links = Vec::new();
        for mut entity in entities {
            if let Some(parent) = entity.parent_id.take() {
                links.push((entity.id.clone(), parent));
            }
            graph.add_entity(entity)?;
        }
        for (child, parent) in links {
            graph.link(&child, parent)?;
        }
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[ConsolidationEntity] {
        &self.entities
    }

    pub fn entity(&self, id: &str) -> Option<&ConsolidationEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    fn entity_mut(&mut self, id: &str) -> EngineResult<&mut ConsolidationEntity> {
        self.entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| EngineError::UnknownEntity(id.to_string()))
    }

    /// Direct children of `id`.
    pub fn children(&self, id: &str) -> Vec<&ConsolidationEntity> {
        self.entities
            .iter()
            .filter(|e| e.parent_id.as_deref() == Some(id))
            .collect()
    }

    pub fn add_entity(&mut self, entity: ConsolidationEntity) -> EngineResult<()> {
        entity.validate()?;
        if self.entity(&entity.id).is_some() {
            return Err(EngineError::invalid(
                "entity.id",
                format!("duplicate id '{}'", entity.id),
            ));
        }
        if let Some(parent) = &entity.parent_id {
            // dangling links elsewhere may already point at this id
            if *parent == entity.id || self.reaches(parent, &entity.id) {
                return Err(EngineError::CyclicOwnership {
                    entity: entity.id.clone(),
                    parent: parent.clone(),
                });
            }
        }
        tracing::trace!(entity = %entity.id, parent = ?entity.parent_id, "entity added");
        self.entities.push(entity);
        Ok(())
    }

    /// Point `child` at `parent` (or detach it with `None`).
    pub fn set_parent(
        &mut self,
        child: &str,
        parent: Option<&str>,
        inherit_pct: Decimal,
    ) -> EngineResult<()> {
        validate_inherit_pct(child, inherit_pct)?;
        if self.entity(child).is_none() {
            return Err(EngineError::UnknownEntity(child.to_string()));
        }
        match parent {
            None => {
                let entity = self.entity_mut(child)?;
                entity.parent_id = None;
                entity.inherit_pct = inherit_pct;
                Ok(())
            }
            Some(parent) => {
                if self.entity(parent).is_none() && parent != child {
                    return Err(EngineError::UnknownEntity(parent.to_string()));
                }
                self.link(child, parent.to_string())?;
                self.entity_mut(child)?.inherit_pct = inherit_pct;
                Ok(())
            }
        }
    }

    /// Remove an entity; its children lose their parent link.
    pub fn remove_entity(&mut self, id: &str) -> EngineResult<ConsolidationEntity> {
        let idx = self
            .entities
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| EngineError::UnknownEntity(id.to_string()))?;
        let removed = self.entities.remove(idx);
        for e in &mut self.entities {
            if e.parent_id.as_deref() == Some(id) {
                e.parent_id = None;
            }
        }
        Ok(removed)
    }

    pub fn set_own_value(&mut self, id: &str, value: Money) -> EngineResult<()> {
        validate_value(id, value)?;
        self.entity_mut(id)?.own_value = value;
        Ok(())
    }

    pub fn set_own_weights(&mut self, id: &str, weights: WeightVector) -> EngineResult<()> {
        self.entity_mut(id)?.own_weights = weights;
        Ok(())
    }

    fn link(&mut self, child: &str, parent: String) -> EngineResult<()> {
        if parent == child || self.reaches(&parent, child) {
            return Err(EngineError::CyclicOwnership {
                entity: child.to_string(),
                parent,
            });
        }
        self.entity_mut(child)?.parent_id = Some(parent);
        Ok(())
    }

    /// True when following parent links from `start` arrives at `target`.
    fn reaches(&self, start: &str, target: &str) -> bool {
        let mut current = Some(start);
        let mut steps = 0;
        while let Some(id) = current {
            if id == target {
                return true;
            }
            steps += 1;
            if steps > self.entities.len() {
                return false;
            }
            current = self.entity(id).and_then(|e| e.parent_id.as_deref());
        }
        false
    }
}

impl TryFrom<Vec<ConsolidationEntity>> for ConsolidationGraph {
    type Error = EngineError;

    fn try_from(entities: Vec<ConsolidationEntity>) -> Result<Self, Self::Error> {
        ConsolidationGraph::from_entities(entities)
    }
}

impl From<ConsolidationGraph> for Vec<ConsolidationEntity> {
    fn from(g: ConsolidationGraph) -> Self {
        g.entities
    }
}
