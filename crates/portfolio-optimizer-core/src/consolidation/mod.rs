pub mod graph;
pub mod rollup;

pub use graph::{ConsolidationEntity, ConsolidationGraph};
pub use rollup::{
    consolidate_family, inheritance_floor_violations, ConsolidatedPosition, ConsolidationInput,
    ConsolidationOutput, EntityFloorViolations, FamilyAggregate, FloorViolation,
};
