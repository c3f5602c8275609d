//! Asset universe and the plain data shapes indexed by asset position.

pub mod asset;
pub mod constraints;
pub mod correlation;
pub mod defaults;
pub mod leverage;
pub mod weights;
pub mod workspace;

pub use asset::{Asset, AssetUniverse};
pub use constraints::{Constraint, ConstraintSet, ConstraintViolation, LiquidityConstraint};
pub use correlation::CorrelationMatrix;
pub use defaults::{default_universe, DefaultPayload, Preset};
pub use leverage::LeverageProfile;
pub use weights::WeightVector;
pub use workspace::AllocationWorkspace;
