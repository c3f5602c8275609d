pub mod config;
pub mod error;
pub mod types;
pub mod universe;

#[cfg(feature = "analytics")]
pub mod analytics;

#[cfg(feature = "optimization")]
pub mod optimization;

#[cfg(feature = "consolidation")]
pub mod consolidation;

pub use config::EngineConfig;
pub use error::EngineError;
pub use types::*;

/// Standard result type for all engine operations
pub type EngineResult<T> = Result<T, EngineError>;
