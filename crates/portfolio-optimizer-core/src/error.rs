use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Cyclic ownership: making '{parent}' the parent of '{entity}' would create a cycle")]
    CyclicOwnership { entity: String, parent: String },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl EngineError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::SerializationError(e.to_string())
    }
}
