use thiserror::Error;

use crate::entity::EntityId;

/// Errors raised while building a [`SpatialMerger`](crate::SpatialMerger).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MergeError {
    /// The subtree has no mesh leaves. Not fatal: the model is simply not pickable.
    #[error("subtree contains no mesh leaves")]
    Empty,

    /// A leaf lacks a vertex attribute other leaves carry, and the merge
    /// options ask for a hard failure instead of dropping the attribute.
    #[error("entity {entity} does not carry vertex attribute '{attribute}' shared by other leaves")]
    AttributeMismatch { entity: EntityId, attribute: String },

    #[error("merge invariant violated: {0}")]
    Invariant(String),
}

/// Errors that abort a model import. Nothing is installed when one is returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ImportError {
    #[error("malformed geometry on node '{node}': {reason}")]
    MalformedGeometry { node: String, reason: String },

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("entity {0} is already indexed by another model")]
    DuplicateEntity(EntityId),

    #[error("import invariant violated: {0}")]
    Invariant(String),
}

/// Logs an invariant violation and wraps it in the matching error type.
pub(crate) fn invariant<E: From<String>>(message: impl Into<String>) -> E {
    let message = message.into();
    log::error!("invariant violated: {message}");
    E::from(message)
}

impl From<String> for MergeError {
    fn from(message: String) -> Self {
        MergeError::Invariant(message)
    }
}

impl From<String> for ImportError {
    fn from(message: String) -> Self {
        ImportError::Invariant(message)
    }
}
