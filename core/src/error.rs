use std::path::PathBuf;

use thiserror::Error;

use crate::scene::{EntityId, ImportError, ModelId};

/// Errors returned by [`Viewer`](crate::Viewer) operations.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// The model failed to load. The viewer state is unchanged.
    #[error("model failed to load: {0}")]
    Import(#[from] ImportError),

    #[error("no model with id {0} is loaded")]
    UnknownModel(ModelId),

    #[error("no entity with id {0} is loaded")]
    UnknownEntity(EntityId),

    #[error("entity {0} is not a group at the top of the current scope")]
    NotEnterable(EntityId),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
