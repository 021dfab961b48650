use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ViewerError;
use crate::scene::MergeOptions;
use crate::selection::SelectionConfig;

/// Settings for one viewer session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub merge: MergeOptions,
    pub selection: SelectionConfig,
}

impl ViewerConfig {
    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ViewerError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ViewerError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ViewerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ModifierKey;
    use crate::scene::AttributePolicy;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(ViewerConfig::from_json_str("{}").unwrap(), ViewerConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = ViewerConfig::from_json_str(
            r#"{
                "merge": { "attribute_policy": "fail", "collision_cell_size": 0.25 },
                "selection": { "remove_modifiers": ["super"] }
            }"#,
        )
        .unwrap();

        assert_eq!(config.merge.attribute_policy, AttributePolicy::Fail);
        assert_eq!(config.merge.collision_cell_size, Some(0.25));
        assert_eq!(config.merge.max_leaf_triangles, 4);
        assert_eq!(config.selection.remove_modifiers, vec![ModifierKey::Super]);
        assert_eq!(config.selection.add_modifiers, vec![ModifierKey::Shift]);
    }

    #[test]
    fn test_invalid_document() {
        let err = ViewerConfig::from_json_str(r#"{ "merge": { "attribute_policy": "maybe" } }"#)
            .unwrap_err();
        assert!(matches!(err, ViewerError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ViewerConfig::from_path("/nonexistent/viewer.json").unwrap_err();
        assert!(matches!(err, ViewerError::Io { .. }));
    }
}
