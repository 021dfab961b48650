use std::collections::BTreeMap;

use crate::entity::EntityId;
use crate::error::MergeError;
use crate::source::{SourceMesh, RESERVED_ATTRIBUTES};

use super::AttributePolicy;

/// Result of the attribute normalization pass.
#[derive(Debug, Default)]
pub(super) struct CommonAttributes {
    /// Attributes every leaf carries, with their item size.
    pub kept: BTreeMap<String, usize>,
    /// Attributes present on some leaves only, sorted by name.
    pub dropped: Vec<String>,
}

/// Computes the attribute set shared by all `leaves`.
///
/// An attribute survives only if every leaf carries it with the same item size.
/// Under [`AttributePolicy::Fail`] the first leaf that breaks this rule is
/// reported instead.
pub(super) fn common_attributes(
    leaves: &[(EntityId, &SourceMesh)],
    policy: AttributePolicy,
) -> Result<CommonAttributes, MergeError> {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, mesh) in leaves {
        for (name, attribute) in &mesh.attributes {
            if !RESERVED_ATTRIBUTES.contains(&name.as_str()) {
                seen.entry(name.as_str()).or_insert(attribute.item_size);
            }
        }
    }

    let mut common = CommonAttributes::default();
    for (name, item_size) in seen {
        let offender = leaves.iter().find(|(_, mesh)| {
            mesh.attributes
                .get(name)
                .map_or(true, |attribute| attribute.item_size != item_size)
        });

        match (offender, policy) {
            (None, _) => {
                common.kept.insert(name.to_string(), item_size);
            }
            (Some(&(entity, _)), AttributePolicy::Fail) => {
                return Err(MergeError::AttributeMismatch {
                    entity,
                    attribute: name.to_string(),
                });
            }
            (Some(&(entity, _)), AttributePolicy::Drop) => {
                log::warn!(
                    "dropping vertex attribute '{name}' from merged buffer: entity {entity} does not provide it"
                );
                common.dropped.push(name.to_string());
            }
        }
    }

    Ok(common)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::VertexAttribute;

    fn mesh_with(attributes: &[(&str, usize)]) -> SourceMesh {
        let mut mesh = SourceMesh::quad([0.0; 3], 1.0);
        for &(name, size) in attributes {
            mesh = mesh.with_attribute(name, VertexAttribute::new(size, vec![0.0; 4 * size]));
        }
        mesh
    }

    #[test]
    fn test_shared_attributes_are_kept() {
        let a = mesh_with(&[("uv", 2), ("color", 3)]);
        let b = mesh_with(&[("uv", 2), ("color", 3)]);
        let common = common_attributes(&[(1, &a), (2, &b)], AttributePolicy::Drop).unwrap();
        assert_eq!(common.kept.len(), 2);
        assert_eq!(common.kept["uv"], 2);
        assert!(common.dropped.is_empty());
    }

    #[test]
    fn test_partial_attributes_are_dropped() {
        let a = mesh_with(&[("uv", 2), ("color", 3)]);
        let b = mesh_with(&[("uv", 2)]);
        let c = mesh_with(&[("uv", 3)]);

        let common = common_attributes(&[(1, &a), (2, &b)], AttributePolicy::Drop).unwrap();
        assert_eq!(common.kept.keys().collect::<Vec<_>>(), vec!["uv"]);
        assert_eq!(common.dropped, vec!["color".to_string()]);

        let common = common_attributes(&[(1, &a), (3, &c)], AttributePolicy::Drop).unwrap();
        assert!(common.kept.is_empty());
        assert_eq!(common.dropped, vec!["color".to_string(), "uv".to_string()]);
    }

    #[test]
    fn test_fail_policy_names_offending_leaf() {
        let a = mesh_with(&[("uv", 2)]);
        let b = mesh_with(&[]);
        let err = common_attributes(&[(1, &a), (2, &b)], AttributePolicy::Fail).unwrap_err();
        assert_eq!(
            err,
            MergeError::AttributeMismatch {
                entity: 2,
                attribute: "uv".to_string()
            }
        );
    }

    #[test]
    fn test_reserved_names_are_ignored() {
        let a = mesh_with(&[("normal", 3)]);
        let b = mesh_with(&[]);
        let common = common_attributes(&[(1, &a), (2, &b)], AttributePolicy::Fail).unwrap();
        assert!(common.kept.is_empty());
    }
}
