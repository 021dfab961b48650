use std::collections::BTreeMap;

use cgmath::Point3;
use serde::{Deserialize, Serialize};

use crate::common::Aabb;
use crate::material::Material;
use crate::source::{SourceMesh, SourcePoints};

/// Unique identifier of an entity. Ids are never reused within a session.
pub type EntityId = u32;

/// Unique identifier of a loaded model.
pub type ModelId = u32;

/// Logical kind of an entity, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Group,
    Mesh,
    PointCloud,
    Default,
}

/// What an entity kind can do. Kind-specific behavior is looked up here
/// instead of being spread over `match` arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindCapabilities {
    /// Triangles go into the union mesh and get a slot
    pub merges_into_union: bool,
    /// Carries a display material of its own
    pub owns_material: bool,
    /// Handed to the renderer as its own object
    pub renders_standalone: bool,
    /// Can become the navigation scope (double-click to enter)
    pub can_enter: bool,
}

impl EntityKind {
    pub const fn capabilities(self) -> KindCapabilities {
        match self {
            EntityKind::Group => KindCapabilities {
                merges_into_union: false,
                owns_material: false,
                renders_standalone: false,
                can_enter: true,
            },
            EntityKind::Mesh => KindCapabilities {
                merges_into_union: true,
                owns_material: true,
                renders_standalone: false,
                can_enter: false,
            },
            EntityKind::PointCloud => KindCapabilities {
                merges_into_union: false,
                owns_material: true,
                renders_standalone: true,
                can_enter: false,
            },
            EntityKind::Default => KindCapabilities {
                merges_into_union: false,
                owns_material: false,
                renders_standalone: false,
                can_enter: false,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Group => "group",
            EntityKind::Mesh => "mesh",
            EntityKind::PointCloud => "point-cloud",
            EntityKind::Default => "default",
        }
    }
}

/// Explicit visibility state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Invisible,
}

/// Visibility of a subtree as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveVisibility {
    /// Node and all descendants are visible
    Visible,
    /// Node is invisible
    Invisible,
    /// Node is visible but some descendants are not
    Mixed,
}

/// Opaque endpoint metadata used by an external service to push property
/// edits back. The core only stores it and hands it back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointMetadata(pub serde_json::Value);

/// Kind-specific data.
#[derive(Debug, Clone)]
pub enum EntityPayload {
    Group,
    Mesh(SourceMesh),
    PointCloud(SourcePoints),
    Default,
}

impl EntityPayload {
    /// Bounds of this entity's own geometry, ignoring children.
    pub fn bounds(&self) -> Option<Aabb> {
        match self {
            EntityPayload::Mesh(mesh) => mesh.bounds(),
            EntityPayload::PointCloud(points) => points.bounds(),
            EntityPayload::Group | EntityPayload::Default => None,
        }
    }
}

/// One logical, independently controllable node of a model.
///
/// Entities live in an [`EntityTree`](crate::EntityTree) arena; `parent` and
/// `children` are ids into that arena.
#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) id: EntityId,
    pub(crate) model: ModelId,
    pub(crate) kind: EntityKind,
    pub(crate) name: Option<String>,

    pub(crate) parent: Option<EntityId>,
    pub(crate) children: Vec<EntityId>,

    pub(crate) bounds: Option<Aabb>,

    pub(crate) visibility: Visibility,
    pub(crate) selectable: bool,
    /// Cleared for entities outside the current navigation scope
    pub(crate) enabled: bool,
    pub(crate) selected: bool,

    pub(crate) properties: BTreeMap<String, serde_json::Value>,
    pub(crate) userdata: Option<EndpointMetadata>,

    pub(crate) default_material: Option<Material>,
    /// Material currently shown, default or highlight
    pub(crate) current_material: Option<Material>,

    pub(crate) payload: EntityPayload,
}

impl Entity {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn capabilities(&self) -> KindCapabilities {
        self.kind.capabilities()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Bounds of this entity and its visible descendants.
    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    pub fn centroid(&self) -> Option<Point3<f32>> {
        self.bounds.map(|b| b.center())
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }

    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Visible, selectable and inside the navigation scope.
    pub fn is_pickable(&self) -> bool {
        self.is_visible() && self.selectable && self.enabled
    }

    pub fn properties(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    pub fn userdata(&self) -> Option<&EndpointMetadata> {
        self.userdata.as_ref()
    }

    pub fn default_material(&self) -> Option<&Material> {
        self.default_material.as_ref()
    }

    pub fn current_material(&self) -> Option<&Material> {
        self.current_material.as_ref()
    }

    pub fn payload(&self) -> &EntityPayload {
        &self.payload
    }

    pub fn mesh(&self) -> Option<&SourceMesh> {
        match &self.payload {
            EntityPayload::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn points(&self) -> Option<&SourcePoints> {
        match &self.payload {
            EntityPayload::PointCloud(points) => Some(points),
            _ => None,
        }
    }

    pub fn set_selectable(&mut self, selectable: bool) {
        self.selectable = selectable;
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.properties.insert(key.into(), value);
    }
}
