pub use unionview_common as common;

pub mod build;
pub mod bvh;
pub mod entity;
pub mod error;
pub mod geom_query;
pub mod index;
pub mod material;
pub mod merge;
pub mod model;
pub mod source;
pub mod tree;

pub use build::{build_entity_tree, classify, IdGenerator};
pub use entity::{
    EffectiveVisibility, EndpointMetadata, Entity, EntityId, EntityKind, EntityPayload,
    KindCapabilities, ModelId, Visibility,
};
pub use error::{ImportError, MergeError};
pub use geom_query::{pick_all_from_ray, RayPickResult};
pub use index::{EntityIndex, IndexChange};
pub use material::{Material, MaterialFlags};
pub use merge::{
    AttributePolicy, CollisionBuffer, DrawGroup, Fragment, MergeHit, MergeOptions,
    OutlineBuffer, SpatialMerger,
};
pub use model::{
    Highlight, ModelContainer, NullSink, RenderObject, RenderObjectId, RenderObjectKind,
    SceneSink,
};
pub use source::{SourceGeometry, SourceMesh, SourceNode, SourcePoints, VertexAttribute};
pub use tree::{walk_tree, EntityTree, TreeVisitor};

#[cfg(test)]
mod scene_tests;
