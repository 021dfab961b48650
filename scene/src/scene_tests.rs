use super::*;
use cgmath::{Point3, Vector3};
use crate::common::{Ray, RgbaColor, EPSILON};

// ========================================================================
// Helpers
// ========================================================================

/// `g1` holding three unit quads `m1`, `m2`, `m3` spaced along x.
fn g1_scene() -> SourceNode {
    SourceNode::group(
        "g1",
        vec![
            SourceNode::mesh("m1", SourceMesh::quad([0.0, 0.0, 0.0], 1.0)),
            SourceNode::mesh("m2", SourceMesh::quad([3.0, 0.0, 0.0], 1.0)),
            SourceNode::mesh("m3", SourceMesh::quad([6.0, 0.0, 0.0], 1.0)),
        ],
    )
}

/// A deeper scene mixing groups, meshes, a point cloud and an opaque node.
fn nested_scene() -> SourceNode {
    SourceNode::group(
        "site",
        vec![
            SourceNode::group(
                "building",
                vec![
                    SourceNode::mesh("wall", SourceMesh::cuboid([0.0, 0.0, -1.0], [1.0, 4.0, 0.0])),
                    SourceNode::group(
                        "floor",
                        vec![SourceNode::mesh("slab", SourceMesh::quad([5.0, 0.0, 0.0], 2.0))],
                    ),
                ],
            ),
            SourceNode::points("scan", SourcePoints::new(vec![[0.0, 0.0, 8.0], [1.0, 1.0, 9.0]])),
            SourceNode::other("camera-marker"),
        ],
    )
}

fn down_ray(x: f32, y: f32) -> Ray {
    Ray::new(Point3::new(x, y, 10.0), Vector3::new(0.0, 0.0, -1.0))
}

fn id_named(tree: &EntityTree, name: &str) -> EntityId {
    tree.iter()
        .find(|e| e.name() == Some(name))
        .map(Entity::id)
        .unwrap()
}

// ========================================================================
// Entity tree
// ========================================================================

#[test]
fn test_kinds_follow_geometry() {
    let mut ids = IdGenerator::new();
    let tree = build_entity_tree(1, nested_scene(), &mut ids).unwrap();

    let kind = |name| tree.get(id_named(&tree, name)).unwrap().kind();
    assert_eq!(kind("site"), EntityKind::Group);
    assert_eq!(kind("wall"), EntityKind::Mesh);
    assert_eq!(kind("scan"), EntityKind::PointCloud);
    assert_eq!(kind("camera-marker"), EntityKind::Default);
}

#[test]
fn test_interior_bounds_contain_children() {
    let mut ids = IdGenerator::new();
    let tree = build_entity_tree(1, nested_scene(), &mut ids).unwrap();
    assert!(tree.bounds_invariant_holds());

    let site = tree.get(tree.root()).unwrap().bounds().unwrap();
    assert_eq!(site.min.z, -1.0);
    assert_eq!(site.max.z, 9.0);
    assert_eq!(site.max.x, 7.0);

    let centroid = tree.get(id_named(&tree, "floor")).unwrap().centroid().unwrap();
    assert!((centroid.x - 5.0).abs() < EPSILON);
}

#[test]
fn test_effective_visibility() {
    let mut ids = IdGenerator::new();
    let mut model =
        ModelContainer::import(1, nested_scene(), &mut ids, &MergeOptions::default()).unwrap();
    let site = model.root();
    let floor = id_named(model.tree(), "floor");
    let building = id_named(model.tree(), "building");

    assert_eq!(model.tree().effective_visibility(site), Some(EffectiveVisibility::Visible));

    model.set_visibility(floor, Visibility::Invisible);
    assert_eq!(model.tree().effective_visibility(site), Some(EffectiveVisibility::Mixed));
    assert_eq!(model.tree().effective_visibility(floor), Some(EffectiveVisibility::Invisible));
    // Bounds of the building shrink to the wall
    assert_eq!(model.entity(building).unwrap().bounds().unwrap().max.x, 1.0);
    assert!(model.tree().bounds_invariant_holds());
}

// ========================================================================
// Spatial merger
// ========================================================================

#[test]
fn test_id_map_is_bijection_in_leaf_order() {
    let mut ids = IdGenerator::new();
    let tree = build_entity_tree(1, nested_scene(), &mut ids).unwrap();
    let merger = SpatialMerger::build(&tree, tree.root(), &MergeOptions::default()).unwrap();

    let leaves = tree.entities_of_kind(EntityKind::Mesh);
    assert_eq!(merger.id_map(), leaves.as_slice());
    for (slot, &entity) in leaves.iter().enumerate() {
        assert_eq!(merger.slot_of(entity), Some(slot as u32));
        assert_eq!(merger.entity_at(slot as u32), Some(entity));
    }
    assert_eq!(merger.entity_at(leaves.len() as u32), None);

    // Collision owners only reference existing slots
    assert!(merger
        .collision()
        .owners()
        .iter()
        .all(|&slot| (slot as usize) < merger.slot_count()));
}

#[test]
fn test_set_material_isolation() {
    let mut ids = IdGenerator::new();
    let tree = build_entity_tree(1, g1_scene(), &mut ids).unwrap();
    let mut merger = SpatialMerger::build(&tree, tree.root(), &MergeOptions::default()).unwrap();
    let m2 = id_named(&tree, "m2");
    let before = merger.materials().to_vec();

    let m = Material::new(RgbaColor::RED);
    let m2_material = Material::new(RgbaColor::WHITE).with_name("second");
    assert!(merger.set_material_for_entity(m2, m));
    assert!(merger.set_material_for_entity(m2, m2_material.clone()));

    let slot = merger.slot_of(m2).unwrap() as usize;
    for (i, material) in merger.materials().iter().enumerate() {
        if i == slot {
            assert_eq!(material, &m2_material);
        } else {
            assert_eq!(material, &before[i]);
        }
    }
}

#[test]
fn test_missing_slot_is_noop() {
    let mut ids = IdGenerator::new();
    let tree = build_entity_tree(1, nested_scene(), &mut ids).unwrap();
    let mut merger = SpatialMerger::build(&tree, tree.root(), &MergeOptions::default()).unwrap();
    let before = merger.materials().to_vec();

    // Point clouds are never merged
    let scan = id_named(&tree, "scan");
    assert!(!merger.set_material_for_entity(scan, Material::new(RgbaColor::RED)));
    assert_eq!(merger.materials(), before.as_slice());
}

#[test]
fn test_attribute_mismatch_policy() {
    let uv = VertexAttribute::new(2, vec![0.0; 8]);
    let scene = SourceNode::group(
        "g",
        vec![
            SourceNode::mesh("with-uv", SourceMesh::quad([0.0; 3], 1.0).with_attribute("uv", uv)),
            SourceNode::mesh("plain", SourceMesh::quad([3.0, 0.0, 0.0], 1.0)),
        ],
    );

    let mut ids = IdGenerator::new();
    let dropped = ModelContainer::import(1, scene.clone(), &mut ids, &MergeOptions::default()).unwrap();
    let merger = dropped.merger().unwrap();
    assert_eq!(merger.dropped_attributes(), &["uv".to_string()]);
    assert!(merger.fragments()[0].attributes().is_empty());

    let strict = MergeOptions {
        attribute_policy: AttributePolicy::Fail,
        ..Default::default()
    };
    let err = ModelContainer::import(2, scene, &mut ids, &strict).unwrap_err();
    assert!(matches!(
        err,
        ImportError::Merge(MergeError::AttributeMismatch { ref attribute, .. }) if attribute == "uv"
    ));
}

#[test]
fn test_group_only_scene_is_merge_empty() {
    let mut ids = IdGenerator::new();
    let tree = build_entity_tree(1, SourceNode::group("empty", vec![]), &mut ids).unwrap();
    assert_eq!(
        SpatialMerger::build(&tree, tree.root(), &MergeOptions::default()).unwrap_err(),
        MergeError::Empty
    );

    // The model itself still loads
    let mut index = EntityIndex::default();
    let model = index
        .import_model(SourceNode::group("empty", vec![]), &mut NullSink)
        .unwrap();
    assert!(!index.model(model).unwrap().is_pickable());
    assert_eq!(index.entity_count(), 1);
    assert!(pick_all_from_ray(&down_ray(0.0, 0.0), &index).is_empty());
}

// ========================================================================
// Ray queries over the index
// ========================================================================

#[test]
fn test_pick_inside_one_leaf() {
    let mut index = EntityIndex::default();
    let model = index.import_model(g1_scene(), &mut NullSink).unwrap();
    let m2 = id_named(index.model(model).unwrap().tree(), "m2");

    let hits = pick_all_from_ray(&down_ray(3.2, 0.3), &index);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entity, m2);
    assert_eq!(hits[0].model, model);
    assert!((hits[0].distance - 10.0).abs() < EPSILON);

    index
        .model_mut(model)
        .unwrap()
        .set_visibility(m2, Visibility::Invisible);
    assert!(pick_all_from_ray(&down_ray(3.2, 0.3), &index).is_empty());
}

#[test]
fn test_pick_sub_millimetre_leaf() {
    let scene = SourceNode::group(
        "fixture",
        vec![
            SourceNode::mesh("bolt", SourceMesh::quad([0.0, 0.0, 0.0], 0.00025)),
            SourceNode::mesh("slab", SourceMesh::quad([5.0, 0.0, 0.0], 2.0)),
        ],
    );
    let mut index = EntityIndex::default();
    let model = index.import_model(scene, &mut NullSink).unwrap();
    let bolt = id_named(index.model(model).unwrap().tree(), "bolt");

    let merger = index.model(model).unwrap().merger().unwrap();
    assert_eq!(merger.collision().triangle_count(), 4);

    let hits = pick_all_from_ray(&down_ray(0.00005, 0.00005), &index);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entity, bolt);
}

#[test]
fn test_non_selectable_hits_are_discarded() {
    let scene = SourceNode::group(
        "g",
        vec![
            SourceNode::mesh("top", SourceMesh::quad([0.0, 0.0, 1.0], 1.0)).with_selectable(false),
            SourceNode::mesh("bottom", SourceMesh::quad([0.0, 0.0, 0.0], 1.0)),
        ],
    );
    let mut index = EntityIndex::default();
    let model = index.import_model(scene, &mut NullSink).unwrap();
    let bottom = id_named(index.model(model).unwrap().tree(), "bottom");

    let hits = pick_all_from_ray(&down_ray(0.2, 0.4), &index);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entity, bottom);
}

#[test]
fn test_hits_sorted_across_models() {
    let mut index = EntityIndex::default();
    let far = index
        .import_model(SourceNode::mesh("far", SourceMesh::quad([0.0, 0.0, -4.0], 1.0)), &mut NullSink)
        .unwrap();
    let near = index
        .import_model(SourceNode::mesh("near", SourceMesh::quad([0.0, 0.0, 2.0], 1.0)), &mut NullSink)
        .unwrap();

    let hits = pick_all_from_ray(&down_ray(0.2, 0.4), &index);
    assert_eq!(hits.iter().map(|h| h.model).collect::<Vec<_>>(), vec![near, far]);
    assert!((hits[0].distance - 8.0).abs() < 1e-4);
    assert!((hits[1].hit_point.z + 4.0).abs() < 1e-4);
}

#[test]
fn test_scene_from_json() {
    let json = r#"{
        "name": "plant",
        "geometry": { "type": "group" },
        "children": [
            {
                "name": "pipe",
                "geometry": {
                    "type": "triangles",
                    "positions": [[0, 0, 0], [1, 0, 0], [0, 1, 0]]
                },
                "properties": { "tag": "P-101" },
                "userdata": { "endpoint": "/items/42" }
            }
        ]
    }"#;
    let source: SourceNode = serde_json::from_str(json).unwrap();

    let mut index = EntityIndex::default();
    index.import_model(source, &mut NullSink).unwrap();
    let pipe = index.entity(2).unwrap();
    assert_eq!(pipe.kind(), EntityKind::Mesh);
    assert_eq!(pipe.property("tag"), Some(&serde_json::json!("P-101")));
    assert_eq!(
        pipe.userdata(),
        Some(&EndpointMetadata(serde_json::json!({ "endpoint": "/items/42" })))
    );

    let hits = pick_all_from_ray(&down_ray(0.2, 0.2), &index);
    assert_eq!(hits[0].entity, 2);
}
