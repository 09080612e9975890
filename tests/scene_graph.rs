use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use approx::assert_relative_eq;
use scenery::prelude::*;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_world_matrix_composes_with_parent() {
    init_logger();
    let mut scene = Scene::new();
    let parent = scene
        .create_container(View::new().position(10.0, 20.0).rotation(90.0))
        .unwrap();
    let child = scene
        .create_view(View::new().position(5.0, 0.0).scale(2.0, 3.0))
        .unwrap();
    scene.add_child(parent, child).unwrap();

    let expected = scene
        .world_matrix(parent)
        .unwrap()
        .append(&scene.local_matrix(child).unwrap());
    let world = scene.world_matrix(child).unwrap();
    assert!(world.approx_eq(&expected, 1e-5));

    // Rotation of 90 degrees maps the child's +x offset onto +y
    let (x, y) = scene.local_to_global(child, 0.0, 0.0).unwrap();
    assert_relative_eq!(x, 10.0, epsilon = 1e-4);
    assert_relative_eq!(y, 25.0, epsilon = 1e-4);
    let (lx, ly) = scene.global_to_local(child, x, y).unwrap();
    assert_relative_eq!(lx, 0.0, epsilon = 1e-4);
    assert_relative_eq!(ly, 0.0, epsilon = 1e-4);
}

#[test]
fn test_invert_round_trip_and_singular() {
    let m = Matrix::new(2.0, 0.5, -1.0, 3.0, 7.0, -4.0);
    let back = m.invert().unwrap().invert().unwrap();
    for (lhs, rhs) in back.to_cols_array().iter().zip(m.to_cols_array()) {
        assert_relative_eq!(*lhs, rhs, epsilon = 1e-4);
    }

    let singular = Matrix::new(1.0, 2.0, 2.0, 4.0, 0.0, 0.0);
    assert!(matches!(
        singular.invert(),
        Err(SceneError::DegenerateMatrix { .. })
    ));
}

#[test]
fn test_reparenting_keeps_sibling_order() {
    init_logger();
    let mut scene = Scene::new();
    let a = scene.create_container(View::new()).unwrap();
    let b = scene.create_container(View::new()).unwrap();
    let kids: Vec<NodeId> = (0..4)
        .map(|_| scene.create_view(View::new()).unwrap())
        .collect();
    for &k in &kids {
        scene.add_child(a, k).unwrap();
    }

    scene.add_child(b, kids[1]).unwrap();
    assert_eq!(scene.children(a), &[kids[0], kids[2], kids[3]]);
    assert_eq!(scene.children(b), &[kids[1]]);
    assert_eq!(scene.parent(kids[1]), Some(b));
}

#[test]
fn test_cycles_and_leaf_parents_rejected() {
    let mut scene = Scene::new();
    let outer = scene.create_container(View::new()).unwrap();
    let inner = scene.create_container(View::new()).unwrap();
    let leaf = scene.create_view(View::new()).unwrap();
    scene.add_child(outer, inner).unwrap();

    assert!(matches!(
        scene.add_child(inner, outer),
        Err(SceneError::InvalidHierarchy { .. })
    ));
    assert!(matches!(
        scene.add_child(outer, outer),
        Err(SceneError::InvalidHierarchy { .. })
    ));
    assert!(matches!(
        scene.add_child(leaf, inner),
        Err(SceneError::InvalidHierarchy { .. })
    ));
    // Rejected inserts leave the tree untouched
    assert_eq!(scene.parent(inner), Some(outer));
}

#[test]
fn test_non_finite_setters_rejected() {
    let mut scene = Scene::new();
    let id = scene.create_view(View::new().position(1.0, 2.0)).unwrap();
    let mut view = scene.view_mut(id).unwrap();
    assert!(view.set_x(f32::NAN).is_err());
    assert!(view.set_scale(1.0, f32::INFINITY).is_err());
    assert!(view.set_rotation(f32::NEG_INFINITY).is_err());

    let view = scene.view(id).unwrap();
    assert_eq!((view.x(), view.y()), (1.0, 2.0));
    assert!(scene.world_matrix(id).unwrap().is_finite());
}

#[test]
fn test_self_removal_during_update() {
    init_logger();
    let mut scene = Scene::new();
    let root = scene.create_container(View::new()).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    let mut ids = Vec::new();
    for name in ["a", "b", "c"] {
        let id = scene.create_view(View::new().named(name)).unwrap();
        scene.add_child(root, id).unwrap();
        let sink = log.clone();
        scene
            .on_update(id, move |ctx, _| {
                sink.borrow_mut().push(name);
                if name == "a" {
                    ctx.remove_self().unwrap();
                }
            })
            .unwrap();
        ids.push(id);
    }

    scene.update(root, Duration::from_millis(16));
    assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    assert_eq!(scene.children(root), &[ids[1], ids[2]]);
    assert_eq!(scene.parent(ids[0]), None);

    scene.update(root, Duration::from_millis(16));
    assert_eq!(*log.borrow(), vec!["a", "b", "c", "b", "c"]);
}

#[test]
fn test_bounds_union_children() {
    let mut scene = Scene::new();
    let group = scene.create_container(View::new().position(10.0, 10.0)).unwrap();
    let a = scene.create_view(View::new().size(5.0, 5.0)).unwrap();
    let b = scene
        .create_view(View::new().position(20.0, 0.0).size(5.0, 10.0))
        .unwrap();
    scene.add_child(group, a).unwrap();
    scene.add_child(group, b).unwrap();

    let bounds = scene.bounds(group).unwrap();
    assert_relative_eq!(bounds.x, 10.0);
    assert_relative_eq!(bounds.right(), 35.0);
    assert_relative_eq!(bounds.bottom(), 20.0);
}
