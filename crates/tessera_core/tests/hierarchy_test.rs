//! # Hierarchy Tests
//!
//! Child ordering, subtree destruction and the activation cascade through
//! the manager.

use std::cell::RefCell;
use std::rc::Rc;

use tessera_core::{Component, DestroyPolicy, EcsError, EntityId, Manager};

#[derive(Clone, Debug, Default, PartialEq)]
struct Marker(u32);

impl Component for Marker {
    const NAME: &'static str = "Marker";
}

fn spawn(manager: &mut Manager) -> EntityId {
    let handle = manager.create_entity();
    manager.entity_id(handle).unwrap()
}

fn children(manager: &Manager, parent: EntityId) -> Vec<EntityId> {
    manager.entities().children(parent).collect()
}

/// Test: A gets B then C; iteration yields B, C; removing B leaves C.
#[test]
fn test_children_order_and_removal() {
    let mut manager = Manager::new();
    let a = spawn(&mut manager);
    let b = spawn(&mut manager);
    let c = spawn(&mut manager);

    manager.add_child(a, b).unwrap();
    manager.add_child(a, c).unwrap();
    assert_eq!(children(&manager, a), vec![b, c]);

    assert!(manager.remove_child(a, b));
    assert_eq!(children(&manager, a), vec![c]);
    assert_eq!(manager.entities().parent_of(b), None);
}

/// Test: iterating children always agrees with the reported count.
#[test]
fn test_children_count_matches_iteration() {
    let mut manager = Manager::new();
    let root = spawn(&mut manager);
    let kids: Vec<EntityId> = (0..40).map(|_| spawn(&mut manager)).collect();

    for kid in &kids {
        manager.add_child(root, *kid).unwrap();
        assert_eq!(
            manager.entities().children(root).count(),
            manager.entities().children_count(root)
        );
    }

    for kid in kids.iter().step_by(3) {
        let before = manager.entities().children_count(root);
        assert!(manager.remove_child(root, *kid));
        assert_eq!(manager.entities().children_count(root), before - 1);
        assert_eq!(
            manager.entities().children(root).count(),
            manager.entities().children_count(root)
        );
    }
}

/// Test: destroying with the destroy-children policy removes exactly the
/// subtree.
#[test]
fn test_subtree_destroy_counts() {
    let mut manager = Manager::new();
    let root = spawn(&mut manager);
    let branch = spawn(&mut manager);
    let sibling = spawn(&mut manager);
    manager.add_child(root, branch).unwrap();
    manager.add_child(root, sibling).unwrap();

    let mut frontier = vec![branch];
    for _ in 0..3 {
        let mut next = Vec::new();
        for parent in frontier {
            for _ in 0..2 {
                let child = spawn(&mut manager);
                manager.add_child(parent, child).unwrap();
                next.push(child);
            }
        }
        frontier = next;
    }

    let subtree = manager.entities().branch_len(branch);
    assert_eq!(subtree, 15);
    let before = manager.entity_count();

    assert!(manager.destroy_entity_with(branch, DestroyPolicy::DestroyChildren));
    assert_eq!(manager.entity_count(), before - subtree);
    assert!(frontier.iter().all(|leaf| !manager.entities().is_alive(*leaf)));
    assert_eq!(children(&manager, root), vec![sibling]);
}

/// Test: the reparent policy hands children to the grandparent.
#[test]
fn test_destroy_reparents_children() {
    let mut manager = Manager::new();
    let root = spawn(&mut manager);
    let middle = spawn(&mut manager);
    let leaf = spawn(&mut manager);
    manager.add_child(root, middle).unwrap();
    manager.add_child(middle, leaf).unwrap();

    assert!(manager.destroy_entity_with(middle, DestroyPolicy::ReparentChildren));
    assert_eq!(children(&manager, root), vec![leaf]);
    assert_eq!(manager.entities().depth(leaf), Some(1));
}

/// Test: a disabled parent deactivates every descendant; re-enabling
/// restores `own enabled AND ancestors enabled`.
#[test]
fn test_activation_cascade() {
    let mut manager = Manager::new();
    manager.register_component_type::<Marker>().unwrap();

    let root = spawn(&mut manager);
    let child = spawn(&mut manager);
    let disabled_child = spawn(&mut manager);
    let grandchild = spawn(&mut manager);
    manager.add_child(root, child).unwrap();
    manager.add_child(root, disabled_child).unwrap();
    manager.add_child(child, grandchild).unwrap();
    manager.set_enabled(disabled_child, false);

    let marker = manager.create_component(Marker(1)).unwrap();
    manager.attach_component(grandchild, marker).unwrap();

    manager.set_enabled(root, false);
    for entity in [child, disabled_child, grandchild] {
        assert!(!manager.is_active(entity));
    }
    assert!(manager.is_enabled(child));
    assert!(!manager.is_component_active(marker));

    manager.set_enabled(root, true);
    assert!(manager.is_active(child));
    assert!(manager.is_active(grandchild));
    assert!(!manager.is_active(disabled_child));
    assert!(manager.is_component_active(marker));
    assert_eq!(manager.entities().active_branch_len(root), 3);
}

/// Test: cycles and self-parenting are rejected without touching the tree.
#[test]
fn test_cycles_rejected() {
    let mut manager = Manager::new();
    let a = spawn(&mut manager);
    let b = spawn(&mut manager);
    manager.add_child(a, b).unwrap();

    assert_eq!(
        manager.add_child(b, a),
        Err(EcsError::HierarchyCycle { parent: b, child: a })
    );
    assert_eq!(manager.add_child(b, b), Err(EcsError::SelfParent(b)));
    assert_eq!(children(&manager, a), vec![b]);
}

/// Test: destroying an entity detaches its components once each and keeps
/// them alive.
#[test]
fn test_entity_destroy_detaches_components() {
    let mut manager = Manager::new();
    manager.register_component_type::<Marker>().unwrap();

    let detached = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&detached);
    manager
        .events_mut()
        .component_detached
        .subscribe(move |event, _| log.borrow_mut().push(event.entity));

    let entity = spawn(&mut manager);
    let marker = manager.create_component(Marker(7)).unwrap();
    manager.attach_component(entity, marker).unwrap();

    assert!(manager.destroy_entity(entity));
    assert_eq!(*detached.borrow(), vec![entity]);
    assert_eq!(manager.get_component::<Marker>(marker), Some(&Marker(7)));
    assert_eq!(manager.component_owner(marker), None);
    assert!(!manager.destroy_entity(entity));
}
