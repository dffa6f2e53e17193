use super::*;
use crate::change::PredecessorType;

fn new_node(id: i64, path: &str, kind: NodeKind) -> NewNode {
    NewNode {
        id: NodeId::new(id),
        rev_min: Revnum::new(1),
        path: path.to_string(),
        kind,
        predecessor: None,
    }
}

#[test]
fn create_links_parent_and_children() {
    let mut tree = CurrentTree::new();
    tree.create_node(new_node(1, "/trunk", NodeKind::Dir)).unwrap();
    let file = tree
        .create_node(new_node(2, "/trunk/a.txt", NodeKind::File))
        .unwrap();
    assert_eq!(file.parent(), NodeId::new(1));
    assert_eq!(file.name(), "a.txt");

    let trunk = tree.get_current_node("/trunk").unwrap();
    assert_eq!(trunk.parent(), NodeId::ROOT);
    assert_eq!(trunk.child("a.txt"), Some(NodeId::new(2)));
    assert_eq!(tree.len(), 2);
    assert_eq!(
        tree.child_paths("/trunk").unwrap(),
        vec!["/trunk/a.txt".to_string()]
    );
}

#[test]
fn missing_parent_is_fatal() {
    let mut tree = CurrentTree::new();
    let err = tree
        .create_node(new_node(1, "/branches/b1", NodeKind::Dir))
        .unwrap_err();
    assert_eq!(
        err,
        TreeError::NodeNotFound {
            path: "/branches".to_string()
        }
    );
    assert!(tree.is_empty());
}

#[test]
fn name_clash_is_fatal() {
    let mut tree = CurrentTree::new();
    tree.create_node(new_node(1, "/trunk", NodeKind::Dir)).unwrap();
    let err = tree
        .create_node(new_node(2, "/trunk", NodeKind::Dir))
        .unwrap_err();
    assert!(matches!(err, TreeError::DuplicateChild { ref name, .. } if name == "trunk"));
    assert_eq!(tree.get_current_node("/trunk").unwrap().id(), NodeId::new(1));
}

#[test]
fn file_cannot_hold_children() {
    let mut tree = CurrentTree::new();
    tree.create_node(new_node(1, "/a.txt", NodeKind::File)).unwrap();
    let err = tree
        .create_node(new_node(2, "/a.txt/b", NodeKind::File))
        .unwrap_err();
    assert_eq!(
        err,
        TreeError::NotADirectory {
            path: "/a.txt".to_string()
        }
    );
}

#[test]
fn drop_detaches_from_parent_and_index() {
    let mut tree = CurrentTree::new();
    tree.create_node(new_node(1, "/trunk", NodeKind::Dir)).unwrap();
    tree.create_node(new_node(2, "/trunk/a.txt", NodeKind::File))
        .unwrap();

    let err = tree.drop_current_node("/trunk").unwrap_err();
    assert_eq!(
        err,
        TreeError::HasChildren {
            path: "/trunk".to_string(),
            count: 1
        }
    );

    let dropped = tree.drop_current_node("/trunk/a.txt").unwrap();
    assert_eq!(dropped.id(), NodeId::new(2));
    assert!(tree.find("/trunk/a.txt").is_none());
    assert!(tree.node(NodeId::new(2)).is_none());
    assert_eq!(tree.get_current_node("/trunk").unwrap().child_count(), 0);

    assert_eq!(
        tree.drop_current_node("/").unwrap_err(),
        TreeError::RootImmutable
    );
}

#[test]
fn remove_child_of_non_member_is_fatal() {
    let mut tree = CurrentTree::new();
    tree.create_node(new_node(1, "/trunk", NodeKind::Dir)).unwrap();
    let err = tree.remove_child(NodeId::new(1), "ghost").unwrap_err();
    assert_eq!(
        err,
        TreeError::NotAChild {
            parent: "/trunk".to_string(),
            name: "ghost".to_string()
        }
    );
}

#[test]
fn rebuild_from_records_checks_parents() {
    let records = vec![
        NodeRecord {
            id: NodeId::new(1),
            rev_min: Revnum::new(1),
            rev_max: Revnum::HEAD,
            parent: NodeId::ROOT,
            predecessor: None,
            name: "trunk".to_string(),
            path: "/trunk".to_string(),
            kind: NodeKind::Dir,
        },
        NodeRecord {
            id: NodeId::new(7),
            rev_min: Revnum::new(3),
            rev_max: Revnum::HEAD,
            parent: NodeId::new(1),
            predecessor: Some(Predecessor {
                id: NodeId::new(4),
                kind: PredecessorType::Copy,
            }),
            name: "b.txt".to_string(),
            path: "/trunk/b.txt".to_string(),
            kind: NodeKind::File,
        },
    ];
    let tree = CurrentTree::from_records(records.clone()).unwrap();
    assert_eq!(tree.len(), 2);
    let restored = tree.get_current_node("/trunk/b.txt").unwrap();
    assert_eq!(restored.to_record(), records[1]);

    let mut broken = records;
    broken[1].parent = NodeId::new(9);
    assert!(matches!(
        CurrentTree::from_records(broken).unwrap_err(),
        TreeError::ParentMismatch { .. }
    ));
}
