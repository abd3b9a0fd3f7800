//! Structural checks run on every fetched tree before it is displayed.

use std::collections::HashSet;

use pokin_api::{NodeType, PerformanceNode};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {id} has parentId {found:?} but sits under node {expected}")]
    ParentMismatch {
        id: i64,
        expected: i64,
        found: Option<i64>,
    },

    #[error("node {id} is at level {found} but its parent is at level {parent}")]
    LevelMismatch { id: i64, parent: i32, found: i32 },

    #[error("node {id} has level {level} but type {}", .node_type.as_str())]
    TypeLevelMismatch {
        id: i64,
        level: i32,
        node_type: NodeType,
    },

    #[error("node {id} is an operational node but has children")]
    TerminalWithChildren { id: i64 },

    #[error("node id {id} appears more than once")]
    DuplicateId { id: i64 },
}

impl TreeError {
    /// The node the error is about.
    pub fn node_id(&self) -> i64 {
        match self {
            TreeError::ParentMismatch { id, .. }
            | TreeError::LevelMismatch { id, .. }
            | TreeError::TypeLevelMismatch { id, .. }
            | TreeError::TerminalWithChildren { id }
            | TreeError::DuplicateId { id } => *id,
        }
    }
}

pub fn validate_tree(root: &PerformanceNode) -> Result<(), TreeError> {
    validate_forest(std::slice::from_ref(root))
}

/// Validate several roots; ids must be unique across the whole forest.
/// A root's own `parentId` is not checked, OPD roots hang off nodes that
/// are not part of the response.
pub fn validate_forest(roots: &[PerformanceNode]) -> Result<(), TreeError> {
    let mut seen = HashSet::new();
    for root in roots {
        check_node(root, &mut seen)?;
    }
    Ok(())
}

fn check_node(node: &PerformanceNode, seen: &mut HashSet<i64>) -> Result<(), TreeError> {
    if !seen.insert(node.id) {
        return Err(TreeError::DuplicateId { id: node.id });
    }
    if node.node_type.level() != node.level {
        return Err(TreeError::TypeLevelMismatch {
            id: node.id,
            level: node.level,
            node_type: node.node_type,
        });
    }
    if node.node_type == NodeType::Operational && node.has_children() {
        return Err(TreeError::TerminalWithChildren { id: node.id });
    }

    for child in &node.children {
        if child.parent_id != Some(node.id) {
            return Err(TreeError::ParentMismatch {
                id: child.id,
                expected: node.id,
                found: child.parent_id,
            });
        }
        if child.level != node.level + 1 {
            return Err(TreeError::LevelMismatch {
                id: child.id,
                parent: node.level,
                found: child.level,
            });
        }
        check_node(child, seen)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pokin_api::NodeStatus;

    /// Test helper shared with the other modules' tests.
    pub(crate) fn node(id: i64, parent_id: Option<i64>, level: i32) -> PerformanceNode {
        PerformanceNode {
            id,
            parent_id,
            name: format!("Node {id}"),
            description: None,
            fiscal_year: 2025,
            node_type: NodeType::from_level(level).unwrap_or(NodeType::Operational),
            level,
            status: NodeStatus::Draft,
            org_unit_code: None,
            region_code: None,
            indicators: Vec::new(),
            children: Vec::new(),
        }
    }

    pub(crate) fn with_children(
        mut parent: PerformanceNode,
        children: Vec<PerformanceNode>,
    ) -> PerformanceNode {
        parent.children = children;
        parent
    }

    /// 1 ─┬─ 2 ── 4
    ///    └─ 3
    pub(crate) fn sample_tree() -> PerformanceNode {
        with_children(
            node(1, None, 0),
            vec![
                with_children(node(2, Some(1), 1), vec![node(4, Some(2), 2)]),
                node(3, Some(1), 1),
            ],
        )
    }

    #[test]
    fn test_valid_tree() {
        assert_eq!(validate_tree(&sample_tree()), Ok(()));
    }

    #[test]
    fn test_parent_mismatch() {
        let tree = with_children(node(1, None, 0), vec![node(2, Some(9), 1)]);
        assert_eq!(
            validate_tree(&tree),
            Err(TreeError::ParentMismatch {
                id: 2,
                expected: 1,
                found: Some(9)
            })
        );
    }

    #[test]
    fn test_level_skip() {
        let tree = with_children(node(1, None, 0), vec![node(2, Some(1), 2)]);
        let err = validate_tree(&tree).unwrap_err();
        assert_eq!(
            err,
            TreeError::LevelMismatch {
                id: 2,
                parent: 0,
                found: 2
            }
        );
        assert_eq!(err.node_id(), 2);
    }

    #[test]
    fn test_type_disagrees_with_level() {
        let mut bad = node(1, None, 0);
        bad.node_type = NodeType::Strategic;
        let err = validate_tree(&bad).unwrap_err();
        assert!(matches!(err, TreeError::TypeLevelMismatch { id: 1, .. }));
        assert_eq!(err.to_string(), "node 1 has level 0 but type STRATEGIC_PEMDA");
    }

    #[test]
    fn test_terminal_with_children() {
        let mut leaf = node(7, Some(6), 6);
        leaf.children.push(node(8, Some(7), 6));
        let tree = with_children(node(6, Some(5), 5), vec![leaf]);
        assert_eq!(
            validate_tree(&tree),
            Err(TreeError::TerminalWithChildren { id: 7 })
        );
    }

    #[test]
    fn test_duplicate_ids_across_forest() {
        let roots = vec![node(10, Some(1), 4), node(10, Some(1), 4)];
        assert_eq!(
            validate_forest(&roots),
            Err(TreeError::DuplicateId { id: 10 })
        );
    }
}
