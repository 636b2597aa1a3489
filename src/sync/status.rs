//! Status and label derivation.
//!
//! Pure functions over schema, edges, and the persisted execution-state
//! tag; the synchronizer calls them whenever the graph or a unit changes.

use crate::{
    model::{Edge, Node, NodeStatus},
    store::data::ExecutionState,
};

/// longest label before truncation
const LABEL_MAX_LEN: usize = 24;

/// Derive the lifecycle status of one node.
///
/// A free node is always unconfigured. An explicit execution-state tag
/// from the runtime wins. Otherwise a node is configured iff every
/// declared input port has a satisfying edge.
pub fn resolve_status(
    node: &Node,
    incoming: &[&Edge],
    execution_state: Option<ExecutionState>,
) -> NodeStatus {
    let Some(schema) = node.schema.as_ref() else {
        return NodeStatus::Unconfigured;
    };

    if let Some(state) = execution_state {
        return match state {
            ExecutionState::Running => NodeStatus::Running,
            ExecutionState::Succeeded => NodeStatus::Success,
            ExecutionState::Errored => NodeStatus::Failed,
        };
    }

    let satisfied = schema.inputs.iter().all(|port| incoming.iter().any(|e| e.target_port == port.name));
    if satisfied {
        NodeStatus::Configured
    } else {
        NodeStatus::Unconfigured
    }
}

/// Infer a display label for one node.
///
/// Prefers the schema's display name; a free node falls back to the
/// unit's leading comment or heading line, truncated with an ellipsis.
pub fn infer_label(
    node: &Node,
    source: &str,
) -> String {
    if let Some(name) = node.schema.as_ref().map(|s| s.name.as_str()).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    let heading = source.lines().next().unwrap_or("").trim_start_matches(['#', ' ']).trim();
    if heading.is_empty() {
        return format!("cell {}", node.sequence_number);
    }
    truncate_label(heading)
}

fn truncate_label(s: &str) -> String {
    if s.chars().count() <= LABEL_MAX_LEN {
        return s.to_string();
    }
    let truncated: String = s.chars().take(LABEL_MAX_LEN).collect();
    format!("{}…", truncated)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{NodeSchema, Port};

    fn input_node(inputs: &[&str]) -> Node {
        let mut node = Node::free("t".to_string(), 1);
        node.attach_schema(NodeSchema {
            function_id: "pkg.f".to_string(),
            name: "Filter".to_string(),
            inputs: inputs
                .iter()
                .map(|n| Port {
                    name: n.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        });
        node
    }

    #[test]
    fn test_free_node_is_always_unconfigured() {
        let node = Node::free("t".to_string(), 1);
        assert_eq!(resolve_status(&node, &[], Some(ExecutionState::Succeeded)), NodeStatus::Unconfigured);
    }

    #[test]
    fn test_execution_state_wins() {
        let node = input_node(&[]);
        assert_eq!(resolve_status(&node, &[], Some(ExecutionState::Running)), NodeStatus::Running);
        assert_eq!(resolve_status(&node, &[], Some(ExecutionState::Succeeded)), NodeStatus::Success);
        assert_eq!(resolve_status(&node, &[], Some(ExecutionState::Errored)), NodeStatus::Failed);
    }

    #[test]
    fn test_configured_requires_every_input_satisfied() {
        let node = input_node(&["df"]);
        assert_eq!(resolve_status(&node, &[], None), NodeStatus::Unconfigured);

        let edge = Edge::new("up", "out", "t", "df");
        assert_eq!(resolve_status(&node, &[&edge], None), NodeStatus::Configured);
    }

    #[test]
    fn test_label_from_schema_then_heading() {
        let node = input_node(&[]);
        assert_eq!(infer_label(&node, "# ignored"), "Filter");

        let free = Node::free("t".to_string(), 7);
        assert_eq!(infer_label(&free, "# Load the raw data\nx = 1"), "Load the raw data");
        assert_eq!(infer_label(&free, ""), "cell 7");
        let label = infer_label(&free, "# a very long heading line that keeps going");
        assert!(label.ends_with('…'));
        assert_eq!(label.chars().count(), 25);
    }
}
