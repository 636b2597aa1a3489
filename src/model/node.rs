use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Column, NodeId, NodeSchema};

/// Lifecycle status of a node, derived except when set by the runtime.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Unconfigured,
    Configured,
    Running,
    Success,
    Failed,
}

/// 2-D layout coordinate, advisory only; does not affect compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One graph vertex, corresponding to exactly one persisted execution unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    /// stable opaque id, assigned once, never reused
    pub id: NodeId,
    /// schema snapshot; `None` marks a free node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<NodeSchema>,
    /// current parameter values, superset of schema defaults
    #[serde(default)]
    pub values: HashMap<String, serde_json::Value>,
    /// assigned on first materialization from the document counter,
    /// never recomputed for the node's lifetime
    pub sequence_number: u32,
    /// generated variable name bound to each output port's result
    #[serde(default)]
    pub output_variables: HashMap<String, String>,
    /// display label, from the schema name or the unit's heading line
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub status: NodeStatus,
    /// per input port, copied from the connected upstream output
    #[serde(default)]
    pub input_columns: HashMap<String, Vec<Column>>,
    /// per output port, learned post-execution via introspection
    #[serde(default)]
    pub output_columns: HashMap<String, Vec<Column>>,
}

impl Node {
    /// Create a free node: no schema, no ports, always unconfigured.
    pub fn free(
        id: NodeId,
        sequence_number: u32,
    ) -> Self {
        Self {
            id,
            sequence_number,
            ..Default::default()
        }
    }

    /// Attach a schema and assign default output variables for every
    /// declared output port that does not have one yet.
    pub fn attach_schema(
        &mut self,
        schema: NodeSchema,
    ) {
        for port in schema.outputs.iter() {
            self.output_variables.entry(port.name.clone()).or_insert_with(|| default_output_variable(self.sequence_number, &port.name));
        }
        for param in schema.parameters.iter() {
            if let Some(default) = &param.default {
                self.values.entry(param.name.clone()).or_insert_with(|| default.clone());
            }
        }
        self.schema = Some(schema);
    }

    /// A node without a schema is a free node.
    pub fn is_free(&self) -> bool {
        self.schema.is_none()
    }

    /// The variable bound to the first declared output port, if it is a
    /// legal identifier. The node compiler falls back to an intermediate
    /// composite result when this is absent.
    pub fn primary_output_variable(&self) -> Option<&str> {
        let schema = self.schema.as_ref()?;
        let port = schema.outputs.first()?;
        self.output_variables.get(&port.name).map(|s| s.as_str())
    }
}

/// Deterministic output-variable name for a port: `n{seq:02}_{port}`.
pub fn default_output_variable(
    sequence_number: u32,
    port: &str,
) -> String {
    format!("n{:02}_{}", sequence_number, port)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::Port;

    #[test]
    fn test_free_node_is_unconfigured() {
        let node = Node::free("a".to_string(), 1);
        assert!(node.is_free());
        assert_eq!(node.status, NodeStatus::Unconfigured);
        assert!(node.output_variables.is_empty());
    }

    #[test]
    fn test_attach_schema_assigns_output_variables() {
        let mut node = Node::free("a".to_string(), 3);
        node.attach_schema(NodeSchema {
            function_id: "pkg.load".to_string(),
            name: "Load".to_string(),
            outputs: vec![
                Port {
                    name: "out".to_string(),
                    ..Default::default()
                },
                Port {
                    name: "meta".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        });
        assert_eq!(node.output_variables.get("out").unwrap(), "n03_out");
        assert_eq!(node.output_variables.get("meta").unwrap(), "n03_meta");
        assert_eq!(node.primary_output_variable(), Some("n03_out"));
    }

    #[test]
    fn test_attach_schema_keeps_existing_variables() {
        let mut node = Node::free("a".to_string(), 2);
        node.output_variables.insert("out".to_string(), "custom".to_string());
        node.attach_schema(NodeSchema {
            function_id: "pkg.load".to_string(),
            name: "Load".to_string(),
            outputs: vec![Port {
                name: "out".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        assert_eq!(node.output_variables.get("out").unwrap(), "custom");
    }
}
