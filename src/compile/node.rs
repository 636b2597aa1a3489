//! Per-node source fragment generation.
//!
//! One node compiles to one cell-sized fragment: a heading comment, the
//! helper import, the call with synthesized keyword arguments, output
//! bindings, and a best-effort preview of the primary result.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::{
    compile::format::{format_value, is_identifier},
    model::{Node, ParameterRole},
};

/// Import line carried by every compiled fragment.
pub const HELPER_IMPORT: &str = "from cellflow_runtime import noop";

/// Placeholder call for nodes with a missing or unknown function id, so a
/// partially configured graph never blocks compilation of sibling nodes.
const NOOP_FUNCTION: &str = "noop";

/// Options threaded from the engine config into compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// rows shown by the generated preview statement
    pub preview_rows: usize,
    /// root for resolving relative file-path parameters
    pub path_root: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            preview_rows: 5,
            path_root: None,
        }
    }
}

/// Compile one node into its source fragment.
///
/// `bindings` maps input-port names to upstream output-variable names;
/// unconnected ports render as `None`. Compiling the same node with the
/// same bindings twice yields byte-identical output.
pub fn compile_node(
    node: &Node,
    bindings: &HashMap<String, String>,
    options: &CompileOptions,
) -> String {
    compile_fragment(node, bindings, options, true)
}

/// Fragment body shared with the graph compiler, which hoists imports to
/// the program header instead of repeating them per fragment.
pub(crate) fn compile_fragment(
    node: &Node,
    bindings: &HashMap<String, String>,
    options: &CompileOptions,
    with_import: bool,
) -> String {
    let mut out = String::new();

    let title = node.schema.as_ref().map(|s| s.name.as_str()).filter(|n| !n.is_empty()).unwrap_or("unconfigured");
    let _ = writeln!(out, "# Node {}: {}", node.sequence_number, title);
    if with_import {
        out.push_str(HELPER_IMPORT);
        out.push('\n');
    }

    let call = render_call(node, bindings, options);

    let output_ports: Vec<&str> = node.schema.as_ref().map(|s| s.outputs.iter().map(|p| p.name.as_str()).collect()).unwrap_or_default();

    let assignable: Vec<&str> = output_ports
        .iter()
        .filter_map(|port| node.output_variables.get(*port).map(|v| v.as_str()))
        .filter(|v| is_identifier(v))
        .collect();

    if output_ports.is_empty() {
        // bare call statement, nothing to bind or preview
        let _ = writeln!(out, "{}", call);
        return out;
    }

    if output_ports.len() == 1 && assignable.len() == 1 {
        let var = assignable[0];
        let _ = writeln!(out, "{} = {}", var, call);
        write_preview(&mut out, var, options.preview_rows);
        return out;
    }

    // composite result: bind the call once, then one statement per
    // assignable output port
    let intermediate = format!("_tmp_n{:02}", node.sequence_number);
    let _ = writeln!(out, "{} = {}", intermediate, call);
    for var in assignable {
        let _ = writeln!(out, "{} = {}", var, intermediate);
    }
    write_preview(&mut out, &intermediate, options.preview_rows);
    out
}

/// The variable a routine returns for this node: the first assignable
/// output variable, else the intermediate composite name.
pub(crate) fn result_variables(node: &Node) -> Vec<String> {
    let Some(schema) = node.schema.as_ref() else {
        return Vec::new();
    };
    let assignable: Vec<String> = schema
        .outputs
        .iter()
        .filter_map(|port| node.output_variables.get(&port.name).cloned())
        .filter(|v| is_identifier(v))
        .collect();
    if assignable.is_empty() && !schema.outputs.is_empty() {
        return vec![format!("_tmp_n{:02}", node.sequence_number)];
    }
    assignable
}

fn render_call(
    node: &Node,
    bindings: &HashMap<String, String>,
    options: &CompileOptions,
) -> String {
    let mut args: Vec<String> = Vec::new();
    let path_root = options.path_root.as_deref();

    if let Some(schema) = node.schema.as_ref() {
        // input ports first, each resolved to an upstream identifier or None
        for port in schema.inputs.iter() {
            match bindings.get(&port.name) {
                Some(var) if is_identifier(var) => args.push(format!("{}={}", port.name, var)),
                _ => args.push(format!("{}=None", port.name)),
            }
        }
        // then declared parameters, skipping outputs and port-supplied names
        for param in schema.parameters.iter() {
            if param.role == ParameterRole::Output {
                continue;
            }
            if schema.input(&param.name).is_some() {
                continue;
            }
            let value = node.values.get(&param.name).or(param.default.as_ref());
            let rendered = format_value(value, &param.data_type, &param.name, param.role, path_root);
            args.push(format!("{}={}", param.name, rendered));
        }
        let function = if schema.function_id.is_empty() {
            NOOP_FUNCTION
        } else {
            schema.function_id.as_str()
        };
        format!("{}({})", function, args.join(", "))
    } else {
        format!("{}()", NOOP_FUNCTION)
    }
}

/// Best-effort preview: must not raise when the result lacks a head().
fn write_preview(
    out: &mut String,
    var: &str,
    rows: usize,
) {
    let _ = writeln!(out, "try:");
    let _ = writeln!(out, "    display({}.head({}))", var, rows);
    let _ = writeln!(out, "except Exception:");
    let _ = writeln!(out, "    print({})", var);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{NodeSchema, Parameter, Port};
    use serde_json::json;

    fn threshold_node() -> Node {
        let mut node = Node::free("a".to_string(), 1);
        node.attach_schema(NodeSchema {
            function_id: "filters.threshold".to_string(),
            name: "Threshold".to_string(),
            inputs: vec![Port {
                name: "df".to_string(),
                ..Default::default()
            }],
            outputs: vec![Port {
                name: "out".to_string(),
                ..Default::default()
            }],
            parameters: vec![Parameter {
                name: "threshold".to_string(),
                data_type: "float".to_string(),
                default: Some(json!(0.5)),
                ..Default::default()
            }],
            ..Default::default()
        });
        node.values.insert("threshold".to_string(), json!(0.7));
        node
    }

    #[test]
    fn test_unconnected_input_renders_none() {
        let node = threshold_node();
        let fragment = compile_node(&node, &HashMap::new(), &CompileOptions::default());
        assert!(fragment.contains("n01_out = filters.threshold(df=None, threshold=0.7)"));
        assert!(fragment.contains("display(n01_out.head(5))"));
        assert!(fragment.contains(HELPER_IMPORT));
        assert!(fragment.starts_with("# Node 1: Threshold"));
    }

    #[test]
    fn test_connected_input_renders_identifier() {
        let node = threshold_node();
        let bindings = HashMap::from([("df".to_string(), "n09_out".to_string())]);
        let fragment = compile_node(&node, &bindings, &CompileOptions::default());
        assert!(fragment.contains("filters.threshold(df=n09_out, threshold=0.7)"));
    }

    #[test]
    fn test_compile_is_idempotent() {
        let node = threshold_node();
        let bindings = HashMap::from([("df".to_string(), "n09_out".to_string())]);
        let options = CompileOptions::default();
        let first = compile_node(&node, &bindings, &options);
        let second = compile_node(&node, &bindings, &options);
        assert_eq!(first, second);
    }

    #[test]
    fn test_free_node_compiles_to_noop() {
        let node = Node::free("a".to_string(), 4);
        let fragment = compile_node(&node, &HashMap::new(), &CompileOptions::default());
        assert!(fragment.contains("noop()"));
        assert!(fragment.starts_with("# Node 4: unconfigured"));
    }

    #[test]
    fn test_multiple_outputs_use_intermediate() {
        let mut node = Node::free("a".to_string(), 2);
        node.attach_schema(NodeSchema {
            function_id: "prep.split".to_string(),
            name: "Split".to_string(),
            outputs: vec![
                Port {
                    name: "train".to_string(),
                    ..Default::default()
                },
                Port {
                    name: "test".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        });
        let fragment = compile_node(&node, &HashMap::new(), &CompileOptions::default());
        assert!(fragment.contains("_tmp_n02 = prep.split()"));
        assert!(fragment.contains("n02_train = _tmp_n02"));
        assert!(fragment.contains("n02_test = _tmp_n02"));
        assert!(fragment.contains("display(_tmp_n02.head(5))"));
    }

    #[test]
    fn test_zero_outputs_emit_bare_call() {
        let mut node = Node::free("a".to_string(), 3);
        node.attach_schema(NodeSchema {
            function_id: "io.save".to_string(),
            name: "Save".to_string(),
            inputs: vec![Port {
                name: "df".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        let fragment = compile_node(&node, &HashMap::new(), &CompileOptions::default());
        assert!(fragment.contains("io.save(df=None)\n"));
        assert!(!fragment.contains(" = io.save"));
        assert!(!fragment.contains("display("));
    }
}
