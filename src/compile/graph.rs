//! Whole-graph batch export.
//!
//! Orders nodes with Kahn's algorithm, synthesizes one routine per node and
//! a driver that threads results along the edges, and emits a standalone
//! Python program. A cycle is a hard stop: the export returns a single
//! cycle error and never partial source.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;

use crate::{
    CellflowError, Result,
    compile::{
        format::is_identifier,
        node::{CompileOptions, HELPER_IMPORT, compile_fragment, result_variables},
    },
    model::{Graph, Node, NodeId},
};

/// Compile the whole graph into one runnable program.
pub fn compile_graph(
    graph: &Graph,
    options: &CompileOptions,
) -> Result<String> {
    let order = topological_order(graph)?;
    let driver_names = allocate_driver_names(graph, &order);

    let mut out = String::new();
    for line in collect_imports(graph) {
        let _ = writeln!(out, "{}", line);
    }
    out.push('\n');
    out.push_str("_results = {}\n");

    let mut driver = String::from("\ndef run_pipeline():\n");
    let mut last_result: Option<String> = None;

    for id in order.iter() {
        let node = match graph.get(id) {
            Some(n) => n,
            None => continue,
        };
        let routine = NodeRoutine::plan(graph, node, &driver_names);
        out.push('\n');
        routine.emit(&mut out, node, options);

        let results: Vec<String> = result_variables(node)
            .into_iter()
            .map(|var| driver_names.get(&(id.clone(), var.clone())).cloned().unwrap_or(var))
            .collect();
        let call = format!("{}({})", routine.name, routine.args.join(", "));
        match results.len() {
            0 => {
                let _ = writeln!(driver, "    {}", call);
            }
            _ => {
                let _ = writeln!(driver, "    {} = {}", results.join(", "), call);
            }
        }
        let has_output_port = node.schema.as_ref().map(|s| !s.outputs.is_empty()).unwrap_or(false);
        if has_output_port {
            last_result = results.first().cloned();
        }
    }

    match last_result {
        Some(var) => {
            let _ = writeln!(driver, "    return {}", var);
        }
        None => {
            let _ = writeln!(driver, "    return None");
        }
    }

    out.push_str(&driver);
    Ok(out)
}

/// Kahn's algorithm over adjacency and in-degree maps built in one
/// left-to-right edge scan. The ready queue is seeded and extended in node
/// insertion order, which keeps the emission order stable and reproducible
/// for identical graphs.
fn topological_order(graph: &Graph) -> Result<Vec<NodeId>> {
    let mut in_degree: HashMap<&str, usize> = graph.nodes().map(|n| (n.id.as_str(), 0)).collect();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

    for edge in graph.edges() {
        adjacency.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
        if let Some(d) = in_degree.get_mut(edge.target.as_str()) {
            *d += 1;
        }
    }

    let mut ready: VecDeque<&str> = graph.nodes().filter(|n| in_degree[n.id.as_str()] == 0).map(|n| n.id.as_str()).collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(id) = ready.pop_front() {
        order.push(id.to_string());
        for target in adjacency.remove(id).unwrap_or_default() {
            let d = in_degree.get_mut(target).expect("edge target present in degree map");
            *d -= 1;
            if *d == 0 {
                ready.push_back(target);
            }
        }
    }

    if order.len() < graph.node_count() {
        let stuck = graph.nodes().find(|n| !order.iter().any(|id| id == &n.id)).map(|n| n.id.clone()).unwrap_or_default();
        return Err(CellflowError::Cycle(stuck));
    }
    Ok(order)
}

/// Allocate one driver-scope name per node result so that two nodes binding
/// the same output-variable name never shadow each other in the driver. The
/// first user of a name keeps it; later ones get a `_2`, `_3`, ... suffix,
/// assigned in emission order.
fn allocate_driver_names(
    graph: &Graph,
    order: &[NodeId],
) -> HashMap<(NodeId, String), String> {
    let mut names: HashMap<(NodeId, String), String> = HashMap::new();
    let mut used: HashMap<String, usize> = HashMap::new();

    for id in order.iter() {
        let Some(node) = graph.get(id) else {
            continue;
        };
        for var in result_variables(node) {
            let key = (id.clone(), var.clone());
            if names.contains_key(&key) {
                continue;
            }
            let count = used.entry(var.clone()).or_insert(0);
            *count += 1;
            let name = if *count == 1 {
                var
            } else {
                format!("{}_{}", var, count)
            };
            names.insert(key, name);
        }
    }
    names
}

/// union of all declared schema imports plus the helper import, deduplicated
/// and sorted
fn collect_imports(graph: &Graph) -> Vec<String> {
    let mut imports: Vec<String> = vec![HELPER_IMPORT.to_string()];
    for node in graph.nodes() {
        if let Some(schema) = node.schema.as_ref() {
            imports.extend(schema.imports.iter().cloned());
        }
    }
    imports.sort();
    imports.dedup();
    imports
}

/// One synthesized routine: its name, parameter list, call-site argument
/// expressions, and the binding map threaded into the node compiler.
struct NodeRoutine {
    name: String,
    params: Vec<String>,
    args: Vec<String>,
    bindings: HashMap<String, String>,
}

impl NodeRoutine {
    /// Plan the routine for one node.
    ///
    /// Parameters are the distinct upstream results feeding its connected
    /// input ports, discovered in a single left-to-right scan of the
    /// incoming edges. Both the parameter and the call-site argument use
    /// the upstream's driver-scope name, so colliding output-variable
    /// names stay distinct end to end.
    fn plan(
        graph: &Graph,
        node: &Node,
        driver_names: &HashMap<(NodeId, String), String>,
    ) -> Self {
        let mut params: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();
        let mut bindings: HashMap<String, String> = HashMap::new();
        let mut param_for: HashMap<(String, String), String> = HashMap::new();

        for edge in graph.incoming(&node.id) {
            let Some(upstream) = graph.get(&edge.source) else {
                continue;
            };
            let Some(var) = upstream.output_variables.get(&edge.source_port) else {
                continue;
            };
            if !is_identifier(var) {
                continue;
            }
            let key = (edge.source.clone(), edge.source_port.clone());
            let param = match param_for.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let name = driver_names.get(&(edge.source.clone(), var.clone())).cloned().unwrap_or_else(|| var.clone());
                    param_for.insert(key, name.clone());
                    if !params.contains(&name) {
                        params.push(name.clone());
                        args.push(name.clone());
                    }
                    name
                }
            };
            bindings.insert(edge.target_port.clone(), param);
        }

        Self {
            name: format!("run_node_{:02}", node.sequence_number),
            params,
            args,
            bindings,
        }
    }

    fn emit(
        &self,
        out: &mut String,
        node: &Node,
        options: &CompileOptions,
    ) {
        let _ = writeln!(out, "def {}({}):", self.name, self.params.join(", "));
        let fragment = compile_fragment(node, &self.bindings, options, false);
        for line in fragment.lines() {
            let _ = writeln!(out, "    {}", line);
        }
        let results = result_variables(node);
        if let Some(first) = results.first() {
            let _ = writeln!(out, "    _results['{}'] = {}", node.id, first);
            let _ = writeln!(out, "    return {}", results.join(", "));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{Edge, NodeSchema, Port};

    fn source_node(
        id: &str,
        seq: u32,
    ) -> Node {
        let mut node = Node::free(id.to_string(), seq);
        node.attach_schema(NodeSchema {
            function_id: "io.load".to_string(),
            name: "Load".to_string(),
            outputs: vec![Port {
                name: "out".to_string(),
                ..Default::default()
            }],
            imports: vec!["import pandas as pd".to_string()],
            ..Default::default()
        });
        node
    }

    fn sink_node(
        id: &str,
        seq: u32,
    ) -> Node {
        let mut node = Node::free(id.to_string(), seq);
        node.attach_schema(NodeSchema {
            function_id: "prep.clean".to_string(),
            name: "Clean".to_string(),
            inputs: vec![Port {
                name: "df".to_string(),
                ..Default::default()
            }],
            outputs: vec![Port {
                name: "out".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        node
    }

    fn two_node_graph() -> Graph {
        let mut graph = Graph::new();
        graph.add_node(source_node("a", 1));
        graph.add_node(sink_node("b", 2));
        graph.connect(Edge::new("a", "out", "b", "df")).unwrap();
        graph
    }

    #[test]
    fn test_two_node_pipeline_threads_result() {
        let source = compile_graph(&two_node_graph(), &CompileOptions::default()).unwrap();

        let a_pos = source.find("def run_node_01():").unwrap();
        let b_pos = source.find("def run_node_02(n01_out):").unwrap();
        assert!(a_pos < b_pos);

        assert!(source.contains("prep.clean(df=n01_out)"));
        assert!(source.contains("_results['a'] = n01_out"));
        assert!(source.contains("_results['b'] = n02_out"));

        let driver = &source[source.find("def run_pipeline():").unwrap()..];
        assert!(driver.contains("n01_out = run_node_01()"));
        assert!(driver.contains("n02_out = run_node_02(n01_out)"));
        assert!(driver.trim_end().ends_with("return n02_out"));
    }

    #[test]
    fn test_imports_are_sorted_and_deduplicated() {
        let mut graph = two_node_graph();
        graph.add_node(source_node("c", 3));
        let source = compile_graph(&graph, &CompileOptions::default()).unwrap();
        let header: Vec<&str> = source.lines().take_while(|l| !l.is_empty()).collect();
        assert_eq!(header, vec![HELPER_IMPORT, "import pandas as pd"]);
    }

    #[test]
    fn test_each_node_emitted_exactly_once_after_upstreams() {
        let mut graph = Graph::new();
        graph.add_node(source_node("a", 1));
        graph.add_node(sink_node("b", 2));
        graph.add_node(sink_node("c", 3));
        graph.connect(Edge::new("a", "out", "b", "df")).unwrap();
        graph.connect(Edge::new("b", "out", "c", "df")).unwrap();

        let order = topological_order(&graph).unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);

        let source = compile_graph(&graph, &CompileOptions::default()).unwrap();
        for routine in ["def run_node_01", "def run_node_02", "def run_node_03"] {
            assert_eq!(source.matches(routine).count(), 1);
        }
    }

    #[test]
    fn test_cycle_is_a_hard_stop() {
        let mut graph = Graph::new();
        graph.add_node(sink_node("a", 1));
        graph.add_node(sink_node("b", 2));
        // restore_edge skips the connect-time cycle check, as a reloaded
        // document that predates the policy would
        graph.restore_edge(Edge::new("a", "out", "b", "df"));
        graph.restore_edge(Edge::new("b", "out", "a", "df"));

        let err = compile_graph(&graph, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CellflowError::Cycle(_)));
    }

    #[test]
    fn test_colliding_upstream_names_get_suffixes() {
        let mut graph = Graph::new();
        let mut a = source_node("a", 1);
        a.output_variables.insert("out".to_string(), "shared".to_string());
        let mut b = source_node("b", 2);
        b.output_variables.insert("out".to_string(), "shared".to_string());
        let mut c = sink_node("c", 3);
        if let Some(schema) = c.schema.as_mut() {
            schema.inputs.push(Port {
                name: "other".to_string(),
                ..Default::default()
            });
        }
        graph.add_node(a);
        graph.add_node(b);
        graph.add_node(c);
        graph.connect(Edge::new("a", "out", "c", "df")).unwrap();
        graph.connect(Edge::new("b", "out", "c", "other")).unwrap();

        let source = compile_graph(&graph, &CompileOptions::default()).unwrap();
        assert!(source.contains("def run_node_03(shared, shared_2):"));

        let driver = &source[source.find("def run_pipeline():").unwrap()..];
        assert!(driver.contains("shared = run_node_01()"));
        assert!(driver.contains("shared_2 = run_node_02()"));
        assert!(driver.contains("run_node_03(shared, shared_2)"));
    }
}
