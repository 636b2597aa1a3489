//! The unit synchronizer.
//!
//! Maps each graph node to exactly one persisted execution unit and keeps
//! the in-memory graph, the generated source, and the persisted metadata
//! mutually consistent as events arrive. All handlers run on one
//! synchronization pass at a time; a pass completes its read-modify-write
//! of a node's metadata before yielding.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use tracing::{debug, trace, warn};

use crate::{
    CellflowError, Config, Result, ShareLock,
    catalog::Catalog,
    common::{BroadcastQueue, MemCache},
    compile::{CompileOptions, compile_graph, compile_node},
    events::{Event, Message, Notification, RejectReason, SyncEvent},
    model::{Edge, Graph, Node, NodeId, NodeSchema},
    runtime::{RuntimeClient, VariableShape},
    store::{Store, data::*},
    sync::{Introspector, infer_label, resolve_status},
    utils,
};

const SCHEMA_CACHE_SIZE: usize = 256;

/// Per-node synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
enum SyncState {
    /// id, sequence number and output variables assigned
    Bound,
    /// generated code reflects current values and edges
    Compiled,
    /// a dependency changed, recompilation owed
    Stale,
}

pub struct Synchronizer {
    doc_id: String,
    graph: ShareLock<Graph>,
    /// unit id -> node id, one-to-one
    units: ShareLock<HashMap<String, NodeId>>,
    states: ShareLock<HashMap<NodeId, SyncState>>,
    store: Arc<Store>,
    catalog: Arc<dyn Catalog>,
    schema_cache: MemCache<String, NodeSchema>,
    introspector: Introspector,
    notifications: Arc<BroadcastQueue<Event<Message>>>,
    options: CompileOptions,
}

impl Synchronizer {
    pub fn new(
        doc_id: &str,
        store: Arc<Store>,
        catalog: Arc<dyn Catalog>,
        runtime: Arc<dyn RuntimeClient>,
        notifications: Arc<BroadcastQueue<Event<Message>>>,
        config: &Config,
    ) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            graph: Arc::new(RwLock::new(Graph::new())),
            units: Arc::new(RwLock::new(HashMap::new())),
            states: Arc::new(RwLock::new(HashMap::new())),
            store,
            catalog,
            schema_cache: MemCache::new(SCHEMA_CACHE_SIZE),
            introspector: Introspector::new(runtime, Duration::from_millis(config.introspection_timeout_ms)),
            notifications,
            options: CompileOptions {
                preview_rows: config.preview_rows,
                path_root: config.path_root.clone(),
            },
        }
    }

    /// Process one synchronization event.
    ///
    /// Collaborator failures are absorbed here: they surface as stale or
    /// missing hints on the editing surface, never as a crash.
    pub async fn handle(
        &self,
        event: SyncEvent,
    ) {
        trace!("sync::handle({})", event.str());
        let result = match event {
            SyncEvent::UnitAdded { unit_id } => self.on_unit_added(&unit_id),
            SyncEvent::UnitRemoved { unit_id } => self.on_unit_removed(&unit_id),
            SyncEvent::UnitsReordered | SyncEvent::DocumentReloaded => self.rebuild(),
            SyncEvent::NodeConfigured { unit_id, function_id } => self.on_node_configured(&unit_id, &function_id),
            SyncEvent::ValuesEdited { unit_id, values } => self.on_values_edited(&unit_id, values),
            SyncEvent::NodeMoved { unit_id, x, y } => self.on_node_moved(&unit_id, x, y),
            SyncEvent::Connect(edge) => self.on_connect(edge),
            SyncEvent::Disconnect(edge) => self.on_disconnect(&edge),
            SyncEvent::ExecutionStateChanged { unit_id, state } => self.on_execution_state(&unit_id, state).await,
        };
        if let Err(e) = result {
            warn!("synchronization pass failed: {}", e);
        }
    }

    /// Snapshot of the current in-memory graph.
    pub fn graph(&self) -> Graph {
        self.graph.read().unwrap().clone()
    }

    /// Whole-graph batch export.
    pub fn export(&self) -> Result<String> {
        let graph = self.graph.read().unwrap();
        compile_graph(&graph, &self.options)
    }

    // ---- event handlers ----

    fn on_unit_added(
        &self,
        unit_id: &str,
    ) -> Result<()> {
        if self.units.read().unwrap().contains_key(unit_id) {
            return Ok(());
        }

        // prior metadata means the unit moved or reappeared; rebind it
        if let Ok(meta) = self.store.units().find(unit_id) {
            let node = node_from_meta(&meta);
            let node_id = node.id.clone();
            self.units.write().unwrap().insert(unit_id.to_string(), node_id.clone());
            self.graph.write().unwrap().add_node(node);
            self.refresh_status(&node_id);
            self.set_state(&node_id, SyncState::Compiled);
            return Ok(());
        }

        // first observation: synthesize a free node
        let node_id = utils::longid();
        let sequence_number = self.allocate_sequence()?;
        let mut node = Node::free(node_id.clone(), sequence_number);
        node.label = infer_label(&node, "");

        self.store.units().create(&meta_from_node(unit_id, &self.doc_id, &node, "", None))?;
        self.units.write().unwrap().insert(unit_id.to_string(), node_id.clone());
        self.graph.write().unwrap().add_node(node);
        self.set_state(&node_id, SyncState::Bound);

        debug!("bound unit {} to new node {} (#{})", unit_id, node_id, sequence_number);
        self.notify(&node_id, Notification::StatusChanged(Default::default()));
        Ok(())
    }

    fn on_unit_removed(
        &self,
        unit_id: &str,
    ) -> Result<()> {
        let Some(node_id) = self.units.write().unwrap().remove(unit_id) else {
            return Ok(());
        };

        let pruned = {
            let mut graph = self.graph.write().unwrap();
            match graph.remove_node(&node_id) {
                Some((_, pruned)) => pruned,
                None => Vec::new(),
            }
        };

        self.store.units().delete(unit_id)?;
        self.persist_edges()?;
        self.states.write().unwrap().remove(&node_id);

        // former downstream targets lost a binding; drop the copied
        // columns and recompile them
        for edge in pruned.iter().filter(|e| e.source == node_id) {
            if let Some(target) = self.graph.write().unwrap().get_mut(&edge.target) {
                target.input_columns.remove(&edge.target_port);
            }
            self.recompile(&edge.target)?;
            self.refresh_status(&edge.target);
        }
        debug!("removed unit {} (node {}), pruned {} edges", unit_id, node_id, pruned.len());
        Ok(())
    }

    fn on_node_configured(
        &self,
        unit_id: &str,
        function_id: &str,
    ) -> Result<()> {
        let node_id = self.node_id_for_unit(unit_id)?;

        let schema = match self.schema_cache.get(&function_id.to_string()) {
            Some(schema) => Some(schema),
            None => {
                let schema = self.catalog.lookup(function_id);
                if let Some(schema) = &schema {
                    self.schema_cache.set(function_id.to_string(), schema.clone());
                }
                schema
            }
        };
        let Some(schema) = schema else {
            warn!("function id {} not found in catalog, node {} stays free", function_id, node_id);
            return Ok(());
        };

        {
            let mut graph = self.graph.write().unwrap();
            let node = graph.get_mut(&node_id).ok_or(CellflowError::Node(format!("node {} not found", node_id)))?;
            node.attach_schema(schema);
            node.label = infer_label(node, "");
        }
        self.set_state(&node_id, SyncState::Stale);
        self.recompile(&node_id)?;
        self.refresh_status(&node_id);
        Ok(())
    }

    fn on_values_edited(
        &self,
        unit_id: &str,
        values: HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        let node_id = self.node_id_for_unit(unit_id)?;
        {
            let mut graph = self.graph.write().unwrap();
            let node = graph.get_mut(&node_id).ok_or(CellflowError::Node(format!("node {} not found", node_id)))?;
            node.values.extend(values);
        }
        self.set_state(&node_id, SyncState::Stale);
        self.recompile(&node_id)?;
        Ok(())
    }

    fn on_node_moved(
        &self,
        unit_id: &str,
        x: f64,
        y: f64,
    ) -> Result<()> {
        let node_id = self.node_id_for_unit(unit_id)?;
        {
            let mut graph = self.graph.write().unwrap();
            let node = graph.get_mut(&node_id).ok_or(CellflowError::Node(format!("node {} not found", node_id)))?;
            if node.position.x == x && node.position.y == y {
                return Ok(());
            }
            node.position.x = x;
            node.position.y = y;
        }
        self.persist_node(&node_id)?;
        Ok(())
    }

    fn on_connect(
        &self,
        edge: Edge,
    ) -> Result<()> {
        let target_id = edge.target.clone();
        let source_id = edge.source.clone();
        let source_port = edge.source_port.clone();
        let target_port = edge.target_port.clone();

        let connected = self.graph.write().unwrap().connect(edge);
        if let Err(e) = connected {
            let reason = match &e {
                CellflowError::Edge(msg) if msg.contains("cycle") => RejectReason::Cycle,
                other => RejectReason::Invalid(other.to_string()),
            };
            warn!("connection rejected: {}", e);
            self.notify(&target_id, Notification::EdgeRejected(reason));
            return Ok(());
        }

        // copy the upstream shape onto the target's input port
        self.copy_columns(&source_id, &source_port, &target_id, &target_port);

        self.persist_edges()?;
        self.set_state(&target_id, SyncState::Stale);
        self.recompile(&target_id)?;
        self.refresh_status(&target_id);
        self.refresh_status(&source_id);
        Ok(())
    }

    fn on_disconnect(
        &self,
        edge: &Edge,
    ) -> Result<()> {
        let removed = {
            let mut graph = self.graph.write().unwrap();
            let removed = graph.disconnect(edge);
            if removed {
                if let Some(target) = graph.get_mut(&edge.target) {
                    target.input_columns.remove(&edge.target_port);
                }
            }
            removed
        };
        if !removed {
            return Ok(());
        }

        self.persist_edges()?;
        self.set_state(&edge.target, SyncState::Stale);
        self.recompile(&edge.target)?;
        self.refresh_status(&edge.target);
        self.refresh_status(&edge.source);
        Ok(())
    }

    /// Rebuild the whole in-memory graph from persisted metadata.
    fn rebuild(&self) -> Result<()> {
        let metas: Vec<UnitMeta> = self.store.units().list()?.into_iter().filter(|m| m.doc_id == self.doc_id).collect();
        let document = self.store.find_or_create_document(&self.doc_id)?;

        let mut graph = Graph::new();
        let mut units = HashMap::new();
        let mut states = HashMap::new();
        for meta in metas.iter() {
            let node = node_from_meta(meta);
            units.insert(meta.id.clone(), node.id.clone());
            states.insert(node.id.clone(), SyncState::Compiled);
            graph.add_node(node);
        }
        for edge in document.edges {
            graph.restore_edge(edge);
        }
        // replay column propagation: input columns are derived, not
        // persisted, so each surviving edge re-copies its upstream shape
        let mut copied = Vec::new();
        for edge in graph.edges() {
            let columns = graph.get(&edge.source).and_then(|n| n.output_columns.get(&edge.source_port)).cloned().unwrap_or_default();
            if !columns.is_empty() {
                copied.push((edge.target.clone(), edge.target_port.clone(), columns));
            }
        }
        for (target, port, columns) in copied {
            if let Some(node) = graph.get_mut(&target) {
                node.input_columns.insert(port, columns);
            }
        }
        let mut statuses = Vec::new();
        for meta in metas.iter() {
            let incoming = graph.incoming(&meta.node_id);
            if let Some(node) = graph.get(&meta.node_id) {
                statuses.push((meta.node_id.clone(), resolve_status(node, &incoming, meta.execution_state)));
            }
        }
        for (node_id, status) in statuses {
            if let Some(node) = graph.get_mut(&node_id) {
                node.status = status;
            }
        }

        *self.graph.write().unwrap() = graph;
        *self.units.write().unwrap() = units;
        *self.states.write().unwrap() = states;

        debug!("rebuilt graph for document {}", self.doc_id);
        self.notify("", Notification::GraphRebuilt);
        Ok(())
    }

    async fn on_execution_state(
        &self,
        unit_id: &str,
        state: ExecutionState,
    ) -> Result<()> {
        let node_id = self.node_id_for_unit(unit_id)?;

        // persist the tag only when it actually changed
        let mut meta = self.store.units().find(unit_id)?;
        if meta.execution_state != Some(state) {
            meta.execution_state = Some(state);
            meta.timestamp = utils::time::time_millis();
            self.store.units().update(&meta)?;
        }
        self.refresh_status(&node_id);

        if state != ExecutionState::Succeeded {
            return Ok(());
        }

        // learn output shapes from the runtime
        let variables: Vec<String> = {
            let graph = self.graph.read().unwrap();
            let node = graph.get(&node_id).ok_or(CellflowError::Node(format!("node {} not found", node_id)))?;
            let Some(schema) = node.schema.as_ref() else {
                return Ok(());
            };
            schema.outputs.iter().filter_map(|p| node.output_variables.get(&p.name).cloned()).collect()
        };

        let Some(shapes) = self.introspector.introspect_node(&node_id, &variables).await else {
            return Ok(());
        };

        let changed = {
            let mut graph = self.graph.write().unwrap();
            let Some(node) = graph.get_mut(&node_id) else {
                return Ok(());
            };
            let by_variable: HashMap<&str, &VariableShape> = shapes.iter().map(|s| (s.name.as_str(), s)).collect();
            let mut next = node.output_columns.clone();
            for (port, variable) in node.output_variables.clone() {
                if let Some(shape) = by_variable.get(variable.as_str()) {
                    next.insert(port, shape.columns.clone());
                }
            }
            // skip persisting a value identical to the stored one, so the
            // synchronizer never reacts to its own writes
            if next == node.output_columns {
                false
            } else {
                node.output_columns = next;
                true
            }
        };

        if changed {
            self.persist_node(&node_id)?;
            self.notify(&node_id, Notification::ColumnsUpdated);
        }

        // refresh directly downstream input columns
        let outgoing: Vec<Edge> = self.graph.read().unwrap().outgoing(&node_id).into_iter().cloned().collect();
        for edge in outgoing {
            self.copy_columns(&edge.source, &edge.source_port, &edge.target, &edge.target_port);
        }
        Ok(())
    }

    // ---- helpers ----

    fn node_id_for_unit(
        &self,
        unit_id: &str,
    ) -> Result<NodeId> {
        if let Some(node_id) = self.units.read().unwrap().get(unit_id) {
            return Ok(node_id.clone());
        }
        // fall back to persisted metadata for units observed before this pass
        let meta = self.store.units().find(unit_id).map_err(|_| CellflowError::Node(format!("unit {} is not bound to a node", unit_id)))?;
        self.units.write().unwrap().insert(unit_id.to_string(), meta.node_id.clone());
        Ok(meta.node_id)
    }

    fn unit_id_for_node(
        &self,
        node_id: &str,
    ) -> Option<String> {
        self.units.read().unwrap().iter().find(|(_, n)| n.as_str() == node_id).map(|(u, _)| u.clone())
    }

    /// Allocate the next sequence number from the document counter.
    fn allocate_sequence(&self) -> Result<u32> {
        let mut document = self.store.find_or_create_document(&self.doc_id)?;
        document.sequence_counter += 1;
        document.timestamp = utils::time::time_millis();
        self.store.documents().update(&document)?;
        Ok(document.sequence_counter)
    }

    /// Rewrite the document-level edge list as a whole.
    fn persist_edges(&self) -> Result<()> {
        let mut document = self.store.find_or_create_document(&self.doc_id)?;
        document.edges = self.graph.read().unwrap().edges().to_vec();
        document.timestamp = utils::time::time_millis();
        self.store.documents().update(&document)?;
        Ok(())
    }

    /// Recompile one node and write the fragment back to its unit.
    fn recompile(
        &self,
        node_id: &str,
    ) -> Result<()> {
        let fragment = {
            let graph = self.graph.read().unwrap();
            let node = graph.get(node_id).ok_or(CellflowError::Node(format!("node {} not found", node_id)))?;
            let bindings = graph.input_bindings(node_id);
            compile_node(node, &bindings, &self.options)
        };

        let unit_id = self.unit_id_for_node(node_id).ok_or(CellflowError::Node(format!("node {} has no unit", node_id)))?;
        let mut meta = self.store.units().find(&unit_id)?;
        let graph = self.graph.read().unwrap();
        let node = graph.get(node_id).ok_or(CellflowError::Node(format!("node {} not found", node_id)))?;
        let source_changed = meta.source != fragment;
        meta = meta_from_node(&unit_id, &self.doc_id, node, &fragment, meta.execution_state);
        drop(graph);
        self.store.units().update(&meta)?;
        self.set_state(node_id, SyncState::Compiled);

        if source_changed {
            self.notify(node_id, Notification::SourceRegenerated);
        }
        Ok(())
    }

    /// Persist one node's metadata without touching its source.
    fn persist_node(
        &self,
        node_id: &str,
    ) -> Result<()> {
        let unit_id = self.unit_id_for_node(node_id).ok_or(CellflowError::Node(format!("node {} has no unit", node_id)))?;
        let mut meta = self.store.units().find(&unit_id)?;
        let graph = self.graph.read().unwrap();
        let node = graph.get(node_id).ok_or(CellflowError::Node(format!("node {} not found", node_id)))?;
        let source = meta.source.clone();
        meta = meta_from_node(&unit_id, &self.doc_id, node, &source, meta.execution_state);
        drop(graph);
        self.store.units().update(&meta)?;
        Ok(())
    }

    /// Re-derive one node's status and notify on change.
    fn refresh_status(
        &self,
        node_id: &str,
    ) {
        let execution_state = self.unit_id_for_node(node_id).and_then(|unit_id| self.store.units().find(&unit_id).ok()).and_then(|meta| meta.execution_state);

        let changed = {
            let mut graph = self.graph.write().unwrap();
            let incoming: Vec<Edge> = graph.incoming(node_id).into_iter().cloned().collect();
            let incoming_refs: Vec<&Edge> = incoming.iter().collect();
            let status = match graph.get(node_id) {
                Some(node) => resolve_status(node, &incoming_refs, execution_state),
                None => return,
            };
            match graph.get_mut(node_id) {
                Some(node) if node.status != status => {
                    node.status = status;
                    Some(status)
                }
                _ => None,
            }
        };

        if let Some(status) = changed {
            self.notify(node_id, Notification::StatusChanged(status));
        }
    }

    /// Copy the upstream port's output columns onto the target's input
    /// port, skipping the write when nothing changed.
    fn copy_columns(
        &self,
        source_id: &str,
        source_port: &str,
        target_id: &str,
        target_port: &str,
    ) {
        let changed = {
            let mut graph = self.graph.write().unwrap();
            let columns = graph.get(source_id).and_then(|n| n.output_columns.get(source_port)).cloned().unwrap_or_default();
            let Some(target) = graph.get_mut(target_id) else {
                return;
            };
            if target.input_columns.get(target_port).map(|c| c == &columns).unwrap_or(columns.is_empty()) {
                false
            } else {
                target.input_columns.insert(target_port.to_string(), columns);
                true
            }
        };
        if changed {
            self.notify(target_id, Notification::ColumnsUpdated);
        }
    }

    fn set_state(
        &self,
        node_id: &str,
        state: SyncState,
    ) {
        let previous = self.states.write().unwrap().insert(node_id.to_string(), state);
        if previous != Some(state) {
            trace!("node {} sync state -> {}", node_id, state.as_ref());
        }
    }

    fn notify(
        &self,
        node_id: &str,
        notification: Notification,
    ) {
        let _ = self.notifications.send(Event::new(&Message {
            doc_id: self.doc_id.clone(),
            node_id: node_id.to_string(),
            notification,
        }));
    }
}

/// Build the in-memory node from persisted metadata. Missing or malformed
/// fields default; this function never fails.
fn node_from_meta(meta: &UnitMeta) -> Node {
    let mut node = Node {
        id: meta.node_id.clone(),
        schema: meta.schema.clone(),
        values: meta.values.clone(),
        sequence_number: meta.sequence_number,
        output_variables: meta.output_variables.clone(),
        label: String::new(),
        position: meta.position,
        status: Default::default(),
        input_columns: HashMap::new(),
        output_columns: meta.output_columns.clone(),
    };
    node.label = infer_label(&node, &meta.source);
    node
}

fn meta_from_node(
    unit_id: &str,
    doc_id: &str,
    node: &Node,
    source: &str,
    execution_state: Option<ExecutionState>,
) -> UnitMeta {
    UnitMeta {
        id: unit_id.to_string(),
        doc_id: doc_id.to_string(),
        node_id: node.id.clone(),
        sequence_number: node.sequence_number,
        position: node.position,
        schema: node.schema.clone(),
        values: node.values.clone(),
        output_variables: node.output_variables.clone(),
        output_columns: node.output_columns.clone(),
        execution_state,
        source: source.to_string(),
        timestamp: utils::time::time_millis(),
    }
}
