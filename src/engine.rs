//! Synchronization engine - the main entry point for Cellflow.
//!
//! The engine manages the lifecycle of document synchronizers, including:
//! - Accepting document and runtime events through a single bounded queue
//! - Running one synchronization pass at a time, in delivery order
//! - Managing the notification channel and storage
//! - Graceful shutdown coordination

use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::runtime::Runtime;
use tracing::info;

use crate::{
    CellflowError, Config, Result,
    ShareLock,
    catalog::Catalog,
    channel::Channel,
    common::{BroadcastQueue, Queue, Shutdown},
    events::{Event, Message, SyncEvent},
    model::Graph,
    runtime::RuntimeClient,
    store::{Store, StoreBackend},
    sync::Synchronizer,
};

/// The main synchronization engine.
///
/// Engine is the central coordinator for Cellflow, responsible for:
/// - Managing the tokio runtime for async execution
/// - Consuming the synchronization event queue with a single writer
/// - Holding one synchronizer per open document
/// - Broadcasting notifications toward the editing surface
///
/// # Example
///
/// ```rust,ignore
/// let engine = EngineBuilder::new().catalog(catalog).build()?;
/// engine.launch();
///
/// engine.submit("doc1", SyncEvent::UnitAdded { unit_id: "u1".to_string() })?;
/// let source = engine.export("doc1")?;
///
/// engine.shutdown();
/// ```
pub struct Engine {
    config: Config,
    /// Notification channel toward the editing surface.
    channel: Arc<Channel>,
    /// Persistent storage for unit and document metadata.
    store: Arc<Store>,
    catalog: Arc<dyn Catalog>,
    runtime_client: Arc<dyn RuntimeClient>,
    /// One synchronizer per open document, created on first event.
    documents: ShareLock<HashMap<String, Arc<Synchronizer>>>,
    /// Bounded queue feeding the single synchronization loop.
    sync_queue: Arc<Queue<(String, SyncEvent)>>,

    /// Flag indicating if the engine is running.
    running: Arc<AtomicBool>,
    /// Tokio runtime for async task execution.
    runtime: Arc<Runtime>,
    /// Shutdown coordinator for graceful termination.
    shutdown: Arc<Shutdown>,
}

impl Engine {
    pub(crate) fn new(
        config: Config,
        runtime: Arc<Runtime>,
        backend: Box<dyn StoreBackend>,
        catalog: Arc<dyn Catalog>,
        runtime_client: Arc<dyn RuntimeClient>,
    ) -> Self {
        let store = Store::new();
        backend.init(&store);
        let store = Arc::new(store);

        let channel = Arc::new(Channel::new(runtime.clone()));
        let sync_queue = Queue::new(config.sync_queue_size);

        Self {
            config,
            channel,
            store,
            catalog,
            runtime_client,
            documents: Arc::new(RwLock::new(HashMap::new())),
            sync_queue,
            running: Arc::new(AtomicBool::new(false)),
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Starts the engine and begins processing events.
    ///
    /// Starts the notification channel first, then the synchronization
    /// loop, so no notification produced by an early event is missed.
    pub fn launch(&self) {
        if self.running.swap(true, Ordering::Relaxed) {
            return;
        }

        self.channel.listen();

        let sync_queue = self.sync_queue.clone();
        let shutdown = self.shutdown.clone();
        let documents = self.documents.clone();
        let store = self.store.clone();
        let catalog = self.catalog.clone();
        let runtime_client = self.runtime_client.clone();
        let notifications = self.channel.queue();
        let config = self.config.clone();

        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Some((doc_id, event)) = sync_queue.next_async() => {
                        let synchronizer = synchronizer_for(&documents, &doc_id, &store, &catalog, &runtime_client, &notifications, &config);
                        synchronizer.handle(event).await;
                    }
                }
            }
        });
        info!("engine launched");
    }

    /// Gracefully shuts down the engine.
    ///
    /// Signals the synchronization loop and the notification channel to
    /// stop. Events still queued are dropped.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        self.shutdown.shutdown();
        self.channel.shutdown();
        info!("engine shut down");
    }

    /// Submit one synchronization event for a document.
    ///
    /// Events are processed strictly in submission order, one at a time.
    pub fn submit(
        &self,
        doc_id: &str,
        event: SyncEvent,
    ) -> Result<()> {
        if !self.running.load(Ordering::Relaxed) {
            return Err(CellflowError::Engine("engine is not running".to_string()));
        }
        self.sync_queue.send((doc_id.to_string(), event))
    }

    /// Snapshot of a document's current in-memory graph.
    pub fn graph(
        &self,
        doc_id: &str,
    ) -> Graph {
        self.synchronizer(doc_id).graph()
    }

    /// Batch-export a document's whole graph as a standalone program.
    pub fn export(
        &self,
        doc_id: &str,
    ) -> Result<String> {
        self.synchronizer(doc_id).export()
    }

    /// Returns a reference to the notification channel.
    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    /// Returns a reference to the metadata store.
    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    fn synchronizer(
        &self,
        doc_id: &str,
    ) -> Arc<Synchronizer> {
        synchronizer_for(&self.documents, doc_id, &self.store, &self.catalog, &self.runtime_client, &self.channel.queue(), &self.config)
    }
}

/// Fetch the document's synchronizer, creating it on first access.
fn synchronizer_for(
    documents: &ShareLock<HashMap<String, Arc<Synchronizer>>>,
    doc_id: &str,
    store: &Arc<Store>,
    catalog: &Arc<dyn Catalog>,
    runtime_client: &Arc<dyn RuntimeClient>,
    notifications: &Arc<BroadcastQueue<Event<Message>>>,
    config: &Config,
) -> Arc<Synchronizer> {
    if let Some(synchronizer) = documents.read().unwrap().get(doc_id) {
        return synchronizer.clone();
    }
    let mut documents = documents.write().unwrap();
    documents
        .entry(doc_id.to_string())
        .or_insert_with(|| Arc::new(Synchronizer::new(doc_id, store.clone(), catalog.clone(), runtime_client.clone(), notifications.clone(), config)))
        .clone()
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use crate::{
        EngineBuilder,
        catalog::MemCatalog,
        channel::{ChannelOptions, ChannelSubscription},
        events::Notification,
        model::{NodeSchema, Port},
    };

    use super::*;

    fn catalog() -> Arc<MemCatalog> {
        let catalog = MemCatalog::new();
        catalog.register(NodeSchema {
            function_id: "pkg.load".to_string(),
            name: "Load".to_string(),
            outputs: vec![Port {
                name: "out".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        Arc::new(catalog)
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_submit_requires_running_engine() {
        let engine = EngineBuilder::new().catalog(catalog()).build().unwrap();
        let err = engine.submit("doc1", SyncEvent::UnitAdded { unit_id: "u1".to_string() }).unwrap_err();
        assert!(matches!(err, CellflowError::Engine(_)));
        engine.shutdown();
    }

    #[test]
    fn test_events_flow_through_to_store() {
        let engine = EngineBuilder::new().catalog(catalog()).build().unwrap();
        engine.launch();

        engine.submit("doc1", SyncEvent::UnitAdded { unit_id: "u1".to_string() }).unwrap();
        engine
            .submit(
                "doc1",
                SyncEvent::NodeConfigured {
                    unit_id: "u1".to_string(),
                    function_id: "pkg.load".to_string(),
                },
            )
            .unwrap();

        let store = engine.store();
        assert!(wait_until(|| store.units().find("u1").map(|m| m.source.contains("n01_out = pkg.load()")).unwrap_or(false)));

        let export = engine.export("doc1").unwrap();
        assert!(export.contains("def run_pipeline():"));
        engine.shutdown();
    }

    #[test]
    fn test_channel_delivers_filtered_notifications() {
        let engine = EngineBuilder::new().catalog(catalog()).build().unwrap();
        engine.launch();

        let seen: ShareLock<Vec<(String, String)>> = Arc::new(RwLock::new(Vec::new()));
        let sink = seen.clone();
        ChannelSubscription::channel(engine.channel(), ChannelOptions::with_doc_id("doc1".to_string())).on_notification(move |e| {
            sink.write().unwrap().push((e.doc_id.clone(), e.notification.str().to_string()));
        });

        engine.submit("doc1", SyncEvent::UnitAdded { unit_id: "u1".to_string() }).unwrap();
        engine.submit("other", SyncEvent::UnitAdded { unit_id: "u9".to_string() }).unwrap();
        engine
            .submit(
                "doc1",
                SyncEvent::NodeConfigured {
                    unit_id: "u1".to_string(),
                    function_id: "pkg.load".to_string(),
                },
            )
            .unwrap();

        assert!(wait_until(|| seen.read().unwrap().iter().any(|(_, n)| n == Notification::SourceRegenerated.str())));
        // both documents were processed, but only doc1 passed the filter
        assert!(wait_until(|| engine.store().units().exists("u9").unwrap_or(false)));
        assert!(seen.read().unwrap().iter().all(|(doc, _)| doc == "doc1"));
        engine.shutdown();
    }
}
