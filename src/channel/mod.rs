//! Notification channel toward the editing surface.
//!
//! Subscribers register handlers filtered by glob patterns on the document
//! id and node id, so a node editor pane can watch one node while the
//! canvas watches the whole document.

use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use tokio::runtime::Runtime;

use crate::{
    ShareLock,
    common::{BroadcastQueue, Shutdown},
    events::{Event, Message},
};

macro_rules! dispatch_event {
    ($handles:expr, $(&$item:ident), +) => {
        let handlers = $handles.read().unwrap();
        for handle in handlers.iter() {
            (handle)($(&$item),+);
        }
    };
}

macro_rules! dispatch_event_async {
    ($handles:expr, $(&$item:ident), +) => {
        let handles = $handles.clone();

        tokio::spawn(async move {
            let handlers = handles.read().unwrap().clone();
            for handle in handlers.iter() {
                (handle)($(&$item),+).await;
            }
        });
    };
}

const NOTIFICATION_QUEUE_SIZE: usize = 2048;

pub type NotificationHandle = Arc<dyn Fn(&Event<Message>) + Send + Sync>;
pub type NotificationHandleAsync = Arc<dyn Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// use the glob pattern to match the document id
    /// eg. doc1*
    pub doc_id: String,

    /// use the glob pattern to match the node id
    /// eg. nid1*
    pub node_id: String,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            doc_id: "*".to_string(),
            node_id: "*".to_string(),
        }
    }
}

#[allow(unused)]
impl ChannelOptions {
    pub fn new(
        doc_id: String,
        node_id: String,
    ) -> Self {
        Self {
            doc_id,
            node_id,
        }
    }

    pub fn with_doc_id(doc_id: String) -> Self {
        Self {
            doc_id,
            node_id: "*".to_string(),
        }
    }

    pub fn with_node_id(node_id: String) -> Self {
        Self {
            doc_id: "*".to_string(),
            node_id,
        }
    }
}

#[derive(Clone)]
pub struct Channel {
    queue: Arc<BroadcastQueue<Event<Message>>>,

    handlers: ShareLock<Vec<NotificationHandle>>,
    handlers_async: ShareLock<Vec<NotificationHandleAsync>>,

    runtime: Arc<Runtime>,
    shutdown: Arc<Shutdown>,
}

impl Channel {
    pub(crate) fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            queue: BroadcastQueue::new(NOTIFICATION_QUEUE_SIZE),
            handlers: Arc::new(RwLock::new(Vec::new())),
            handlers_async: Arc::new(RwLock::new(Vec::new())),
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub(crate) fn queue(&self) -> Arc<BroadcastQueue<Event<Message>>> {
        self.queue.clone()
    }

    pub(crate) fn listen(&self) {
        let mut queue = self.queue.subscribe();
        let handlers = self.handlers.clone();
        let handlers_async = self.handlers_async.clone();

        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Ok(e) = queue.recv() => {
                        let evt = e.clone();
                        dispatch_event!(handlers, &evt);
                        dispatch_event_async!(handlers_async, &e);
                    }
                }
            }
        });
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

#[derive(Clone)]
pub struct ChannelSubscription {
    channel: Arc<Channel>,

    glob: (globset::GlobMatcher, globset::GlobMatcher),
}

#[allow(unused)]
impl ChannelSubscription {
    pub fn channel(
        channel: Arc<Channel>,
        options: ChannelOptions,
    ) -> Self {
        Self {
            channel,
            glob: (
                globset::Glob::new(&options.doc_id).unwrap().compile_matcher(),
                globset::Glob::new(&options.node_id).unwrap().compile_matcher(),
            ),
        }
    }

    pub fn on_notification(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.handlers.write().unwrap().push(Arc::new(move |e| {
            if is_match(&glob, e) {
                f(e);
            }
        }));
    }

    pub fn on_rejected(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.handlers.write().unwrap().push(Arc::new(move |e| {
            if e.notification.is_rejected() && is_match(&glob, e) {
                f(e);
            }
        }));
    }

    pub fn on_notification_async<F>(
        &self,
        f: F,
    ) where
        F: Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let glob = self.glob.clone();

        self.channel.handlers_async.write().unwrap().push(Arc::new(move |e| {
            if is_match(&glob, e) {
                f(e)
            } else {
                Box::pin(async {})
            }
        }));
    }
}

fn is_match(
    glob: &(globset::GlobMatcher, globset::GlobMatcher),
    e: &Event<Message>,
) -> bool {
    let (pat_doc, pat_node) = glob;
    pat_doc.is_match(&e.doc_id) && pat_node.is_match(&e.node_id)
}
