//! Post-execution runtime introspection.
//!
//! After a unit finishes running, the introspector asks the runtime for
//! the column shapes of the node's output variables within a bounded
//! timeout. A late, failed, or superseded answer degrades to "no columns
//! yet" and never blocks the synchronization pass.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use tracing::debug;

use crate::{
    ShareLock,
    model::NodeId,
    runtime::{RuntimeClient, VariableShape},
};

pub struct Introspector {
    runtime: Arc<dyn RuntimeClient>,
    timeout: Duration,
    /// per-node request generation; a response whose generation no longer
    /// matches was superseded and is dropped
    generations: ShareLock<HashMap<NodeId, u64>>,
}

impl Introspector {
    pub fn new(
        runtime: Arc<dyn RuntimeClient>,
        timeout: Duration,
    ) -> Self {
        Self {
            runtime,
            timeout,
            generations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Query the shapes of one node's output variables.
    ///
    /// Returns `None` when the runtime timed out, failed, or a newer query
    /// for the same node started while this one was in flight.
    pub async fn introspect_node(
        &self,
        node_id: &str,
        variables: &[String],
    ) -> Option<Vec<VariableShape>> {
        if variables.is_empty() {
            return Some(Vec::new());
        }

        let generation = {
            let mut generations = self.generations.write().unwrap();
            let entry = generations.entry(node_id.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        let result = tokio::time::timeout(self.timeout, self.runtime.introspect(variables)).await;

        let current = self.generations.read().unwrap().get(node_id).copied().unwrap_or(0);
        if current != generation {
            debug!("introspection for node {} superseded, dropping result", node_id);
            return None;
        }

        match result {
            Ok(Ok(shapes)) => Some(shapes),
            Ok(Err(e)) => {
                debug!("introspection for node {} failed: {}", node_id, e);
                None
            }
            Err(_) => {
                debug!("introspection for node {} timed out after {:?}", node_id, self.timeout);
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Result, model::Column};
    use async_trait::async_trait;

    struct FixedRuntime {
        delay: Duration,
    }

    #[async_trait]
    impl RuntimeClient for FixedRuntime {
        async fn introspect(
            &self,
            variables: &[String],
        ) -> Result<Vec<VariableShape>> {
            tokio::time::sleep(self.delay).await;
            Ok(variables
                .iter()
                .map(|v| VariableShape {
                    name: v.clone(),
                    columns: vec![Column {
                        name: "a".to_string(),
                        dtype: "int64".to_string(),
                    }],
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_shapes_within_timeout() {
        let introspector = Introspector::new(
            Arc::new(FixedRuntime {
                delay: Duration::from_millis(0),
            }),
            Duration::from_millis(200),
        );
        let shapes = introspector.introspect_node("n1", &["n01_out".to_string()]).await.unwrap();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].name, "n01_out");
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_none() {
        let introspector = Introspector::new(
            Arc::new(FixedRuntime {
                delay: Duration::from_millis(500),
            }),
            Duration::from_millis(20),
        );
        assert!(introspector.introspect_node("n1", &["n01_out".to_string()]).await.is_none());
    }

    #[tokio::test]
    async fn test_superseded_query_is_dropped() {
        let introspector = Arc::new(Introspector::new(
            Arc::new(FixedRuntime {
                delay: Duration::from_millis(50),
            }),
            Duration::from_millis(500),
        ));

        let slow = introspector.clone();
        let first = tokio::spawn(async move { slow.introspect_node("n1", &["n01_out".to_string()]).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = introspector.introspect_node("n1", &["n01_out".to_string()]).await;

        assert!(first.await.unwrap().is_none());
        assert!(second.is_some());
    }
}
