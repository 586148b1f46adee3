//! Edge edit operations.
//!
//! Everything a front end needs to show and change one edge, expressed
//! purely through `ApiClient::{get, post, del}`. Local edits are applied
//! only after the server accepted them, so a rejected save leaves the
//! caller's edge untouched.

use serde_json::Value;
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError};
use crate::models::{Edge, Graph};

const EDGE_GET: &str = "edge-get";
const EDGE_POST: &str = "edge-post";
const EDGE_DELETE: &str = "edge-delete";

pub struct EdgeEditor {
    api: ApiClient,
    partition: String,
}

impl EdgeEditor {
    pub fn new(api: ApiClient, partition: impl Into<String>) -> Self {
        Self {
            api,
            partition: partition.into(),
        }
    }

    pub async fn fetch(&self, edge_id: &str) -> Result<Edge, ApiError> {
        self.api
            .get_json(EDGE_GET, Some(edge_id), Some(self.partition.as_str()), true)
            .await
    }

    /// Store the whole edge.
    pub async fn save(&self, edge: &Edge) -> Result<Value, ApiError> {
        debug!(edge_id = %edge.id, "Saving edge");
        self.api.post(EDGE_POST, edge, &self.partition).await
    }

    pub async fn set_property(
        &self,
        edge: &mut Edge,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<Value, ApiError> {
        if key.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "property name must not be empty".to_string(),
            ));
        }
        let mut updated = edge.clone();
        updated.set_property(key, value);
        let result = self.save(&updated).await?;
        *edge = updated;
        Ok(result)
    }

    pub async fn remove_property(&self, edge: &mut Edge, key: &str) -> Result<Value, ApiError> {
        let mut updated = edge.clone();
        if updated.remove_property(key).is_none() {
            debug!(edge_id = %edge.id, key = key, "Property not present, saving anyway");
        }
        let result = self.save(&updated).await?;
        *edge = updated;
        Ok(result)
    }

    pub async fn delete_edge(&self, edge_id: &str) -> Result<Value, ApiError> {
        info!(edge_id = edge_id, partition = %self.partition, "Deleting edge");
        self.api.del(EDGE_DELETE, edge_id, &self.partition).await
    }

    /// Delete on the server under the graph's own partition, then drop the
    /// edge from the local graph.
    pub async fn delete(&self, graph: &mut Graph, edge_id: &str) -> Result<Option<Edge>, ApiError> {
        info!(edge_id = edge_id, partition = %graph.partition, "Deleting edge from graph");
        self.api.del(EDGE_DELETE, edge_id, &graph.partition).await?;
        Ok(graph.remove_edge(edge_id))
    }
}
