use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Property the storage layer uses to record its partition strategy.
/// Never shown to the user.
pub const PARTITION_PROPERTY: &str = "_partition";

/// A directed, typed relationship between two graph nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Edge {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub from: String,
    pub to: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    #[cfg_attr(feature = "ts", ts(type = "Record<string, unknown>"))]
    pub properties: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Edge {
    /// Properties the user may see and edit, in key order.
    pub fn visible_properties(&self) -> Vec<(&str, &Value)> {
        self.properties
            .iter()
            .filter(|(key, _)| key.as_str() != PARTITION_PROPERTY)
            .map(|(key, value)| (key.as_str(), value))
            .collect()
    }

    pub fn set_property(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(key.to_string(), value.into())
    }

    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    /// Short "from -> to" description, using the label when present.
    pub fn display_name(&self) -> String {
        match self.label {
            Some(ref label) => format!("{} -[{}]-> {}", self.from, label, self.to),
            None => format!("{} -> {}", self.from, self.to),
        }
    }
}

/// The local copy of a graph's edges within one partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub partition: String,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            edges: Vec::new(),
        }
    }

    /// Remove an edge by id, keeping the order of the rest.
    pub fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let index = self.edges.iter().position(|e| e.id == id)?;
        Some(self.edges.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn edge(id: &str) -> Edge {
        serde_json::from_value(json!({
            "id": id,
            "label": "owns",
            "from": "n1",
            "to": "n2",
            "properties": { "_partition": "tenant-a", "since": "2021", "weight": 3 }
        }))
        .expect("valid edge json")
    }

    #[test]
    fn test_visible_properties_hide_partition() {
        let e = edge("e1");
        let keys: Vec<&str> = e.visible_properties().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["since", "weight"]);
    }

    #[test]
    fn test_null_properties_become_empty() {
        let e: Edge =
            serde_json::from_value(json!({ "id": "e1", "from": "a", "to": "b", "properties": null }))
                .expect("valid edge json");
        assert!(e.properties.is_empty());
        assert!(e.label.is_none());

        let e: Edge = serde_json::from_value(json!({ "id": "e2", "from": "a", "to": "b" }))
            .expect("valid edge json");
        assert!(e.properties.is_empty());
    }

    #[test]
    fn test_property_edits() {
        let mut e = edge("e1");
        assert_eq!(e.set_property("color", "red"), None);
        assert_eq!(e.set_property("color", "blue"), Some(json!("red")));
        assert_eq!(e.remove_property("color"), Some(json!("blue")));
        assert_eq!(e.remove_property("color"), None);
    }

    #[test]
    fn test_display_name() {
        let mut e = edge("e1");
        assert_eq!(e.display_name(), "n1 -[owns]-> n2");
        e.label = None;
        assert_eq!(e.display_name(), "n1 -> n2");
    }

    #[test]
    fn test_graph_remove_edge() {
        let mut graph = Graph::new("tenant-a");
        graph.edges = vec![edge("e1"), edge("e2"), edge("e3")];

        assert_eq!(graph.remove_edge("e2").map(|e| e.id), Some("e2".to_string()));
        assert!(graph.remove_edge("e2").is_none());
        let ids: Vec<&str> = graph.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e3"]);
    }
}
