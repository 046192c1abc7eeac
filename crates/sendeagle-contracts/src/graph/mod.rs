//! Host prompt graph: node id -> `{ class_type, inputs }`.
//!
//! The host record is not versioned, so parsing is lenient: entries that are
//! not objects are skipped and missing fields fall back to empty values.

mod lookup;

use indexmap::IndexMap;
use serde_json::{Map, Value};

pub use lookup::{NodeLookup, RoleLookup};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphNode {
    pub class_type: String,
    pub inputs: Map<String, Value>,
}

impl GraphNode {
    pub fn new(class_type: impl Into<String>, inputs: Map<String, Value>) -> Self {
        Self {
            class_type: class_type.into(),
            inputs,
        }
    }

    pub fn has_input(&self, key: &str) -> bool {
        self.inputs.contains_key(key)
    }

    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.inputs.get(key).and_then(Value::as_str)
    }

    /// Non-negative integer input over the full `u64` range. Floats are
    /// truncated and numeric strings are parsed; negatives, links and other
    /// shapes yield `None`.
    pub fn input_u64(&self, key: &str) -> Option<u64> {
        match self.inputs.get(key)? {
            Value::Number(number) => number.as_u64().or_else(|| {
                number
                    .as_f64()
                    .filter(|value| *value >= 0.0 && *value < u64::MAX as f64)
                    .map(|value| value as u64)
            }),
            Value::String(text) => text.trim().parse::<u64>().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeGraph {
    nodes: IndexMap<String, GraphNode>,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: &Value) -> Self {
        let mut graph = Self::new();
        let Some(entries) = value.as_object() else {
            return graph;
        };
        for (id, raw) in entries {
            let Some(node) = raw.as_object() else {
                continue;
            };
            let class_type = node
                .get("class_type")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let inputs = node
                .get("inputs")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            graph.insert(id.clone(), GraphNode::new(class_type, inputs));
        }
        graph
    }

    pub fn insert(&mut self, id: impl Into<String>, node: GraphNode) {
        self.nodes.insert(id.into(), node);
    }

    pub fn get(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GraphNode)> {
        self.nodes.iter().map(|(id, node)| (id.as_str(), node))
    }

    /// Follows a `[node_id, output_slot]` link stored under `key` on `node`.
    pub fn linked_node(&self, node: &GraphNode, key: &str) -> Option<&GraphNode> {
        let link = node.inputs.get(key)?.as_array()?;
        let target = match link.first()? {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        self.get(&target)
    }
}
