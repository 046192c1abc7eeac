use super::{GraphNode, NodeGraph};

/// Locates the node that plays a given role (checkpoint loader, sampler, ...)
/// in a host graph.
pub trait NodeLookup {
    fn find<'g>(&self, graph: &'g NodeGraph) -> Option<&'g GraphNode>;
}

/// Matches by `class_type` substring first, then falls back to any node that
/// carries the expected inputs. Each input group is satisfied by any one of
/// its keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleLookup {
    class_hints: Vec<String>,
    hinted_inputs: Vec<Vec<String>>,
    fallback_inputs: Vec<Vec<String>>,
}

impl RoleLookup {
    pub fn new(class_hints: &[&str], hinted_inputs: &[&[&str]], fallback_inputs: &[&[&str]]) -> Self {
        Self {
            class_hints: class_hints.iter().map(|hint| hint.to_string()).collect(),
            hinted_inputs: to_groups(hinted_inputs),
            fallback_inputs: to_groups(fallback_inputs),
        }
    }

    pub fn checkpoint() -> Self {
        Self::new(&["CheckpointLoader"], &[&["ckpt_name"]], &[&["ckpt_name"]])
    }

    pub fn sampler() -> Self {
        Self::new(
            &["Sampler"],
            &[&["steps"]],
            &[&["seed", "noise_seed"], &["steps"]],
        )
    }

    fn matches_hint(&self, node: &GraphNode) -> bool {
        self.class_hints
            .iter()
            .any(|hint| node.class_type.contains(hint.as_str()))
    }
}

impl NodeLookup for RoleLookup {
    fn find<'g>(&self, graph: &'g NodeGraph) -> Option<&'g GraphNode> {
        if let Some(node) = graph
            .iter()
            .map(|(_, node)| node)
            .find(|node| self.matches_hint(node) && has_groups(node, &self.hinted_inputs))
        {
            return Some(node);
        }
        if self.fallback_inputs.is_empty() {
            return None;
        }
        graph
            .iter()
            .map(|(_, node)| node)
            .find(|node| has_groups(node, &self.fallback_inputs))
    }
}

fn to_groups(groups: &[&[&str]]) -> Vec<Vec<String>> {
    groups
        .iter()
        .map(|group| group.iter().map(|key| key.to_string()).collect())
        .collect()
}

fn has_groups(node: &GraphNode, groups: &[Vec<String>]) -> bool {
    groups
        .iter()
        .all(|group| group.iter().any(|key| node.has_input(key)))
}
