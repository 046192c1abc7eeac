use crate::graph::{GraphNode, NodeGraph, NodeLookup, RoleLookup};
use crate::params::RequestParams;

use super::GenerationInfo;

const MAX_LINK_HOPS: usize = 8;

/// Builds [`GenerationInfo`] from the host prompt graph.
pub struct MetadataExtractor {
    checkpoint: Box<dyn NodeLookup>,
    sampler: Box<dyn NodeLookup>,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::with_lookups(RoleLookup::checkpoint(), RoleLookup::sampler())
    }
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookups<C, S>(checkpoint: C, sampler: S) -> Self
    where
        C: NodeLookup + 'static,
        S: NodeLookup + 'static,
    {
        Self {
            checkpoint: Box::new(checkpoint),
            sampler: Box::new(sampler),
        }
    }

    pub fn extract(&self, params: &RequestParams, width: u32, height: u32) -> GenerationInfo {
        let graph = params
            .prompt
            .as_ref()
            .map(NodeGraph::from_value)
            .unwrap_or_default();
        self.extract_from_graph(&graph, &params.positive, &params.negative, width, height)
    }

    /// Explicit prompt text wins; otherwise the sampler's conditioning links
    /// are followed back to a text node.
    pub fn extract_from_graph(
        &self,
        graph: &NodeGraph,
        positive: &str,
        negative: &str,
        width: u32,
        height: u32,
    ) -> GenerationInfo {
        let sampler = self.sampler.find(graph);
        let seed = sampler
            .and_then(|node| node.input_u64("seed").or_else(|| node.input_u64("noise_seed")))
            .unwrap_or_default();
        let steps = sampler
            .and_then(|node| node.input_u64("steps"))
            .unwrap_or_default();

        let model_name = self
            .checkpoint
            .find(graph)
            .and_then(|node| node.input_str("ckpt_name"))
            .or_else(|| {
                sampler.and_then(|node| {
                    follow_links(graph, node, "model", "model", |hop| {
                        hop.input_str("ckpt_name").or_else(|| hop.input_str("unet_name"))
                    })
                })
            })
            .unwrap_or_default()
            .to_string();

        GenerationInfo {
            model_name,
            seed,
            steps,
            width,
            height,
            positive: prompt_text(graph, sampler, positive, "positive"),
            negative: prompt_text(graph, sampler, negative, "negative"),
        }
    }
}

fn prompt_text(graph: &NodeGraph, sampler: Option<&GraphNode>, explicit: &str, key: &str) -> String {
    if !explicit.trim().is_empty() {
        return explicit.to_string();
    }
    sampler
        .and_then(|node| {
            follow_links(graph, node, key, "conditioning", |hop| hop.input_str("text"))
        })
        .unwrap_or_default()
        .to_string()
}

/// Walks `first_key` from `start`, then `next_key` on each hop, until `pick`
/// yields a value.
fn follow_links<'g, T>(
    graph: &'g NodeGraph,
    start: &'g GraphNode,
    first_key: &str,
    next_key: &str,
    pick: impl Fn(&'g GraphNode) -> Option<T>,
) -> Option<T> {
    let mut current = graph.linked_node(start, first_key)?;
    for _ in 0..MAX_LINK_HOPS {
        if let Some(found) = pick(current) {
            return Some(found);
        }
        current = graph.linked_node(current, next_key)?;
    }
    None
}
