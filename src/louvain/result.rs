use serde::Serialize;

use crate::graph::NodeId;

/// The outcome of a multi-level run.
///
/// Dendrogram entries are indexed by root graph node id and renumbered to
/// `0..k` per level. Only the final entry is kept unless intermediate
/// communities were requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LouvainResult {
    dendrograms: Vec<Vec<usize>>,
    modularities: Vec<f64>,
    community_counts: Vec<usize>,
    original_ids: Vec<usize>,
    intermediate: bool,
}

/// One row of the per-node result stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeCommunity {
    /// External id of the node, as it appeared in the input.
    pub node_id: usize,
    pub community: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermediate_communities: Option<Vec<usize>>,
}

impl LouvainResult {
    pub(crate) fn new(
        dendrograms: Vec<Vec<usize>>,
        modularities: Vec<f64>,
        community_counts: Vec<usize>,
        original_ids: Vec<usize>,
        intermediate: bool,
    ) -> Self {
        LouvainResult {
            dendrograms,
            modularities,
            community_counts,
            original_ids,
            intermediate,
        }
    }

    pub fn levels(&self) -> usize {
        self.modularities.len()
    }

    pub fn modularities(&self) -> &[f64] {
        &self.modularities
    }

    pub fn final_modularity(&self) -> f64 {
        self.modularities.last().copied().unwrap_or(0.0)
    }

    pub fn community_counts(&self) -> &[usize] {
        &self.community_counts
    }

    pub fn community_count(&self) -> usize {
        self.community_counts.last().copied().unwrap_or(0)
    }

    /// Final community per root node, empty when no level completed.
    pub fn communities(&self) -> &[usize] {
        self.dendrograms.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// The stored dendrogram entries: every level, or only the final one.
    pub fn dendrograms(&self) -> &[Vec<usize>] {
        &self.dendrograms
    }

    pub fn includes_intermediate_communities(&self) -> bool {
        self.intermediate
    }

    pub fn community_of(&self, node: NodeId) -> Option<usize> {
        self.communities().get(node).copied()
    }

    /// Community of `node` at every level, only available when intermediate
    /// communities were kept.
    pub fn community_history_of(&self, node: NodeId) -> Option<Vec<usize>> {
        if !self.intermediate || node >= self.original_ids.len() {
            return None;
        }
        Some(self.dendrograms.iter().map(|entry| entry[node]).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeCommunity> + '_ {
        let communities = self.communities();
        communities.iter().enumerate().map(move |(node, &community)| NodeCommunity {
            node_id: self.original_ids[node],
            community,
            intermediate_communities: self.community_history_of(node),
        })
    }
}
