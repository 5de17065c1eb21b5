use crate::adjacency::Adjacency;
use crate::error::{Error, Result};
use crate::graph::{NodeId, WeightedGraph};
use crate::util::try_filled_vec;

pub mod generator;
pub(crate) mod importer;

/// Marks a community id that no working-graph node carries.
const NOT_MAPPED: usize = usize::MAX;

/// Translation between the community ids of a level and the dense node ids
/// of the graph coarsened from them.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    to_mapped: Vec<usize>, // Sparse, indexed by community id.
    to_original: Vec<usize>, // Dense, indexed by coarse node id.
}

impl IdMap {
    pub(crate) fn with_bound(max_original_id: usize) -> Result<IdMap> {
        let len = max_original_id.checked_add(1).ok_or(Error::AllocationFailed { len: usize::MAX })?;
        Ok(IdMap {
            to_mapped: try_filled_vec(len, NOT_MAPPED)?,
            to_original: Vec::new(),
        })
    }

    // First sight assigns the next free coarse id. `original` must be within the bound.
    #[inline]
    pub(crate) fn add(&mut self, original: usize) -> NodeId {
        let mapped = self.to_mapped[original];
        if mapped != NOT_MAPPED {
            return mapped;
        }
        let mapped = self.to_original.len();
        self.to_mapped[original] = mapped;
        self.to_original.push(original);
        mapped
    }

    #[inline]
    pub(crate) fn bound(&self) -> usize {
        self.to_mapped.len()
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.to_original.len()
    }

    #[inline]
    pub fn to_mapped(&self, original: usize) -> Option<NodeId> {
        match self.to_mapped.get(original) {
            Some(&mapped) if mapped != NOT_MAPPED => Some(mapped),
            _ => None,
        }
    }

    #[inline]
    pub fn to_original(&self, mapped: NodeId) -> usize {
        self.to_original[mapped]
    }
}

/// A coarsened graph: one node per community of the previous level, the
/// summed relationship weights between them, and self-loops carrying the
/// weight inside each community.
#[derive(Debug, Default)]
pub struct SubGraph {
    adjacency: Adjacency,
    id_map: IdMap,
}

impl SubGraph {
    pub(crate) fn new(adjacency: Adjacency, id_map: IdMap) -> SubGraph {
        SubGraph { adjacency, id_map }
    }

    pub fn id_map(&self) -> &IdMap {
        &self.id_map
    }

    pub fn relationship_count(&self) -> usize {
        self.adjacency.relationship_count()
    }

    pub fn total_weight(&self) -> f64 {
        self.adjacency.total_weight()
    }

    pub fn is_compact(&self) -> bool {
        self.adjacency.is_compact()
    }
}

impl WeightedGraph for SubGraph {
    #[inline]
    fn node_count(&self) -> usize {
        self.adjacency.node_count()
    }

    #[inline]
    fn degree(&self, node: NodeId) -> usize {
        self.adjacency.degree(node)
    }

    #[inline]
    fn for_each_relationship<F>(&self, node: NodeId, mut visit: F)
    where
        F: FnMut(NodeId, NodeId, f64) -> bool,
    {
        self.adjacency.for_each(node, |target, weight| visit(node, target, weight));
    }

    fn to_mapped_node_id(&self, original: NodeId) -> Option<NodeId> {
        self.id_map.to_mapped(original)
    }

    fn to_original_node_id(&self, mapped: NodeId) -> NodeId {
        self.id_map.to_original(mapped)
    }

    fn release_topology(&mut self) {
        self.adjacency.release();
    }
}
