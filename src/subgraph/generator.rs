use log::debug;
use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::config::IMPORT_BUFFER_SIZE;
use crate::error::{Error, Result};
use crate::graph::{NodeId, WeightedGraph};
use crate::subgraph::importer::{RelationshipAccumulator, RelationshipImporter};
use crate::subgraph::{IdMap, SubGraph};

/// Builds the next working graph from a community assignment: every
/// community becomes one node, relationships between communities are
/// summed and the weight inside a community becomes a self-loop.
pub struct SubGraphGenerator<'p> {
    pool: &'p ThreadPool,
    concurrency: usize,
    buffer_size: usize,
}

impl<'p> SubGraphGenerator<'p> {
    pub fn new(pool: &'p ThreadPool, concurrency: usize) -> Self {
        SubGraphGenerator {
            pool,
            concurrency: concurrency.max(1),
            buffer_size: IMPORT_BUFFER_SIZE,
        }
    }

    /// Override the number of relationships buffered per importer.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Coarsen `graph` along `communities`.
    pub fn generate<G: WeightedGraph>(&self, graph: &G, communities: &[usize]) -> Result<SubGraph> {
        let max_community_id = communities.iter().copied().max().unwrap_or(0);
        let id_map = self.create_node_phase(graph.node_count(), max_community_id, communities)?;
        self.relationship_phase(graph, communities, id_map)
    }

    /// Assign a dense coarse id to every community, in the order the
    /// communities are first seen when scanning nodes `0..node_count`.
    pub fn create_node_phase(
        &self,
        node_count: usize,
        max_community_id: usize,
        communities: &[usize],
    ) -> Result<IdMap> {
        let mut id_map = IdMap::with_bound(max_community_id)?;
        for node in 0..node_count {
            let community = *communities.get(node).ok_or(Error::NodeOutOfBounds {
                node,
                node_count: communities.len(),
            })?;
            if community >= id_map.bound() {
                return Err(Error::CommunityOutOfBounds {
                    node,
                    community,
                    bound: max_community_id,
                });
            }
            id_map.add(community);
        }
        Ok(id_map)
    }

    /// Translate every relationship of `graph` to its coarse endpoints and
    /// sum the weights per coarse pair.
    ///
    /// Each undirected relationship is visible from both endpoints, so both
    /// coarse directions get inserted and the result stays symmetric.
    pub fn relationship_phase<G: WeightedGraph>(
        &self,
        graph: &G,
        communities: &[usize],
        id_map: IdMap,
    ) -> Result<SubGraph> {
        let node_count = graph.node_count();
        let accumulator = Mutex::new(RelationshipAccumulator::new(id_map.node_count())?);

        let batch_size = ((node_count + self.concurrency - 1) / self.concurrency).max(1);
        let batches: Vec<(NodeId, NodeId)> = (0..node_count)
            .step_by(batch_size)
            .map(|start| (start, (start + batch_size).min(node_count)))
            .collect();

        self.pool.install(|| {
            batches.into_par_iter().try_for_each(|(start, end)| {
                let mut importer = RelationshipImporter::new(&accumulator, self.buffer_size);
                for node in start..end {
                    let source = coarse_id(&id_map, communities, node)?;
                    let mut failure = None;
                    graph.for_each_relationship(node, |_, target, weight| {
                        if target >= node_count {
                            failure = Some(Error::NodeOutOfBounds { node: target, node_count });
                            return false;
                        }
                        match coarse_id(&id_map, communities, target) {
                            Ok(coarse_target) => {
                                importer.add(source, coarse_target, weight);
                                true
                            }
                            Err(e) => {
                                failure = Some(e);
                                false
                            }
                        }
                    });
                    if let Some(e) = failure {
                        return Err(e);
                    }
                }
                importer.flush();
                Ok(())
            })
        })?;

        let adjacency = accumulator.into_inner().into_adjacency();
        debug!(
            "Coarsened {} nodes into {} nodes with {} relationships.",
            node_count,
            adjacency.node_count(),
            adjacency.relationship_count()
        );
        Ok(SubGraph::new(adjacency, id_map))
    }
}

#[inline]
fn coarse_id(id_map: &IdMap, communities: &[usize], node: NodeId) -> Result<NodeId> {
    let community = communities[node];
    id_map.to_mapped(community).ok_or(Error::CommunityOutOfBounds {
        node,
        community,
        bound: id_map.bound().saturating_sub(1),
    })
}
