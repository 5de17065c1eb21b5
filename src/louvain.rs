//! The multi-level driver.
//!
//! Each level optimizes modularity on the working graph, projects the
//! result back onto the root nodes and coarsens the working graph along
//! the communities found. The root graph is level 0's working graph.

use std::collections::HashMap;

use log::{debug, info, warn};
use rayon::ThreadPoolBuilder;

use crate::config::LouvainConfig;
use crate::error::{Error, Result};
use crate::graph::{NodeId, WeightedGraph};
use crate::modularity::ModularityOptimization;
use crate::subgraph::generator::SubGraphGenerator;
use crate::subgraph::SubGraph;
use crate::termination::TerminationFlag;
use crate::util::{count_distinct, normalize, try_filled_vec};

pub mod result;

pub use result::{LouvainResult, NodeCommunity};

pub struct Louvain<G> {
    graph: G,
    config: LouvainConfig,
    termination: TerminationFlag,
}

/// The graph a level runs on: the root graph or a coarsened one.
enum WorkingGraph<'g, G> {
    Root(&'g G),
    Sub(SubGraph),
}

impl<'g, G: WeightedGraph> WeightedGraph for WorkingGraph<'g, G> {
    #[inline]
    fn node_count(&self) -> usize {
        match self {
            WorkingGraph::Root(graph) => graph.node_count(),
            WorkingGraph::Sub(graph) => graph.node_count(),
        }
    }

    #[inline]
    fn degree(&self, node: NodeId) -> usize {
        match self {
            WorkingGraph::Root(graph) => graph.degree(node),
            WorkingGraph::Sub(graph) => graph.degree(node),
        }
    }

    #[inline]
    fn for_each_relationship<F>(&self, node: NodeId, visit: F)
    where
        F: FnMut(NodeId, NodeId, f64) -> bool,
    {
        match self {
            WorkingGraph::Root(graph) => graph.for_each_relationship(node, visit),
            WorkingGraph::Sub(graph) => graph.for_each_relationship(node, visit),
        }
    }

    fn to_mapped_node_id(&self, original: NodeId) -> Option<NodeId> {
        match self {
            // Level 0 runs on dense root ids.
            WorkingGraph::Root(graph) => (original < graph.node_count()).then_some(original),
            WorkingGraph::Sub(graph) => graph.to_mapped_node_id(original),
        }
    }
}

impl<G: WeightedGraph> Louvain<G> {
    /// Create a new driver, rejecting a bad configuration before any work starts.
    pub fn new(graph: G, config: LouvainConfig) -> Result<Self> {
        config.validate()?;
        if let Some(key) = &config.seed_property {
            if graph.node_property(key).is_none() {
                return Err(Error::UnknownSeedProperty(key.clone()));
            }
        }
        Ok(Louvain {
            graph,
            config,
            termination: TerminationFlag::running_true(),
        })
    }

    /// Use `termination` to stop the computation from another thread.
    pub fn with_termination_flag(mut self, termination: TerminationFlag) -> Self {
        self.termination = termination;
        self
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn config(&self) -> &LouvainConfig {
        &self.config
    }

    pub fn compute(&self) -> Result<LouvainResult> {
        let config = &self.config;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.concurrency)
            .build()
            .map_err(|e| Error::InvalidConfig {
                name: "concurrency",
                message: e.to_string(),
            })?;
        let root_node_count = self.graph.node_count();
        let seed = self.seed_communities()?;

        let mut dendrograms: Vec<Vec<usize>> = Vec::new();
        let mut modularities = Vec::new();
        let mut community_counts = Vec::new();
        let mut working = WorkingGraph::Root(&self.graph);

        for level in 0..config.max_levels {
            if !self.termination.running() {
                warn!("Louvain terminated before level {}.", level);
                break;
            }
            let working_node_count = working.node_count();
            let outcome = ModularityOptimization::new(
                &working,
                &pool,
                config.concurrency,
                config.max_iterations,
                self.termination.clone(),
            )
            .compute(if level == 0 { seed.as_deref() } else { None })?;
            let community_count = count_distinct(&outcome.communities, working_node_count);

            if level > 0 && community_count == working_node_count {
                debug!("Level {} merged no communities, stopping.", level);
                break;
            }

            let entry = match dendrograms.last() {
                None => outcome.communities.clone(),
                Some(previous) => {
                    let mut entry = try_filled_vec(root_node_count, 0usize)?;
                    for (node, community) in entry.iter_mut().enumerate() {
                        let previous_community = previous[node];
                        let mapped = working.to_mapped_node_id(previous_community).ok_or(
                            Error::UnmappedCommunity {
                                node,
                                community: previous_community,
                            },
                        )?;
                        *community = outcome.communities[mapped];
                    }
                    entry
                }
            };
            dendrograms.push(entry);
            modularities.push(outcome.modularity);
            community_counts.push(community_count);
            info!(
                "Level {}: {} communities, modularity {:.6} after {} iterations.",
                level, community_count, outcome.modularity, outcome.iterations
            );

            if !self.termination.running() {
                warn!("Louvain terminated during level {}.", level);
                break;
            }
            if community_count == working_node_count
                || community_count <= 1
                || has_converged(&modularities, config.tolerance)
                || level + 1 == config.max_levels
            {
                break;
            }

            let sub_graph = SubGraphGenerator::new(&pool, config.concurrency).generate(&working, &outcome.communities)?;
            // The previous coarse graph is dropped here.
            working = WorkingGraph::Sub(sub_graph);
        }

        for entry in dendrograms.iter_mut() {
            normalize(entry);
        }
        if !config.include_intermediate_communities && dendrograms.len() > 1 {
            dendrograms = dendrograms.split_off(dendrograms.len() - 1);
        }
        let original_ids = (0..root_node_count)
            .map(|node| self.graph.to_original_node_id(node))
            .collect();
        Ok(LouvainResult::new(
            dendrograms,
            modularities,
            community_counts,
            original_ids,
            config.include_intermediate_communities,
        ))
    }

    /// Give the root graph's storage back.
    pub fn release(mut self) {
        self.graph.release_topology();
    }

    /// Dense initial communities read from the seed property, if configured.
    /// Ids are renumbered in first-seen order and a missing value starts a
    /// community of its own.
    fn seed_communities(&self) -> Result<Option<Vec<usize>>> {
        let key = match &self.config.seed_property {
            Some(key) => key,
            None => return Ok(None),
        };
        let values = self
            .graph
            .node_property(key)
            .ok_or_else(|| Error::UnknownSeedProperty(key.clone()))?;
        let mut communities = try_filled_vec(values.len(), 0usize)?;
        let mut renumbered = HashMap::<u64, usize>::new();
        let mut next_id = 0;
        for (community, value) in communities.iter_mut().zip(values) {
            *community = if value.is_nan() {
                next_id += 1;
                next_id - 1
            } else {
                *renumbered.entry(value.to_bits()).or_insert_with(|| {
                    next_id += 1;
                    next_id - 1
                })
            };
        }
        Ok(Some(communities))
    }
}

/// False for the first level; afterwards true unless the last level beat
/// the one before by more than `tolerance`.
fn has_converged(modularities: &[f64], tolerance: f64) -> bool {
    match modularities {
        [.., previous, current] => !(current > previous && current - previous > tolerance),
        _ => false,
    }
}
