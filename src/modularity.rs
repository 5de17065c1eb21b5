//! Parallel modularity optimization, the first phase of a Louvain level.
//!
//! Several tasks scan the graph at the same time, each on its own copy of
//! the community assignment and in its own node order. After every round
//! the task with the highest modularity wins and its state is copied into
//! all the others. The level ends when no task improves on the best
//! modularity seen so far or the iteration cap is reached.

use log::{debug, warn};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::error::{Error, Result};
use crate::graph::WeightedGraph;
use crate::termination::TerminationFlag;
use crate::util::{normalize, try_filled_vec};

pub(crate) mod task;

use task::{Task, TaskContext, TaskState};

/// Lower bound for any modularity value.
const MINIMUM_MODULARITY: f64 = -1.0;

/// What one level of local moves produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ModularityOutcome {
    /// Community per node of the optimized graph. Ids are node ids of that graph.
    pub communities: Vec<usize>,
    pub modularity: f64,
    /// Rounds started, including the last one that did not improve.
    pub iterations: usize,
    /// Modularity of every accepted round, in order.
    pub round_modularities: Vec<f64>,
    /// False when the iteration cap or cancellation ended the level.
    pub converged: bool,
}

pub struct ModularityOptimization<'a, G> {
    graph: &'a G,
    pool: &'a ThreadPool,
    concurrency: usize,
    max_iterations: usize,
    termination: TerminationFlag,
}

impl<'a, G: WeightedGraph> ModularityOptimization<'a, G> {
    pub fn new(
        graph: &'a G,
        pool: &'a ThreadPool,
        concurrency: usize,
        max_iterations: usize,
        termination: TerminationFlag,
    ) -> Self {
        ModularityOptimization {
            graph,
            pool,
            concurrency: concurrency.max(1),
            max_iterations,
            termination,
        }
    }

    /// Run local moves until no round improves modularity.
    ///
    /// `seed` gives a starting community per node; its ids must be node ids.
    /// Without a seed every node starts alone.
    pub fn compute(self, seed: Option<&[usize]>) -> Result<ModularityOutcome> {
        let node_count = self.graph.node_count();
        let context = TaskContext::new(self.graph, self.pool, self.concurrency, self.termination.clone())?;

        let initial = match seed {
            Some(seed) => {
                if seed.len() != node_count {
                    return Err(Error::NodeOutOfBounds { node: seed.len(), node_count });
                }
                if let Some((node, &community)) = seed.iter().enumerate().find(|(_, c)| **c >= node_count) {
                    return Err(Error::CommunityOutOfBounds {
                        node,
                        community,
                        bound: node_count.saturating_sub(1),
                    });
                }
                let mut communities = try_filled_vec(node_count, 0usize)?;
                communities.copy_from_slice(seed);
                communities
            }
            None => {
                let mut communities = try_filled_vec(node_count, 0usize)?;
                communities.iter_mut().enumerate().for_each(|(node, c)| *c = node);
                communities
            }
        };
        let initial = TaskState::from_assignment(initial, &context)?;
        let mut modularity = partition_modularity(self.graph, &context.ki, context.m2, &initial.communities)?;

        let shuffled = self.concurrency > 1;
        let mut tasks = Vec::with_capacity(self.concurrency);
        for _ in 0..self.concurrency {
            tasks.push(Task::new(initial.clone(), modularity, shuffled)?);
        }
        let mut communities = initial.communities;

        let mut iterations = 0;
        let mut round_modularities = Vec::new();
        let mut converged = false;
        while iterations < self.max_iterations {
            if !self.termination.running() {
                warn!("Modularity optimization terminated after {} rounds.", iterations);
                break;
            }
            iterations += 1;
            context.reset_progress();
            self.pool.install(|| tasks.par_iter_mut().try_for_each(|task| task.run(&context)))?;

            match best(&tasks) {
                Some(winner) if tasks[winner].modularity > modularity => {
                    modularity = tasks[winner].modularity;
                    round_modularities.push(modularity);
                    debug!("Round {}: modularity {:.6} from task {}.", iterations, modularity, winner);
                    sync(&mut tasks, winner, &mut communities);
                }
                _ => {
                    // Nothing improved, unless the round was cut short.
                    converged = self.termination.running();
                    debug!("Round {}: no improvement, modularity {:.6}.", iterations, modularity);
                    break;
                }
            }
        }

        Ok(ModularityOutcome {
            communities,
            modularity,
            iterations,
            round_modularities,
            converged,
        })
    }
}

/// The completed task with the highest modularity among those that moved
/// at least one node.
fn best(tasks: &[Task]) -> Option<usize> {
    let mut best = None;
    let mut q = MINIMUM_MODULARITY;
    for (index, task) in tasks.iter().enumerate() {
        if !task.completed || !task.improvement {
            continue;
        }
        if task.modularity > q {
            q = task.modularity;
            best = Some(index);
        }
    }
    best
}

/// Copy the winner's state into every other task and into the result.
fn sync(tasks: &mut [Task], winner: usize, communities: &mut Vec<usize>) {
    let winner_state = std::mem::take(&mut tasks[winner].state);
    let winner_modularity = tasks[winner].modularity;
    for (index, task) in tasks.iter_mut().enumerate() {
        task.improvement = false;
        if index != winner {
            task.state.clone_from(&winner_state);
            task.modularity = winner_modularity;
        }
    }
    communities.clone_from(&winner_state.communities);
    tasks[winner].state = winner_state;
}

/// Modularity of an assignment whose ids are below the node count, in the
/// standard form `sum_c in_c / m2 - (tot_c / m2)^2`.
pub(crate) fn partition_modularity<G: WeightedGraph>(
    graph: &G,
    ki: &[f64],
    m2: f64,
    communities: &[usize],
) -> Result<f64> {
    if m2 == 0.0 {
        return Ok(0.0);
    }
    let node_count = communities.len();
    let mut internal = try_filled_vec(node_count, 0.0f64)?;
    let mut total = try_filled_vec(node_count, 0.0f64)?;
    for node in 0..node_count {
        let community = communities[node];
        total[community] += ki[node];
        graph.for_each_relationship(node, |_, target, weight| {
            if communities[target] == community {
                internal[community] += weight;
            }
            true
        });
    }
    Ok(internal
        .iter()
        .zip(total.iter())
        .map(|(internal, total)| internal / m2 - (total / m2) * (total / m2))
        .sum())
}

/// Modularity of any community assignment of `graph`, one id per node.
pub fn modularity_of<G: WeightedGraph>(graph: &G, communities: &[usize]) -> Result<f64> {
    let node_count = graph.node_count();
    if communities.len() != node_count {
        return Err(Error::NodeOutOfBounds { node: communities.len(), node_count });
    }
    let mut dense = communities.to_vec();
    normalize(&mut dense);
    let mut ki = try_filled_vec(node_count, 0.0f64)?;
    let mut failure = None;
    for (node, weight_sum) in ki.iter_mut().enumerate() {
        graph.for_each_relationship(node, |_, target, weight| {
            if target >= node_count {
                failure = Some(Error::NodeOutOfBounds { node: target, node_count });
                return false;
            }
            *weight_sum += weight;
            true
        });
    }
    if let Some(e) = failure {
        return Err(e);
    }
    let m2: f64 = ki.iter().sum();
    partition_modularity(graph, &ki, m2, &dense)
}
