use std::sync::atomic::{AtomicUsize, Ordering};

use log::trace;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::config::RUN_CHECK_NODE_COUNT;
use crate::error::{Error, Result};
use crate::graph::{NodeId, WeightedGraph};
use crate::modularity::partition_modularity;
use crate::termination::TerminationFlag;
use crate::util::try_filled_vec;

/// Read-only data shared by every task of a level.
pub(crate) struct TaskContext<'a, G> {
    pub(crate) graph: &'a G,
    pub(crate) node_count: usize,
    pub(crate) ki: Vec<f64>, // Summed relationship weight per node.
    pub(crate) m2: f64, // Twice the total relationship weight.
    pub(crate) m2_squared: f64,
    pub(crate) termination: TerminationFlag,
    task_count: usize,
    progress: AtomicUsize,
}

impl<'a, G: WeightedGraph> TaskContext<'a, G> {
    pub(crate) fn new(
        graph: &'a G,
        pool: &ThreadPool,
        task_count: usize,
        termination: TerminationFlag,
    ) -> Result<Self> {
        let node_count = graph.node_count();
        let mut ki = try_filled_vec(node_count, 0.0f64)?;
        // Every relationship is seen from both endpoints, so summing the
        // entries of a node gives its full incident weight.
        pool.install(|| {
            ki.par_iter_mut().enumerate().try_for_each(|(node, weight_sum)| {
                let mut failure = None;
                graph.concurrent_copy().for_each_relationship(node, |_, target, weight| {
                    if target >= node_count {
                        failure = Some(Error::NodeOutOfBounds { node: target, node_count });
                        return false;
                    }
                    *weight_sum += weight;
                    true
                });
                failure.map_or(Ok(()), Err)
            })
        })?;
        let m2: f64 = ki.iter().sum();
        Ok(TaskContext {
            graph,
            node_count,
            ki,
            m2,
            m2_squared: m2 * m2,
            termination,
            task_count,
            progress: AtomicUsize::new(0),
        })
    }

    pub(crate) fn reset_progress(&self) {
        self.progress.store(0, Ordering::Relaxed);
    }
}

/// The community assignment of a task and the aggregates derived from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TaskState {
    pub(crate) communities: Vec<usize>,
    pub(crate) s_tot: Vec<f64>, // Summed `ki` of the members, per community.
    pub(crate) s_in: Vec<f64>, // Summed relationship entries inside, per community.
}

impl TaskState {
    pub(crate) fn from_assignment<G: WeightedGraph>(
        communities: Vec<usize>,
        context: &TaskContext<G>,
    ) -> Result<TaskState> {
        let node_count = context.node_count;
        let mut s_tot = try_filled_vec(node_count, 0.0f64)?;
        let mut s_in = try_filled_vec(node_count, 0.0f64)?;
        // Ids are all below the node count.
        for node in 0..node_count {
            let community = communities[node];
            s_tot[community] += context.ki[node];
            context.graph.for_each_relationship(node, |_, target, weight| {
                if communities[target] == community {
                    s_in[community] += weight;
                }
                true
            });
        }
        Ok(TaskState {
            communities,
            s_tot,
            s_in,
        })
    }
}

// Weight from the moving node to each neighbouring community, in first-seen order.
struct NeighborWeights {
    weights: Vec<f64>,
    seen: Vec<bool>,
    touched: Vec<usize>,
}

impl NeighborWeights {
    fn new(node_count: usize) -> Result<Self> {
        Ok(NeighborWeights {
            weights: try_filled_vec(node_count, 0.0)?,
            seen: try_filled_vec(node_count, false)?,
            touched: Vec::new(),
        })
    }

    #[inline]
    fn add(&mut self, community: usize, weight: f64) {
        if !self.seen[community] {
            self.seen[community] = true;
            self.touched.push(community);
        }
        self.weights[community] += weight;
    }

    #[inline]
    fn get(&self, community: usize) -> f64 {
        self.weights[community]
    }

    fn clear(&mut self) {
        for &community in &self.touched {
            self.weights[community] = 0.0;
            self.seen[community] = false;
        }
        self.touched.clear();
    }
}

/// One local-move worker. It owns its state exclusively during a round.
pub(crate) struct Task {
    pub(crate) state: TaskState,
    pub(crate) modularity: f64,
    pub(crate) improvement: bool, // At least one node moved in the last round.
    pub(crate) completed: bool, // The last round scanned every node.
    order: Vec<NodeId>,
    rng: Option<StdRng>,
    neighbors: NeighborWeights,
}

impl Task {
    pub(crate) fn new(state: TaskState, modularity: f64, shuffled: bool) -> Result<Task> {
        let node_count = state.communities.len();
        // Ascending, or reshuffled every round.
        let mut order = Vec::new();
        order.try_reserve_exact(node_count).map_err(|_| Error::AllocationFailed { len: node_count })?;
        order.extend(0..node_count);
        Ok(Task {
            state,
            modularity,
            improvement: false,
            completed: false,
            order,
            rng: shuffled.then(StdRng::from_entropy),
            neighbors: NeighborWeights::new(node_count)?,
        })
    }

    /// Scan every node once, moving it to its best neighbouring community,
    /// then evaluate the resulting modularity.
    pub(crate) fn run<G: WeightedGraph>(&mut self, context: &TaskContext<G>) -> Result<()> {
        self.improvement = false;
        self.completed = false;
        if let Some(rng) = self.rng.as_mut() {
            self.order.shuffle(rng);
        }
        let graph = context.graph.concurrent_copy();
        for (scanned, &node) in self.order.iter().enumerate() {
            if scanned > 0 && scanned % RUN_CHECK_NODE_COUNT == 0 {
                let progress = context.progress.fetch_add(RUN_CHECK_NODE_COUNT, Ordering::Relaxed)
                    + RUN_CHECK_NODE_COUNT;
                trace!("Scanned {} of {} nodes.", progress, context.node_count * context.task_count);
                if !context.termination.running() {
                    return Ok(());
                }
            }
            let moved = move_node(graph, context, &mut self.state, &mut self.neighbors, node)?;
            self.improvement |= moved;
        }
        self.modularity = partition_modularity(graph, &context.ki, context.m2, &self.state.communities)?;
        self.completed = true;
        Ok(())
    }
}

/// Take `node` out of its community, find the neighbouring community with
/// the strictly largest gain and put the node there. Staying is the
/// default, so ties keep the first candidate seen.
fn move_node<G: WeightedGraph>(
    graph: &G,
    context: &TaskContext<G>,
    state: &mut TaskState,
    neighbors: &mut NeighborWeights,
    node: NodeId,
) -> Result<bool> {
    let node_count = context.node_count;
    let current = state.communities[node];
    let ki = context.ki[node];

    let mut self_weight = 0.0;
    let mut failure = None;
    graph.for_each_relationship(node, |_, target, weight| {
        if target >= node_count {
            failure = Some(Error::NodeOutOfBounds { node: target, node_count });
            return false;
        }
        if target == node {
            self_weight += weight;
        } else {
            neighbors.add(state.communities[target], weight);
        }
        true
    });
    if let Some(e) = failure {
        neighbors.clear();
        return Err(e);
    }

    // Remove.
    let initial_weight = neighbors.get(current);
    state.s_tot[current] -= ki;
    state.s_in[current] -= 2.0 * initial_weight + self_weight;

    let mut best_gain = 0.0;
    let mut best_community = current;
    let mut best_weight = initial_weight;
    for &community in &neighbors.touched {
        let weight = neighbors.weights[community];
        let gain = weight / context.m2 - state.s_tot[community] * ki / context.m2_squared;
        if gain > best_gain {
            best_gain = gain;
            best_community = community;
            best_weight = weight;
        }
    }

    // Insert.
    state.s_tot[best_community] += ki;
    state.s_in[best_community] += 2.0 * best_weight + self_weight;
    state.communities[node] = best_community;

    neighbors.clear();
    Ok(best_community != current)
}

#[cfg(test)]
mod test_task {
    use rayon::ThreadPoolBuilder;

    use crate::graph::Graph;
    use crate::modularity::task::{Task, TaskContext, TaskState};
    use crate::termination::TerminationFlag;

    fn assert_consistent(state: &TaskState, context: &TaskContext<Graph>) {
        let expected = TaskState::from_assignment(state.communities.clone(), context).unwrap();
        for community in 0..context.node_count {
            assert!((state.s_tot[community] - expected.s_tot[community]).abs() < 1e-9);
            assert!((state.s_in[community] - expected.s_in[community]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_context_weights() {
        let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let graph = Graph::from_edges(3, vec![(0, 1, 2.0), (1, 2, 1.0), (2, 2, 0.5)]);
        let context = TaskContext::new(&graph, &pool, 1, TerminationFlag::running_true()).unwrap();
        assert_eq!(context.ki, vec![2.0, 3.0, 2.0]);
        assert_eq!(context.m2, 7.0);
        assert_eq!(context.m2_squared, 49.0);
    }

    #[test]
    fn test_round_keeps_aggregates_consistent() {
        let pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let graph = Graph::from_edges(7, vec![
            (0, 1, 1.0), (1, 2, 1.0), (2, 0, 1.0), (2, 3, 0.3),
            (3, 4, 2.0), (4, 5, 1.0), (5, 3, 1.0), (5, 5, 0.7), (6, 0, 0.1),
        ]);
        let context = TaskContext::new(&graph, &pool, 1, TerminationFlag::running_true()).unwrap();
        let state = TaskState::from_assignment((0..7).collect(), &context).unwrap();
        let mut task = Task::new(state, -1.0, false).unwrap();

        task.run(&context).unwrap();
        assert!(task.completed);
        assert!(task.improvement);
        assert_consistent(&task.state, &context);

        task.run(&context).unwrap();
        assert_consistent(&task.state, &context);
    }

    #[test]
    fn test_shuffled_round_keeps_aggregates_consistent() {
        let pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let edges = (0..30).map(|i| (i, (i * 7 + 3) % 30, 1.0 + (i % 3) as f64));
        let graph = Graph::from_edges(30, edges);
        let context = TaskContext::new(&graph, &pool, 1, TerminationFlag::running_true()).unwrap();
        let state = TaskState::from_assignment((0..30).collect(), &context).unwrap();
        let mut task = Task::new(state, -1.0, true).unwrap();
        for _ in 0..3 {
            task.run(&context).unwrap();
            assert_consistent(&task.state, &context);
        }
    }

    #[test]
    fn test_isolated_node_stays() {
        let pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let graph = Graph::from_edges(1, vec![]);
        let context = TaskContext::new(&graph, &pool, 1, TerminationFlag::running_true()).unwrap();
        let state = TaskState::from_assignment(vec![0], &context).unwrap();
        let mut task = Task::new(state, 0.0, false).unwrap();
        task.run(&context).unwrap();
        assert!(task.completed);
        assert!(!task.improvement);
        assert_eq!(task.state.communities, vec![0]);
        assert_eq!(task.modularity, 0.0);
    }
}
