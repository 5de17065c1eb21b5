use std::collections::HashMap;

use parking_lot::Mutex;

use crate::adjacency::Adjacency;
use crate::error::Result;
use crate::graph::NodeId;
use crate::util::try_filled_vec;

/// Coarse relationships collected so far, parallel entries summed up.
pub(crate) struct RelationshipAccumulator {
    lists: Vec<HashMap<NodeId, f64>>,
}

impl RelationshipAccumulator {
    pub(crate) fn new(node_count: usize) -> Result<Self> {
        Ok(RelationshipAccumulator {
            lists: try_filled_vec(node_count, HashMap::new())?,
        })
    }

    fn add_batch(&mut self, batch: &[(NodeId, NodeId, f64)]) {
        for &(source, target, weight) in batch {
            *self.lists[source].entry(target).or_insert(0.0) += weight;
        }
    }

    pub(crate) fn into_adjacency(self) -> Adjacency {
        let lists = self
            .lists
            .into_iter()
            .map(|targets| targets.into_iter().collect::<Vec<_>>())
            .collect();
        Adjacency::from_lists(lists)
    }
}

/// Per-thread buffer in front of the shared accumulator. The lock is only
/// taken once the buffer fills up and on the final flush.
pub(crate) struct RelationshipImporter<'a> {
    buffer: Vec<(NodeId, NodeId, f64)>,
    capacity: usize,
    target: &'a Mutex<RelationshipAccumulator>,
}

impl<'a> RelationshipImporter<'a> {
    pub(crate) fn new(target: &'a Mutex<RelationshipAccumulator>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        RelationshipImporter {
            buffer: Vec::with_capacity(capacity),
            capacity,
            target,
        }
    }

    #[inline]
    pub(crate) fn add(&mut self, source: NodeId, target: NodeId, weight: f64) {
        self.buffer.push((source, target, weight));
        if self.buffer.len() >= self.capacity {
            self.flush();
        }
    }

    pub(crate) fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        self.target.lock().add_batch(&self.buffer);
        self.buffer.clear();
    }
}

#[cfg(test)]
mod test_importer {
    use parking_lot::Mutex;

    use crate::subgraph::importer::{RelationshipAccumulator, RelationshipImporter};

    #[test]
    fn test_sum_parallel_entries() {
        let accumulator = Mutex::new(RelationshipAccumulator::new(2).unwrap());
        let mut importer = RelationshipImporter::new(&accumulator, 2);
        importer.add(0, 1, 1.0);
        importer.add(0, 1, 2.0);
        importer.add(1, 0, 3.0);
        importer.add(1, 1, 0.5);
        importer.add(1, 1, 0.5);
        // The last entry is still buffered.
        assert_eq!(accumulator.lock().lists[1].get(&1), Some(&0.5));
        importer.flush();

        let adjacency = accumulator.into_inner().into_adjacency();
        assert_eq!(adjacency.relationship_count(), 3);
        let mut entries = vec![];
        adjacency.for_each(1, |target, weight| {
            entries.push((target, weight));
            true
        });
        assert_eq!(entries, vec![(0, 3.0), (1, 1.0)]);
        assert_eq!(adjacency.total_weight(), 7.0);
    }
}
