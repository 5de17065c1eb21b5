use std::fmt::Debug;

/// Integer type used to store relationship targets.
pub trait IndexType: Copy + Send + Sync + Debug + 'static {
    /// Largest node id this index type can hold.
    const MAX: usize;

    fn new(index: usize) -> Self;

    fn index(self) -> usize;
}

impl IndexType for u32 {
    const MAX: usize = u32::MAX as usize;

    #[inline]
    fn new(index: usize) -> Self {
        index as u32
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl IndexType for u64 {
    const MAX: usize = u64::MAX as usize;

    #[inline]
    fn new(index: usize) -> Self {
        index as u64
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Compressed sparse row adjacency, one weighted entry per relationship
/// direction. Targets of a node are stored in ascending order.
#[derive(Debug, Clone, Default)]
pub struct CsrAdjacency<Ix> {
    offsets: Vec<usize>,
    targets: Vec<Ix>,
    weights: Vec<f64>,
}

impl<Ix: IndexType> CsrAdjacency<Ix> {
    /// Build from one `(target, weight)` list per source node.
    pub fn from_lists(lists: Vec<Vec<(usize, f64)>>) -> Self {
        let relationship_count = lists.iter().map(Vec::len).sum();
        let mut offsets = Vec::with_capacity(lists.len() + 1);
        let mut targets = Vec::with_capacity(relationship_count);
        let mut weights = Vec::with_capacity(relationship_count);
        offsets.push(0);
        for mut list in lists {
            list.sort_by_key(|(target, _)| *target);
            for (target, weight) in list {
                targets.push(Ix::new(target));
                weights.push(weight);
            }
            offsets.push(targets.len());
        }
        CsrAdjacency {
            offsets,
            targets,
            weights,
        }
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    #[inline]
    pub fn relationship_count(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    pub fn degree(&self, node: usize) -> usize {
        self.offsets[node + 1] - self.offsets[node]
    }

    /// Visit the relationships of `node` until `visit` returns false.
    #[inline]
    pub fn for_each<F>(&self, node: usize, mut visit: F)
    where
        F: FnMut(usize, f64) -> bool,
    {
        let (start, end) = (self.offsets[node], self.offsets[node + 1]);
        for index in start..end {
            if !visit(self.targets[index].index(), self.weights[index]) {
                return;
            }
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Drop the backing arrays.
    pub fn release(&mut self) {
        self.offsets = Vec::new();
        self.targets = Vec::new();
        self.weights = Vec::new();
    }
}

/// Adjacency storage whose index width is chosen from the node count.
#[derive(Debug, Clone)]
pub enum Adjacency {
    Compact(CsrAdjacency<u32>),
    Wide(CsrAdjacency<u64>),
}

impl Default for Adjacency {
    fn default() -> Self {
        Adjacency::Compact(CsrAdjacency::default())
    }
}

impl Adjacency {
    /// Build from one `(target, weight)` list per node, picking `u32`
    /// indices whenever every node id fits.
    pub fn from_lists(lists: Vec<Vec<(usize, f64)>>) -> Self {
        Self::from_lists_with_limit(lists, u32::MAX as usize)
    }

    pub(crate) fn from_lists_with_limit(lists: Vec<Vec<(usize, f64)>>, compact_limit: usize) -> Self {
        if lists.len() <= compact_limit {
            Adjacency::Compact(CsrAdjacency::from_lists(lists))
        } else {
            Adjacency::Wide(CsrAdjacency::from_lists(lists))
        }
    }

    pub fn is_compact(&self) -> bool {
        matches!(self, Adjacency::Compact(_))
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        match self {
            Adjacency::Compact(csr) => csr.node_count(),
            Adjacency::Wide(csr) => csr.node_count(),
        }
    }

    pub fn relationship_count(&self) -> usize {
        match self {
            Adjacency::Compact(csr) => csr.relationship_count(),
            Adjacency::Wide(csr) => csr.relationship_count(),
        }
    }

    #[inline]
    pub fn degree(&self, node: usize) -> usize {
        match self {
            Adjacency::Compact(csr) => csr.degree(node),
            Adjacency::Wide(csr) => csr.degree(node),
        }
    }

    #[inline]
    pub fn for_each<F>(&self, node: usize, visit: F)
    where
        F: FnMut(usize, f64) -> bool,
    {
        match self {
            Adjacency::Compact(csr) => csr.for_each(node, visit),
            Adjacency::Wide(csr) => csr.for_each(node, visit),
        }
    }

    /// Sum of all entry weights, i.e. twice the undirected edge weight.
    pub fn total_weight(&self) -> f64 {
        match self {
            Adjacency::Compact(csr) => csr.total_weight(),
            Adjacency::Wide(csr) => csr.total_weight(),
        }
    }

    pub fn release(&mut self) {
        match self {
            Adjacency::Compact(csr) => csr.release(),
            Adjacency::Wide(csr) => csr.release(),
        }
    }
}
