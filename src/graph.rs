use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::adjacency::Adjacency;
use crate::config::READ_BUFFER_SIZE;
use crate::error::{Error, Result};

/// Dense node id of a graph, `0..node_count`.
pub type NodeId = usize;

/// Name of the node property filled from the community column of `.graph` files.
pub const COMMUNITY_PROPERTY: &str = "community";

/// The read-only view of an undirected weighted graph that community
/// detection works on.
///
/// Every undirected relationship is visible from both endpoints; a
/// self-loop shows up as entries whose source equals the target. Shared
/// references are handed to worker threads, so implementations must be
/// `Sync`.
pub trait WeightedGraph: Sync {
    fn node_count(&self) -> usize;

    fn degree(&self, node: NodeId) -> usize;

    /// Push every relationship `(node, target, weight)` of `node` into
    /// `visit`, stopping early once it returns false.
    fn for_each_relationship<F>(&self, node: NodeId, visit: F)
    where
        F: FnMut(NodeId, NodeId, f64) -> bool;

    /// A handle that can traverse the graph independently of other copies.
    fn concurrent_copy(&self) -> &Self
    where
        Self: Sized,
    {
        self
    }

    /// Values of a node property, one per node, `NaN` where missing.
    fn node_property(&self, _key: &str) -> Option<&[f64]> {
        None
    }

    /// Translate an id of the space this graph was built from into a node id.
    fn to_mapped_node_id(&self, original: NodeId) -> Option<NodeId> {
        (original < self.node_count()).then_some(original)
    }

    /// Translate a node id back into the space this graph was built from.
    fn to_original_node_id(&self, mapped: NodeId) -> NodeId {
        mapped
    }

    /// Release the backing storage once nobody needs the topology any more.
    fn release_topology(&mut self) {}
}

/// The root in-memory graph, with external vertex ids translated to dense ids.
#[derive(Debug, Default)]
pub struct Graph {
    adjacency: Adjacency,
    original_ids: Vec<usize>,
    mapped_ids: HashMap<usize, NodeId>,
    properties: HashMap<String, Vec<f64>>,
}

impl Graph {
    /// Build a graph over nodes `0..node_count` from undirected edges.
    pub fn from_edges(node_count: usize, edges: impl IntoIterator<Item = (usize, usize, f64)>) -> Graph {
        let mut builder = GraphBuilder::new();
        for node in 0..node_count {
            builder.add_node(node);
        }
        for (source, target, weight) in edges {
            builder.add_edge(source, target, weight);
        }
        builder.build()
    }

    /// Load a `.graph` file.
    ///
    /// The first line is a header and is skipped. `v <id> [label] [community]`
    /// declares a vertex, the optional community becomes the `community`
    /// property. `e <src> <dst> [weight]` declares an undirected edge.
    pub fn from_graph_file(path: impl AsRef<Path>) -> Result<Graph> {
        let path = path.as_ref();
        let reader = BufReader::with_capacity(READ_BUFFER_SIZE, File::open(path)?);
        let mut builder = GraphBuilder::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if index == 0 {
                // The header line.
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let line_no = index + 1;
            match tokens.first() {
                Some(&"v") => {
                    let vertex_id = parse_token::<usize>(path, line_no, tokens.get(1), "vertex id")?;
                    builder.add_node(vertex_id);
                    if let Some(token) = tokens.get(3) {
                        let community = parse_token::<f64>(path, line_no, Some(token), "community")?;
                        builder.set_node_property(COMMUNITY_PROPERTY, vertex_id, community);
                    }
                }
                Some(&"e") => {
                    let source = parse_token::<usize>(path, line_no, tokens.get(1), "source id")?;
                    let target = parse_token::<usize>(path, line_no, tokens.get(2), "target id")?;
                    let weight = parse_weight(path, line_no, tokens.get(3))?;
                    builder.add_edge(source, target, weight);
                }
                _ => {}
            }
        }
        Ok(builder.build())
    }

    /// Load a whitespace separated edge list, `<src> <dst> [weight]` per line.
    /// Blank lines and lines starting with `#` are skipped.
    pub fn from_edge_list_file(path: impl AsRef<Path>) -> Result<Graph> {
        let path = path.as_ref();
        let reader = BufReader::with_capacity(READ_BUFFER_SIZE, File::open(path)?);
        let mut builder = GraphBuilder::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let line_no = index + 1;
            let source = parse_token::<usize>(path, line_no, tokens.first(), "source id")?;
            let target = parse_token::<usize>(path, line_no, tokens.get(1), "target id")?;
            let weight = parse_weight(path, line_no, tokens.get(2))?;
            builder.add_edge(source, target, weight);
        }
        Ok(builder.build())
    }

    /// Number of relationship entries, i.e. every undirected edge twice.
    pub fn relationship_count(&self) -> usize {
        self.adjacency.relationship_count()
    }
}

fn parse_token<T: std::str::FromStr>(
    path: &Path,
    line: usize,
    token: Option<&&str>,
    what: &str,
) -> Result<T> {
    let token = token.ok_or_else(|| Error::GraphFormat {
        path: path.to_path_buf(),
        line,
        message: format!("missing {}", what),
    })?;
    token.parse().map_err(|_| Error::GraphFormat {
        path: path.to_path_buf(),
        line,
        message: format!("cannot parse {} '{}'", what, token),
    })
}

fn parse_weight(path: &Path, line: usize, token: Option<&&str>) -> Result<f64> {
    match token {
        None => Ok(1.0),
        Some(_) => {
            let weight = parse_token::<f64>(path, line, token, "weight")?;
            if weight.is_finite() {
                Ok(weight)
            } else {
                Err(Error::GraphFormat {
                    path: path.to_path_buf(),
                    line,
                    message: format!("weight {} is not finite", weight),
                })
            }
        }
    }
}

impl WeightedGraph for Graph {
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

    fn node_property(&self, key: &str) -> Option<&[f64]> {
        self.properties.get(key).map(Vec::as_slice)
    }

    fn to_mapped_node_id(&self, original: NodeId) -> Option<NodeId> {
        self.mapped_ids.get(&original).copied()
    }

    fn to_original_node_id(&self, mapped: NodeId) -> NodeId {
        self.original_ids[mapped]
    }

    fn release_topology(&mut self) {
        self.adjacency.release();
    }
}

/// Collects vertices and undirected edges by external id.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    lists: Vec<Vec<(NodeId, f64)>>,
    original_ids: Vec<usize>,
    mapped_ids: HashMap<usize, NodeId>,
    properties: HashMap<String, Vec<(NodeId, f64)>>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vertex, returning its dense id. Ids are assigned in
    /// first-seen order.
    pub fn add_node(&mut self, original: usize) -> NodeId {
        if let Some(mapped) = self.mapped_ids.get(&original) {
            return *mapped;
        }
        let mapped = self.original_ids.len();
        self.original_ids.push(original);
        self.mapped_ids.insert(original, mapped);
        self.lists.push(Vec::new());
        mapped
    }

    /// Add an undirected edge; a self-loop is stored as two entries of the node.
    pub fn add_edge(&mut self, source: usize, target: usize, weight: f64) {
        let source = self.add_node(source);
        let target = self.add_node(target);
        self.lists[source].push((target, weight));
        self.lists[target].push((source, weight));
    }

    pub fn set_node_property(&mut self, key: &str, original: usize, value: f64) {
        let node = self.add_node(original);
        self.properties.entry(key.to_owned()).or_default().push((node, value));
    }

    pub fn build(self) -> Graph {
        let node_count = self.original_ids.len();
        let properties = self
            .properties
            .into_iter()
            .map(|(key, entries)| {
                let mut values = vec![f64::NAN; node_count];
                for (node, value) in entries {
                    values[node] = value;
                }
                (key, values)
            })
            .collect();
        Graph {
            adjacency: Adjacency::from_lists(self.lists),
            original_ids: self.original_ids,
            mapped_ids: self.mapped_ids,
            properties,
        }
    }
}

/// Graphs shared by the tests of several modules.
#[cfg(test)]
pub(crate) mod test_graphs {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::graph::{Graph, NodeId, WeightedGraph};
    use crate::termination::TerminationFlag;

    /// A ring of `count` triangles, neighbouring triangles joined by one edge.
    pub(crate) fn triangle_ring(count: usize) -> Graph {
        let mut edges = vec![];
        for t in 0..count {
            let base = 3 * t;
            edges.extend([(base, base + 1, 1.0), (base + 1, base + 2, 1.0), (base + 2, base, 1.0)]);
            edges.push((base + 2, (base + 3) % (3 * count), 1.0));
        }
        Graph::from_edges(3 * count, edges)
    }

    /// Terminates `termination` once `limit` relationship scans were started.
    pub(crate) struct StoppingGraph {
        pub(crate) graph: Graph,
        termination: TerminationFlag,
        visits: AtomicUsize,
        limit: usize,
    }

    impl StoppingGraph {
        pub(crate) fn new(graph: Graph, termination: TerminationFlag, limit: usize) -> Self {
            StoppingGraph {
                graph,
                termination,
                visits: AtomicUsize::new(0),
                limit,
            }
        }
    }

    impl WeightedGraph for StoppingGraph {
        fn node_count(&self) -> usize {
            self.graph.node_count()
        }

        fn degree(&self, node: NodeId) -> usize {
            self.graph.degree(node)
        }

        fn for_each_relationship<F>(&self, node: NodeId, visit: F)
        where
            F: FnMut(NodeId, NodeId, f64) -> bool,
        {
            if self.visits.fetch_add(1, Ordering::Relaxed) + 1 >= self.limit {
                self.termination.terminate();
            }
            self.graph.for_each_relationship(node, visit);
        }
    }

    /// Reports a relationship to a node past the end once `after` scans were started.
    pub(crate) struct DanglingGraph {
        graph: Graph,
        visits: AtomicUsize,
        after: usize,
    }

    impl DanglingGraph {
        pub(crate) fn new(graph: Graph, after: usize) -> Self {
            DanglingGraph {
                graph,
                visits: AtomicUsize::new(0),
                after,
            }
        }
    }

    impl WeightedGraph for DanglingGraph {
        fn node_count(&self) -> usize {
            self.graph.node_count()
        }

        fn degree(&self, node: NodeId) -> usize {
            self.graph.degree(node)
        }

        fn for_each_relationship<F>(&self, node: NodeId, mut visit: F)
        where
            F: FnMut(NodeId, NodeId, f64) -> bool,
        {
            if self.visits.fetch_add(1, Ordering::Relaxed) >= self.after
                && !visit(node, self.graph.node_count(), 1.0)
            {
                return;
            }
            self.graph.for_each_relationship(node, visit);
        }
    }
}

#[cfg(test)]
mod test_graph {
    use std::io::Write;

    use crate::error::Error;
    use crate::graph::{COMMUNITY_PROPERTY, Graph, GraphBuilder, WeightedGraph};

    fn neighbors(graph: &Graph, node: usize) -> Vec<(usize, f64)> {
        let mut result = vec![];
        graph.for_each_relationship(node, |source, target, weight| {
            assert_eq!(source, node);
            result.push((target, weight));
            true
        });
        result
    }

    #[test]
    fn test_from_edges() {
        let graph = Graph::from_edges(4, vec![(0, 1, 1.0), (1, 2, 2.0), (2, 0, 1.0)]);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.relationship_count(), 6);
        assert_eq!(graph.degree(0), 2);
        assert_eq!(graph.degree(3), 0);
        assert_eq!(neighbors(&graph, 1), vec![(0, 1.0), (2, 2.0)]);
    }

    #[test]
    fn test_self_loop_entries() {
        let graph = Graph::from_edges(1, vec![(0, 0, 1.5)]);
        assert_eq!(neighbors(&graph, 0), vec![(0, 1.5), (0, 1.5)]);
    }

    #[test]
    fn test_id_translation() {
        let mut builder = GraphBuilder::new();
        builder.add_edge(100, 7, 1.0);
        builder.add_node(42);
        let graph = builder.build();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.to_mapped_node_id(7), Some(1));
        assert_eq!(graph.to_mapped_node_id(8), None);
        assert_eq!(graph.to_original_node_id(2), 42);
    }

    #[test]
    fn test_release_topology() {
        let mut graph = Graph::from_edges(3, vec![(0, 1, 1.0)]);
        graph.release_topology();
        assert_eq!(graph.relationship_count(), 0);
    }

    #[test]
    fn test_load_graph_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "t 4 3").unwrap();
        writeln!(file, "v 0 0 1").unwrap();
        writeln!(file, "v 1 0 1").unwrap();
        writeln!(file, "v 2 0 2").unwrap();
        writeln!(file, "v 3 0").unwrap();
        writeln!(file, "e 0 1").unwrap();
        writeln!(file, "e 1 2 0.5").unwrap();
        writeln!(file, "e 2 3").unwrap();

        let graph = Graph::from_graph_file(file.path()).unwrap();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.relationship_count(), 6);
        assert_eq!(neighbors(&graph, 2), vec![(1, 0.5), (3, 1.0)]);

        let seeds = graph.node_property(COMMUNITY_PROPERTY).unwrap();
        assert_eq!(&seeds[..3], &[1.0, 1.0, 2.0]);
        assert!(seeds[3].is_nan());
        assert!(graph.node_property("missing").is_none());
    }

    #[test]
    fn test_load_edge_list_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "10 20").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "20 30 2.5").unwrap();

        let graph = Graph::from_edge_list_file(file.path()).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.to_original_node_id(2), 30);
        assert_eq!(neighbors(&graph, 1), vec![(0, 1.0), (2, 2.5)]);
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1 x").unwrap();
        match Graph::from_edge_list_file(file.path()) {
            Err(Error::GraphFormat { line, .. }) => assert_eq!(line, 1),
            other => panic!("unexpected result: {:?}", other.map(|g| g.node_count())),
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1 2 inf").unwrap();
        assert!(Graph::from_edge_list_file(file.path()).is_err());
    }
}
