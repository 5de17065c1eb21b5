//! Multi-level modularity community detection (Louvain) over weighted,
//! undirected graphs.
//!
//! ```no_run
//! use louvain_community::{Graph, Louvain, LouvainConfig};
//!
//! let graph = Graph::from_edge_list_file("graph.txt")?;
//! let result = Louvain::new(graph, LouvainConfig::default())?.compute()?;
//! println!("{} communities, modularity {}", result.community_count(), result.final_modularity());
//! # Ok::<(), louvain_community::Error>(())
//! ```

pub mod adjacency;
pub mod config;
pub mod error;
pub mod graph;
pub mod logger;
pub mod louvain;
pub mod modularity;
pub mod subgraph;
pub mod termination;
pub mod util;

pub use config::LouvainConfig;
pub use error::{Error, Result};
pub use graph::{Graph, GraphBuilder, NodeId, WeightedGraph, COMMUNITY_PROPERTY};
pub use louvain::{Louvain, LouvainResult, NodeCommunity};
pub use modularity::{modularity_of, ModularityOptimization, ModularityOutcome};
pub use subgraph::generator::SubGraphGenerator;
pub use subgraph::SubGraph;
pub use termination::TerminationFlag;
