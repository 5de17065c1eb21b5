use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring or running community detection.
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value is out of its accepted range.
    #[error("invalid configuration '{name}': {message}")]
    InvalidConfig {
        name: &'static str,
        message: String,
    },

    /// The seed property is not present on the root graph.
    #[error("unknown seed property '{0}'")]
    UnknownSeedProperty(String),

    /// A community id exceeds the bound declared to the coarsener.
    #[error("community {community} of node {node} is outside the declared bound {bound}")]
    CommunityOutOfBounds {
        node: usize,
        community: usize,
        bound: usize,
    },

    /// A relationship points at a node the graph does not have.
    #[error("node {node} is outside the graph (node count {node_count})")]
    NodeOutOfBounds {
        node: usize,
        node_count: usize,
    },

    /// A community of the previous level has no node in the coarsened graph.
    #[error("community {community} of original node {node} has no coarse node")]
    UnmappedCommunity {
        node: usize,
        community: usize,
    },

    /// A per-level array could not be allocated.
    #[error("failed to allocate an array of {len} elements")]
    AllocationFailed {
        len: usize,
    },

    /// A graph file could not be parsed.
    #[error("{path}:{line}: {message}")]
    GraphFormat {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
