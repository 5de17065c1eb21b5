use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of nodes a task scans between two cancellation checks.
pub(crate) const RUN_CHECK_NODE_COUNT: usize = 10_000;

/// Relationships buffered by an importer before they are flushed.
pub(crate) const IMPORT_BUFFER_SIZE: usize = 100_000;

/// Buffer size used when reading graph files.
pub(crate) const READ_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Default minimum modularity gain between two levels.
pub const TOLERANCE_DEFAULT: f64 = 0.0001;

/// Options recognised by the multi-level driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LouvainConfig {
    /// Hard cap on coarsening rounds.
    pub max_levels: usize,
    /// Local-move rounds per level.
    pub max_iterations: usize,
    /// Minimum modularity improvement between consecutive levels to keep going.
    pub tolerance: f64,
    /// Keep the assignment of every level rather than only the final one.
    pub include_intermediate_communities: bool,
    /// Node property holding an initial community per node, used at level 0.
    pub seed_property: Option<String>,
    /// Worker threads, which is also the number of parallel local-move tasks.
    pub concurrency: usize,
}

impl Default for LouvainConfig {
    fn default() -> Self {
        LouvainConfig {
            max_levels: 10,
            max_iterations: 10,
            tolerance: TOLERANCE_DEFAULT,
            include_intermediate_communities: false,
            seed_property: None,
            concurrency: num_cpus::get(),
        }
    }
}

impl LouvainConfig {
    /// Load a configuration from a YAML file, missing fields take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        serde_yaml::from_reader(reader).map_err(|e| Error::InvalidConfig {
            name: "file",
            message: format!("{}: {}", path.display(), e),
        })
    }

    /// Check every option before any computation starts.
    pub fn validate(&self) -> Result<()> {
        if self.max_levels == 0 {
            return Err(Error::InvalidConfig {
                name: "max_levels",
                message: "must be positive".to_owned(),
            });
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig {
                name: "max_iterations",
                message: "must be positive".to_owned(),
            });
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig {
                name: "concurrency",
                message: "must be positive".to_owned(),
            });
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(Error::InvalidConfig {
                name: "tolerance",
                message: format!("must be a non-negative number, got {}", self.tolerance),
            });
        }
        Ok(())
    }
}
