//! Parallel processing configuration
//!
//! Payload reductions such as [`crate::statistics::value_range`] run on Rayon's
//! global thread pool. This module configures that pool once per process.

use crate::errors::{Result, StoreError};
use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

/// Configuration for parallel processing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Create a configuration that uses a specific number of threads
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Create a configuration that uses all available CPU cores
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    /// Set up the global Rayon thread pool with the specified configuration.
    ///
    /// The global pool can only be built once; a second call returns
    /// [`StoreError::ThreadPoolError`].
    pub fn setup_global_pool(&self) -> Result<()> {
        if let Some(num_threads) = self.num_threads {
            ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
                .map_err(|e| {
                    StoreError::ThreadPoolError(format!(
                        "Failed to initialize thread pool with {} threads: {}",
                        num_threads, e
                    ))
                })?;

            info!(threads = num_threads, "configured parallel processing");
        } else {
            debug!("using default thread pool configuration");
        }

        Ok(())
    }

    /// Get the current number of threads being used
    pub fn current_threads(&self) -> usize {
        rayon::current_num_threads()
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
}

/// Get information about the current parallel configuration
pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
    }
}
