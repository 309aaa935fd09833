//! CPU affinity planning for the encoder process
//!
//! Derives how many logical CPUs the encoder is pinned to from the CPU core count
//! and configuration.

use crate::config::Config;

/// Share of the logical cores used when no thread count is configured
const DEFAULT_CPU_SHARE: f64 = 0.70;

/// Affinity plan derived from configuration and system resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinityPlan {
    /// Total logical CPU cores available
    pub total_cores: u32,
    /// Number of logical CPUs the encoder is restricted to
    pub threads: u32,
}

impl AffinityPlan {
    /// Derive an affinity plan from configuration
    ///
    /// Uses the following rules:
    /// - Detects CPU cores via num_cpus if not specified in config
    /// - Uses the configured thread count, or 70% of the cores (truncated)
    /// - Clamps the thread count to [1, total_cores]
    pub fn derive(cfg: &Config) -> Self {
        let total_cores = cfg
            .cpu
            .logical_cores
            .unwrap_or_else(|| num_cpus::get() as u32)
            .max(1);

        let requested = cfg
            .cpu
            .threads
            .unwrap_or_else(|| default_threads(total_cores));

        Self {
            total_cores,
            threads: requested.clamp(1, total_cores),
        }
    }

    /// Contiguous zero-based CPU list in `taskset -c` syntax, e.g. `0-7`
    pub fn cpu_list(&self) -> String {
        format!("0-{}", self.threads.saturating_sub(1))
    }
}

fn default_threads(cores: u32) -> u32 {
    (DEFAULT_CPU_SHARE * cores as f64).trunc() as u32
}
