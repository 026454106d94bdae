//! Level-ordered execution of dataset stages.

pub mod executor;
pub mod levels;
pub mod merge;
pub mod tasks;

pub use executor::{run_stage, CycleReport, ExecutionEngine};
pub use levels::DatasetLevelGraph;
pub use merge::merge_output;
pub use tasks::TaskPool;

use std::time::Duration;

/// Concurrency and polling switches handed to the scheduler and engine.
///
/// Both parallel modes are off by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Run the stages of a level as concurrent tasks.
    pub parallel_datasets: bool,
    /// Run the products of a stage as concurrent tasks.
    pub parallel_products: bool,
    /// Pause between real-time polls that found nothing to do.
    pub idle_wait: Duration,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            parallel_datasets: false,
            parallel_products: false,
            idle_wait: Duration::from_secs(1),
        }
    }
}

impl ExecutionOptions {
    pub fn needs_pool(&self) -> bool {
        self.parallel_datasets || self.parallel_products
    }
}
