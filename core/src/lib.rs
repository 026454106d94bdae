//! Flow-control engine for multi-radar processing runs.
//!
//! A run reads a layered YAML configuration, picks a master source whose
//! volumes drive the clock, aligns every other source to each master
//! timestamp, and pushes the aligned volumes through dataset stages grouped
//! into barrier-separated levels. Stage artifacts fan out to products.

pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod prodgen;
pub mod products;
pub mod registry;
pub mod scheduler;
pub mod sync;
pub mod telemetry;
pub mod volume;

pub use config::LayeredConfig;
pub use engine::ExecutionOptions;
pub use error::{DiscoveryError, FlowError, FlowResult};
pub use prelude::{DatasetStage, ProcStatus, StageContext, StageOutput};
pub use registry::{ProductRegistry, StageRegistry};
pub use scheduler::{run, CancelSignal, Collaborators, RunRequest, RunSummary};
pub use volume::{Dataset, Field, SensorVolume, SourceSet};
