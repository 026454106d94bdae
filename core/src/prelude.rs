use crate::config::StageConfig;
use crate::io::Trajectory;
use crate::volume::{Dataset, SourceSet};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;

/// Processing phase handed to every stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcStatus {
    /// Called once before any volume, without sources or timestamp.
    Init,
    /// Called once per master timestamp.
    Process,
    /// Called once after a clean stop, without sources.
    Finalize,
}

impl ProcStatus {
    pub fn code(self) -> u8 {
        match self {
            ProcStatus::Init => 0,
            ProcStatus::Process => 1,
            ProcStatus::Finalize => 2,
        }
    }
}

impl fmt::Display for ProcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcStatus::Init => "init",
            ProcStatus::Process => "process",
            ProcStatus::Finalize => "finalize",
        };
        f.write_str(label)
    }
}

/// Long-lived mutable state of one stage, owned by the execution engine.
///
/// Only the stage the state belongs to ever sees it, through
/// [`StageContext::state`].
#[derive(Default)]
pub struct StageState {
    pub initialized: bool,
    pub cached: Option<Box<dyn Any + Send>>,
}

impl StageState {
    /// Returns the cached value if it holds a `T`.
    pub fn cached_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.cached.as_mut().and_then(|value| value.downcast_mut::<T>())
    }

    pub fn store<T: Any + Send>(&mut self, value: T) {
        self.cached = Some(Box::new(value));
    }

    pub fn take<T: Any + Send>(&mut self) -> Option<T> {
        match self.cached.take()?.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.cached = Some(other);
                None
            }
        }
    }
}

impl fmt::Debug for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageState")
            .field("initialized", &self.initialized)
            .field("cached", &self.cached.is_some())
            .finish()
    }
}

/// Everything a stage sees during one invocation.
pub struct StageContext<'a> {
    pub config: &'a StageConfig,
    pub state: &'a mut StageState,
    pub sources: Option<&'a SourceSet>,
    pub timestamp: Option<DateTime<Utc>>,
    pub trajectory: Option<&'a Trajectory>,
    pub run_info: &'a str,
}

/// Result of one stage invocation.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub dataset: Option<Dataset>,
    /// Index of the source slot the dataset refers to.
    pub reference_source: Option<usize>,
}

impl StageOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_dataset(dataset: Dataset, reference_source: usize) -> Self {
        Self {
            dataset: Some(dataset),
            reference_source: Some(reference_source),
        }
    }
}

/// Common error type for stage execution.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no volume available for source {0}")]
    MissingSource(String),
    #[error("field '{field}' not present in volume of {source_id}")]
    MissingField { field: String, source_id: String },
    #[error("shape mismatch for field '{field}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        field: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type StageResult<T> = Result<T, StageError>;

/// A dataset transformation unit with INIT / PROCESS / FINALIZE phases.
pub trait DatasetStage: Send + Sync {
    fn process(&self, status: ProcStatus, ctx: StageContext<'_>) -> StageResult<StageOutput>;
}

impl<F> DatasetStage for F
where
    F: Fn(ProcStatus, StageContext<'_>) -> StageResult<StageOutput> + Send + Sync,
{
    fn process(&self, status: ProcStatus, ctx: StageContext<'_>) -> StageResult<StageOutput> {
        self(status, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_phase_order() {
        assert_eq!(ProcStatus::Init.code(), 0);
        assert_eq!(ProcStatus::Process.code(), 1);
        assert_eq!(ProcStatus::Finalize.code(), 2);
    }

    #[test]
    fn stage_state_round_trips_cached_value() {
        let mut state = StageState::default();
        state.store(41_u32);
        *state.cached_mut::<u32>().unwrap() += 1;
        assert!(state.cached_mut::<String>().is_none());
        assert_eq!(state.take::<String>(), None);
        assert_eq!(state.take::<u32>(), Some(42));
        assert!(state.cached.is_none());
    }
}
