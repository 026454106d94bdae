//! Type-tag registries for dataset stages and product generators.
//!
//! Tags are resolved once at startup; an unknown tag aborts the run.

use crate::error::{FlowError, FlowResult};
use crate::prelude::DatasetStage;
use crate::processing::{AccumulateStage, RawStage, ThresholdStage};
use crate::prodgen::VolumeProducts;
use crate::products::ProductGenerator;
use std::collections::HashMap;
use std::sync::Arc;

/// Output format tag of volume-shaped datasets.
pub const VOLUME_FORMAT: &str = "VOL";

#[derive(Clone)]
pub struct StageEntry {
    pub stage: Arc<dyn DatasetStage>,
    pub format: String,
}

#[derive(Clone, Default)]
pub struct StageRegistry {
    entries: HashMap<String, StageEntry>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the reference stages.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("RAW", VOLUME_FORMAT, RawStage);
        registry.register("THRESHOLD", VOLUME_FORMAT, ThresholdStage);
        registry.register("ACCUMULATE", VOLUME_FORMAT, AccumulateStage);
        registry
    }

    pub fn register<S>(&mut self, kind: &str, format: &str, stage: S) -> &mut Self
    where
        S: DatasetStage + 'static,
    {
        self.register_shared(kind, format, Arc::new(stage))
    }

    pub fn register_shared(&mut self, kind: &str, format: &str, stage: Arc<dyn DatasetStage>) -> &mut Self {
        self.entries.insert(
            kind.to_string(),
            StageEntry {
                stage,
                format: format.to_string(),
            },
        );
        self
    }

    /// Stage implementation and output format for a dataset type.
    pub fn resolve(&self, kind: &str, dataset: &str) -> FlowResult<(Arc<dyn DatasetStage>, String)> {
        self.entries
            .get(kind)
            .map(|entry| (Arc::clone(&entry.stage), entry.format.clone()))
            .ok_or_else(|| FlowError::UnknownStageType {
                kind: kind.to_string(),
                dataset: dataset.to_string(),
            })
    }
}

#[derive(Clone, Default)]
pub struct ProductRegistry {
    generators: HashMap<String, Arc<dyn ProductGenerator>>,
}

impl ProductRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(VOLUME_FORMAT, VolumeProducts);
        registry
    }

    pub fn register<G>(&mut self, format: &str, generator: G) -> &mut Self
    where
        G: ProductGenerator + 'static,
    {
        self.register_shared(format, Arc::new(generator))
    }

    pub fn register_shared(&mut self, format: &str, generator: Arc<dyn ProductGenerator>) -> &mut Self {
        self.generators.insert(format.to_string(), generator);
        self
    }

    /// Generator for a stage's output format.
    pub fn resolve(&self, format: &str, dataset: &str, _kind: &str) -> FlowResult<Arc<dyn ProductGenerator>> {
        self.generators
            .get(format)
            .cloned()
            .ok_or_else(|| FlowError::UnknownProductFormat {
                format: format.to_string(),
                dataset: dataset.to_string(),
            })
    }
}
