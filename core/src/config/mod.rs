//! Layered configuration: run-wide, data-discovery and per-dataset views.

pub mod descriptor;
pub mod reader;
pub mod run;
pub mod stage;
pub mod values;

pub use descriptor::{parse_dataset_descriptor, radar_id, DataTypeDescriptor};
pub use reader::{read_config, read_layered_mapping};
pub use run::{DiscoveryConfig, RunConfig};
pub use stage::{ProductConfig, ProductSettings, StageConfig};

use crate::error::{FlowError, FlowResult};
use serde_yaml::Mapping;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// The three configuration views a run is built from.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub run: Arc<RunConfig>,
    pub discovery: Arc<DiscoveryConfig>,
    /// One entry per declared dataset, in declaration order.
    pub stages: Vec<StageConfig>,
}

impl LayeredConfig {
    /// Reads the main/location/product file chain and assembles it.
    pub fn load(path: &Path) -> FlowResult<Self> {
        let mapping = read_layered_mapping(path)?;
        Self::assemble(mapping)
    }

    pub fn assemble(mapping: Mapping) -> FlowResult<Self> {
        let run = RunConfig::from_mapping(mapping)?;
        let discovery = DiscoveryConfig::from(&run);

        let mut seen = HashSet::new();
        let mut stages = Vec::with_capacity(run.dataset_list.len());
        for raw in &run.dataset_list {
            let (level, name) = parse_dataset_descriptor(raw);
            if !seen.insert(name.clone()) {
                return Err(FlowError::DuplicateDataset(name));
            }
            stages.push(StageConfig::build(&run, &level, &name)?);
        }

        Ok(Self {
            run: Arc::new(run),
            discovery: Arc::new(discovery),
            stages,
        })
    }

    /// Input descriptors of one source, de-duplicated in declaration order.
    ///
    /// Intermediate (`PROC`) descriptors never reach discovery.
    pub fn source_descriptors(&self, source_index: usize) -> Vec<DataTypeDescriptor> {
        let radar = radar_id(source_index);
        let mut descriptors: Vec<DataTypeDescriptor> = Vec::new();
        for descriptor in self.stages.iter().flat_map(|stage| stage.datatypes.iter()) {
            if descriptor.is_intermediate() || descriptor.radar != radar {
                continue;
            }
            if !descriptors.contains(descriptor) {
                descriptors.push(descriptor.clone());
            }
        }
        descriptors
    }

    /// Descriptor lists for every configured source.
    pub fn all_source_descriptors(&self) -> Vec<Vec<DataTypeDescriptor>> {
        (0..self.run.num_radars)
            .map(|index| self.source_descriptors(index))
            .collect()
    }
}
