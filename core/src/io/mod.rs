//! Discovery and loading collaborators.
//!
//! The engine only talks to [`FileLocator`] and [`VolumeLoader`]; the
//! directory/JSON implementations here are the reference layout used by the
//! `processor` binary.

pub mod fs;
#[cfg(test)]
pub(crate) mod memory;
pub mod trajectory;

pub use fs::{DirectoryLocator, JsonVolumeLoader};
pub use trajectory::{Trajectory, TrajectorySample};

use crate::config::{DataTypeDescriptor, DiscoveryConfig};
use crate::error::DiscoveryError;
use crate::volume::SensorVolume;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// A discovered file and the timestamp encoded in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeFile {
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

impl VolumeFile {
    pub fn new(path: impl Into<PathBuf>, timestamp: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            timestamp,
        }
    }
}

/// Lists the files of one descriptor inside an inclusive time window.
pub trait FileLocator: Send + Sync {
    fn list_files(
        &self,
        descriptor: &DataTypeDescriptor,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        discovery: &DiscoveryConfig,
        scan: Option<&str>,
    ) -> Result<Vec<VolumeFile>, DiscoveryError>;
}

/// Loads the volume of a source at a discovered timestamp.
pub trait VolumeLoader: Send + Sync {
    fn load_volume(
        &self,
        timestamp: DateTime<Utc>,
        descriptors: &[DataTypeDescriptor],
        discovery: &DiscoveryConfig,
    ) -> Result<SensorVolume, DiscoveryError>;
}
