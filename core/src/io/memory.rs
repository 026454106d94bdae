//! In-memory collaborators for engine and scheduler tests.

use super::{FileLocator, VolumeFile, VolumeLoader};
use crate::config::{DataTypeDescriptor, DiscoveryConfig};
use crate::error::DiscoveryError;
use crate::volume::SensorVolume;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Timestamps per radar id, plus a log of every listing request.
#[derive(Default)]
pub struct MemoryLocator {
    files: BTreeMap<String, Vec<DateTime<Utc>>>,
    pub requests: Mutex<Vec<(String, DateTime<Utc>, DateTime<Utc>)>>,
}

impl MemoryLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(mut self, radar: &str, stamps: &[DateTime<Utc>]) -> Self {
        self.files
            .entry(radar.to_string())
            .or_default()
            .extend_from_slice(stamps);
        self
    }
}

impl FileLocator for MemoryLocator {
    fn list_files(
        &self,
        descriptor: &DataTypeDescriptor,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _discovery: &DiscoveryConfig,
        _scan: Option<&str>,
    ) -> Result<Vec<VolumeFile>, DiscoveryError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((descriptor.radar.clone(), start, end));
        }
        Ok(self
            .files
            .get(&descriptor.radar)
            .map(|stamps| {
                stamps
                    .iter()
                    .filter(|ts| **ts >= start && **ts <= end)
                    .map(|ts| VolumeFile::new(format!("{}/{}", descriptor.radar, ts.timestamp()), *ts))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Returns a copy of a template volume retimed to the requested timestamp.
#[derive(Default)]
pub struct MemoryLoader {
    templates: BTreeMap<String, SensorVolume>,
    pub loads: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, volume: SensorVolume) -> Self {
        self.templates.insert(volume.source.clone(), volume);
        self
    }
}

impl VolumeLoader for MemoryLoader {
    fn load_volume(
        &self,
        timestamp: DateTime<Utc>,
        descriptors: &[DataTypeDescriptor],
        _discovery: &DiscoveryConfig,
    ) -> Result<SensorVolume, DiscoveryError> {
        let radar = descriptors
            .first()
            .map(|d| d.radar.clone())
            .unwrap_or_default();
        if let Ok(mut loads) = self.loads.lock() {
            loads.push((radar.clone(), timestamp));
        }
        let mut volume = self
            .templates
            .get(&radar)
            .cloned()
            .unwrap_or_else(|| SensorVolume::new(radar.clone(), timestamp));
        volume.timestamp = timestamp;
        Ok(volume)
    }
}
