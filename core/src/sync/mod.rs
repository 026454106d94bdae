//! Temporal synchronization of independently sampled sources.
//!
//! The master source drives the processing clock; every secondary source is
//! aligned to each master timestamp by picking its nearest volume inside
//! `±TimeTol`.

use crate::config::{DataTypeDescriptor, DiscoveryConfig};
use crate::error::DiscoveryError;
use crate::io::{FileLocator, VolumeFile, VolumeLoader};
use crate::telemetry::MetricsRecorder;
use crate::volume::{SensorVolume, SourceSet};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Picks the descriptor that drives the master clock.
///
/// The first sensor-reading descriptor wins. When only forecast/terrain
/// descriptors exist, a reflectivity descriptor of the same radar stands in.
pub fn select_master_descriptor(descriptors: &[DataTypeDescriptor]) -> Option<DataTypeDescriptor> {
    if let Some(primary) = descriptors.iter().find(|d| !d.is_auxiliary()) {
        return Some(primary.clone());
    }

    let auxiliary = descriptors.first()?;
    let group = match auxiliary.group.as_str() {
        "RAD4ALPCOSMO" | "RAD4ALPDEM" => "RAD4ALP",
        _ => "RAINBOW",
    };
    Some(DataTypeDescriptor {
        radar: auxiliary.radar.clone(),
        group: group.to_string(),
        datatype: "dBZ".to_string(),
        dataset: None,
        product: None,
    })
}

/// First scan configured for the descriptor's radar.
pub fn master_scan(descriptor: &DataTypeDescriptor, scan_list: Option<&[Vec<String>]>) -> Option<String> {
    let index = descriptor.source_index()?;
    scan_list?.get(index)?.first().cloned()
}

/// Fully materialized, time-ordered listing of one descriptor's volumes.
pub fn list_volumes(
    locator: &dyn FileLocator,
    descriptor: &DataTypeDescriptor,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    discovery: &DiscoveryConfig,
    scan: Option<&str>,
) -> Result<Vec<VolumeFile>, DiscoveryError> {
    let mut files = locator.list_files(descriptor, start, end, discovery, scan)?;
    // stable: equal timestamps keep discovery order
    files.sort_by_key(|f| f.timestamp);
    Ok(files)
}

/// Candidate closest to `master`; on equal distance the earlier entry wins.
pub fn nearest_candidate(master: DateTime<Utc>, candidates: &[VolumeFile]) -> Option<&VolumeFile> {
    let mut best: Option<(&VolumeFile, Duration)> = None;
    for candidate in candidates {
        let distance = (candidate.timestamp - master).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((candidate, distance)),
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Master-source selection and secondary-source alignment for one run.
pub struct TemporalSynchronizer {
    locator: Arc<dyn FileLocator>,
    loader: Arc<dyn VolumeLoader>,
    discovery: Arc<DiscoveryConfig>,
    /// Input descriptors per source; index 0 is the master source.
    sources: Vec<Vec<DataTypeDescriptor>>,
    tolerance: Duration,
    metrics: Arc<MetricsRecorder>,
}

impl TemporalSynchronizer {
    pub fn new(
        locator: Arc<dyn FileLocator>,
        loader: Arc<dyn VolumeLoader>,
        discovery: Arc<DiscoveryConfig>,
        sources: Vec<Vec<DataTypeDescriptor>>,
        tolerance: Duration,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            locator,
            loader,
            discovery,
            sources,
            tolerance,
            metrics,
        }
    }

    pub fn master_descriptor(&self) -> Option<DataTypeDescriptor> {
        self.sources
            .first()
            .and_then(|descriptors| select_master_descriptor(descriptors))
    }

    fn scan_for(&self, descriptor: &DataTypeDescriptor) -> Option<String> {
        master_scan(descriptor, self.discovery.scan_list.as_deref())
    }

    /// Master files in `[start, end]`, with the descriptor and scan used.
    pub fn master_files(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(Vec<VolumeFile>, Option<DataTypeDescriptor>, Option<String>), DiscoveryError> {
        let Some(descriptor) = self.master_descriptor() else {
            return Ok((Vec::new(), None, None));
        };
        let scan = self.scan_for(&descriptor);
        let files = list_volumes(
            self.locator.as_ref(),
            &descriptor,
            start,
            end,
            &self.discovery,
            scan.as_deref(),
        )?;
        Ok((files, Some(descriptor), scan))
    }

    /// Aligns one secondary source to the master timestamp.
    ///
    /// A missing candidate or a failed load leaves the slot empty and is
    /// logged as an alignment gap.
    pub fn align_secondary_source(
        &self,
        master: DateTime<Utc>,
        source_index: usize,
    ) -> Option<SensorVolume> {
        let descriptors = self.sources.get(source_index)?;
        let Some(descriptor) = select_master_descriptor(descriptors) else {
            log::warn!(
                "no data type configured for {}; slot left empty",
                crate::config::radar_id(source_index)
            );
            self.metrics.record_alignment_gap();
            return None;
        };
        let scan = self.scan_for(&descriptor);

        let (Some(lower), Some(upper)) = (
            master.checked_sub_signed(self.tolerance),
            master.checked_add_signed(self.tolerance),
        ) else {
            log::warn!("tolerance window around {master} is out of range for {descriptor}");
            self.metrics.record_alignment_gap();
            return None;
        };

        let candidates = match list_volumes(
            self.locator.as_ref(),
            &descriptor,
            lower,
            upper,
            &self.discovery,
            scan.as_deref(),
        ) {
            Ok(files) => files,
            Err(err) => {
                log::warn!("listing candidates for {descriptor}: {err}");
                self.metrics.record_alignment_gap();
                return None;
            }
        };

        let Some(chosen) = nearest_candidate(master, &candidates) else {
            log::warn!(
                "Could not find any valid volume for reference time {} and radar {}",
                master.format("%Y-%m-%d %H:%M:%S"),
                descriptor.radar
            );
            self.metrics.record_alignment_gap();
            return None;
        };

        match self
            .loader
            .load_volume(chosen.timestamp, descriptors, &self.discovery)
        {
            Ok(volume) => Some(volume),
            Err(err) => {
                log::warn!("loading {} at {}: {err}", descriptor.radar, chosen.timestamp);
                self.metrics.record_alignment_gap();
                None
            }
        }
    }

    /// Builds the source set for one master timestamp.
    pub fn align_sources(&self, master: DateTime<Utc>) -> SourceSet {
        let mut set = SourceSet::with_sources(self.sources.len());

        let master_volume = match self.sources.first() {
            Some(descriptors) => match self.loader.load_volume(master, descriptors, &self.discovery) {
                Ok(volume) => Some(volume),
                Err(err) => {
                    log::warn!("loading master volume at {master}: {err}");
                    self.metrics.record_alignment_gap();
                    None
                }
            },
            None => None,
        };
        set.set(0, master_volume);

        for index in 1..self.sources.len() {
            set.set(index, self.align_secondary_source(master, index));
        }
        set
    }
}
