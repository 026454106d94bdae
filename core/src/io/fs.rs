use super::{FileLocator, VolumeFile, VolumeLoader};
use crate::config::{DataTypeDescriptor, DiscoveryConfig};
use crate::error::DiscoveryError;
use crate::volume::SensorVolume;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};

const VOLUME_EXTENSION: &str = "json";
const STAMP_LEN: usize = 14;

/// Finds volumes under `<datapath>/<RADARnnn>/[<scan>/]`.
///
/// Each file stem must carry a `YYYYMMDDHHMMSS` run; files without one are
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct DirectoryLocator;

impl DirectoryLocator {
    pub fn new() -> Self {
        Self
    }

    fn volume_dir(
        descriptor: &DataTypeDescriptor,
        discovery: &DiscoveryConfig,
        scan: Option<&str>,
    ) -> Result<PathBuf, DiscoveryError> {
        let index = descriptor.source_index().unwrap_or(0);
        let base = discovery
            .data_path_for(index)
            .ok_or_else(|| DiscoveryError::NoDataPath(descriptor.radar.clone()))?;
        let mut dir = base.join(&descriptor.radar);
        if let Some(scan) = scan {
            dir.push(scan);
        }
        Ok(dir)
    }
}

impl FileLocator for DirectoryLocator {
    fn list_files(
        &self,
        descriptor: &DataTypeDescriptor,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        discovery: &DiscoveryConfig,
        scan: Option<&str>,
    ) -> Result<Vec<VolumeFile>, DiscoveryError> {
        let dir = Self::volume_dir(descriptor, discovery, scan)?;
        if !dir.is_dir() {
            log::debug!("volume directory {} does not exist", dir.display());
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|source| DiscoveryError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| DiscoveryError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(VOLUME_EXTENSION) {
                continue;
            }
            let Some(timestamp) = timestamp_from_path(&path) else {
                continue;
            };
            if timestamp >= start && timestamp <= end {
                files.push(VolumeFile::new(path, timestamp));
            }
        }

        files.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.path.cmp(&b.path)));
        Ok(files)
    }
}

/// Reads JSON-encoded [`SensorVolume`]s found by a [`DirectoryLocator`].
#[derive(Debug, Clone, Default)]
pub struct JsonVolumeLoader {
    locator: DirectoryLocator,
}

impl JsonVolumeLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VolumeLoader for JsonVolumeLoader {
    fn load_volume(
        &self,
        timestamp: DateTime<Utc>,
        descriptors: &[DataTypeDescriptor],
        discovery: &DiscoveryConfig,
    ) -> Result<SensorVolume, DiscoveryError> {
        let master = crate::sync::select_master_descriptor(descriptors).ok_or_else(|| {
            DiscoveryError::VolumeNotFound {
                descriptor: "<none>".into(),
                timestamp,
            }
        })?;
        let scan = crate::sync::master_scan(&master, discovery.scan_list.as_deref());
        let file = self
            .locator
            .list_files(&master, timestamp, timestamp, discovery, scan.as_deref())?
            .into_iter()
            .next()
            .ok_or_else(|| DiscoveryError::VolumeNotFound {
                descriptor: master.to_string(),
                timestamp,
            })?;

        let contents = fs::read_to_string(&file.path).map_err(|source| DiscoveryError::Io {
            path: file.path.clone(),
            source,
        })?;
        let mut volume: SensorVolume =
            serde_json::from_str(&contents).map_err(|source| DiscoveryError::Decode {
                path: file.path.clone(),
                source,
            })?;

        let wanted: Vec<&str> = descriptors
            .iter()
            .filter(|d| !d.is_auxiliary())
            .map(|d| d.datatype.as_str())
            .collect();
        if !wanted.is_empty() {
            volume.fields.retain(|name, _| wanted.contains(&name.as_str()));
        }
        Ok(volume)
    }
}

/// Timestamp from the first 14-digit run in a file stem.
pub fn timestamp_from_path(path: &Path) -> Option<DateTime<Utc>> {
    let stem = path.file_stem()?.to_str()?;
    let bytes = stem.as_bytes();
    let mut run_start = None;
    for (idx, byte) in bytes.iter().enumerate() {
        if byte.is_ascii_digit() {
            let start = *run_start.get_or_insert(idx);
            if idx + 1 - start == STAMP_LEN {
                let stamp = &stem[start..=idx];
                return NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S")
                    .ok()
                    .map(|naive| Utc.from_utc_datetime(&naive));
            }
        } else {
            run_start = None;
        }
    }
    None
}

/// File name the reference layout expects for a volume.
pub fn volume_file_name(prefix: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "{}{}.{}",
        prefix,
        timestamp.format("%Y%m%d%H%M%S"),
        VOLUME_EXTENSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::volume::Field;
    use ndarray::Array2;
    use tempfile::tempdir;

    fn discovery(root: &Path) -> DiscoveryConfig {
        let yaml = format!(
            "name: t\nconfigpath: /c\nsaveimgbasepath: /o\ndataSetList: []\ndatapath: {}\n",
            root.display()
        );
        DiscoveryConfig::from(&RunConfig::from_mapping(serde_yaml::from_str(&yaml).unwrap()).unwrap())
    }

    fn ts(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, min, 0).unwrap()
    }

    #[test]
    fn extracts_timestamp_from_stem() {
        let path = Path::new("/data/PLA20240301100500.json");
        assert_eq!(timestamp_from_path(path), Some(ts(5)));
        assert_eq!(timestamp_from_path(Path::new("/data/v123.json")), None);
    }

    #[test]
    fn lists_files_inside_window_in_time_order() {
        let dir = tempdir().unwrap();
        let radar_dir = dir.path().join("RADAR001");
        fs::create_dir_all(&radar_dir).unwrap();
        for min in [10, 0, 5, 20] {
            fs::write(radar_dir.join(volume_file_name("V", ts(min))), "{}").unwrap();
        }
        fs::write(radar_dir.join("notes.txt"), "x").unwrap();

        let descriptor = DataTypeDescriptor::parse("RADAR001:RAINBOW:dBZ");
        let files = DirectoryLocator::new()
            .list_files(&descriptor, ts(0), ts(10), &discovery(dir.path()), None)
            .unwrap();
        let stamps: Vec<_> = files.iter().map(|f| f.timestamp).collect();
        assert_eq!(stamps, vec![ts(0), ts(5), ts(10)]);
    }

    #[test]
    fn loader_keeps_requested_fields() {
        let dir = tempdir().unwrap();
        let radar_dir = dir.path().join("RADAR001");
        fs::create_dir_all(&radar_dir).unwrap();

        let mut volume = SensorVolume::new("RADAR001", ts(5));
        volume.add_field("dBZ", Field::new("dBZ", Array2::zeros((2, 2))), true);
        volume.add_field("ZDR", Field::new("dB", Array2::zeros((2, 2))), true);
        fs::write(
            radar_dir.join(volume_file_name("V", ts(5))),
            serde_json::to_string(&volume).unwrap(),
        )
        .unwrap();

        let descriptors = vec![DataTypeDescriptor::parse("RADAR001:RAINBOW:dBZ")];
        let loaded = JsonVolumeLoader::new()
            .load_volume(ts(5), &descriptors, &discovery(dir.path()))
            .unwrap();
        assert_eq!(loaded.fields.keys().collect::<Vec<_>>(), vec!["dBZ"]);

        let missing = JsonVolumeLoader::new().load_volume(ts(6), &descriptors, &discovery(dir.path()));
        assert!(matches!(missing, Err(DiscoveryError::VolumeNotFound { .. })));
    }
}
