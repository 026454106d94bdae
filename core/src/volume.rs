//! Sensor volumes, the per-cycle source set, and stage output datasets.

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One named sensor field laid out as rays × gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub units: String,
    pub data: Array2<f32>,
}

impl Field {
    pub fn new(units: impl Into<String>, data: Array2<f32>) -> Self {
        Self {
            units: units.into(),
            data,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn byte_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Data of one source at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorVolume {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub fields: BTreeMap<String, Field>,
}

impl SensorVolume {
    pub fn new(source: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    /// Inserts a field. Returns `false` when the name exists and
    /// `replace_existing` is not set.
    pub fn add_field(&mut self, name: impl Into<String>, field: Field, replace_existing: bool) -> bool {
        let name = name.into();
        if !replace_existing && self.fields.contains_key(&name) {
            return false;
        }
        self.fields.insert(name, field);
        true
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn byte_size(&self) -> usize {
        self.fields.values().map(Field::byte_size).sum()
    }
}

/// One slot per configured source for a single master timestamp.
///
/// The length is fixed at construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceSet {
    slots: Vec<Option<SensorVolume>>,
}

impl SourceSet {
    pub fn with_sources(count: usize) -> Self {
        Self {
            slots: vec![None; count],
        }
    }

    pub fn from_slots(slots: Vec<Option<SensorVolume>>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SensorVolume> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut SensorVolume> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Fills a slot. Indices beyond the configured source count are ignored.
    pub fn set(&mut self, index: usize, volume: Option<SensorVolume>) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = volume;
                true
            }
            None => false,
        }
    }

    pub fn slots(&self) -> &[Option<SensorVolume>] {
        &self.slots
    }

    pub fn byte_size(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .map(SensorVolume::byte_size)
            .sum()
    }
}

/// Artifact produced by a stage invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: BTreeMap<String, Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl Dataset {
    pub fn new(timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndarray::Array2;

    fn field(value: f32) -> Field {
        Field::new("dBZ", Array2::from_elem((2, 3), value))
    }

    #[test]
    fn add_field_respects_replace_flag() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut volume = SensorVolume::new("RADAR001", ts);
        assert!(volume.add_field("dBZ", field(1.0), false));
        assert!(!volume.add_field("dBZ", field(2.0), false));
        assert_eq!(volume.field("dBZ").unwrap().data[[0, 0]], 1.0);
        assert!(volume.add_field("dBZ", field(2.0), true));
        assert_eq!(volume.field("dBZ").unwrap().data[[0, 0]], 2.0);
        assert_eq!(volume.byte_size(), 6 * 4);
    }

    #[test]
    fn source_set_never_grows() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut set = SourceSet::with_sources(2);
        assert!(set.set(1, Some(SensorVolume::new("RADAR002", ts))));
        assert!(!set.set(2, Some(SensorVolume::new("RADAR003", ts))));
        assert_eq!(set.len(), 2);
        assert!(set.get(0).is_none());
        assert_eq!(set.get(1).unwrap().source, "RADAR002");
    }
}
