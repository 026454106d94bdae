use crate::volume::{Dataset, SourceSet};

/// Copies every field of `dataset` into the referenced source slot,
/// replacing fields of the same name.
///
/// Returns the number of fields written. Nothing happens without sources,
/// without a dataset, or when `make_global` is unset.
pub fn merge_output(
    dataset: Option<&Dataset>,
    sources: Option<&mut SourceSet>,
    reference_source: Option<usize>,
    make_global: bool,
) -> usize {
    let (Some(dataset), Some(sources)) = (dataset, sources) else {
        return 0;
    };
    if !make_global {
        return 0;
    }

    let Some(index) = reference_source else {
        log::warn!("dataset marked global but carries no reference source; not merged");
        return 0;
    };
    let Some(volume) = sources.get_mut(index) else {
        log::warn!("reference source {index} is empty or out of range; not merged");
        return 0;
    };

    for (name, field) in &dataset.fields {
        log::info!("Adding field: {name}");
        volume.add_field(name.clone(), field.clone(), true);
    }
    dataset.fields.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{Field, SensorVolume};
    use chrono::{TimeZone, Utc};
    use ndarray::Array2;

    fn sources() -> SourceSet {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut volume = SensorVolume::new("RADAR001", ts);
        volume.add_field("dBZ", Field::new("dBZ", Array2::from_elem((1, 2), 1.0)), true);
        volume.add_field("X", Field::new("-", Array2::from_elem((1, 2), 0.0)), true);
        SourceSet::from_slots(vec![Some(volume), None])
    }

    fn artifact() -> Dataset {
        Dataset::default().with_field("X", Field::new("-", Array2::from_elem((1, 2), 9.0)))
    }

    #[test]
    fn merge_overwrites_and_leaves_other_fields() {
        let mut set = sources();
        assert_eq!(merge_output(Some(&artifact()), Some(&mut set), Some(0), true), 1);
        let volume = set.get(0).unwrap();
        assert_eq!(volume.field("X").unwrap().data[[0, 1]], 9.0);
        assert_eq!(volume.field("dBZ").unwrap().data[[0, 0]], 1.0);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut once = sources();
        merge_output(Some(&artifact()), Some(&mut once), Some(0), true);
        let mut twice = sources();
        merge_output(Some(&artifact()), Some(&mut twice), Some(0), true);
        merge_output(Some(&artifact()), Some(&mut twice), Some(0), true);
        assert_eq!(once, twice);
    }

    #[test]
    fn no_op_cases_leave_sources_untouched() {
        let original = sources();
        let mut set = sources();
        assert_eq!(merge_output(Some(&artifact()), Some(&mut set), Some(0), false), 0);
        assert_eq!(merge_output(None, Some(&mut set), Some(0), true), 0);
        assert_eq!(merge_output(Some(&artifact()), None, Some(0), true), 0);
        assert_eq!(merge_output(Some(&artifact()), Some(&mut set), Some(1), true), 0);
        assert_eq!(merge_output(Some(&artifact()), Some(&mut set), Some(7), true), 0);
        assert_eq!(merge_output(Some(&artifact()), Some(&mut set), None, true), 0);
        assert_eq!(set, original);
    }
}
