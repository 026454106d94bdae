use super::{source_field, source_volume};
use crate::prelude::{DatasetStage, ProcStatus, StageContext, StageOutput, StageResult};
use crate::volume::Dataset;

/// Copies the configured datatype fields out of their source volumes.
///
/// The first datatype's source becomes the reference source.
pub struct RawStage;

impl DatasetStage for RawStage {
    fn process(&self, status: ProcStatus, ctx: StageContext<'_>) -> StageResult<StageOutput> {
        if status != ProcStatus::Process {
            return Ok(StageOutput::empty());
        }

        let mut dataset = Dataset::new(ctx.timestamp);
        let mut reference = None;
        for descriptor in ctx.config.datatypes.iter().filter(|d| !d.is_auxiliary()) {
            let (index, volume) = source_volume(&ctx, descriptor)?;
            let field = source_field(volume, descriptor)?;
            dataset.fields.insert(descriptor.datatype.clone(), field.clone());
            reference.get_or_insert(index);
            if dataset.timestamp.is_none() {
                dataset.timestamp = Some(volume.timestamp);
            }
        }

        Ok(match reference {
            Some(index) => StageOutput::with_dataset(dataset, index),
            None => StageOutput::empty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::{StageError, StageState};
    use crate::processing::testing::{at, sources, stage_config};
    use ndarray::Array2;

    #[test]
    fn copies_field_and_points_at_its_source() {
        let config = stage_config("RAW", "");
        let mut state = StageState::default();
        let set = sources(Array2::from_elem((2, 3), 7.0), 5);
        let ctx = StageContext {
            config: &config,
            state: &mut state,
            sources: Some(&set),
            timestamp: Some(at(5)),
            trajectory: None,
            run_info: "",
        };
        let output = RawStage.process(ProcStatus::Process, ctx).unwrap();
        assert_eq!(output.reference_source, Some(1));
        let dataset = output.dataset.unwrap();
        assert_eq!(dataset.timestamp, Some(at(5)));
        assert_eq!(dataset.fields["dBZ"].shape(), (2, 3));
    }

    #[test]
    fn missing_source_is_a_stage_error() {
        let config = stage_config("RAW", "");
        let mut state = StageState::default();
        let ctx = StageContext {
            config: &config,
            state: &mut state,
            sources: None,
            timestamp: Some(at(5)),
            trajectory: None,
            run_info: "",
        };
        let err = RawStage.process(ProcStatus::Process, ctx).unwrap_err();
        assert!(matches!(err, StageError::MissingSource(ref id) if id == "RADAR002"));
    }
}
