use super::{first_datatype, source_field, source_volume};
use crate::prelude::{DatasetStage, ProcStatus, StageContext, StageError, StageOutput, StageResult};
use crate::volume::{Dataset, Field};
use chrono::{DateTime, Utc};
use ndarray::Array2;

#[derive(Debug, Default)]
struct Accumulator {
    sum: Option<Array2<f32>>,
    count: usize,
    units: String,
    source_index: usize,
    last_seen: Option<DateTime<Utc>>,
}

/// Sums one field over the whole run and emits its mean on FINALIZE.
pub struct AccumulateStage;

impl DatasetStage for AccumulateStage {
    fn process(&self, status: ProcStatus, ctx: StageContext<'_>) -> StageResult<StageOutput> {
        match status {
            ProcStatus::Init => {
                ctx.state.store(Accumulator::default());
                ctx.state.initialized = true;
                Ok(StageOutput::empty())
            }
            ProcStatus::Process => {
                let descriptor = first_datatype(&ctx)?;
                let (index, volume) = source_volume(&ctx, descriptor)?;
                let field = source_field(volume, descriptor)?;
                let acc = ctx
                    .state
                    .cached_mut::<Accumulator>()
                    .ok_or_else(|| StageError::Internal("accumulator not initialized".into()))?;

                match acc.sum.as_mut() {
                    Some(sum) if sum.dim() != field.data.dim() => {
                        return Err(StageError::ShapeMismatch {
                            field: descriptor.datatype.clone(),
                            expected: sum.dim(),
                            actual: field.data.dim(),
                        });
                    }
                    Some(sum) => sum.zip_mut_with(&field.data, |s, &v| {
                        if v.is_finite() {
                            *s += v;
                        }
                    }),
                    None => acc.sum = Some(field.data.mapv(|v| if v.is_finite() { v } else { 0.0 })),
                }
                acc.count += 1;
                acc.units = field.units.clone();
                acc.source_index = index;
                acc.last_seen = ctx.timestamp.or(Some(volume.timestamp));
                Ok(StageOutput::empty())
            }
            ProcStatus::Finalize => {
                let descriptor = first_datatype(&ctx)?;
                let Some(acc) = ctx.state.take::<Accumulator>() else {
                    return Ok(StageOutput::empty());
                };
                let Some(sum) = acc.sum.filter(|_| acc.count > 0) else {
                    log::info!("dataset '{}': nothing accumulated", ctx.config.name);
                    return Ok(StageOutput::empty());
                };
                let mean = sum / acc.count as f32;
                let mut dataset = Dataset::new(acc.last_seen)
                    .with_field(format!("{}_mean", descriptor.datatype), Field::new(acc.units, mean));
                dataset.notes.push(format!("mean of {} volumes", acc.count));
                Ok(StageOutput::with_dataset(dataset, acc.source_index))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::StageState;
    use crate::processing::testing::{sources, stage_config};
    use crate::volume::SourceSet;
    use ndarray::array;

    fn call(
        status: ProcStatus,
        state: &mut StageState,
        set: Option<&SourceSet>,
    ) -> StageResult<StageOutput> {
        let config = stage_config("ACCUMULATE", "");
        let ctx = StageContext {
            config: &config,
            state,
            sources: set,
            timestamp: None,
            trajectory: None,
            run_info: "",
        };
        AccumulateStage.process(status, ctx)
    }

    #[test]
    fn emits_mean_on_finalize() {
        let mut state = StageState::default();
        call(ProcStatus::Init, &mut state, None).unwrap();
        assert!(state.initialized);
        for (value, minute) in [(2.0, 0), (4.0, 5)] {
            let set = sources(array![[value, value]], minute);
            assert!(call(ProcStatus::Process, &mut state, Some(&set)).unwrap().dataset.is_none());
        }
        let output = call(ProcStatus::Finalize, &mut state, None).unwrap();
        assert_eq!(output.reference_source, Some(1));
        let dataset = output.dataset.unwrap();
        assert_eq!(dataset.fields["dBZ_mean"].data, array![[3.0, 3.0]]);
    }

    #[test]
    fn shape_change_is_rejected() {
        let mut state = StageState::default();
        call(ProcStatus::Init, &mut state, None).unwrap();
        call(ProcStatus::Process, &mut state, Some(&sources(array![[1.0, 1.0]], 0))).unwrap();
        let err = call(ProcStatus::Process, &mut state, Some(&sources(array![[1.0]], 5))).unwrap_err();
        assert!(matches!(err, StageError::ShapeMismatch { expected: (1, 2), actual: (1, 1), .. }));
    }

    #[test]
    fn process_without_init_fails_and_finalize_is_empty() {
        let mut state = StageState::default();
        let err = call(ProcStatus::Process, &mut state, Some(&sources(array![[1.0]], 0))).unwrap_err();
        assert!(matches!(err, StageError::Internal(_)));
        assert!(call(ProcStatus::Finalize, &mut state, None).unwrap().dataset.is_none());
    }
}
