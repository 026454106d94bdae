use super::{first_datatype, source_field, source_volume};
use crate::math::StatsHelper;
use crate::prelude::{DatasetStage, ProcStatus, StageContext, StageOutput, StageResult};
use crate::telemetry::LogManager;
use crate::volume::{Dataset, Field};

const DEFAULT_FACTOR: f64 = 1.2;

/// Masks gates of the first datatype that fall below `factor × RMS`.
///
/// The result is stored as `<datatype>_masked`, masked gates set to NaN.
/// `threshold_factor` overrides the default factor.
pub struct ThresholdStage;

impl DatasetStage for ThresholdStage {
    fn process(&self, status: ProcStatus, ctx: StageContext<'_>) -> StageResult<StageOutput> {
        if status != ProcStatus::Process {
            return Ok(StageOutput::empty());
        }

        let descriptor = first_datatype(&ctx)?;
        let (index, volume) = source_volume(&ctx, descriptor)?;
        let field = source_field(volume, descriptor)?;

        let factor = ctx.config.param_f64("threshold_factor").unwrap_or(DEFAULT_FACTOR) as f32;
        let threshold = StatsHelper::finite_rms(field.data.iter()) * factor;
        let mut masked_gates = 0usize;
        let data = field.data.mapv(|v| {
            if v.is_finite() && v >= threshold {
                v
            } else {
                masked_gates += 1;
                f32::NAN
            }
        });

        LogManager::new().record(&format!(
            "ThresholdStage masked {masked_gates} of {} gates",
            data.len()
        ));

        let mut dataset = Dataset::new(ctx.timestamp.or(Some(volume.timestamp)))
            .with_field(format!("{}_masked", descriptor.datatype), Field::new(field.units.clone(), data));
        dataset.notes.push(format!("threshold {threshold:.3}"));
        Ok(StageOutput::with_dataset(dataset, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::StageState;
    use crate::processing::testing::{sources, stage_config};
    use ndarray::array;

    #[test]
    fn masks_gates_below_rms_threshold() {
        let config = stage_config("THRESHOLD", "  threshold_factor: 1.0\n");
        let mut state = StageState::default();
        let set = sources(array![[0.1, 20.0], [0.2, 20.0]], 0);
        let ctx = StageContext {
            config: &config,
            state: &mut state,
            sources: Some(&set),
            timestamp: None,
            trajectory: None,
            run_info: "",
        };
        let output = ThresholdStage.process(ProcStatus::Process, ctx).unwrap();
        let dataset = output.dataset.unwrap();
        let masked = &dataset.fields["dBZ_masked"].data;
        assert!(masked[[0, 0]].is_nan());
        assert!(masked[[1, 0]].is_nan());
        assert_eq!(masked[[0, 1]], 20.0);
        assert_eq!(dataset.notes.len(), 1);
        assert!(dataset.timestamp.is_some());
    }

    #[test]
    fn init_and_finalize_do_nothing() {
        let config = stage_config("THRESHOLD", "");
        let mut state = StageState::default();
        for status in [ProcStatus::Init, ProcStatus::Finalize] {
            let ctx = StageContext {
                config: &config,
                state: &mut state,
                sources: None,
                timestamp: None,
                trajectory: None,
                run_info: "",
            };
            assert!(ThresholdStage.process(status, ctx).unwrap().dataset.is_none());
        }
    }
}
