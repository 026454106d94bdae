//! Reference dataset stages registered under the `VOL` format.

pub mod accumulate;
pub mod raw;
pub mod threshold;

pub use accumulate::AccumulateStage;
pub use raw::RawStage;
pub use threshold::ThresholdStage;

use crate::config::{radar_id, DataTypeDescriptor};
use crate::prelude::{StageContext, StageError, StageResult};
use crate::volume::{Field, SensorVolume};

/// Volume and slot index a descriptor refers to.
pub(crate) fn source_volume<'a>(
    ctx: &StageContext<'a>,
    descriptor: &DataTypeDescriptor,
) -> StageResult<(usize, &'a SensorVolume)> {
    let index = descriptor.source_index().ok_or_else(|| {
        StageError::InvalidInput(format!("bad radar identifier '{}'", descriptor.radar))
    })?;
    let volume = ctx
        .sources
        .and_then(|sources| sources.get(index))
        .ok_or_else(|| StageError::MissingSource(radar_id(index)))?;
    Ok((index, volume))
}

pub(crate) fn source_field<'a>(
    volume: &'a SensorVolume,
    descriptor: &DataTypeDescriptor,
) -> StageResult<&'a Field> {
    volume
        .field(&descriptor.datatype)
        .ok_or_else(|| StageError::MissingField {
            field: descriptor.datatype.clone(),
            source_id: volume.source.clone(),
        })
}

pub(crate) fn first_datatype<'a>(ctx: &StageContext<'a>) -> StageResult<&'a DataTypeDescriptor> {
    ctx.config
        .datatypes
        .first()
        .ok_or_else(|| StageError::InvalidInput(format!("dataset '{}' has no datatype", ctx.config.name)))
}
