use crate::config::ProductConfig;
use crate::math::StatsHelper;
use crate::products::{ProductError, ProductGenerator, ProductResult};
use crate::volume::Dataset;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

pub const SAVE_VOLUME: &str = "SAVEVOL";
pub const FIELD_STATS: &str = "FIELD_STATS";

/// Products for volume-shaped datasets.
pub struct VolumeProducts;

impl VolumeProducts {
    /// Target file of a `SAVEVOL` product.
    pub fn output_path(dataset: &Dataset, config: &ProductConfig) -> PathBuf {
        let stamp = config
            .timeinfo
            .or(dataset.timestamp)
            .map(|ts| ts.format("%Y%m%d%H%M%S").to_string())
            .unwrap_or_else(|| "notime".to_string());
        config
            .output_dir()
            .join(format!("{stamp}_{}.json", config.prdname))
    }

    fn save(dataset: &Dataset, config: &ProductConfig) -> ProductResult<()> {
        if dataset.is_empty() {
            return Err(ProductError::EmptyDataset);
        }
        let path = Self::output_path(dataset, config);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ProductError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(&path).map_err(|source| ProductError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), dataset)?;
        log::info!("saved {}", path.display());
        Ok(())
    }

    fn stats(dataset: &Dataset, config: &ProductConfig) -> ProductResult<()> {
        if dataset.is_empty() {
            return Err(ProductError::EmptyDataset);
        }
        for (name, field) in &dataset.fields {
            match StatsHelper::summarize(&field.data) {
                Some(s) => log::info!(
                    "{}/{} field {name}: rms {:.3} min {:.3} max {:.3} ({} gates)",
                    config.dsname,
                    config.prdname,
                    s.rms,
                    s.min,
                    s.max,
                    s.count
                ),
                None => log::info!("{}/{} field {name}: no valid gates", config.dsname, config.prdname),
            }
        }
        Ok(())
    }
}

impl ProductGenerator for VolumeProducts {
    fn generate(&self, dataset: &Dataset, config: &ProductConfig) -> ProductResult<()> {
        match config.kind.as_str() {
            SAVE_VOLUME => Self::save(dataset, config),
            FIELD_STATS => Self::stats(dataset, config),
            other => Err(ProductError::UnsupportedType(other.to_string())),
        }
    }
}
