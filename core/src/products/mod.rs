//! Product generation contracts and per-stage fan-out.

pub mod fanout;

pub use fanout::{PendingProduct, ProductBatch, ProductFanout, ProductOutcome};

use crate::config::ProductConfig;
use crate::volume::Dataset;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ProductError {
    #[error("product type '{0}' not supported for this dataset format")]
    UnsupportedType(String),
    #[error("dataset has no fields to write")]
    EmptyDataset,
    #[error("writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serializing dataset: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{0}")]
    Failed(String),
}

pub type ProductResult<T> = Result<T, ProductError>;

/// Generates products from one stage artifact.
pub trait ProductGenerator: Send + Sync {
    fn generate(&self, dataset: &Dataset, config: &ProductConfig) -> ProductResult<()>;
}

impl<F> ProductGenerator for F
where
    F: Fn(&Dataset, &ProductConfig) -> ProductResult<()> + Send + Sync,
{
    fn generate(&self, dataset: &Dataset, config: &ProductConfig) -> ProductResult<()> {
        self(dataset, config)
    }
}
