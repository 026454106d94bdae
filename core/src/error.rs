//! Fatal and discovery error types.
//!
//! Only [`FlowError`] ever terminates a run. Stage and product failures have
//! their own types and are contained at their call boundary.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Startup failures that abort the run before the main loop.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("reading config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("config file {0} does not contain a mapping")]
    ConfigNotMapping(PathBuf),
    #[error("config: parameter '{0}' undefined")]
    MissingParameter(String),
    #[error("config: parameter '{name}' invalid: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("dataset '{0}' declared more than once")]
    DuplicateDataset(String),
    #[error("unknown dataset type '{kind}' for dataset '{dataset}'")]
    UnknownStageType { kind: String, dataset: String },
    #[error("no product generator for format '{format}' (dataset '{dataset}')")]
    UnknownProductFormat { format: String, dataset: String },
    #[error("trajectory {path}: {reason}")]
    Trajectory { path: PathBuf, reason: String },
    #[error("no data type descriptors configured for master source")]
    NoMasterDescriptor,
    #[error(
        "could not find any valid volumes between {start} and {end} for master scan '{scan}' and master data type '{descriptor}'"
    )]
    NoVolumes {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        scan: String,
        descriptor: String,
    },
    #[error("start and end time required when no trajectory is given")]
    MissingTimeWindow,
    #[error("starting task runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Failures of the file-locator and volume-loader collaborators.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("listing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decoding volume {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no data path configured for {0}")]
    NoDataPath(String),
    #[error("no volume of {descriptor} at {timestamp}")]
    VolumeNotFound {
        descriptor: String,
        timestamp: DateTime<Utc>,
    },
}

pub type FlowResult<T> = Result<T, FlowError>;
