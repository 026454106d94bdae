//! The outer control loop of a run.
//!
//! `STARTUP -> {BATCH | STREAM} -> STOPPING -> POSTPROCESS -> DONE`. Startup
//! failures abort before any stage runs; every other failure is contained
//! further down and only shows up in the [`RunSummary`] counters.

pub mod cancel;
pub mod clock;
pub mod watermark;

pub use cancel::CancelSignal;
pub use clock::{Clock, SystemClock};
pub use watermark::Watermark;

use crate::config::{LayeredConfig, RunConfig};
use crate::engine::{ExecutionEngine, ExecutionOptions, TaskPool};
use crate::error::{FlowError, FlowResult};
use crate::io::{DirectoryLocator, FileLocator, JsonVolumeLoader, Trajectory, VolumeFile, VolumeLoader};
use crate::prelude::ProcStatus;
use crate::products::ProductBatch;
use crate::registry::{ProductRegistry, StageRegistry};
use crate::sync::TemporalSynchronizer;
use crate::telemetry::{LogManager, MetricsRecorder};
use crate::volume::SourceSet;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// What the caller asks for.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub config_file: PathBuf,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Free-form tag handed to every stage and product.
    pub info: String,
    pub trajectory_file: Option<PathBuf>,
    pub realtime: bool,
}

impl RunRequest {
    pub fn new(config_file: impl Into<PathBuf>) -> Self {
        Self {
            config_file: config_file.into(),
            ..Default::default()
        }
    }
}

/// External collaborators of a run.
pub struct Collaborators {
    pub locator: Arc<dyn FileLocator>,
    pub loader: Arc<dyn VolumeLoader>,
    pub stages: StageRegistry,
    pub products: ProductRegistry,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Directory discovery, JSON volumes, built-in stages and the system clock.
    pub fn filesystem() -> Self {
        Self {
            locator: Arc::new(DirectoryLocator::new()),
            loader: Arc::new(JsonVolumeLoader::new()),
            stages: StageRegistry::with_builtins(),
            products: ProductRegistry::with_builtins(),
            clock: Arc::new(SystemClock),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Batch,
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BatchExhausted,
    EndTimeReached,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: RunMode,
    pub stop_reason: StopReason,
    pub volumes_processed: usize,
    pub watermark: Option<DateTime<Utc>>,
    pub finalized: bool,
    pub stage_failures: usize,
    pub products_ok: usize,
    pub products_failed: usize,
    pub alignment_gaps: usize,
    pub bytes_reclaimed: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let watermark = self
            .watermark
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{:?} run stopped ({:?}): volumes {} watermark {} stage failures {} products {}/{} ok alignment gaps {} reclaimed {} bytes",
            self.mode,
            self.stop_reason,
            self.volumes_processed,
            watermark,
            self.stage_failures,
            self.products_ok,
            self.products_ok + self.products_failed,
            self.alignment_gaps,
            self.bytes_reclaimed
        )
    }
}

/// A prepared run. Built by [`Scheduler::prepare`], consumed by
/// [`Scheduler::execute`].
pub struct Scheduler {
    mode: RunMode,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    run: Arc<RunConfig>,
    sync: TemporalSynchronizer,
    engine: ExecutionEngine,
    /// Pool used to join outstanding product tasks.
    pool: Option<Arc<TaskPool>>,
    batch: Vec<VolumeFile>,
    clock: Arc<dyn Clock>,
    cancel: CancelSignal,
    options: ExecutionOptions,
    metrics: Arc<MetricsRecorder>,
    watermark: Watermark,
    log: LogManager,
}

impl Scheduler {
    /// STARTUP: loads the layered config file chain named by the request.
    pub fn prepare(
        request: &RunRequest,
        collaborators: Collaborators,
        options: ExecutionOptions,
        cancel: CancelSignal,
    ) -> FlowResult<Self> {
        let config = LayeredConfig::load(&request.config_file)?;
        Self::with_config(config, request, collaborators, options, cancel)
    }

    /// STARTUP from an already assembled config.
    pub fn with_config(
        config: LayeredConfig,
        request: &RunRequest,
        collaborators: Collaborators,
        options: ExecutionOptions,
        cancel: CancelSignal,
    ) -> FlowResult<Self> {
        let run = Arc::clone(&config.run);
        let (start, end, trajectory) = resolve_window(request, &run)?;
        let mode = if request.realtime {
            RunMode::Stream
        } else {
            RunMode::Batch
        };

        let metrics = Arc::new(MetricsRecorder::new());
        let sync = TemporalSynchronizer::new(
            collaborators.locator,
            collaborators.loader,
            Arc::clone(&config.discovery),
            config.all_source_descriptors(),
            run.time_tolerance(),
            Arc::clone(&metrics),
        );
        let master = sync.master_descriptor().ok_or(FlowError::NoMasterDescriptor)?;
        log::info!("master data type: {master}");

        let pool = if options.needs_pool() {
            Some(Arc::new(TaskPool::new().map_err(FlowError::Runtime)?))
        } else {
            None
        };
        let engine = ExecutionEngine::new(
            config.stages,
            Arc::clone(&run),
            &collaborators.stages,
            &collaborators.products,
            pool.clone().filter(|_| options.parallel_datasets),
            pool.clone().filter(|_| options.parallel_products),
            trajectory,
            &request.info,
            Arc::clone(&metrics),
        )?;

        let batch = match (mode, start, end) {
            (RunMode::Batch, Some(start), Some(end)) => {
                let (files, descriptor, scan) = sync.master_files(start, end)?;
                if files.is_empty() {
                    return Err(FlowError::NoVolumes {
                        start,
                        end,
                        scan: scan.unwrap_or_default(),
                        descriptor: descriptor.map(|d| d.to_string()).unwrap_or_default(),
                    });
                }
                log::info!("found {} master volumes", files.len());
                files
            }
            (RunMode::Batch, _, _) => return Err(FlowError::MissingTimeWindow),
            (RunMode::Stream, _, _) => Vec::new(),
        };

        Ok(Self {
            mode,
            start,
            end,
            run,
            sync,
            engine,
            pool,
            batch,
            clock: collaborators.clock,
            cancel,
            options,
            metrics,
            watermark: Watermark::default(),
            log: LogManager::new(),
        })
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Master volumes of a batch run, in processing order.
    pub fn batch(&self) -> &[VolumeFile] {
        &self.batch
    }

    /// Runs INIT, the main loop, then FINALIZE.
    pub fn execute(mut self) -> RunSummary {
        self.log.phase(ProcStatus::Init);
        let report = self.engine.run_levels(ProcStatus::Init, None, None);
        self.settle(report.products);
        self.reclaim(None);

        self.log.phase(ProcStatus::Process);
        let stop_reason = match self.mode {
            RunMode::Batch => self.run_batch(),
            RunMode::Stream => self.run_stream(),
        };
        log::info!("stopping: {stop_reason:?}");

        self.log.phase(ProcStatus::Finalize);
        let report = self.engine.run_levels(ProcStatus::Finalize, None, None);
        self.settle(report.products);
        self.reclaim(None);

        let metrics = self.metrics.snapshot();
        RunSummary {
            mode: self.mode,
            stop_reason,
            volumes_processed: metrics.processed,
            watermark: self.watermark.get(),
            finalized: true,
            stage_failures: metrics.stage_errors,
            products_ok: metrics.products_ok,
            products_failed: metrics.products_failed,
            alignment_gaps: metrics.alignment_gaps,
            bytes_reclaimed: metrics.bytes_reclaimed,
        }
    }

    fn run_batch(&mut self) -> StopReason {
        let batch = std::mem::take(&mut self.batch);
        for file in &batch {
            if self.cancel.is_cancelled() {
                return StopReason::Cancelled;
            }
            self.process_timestamp(file.timestamp);
        }
        StopReason::BatchExhausted
    }

    fn run_stream(&mut self) -> StopReason {
        loop {
            if self.cancel.is_cancelled() {
                return StopReason::Cancelled;
            }
            let now = self.clock.now();
            if self.end.is_some_and(|end| now > end) {
                return StopReason::EndTimeReached;
            }
            if self.start.is_some_and(|start| now < start) {
                self.clock.sleep(self.options.idle_wait);
                continue;
            }

            let lower = self.watermark.window_start(now, self.run.scan_margin());
            let files = match self.sync.master_files(lower, now) {
                Ok((files, _, _)) => files,
                Err(err) => {
                    log::warn!("listing master volumes between {lower} and {now}: {err}");
                    Vec::new()
                }
            };
            let fresh: Vec<DateTime<Utc>> = files
                .iter()
                .map(|file| file.timestamp)
                .filter(|ts| self.watermark.is_new(*ts))
                .collect();
            if fresh.is_empty() {
                self.clock.sleep(self.options.idle_wait);
                continue;
            }

            for timestamp in fresh {
                if self.cancel.is_cancelled() {
                    return StopReason::Cancelled;
                }
                self.process_timestamp(timestamp);
            }
        }
    }

    fn process_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.log.master_volume(timestamp);
        let mut sources = self.sync.align_sources(timestamp);
        let report = self
            .engine
            .run_levels(ProcStatus::Process, Some(&mut sources), Some(timestamp));
        log::debug!(
            "{} stages ran, {} datasets, {} fields merged",
            report.executed.len(),
            report.datasets_produced,
            report.fields_merged
        );
        self.watermark.advance(timestamp);
        self.metrics.record_processed();
        self.settle(report.products);
        self.reclaim(Some(sources));
    }

    /// Waits for any product task still running and records every outcome.
    fn settle(&self, products: ProductBatch) {
        for outcome in products.join(self.pool.as_deref()) {
            if !outcome.ok {
                log::warn!("product '{}' of '{}' failed", outcome.product, outcome.dataset);
            }
            self.metrics.record_product(outcome.ok);
        }
    }

    /// Releases the cycle's volumes.
    fn reclaim(&self, sources: Option<SourceSet>) {
        let bytes = sources.as_ref().map_or(0, SourceSet::byte_size);
        drop(sources);
        self.metrics.record_reclaimed(bytes);
        log::debug!("released {bytes} bytes of volume data");
    }
}

/// Time window and trajectory of a run.
///
/// Without explicit bounds, the trajectory's span padded by 1.1 scan periods
/// on both sides is used.
fn resolve_window(
    request: &RunRequest,
    run: &RunConfig,
) -> FlowResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>, Option<Arc<Trajectory>>)> {
    let Some(path) = &request.trajectory_file else {
        return Ok((request.start, request.end, None));
    };

    let trajectory = Trajectory::load(path, request.start, request.end).map_err(|err| {
        FlowError::Trajectory {
            path: path.clone(),
            reason: err.to_string(),
        }
    })?;
    let margin = run.scan_margin();
    let start = request.start.unwrap_or_else(|| {
        trajectory
            .start_time()
            .checked_sub_signed(margin)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    });
    let end = request.end.unwrap_or_else(|| {
        trajectory
            .end_time()
            .checked_add_signed(margin)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    });
    log::info!("trajectory window {start} to {end}");
    Ok((Some(start), Some(end), Some(Arc::new(trajectory))))
}

/// Prepares and executes one run.
pub fn run(
    request: &RunRequest,
    collaborators: Collaborators,
    options: ExecutionOptions,
    cancel: CancelSignal,
) -> FlowResult<RunSummary> {
    let scheduler = Scheduler::prepare(request, collaborators, options, cancel)?;
    Ok(scheduler.execute())
}
