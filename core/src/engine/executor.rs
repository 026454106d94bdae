use super::levels::DatasetLevelGraph;
use super::merge::merge_output;
use super::tasks::TaskPool;
use crate::config::{RunConfig, StageConfig};
use crate::error::FlowResult;
use crate::io::Trajectory;
use crate::prelude::{DatasetStage, ProcStatus, StageContext, StageOutput, StageState};
use crate::products::fanout::panic_message;
use crate::products::{ProductBatch, ProductFanout, ProductGenerator};
use crate::registry::{ProductRegistry, StageRegistry};
use crate::telemetry::{LogManager, MetricsRecorder};
use crate::volume::SourceSet;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Invokes one stage. Errors and panics are logged and become `None`.
#[allow(clippy::too_many_arguments)]
pub fn run_stage(
    stage: &dyn DatasetStage,
    status: ProcStatus,
    config: &StageConfig,
    state: &mut StageState,
    sources: Option<&SourceSet>,
    timestamp: Option<DateTime<Utc>>,
    trajectory: Option<&Trajectory>,
    run_info: &str,
    metrics: &MetricsRecorder,
) -> Option<StageOutput> {
    LogManager::new().dataset(&config.name);
    let ctx = StageContext {
        config,
        state,
        sources,
        timestamp,
        trajectory,
        run_info,
    };
    match panic::catch_unwind(AssertUnwindSafe(|| stage.process(status, ctx))) {
        Ok(Ok(output)) => Some(output),
        Ok(Err(err)) => {
            log::error!(
                "dataset '{}' (type {}) failed in {} phase at {:?}: {err}",
                config.name,
                config.kind,
                status,
                timestamp
            );
            metrics.record_stage_error();
            None
        }
        Err(payload) => {
            log::error!(
                "dataset '{}' (type {}) panicked in {} phase at {:?}: {}",
                config.name,
                config.kind,
                status,
                timestamp,
                panic_message(payload.as_ref())
            );
            metrics.record_stage_error();
            None
        }
    }
}

/// What one pass over all levels did.
#[derive(Default)]
pub struct CycleReport {
    /// Stage names in the order their results were applied.
    pub executed: Vec<String>,
    pub datasets_produced: usize,
    pub fields_merged: usize,
    pub products: ProductBatch,
}

struct StageSlot {
    config: Arc<StageConfig>,
    state: StageState,
    stage: Arc<dyn DatasetStage>,
    generator: Option<Arc<dyn ProductGenerator>>,
}

/// Runs stages level by level and owns their long-lived state.
pub struct ExecutionEngine {
    graph: DatasetLevelGraph,
    slots: HashMap<String, StageSlot>,
    fanout: ProductFanout,
    /// Present only when dataset-level parallelism is enabled.
    pool: Option<Arc<TaskPool>>,
    trajectory: Option<Arc<Trajectory>>,
    run_info: Arc<str>,
    metrics: Arc<MetricsRecorder>,
    log: LogManager,
}

impl ExecutionEngine {
    /// Resolves every stage type and product format; an unknown tag fails.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stages: Vec<StageConfig>,
        run: Arc<RunConfig>,
        stage_registry: &StageRegistry,
        product_registry: &ProductRegistry,
        dataset_pool: Option<Arc<TaskPool>>,
        product_pool: Option<Arc<TaskPool>>,
        trajectory: Option<Arc<Trajectory>>,
        run_info: &str,
        metrics: Arc<MetricsRecorder>,
    ) -> FlowResult<Self> {
        let graph = DatasetLevelGraph::from_stages(&stages);
        let mut slots = HashMap::with_capacity(stages.len());
        for config in stages {
            let (stage, format) = stage_registry.resolve(&config.kind, &config.name)?;
            let generator = if config.products.is_empty() {
                None
            } else {
                Some(product_registry.resolve(&format, &config.name, &config.kind)?)
            };
            slots.insert(
                config.name.clone(),
                StageSlot {
                    config: Arc::new(config),
                    state: StageState::default(),
                    stage,
                    generator,
                },
            );
        }

        Ok(Self {
            graph,
            slots,
            fanout: ProductFanout::new(run, product_pool.clone()),
            pool: dataset_pool,
            trajectory,
            run_info: Arc::from(run_info),
            metrics,
            log: LogManager::new(),
        })
    }

    pub fn graph(&self) -> &DatasetLevelGraph {
        &self.graph
    }

    pub fn state(&self, stage: &str) -> Option<&StageState> {
        self.slots.get(stage).map(|slot| &slot.state)
    }

    /// Runs every level in label order. All stages of a level finish, and
    /// their outputs are merged, before the next level starts.
    pub fn run_levels(
        &mut self,
        status: ProcStatus,
        mut sources: Option<&mut SourceSet>,
        timestamp: Option<DateTime<Utc>>,
    ) -> CycleReport {
        let mut report = CycleReport::default();
        let levels: Vec<(String, Vec<String>)> = self
            .graph
            .iter()
            .map(|(label, stages)| (label.to_string(), stages.to_vec()))
            .collect();

        for (label, stages) in levels {
            self.log.level(&label);
            if let Some(pool) = self.pool.clone() {
                let outputs =
                    self.run_level_parallel(&pool, status, &stages, sources.as_deref(), timestamp);
                for (name, output) in stages.iter().zip(outputs) {
                    self.apply_output(name, output, sources.as_deref_mut(), timestamp, &mut report);
                }
            } else {
                for name in &stages {
                    let output = self.run_one(name, status, sources.as_deref(), timestamp);
                    self.apply_output(name, output, sources.as_deref_mut(), timestamp, &mut report);
                }
            }
        }
        report
    }

    fn run_one(
        &mut self,
        name: &str,
        status: ProcStatus,
        sources: Option<&SourceSet>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Option<StageOutput> {
        let slot = self.slots.get_mut(name)?;
        run_stage(
            slot.stage.as_ref(),
            status,
            &slot.config,
            &mut slot.state,
            sources,
            timestamp,
            self.trajectory.as_deref(),
            &self.run_info,
            &self.metrics,
        )
    }

    /// Spawns one task per stage, each with its own state and a shared
    /// read-only snapshot of the sources, then waits for all of them.
    fn run_level_parallel(
        &mut self,
        pool: &TaskPool,
        status: ProcStatus,
        stages: &[String],
        sources: Option<&SourceSet>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Vec<Option<StageOutput>> {
        let snapshot = sources.map(|set| Arc::new(set.clone()));

        let mut receivers = Vec::with_capacity(stages.len());
        for name in stages {
            let Some(slot) = self.slots.get_mut(name) else {
                continue;
            };
            let mut state = std::mem::take(&mut slot.state);
            let stage = Arc::clone(&slot.stage);
            let config = Arc::clone(&slot.config);
            let snapshot = snapshot.clone();
            let trajectory = self.trajectory.clone();
            let run_info = Arc::clone(&self.run_info);
            let metrics = Arc::clone(&self.metrics);

            receivers.push(pool.spawn_reporting(move || {
                let output = run_stage(
                    stage.as_ref(),
                    status,
                    &config,
                    &mut state,
                    snapshot.as_deref(),
                    timestamp,
                    trajectory.as_deref(),
                    &run_info,
                    &metrics,
                );
                (state, output)
            }));
        }

        let results = pool.gather(receivers);
        let mut outputs = Vec::with_capacity(stages.len());
        for (name, result) in stages.iter().zip(results) {
            match result {
                Some((state, output)) => {
                    if let Some(slot) = self.slots.get_mut(name) {
                        slot.state = state;
                    }
                    outputs.push(output);
                }
                None => {
                    log::error!("task of dataset '{name}' ended without reporting; state reset");
                    self.metrics.record_stage_error();
                    outputs.push(None);
                }
            }
        }
        outputs
    }

    fn apply_output(
        &mut self,
        name: &str,
        output: Option<StageOutput>,
        sources: Option<&mut SourceSet>,
        timestamp: Option<DateTime<Utc>>,
        report: &mut CycleReport,
    ) {
        report.executed.push(name.to_string());
        let Some(StageOutput {
            dataset: Some(dataset),
            reference_source,
        }) = output
        else {
            return;
        };
        let Some(slot) = self.slots.get(name) else {
            return;
        };

        report.datasets_produced += 1;
        report.fields_merged += merge_output(
            Some(&dataset),
            sources,
            reference_source,
            slot.config.make_global,
        );

        if let Some(generator) = &slot.generator {
            let timeinfo = timestamp.or(dataset.timestamp);
            let dataset = Arc::new(dataset);
            let batch = self
                .fanout
                .fan_out(generator, &dataset, &slot.config, timeinfo, &self.run_info);
            report.products.extend(batch);
        }
    }
}
