use super::ProductGenerator;
use crate::config::{ProductConfig, RunConfig, StageConfig};
use crate::engine::tasks::TaskPool;
use crate::telemetry::LogManager;
use crate::volume::Dataset;
use chrono::{DateTime, Utc};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Result of one product invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductOutcome {
    pub dataset: String,
    pub product: String,
    pub ok: bool,
}

/// A product task spawned without waiting for it.
pub struct PendingProduct {
    dataset: String,
    product: String,
    handle: JoinHandle<bool>,
}

/// Products of one or more stages: finished outcomes plus tasks still
/// running.
#[derive(Default)]
pub struct ProductBatch {
    pub completed: Vec<ProductOutcome>,
    pending: Vec<PendingProduct>,
}

impl ProductBatch {
    pub fn extend(&mut self, other: ProductBatch) {
        self.completed.extend(other.completed);
        self.pending.extend(other.pending);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.pending.is_empty()
    }

    /// Waits for outstanding tasks and returns every outcome.
    pub fn join(self, pool: Option<&TaskPool>) -> Vec<ProductOutcome> {
        let mut outcomes = self.completed;
        for pending in self.pending {
            let ok = match pool {
                Some(pool) => pool.join(pending.handle).unwrap_or(false),
                None => false,
            };
            outcomes.push(ProductOutcome {
                dataset: pending.dataset,
                product: pending.product,
                ok,
            });
        }
        outcomes
    }
}

/// Runs one product, containing errors and panics.
pub fn generate_product(
    generator: &dyn ProductGenerator,
    dataset: &Dataset,
    config: &ProductConfig,
) -> bool {
    LogManager::new().product(&config.prdname);
    let result = panic::catch_unwind(AssertUnwindSafe(|| generator.generate(dataset, config)));
    match result {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            log::error!(
                "product '{}' of dataset '{}' failed: {err}",
                config.prdname,
                config.dsname
            );
            false
        }
        Err(payload) => {
            log::error!(
                "product '{}' of dataset '{}' panicked: {}",
                config.prdname,
                config.dsname,
                panic_message(payload.as_ref())
            );
            false
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Invokes every configured product of a stage once per artifact.
pub struct ProductFanout {
    run: Arc<RunConfig>,
    pool: Option<Arc<TaskPool>>,
}

impl ProductFanout {
    /// Products run sequentially unless a pool is given.
    pub fn new(run: Arc<RunConfig>, pool: Option<Arc<TaskPool>>) -> Self {
        Self { run, pool }
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// In parallel mode the tasks are spawned and returned pending; the
    /// caller decides when to join them.
    pub fn fan_out(
        &self,
        generator: &Arc<dyn ProductGenerator>,
        dataset: &Arc<Dataset>,
        stage: &StageConfig,
        timeinfo: Option<DateTime<Utc>>,
        runinfo: &str,
    ) -> ProductBatch {
        let mut batch = ProductBatch::default();
        for settings in &stage.products {
            let config = ProductConfig::build(&self.run, stage, settings, timeinfo, runinfo);
            match &self.pool {
                Some(pool) => {
                    let generator = Arc::clone(generator);
                    let dataset = Arc::clone(dataset);
                    let handle = pool.spawn(move || {
                        generate_product(generator.as_ref(), &dataset, &config)
                    });
                    batch.pending.push(PendingProduct {
                        dataset: stage.name.clone(),
                        product: settings.name.clone(),
                        handle,
                    });
                }
                None => {
                    let ok = generate_product(generator.as_ref(), dataset, &config);
                    batch.completed.push(ProductOutcome {
                        dataset: stage.name.clone(),
                        product: settings.name.clone(),
                        ok,
                    });
                }
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayeredConfig;
    use crate::products::{ProductError, ProductResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CONFIG: &str = r#"
name: demo
configpath: /cfg
saveimgbasepath: /out
dataSetList: ['l0:echo']
echo:
  type: RAW
  datatype: dBZ
  products:
    FIRST: {type: A}
    BROKEN: {type: B}
    PANICS: {type: C}
    LAST: {type: D}
"#;

    fn setup() -> (Arc<RunConfig>, StageConfig) {
        let cfg = LayeredConfig::assemble(serde_yaml::from_str(CONFIG).unwrap()).unwrap();
        (cfg.run.clone(), cfg.stages[0].clone())
    }

    fn counting_generator(calls: Arc<AtomicUsize>) -> Arc<dyn ProductGenerator> {
        Arc::new(move |_: &Dataset, config: &ProductConfig| -> ProductResult<()> {
            calls.fetch_add(1, Ordering::SeqCst);
            match config.kind.as_str() {
                "B" => Err(ProductError::Failed("bad input".into())),
                "C" => panic!("generator crashed"),
                _ => Ok(()),
            }
        })
    }

    #[test]
    fn failures_do_not_stop_siblings() {
        let (run, stage) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let fanout = ProductFanout::new(run, None);
        let batch = fanout.fan_out(
            &counting_generator(calls.clone()),
            &Arc::new(Dataset::default()),
            &stage,
            None,
            "",
        );
        assert_eq!(batch.pending_len(), 0);
        let outcomes = batch.join(None);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let ok: Vec<_> = outcomes.iter().map(|o| (o.product.as_str(), o.ok)).collect();
        assert_eq!(
            ok,
            vec![("FIRST", true), ("BROKEN", false), ("PANICS", false), ("LAST", true)]
        );
    }

    #[test]
    fn parallel_products_are_returned_pending() {
        let (run, stage) = setup();
        let pool = Arc::new(TaskPool::new().unwrap());
        let calls = Arc::new(AtomicUsize::new(0));
        let fanout = ProductFanout::new(run, Some(pool.clone()));
        assert!(fanout.is_parallel());
        let batch = fanout.fan_out(
            &counting_generator(calls.clone()),
            &Arc::new(Dataset::default()),
            &stage,
            None,
            "",
        );
        assert_eq!(batch.pending_len(), 4);
        let outcomes = batch.join(Some(&pool));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(outcomes.iter().filter(|o| o.ok).count(), 2);
    }
}
