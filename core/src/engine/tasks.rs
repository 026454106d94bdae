use std::io;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Blocking task pool shared by dataset- and product-level parallelism.
///
/// All calls are made from synchronous code; the pool owns its runtime.
pub struct TaskPool {
    runtime: Runtime,
}

impl TaskPool {
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .thread_name("radcore-task")
            .enable_all()
            .build()?;
        Ok(Self { runtime })
    }

    /// Runs `work` on its own task; the result arrives once on the returned
    /// receiver. A task that dies before sending closes the channel.
    pub fn spawn_reporting<T, F>(&self, work: F) -> oneshot::Receiver<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.runtime.spawn_blocking(move || {
            let _ = tx.send(work());
        });
        rx
    }

    /// Blocks until every receiver has produced its value, in order.
    pub fn gather<T>(&self, receivers: Vec<oneshot::Receiver<T>>) -> Vec<Option<T>> {
        receivers
            .into_iter()
            .map(|rx| rx.blocking_recv().ok())
            .collect()
    }

    pub fn spawn<T, F>(&self, work: F) -> JoinHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.runtime.spawn_blocking(work)
    }

    /// Waits for a spawned task. `None` if it panicked.
    pub fn join<T>(&self, handle: JoinHandle<T>) -> Option<T> {
        self.runtime.block_on(handle).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn gather_waits_for_every_task_in_spawn_order() {
        let pool = TaskPool::new().unwrap();
        let receivers = (0..4u64)
            .map(|i| {
                pool.spawn_reporting(move || {
                    std::thread::sleep(Duration::from_millis(40 - i * 10));
                    i
                })
            })
            .collect();
        let results = pool.gather(receivers);
        assert_eq!(results, vec![Some(0), Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn join_returns_none_for_panicked_task() {
        let pool = TaskPool::new().unwrap();
        let handle = pool.spawn(|| -> u32 { panic!("boom") });
        assert_eq!(pool.join(handle), None);
        let handle = pool.spawn(|| 7u32);
        assert_eq!(pool.join(handle), Some(7));
    }
}
