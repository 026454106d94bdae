use std::sync::Mutex;

/// Run counters shared by the synchronizer, engine and scheduler.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

/// Point-in-time copy of the run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub processed: usize,
    pub stage_errors: usize,
    pub products_ok: usize,
    pub products_failed: usize,
    pub alignment_gaps: usize,
    pub bytes_reclaimed: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut Metrics)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_processed(&self) {
        self.update(|m| m.processed += 1);
    }

    pub fn record_stage_error(&self) {
        self.update(|m| m.stage_errors += 1);
    }

    pub fn record_product(&self, ok: bool) {
        self.update(|m| {
            if ok {
                m.products_ok += 1;
            } else {
                m.products_failed += 1;
            }
        });
    }

    pub fn record_alignment_gap(&self) {
        self.update(|m| m.alignment_gaps += 1);
    }

    pub fn record_reclaimed(&self, bytes: usize) {
        self.update(|m| m.bytes_reclaimed += bytes);
    }

    pub fn snapshot(&self) -> Metrics {
        self.inner.lock().map(|m| *m).unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsRecorder::new();
        metrics.record_processed();
        metrics.record_product(true);
        metrics.record_product(false);
        metrics.record_product(false);
        metrics.record_reclaimed(64);
        let snap = metrics.snapshot();
        assert_eq!(snap.processed, 1);
        assert_eq!(snap.products_ok, 1);
        assert_eq!(snap.products_failed, 2);
        assert_eq!(snap.bytes_reclaimed, 64);
    }
}
