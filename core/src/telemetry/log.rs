use crate::prelude::ProcStatus;
use chrono::{DateTime, Utc};
use log::info;

/// Progress lines for phases, levels, datasets and products.
///
/// Informational only; nothing parses these lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogManager;

impl LogManager {
    pub fn new() -> Self {
        Self
    }

    pub fn record(&self, message: &str) {
        info!("{}", message);
    }

    pub fn phase(&self, status: ProcStatus) {
        let message = match status {
            ProcStatus::Init => "- Initializing datasets:",
            ProcStatus::Process => "- Processing datasets:",
            ProcStatus::Finalize => "- Post-processing datasets:",
        };
        self.record(message);
    }

    pub fn master_volume(&self, timestamp: DateTime<Utc>) {
        info!("- master volume: {}", timestamp.format("%Y-%m-%d %H:%M:%S"));
    }

    pub fn level(&self, level: &str) {
        info!("-- Process level: {}", level);
    }

    pub fn dataset(&self, name: &str) {
        info!("--- Processing dataset: {}", name);
    }

    pub fn product(&self, name: &str) {
        info!("---- Processing product: {}", name);
    }
}
