pub mod stats;

pub use stats::{FieldSummary, StatsHelper};
