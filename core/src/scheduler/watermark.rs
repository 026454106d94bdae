use chrono::{DateTime, Duration, Utc};

/// Offset in seconds of the next stream window past the last processed
/// timestamp.
pub const WINDOW_STEP_SECS: i64 = 10;

/// Last fully processed master timestamp. Never moves backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermark(Option<DateTime<Utc>>);

impl Watermark {
    pub fn get(&self) -> Option<DateTime<Utc>> {
        self.0
    }

    /// Moves to `timestamp` if it is later; returns whether it moved.
    pub fn advance(&mut self, timestamp: DateTime<Utc>) -> bool {
        match self.0 {
            Some(current) if timestamp <= current => false,
            _ => {
                self.0 = Some(timestamp);
                true
            }
        }
    }

    pub fn is_new(&self, timestamp: DateTime<Utc>) -> bool {
        self.0.map_or(true, |current| timestamp > current)
    }

    /// Lower bound of the next stream window.
    pub fn window_start(&self, now: DateTime<Utc>, margin: Duration) -> DateTime<Utc> {
        match self.0 {
            Some(current) => current
                .checked_add_signed(Duration::seconds(WINDOW_STEP_SECS))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            None => now
                .checked_sub_signed(margin)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }
}
