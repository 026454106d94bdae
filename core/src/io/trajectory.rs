use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// One platform position.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectorySample {
    pub time: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

/// Time-ordered platform positions restricted to an optional window.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub path: PathBuf,
    samples: Vec<TrajectorySample>,
}

#[derive(thiserror::Error, Debug)]
pub enum TrajectoryError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("no trajectory samples inside the requested time window")]
    Empty,
}

impl Trajectory {
    /// Reads `time lat lon alt` lines. `#` starts a comment.
    pub fn load(
        path: &Path,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, TrajectoryError> {
        let contents = fs::read_to_string(path).map_err(|source| TrajectoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut trajectory = Self::parse(&contents, start, end)?;
        trajectory.path = path.to_path_buf();
        Ok(trajectory)
    }

    pub fn parse(
        contents: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, TrajectoryError> {
        let mut samples = Vec::new();
        for (idx, raw) in contents.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let sample = parse_line(line).map_err(|reason| TrajectoryError::Malformed {
                line: idx + 1,
                reason,
            })?;
            if start.is_some_and(|s| sample.time < s) || end.is_some_and(|e| sample.time > e) {
                continue;
            }
            samples.push(sample);
        }

        if samples.is_empty() {
            return Err(TrajectoryError::Empty);
        }
        samples.sort_by(|a, b| a.time.cmp(&b.time));

        Ok(Self {
            path: PathBuf::new(),
            samples,
        })
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.samples[0].time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.samples[self.samples.len() - 1].time
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }
}

fn parse_line(line: &str) -> Result<TrajectorySample, String> {
    let columns: Vec<&str> = line.split_whitespace().collect();
    // "YYYY-mm-dd HH:MM:SS" spans two columns.
    let (time, rest) = match parse_time(columns.first().copied().unwrap_or_default()) {
        Some(time) => (time, &columns[1..]),
        None if columns.len() >= 2 => {
            let joined = format!("{} {}", columns[0], columns[1]);
            let time = parse_time(&joined).ok_or_else(|| format!("unreadable time '{joined}'"))?;
            (time, &columns[2..])
        }
        None => return Err(format!("unreadable time in '{line}'")),
    };

    if rest.len() < 3 {
        return Err(format!("expected lat lon alt after time, got {} values", rest.len()));
    }
    let number = |s: &str| s.parse::<f64>().map_err(|err| format!("'{s}': {err}"));
    Ok(TrajectorySample {
        time,
        lat: number(rest[0])?,
        lon: number(rest[1])?,
        alt: number(rest[2])?,
    })
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Some(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK: &str = "\
# time lat lon alt
2024-06-01T10:02:00Z 46.1 7.2 3000
2024-06-01 10:00:00 46.0 7.1 2900
2024-06-01T10:04:00Z 46.2 7.3 3100
";

    #[test]
    fn parses_mixed_time_formats_in_order() {
        let traj = Trajectory::parse(TRACK, None, None).unwrap();
        assert_eq!(traj.samples().len(), 3);
        assert_eq!(traj.start_time(), Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap());
        assert_eq!(traj.end_time(), Utc.with_ymd_and_hms(2024, 6, 1, 10, 4, 0).unwrap());
    }

    #[test]
    fn window_drops_outside_samples() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 1, 0).unwrap();
        let traj = Trajectory::parse(TRACK, Some(start), None).unwrap();
        assert_eq!(traj.samples().len(), 2);
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        assert!(matches!(
            Trajectory::parse(TRACK, None, Some(end)),
            Err(TrajectoryError::Empty)
        ));
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let err = Trajectory::parse("2024-06-01T10:00:00Z 46.0 abc 1\n", None, None).unwrap_err();
        assert!(matches!(err, TrajectoryError::Malformed { line: 1, .. }));
    }
}
