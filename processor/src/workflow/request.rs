use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use radcore::RunRequest;
use std::path::PathBuf;

const TIME_FORMATS: [&str; 3] = ["%Y%m%d%H%M%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parses a UTC time given as RFC 3339, `YYYYmmddHHMMSS`,
/// `YYYY-mm-dd HH:MM:SS` or `YYYY-mm-ddTHH:MM:SS`.
pub fn parse_time(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Ok(time.with_timezone(&Utc));
    }
    for format in TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    bail!("unrecognized time '{raw}'")
}

/// Command-line pieces of a run request.
#[derive(Debug, Clone, Default)]
pub struct RequestArgs {
    pub config: PathBuf,
    pub start: Option<String>,
    pub end: Option<String>,
    pub info: String,
    pub trajectory: Option<PathBuf>,
    pub realtime: bool,
}

impl RequestArgs {
    pub fn into_request(self) -> anyhow::Result<RunRequest> {
        let start = self
            .start
            .as_deref()
            .map(parse_time)
            .transpose()
            .context("parsing --start")?;
        let end = self
            .end
            .as_deref()
            .map(parse_time)
            .transpose()
            .context("parsing --end")?;
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                bail!("end time {end} is before start time {start}");
            }
        }

        Ok(RunRequest {
            config_file: self.config,
            start,
            end,
            info: self.info,
            trajectory_file: self.trajectory,
            realtime: self.realtime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_supported_format() {
        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 10, 5, 0).unwrap();
        for raw in [
            "20240601100500",
            "2024-06-01 10:05:00",
            "2024-06-01T10:05:00",
            "2024-06-01T12:05:00+02:00",
        ] {
            assert_eq!(parse_time(raw).unwrap(), expected, "{raw}");
        }
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn request_rejects_reversed_window() {
        let args = RequestArgs {
            config: PathBuf::from("main.yml"),
            start: Some("20240601110000".into()),
            end: Some("20240601100000".into()),
            ..Default::default()
        };
        assert!(args.into_request().is_err());
    }

    #[test]
    fn request_carries_flags() {
        let args = RequestArgs {
            config: PathBuf::from("main.yml"),
            start: Some("20240601100000".into()),
            info: "test run".into(),
            realtime: true,
            ..Default::default()
        };
        let request = args.into_request().unwrap();
        assert!(request.realtime);
        assert!(request.end.is_none());
        assert_eq!(request.info, "test run");
    }
}
