use super::values::{
    optional_f64, optional_path, optional_str, optional_usize, path_list, required_str, scan_list,
    string_list,
};
use crate::error::{FlowError, FlowResult};
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;

pub const DATASET_LIST_KEY: &str = "dataSetList";

const DEFAULT_NUM_RADARS: usize = 1;
const DEFAULT_TIME_TOL_SECS: f64 = 3600.0;
const DEFAULT_SCAN_PERIOD_MIN: f64 = 5.0;
const DEFAULT_COSMO_RUN_FREQ_H: u32 = 3;
const DEFAULT_COSMO_FORECASTED_H: u32 = 7;
const DEFAULT_PATH_CONVENTION: &str = "MCH";
/// Upper bound for `TimeTol`, one year in seconds.
const MAX_TIME_TOL_SECS: f64 = 366.0 * 86_400.0;
/// Upper bound for `ScanPeriod`, one day in minutes.
const MAX_SCAN_PERIOD_MIN: f64 = 1_440.0;

/// Run-wide settings. Built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub config_file: Option<PathBuf>,
    pub name: String,
    pub config_path: PathBuf,
    pub save_img_base_path: PathBuf,
    pub dataset_list: Vec<String>,
    pub num_radars: usize,
    /// Alignment tolerance in seconds.
    pub time_tol: f64,
    pub scan_list: Option<Vec<Vec<String>>>,
    pub data_path: Vec<PathBuf>,
    pub path_convention: String,
    pub cosmo_path: Vec<PathBuf>,
    pub dem_path: Vec<PathBuf>,
    pub smn_path: Option<PathBuf>,
    pub disdro_path: Option<PathBuf>,
    pub load_base_path: Vec<PathBuf>,
    pub radar_name: Vec<String>,
    /// Scan cadence in minutes.
    pub scan_period: f64,
    pub cosmo_run_freq: u32,
    pub cosmo_forecasted: u32,
    pub img_format: Vec<String>,
    /// Full merged mapping; dataset sections are read from here.
    pub raw: Mapping,
}

impl RunConfig {
    pub fn from_mapping(raw: Mapping) -> FlowResult<Self> {
        let name = required_str(&raw, "name")?;
        let config_path = PathBuf::from(required_str(&raw, "configpath")?);
        let save_img_base_path = PathBuf::from(required_str(&raw, "saveimgbasepath")?);
        if !raw.contains_key(DATASET_LIST_KEY) {
            return Err(FlowError::MissingParameter(DATASET_LIST_KEY.to_string()));
        }
        let dataset_list = string_list(&raw, DATASET_LIST_KEY)?;

        let num_radars = optional_usize(&raw, "NumRadars")?.unwrap_or(DEFAULT_NUM_RADARS);
        if num_radars == 0 {
            return Err(FlowError::InvalidParameter {
                name: "NumRadars".into(),
                reason: "at least one radar is required".into(),
            });
        }
        let time_tol = optional_f64(&raw, "TimeTol")?.unwrap_or(DEFAULT_TIME_TOL_SECS);
        check_bounded("TimeTol", time_tol, MAX_TIME_TOL_SECS)?;

        let scan_period = optional_f64(&raw, "ScanPeriod")?.unwrap_or_else(|| {
            log::warn!("Scan period not specified. Assumed default value 5 min");
            DEFAULT_SCAN_PERIOD_MIN
        });
        check_bounded("ScanPeriod", scan_period, MAX_SCAN_PERIOD_MIN)?;
        let cosmo_run_freq = optional_usize(&raw, "CosmoRunFreq")?
            .map(|v| v as u32)
            .unwrap_or_else(|| {
                log::warn!("COSMO run frequency not specified. Assumed default value 3h");
                DEFAULT_COSMO_RUN_FREQ_H
            });
        let cosmo_forecasted = optional_usize(&raw, "CosmoForecasted")?
            .map(|v| v as u32)
            .unwrap_or_else(|| {
                log::warn!(
                    "Hours forecasted by COSMO not specified. Assumed default value 7h (including analysis)"
                );
                DEFAULT_COSMO_FORECASTED_H
            });

        let mut img_format = string_list(&raw, "imgformat")?;
        if img_format.is_empty() {
            img_format.push("png".to_string());
        }

        Ok(Self {
            config_file: optional_path(&raw, "configFile")?,
            name,
            config_path,
            save_img_base_path,
            dataset_list,
            num_radars,
            time_tol,
            scan_list: scan_list(&raw, "ScanList")?,
            data_path: path_list(&raw, "datapath")?,
            path_convention: optional_str(&raw, "path_convention")?
                .unwrap_or_else(|| DEFAULT_PATH_CONVENTION.to_string()),
            cosmo_path: path_list(&raw, "cosmopath")?,
            dem_path: path_list(&raw, "dempath")?,
            smn_path: optional_path(&raw, "smnpath")?,
            disdro_path: optional_path(&raw, "disdropath")?,
            load_base_path: path_list(&raw, "loadbasepath")?,
            radar_name: string_list(&raw, "RadarName")?,
            scan_period,
            cosmo_run_freq,
            cosmo_forecasted,
            img_format,
            raw,
        })
    }

    pub fn time_tolerance(&self) -> chrono::Duration {
        chrono::Duration::milliseconds((self.time_tol * 1000.0).round() as i64)
    }

    /// 1.1 × the scan cadence, used to pad time windows.
    pub fn scan_margin(&self) -> chrono::Duration {
        chrono::Duration::milliseconds((self.scan_period * 1.1 * 60_000.0).round() as i64)
    }

    pub fn section(&self, key: &str) -> Option<&Mapping> {
        self.raw.get(key).and_then(Value::as_mapping)
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }
}

fn check_bounded(name: &str, value: f64, max: f64) -> FlowResult<()> {
    if !value.is_finite() || !(0.0..=max).contains(&value) {
        return Err(FlowError::InvalidParameter {
            name: name.into(),
            reason: format!("expected a number between 0 and {max}, got {value}"),
        });
    }
    Ok(())
}

/// The subset of [`RunConfig`] needed to locate and timestamp files.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub data_path: Vec<PathBuf>,
    pub scan_list: Option<Vec<Vec<String>>>,
    pub cosmo_path: Vec<PathBuf>,
    pub dem_path: Vec<PathBuf>,
    pub load_base_path: Vec<PathBuf>,
    pub radar_name: Vec<String>,
    pub scan_period: f64,
    pub cosmo_run_freq: u32,
    pub cosmo_forecasted: u32,
    pub path_convention: String,
}

impl DiscoveryConfig {
    /// Data directory for a 0-based source; falls back to the first entry.
    pub fn data_path_for(&self, source_index: usize) -> Option<&PathBuf> {
        self.data_path
            .get(source_index)
            .or_else(|| self.data_path.first())
    }
}

impl From<&RunConfig> for DiscoveryConfig {
    fn from(cfg: &RunConfig) -> Self {
        Self {
            data_path: cfg.data_path.clone(),
            scan_list: cfg.scan_list.clone(),
            cosmo_path: cfg.cosmo_path.clone(),
            dem_path: cfg.dem_path.clone(),
            load_base_path: cfg.load_base_path.clone(),
            radar_name: cfg.radar_name.clone(),
            scan_period: cfg.scan_period,
            cosmo_run_freq: cfg.cosmo_run_freq,
            cosmo_forecasted: cfg.cosmo_forecasted,
            path_convention: cfg.path_convention.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    const MINIMAL: &str = "name: demo\nconfigpath: /cfg\nsaveimgbasepath: /out\ndataSetList: ['l0:raw']\n";

    #[test]
    fn fills_defaults() {
        let cfg = RunConfig::from_mapping(mapping(MINIMAL)).unwrap();
        assert_eq!(cfg.num_radars, 1);
        assert_eq!(cfg.time_tol, 3600.0);
        assert_eq!(cfg.scan_period, 5.0);
        assert_eq!(cfg.cosmo_run_freq, 3);
        assert_eq!(cfg.cosmo_forecasted, 7);
        assert_eq!(cfg.path_convention, "MCH");
        assert_eq!(cfg.img_format, vec!["png"]);
        assert!(cfg.scan_list.is_none());
        assert_eq!(cfg.scan_margin(), chrono::Duration::seconds(330));
    }

    #[test]
    fn each_mandatory_key_is_enforced() {
        for key in ["name", "configpath", "saveimgbasepath", "dataSetList"] {
            let mut raw = mapping(MINIMAL);
            raw.remove(key);
            let err = RunConfig::from_mapping(raw).unwrap_err();
            assert!(
                matches!(err, FlowError::MissingParameter(ref missing) if missing == key),
                "{key}: {err}"
            );
        }
    }

    #[test]
    fn rejects_unbounded_time_settings() {
        for yaml in [
            "TimeTol: .nan\n",
            "TimeTol: 1.0e15\n",
            "TimeTol: -1\n",
            "ScanPeriod: .inf\n",
            "ScanPeriod: 1.0e12\n",
        ] {
            let raw = mapping(&format!("{MINIMAL}{yaml}"));
            let err = RunConfig::from_mapping(raw).unwrap_err();
            assert!(
                matches!(err, FlowError::InvalidParameter { .. }),
                "{yaml}: {err}"
            );
        }
        let cfg = RunConfig::from_mapping(mapping(&format!("{MINIMAL}TimeTol: 86400\n"))).unwrap();
        assert_eq!(cfg.time_tolerance(), chrono::Duration::days(1));
    }

    #[test]
    fn discovery_view_copies_search_settings() {
        let yaml = format!("{MINIMAL}datapath: [/a, /b]\nScanPeriod: 2.5\n");
        let cfg = RunConfig::from_mapping(mapping(&yaml)).unwrap();
        let discovery = DiscoveryConfig::from(&cfg);
        assert_eq!(discovery.scan_period, 2.5);
        assert_eq!(discovery.data_path_for(1).unwrap(), &PathBuf::from("/b"));
        assert_eq!(discovery.data_path_for(5).unwrap(), &PathBuf::from("/a"));
    }
}
