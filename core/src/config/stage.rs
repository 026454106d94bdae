use super::descriptor::DataTypeDescriptor;
use super::run::RunConfig;
use super::values::{flag, optional_str, scalar_string, string_list};
use crate::error::{FlowError, FlowResult};
use chrono::{DateTime, Utc};
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;

/// Run-wide keys handed to every dataset unless the dataset overrides them.
const STAGE_PASSTHROUGH_KEYS: [&str; 21] = [
    "solarfluxpath",
    "colocgatespath",
    "cosmopath",
    "CosmoRunFreq",
    "CosmoForecasted",
    "RadarName",
    "mflossh",
    "mflossv",
    "radconsth",
    "radconstv",
    "lrxh",
    "lrxv",
    "lradomeh",
    "lradomev",
    "AntennaGain",
    "attg",
    "par_azimuth_antenna",
    "par_elevation_antenna",
    "asr_highbeam_antenna",
    "asr_lowbeam_antenna",
    "asr_position",
];

/// Image layout sections forwarded to product generators.
const PRODUCT_IMAGE_KEYS: [&str; 3] = ["ppiImageConfig", "rhiImageConfig", "sunhitsImageConfig"];

/// Settings of one product under a dataset.
#[derive(Debug, Clone)]
pub struct ProductSettings {
    pub name: String,
    pub kind: String,
    pub params: Mapping,
}

/// Immutable settings of one dataset stage.
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub name: String,
    pub kind: String,
    pub level: String,
    pub datatypes: Vec<DataTypeDescriptor>,
    pub make_global: bool,
    pub products: Vec<ProductSettings>,
    pub procname: String,
    pub basepath: PathBuf,
    pub config_path: PathBuf,
    pub save_name: Option<String>,
    /// Dataset section plus inherited run-wide keys.
    pub params: Mapping,
}

impl StageConfig {
    pub fn build(run: &RunConfig, level: &str, name: &str) -> FlowResult<Self> {
        let section = run
            .section(name)
            .ok_or_else(|| FlowError::MissingParameter(name.to_string()))?;

        let kind = optional_str(section, "type")?
            .ok_or_else(|| FlowError::MissingParameter(format!("{name}.type")))?;
        let datatypes = string_list(section, "datatype")?
            .iter()
            .map(|raw| DataTypeDescriptor::parse(raw))
            .collect();
        let make_global = flag(section, "MAKE_GLOBAL")?;
        let products = parse_products(name, section)?;

        let mut params = section.clone();
        for key in STAGE_PASSTHROUGH_KEYS {
            if params.contains_key(key) {
                continue;
            }
            if let Some(value) = run.value(key) {
                params.insert(Value::from(key), value.clone());
            }
        }

        Ok(Self {
            name: name.to_string(),
            kind,
            level: level.to_string(),
            datatypes,
            make_global,
            products,
            procname: run.name.clone(),
            basepath: run.save_img_base_path.clone(),
            config_path: run.config_path.clone(),
            save_name: optional_str(section, "dssavename")?,
            params,
        })
    }

    pub fn param_f64(&self, key: &str) -> Option<f64> {
        match self.params.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn parse_products(dataset: &str, section: &Mapping) -> FlowResult<Vec<ProductSettings>> {
    let Some(products) = section.get("products") else {
        return Ok(Vec::new());
    };
    let entries = match products {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(entries) => entries,
        _ => {
            return Err(FlowError::InvalidParameter {
                name: format!("{dataset}.products"),
                reason: "expected a mapping of product name to settings".into(),
            })
        }
    };

    let mut parsed = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let name = scalar_string(key).ok_or_else(|| FlowError::InvalidParameter {
            name: format!("{dataset}.products"),
            reason: "product names must be strings".into(),
        })?;
        let params = value.as_mapping().cloned().unwrap_or_default();
        let kind = optional_str(&params, "type")?
            .ok_or_else(|| FlowError::MissingParameter(format!("{dataset}.products.{name}.type")))?;
        parsed.push(ProductSettings { name, kind, params });
    }
    Ok(parsed)
}

/// Per-(dataset, product) settings for one invocation. Rebuilt every cycle.
#[derive(Debug, Clone)]
pub struct ProductConfig {
    pub procname: String,
    pub basepath: PathBuf,
    pub dsname: String,
    pub dstype: String,
    pub prdname: String,
    pub kind: String,
    pub timeinfo: Option<DateTime<Utc>>,
    pub runinfo: String,
    pub img_format: Vec<String>,
    pub scan_period: f64,
    pub smn_path: Option<PathBuf>,
    pub disdro_path: Option<PathBuf>,
    pub cosmo_path: Vec<PathBuf>,
    pub save_name: Option<String>,
    pub params: Mapping,
}

impl ProductConfig {
    pub fn build(
        run: &RunConfig,
        stage: &StageConfig,
        product: &ProductSettings,
        timeinfo: Option<DateTime<Utc>>,
        runinfo: &str,
    ) -> Self {
        let mut params = product.params.clone();
        for key in PRODUCT_IMAGE_KEYS {
            if let Some(value) = run.value(key) {
                params.insert(Value::from(key), value.clone());
            }
        }

        Self {
            procname: run.name.clone(),
            basepath: run.save_img_base_path.clone(),
            dsname: stage.name.clone(),
            dstype: stage.kind.clone(),
            prdname: product.name.clone(),
            kind: product.kind.clone(),
            timeinfo,
            runinfo: runinfo.to_string(),
            img_format: run.img_format.clone(),
            scan_period: run.scan_period,
            smn_path: run.smn_path.clone(),
            disdro_path: run.disdro_path.clone(),
            cosmo_path: run.cosmo_path.clone(),
            save_name: stage.save_name.clone(),
            params,
        }
    }

    /// Directory products of this (dataset, product) pair are written to.
    pub fn output_dir(&self) -> PathBuf {
        self.basepath
            .join(&self.procname)
            .join(self.save_name.as_deref().unwrap_or(&self.dsname))
            .join(&self.prdname)
    }
}
