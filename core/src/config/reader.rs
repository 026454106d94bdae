use crate::error::{FlowError, FlowResult};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const LOCATION_CONFIG_KEY: &str = "locationConfigFile";
pub const PRODUCT_CONFIG_KEY: &str = "productConfigFile";

/// Merges the top-level keys of a YAML file into `existing`. Keys from the
/// file replace keys already present.
pub fn read_config(path: &Path, mut existing: Mapping) -> FlowResult<Mapping> {
    let contents = fs::read_to_string(path).map_err(|source| FlowError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: Value = serde_yaml::from_str(&contents).map_err(|source| FlowError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;

    match parsed {
        Value::Mapping(entries) => {
            for (key, value) in entries {
                existing.insert(key, value);
            }
            Ok(existing)
        }
        Value::Null => Ok(existing),
        _ => Err(FlowError::ConfigNotMapping(path.to_path_buf())),
    }
}

/// Reads the main file, then the location and product files it points to.
pub fn read_layered_mapping(main: &Path) -> FlowResult<Mapping> {
    let base_dir = main.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut mapping = Mapping::new();
    mapping.insert(
        Value::from("configFile"),
        Value::from(main.display().to_string()),
    );

    log::info!("- Main config file : {}", main.display());
    mapping = read_config(main, mapping)?;

    for key in [LOCATION_CONFIG_KEY, PRODUCT_CONFIG_KEY] {
        let Some(raw) = mapping.get(key).and_then(Value::as_str) else {
            log::debug!("no {key} set");
            continue;
        };
        let path = resolve_relative(&base_dir, raw);
        log::info!("- {} : {}", key, path.display());
        mapping = read_config(&path, mapping)?;
    }

    Ok(mapping)
}

fn resolve_relative(base: &Path, raw: &str) -> PathBuf {
    let candidate = PathBuf::from(raw);
    if candidate.is_absolute() {
        candidate
    } else {
        base.join(candidate)
    }
}
