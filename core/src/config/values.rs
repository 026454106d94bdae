//! Typed accessors over the raw merged settings mapping.

use crate::error::{FlowError, FlowResult};
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;

fn invalid(name: &str, reason: impl Into<String>) -> FlowError {
    FlowError::InvalidParameter {
        name: name.to_string(),
        reason: reason.into(),
    }
}

pub fn required_str(map: &Mapping, key: &str) -> FlowResult<String> {
    match map.get(key) {
        None | Some(Value::Null) => Err(FlowError::MissingParameter(key.to_string())),
        Some(value) => scalar_string(value).ok_or_else(|| invalid(key, "expected a string")),
    }
}

pub fn optional_str(map: &Mapping, key: &str) -> FlowResult<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_string(value)
            .map(Some)
            .ok_or_else(|| invalid(key, "expected a string")),
    }
}

pub fn optional_path(map: &Mapping, key: &str) -> FlowResult<Option<PathBuf>> {
    Ok(optional_str(map, key)?.map(PathBuf::from))
}

pub fn optional_f64(map: &Mapping, key: &str) -> FlowResult<Option<f64>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(key, "not representable as a float")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|err| invalid(key, err.to_string())),
        Some(_) => Err(invalid(key, "expected a number")),
    }
}

pub fn optional_usize(map: &Mapping, key: &str) -> FlowResult<Option<usize>> {
    match optional_f64(map, key)? {
        None => Ok(None),
        Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(Some(v as usize)),
        Some(v) => Err(invalid(key, format!("expected a non-negative integer, got {v}"))),
    }
}

/// Reads a list of strings; a scalar becomes a one-element list.
pub fn string_list(map: &Mapping, key: &str) -> FlowResult<Vec<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| scalar_string(item).ok_or_else(|| invalid(key, "expected a list of strings")))
            .collect(),
        Some(value) => scalar_string(value)
            .map(|s| vec![s])
            .ok_or_else(|| invalid(key, "expected a string or a list of strings")),
    }
}

pub fn path_list(map: &Mapping, key: &str) -> FlowResult<Vec<PathBuf>> {
    Ok(string_list(map, key)?.into_iter().map(PathBuf::from).collect())
}

/// Accepts `true`/`false` as well as the numeric `0`/`1` style.
pub fn flag(map: &Mapping, key: &str) -> FlowResult<bool> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Number(n)) => Ok(n.as_f64().map(|v| v != 0.0).unwrap_or(false)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(invalid(key, format!("cannot read '{other}' as a flag"))),
        },
        Some(_) => Err(invalid(key, "expected a flag")),
    }
}

/// Per-radar scan lists.
///
/// Either a list of lists (one per radar), or a flat list in which
/// `RADARnnn` entries start the scans of the next radar. A flat list without
/// markers belongs to a single radar.
pub fn scan_list(map: &Mapping, key: &str) -> FlowResult<Option<Vec<Vec<String>>>> {
    let items = match map.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Sequence(items)) => items,
        Some(value) => {
            let scan = scalar_string(value).ok_or_else(|| invalid(key, "expected a list"))?;
            return Ok(Some(vec![vec![scan]]));
        }
    };

    if items.iter().all(|item| matches!(item, Value::Sequence(_))) {
        let mut radars = Vec::with_capacity(items.len());
        for item in items {
            let Value::Sequence(scans) = item else { continue };
            let scans = scans
                .iter()
                .map(|s| scalar_string(s).ok_or_else(|| invalid(key, "expected scan names")))
                .collect::<FlowResult<Vec<_>>>()?;
            radars.push(scans);
        }
        return Ok(Some(radars));
    }

    let mut radars: Vec<Vec<String>> = Vec::new();
    for item in items {
        let entry = scalar_string(item).ok_or_else(|| invalid(key, "expected scan names"))?;
        if entry.starts_with("RADAR") {
            radars.push(Vec::new());
        } else {
            match radars.last_mut() {
                Some(current) => current.push(entry),
                None => radars.push(vec![entry]),
            }
        }
    }
    Ok(Some(radars))
}

pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
