//! Per-kind artifact parsers
//!
//! Each parser takes the raw bytes of one artifact and returns whatever it
//! could extract plus a list of warnings. None of them fail: a corrupt file
//! degrades to default values and a warning.

use modelhub_kernel::{IcStat, IcTable, ModelMeta, TrainingInfo};
use serde_pickle::{DeOptions, HashableValue, Value};
use std::collections::BTreeMap;

/// Parsed factor list.
pub(crate) fn factor_list(bytes: &[u8], warnings: &mut Vec<String>) -> Vec<String> {
    let factors: Vec<String> = String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if factors.is_empty() {
        warnings.push("factor list has no non-empty rows".to_string());
    }
    factors
}

/// Parsed IC table.
#[derive(Debug, Default)]
pub(crate) struct IcRows {
    pub table: IcTable,
    /// First non-empty `return_name` among the readable rows
    pub first_return_name: Option<String>,
}

pub(crate) fn ic_table(bytes: &[u8], warnings: &mut Vec<String>) -> IcRows {
    let mut rows = IcRows::default();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            warnings.push(format!("IC table unreadable: {e}"));
            return rows;
        }
    };
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let Some(factor_col) = column("factor_name") else {
        warnings.push("IC table has no `factor_name` column".to_string());
        return rows;
    };
    let tau_col = column("kendall_tau");
    if tau_col.is_none() {
        warnings.push("IC table has no `Kendall_tau` column".to_string());
    }
    let symbol_col = column("symbol");
    let return_col = column("return_name");

    let mut bad_rows = 0usize;
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(_) => {
                bad_rows += 1;
                continue;
            }
        };
        let cell = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let Some(factor) = cell(Some(factor_col)) else {
            continue;
        };
        let stat = IcStat {
            kendall_tau: cell(tau_col).and_then(|v| v.parse::<f64>().ok()).filter(|v| v.is_finite()),
            symbol: cell(symbol_col),
            return_name: cell(return_col),
        };
        if rows.first_return_name.is_none() {
            rows.first_return_name = stat.return_name.clone();
        }
        rows.table.insert(factor, stat);
    }

    if bad_rows > 0 {
        warnings.push(format!("IC table has {bad_rows} unreadable rows"));
    }
    if rows.table.is_empty() {
        warnings.push("IC table has no rows".to_string());
    }
    rows
}

/// Fields read from the info blob.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct InfoBlob {
    pub symbol: Option<String>,
    pub return_name: Option<String>,
    pub selected_factors: Vec<String>,
    pub training: TrainingInfo,
}

/// Decodes a pickled info mapping against the expected schema.
///
/// Required: `symbol`, `return_name`, `train_window`, `train_samples`.
/// Optional: `train_start_date`, `train_end_date`, `train_time`,
/// `selected_factors`. Unknown keys are ignored; wrong types count as
/// missing.
pub(crate) fn info_blob(bytes: &[u8], warnings: &mut Vec<String>) -> InfoBlob {
    let mut info = InfoBlob::default();
    let options = DeOptions::new().replace_unresolved_globals().decode_strings();

    let map = match serde_pickle::value_from_slice(bytes, options) {
        Ok(Value::Dict(map)) => map,
        Ok(other) => {
            warnings.push(format!(
                "info blob is not a mapping (found {})",
                value_kind(&other)
            ));
            return info;
        }
        Err(e) => {
            warnings.push(format!("info blob unreadable: {e}"));
            return info;
        }
    };

    let mut schema = Schema {
        map: &map,
        warnings,
    };
    info.symbol = schema.required("symbol", as_string);
    info.return_name = schema.required("return_name", as_string);
    if let Some((start, end)) = schema.required("train_window", as_window) {
        info.training.window_start = Some(start);
        info.training.window_end = Some(end);
    }
    info.training.samples = schema
        .required("train_samples", as_int)
        .and_then(|n| u64::try_from(n).ok());
    info.training.start_date = schema.optional("train_start_date", as_string);
    info.training.end_date = schema.optional("train_end_date", as_string);
    info.training.train_time_sec = schema.optional("train_time", as_float);
    info.selected_factors = schema
        .optional("selected_factors", as_string_list)
        .unwrap_or_default();
    info
}

struct Schema<'a> {
    map: &'a BTreeMap<HashableValue, Value>,
    warnings: &'a mut Vec<String>,
}

impl<'a> Schema<'a> {
    fn lookup(&self, key: &str) -> Option<&'a Value> {
        self.map
            .get(&HashableValue::String(key.to_string()))
            .or_else(|| self.map.get(&HashableValue::Bytes(key.as_bytes().to_vec())))
            .filter(|value| !matches!(value, Value::None))
    }

    fn required<T>(&mut self, key: &str, extract: fn(&Value) -> Option<T>) -> Option<T> {
        match self.lookup(key) {
            None => {
                self.warnings
                    .push(format!("info blob missing required field `{key}`"));
                None
            }
            Some(value) => self.typed(key, value, extract),
        }
    }

    fn optional<T>(&mut self, key: &str, extract: fn(&Value) -> Option<T>) -> Option<T> {
        let value = self.lookup(key)?;
        self.typed(key, value, extract)
    }

    fn typed<T>(&mut self, key: &str, value: &Value, extract: fn(&Value) -> Option<T>) -> Option<T> {
        let extracted = extract(value);
        if extracted.is_none() {
            self.warnings.push(format!(
                "info blob field `{key}` has unexpected type {}",
                value_kind(value)
            ));
        }
        extracted
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Bytes(b) => String::from_utf8(b.clone()).ok().map(|s| s.trim().to_string()),
        _ => None,
    }
    .filter(|s| !s.is_empty())
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::I64(n) => Some(*n),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::F64(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::F64(f) if f.is_finite() => Some(*f),
        Value::I64(n) => Some(*n as f64),
        _ => None,
    }
}

fn as_window(value: &Value) -> Option<(i64, i64)> {
    match value {
        Value::List(items) | Value::Tuple(items) if items.len() == 2 => {
            Some((as_int(&items[0])?, as_int(&items[1])?))
        }
        _ => None,
    }
}

fn as_string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::List(items) | Value::Tuple(items) => items.iter().map(as_string).collect(),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::None => "None",
        Value::Bool(_) => "bool",
        Value::I64(_) | Value::Int(_) => "int",
        Value::F64(_) => "float",
        Value::Bytes(_) => "bytes",
        Value::String(_) => "str",
        Value::List(_) => "list",
        Value::Tuple(_) => "tuple",
        Value::Set(_) | Value::FrozenSet(_) => "set",
        Value::Dict(_) => "dict",
        #[allow(unreachable_patterns)]
        _ => "object",
    }
}

/// Reads XGBoost JSON model metadata.
pub(crate) fn model_meta(bytes: &[u8], warnings: &mut Vec<String>) -> Option<ModelMeta> {
    let doc: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warnings.push(format!("served model is not valid JSON: {e}"));
            return None;
        }
    };

    let learner = &doc["learner"];
    if !learner.is_object() {
        warnings.push("served model has no `learner` section".to_string());
    }

    let version = doc["version"].as_array().map(|parts| {
        parts
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(".")
    });

    Some(ModelMeta {
        num_feature: json_uint(&learner["learner_model_param"]["num_feature"]),
        objective: learner["objective"]["name"].as_str().map(str::to_string),
        num_trees: json_uint(&learner["gradient_booster"]["model"]["gbtree_model_param"]["num_trees"]),
        version,
    })
}

/// XGBoost writes numeric params as strings.
fn json_uint(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
