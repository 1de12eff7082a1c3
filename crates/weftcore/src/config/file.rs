//! On-disk configuration fragments.
//!
//! A fragment file is a TOML document with one section per entity kind:
//! `[global]`, `[job]`, `[data_node.<name>]`, `[task.<name>]`,
//! `[pipeline.<name>]` and `[scenario.<name>]`. Fragments are kept as raw
//! TOML tables so `ENV[VAR]` placeholders are resolved against the process
//! environment at every compile, not at load time.

use crate::error::ConfigError;
use crate::naming::protect_name;
use crate::scope::{Frequency, Scope};
use crate::value::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use toml::Table;

const GLOBAL_SECTION: &str = "global";
const JOB_SECTION: &str = "job";
const DATA_NODE_SECTION: &str = "data_node";
const TASK_SECTION: &str = "task";
const PIPELINE_SECTION: &str = "pipeline";
const SCENARIO_SECTION: &str = "scenario";

/// Parsed but uncoerced configuration file.
#[derive(Debug, Clone, Default)]
pub(crate) struct FileFragment {
    pub global: Option<Table>,
    pub job: Option<Table>,
    pub data_nodes: BTreeMap<String, Table>,
    pub tasks: BTreeMap<String, Table>,
    pub pipelines: BTreeMap<String, Table>,
    pub scenarios: BTreeMap<String, Table>,
}

impl FileFragment {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        tracing::info!(path = %path.display(), "loading configuration file");
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let root: Table = toml::from_str(contents)?;
        let mut fragment = FileFragment::default();
        for (section, value) in root {
            match section.as_str() {
                GLOBAL_SECTION => fragment.global = Some(expect_table(&section, value)?),
                JOB_SECTION => fragment.job = Some(expect_table(&section, value)?),
                DATA_NODE_SECTION => fragment.data_nodes = named_tables(&section, value)?,
                TASK_SECTION => fragment.tasks = named_tables(&section, value)?,
                PIPELINE_SECTION => fragment.pipelines = named_tables(&section, value)?,
                SCENARIO_SECTION => fragment.scenarios = named_tables(&section, value)?,
                other => {
                    tracing::warn!(section = other, "ignoring unknown configuration section");
                }
            }
        }
        Ok(fragment)
    }
}

fn expect_table(section: &str, value: toml::Value) -> Result<Table, ConfigError> {
    match value {
        toml::Value::Table(table) => Ok(table),
        other => Err(ConfigError::InvalidValue {
            field: section.to_string(),
            expected: "table".to_string(),
            value: other.to_string(),
        }),
    }
}

fn named_tables(section: &str, value: toml::Value) -> Result<BTreeMap<String, Table>, ConfigError> {
    let table = expect_table(section, value)?;
    let mut out = BTreeMap::new();
    for (name, entry) in table {
        let entry = expect_table(&format!("{}.{}", section, name), entry)?;
        out.insert(protect_name(&name), entry);
    }
    Ok(out)
}

/// Resolves an `ENV[VAR]` placeholder against the process environment.
/// Plain strings pass through untouched.
pub(crate) fn resolve_env(s: &str) -> Result<String, ConfigError> {
    if let Some(var) = s.strip_prefix("ENV[").and_then(|rest| rest.strip_suffix(']')) {
        return std::env::var(var).map_err(|_| ConfigError::MissingEnvVariable(var.to_string()));
    }
    Ok(s.to_string())
}

pub(crate) fn coerce_string(field: &str, value: &toml::Value) -> Result<String, ConfigError> {
    match value {
        toml::Value::String(s) => resolve_env(s),
        other => Err(invalid(field, "string", other)),
    }
}

pub(crate) fn coerce_usize(field: &str, value: &toml::Value) -> Result<usize, ConfigError> {
    match value {
        toml::Value::Integer(n) if *n >= 0 => Ok(*n as usize),
        toml::Value::String(s) => {
            let resolved = resolve_env(s)?;
            resolved
                .parse::<usize>()
                .map_err(|_| invalid(field, "non-negative integer", value))
        }
        other => Err(invalid(field, "non-negative integer", other)),
    }
}

pub(crate) fn coerce_bool(field: &str, value: &toml::Value) -> Result<bool, ConfigError> {
    match value {
        toml::Value::Boolean(b) => Ok(*b),
        toml::Value::String(s) => {
            let resolved = resolve_env(s)?;
            resolved
                .parse::<bool>()
                .map_err(|_| invalid(field, "boolean", value))
        }
        other => Err(invalid(field, "boolean", other)),
    }
}

pub(crate) fn coerce_scope(field: &str, value: &toml::Value) -> Result<Scope, ConfigError> {
    let raw = coerce_string(field, value)?;
    Scope::from_str(&raw).map_err(|_| invalid(field, "one of global/cycle/scenario/pipeline", value))
}

pub(crate) fn coerce_frequency(field: &str, value: &toml::Value) -> Result<Frequency, ConfigError> {
    let raw = coerce_string(field, value)?;
    Frequency::from_str(&raw).map_err(|_| invalid(field, "one of daily/weekly/monthly/yearly", value))
}

pub(crate) fn coerce_name_list(field: &str, value: &toml::Value) -> Result<Vec<String>, ConfigError> {
    match value {
        toml::Value::Array(items) => items
            .iter()
            .map(|item| coerce_string(field, item).map(|s| protect_name(&s)))
            .collect(),
        other => Err(invalid(field, "array of names", other)),
    }
}

/// Converts an arbitrary TOML value to a [`Value`], resolving `ENV[VAR]`
/// placeholders inside every string scalar.
pub(crate) fn coerce_value(field: &str, value: &toml::Value) -> Result<Value, ConfigError> {
    Ok(match value {
        toml::Value::String(s) => Value::String(resolve_env(s)?),
        toml::Value::Integer(n) => Value::Int(*n),
        toml::Value::Float(n) => Value::Float(*n),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::List(
            items
                .iter()
                .map(|item| coerce_value(field, item))
                .collect::<Result<_, _>>()?,
        ),
        toml::Value::Table(table) => Value::Map(
            table
                .iter()
                .map(|(k, v)| coerce_value(&format!("{}.{}", field, k), v).map(|v| (k.clone(), v)))
                .collect::<Result<_, _>>()?,
        ),
    })
}

fn invalid(field: &str, expected: &str, value: &toml::Value) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        expected: expected.to_string(),
        value: value.to_string(),
    }
}

/// Inverse of [`coerce_value`], used when exporting the applied config.
pub(crate) fn value_to_toml(value: &Value) -> toml::Value {
    match value {
        Value::Null => toml::Value::String(String::new()),
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Int(n) => toml::Value::Integer(*n),
        Value::Float(n) => toml::Value::Float(*n),
        Value::String(s) => toml::Value::String(s.clone()),
        Value::List(items) => toml::Value::Array(items.iter().map(value_to_toml).collect()),
        Value::Map(map) => {
            let mut table = Table::new();
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            for key in keys {
                table.insert(key.clone(), value_to_toml(&map[key]));
            }
            toml::Value::Table(table)
        }
        Value::Json(j) => toml::Value::String(j.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_by_kind() {
        let fragment = FileFragment::parse(
            r#"
            [global]
            root_folder = "/tmp/weft"

            [job]
            mode = "parallel"

            [data_node."Sales History"]
            storage_type = "in_memory"

            [task.training]
            inputs = ["sales history"]
            "#,
        )
        .unwrap();
        assert!(fragment.global.is_some());
        assert!(fragment.job.is_some());
        assert!(fragment.data_nodes.contains_key("sales_history"));
        assert!(fragment.tasks.contains_key("training"));
    }

    #[test]
    fn env_placeholder_resolves_against_process_environment() {
        std::env::set_var("WEFT_TEST_FILE_VAR", "resolved");
        let resolved = resolve_env("ENV[WEFT_TEST_FILE_VAR]").unwrap();
        assert_eq!(resolved, "resolved");
        std::env::remove_var("WEFT_TEST_FILE_VAR");
    }

    #[test]
    fn unset_env_placeholder_is_an_error() {
        let err = resolve_env("ENV[WEFT_TEST_FILE_UNSET]").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVariable(v) if v == "WEFT_TEST_FILE_UNSET"));
    }

    #[test]
    fn usize_coercion_goes_through_env() {
        std::env::set_var("WEFT_TEST_FILE_N", "3");
        let value = toml::Value::String("ENV[WEFT_TEST_FILE_N]".to_string());
        assert_eq!(coerce_usize("job.nb_of_workers", &value).unwrap(), 3);
        std::env::remove_var("WEFT_TEST_FILE_N");

        let bad = toml::Value::String("abc".to_string());
        assert!(coerce_usize("job.nb_of_workers", &bad).is_err());
    }
}
