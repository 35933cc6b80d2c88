//! Resolution traces and their persisted form.
//!
//! A trace lists every decision a resolution visited, in visiting order, with
//! the raw value that was used. Fed back through an `OverrideSampler` it
//! reconstructs the same configuration exactly.
//!
//! On disk a trace travels as a [`TraceRecord`], which adds the space name and
//! the program length policy. Tables produced under one policy are not
//! key-compatible with the other, so the policy has to travel with the keys.

use super::path::PathKey;
use super::sampler::OverrideTable;
use crate::error::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionTrace {
    /// Canonical key → raw value (option index or integer), in visiting order.
    pub samplings: IndexMap<String, i64>,
    /// Fidelity attribute name → value.
    pub environment: IndexMap<String, i64>,
}

impl ResolutionTrace {
    pub(crate) fn record(&mut self, key: &PathKey, value: i64) {
        self.samplings.insert(key.to_string(), value);
    }

    pub(crate) fn record_environment(&mut self, name: &str, value: i64) {
        self.environment.insert(name.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.samplings.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.samplings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplings.is_empty()
    }

    /// Use the whole trace as an override table (full replay).
    pub fn to_overrides(&self) -> OverrideTable {
        OverrideTable { samplings: self.samplings.clone(), environment: self.environment.clone() }
    }
}

/// Persisted trace plus the metadata needed to replay it safely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    #[serde(default)]
    pub space: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(default)]
    pub samplings: IndexMap<String, i64>,
    #[serde(default)]
    pub environment: IndexMap<String, i64>,
}

impl TraceRecord {
    pub fn new(space: impl Into<String>, policy: Option<String>, trace: &ResolutionTrace) -> Self {
        TraceRecord {
            space: space.into(),
            policy,
            samplings: trace.samplings.clone(),
            environment: trace.environment.clone(),
        }
    }

    pub fn overrides(&self) -> OverrideTable {
        OverrideTable { samplings: self.samplings.clone(), environment: self.environment.clone() }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a record, or a flat `SAMPLING__`/`ENVIRONMENT__` prefixed config.
    ///
    /// The flat form carries no metadata, so its policy is unknown.
    pub fn from_json(text: &str) -> Result<Self> {
        TraceRecord::from_value(serde_json::from_str(text)?)
    }

    /// YAML counterpart of [`TraceRecord::from_json`], for experiment
    /// `config.yaml` files.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let raw: serde_yaml::Value = serde_yaml::from_str(text)?;
        TraceRecord::from_value(serde_json::to_value(raw)?)
    }

    fn from_value(raw: serde_json::Value) -> Result<Self> {
        match raw {
            serde_json::Value::Object(map) if !map.contains_key("samplings") => {
                let table = OverrideTable::from_prefixed(&map)?;
                Ok(TraceRecord { space: String::new(), policy: None, samplings: table.samplings, environment: table.environment })
            }
            other => Ok(serde_json::from_value(other)?),
        }
    }
}
