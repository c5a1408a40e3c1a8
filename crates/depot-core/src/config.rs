//! Configuration properties carried by a session
//!
//! Values are looked up through ordered key lists: the first key that is
//! present (and convertible) wins, otherwise the caller's default applies.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Prefix for component priority keys, e.g. `depot.priority.FileTransporterFactory`
pub const PREFIX_PRIORITY: &str = "depot.priority.";

/// Rank pluggable components by registration order instead of priority
pub const IMPLICIT_PRIORITIES: &str = "depot.priority.implicit";

pub const DEFAULT_IMPLICIT_PRIORITIES: bool = false;

/// A single configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Float(f64),
    String(String),
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<f32> for ConfigValue {
    fn from(value: f32) -> Self {
        ConfigValue::Float(f64::from(value))
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

/// Generic key/value configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigProperties {
    values: HashMap<String, ConfigValue>,
}

impl ConfigProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First float among `keys`; strings are parsed, so `"NaN"` is a valid value
    pub fn get_float<K: AsRef<str>>(&self, default: f32, keys: &[K]) -> f32 {
        for key in keys {
            match self.values.get(key.as_ref()) {
                Some(ConfigValue::Float(value)) => return *value as f32,
                Some(ConfigValue::String(value)) => {
                    if let Ok(parsed) = value.trim().parse::<f32>() {
                        return parsed;
                    }
                }
                _ => {}
            }
        }
        default
    }

    pub fn get_bool<K: AsRef<str>>(&self, default: bool, keys: &[K]) -> bool {
        for key in keys {
            match self.values.get(key.as_ref()) {
                Some(ConfigValue::Bool(value)) => return *value,
                Some(ConfigValue::String(value)) => {
                    return value.trim().eq_ignore_ascii_case("true");
                }
                _ => {}
            }
        }
        default
    }

    pub fn get_string<K: AsRef<str>>(&self, default: &str, keys: &[K]) -> String {
        for key in keys {
            match self.values.get(key.as_ref()) {
                Some(ConfigValue::String(value)) => return value.clone(),
                Some(ConfigValue::Bool(value)) => return value.to_string(),
                Some(ConfigValue::Float(value)) => return value.to_string(),
                None => {}
            }
        }
        default.to_string()
    }
}

impl FromIterator<(String, ConfigValue)> for ConfigProperties {
    fn from_iter<I: IntoIterator<Item = (String, ConfigValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
