//! Application Settings
//!
//! Flat, dotted key/value settings loaded from YAML with environment
//! overrides.
//!
//! ```yaml
//! app:
//!   name: Solder
//! database:
//!   name: main
//!   pool: 8
//! ```
//!
//! flattens to `app.name`, `database.name`, `database.pool`.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable naming the settings file.
pub const SETTINGS_PATH_VAR: &str = "SOLDER_SETTINGS";

/// Environment variable naming the token config for the CLI.
pub const TOKENS_PATH_VAR: &str = "SOLDER_TOKENS";

/// Variables under the override prefix that are never settings.
const RESERVED_VARS: &[&str] = &[SETTINGS_PATH_VAR, TOKENS_PATH_VAR];

/// Prefix for environment overrides (`SOLDER_DATABASE__NAME` → `database.name`).
pub const ENV_PREFIX: &str = "SOLDER";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported value at '{key}': {reason}")]
    Unsupported { key: String, reason: String },

    #[error("Missing setting: {0}")]
    Missing(String),

    #[error("Setting '{key}' = '{value}' could not be parsed: {reason}")]
    Parse {
        key: String,
        value: String,
        reason: String,
    },
}

/// Ordered application settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSettings {
    values: BTreeMap<String, String>,
}

impl AppSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML document, flattening nested mappings to dotted keys.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SettingsError> {
        let doc: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let mut settings = Self::new();
        match doc {
            serde_yaml::Value::Null => {}
            serde_yaml::Value::Mapping(map) => flatten_into(&mut settings.values, "", &map)?,
            _ => {
                return Err(SettingsError::Unsupported {
                    key: String::new(),
                    reason: "top level must be a mapping".to_string(),
                })
            }
        }
        Ok(settings)
    }

    /// Load settings from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        info!("Loading settings from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_yaml_str(&content)?;
        info!("Loaded {} settings", settings.len());
        Ok(settings)
    }

    /// Load from `SOLDER_SETTINGS` or `config/settings.yaml`, then apply
    /// `SOLDER_*` environment overrides.
    ///
    /// Missing files yield empty settings; unreadable ones are errors.
    pub fn from_env() -> Result<Self, SettingsError> {
        let settings = match std::env::var(SETTINGS_PATH_VAR) {
            Ok(path) => Self::load(path)?,
            Err(_) => {
                let default_path = Path::new("config").join("settings.yaml");
                if default_path.exists() {
                    Self::load(default_path)?
                } else {
                    debug!("No settings file found, starting empty");
                    Self::new()
                }
            }
        };
        Ok(settings.with_env_overrides(ENV_PREFIX))
    }

    /// Apply `PREFIX_SECTION__KEY=value` variables as `section.key` overrides.
    pub fn with_env_overrides(self, prefix: &str) -> Self {
        self.with_overrides(prefix, std::env::vars())
    }

    /// Apply overrides from an explicit list of variables.
    pub fn with_overrides<I>(mut self, prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let marker = format!("{prefix}_");
        for (name, value) in vars {
            let Some(rest) = name.strip_prefix(&marker) else {
                continue;
            };
            if rest.is_empty() || RESERVED_VARS.contains(&name.as_str()) {
                continue;
            }
            let key = rest.to_ascii_lowercase().replace("__", ".");
            debug!("Setting override from {}: {}", name, key);
            self.values.insert(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str, SettingsError> {
        self.get(key)
            .ok_or_else(|| SettingsError::Missing(key.to_string()))
    }

    /// Parse a setting; absent keys give `Ok(None)`.
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, SettingsError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| SettingsError::Parse {
                    key: key.to_string(),
                    value: raw.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Nested object view, e.g. for use as a wildcard target.
    ///
    /// When a key is both a value and a prefix (`a` and `a.b`), the value is
    /// kept and the nested key is dropped.
    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        for (key, value) in &self.values {
            insert_nested(&mut root, key, value);
        }
        Value::Object(root)
    }
}

fn flatten_into(
    out: &mut BTreeMap<String, String>,
    prefix: &str,
    map: &serde_yaml::Mapping,
) -> Result<(), SettingsError> {
    for (k, v) in map {
        let segment = match k {
            serde_yaml::Value::String(s) => s.clone(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            _ => {
                return Err(SettingsError::Unsupported {
                    key: prefix.to_string(),
                    reason: "mapping keys must be scalars".to_string(),
                })
            }
        };
        let key = if prefix.is_empty() {
            segment
        } else {
            format!("{prefix}.{segment}")
        };

        match v {
            serde_yaml::Value::Mapping(nested) => flatten_into(out, &key, nested)?,
            serde_yaml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            serde_yaml::Value::Number(n) => {
                out.insert(key, n.to_string());
            }
            serde_yaml::Value::Bool(b) => {
                out.insert(key, b.to_string());
            }
            serde_yaml::Value::Null => {
                out.insert(key, String::new());
            }
            serde_yaml::Value::Sequence(_) | serde_yaml::Value::Tagged(_) => {
                return Err(SettingsError::Unsupported {
                    key,
                    reason: "only scalars and mappings are allowed".to_string(),
                })
            }
        }
    }
    Ok(())
}

fn insert_nested(root: &mut Map<String, Value>, key: &str, value: &str) {
    let mut current = root;
    let mut segments = key.split('.').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current
                .entry(segment.to_string())
                .or_insert_with(|| Value::String(value.to_string()));
            return;
        }
        let child = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match child {
            Value::Object(map) => current = map,
            _ => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"
app:
  name: Solder
  debug: true
database:
  name: main
  pool: 8
empty:
"#;

    #[test]
    fn test_flattens_nested_yaml() {
        let settings = AppSettings::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(settings.get("app.name"), Some("Solder"));
        assert_eq!(settings.get("app.debug"), Some("true"));
        assert_eq!(settings.get("database.pool"), Some("8"));
        assert_eq!(settings.get("empty"), Some(""));
        assert_eq!(settings.len(), 5);
    }

    #[test]
    fn test_sequences_rejected() {
        let err = AppSettings::from_yaml_str("hosts:\n  - a\n  - b\n").unwrap_err();
        assert!(matches!(err, SettingsError::Unsupported { ref key, .. } if key == "hosts"));
    }

    #[test]
    fn test_get_parsed_and_require() {
        let settings = AppSettings::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(settings.get_parsed::<u32>("database.pool").unwrap(), Some(8));
        assert_eq!(settings.get_parsed::<bool>("app.debug").unwrap(), Some(true));
        assert_eq!(settings.get_parsed::<u32>("nope").unwrap(), None);
        assert!(matches!(
            settings.get_parsed::<u32>("app.name"),
            Err(SettingsError::Parse { .. })
        ));
        assert!(matches!(
            settings.require("nope"),
            Err(SettingsError::Missing(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let settings = AppSettings::from_yaml_str(SAMPLE).unwrap().with_overrides(
            "SOLDER",
            vec![
                ("SOLDER_DATABASE__NAME".to_string(), "replica".to_string()),
                ("SOLDER_FEATURE".to_string(), "on".to_string()),
                ("OTHER_DATABASE__NAME".to_string(), "ignored".to_string()),
                ("SOLDER_SETTINGS".to_string(), "/etc/solder.yaml".to_string()),
                ("SOLDER_TOKENS".to_string(), "tokens.yaml".to_string()),
            ],
        );
        assert_eq!(settings.get("database.name"), Some("replica"));
        assert_eq!(settings.get("feature"), Some("on"));
        assert_eq!(settings.get("settings"), None);
        assert_eq!(settings.get("tokens"), None);
    }

    #[test]
    fn test_to_value_nests() {
        let mut settings = AppSettings::new();
        settings.set("database.name", "main");
        settings.set("database.pool", "8");
        settings.set("app", "Solder");
        assert_eq!(
            settings.to_value(),
            json!({
                "app": "Solder",
                "database": { "name": "main", "pool": "8" }
            })
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let settings = AppSettings::load(&path).unwrap();
        assert_eq!(settings.get("database.name"), Some("main"));

        let missing = AppSettings::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(missing, SettingsError::Io { .. }));
    }
}
