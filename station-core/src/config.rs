use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

pub const PROP_API_KEY: &str = "apiKey";
pub const PROP_CITY_ID: &str = "cityId";
pub const PROP_CITY: &str = "city";
pub const PROP_STATE: &str = "state";

/// String-keyed plugin configuration, as delivered by the configuration store.
///
/// Example TOML:
/// ```toml
/// apiKey = "..."
/// cityId = "5419384"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginConfig {
    values: BTreeMap<String, Value>,
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for string values.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_owned(), Value::String(value.into()));
    }

    pub fn set_value(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_owned(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Load config from the default location, or return an empty config if
    /// the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Save config, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("org", "openweathermap", "weather-station")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toml_into_string_map() {
        let cfg: PluginConfig = toml::from_str(
            r#"
            apiKey = "abcd"
            cityId = 5419384
            "#,
        )
        .unwrap();

        assert_eq!(cfg.get(PROP_API_KEY), Some(&Value::String("abcd".into())));
        assert_eq!(cfg.get(PROP_CITY_ID), Some(&Value::from(5419384)));
        assert!(cfg.get(PROP_CITY).is_none());
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PluginConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = PluginConfig::new()
            .with(PROP_API_KEY, "abcd")
            .with(PROP_CITY, "Denver")
            .with(PROP_STATE, "CO");
        cfg.save_to(&path).unwrap();

        assert_eq!(PluginConfig::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn invalid_toml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "apiKey = ").unwrap();

        let err = PluginConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
