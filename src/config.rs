use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Engine settings. Every field has a default, so partial files are fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Attribute-name prefix marking an event hook, e.g. `_onclick="Increment"`.
    pub event_prefix: String,
    /// Function called by serialized event hooks.
    pub event_call: String,
    /// Attribute carrying node identities in serialized output.
    pub id_attribute: String,
    /// Indentation unit of serialized output.
    pub indent: String,
    /// Reject components that declare no field.
    pub require_fields: bool,
    /// With `require_fields` off, a tag whose type declares no field is backed
    /// by one retain-counted instance shared by every anchor.
    pub share_empty_components: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_prefix: "_".to_string(),
            event_call: "CallEvent".to_string(),
            id_attribute: "data-id".to_string(),
            indent: "  ".to_string(),
            require_fields: true,
            share_empty_components: true,
        }
    }
}

impl Config {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Loads a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let yaml = match extension.as_deref() {
            Some("json") => false,
            Some("yaml" | "yml") => true,
            _ => return Err(ConfigError::UnknownFormat { path: display }),
        };
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display,
            source,
        })?;
        if yaml {
            Self::from_yaml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.event_prefix, "_");
        assert_eq!(config.id_attribute, "data-id");
        assert!(config.require_fields);
    }

    #[test]
    fn test_partial_json() {
        let config = Config::from_json_str(r#"{ "event_call": "Fire" }"#).unwrap();
        assert_eq!(config.event_call, "Fire");
        assert_eq!(config.indent, "  ");
    }

    #[test]
    fn test_partial_yaml() {
        let config = Config::from_yaml_str("require_fields: false\nindent: \"\\t\"\n").unwrap();
        assert!(!config.require_fields);
        assert_eq!(config.indent, "\t");
        assert!(config.share_empty_components);
    }

    #[test]
    fn test_bad_input() {
        assert!(matches!(
            Config::from_json_str("{ nope"),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            Config::from_path("settings.toml"),
            Err(ConfigError::UnknownFormat { .. })
        ));
    }
}
