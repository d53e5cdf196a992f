use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use serde::Deserialize;

use crate::errors::{Result, TableFrameError};
use crate::registry::is_reserved;

pub const DEFAULT_JOIN_SUFFIX: &str = "_right";

/// How generated row identifiers are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowIdFormat {
    /// 36 characters, `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
    #[default]
    Hyphenated,
    /// 32 hex characters, no separators.
    Simple,
}

impl RowIdFormat {
    pub const fn width(&self) -> usize {
        match self {
            RowIdFormat::Hyphenated => 36,
            RowIdFormat::Simple => 32,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            RowIdFormat::Hyphenated => "hyphenated",
            RowIdFormat::Simple => "simple",
        }
    }
}

/// Configuration for frames.
///
/// Passed explicitly to every frame. Frames built without one share the
/// lazily created [`default_config`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameConfig {
    /// Suffix the engine appends to right side columns that collide during
    /// a join.
    pub join_suffix: String,
    /// Always run full assembly after operations, even when the result
    /// schema verifies.
    pub always_reassemble: bool,
    pub row_id_format: RowIdFormat,
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            join_suffix: DEFAULT_JOIN_SUFFIX.to_string(),
            always_reassemble: false,
            row_id_format: RowIdFormat::Hyphenated,
        }
    }
}

impl FrameConfig {
    /// Parse a config from json. Missing fields keep their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let conf: FrameConfig =
            serde_json::from_str(s).map_err(|e| TableFrameError::InvalidSetting {
                name: "config",
                value: s.to_string(),
                reason: e.to_string(),
            })?;
        JoinSuffix::validate_value(&conf.join_suffix)?;
        Ok(conf)
    }

    pub fn set_from_str(&mut self, name: &str, value: &str) -> Result<()> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| TableFrameError::UnknownSetting(name.to_string()))?;

        (func.set)(value, self)
    }

    pub fn get_as_string(&self, name: &str) -> Result<String> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| TableFrameError::UnknownSetting(name.to_string()))?;

        Ok((func.get)(self))
    }

    pub fn reset(&mut self, name: &str) -> Result<()> {
        let def_conf = Self::default();
        let value = def_conf.get_as_string(name)?;
        self.set_from_str(name, &value)
    }

    /// Names and descriptions of all settings.
    pub fn settings() -> impl Iterator<Item = (&'static str, &'static str)> {
        let mut settings: Vec<_> = GET_SET_FUNCTIONS
            .iter()
            .map(|(name, funcs)| (*name, funcs.description))
            .collect();
        settings.sort_by_key(|(name, _)| *name);
        settings.into_iter()
    }
}

static DEFAULT_CONFIG: LazyLock<Arc<FrameConfig>> =
    LazyLock::new(|| Arc::new(FrameConfig::default()));

/// Shared default configuration.
pub fn default_config() -> Arc<FrameConfig> {
    DEFAULT_CONFIG.clone()
}

struct SettingFunctions {
    description: &'static str,
    set: fn(value: &str, conf: &mut FrameConfig) -> Result<()>,
    get: fn(conf: &FrameConfig) -> String,
}

impl SettingFunctions {
    const fn new<S: FrameSetting>() -> Self {
        SettingFunctions {
            description: S::DESCRIPTION,
            set: S::set_from_str as _,
            get: S::get_as_string as _,
        }
    }
}

fn insert_setting<S: FrameSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static GET_SET_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    insert_setting::<JoinSuffix>(&mut map);
    insert_setting::<AlwaysReassemble>(&mut map);
    insert_setting::<RowIdFormatSetting>(&mut map);

    map
});

pub trait FrameSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn set_from_str(value: &str, conf: &mut FrameConfig) -> Result<()>;
    fn get_as_string(conf: &FrameConfig) -> String;
}

pub struct JoinSuffix;

impl JoinSuffix {
    pub fn validate_value(val: &str) -> Result<()> {
        if val.is_empty() {
            return Err(TableFrameError::InvalidSetting {
                name: Self::NAME,
                value: val.to_string(),
                reason: "suffix cannot be empty".to_string(),
            });
        }

        if is_reserved(val) {
            return Err(TableFrameError::InvalidSetting {
                name: Self::NAME,
                value: val.to_string(),
                reason: "suffix cannot use the reserved system namespace".to_string(),
            });
        }

        Ok(())
    }
}

impl FrameSetting for JoinSuffix {
    const NAME: &'static str = "join_suffix";
    const DESCRIPTION: &'static str = "Suffix for colliding right side columns in joins";

    fn set_from_str(value: &str, conf: &mut FrameConfig) -> Result<()> {
        Self::validate_value(value)?;
        conf.join_suffix = value.to_string();
        Ok(())
    }

    fn get_as_string(conf: &FrameConfig) -> String {
        conf.join_suffix.clone()
    }
}

pub struct AlwaysReassemble;

impl FrameSetting for AlwaysReassemble {
    const NAME: &'static str = "always_reassemble";
    const DESCRIPTION: &'static str = "Run full system column assembly after every operation";

    fn set_from_str(value: &str, conf: &mut FrameConfig) -> Result<()> {
        conf.always_reassemble = match value.to_ascii_lowercase().as_str() {
            "true" | "on" | "1" => true,
            "false" | "off" | "0" => false,
            _ => {
                return Err(TableFrameError::InvalidSetting {
                    name: Self::NAME,
                    value: value.to_string(),
                    reason: "expected a boolean".to_string(),
                });
            }
        };
        Ok(())
    }

    fn get_as_string(conf: &FrameConfig) -> String {
        conf.always_reassemble.to_string()
    }
}

pub struct RowIdFormatSetting;

impl FrameSetting for RowIdFormatSetting {
    const NAME: &'static str = "row_id_format";
    const DESCRIPTION: &'static str = "Rendering of generated row identifiers";

    fn set_from_str(value: &str, conf: &mut FrameConfig) -> Result<()> {
        conf.row_id_format = match value.to_ascii_lowercase().as_str() {
            "hyphenated" => RowIdFormat::Hyphenated,
            "simple" => RowIdFormat::Simple,
            _ => {
                return Err(TableFrameError::InvalidSetting {
                    name: Self::NAME,
                    value: value.to_string(),
                    reason: "expected 'hyphenated' or 'simple'".to_string(),
                });
            }
        };
        Ok(())
    }

    fn get_as_string(conf: &FrameConfig) -> String {
        conf.row_id_format.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn set_setting_exists() {
        let mut conf = FrameConfig::default();
        conf.set_from_str("join_suffix", "_x").unwrap();

        let val = conf.get_as_string("join_suffix").unwrap();
        assert_eq!("_x", val);
    }

    #[test]
    fn set_setting_not_exists() {
        let mut conf = FrameConfig::default();
        let err = conf.set_from_str("hello_world", "1").unwrap_err();
        assert_eq!(ErrorCode::UnknownSetting, err.code());
    }

    #[test]
    fn reject_reserved_suffix() {
        let mut conf = FrameConfig::default();
        let err = conf.set_from_str("join_suffix", "$td.x").unwrap_err();
        assert_eq!(ErrorCode::InvalidSetting, err.code());
        assert_eq!(DEFAULT_JOIN_SUFFIX, conf.join_suffix);
    }

    #[test]
    fn reset_restores_default() {
        let mut conf = FrameConfig::default();
        conf.set_from_str("always_reassemble", "on").unwrap();
        assert!(conf.always_reassemble);

        conf.reset("always_reassemble").unwrap();
        assert!(!conf.always_reassemble);
    }

    #[test]
    fn from_json_partial() {
        let conf = FrameConfig::from_json(r#"{"row_id_format": "simple"}"#).unwrap();
        assert_eq!(RowIdFormat::Simple, conf.row_id_format);
        assert_eq!(DEFAULT_JOIN_SUFFIX, conf.join_suffix);

        let err = FrameConfig::from_json(r#"{"join_suffix": ""}"#).unwrap_err();
        assert_eq!(ErrorCode::InvalidSetting, err.code());

        FrameConfig::from_json(r#"{"unknown": 1}"#).unwrap_err();
    }

    #[test]
    fn settings_are_listed() {
        let names: Vec<_> = FrameConfig::settings().map(|(name, _)| name).collect();
        assert_eq!(vec!["always_reassemble", "join_suffix", "row_id_format"], names);
    }
}
