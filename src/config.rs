use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What to do with label ids that do not resolve to a live label.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPolicy {
    /// Keep the labels that resolve and silently drop the rest.
    #[default]
    Drop,
    /// Fail the whole operation on the first unknown id.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub page_size: u32,
    pub label_policy: LabelPolicy,
    pub bcrypt_cost: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            page_size: 10,
            label_policy: LabelPolicy::Drop,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Config {
    pub const FILE_NAME: &'static str = "config.json";

    pub fn load(root: &Path) -> Result<Self> {
        let data = fs::read_to_string(root.join(Self::FILE_NAME))?;
        let mut config: Config = serde_json::from_str(&data)?;
        if config.page_size == 0 {
            config.page_size = Self::default().page_size;
        }
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        fs::write(
            root.join(Self::FILE_NAME),
            serde_json::to_string_pretty(self)?,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("config.json"), r#"{"version": 1}"#).unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn label_policy_round_trips_through_file() {
        let dir = tempdir().unwrap();
        let config = Config {
            label_policy: LabelPolicy::Reject,
            page_size: 25,
            ..Config::default()
        };
        config.save(dir.path()).unwrap();
        let raw = fs::read_to_string(dir.path().join("config.json")).unwrap();
        assert!(raw.contains(r#""label_policy": "reject""#));
        assert_eq!(Config::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn zero_page_size_is_replaced() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("config.json"), r#"{"page_size": 0}"#).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap().page_size, 10);
    }
}
