use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::con::Orientation;

pub fn config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trellis")
        .join("config.toml")
}

/// Orientation given to newly created workspaces. `Auto` derives the
/// orientation from the hosting output's aspect ratio.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum DefaultOrientation {
    #[default]
    Auto,
    Horizontal,
    Vertical,
}

impl DefaultOrientation {
    pub fn fixed(self) -> Option<Orientation> {
        match self {
            DefaultOrientation::Auto => None,
            DefaultOrientation::Horizontal => Some(Orientation::Horizontal),
            DefaultOrientation::Vertical => Some(Orientation::Vertical),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Switching to the already focused workspace by name jumps back to the
    /// previously focused one instead.
    #[serde(default = "no")]
    pub workspace_auto_back_and_forth: bool,
    #[serde(default)]
    pub default_orientation: DefaultOrientation,
}

#[allow(dead_code)]
fn yes() -> bool {
    true
}

fn no() -> bool {
    false
}

impl Config {
    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        Ok(toml::from_str(buf)?)
    }

    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert!(!config.workspace_auto_back_and_forth);
        assert_eq!(config.default_orientation, DefaultOrientation::Auto);
    }

    #[test]
    fn parse_full_config() {
        let config = Config::parse(
            "workspace_auto_back_and_forth = true\ndefault_orientation = \"vertical\"\n",
        )
        .unwrap();
        assert!(config.workspace_auto_back_and_forth);
        assert_eq!(
            config.default_orientation.fixed(),
            Some(Orientation::Vertical)
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Config::parse("no_such_option = 1\n").is_err());
    }
}
