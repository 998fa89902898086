//! Settings that shape a run, loaded from an optional YAML file.
//!
//! Every field has a default, so a missing file (or a file that only sets a few fields) is fine.
//! Command-line flags override whatever is loaded here.

use crate::executor::DEFAULT_ERROR_MARKERS;
use crate::remediate::DEFAULT_TIMEZONE_LINE;
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// The settings file looked up in [config_dir] when no path is given.
pub const CONFIG_FILE: &str = "netaudit.yaml";

/// Returns a [PathBuf] to the directory where netaudit's configuration should live.
///
/// When compiled for testing, this returns `CARGO_MANIFEST_DIR` plus `resources`. Otherwise, it
/// returns `~/.config/netaudit`, or [None] if the home directory is unknown.
pub fn config_dir() -> Option<PathBuf> {
    if cfg!(test) {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("resources");
        return Some(path);
    }

    // Omit the leading slash so that PathBuf::push appends instead of replacing.
    const CONFIG_DIR: &str = ".config/netaudit";

    let mut path = home::home_dir()?;
    path.push(CONFIG_DIR);
    Some(path)
}

/// Run settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Root directory for configuration backups.
    pub backup_dir: PathBuf,

    /// How many devices are audited at the same time.
    pub concurrency: usize,

    /// How long to wait for an SSH connection, in seconds.
    pub connect_timeout_secs: u64,

    /// Substrings that mark a device's answer as an error.
    pub error_markers: Vec<String>,

    /// Commands run right after connecting, e.g. to disable paging.
    pub setup_commands: Vec<String>,

    /// The timezone line every device should carry.
    pub timezone_line: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            backup_dir: PathBuf::from("config"),
            concurrency: 8,
            connect_timeout_secs: 10,
            error_markers: DEFAULT_ERROR_MARKERS.iter().map(|&m| m.to_owned()).collect(),
            setup_commands: vec!["terminal length 0".to_owned()],
            timezone_line: DEFAULT_TIMEZONE_LINE.to_owned(),
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or from [CONFIG_FILE] in [config_dir] if `path` is `None`.
    ///
    /// A missing default file yields [Settings::default]; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match config_dir().map(|dir| dir.join(CONFIG_FILE)) {
                Some(path) if path.try_exists()? => Self::from_file(&path),
                _ => Ok(Settings::default()),
            },
        }
    }

    /// Parses settings from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_yaml(&yaml)
            .with_context(|| format!("failed to parse settings file {}", path.display()))
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        // An empty document deserializes to unit rather than a map.
        if yaml.trim().is_empty() {
            return Ok(Settings::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_dir_works() {
        let mut expected = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        expected.push("resources");

        assert_eq!(Some(expected.clone()), config_dir());

        let config_dir_exists = expected.try_exists();
        assert!(config_dir_exists.expect("could not confirm or deny whether config dir exists"));
    }

    #[test]
    fn loads_default_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(4, settings.concurrency);
        assert_eq!(PathBuf::from("backups"), settings.backup_dir);
        // Fields the file leaves out keep their defaults.
        assert_eq!(DEFAULT_TIMEZONE_LINE, settings.timezone_line);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let settings = Settings::from_yaml("concurrency: 2\n").unwrap();
        assert_eq!(
            Settings {
                concurrency: 2,
                ..Settings::default()
            },
            settings,
        );
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(Settings::default(), Settings::from_yaml("\n").unwrap());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Settings::from_yaml("concurency: 2\n").is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let error = Settings::load(Some(Path::new("/nonexistent/netaudit.yaml"))).unwrap_err();
        assert!(error.to_string().contains("failed to read settings file"));
    }

    #[test]
    fn default_markers_match_executor() {
        assert_eq!(
            vec!["Invalid input detected at ".to_owned()],
            Settings::default().error_markers,
        );
    }
}
