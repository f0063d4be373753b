use crate::locale::Language;
use crate::logging;
use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "daynote";
const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub notes_dir: PathBuf,
    pub language: Language,
    pub log_level: String,
    /// Most search hits the TUI lists at once.
    pub search_limit: usize,
    /// Rescan notes on a worker thread in the TUI.
    pub background_rebuild: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            notes_dir: default_notes_dir(),
            language: Language::default(),
            log_level: logging::default_log_level().to_string(),
            search_limit: 30,
            background_rebuild: true,
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub notes_dir: Option<PathBuf>,
    pub language: Option<Language>,
}

impl Config {
    /// Reads `path`, or the per-user config file when `path` is `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Ok(Config::default()),
            },
        };
        if !path.exists() {
            return Ok(Config::default());
        }
        let data = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        Config::parse(&data).with_context(|| format!("parsing {:?}", path))
    }

    pub fn parse(data: &str) -> Result<Config> {
        if data.trim().is_empty() {
            return Ok(Config::default());
        }
        let mut config: Config = serde_yaml::from_str(data).context("parsing config file")?;
        config.notes_dir = expand_home(&config.notes_dir);
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Config {
        if let Some(dir) = overrides.notes_dir {
            self.notes_dir = expand_home(&dir);
        }
        if let Some(language) = overrides.language {
            self.language = language;
        }
        self
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

pub fn default_log_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.data_local_dir().join("logs"))
}

fn default_notes_dir() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().join("notes"))
        .unwrap_or_else(|| PathBuf::from("notes"))
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_file_means_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
        let config = Config::default();
        assert!(config.notes_dir.ends_with("notes"));
        assert_eq!(config.language, Language::English);
        assert_eq!(config.search_limit, 30);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::parse("language: nb\nsearch_limit: 5\nnotes_dir: /tmp/dagbok\n").unwrap();
        assert_eq!(config.language, Language::Norwegian);
        assert_eq!(config.search_limit, 5);
        assert_eq!(config.notes_dir, PathBuf::from("/tmp/dagbok"));
        assert!(config.background_rebuild);
    }

    #[test]
    fn tilde_is_expanded() {
        let config = Config::parse("notes_dir: ~/journal\n").unwrap();
        assert!(!config.notes_dir.starts_with("~"));
        assert!(config.notes_dir.ends_with("journal"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::parse("language: klingon\n").is_err());
        assert!(Config::parse("search_limit: [1, 2]\n").is_err());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.yml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn file_values_yield_to_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "language: nb\nnotes_dir: /srv/notes\n").unwrap();
        let config = Config::load(Some(&path)).unwrap().with_overrides(Overrides {
            notes_dir: Some(PathBuf::from("/elsewhere")),
            language: None,
        });
        assert_eq!(config.notes_dir, PathBuf::from("/elsewhere"));
        assert_eq!(config.language, Language::Norwegian);
    }
}
