use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::LockoutPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub lockout: bool,
    pub lockout_threshold: u32,
    pub lockout_cooldown_ms: u64,
    /// Hide the live stats bar while typing
    pub simple: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lockout: true,
            lockout_threshold: 3,
            lockout_cooldown_ms: 2000,
            simple: false,
        }
    }
}

impl Config {
    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            enabled: self.lockout,
            threshold: self.lockout_threshold,
            cooldown: Duration::from_millis(self.lockout_cooldown_ms),
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "retype") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("retype_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            lockout: false,
            lockout_threshold: 5,
            lockout_cooldown_ms: 1000,
            simple: true,
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_file_yields_default() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nope.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn config_maps_to_lockout_policy() {
        let cfg = Config {
            lockout: true,
            lockout_threshold: 4,
            lockout_cooldown_ms: 1500,
            simple: false,
        };
        let policy = cfg.lockout_policy();
        assert!(policy.enabled);
        assert_eq!(policy.threshold, 4);
        assert_eq!(policy.cooldown, Duration::from_millis(1500));
    }
}
