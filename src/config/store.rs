use crate::config::Config;
use crate::error::ConfigError;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::SystemTime;

/// Holder of the current configuration snapshot
///
/// Readers take an `Arc<Config>` per event and keep using it even if a
/// reload swaps in a newer snapshot meanwhile.
#[derive(Debug)]
pub struct ConfigStore {
    current: RwLock<Arc<Config>>,
    source: Option<PathBuf>,
    last_modified: Mutex<Option<SystemTime>>,
}

impl ConfigStore {
    /// Store with a fixed configuration that is never reloaded from disk
    pub fn new(config: Config) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
            source: None,
            last_modified: Mutex::new(None),
        }
    }

    /// Load the configuration file and remember it for later reloads
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = Config::from_file(path)?;
        Ok(Self {
            current: RwLock::new(Arc::new(config)),
            source: Some(path.to_path_buf()),
            last_modified: Mutex::new(modified_time(path)),
        })
    }

    /// Current configuration snapshot
    pub fn snapshot(&self) -> Arc<Config> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Swap in a new configuration after validating it
    pub fn replace(&self, config: Config) -> Result<(), ConfigError> {
        config.validate()?;
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(config);
        Ok(())
    }

    /// Reload from disk when the file changed since the last load
    ///
    /// An invalid file is reported and the previous snapshot stays active.
    ///
    /// # Returns
    ///
    /// `true` if a new snapshot was installed
    pub fn reload_if_modified(&self) -> bool {
        let Some(path) = self.source.as_deref() else {
            return false;
        };

        let modified = modified_time(path);
        {
            let mut last = self
                .last_modified
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if modified.is_none() || *last == modified {
                return false;
            }
            *last = modified;
        }

        match Config::from_file(path).and_then(|config| self.replace(config)) {
            Ok(()) => {
                info!("Reloaded configuration from {}", path.display());
                true
            }
            Err(e) => {
                warn!(
                    "Ignoring invalid configuration change in {}: {}",
                    path.display(),
                    e
                );
                false
            }
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GotifyConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.source.server = "http://nvr.local:5000".to_string();
        config.gotify.push(GotifyConfig {
            server: "https://push.example.com".to_string(),
            token: "token".to_string(),
            ..GotifyConfig::default()
        });
        config
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let store = ConfigStore::new(valid_config());
        let before = store.snapshot();

        let mut updated = valid_config();
        updated.filters.labels.min_score = 75.0;
        store.replace(updated).unwrap();

        assert_eq!(before.filters.labels.min_score, 0.0);
        assert_eq!(store.snapshot().filters.labels.min_score, 75.0);
    }

    #[test]
    fn test_replace_rejects_invalid_config() {
        let store = ConfigStore::new(valid_config());

        let mut invalid = valid_config();
        invalid.filters.labels.min_score = -1.0;

        assert!(store.replace(invalid).is_err());
        assert_eq!(store.snapshot().filters.labels.min_score, 0.0);
    }

    #[test]
    fn test_fixed_store_never_reloads() {
        let store = ConfigStore::new(valid_config());
        assert!(!store.reload_if_modified());
    }

    #[test]
    fn test_unchanged_file_is_not_reloaded() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "[source]\nserver = \"http://nvr\"\n[[gotify]]\nserver = \"http://push\"\ntoken = \"t\"\n"
        )
        .unwrap();

        let store = ConfigStore::from_file(file.path()).unwrap();
        assert!(!store.reload_if_modified());
        assert_eq!(store.snapshot().source.server, "http://nvr");
    }
}
