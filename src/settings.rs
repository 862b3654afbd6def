use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::config::AutomationConfig;
use crate::error::AutomationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserSettings {
    automation_defaults: AutomationConfig,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            automation_defaults: AutomationConfig::default(),
        }
    }
}

/// Durable user preferences: the automation config the shell pre-fills the
/// start dialog with. Unreadable or corrupt files fall back to defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn automation_defaults(&self) -> AutomationConfig {
        self.data.read().unwrap().automation_defaults.clone()
    }

    pub fn update_automation_defaults(
        &self,
        config: AutomationConfig,
    ) -> Result<(), AutomationError> {
        config.validate()?;

        let mut guard = self.data.write().unwrap();
        guard.automation_defaults = config;
        self.persist(&guard)?;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    #[allow(dead_code)]
    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap();
        *guard = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_defaults_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        let mut config = store.automation_defaults();
        config.similarity_threshold = 0.9;
        config.max_swipes = 42;
        store.update_automation_defaults(config).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        let defaults = reopened.automation_defaults();
        assert!((defaults.similarity_threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(defaults.max_swipes, 42);
    }

    #[test]
    fn invalid_defaults_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();

        let mut config = AutomationConfig::default();
        config.similarity_threshold = 2.0;
        assert!(store.update_automation_defaults(config).is_err());
    }

    #[test]
    fn corrupt_settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(
            store.automation_defaults().max_swipes,
            AutomationConfig::default().max_swipes
        );
    }
}
