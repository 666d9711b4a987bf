use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::guard::{AlertConfig, GuardConfig};
use crate::health::{BlinkConfig, PredictionConfig, ScoringConfig};

/// Every tunable of a monitoring session. Missing keys in `settings.json` fall back to the
/// defaults field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorSettings {
    /// Evaluation cadence for scoring, guard and the blink alert
    pub tick_interval_ms: u64,
    /// Persist session progress every N ticks
    pub heartbeat_every_ticks: u32,
    /// Frames buffered between the detector and the session loop
    pub frame_queue_depth: usize,
    pub scoring: ScoringConfig,
    pub blink: BlinkConfig,
    pub prediction: PredictionConfig,
    pub guard: GuardConfig,
    pub alert: AlertConfig,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            heartbeat_every_ticks: 10,
            frame_queue_depth: 32,
            scoring: ScoringConfig::default(),
            blink: BlinkConfig::default(),
            prediction: PredictionConfig::default(),
            guard: GuardConfig::default(),
            alert: AlertConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    monitor: MonitorSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unreadable settings at {} ({err}); using defaults",
                    path.display()
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn monitor(&self) -> MonitorSettings {
        self.read().monitor.clone()
    }

    pub fn update_monitor(&self, settings: MonitorSettings) -> Result<()> {
        let mut guard = self.write();
        guard.monitor = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: UserSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed settings in {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized)
            .with_context(|| format!("Failed to write settings to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace settings at {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.monitor(), MonitorSettings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "monitor": { "tickIntervalMs": 250, "guard": { "maxNoFaceFrames": 5 } } }"#,
        )
        .unwrap();

        let monitor = SettingsStore::new(path).unwrap().monitor();
        assert_eq!(monitor.tick_interval_ms, 250);
        assert_eq!(monitor.guard.max_no_face_frames, 5);
        assert_eq!(monitor.guard.freeze_above_coverage, 0.7);
        assert_eq!(monitor.alert.no_blink_timeout_ms, 10_000);
    }

    #[test]
    fn update_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut monitor = store.monitor();
        monitor.heartbeat_every_ticks = 3;
        store.update_monitor(monitor).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.monitor().heartbeat_every_ticks, 3);
        reopened.reload().unwrap();
        assert_eq!(reopened.monitor().heartbeat_every_ticks, 3);
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.monitor(), MonitorSettings::default());
        assert!(store.reload().is_err());
    }
}
