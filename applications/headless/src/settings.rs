//! JSON file settings backend

use cadenza_core::{CoreError, PersistedState, SettingsStore};
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Persists player state as pretty-printed JSON
///
/// A missing file reads as the default state. Every save stamps `saved_at`.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load_state(&self) -> cadenza_core::Result<PersistedState> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No saved state");
            return Ok(PersistedState::default());
        }
        let text = std::fs::read_to_string(&self.path)?;
        let state = serde_json::from_str(&text)?;
        Ok(state)
    }

    fn save_state(&self, state: &PersistedState) -> cadenza_core::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut state = state.clone();
        state.saved_at = Some(Utc::now());
        let json = serde_json::to_string_pretty(&state)?;
        std::fs::write(&self.path, json).map_err(|e| {
            CoreError::settings(format!("Cannot write {}: {}", self.path.display(), e))
        })?;

        tracing::debug!(path = %self.path.display(), "State saved");
        Ok(())
    }
}
