//! Engine settings: an explicitly injected configuration value.
//!
//! Loaded once from `docket.toml` and handed to the engine — never a
//! module-level singleton. Updates go through a revision-guarded
//! rewrite so concurrent admin edits surface as conflicts instead of
//! silently clobbering each other.

use docket_store::claim::{MAX_CLAIM_TTL_SECONDS, MIN_CLAIM_TTL_SECONDS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Default lease window for active work.
    #[serde(default = "default_active_ttl")]
    pub active_ttl_seconds: i64,
    /// Default lease window for a passive hold.
    #[serde(default = "default_hold_ttl")]
    pub hold_ttl_seconds: i64,
    /// Bounded automatic retries on conflict.
    #[serde(default = "default_retry_limit")]
    pub conflict_retry_limit: u32,
    /// Optimistic-concurrency stamp for the settings file itself.
    #[serde(default)]
    pub revision: u64,
}

fn default_active_ttl() -> i64 {
    900
}

fn default_hold_ttl() -> i64 {
    3600
}

fn default_retry_limit() -> u32 {
    3
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            active_ttl_seconds: default_active_ttl(),
            hold_ttl_seconds: default_hold_ttl(),
            conflict_retry_limit: default_retry_limit(),
            revision: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(String),

    #[error("settings parse error: {0}")]
    Parse(String),

    #[error("settings serialize error: {0}")]
    Serialize(String),

    #[error("settings revision mismatch: expected {expected}, stored {actual}")]
    RevisionMismatch { expected: u64, actual: u64 },

    #[error(
        "{field} must be in range [{min}, {max}] (got {actual})",
        min = MIN_CLAIM_TTL_SECONDS,
        max = MAX_CLAIM_TTL_SECONDS
    )]
    InvalidTtl { field: &'static str, actual: i64 },
}

impl EngineSettings {
    /// Load settings from a TOML file. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .map_err(|e| SettingsError::Io(format!("{}: {e}", path.display())))?;
        let settings: Self =
            toml::from_str(&text).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| SettingsError::Io(format!("{}: {e}", parent.display())))?;
        }
        let text =
            toml::to_string_pretty(self).map_err(|e| SettingsError::Serialize(e.to_string()))?;
        fs::write(path, text).map_err(|e| SettingsError::Io(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let range = MIN_CLAIM_TTL_SECONDS..=MAX_CLAIM_TTL_SECONDS;
        if !range.contains(&self.active_ttl_seconds) {
            return Err(SettingsError::InvalidTtl {
                field: "active_ttl_seconds",
                actual: self.active_ttl_seconds,
            });
        }
        if !range.contains(&self.hold_ttl_seconds) {
            return Err(SettingsError::InvalidTtl {
                field: "hold_ttl_seconds",
                actual: self.hold_ttl_seconds,
            });
        }
        Ok(())
    }

    /// Apply a revision-guarded update to the settings file.
    ///
    /// The caller states the revision it read; a mismatch means someone
    /// else updated first and the caller must re-read.
    pub fn update_file(
        path: impl AsRef<Path>,
        expected_revision: u64,
        apply: impl FnOnce(&mut EngineSettings),
    ) -> Result<EngineSettings, SettingsError> {
        let path = path.as_ref();
        let mut settings = Self::load(path)?;
        if settings.revision != expected_revision {
            return Err(SettingsError::RevisionMismatch {
                expected: expected_revision,
                actual: settings.revision,
            });
        }
        apply(&mut settings);
        settings.revision = expected_revision + 1;
        settings.validate()?;
        settings.save(path)?;
        Ok(settings)
    }
}
