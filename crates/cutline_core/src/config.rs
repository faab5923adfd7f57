use crate::error::Result;
use crate::types::{TimeUs, DEFAULT_CLIP_DURATION};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine tunables. Every field has a default, so a config file only needs
/// the keys it wants to change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of undoable entries kept.
    pub history_limit: usize,
    /// Length given to clips whose media duration is not known yet.
    pub default_clip_duration: TimeUs,
    /// Snap distance for drags; zero turns snapping off.
    pub snap_threshold: TimeUs,
    /// Resolve overlaps on release by trimming instead of rejecting the move.
    pub auto_trim: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            default_clip_duration: DEFAULT_CLIP_DURATION,
            snap_threshold: TimeUs::ZERO,
            auto_trim: true,
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
