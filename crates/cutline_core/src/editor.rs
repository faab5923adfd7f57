use crate::batch::{copy_clips, ClipboardEntry, ExternalEdit};
use crate::config::EngineConfig;
use crate::depth::calculate_clip_depths;
use crate::editing::ensure_time_in_range;
use crate::error::{CoreError, Result};
use crate::gesture::Gesture;
use crate::history::{Command, History, Operation};
use crate::trim_limits::{get_max_trim_extension, TrimSide};
use crate::types::*;
use crate::validation;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Owns a timeline and everything needed to edit it: the undo history, the
/// engine configuration and the gesture currently in progress, if any.
#[derive(Debug, Clone)]
pub struct Editor {
    pub(crate) timeline: Timeline,
    pub(crate) history: History,
    pub(crate) config: EngineConfig,
    pub(crate) gesture: Option<Gesture>,
}

impl Editor {
    pub fn new(timeline: Timeline, config: EngineConfig) -> Self {
        Self {
            timeline,
            history: History::new(config.history_limit),
            config,
            gesture: None,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_timeline(self) -> Timeline {
        self.timeline
    }

    /// Non-gesture edits would capture mid-drag values, so they wait until the
    /// gesture ends.
    pub(crate) fn ensure_idle(&self) -> Result<()> {
        match self.gesture {
            Some(_) => Err(CoreError::GestureInProgress),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    pub fn execute(&mut self, command: Command) -> Result<()> {
        self.ensure_idle()?;
        self.history.execute(command, &mut self.timeline)
    }

    pub fn undo(&mut self) -> Result<bool> {
        self.ensure_idle()?;
        self.history.undo(&mut self.timeline)
    }

    pub fn redo(&mut self) -> Result<bool> {
        self.ensure_idle()?;
        self.history.redo(&mut self.timeline)
    }

    pub fn can_undo(&self) -> bool {
        self.gesture.is_none() && self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.gesture.is_none() && self.history.can_redo()
    }

    pub fn is_dirty(&self) -> bool {
        self.history.is_dirty()
    }

    pub fn mark_clean(&mut self) {
        self.history.mark_clean();
    }

    // -----------------------------------------------------------------------
    // Single-clip edits
    // -----------------------------------------------------------------------

    /// Returns the new clip's id.
    pub fn add_clip(&mut self, track_id: Uuid, media: &MediaRef, timestamp: TimeUs) -> Result<Uuid> {
        let command = Command::add_clip(
            &self.timeline,
            track_id,
            media,
            timestamp,
            self.config.default_clip_duration,
        )?;
        let Operation::AddClip(placed) = &command.operation else {
            return Err(CoreError::InvalidOperation("add_clip built an unexpected command".into()));
        };
        let clip_id = placed.clip.id;
        self.execute(command)?;
        Ok(clip_id)
    }

    pub fn remove_clip(&mut self, clip_id: Uuid) -> Result<()> {
        let command = Command::remove_clip(&self.timeline, clip_id)?;
        self.execute(command)
    }

    pub fn move_clip(&mut self, clip_id: Uuid, timestamp: TimeUs, depth: Option<u32>) -> Result<()> {
        let command = Command::move_clip(&self.timeline, clip_id, timestamp, depth, self.config.auto_trim)?;
        self.execute(command)
    }

    pub fn trim_clip(&mut self, clip_id: Uuid, side: TrimSide, trim: TimeUs) -> Result<()> {
        let command = Command::trim_clip(&self.timeline, clip_id, side, trim)?;
        self.execute(command)
    }

    /// Returns the id of the new right-hand clip.
    pub fn split_clip(&mut self, clip_id: Uuid, at: TimeUs) -> Result<Uuid> {
        let command = Command::split_clip(&self.timeline, clip_id, at)?;
        let Operation::SplitClip { right, .. } = &command.operation else {
            return Err(CoreError::InvalidOperation("split_clip built an unexpected command".into()));
        };
        let right_id = right.id;
        self.execute(command)?;
        Ok(right_id)
    }

    pub fn set_muted(&mut self, clip_id: Uuid, muted: bool) -> Result<()> {
        let command = Command::set_muted(&self.timeline, clip_id, muted)?;
        self.execute(command)
    }

    // -----------------------------------------------------------------------
    // Batch edits
    // -----------------------------------------------------------------------

    /// Returns how many clips were deleted.
    pub fn delete_clips(&mut self, ids: &[Uuid]) -> Result<usize> {
        let command = Command::batch_delete(&self.timeline, ids)?;
        let count = match &command.operation {
            Operation::BatchDelete { removed } => removed.len(),
            _ => 0,
        };
        self.execute(command)?;
        Ok(count)
    }

    pub fn copy_clips(&self, ids: &[Uuid]) -> Vec<ClipboardEntry> {
        copy_clips(&self.timeline, ids)
    }

    /// Returns the ids of the pasted clips, in clipboard order.
    pub fn paste_clips(&mut self, entries: &[ClipboardEntry], at: TimeUs) -> Result<Vec<Uuid>> {
        let command = Command::batch_paste(&self.timeline, entries, at)?;
        let ids = match &command.operation {
            Operation::BatchPaste { placed } => placed.iter().map(|p| p.clip.id).collect(),
            _ => vec![],
        };
        self.execute(command)?;
        Ok(ids)
    }

    /// Let `f` rewrite the timeline directly and record the result as one
    /// history entry. If `f` fails or leaves the timeline invalid, the timeline
    /// is put back and nothing is recorded. Returns whether anything changed.
    pub fn external_edit<F>(&mut self, description: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut Timeline) -> Result<()>,
    {
        self.ensure_idle()?;
        let session = ExternalEdit::begin(&self.timeline);

        let outcome = f(&mut self.timeline).and_then(|()| self.timeline.check_invariants());
        if let Err(e) = outcome {
            session.abort(&mut self.timeline);
            info!(description = %description, error = %e, "external edit rolled back");
            return Err(e);
        }

        match session.finish(&self.timeline, description) {
            Some(command) => {
                info!(description = %description, clips = self.timeline.clip_count(), "external edit recorded");
                self.history.add_without_execute(command);
                Ok(true)
            }
            None => {
                debug!(description = %description, "external edit changed nothing");
                Ok(false)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Whether `clip_id` could occupy the given placement on `track_id`
    /// (and `depth`, for audio) without overlapping a lane sibling.
    #[allow(clippy::too_many_arguments)]
    pub fn is_position_valid(
        &self,
        clip_id: Uuid,
        timestamp: TimeUs,
        duration: TimeUs,
        trim_start: TimeUs,
        trim_end: TimeUs,
        track_id: Uuid,
        depth: Option<u32>,
    ) -> Result<bool> {
        let track = self.track("is_position_valid", track_id)?;
        ensure_placement_in_range("is_position_valid", timestamp, duration, trim_start, trim_end)?;
        let candidate = Placement::new(timestamp, trim_start, trim_end);
        Ok(validation::is_position_valid(track, clip_id, &candidate, duration, depth))
    }

    /// Like [`Editor::is_position_valid`], but also true when releasing there
    /// would be resolved by auto-trim.
    #[allow(clippy::too_many_arguments)]
    pub fn is_position_valid_or_auto_trimmable(
        &self,
        clip_id: Uuid,
        timestamp: TimeUs,
        duration: TimeUs,
        trim_start: TimeUs,
        trim_end: TimeUs,
        track_id: Uuid,
        depth: Option<u32>,
    ) -> Result<bool> {
        let track = self.track("is_position_valid_or_auto_trimmable", track_id)?;
        ensure_placement_in_range("is_position_valid_or_auto_trimmable", timestamp, duration, trim_start, trim_end)?;
        let candidate = Placement::new(timestamp, trim_start, trim_end);
        if self.config.auto_trim {
            Ok(validation::is_position_valid_or_auto_trimmable(
                track, clip_id, &candidate, duration, depth,
            ))
        } else {
            Ok(validation::is_position_valid(track, clip_id, &candidate, duration, depth))
        }
    }

    pub fn max_trim_extension(&self, clip_id: Uuid, side: TrimSide) -> Result<TimeUs> {
        let track = self
            .timeline
            .track_of(clip_id)
            .ok_or(CoreError::ClipNotFound { op: "max_trim_extension", id: clip_id })?;
        Ok(get_max_trim_extension(track, clip_id, side))
    }

    /// Resolved depth of every audio clip on `track_id`.
    pub fn clip_depths(&self, track_id: Uuid) -> Result<HashMap<Uuid, u32>> {
        let track = self.track("clip_depths", track_id)?;
        Ok(calculate_clip_depths(&track.clips))
    }

    fn track(&self, op: &'static str, track_id: Uuid) -> Result<&Track> {
        self.timeline
            .track(track_id)
            .ok_or(CoreError::TrackNotFound { op, id: track_id })
    }

    // -----------------------------------------------------------------------
    // Duration back-fill
    // -----------------------------------------------------------------------

    /// Apply a media duration that arrived after clips from `source_id` were
    /// placed. Not recorded in history; recorded snapshots are refitted so
    /// undo and redo stay consistent. Returns how many live clips changed.
    pub fn backfill_duration(&mut self, source_id: Uuid, duration: TimeUs) -> Result<usize> {
        self.ensure_idle()?;
        ensure_time_in_range("backfill_duration", "duration", duration)?;
        if duration < MIN_VISIBLE_DURATION {
            return Err(CoreError::InvalidOperation(format!(
                "source {source_id} duration {duration} is below the minimum visible duration"
            )));
        }

        let previous = self.timeline.refit_source(source_id, duration);
        self.history.refit_source(source_id, duration, &previous);
        debug!(%source_id, %duration, clips = previous.len(), "duration back-filled");
        Ok(previous.len())
    }
}

fn ensure_placement_in_range(
    op: &'static str,
    timestamp: TimeUs,
    duration: TimeUs,
    trim_start: TimeUs,
    trim_end: TimeUs,
) -> Result<()> {
    ensure_time_in_range(op, "timestamp", timestamp)?;
    ensure_time_in_range(op, "duration", duration)?;
    ensure_time_in_range(op, "trim_start", trim_start)?;
    ensure_time_in_range(op, "trim_end", trim_end)
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(Timeline::with_default_tracks(), EngineConfig::default())
    }
}
