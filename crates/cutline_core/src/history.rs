use crate::editing::{ensure_time_in_range, refit_clip, refit_placement, split_clip};
use crate::error::{CoreError, Result};
use crate::trim_limits::{clamp_trim, trimmed_placement, TrimSide};
use crate::types::*;
use crate::validation::{is_position_valid, plan_auto_trim, NeighborTrim};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Operation payloads
// ---------------------------------------------------------------------------

/// A clip together with the track it goes on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlacedClip {
    pub track_id: Uuid,
    pub clip: Clip,
}

/// Full snapshot of a removed clip, including where it sat in its track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemovedClip {
    pub track_id: Uuid,
    pub index: usize,
    pub clip: Clip,
}

/// Geometry of one clip before and after an edit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClipEdit {
    pub clip_id: Uuid,
    pub before: Placement,
    pub after: Placement,
    #[serde(default)]
    pub before_depth: Option<u32>,
    #[serde(default)]
    pub after_depth: Option<u32>,
}

impl ClipEdit {
    fn write(&self, timeline: &mut Timeline, placement: Placement, depth: Option<u32>) -> Result<()> {
        let clip = timeline
            .find_clip_mut(self.clip_id)
            .ok_or(CoreError::ClipNotFound { op: "apply_edit", id: self.clip_id })?;
        clip.set_placement(placement);
        clip.set_depth(depth);
        Ok(())
    }

    pub fn is_noop(&self) -> bool {
        self.before == self.after && self.before_depth == self.after_depth
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Every reversible edit the engine knows about. Each variant carries all the
/// values it needs, captured when the command was built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    AddClip(PlacedClip),
    RemoveClip(RemovedClip),
    MoveClip {
        edit: ClipEdit,
        neighbors: Vec<NeighborTrim>,
    },
    TrimClip {
        side: TrimSide,
        edit: ClipEdit,
    },
    SplitClip {
        track_id: Uuid,
        index: usize,
        original: Clip,
        left: Clip,
        right: Clip,
    },
    SetMuted {
        clip_id: Uuid,
        before: bool,
        after: bool,
    },
    /// Sorted by track, then ascending index.
    BatchDelete { removed: Vec<RemovedClip> },
    BatchPaste { placed: Vec<PlacedClip> },
    ExternalEdit { before: Timeline, after: Timeline },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    AddClip,
    RemoveClip,
    MoveClip,
    TrimClip,
    SplitClip,
    SetMuted,
    BatchDelete,
    BatchPaste,
    ExternalEdit,
}

impl Operation {
    pub fn kind(&self) -> CommandKind {
        match self {
            Operation::AddClip(_) => CommandKind::AddClip,
            Operation::RemoveClip(_) => CommandKind::RemoveClip,
            Operation::MoveClip { .. } => CommandKind::MoveClip,
            Operation::TrimClip { .. } => CommandKind::TrimClip,
            Operation::SplitClip { .. } => CommandKind::SplitClip,
            Operation::SetMuted { .. } => CommandKind::SetMuted,
            Operation::BatchDelete { .. } => CommandKind::BatchDelete,
            Operation::BatchPaste { .. } => CommandKind::BatchPaste,
            Operation::ExternalEdit { .. } => CommandKind::ExternalEdit,
        }
    }

    fn apply(&self, timeline: &mut Timeline) -> Result<()> {
        match self {
            Operation::AddClip(placed) => timeline.add_clip(placed.track_id, placed.clip.clone()),
            Operation::RemoveClip(removed) => timeline.remove_clip(removed.clip.id).map(|_| ()),
            Operation::MoveClip { edit, neighbors } => {
                for n in neighbors {
                    timeline.set_clip_placement(n.clip_id, n.after)?;
                }
                edit.write(timeline, edit.after, edit.after_depth)
            }
            Operation::TrimClip { edit, .. } => edit.write(timeline, edit.after, edit.after_depth),
            Operation::SplitClip {
                track_id,
                index,
                left,
                right,
                ..
            } => {
                timeline.replace_clip(left.clone())?;
                timeline.insert_clip(*track_id, index + 1, right.clone())
            }
            Operation::SetMuted { clip_id, after, .. } => write_muted(timeline, *clip_id, *after),
            Operation::BatchDelete { removed } => {
                for r in removed {
                    timeline.remove_clip(r.clip.id)?;
                }
                Ok(())
            }
            Operation::BatchPaste { placed } => {
                for p in placed {
                    timeline.add_clip(p.track_id, p.clip.clone())?;
                }
                Ok(())
            }
            Operation::ExternalEdit { after, .. } => {
                *timeline = after.clone();
                Ok(())
            }
        }
    }

    fn revert(&self, timeline: &mut Timeline) -> Result<()> {
        match self {
            Operation::AddClip(placed) => timeline.remove_clip(placed.clip.id).map(|_| ()),
            Operation::RemoveClip(removed) => {
                timeline.insert_clip(removed.track_id, removed.index, removed.clip.clone())
            }
            Operation::MoveClip { edit, neighbors } => {
                edit.write(timeline, edit.before, edit.before_depth)?;
                for n in neighbors.iter().rev() {
                    timeline.set_clip_placement(n.clip_id, n.before)?;
                }
                Ok(())
            }
            Operation::TrimClip { edit, .. } => edit.write(timeline, edit.before, edit.before_depth),
            Operation::SplitClip { original, right, .. } => {
                timeline.remove_clip(right.id)?;
                timeline.replace_clip(original.clone())
            }
            Operation::SetMuted { clip_id, before, .. } => write_muted(timeline, *clip_id, *before),
            Operation::BatchDelete { removed } => {
                for r in removed {
                    timeline.insert_clip(r.track_id, r.index, r.clip.clone())?;
                }
                Ok(())
            }
            Operation::BatchPaste { placed } => {
                for p in placed.iter().rev() {
                    timeline.remove_clip(p.clip.id)?;
                }
                Ok(())
            }
            Operation::ExternalEdit { before, .. } => {
                *timeline = before.clone();
                Ok(())
            }
        }
    }

    /// Clips whose placement this operation writes or reinserts. They are
    /// re-checked after every apply and revert.
    fn touched_clips(&self) -> Vec<Uuid> {
        match self {
            Operation::AddClip(p) => vec![p.clip.id],
            Operation::RemoveClip(r) => vec![r.clip.id],
            Operation::MoveClip { edit, neighbors } => std::iter::once(edit.clip_id)
                .chain(neighbors.iter().map(|n| n.clip_id))
                .collect(),
            Operation::TrimClip { edit, .. } => vec![edit.clip_id],
            Operation::SplitClip { left, right, .. } => vec![left.id, right.id],
            Operation::BatchDelete { removed } => removed.iter().map(|r| r.clip.id).collect(),
            Operation::BatchPaste { placed } => placed.iter().map(|p| p.clip.id).collect(),
            Operation::SetMuted { .. } | Operation::ExternalEdit { .. } => vec![],
        }
    }

    /// Whole-clip snapshots held by this operation.
    fn snapshot_clips(&self) -> Vec<&Clip> {
        match self {
            Operation::AddClip(p) => vec![&p.clip],
            Operation::RemoveClip(r) => vec![&r.clip],
            Operation::SplitClip {
                original, left, right, ..
            } => vec![original, left, right],
            Operation::BatchDelete { removed } => removed.iter().map(|r| &r.clip).collect(),
            Operation::BatchPaste { placed } => placed.iter().map(|p| &p.clip).collect(),
            Operation::ExternalEdit { before, after } => before
                .tracks
                .iter()
                .chain(&after.tracks)
                .flat_map(|t| &t.clips)
                .collect(),
            Operation::MoveClip { .. } | Operation::TrimClip { .. } | Operation::SetMuted { .. } => vec![],
        }
    }

    /// Apply a new source duration to everything this operation recorded.
    /// `previous` maps clip ids to their duration before the change, for the
    /// variants that only store placements.
    fn refit(&mut self, source_id: Uuid, duration: TimeUs, previous: &HashMap<Uuid, TimeUs>) {
        let refit_snapshot = |clip: &mut Clip| {
            if clip.source_id == source_id {
                refit_clip(clip, duration);
            }
        };
        let refit_at = |clip_id: Uuid, placement: &mut Placement| {
            if let Some(old) = previous.get(&clip_id) {
                *placement = refit_placement(*placement, *old, duration);
            }
        };

        match self {
            Operation::AddClip(p) => refit_snapshot(&mut p.clip),
            Operation::RemoveClip(r) => refit_snapshot(&mut r.clip),
            Operation::MoveClip { edit, neighbors } => {
                refit_at(edit.clip_id, &mut edit.before);
                refit_at(edit.clip_id, &mut edit.after);
                for n in neighbors {
                    refit_at(n.clip_id, &mut n.before);
                    refit_at(n.clip_id, &mut n.after);
                }
            }
            Operation::TrimClip { edit, .. } => {
                refit_at(edit.clip_id, &mut edit.before);
                refit_at(edit.clip_id, &mut edit.after);
            }
            Operation::SplitClip {
                original, left, right, ..
            } => {
                refit_snapshot(original);
                refit_snapshot(left);
                refit_snapshot(right);
            }
            Operation::SetMuted { .. } => {}
            Operation::BatchDelete { removed } => removed.iter_mut().for_each(|r| refit_snapshot(&mut r.clip)),
            Operation::BatchPaste { placed } => placed.iter_mut().for_each(|p| refit_snapshot(&mut p.clip)),
            Operation::ExternalEdit { before, after } => {
                before.refit_source(source_id, duration);
                after.refit_source(source_id, duration);
            }
        }
    }
}

fn write_muted(timeline: &mut Timeline, clip_id: Uuid, muted: bool) -> Result<()> {
    let clip = timeline
        .find_clip_mut(clip_id)
        .ok_or(CoreError::ClipNotFound { op: "set_muted", id: clip_id })?;
    clip.set_muted(muted);
    Ok(())
}

/// Every listed clip still on the timeline must be well formed and clear of
/// its lane siblings. Clips no longer present are skipped.
fn check_touched(timeline: &Timeline, ids: &[Uuid], op: &'static str) -> Result<()> {
    for &id in ids {
        let Some(track) = timeline.track_of(id) else {
            continue;
        };
        let Some(clip) = track.clip(id) else {
            continue;
        };
        let placement = clip.placement();
        if !placement.is_well_formed(clip.duration) {
            return Err(CoreError::BelowMinimumDuration { op, id });
        }
        if !is_position_valid(track, id, &placement, clip.duration, clip.depth()) {
            return Err(CoreError::Overlap { op, id });
        }
    }
    Ok(())
}

/// Run `f` against the timeline, rolling back to the state before the call if it fails.
fn transactional(timeline: &mut Timeline, f: impl FnOnce(&mut Timeline) -> Result<()>) -> Result<()> {
    let snapshot = timeline.clone();
    match f(timeline) {
        Ok(()) => Ok(()),
        Err(e) => {
            *timeline = snapshot;
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A recorded, reversible edit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Command {
    pub id: Uuid,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
}

impl Command {
    pub fn new(description: impl Into<String>, operation: Operation) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            timestamp: Utc::now(),
            operation,
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.operation.kind()
    }

    /// Apply the edit. If it fails, or leaves a touched clip overlapping or
    /// degenerate (a command built against an older timeline), the timeline is
    /// left as it was.
    pub fn execute(&self, timeline: &mut Timeline) -> Result<()> {
        transactional(timeline, |t| {
            self.operation.apply(t)?;
            check_touched(t, &self.operation.touched_clips(), "execute")
        })
    }

    /// Reverse the edit, with the same checks and rollback as `execute`.
    pub fn undo(&self, timeline: &mut Timeline) -> Result<()> {
        transactional(timeline, |t| {
            self.operation.revert(t)?;
            check_touched(t, &self.operation.touched_clips(), "undo")
        })
    }

    /// New clip from `media` at `timestamp` on `track_id`. The clip kind follows
    /// the track; a missing media duration falls back to `default_duration`.
    pub fn add_clip(
        timeline: &Timeline,
        track_id: Uuid,
        media: &MediaRef,
        timestamp: TimeUs,
        default_duration: TimeUs,
    ) -> Result<Self> {
        let track = timeline
            .track(track_id)
            .ok_or(CoreError::TrackNotFound { op: "add_clip", id: track_id })?;
        let duration = media.duration.unwrap_or(default_duration);
        ensure_time_in_range("add_clip", "timestamp", timestamp)?;
        ensure_time_in_range("add_clip", "duration", duration)?;
        let timestamp = timestamp.non_negative();
        let clip = match track.kind {
            TrackKind::Video => Clip::video(media.source_id, media.url.clone(), timestamp, duration),
            TrackKind::Audio => Clip::audio(media.source_id, media.url.clone(), timestamp, duration),
        };

        if !clip.placement().is_well_formed(duration) {
            return Err(CoreError::BelowMinimumDuration { op: "add_clip", id: clip.id });
        }
        if !is_position_valid(track, clip.id, &clip.placement(), duration, clip.depth()) {
            return Err(CoreError::Overlap { op: "add_clip", id: clip.id });
        }

        Ok(Self::new("Add clip", Operation::AddClip(PlacedClip { track_id, clip })))
    }

    pub fn remove_clip(timeline: &Timeline, clip_id: Uuid) -> Result<Self> {
        let (track, index) = locate(timeline, "remove_clip", clip_id)?;
        let removed = RemovedClip {
            track_id: track.id,
            index,
            clip: track.clips[index].clone(),
        };
        Ok(Self::new("Remove clip", Operation::RemoveClip(removed)))
    }

    /// Move a clip to `timestamp` (clamped to zero) and, for audio clips, onto
    /// an explicit `depth`. With `auto_trim`, overlaps are resolved by trimming;
    /// otherwise any overlap is rejected.
    pub fn move_clip(
        timeline: &Timeline,
        clip_id: Uuid,
        timestamp: TimeUs,
        depth: Option<u32>,
        auto_trim: bool,
    ) -> Result<Self> {
        ensure_time_in_range("move_clip", "timestamp", timestamp)?;
        let (track, index) = locate(timeline, "move_clip", clip_id)?;
        let clip = &track.clips[index];
        if depth.is_some() && !clip.is_audio() {
            return Err(CoreError::NotAudio { op: "move_clip", id: clip_id });
        }

        let after_depth = depth.or(clip.depth());
        let candidate = Placement {
            timestamp: timestamp.non_negative(),
            ..clip.placement()
        };

        let (placement, neighbors) =
            if is_position_valid(track, clip_id, &candidate, clip.duration, after_depth) {
                (candidate, vec![])
            } else if auto_trim {
                let plan = plan_auto_trim(track, clip_id, &candidate, clip.duration, after_depth)
                    .ok_or(CoreError::Overlap { op: "move_clip", id: clip_id })?;
                (plan.placement, plan.neighbors)
            } else {
                return Err(CoreError::Overlap { op: "move_clip", id: clip_id });
            };

        let edit = ClipEdit {
            clip_id,
            before: clip.placement(),
            after: placement,
            before_depth: clip.depth(),
            after_depth,
        };
        Ok(Self::new("Move clip", Operation::MoveClip { edit, neighbors }))
    }

    /// Set the trim on one edge, clamped so the clip neither overlaps a
    /// neighbour nor drops below the minimum visible duration.
    pub fn trim_clip(timeline: &Timeline, clip_id: Uuid, side: TrimSide, trim: TimeUs) -> Result<Self> {
        let (track, index) = locate(timeline, "trim_clip", clip_id)?;
        let clip = &track.clips[index];
        let trim = clamp_trim(track, clip_id, side, trim)
            .ok_or(CoreError::ClipNotFound { op: "trim_clip", id: clip_id })?;

        let edit = ClipEdit {
            clip_id,
            before: clip.placement(),
            after: trimmed_placement(clip, side, trim),
            before_depth: clip.depth(),
            after_depth: clip.depth(),
        };
        let description = match side {
            TrimSide::Start => "Trim clip start",
            TrimSide::End => "Trim clip end",
        };
        Ok(Self::new(description, Operation::TrimClip { side, edit }))
    }

    /// Split at timeline position `at`; the left half keeps the clip's id.
    pub fn split_clip(timeline: &Timeline, clip_id: Uuid, at: TimeUs) -> Result<Self> {
        ensure_time_in_range("split_clip", "split point", at)?;
        let (track, index) = locate(timeline, "split_clip", clip_id)?;
        let original = track.clips[index].clone();
        let (left, right) = split_clip(&original, at, Uuid::new_v4())?;
        Ok(Self::new(
            "Split clip",
            Operation::SplitClip {
                track_id: track.id,
                index,
                original,
                left,
                right,
            },
        ))
    }

    pub fn set_muted(timeline: &Timeline, clip_id: Uuid, muted: bool) -> Result<Self> {
        let (track, index) = locate(timeline, "set_muted", clip_id)?;
        let before = track.clips[index]
            .muted()
            .ok_or(CoreError::NotAudio { op: "set_muted", id: clip_id })?;
        let description = if muted { "Mute clip" } else { "Unmute clip" };
        Ok(Self::new(
            description,
            Operation::SetMuted {
                clip_id,
                before,
                after: muted,
            },
        ))
    }
}

fn locate<'a>(timeline: &'a Timeline, op: &'static str, clip_id: Uuid) -> Result<(&'a Track, usize)> {
    timeline
        .tracks
        .iter()
        .find_map(|t| t.position(clip_id).map(|idx| (t, idx)))
        .ok_or(CoreError::ClipNotFound { op, id: clip_id })
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Linear undo/redo history with a cursor. Entries before the cursor can be
/// undone; entries at or after it can be redone.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Command>,
    cursor: usize,
    limit: usize,
    /// Cursor position matching the last saved state, if still reachable.
    saved_at: Option<usize>,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            limit: limit.max(1),
            saved_at: Some(0),
        }
    }

    /// Execute a command and record it. Drops any redoable entries. A command
    /// that fails leaves both the timeline and the history untouched.
    pub fn execute(&mut self, command: Command, timeline: &mut Timeline) -> Result<()> {
        command.execute(timeline)?;
        debug!(command = %command.description, "executed");
        self.push(command);
        Ok(())
    }

    /// Record a command whose effect is already applied to the timeline.
    pub fn add_without_execute(&mut self, command: Command) {
        debug!(command = %command.description, "recorded");
        self.push(command);
    }

    fn push(&mut self, command: Command) {
        if self.saved_at.is_some_and(|s| s > self.cursor) {
            self.saved_at = None;
        }
        self.entries.truncate(self.cursor);
        self.entries.push(command);
        self.cursor += 1;

        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
            self.cursor -= excess;
            self.saved_at = self.saved_at.and_then(|s| s.checked_sub(excess));
        }
    }

    /// Undo the entry before the cursor. Returns `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self, timeline: &mut Timeline) -> Result<bool> {
        if self.cursor == 0 {
            return Ok(false);
        }
        let command = &self.entries[self.cursor - 1];
        command.undo(timeline)?;
        debug!(command = %command.description, "undo");
        self.cursor -= 1;
        Ok(true)
    }

    /// Redo the entry at the cursor. Returns `Ok(false)` when there is nothing to redo.
    pub fn redo(&mut self, timeline: &mut Timeline) -> Result<bool> {
        let Some(command) = self.entries.get(self.cursor) else {
            return Ok(false);
        };
        command.execute(timeline)?;
        debug!(command = %command.description, "redo");
        self.cursor += 1;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(|c| c.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.entries.get(self.cursor).map(|c| c.description.as_str())
    }

    pub fn entries(&self) -> &[Command] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_dirty(&self) -> bool {
        self.saved_at != Some(self.cursor)
    }

    pub fn mark_clean(&mut self) {
        self.saved_at = Some(self.cursor);
    }

    /// Forget every entry. The dirty state of the document is kept.
    pub fn clear(&mut self) {
        let dirty = self.is_dirty();
        self.entries.clear();
        self.cursor = 0;
        self.saved_at = if dirty { None } else { Some(0) };
    }

    /// Rewrite every recorded snapshot of clips cut from `source_id` for a new
    /// source duration. `live` holds the pre-change durations of clips still
    /// on the timeline.
    pub fn refit_source(&mut self, source_id: Uuid, duration: TimeUs, live: &HashMap<Uuid, TimeUs>) {
        let mut previous = live.clone();
        for entry in &self.entries {
            for clip in entry.operation.snapshot_clips() {
                if clip.source_id == source_id {
                    previous.entry(clip.id).or_insert(clip.duration);
                }
            }
        }
        for entry in &mut self.entries {
            entry.operation.refit(source_id, duration, &previous);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
