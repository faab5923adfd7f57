//! Edits spanning several clips at once: multi-delete, copy/paste, and diffs
//! produced by an external process that rewrites the timeline directly.

use crate::editing::ensure_time_in_range;
use crate::error::{CoreError, Result};
use crate::history::{Command, Operation, PlacedClip, RemovedClip};
use crate::types::*;
use crate::validation::is_position_valid;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Clipboard
// ---------------------------------------------------------------------------

/// Everything needed to recreate a copied clip, minus its identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClipboardEntry {
    pub kind: TrackKind,
    pub source_id: Uuid,
    pub url: String,
    pub duration: TimeUs,
    pub trim_start: TimeUs,
    pub trim_end: TimeUs,
    #[serde(default)]
    pub muted: bool,
    /// Distance from the earliest copied clip's start.
    pub offset: TimeUs,
}

impl ClipboardEntry {
    fn instantiate(&self, at: TimeUs) -> Clip {
        let kind = match self.kind {
            TrackKind::Video => ClipKind::Video,
            TrackKind::Audio => ClipKind::Audio {
                depth: None,
                muted: self.muted,
            },
        };
        Clip {
            id: Uuid::new_v4(),
            source_id: self.source_id,
            url: self.url.clone(),
            timestamp: at + self.offset,
            duration: self.duration,
            trim_start: self.trim_start,
            trim_end: self.trim_end,
            kind,
        }
    }
}

/// Copy the clips in `ids` (unknown ids are skipped). Offsets are relative to
/// the earliest selected clip.
pub fn copy_clips(timeline: &Timeline, ids: &[Uuid]) -> Vec<ClipboardEntry> {
    let mut seen = HashSet::new();
    let clips: Vec<&Clip> = ids
        .iter()
        .filter(|id| seen.insert(**id))
        .filter_map(|id| timeline.find_clip(*id))
        .collect();
    let Some(origin) = clips.iter().map(|c| c.timestamp).min() else {
        return vec![];
    };

    clips
        .into_iter()
        .map(|clip| ClipboardEntry {
            kind: if clip.is_audio() { TrackKind::Audio } else { TrackKind::Video },
            source_id: clip.source_id,
            url: clip.url.clone(),
            duration: clip.duration,
            trim_start: clip.trim_start,
            trim_end: clip.trim_end,
            muted: clip.muted().unwrap_or(false),
            offset: clip.timestamp - origin,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Batch commands
// ---------------------------------------------------------------------------

impl Command {
    /// Delete every clip in `ids`, on any track. Ids not on the timeline are
    /// skipped; fails when none remain.
    pub fn batch_delete(timeline: &Timeline, ids: &[Uuid]) -> Result<Self> {
        let wanted: HashSet<Uuid> = ids.iter().copied().collect();
        let removed: Vec<RemovedClip> = timeline
            .tracks
            .iter()
            .flat_map(|track| {
                track
                    .clips
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| wanted.contains(&c.id))
                    .map(|(index, clip)| RemovedClip {
                        track_id: track.id,
                        index,
                        clip: clip.clone(),
                    })
            })
            .collect();

        if removed.is_empty() {
            return Err(CoreError::EmptyBatch { op: "batch_delete" });
        }
        let description = match removed.len() {
            1 => "Delete clip".to_string(),
            n => format!("Delete {n} clips"),
        };
        Ok(Self::new(description, Operation::BatchDelete { removed }))
    }

    /// Paste clipboard entries at `at`, each on the first track of its kind,
    /// with fresh ids. Pasted audio always goes back to automatic depth.
    pub fn batch_paste(timeline: &Timeline, entries: &[ClipboardEntry], at: TimeUs) -> Result<Self> {
        if entries.is_empty() {
            return Err(CoreError::EmptyBatch { op: "batch_paste" });
        }
        ensure_time_in_range("batch_paste", "insertion time", at)?;
        let at = at.non_negative();

        let mut placed: Vec<PlacedClip> = Vec::with_capacity(entries.len());
        for entry in entries {
            let track = timeline.first_track_of_kind(entry.kind).ok_or_else(|| {
                CoreError::InvalidOperation(format!("no {:?} track to paste into", entry.kind))
            })?;
            for (what, value) in [
                ("offset", entry.offset),
                ("duration", entry.duration),
                ("trim_start", entry.trim_start),
                ("trim_end", entry.trim_end),
            ] {
                ensure_time_in_range("batch_paste", what, value)?;
            }
            let clip = entry.instantiate(at);

            if !clip.placement().is_well_formed(clip.duration) {
                return Err(CoreError::BelowMinimumDuration { op: "batch_paste", id: clip.id });
            }
            let clashes_with_batch = placed.iter().any(|p| {
                p.track_id == track.id
                    && track.kind == TrackKind::Video
                    && p.clip.occupied_interval().overlaps(&clip.occupied_interval())
            });
            if clashes_with_batch || !is_position_valid(track, clip.id, &clip.placement(), clip.duration, None) {
                return Err(CoreError::Overlap { op: "batch_paste", id: clip.id });
            }

            placed.push(PlacedClip {
                track_id: track.id,
                clip,
            });
        }

        let description = match placed.len() {
            1 => "Paste clip".to_string(),
            n => format!("Paste {n} clips"),
        };
        Ok(Self::new(description, Operation::BatchPaste { placed }))
    }
}

// ---------------------------------------------------------------------------
// ExternalEdit
// ---------------------------------------------------------------------------

/// Before/after capture around a mutation made outside the command system.
///
/// Take the snapshot with [`ExternalEdit::begin`], let the external process
/// rewrite the timeline, then call [`ExternalEdit::finish`] and record the
/// resulting command with `History::add_without_execute`.
#[derive(Debug, Clone)]
pub struct ExternalEdit {
    before: Timeline,
}

impl ExternalEdit {
    pub fn begin(timeline: &Timeline) -> Self {
        Self {
            before: timeline.clone(),
        }
    }

    pub fn before(&self) -> &Timeline {
        &self.before
    }

    /// `None` when the timeline ended up unchanged.
    pub fn finish(self, timeline: &Timeline, description: impl Into<String>) -> Option<Command> {
        if *timeline == self.before {
            return None;
        }
        Some(Command::new(
            description,
            Operation::ExternalEdit {
                before: self.before,
                after: timeline.clone(),
            },
        ))
    }

    /// Put the captured state back, discarding whatever the external process did.
    pub fn abort(self, timeline: &mut Timeline) {
        *timeline = self.before;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
