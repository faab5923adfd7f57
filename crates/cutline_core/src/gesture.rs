//! Drag and resize sessions.
//!
//! While a gesture is live, every pointer update is written straight into the
//! timeline without touching history, so the UI can render it. Ending the
//! gesture puts the initial values back and replays the final values through a
//! single command; cancelling only puts the initial values back.

use crate::editing::ensure_time_in_range;
use crate::editor::Editor;
use crate::error::{CoreError, Result};
use crate::history::Command;
use crate::snapping::{collect_snap_points, snap_clip_start};
use crate::trim_limits::{clamp_trim, trim_for_edge, trimmed_placement, TrimSide};
use crate::types::*;
use crate::validation::{is_position_valid, plan_auto_trim};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "gesture", content = "side", rename_all = "snake_case")]
pub enum GestureKind {
    Drag,
    Resize(TrimSide),
}

/// A gesture in progress and the values to restore when it ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gesture {
    pub clip_id: Uuid,
    pub kind: GestureKind,
    pub initial: Placement,
    pub initial_depth: Option<u32>,
}

/// Per-frame answer for the UI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GestureFeedback {
    /// No overlap at the current position.
    pub valid: bool,
    /// Valid, or an overlap that releasing here would resolve by trimming.
    pub auto_trimmable: bool,
    /// Where the clip is drawn this frame.
    pub placement: Placement,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GestureOutcome {
    /// One history entry was recorded.
    Committed,
    /// The clip ended where it started.
    Unchanged,
    /// The final position could not be resolved; the clip is back where it started.
    Reverted,
}

impl Editor {
    pub fn active_gesture(&self) -> Option<&Gesture> {
        self.gesture.as_ref()
    }

    pub fn begin_drag(&mut self, clip_id: Uuid) -> Result<()> {
        self.begin(clip_id, GestureKind::Drag, "begin_drag")
    }

    pub fn begin_resize(&mut self, clip_id: Uuid, side: TrimSide) -> Result<()> {
        self.begin(clip_id, GestureKind::Resize(side), "begin_resize")
    }

    fn begin(&mut self, clip_id: Uuid, kind: GestureKind, op: &'static str) -> Result<()> {
        self.ensure_idle()?;
        let clip = self
            .timeline
            .find_clip(clip_id)
            .ok_or(CoreError::ClipNotFound { op, id: clip_id })?;
        self.gesture = Some(Gesture {
            clip_id,
            kind,
            initial: clip.placement(),
            initial_depth: clip.depth(),
        });
        debug!(%clip_id, ?kind, "gesture started");
        Ok(())
    }

    fn live_gesture(&self, kind_matches: impl Fn(GestureKind) -> bool, op: &str) -> Result<Gesture> {
        let gesture = self.gesture.clone().ok_or(CoreError::NoActiveGesture)?;
        if !kind_matches(gesture.kind) {
            return Err(CoreError::InvalidOperation(format!(
                "{op} does not apply to a {:?} gesture",
                gesture.kind
            )));
        }
        Ok(gesture)
    }

    /// Silently move the dragged clip to `timestamp` (and, for audio, `depth`).
    /// The timestamp is clamped to zero and snapped when snapping is on.
    pub fn drag_to(&mut self, timestamp: TimeUs, depth: Option<u32>) -> Result<GestureFeedback> {
        let gesture = self.live_gesture(|k| k == GestureKind::Drag, "drag_to")?;
        ensure_time_in_range("drag_to", "timestamp", timestamp)?;
        let clip_id = gesture.clip_id;
        let track = self
            .timeline
            .track_of(clip_id)
            .ok_or(CoreError::ClipNotFound { op: "drag_to", id: clip_id })?;
        let Some(clip) = track.clip(clip_id) else {
            return Err(CoreError::ClipNotFound { op: "drag_to", id: clip_id });
        };
        if depth.is_some() && !clip.is_audio() {
            return Err(CoreError::NotAudio { op: "drag_to", id: clip_id });
        }

        let mut start = timestamp.non_negative();
        if self.config.snap_threshold > TimeUs::ZERO {
            let points = collect_snap_points(&self.timeline, Some(clip_id));
            start = snap_clip_start(start, clip.visible_duration(), &points, self.config.snap_threshold);
        }

        let lane = depth.or(gesture.initial_depth);
        let placement = Placement {
            timestamp: start,
            ..gesture.initial
        };
        let valid = is_position_valid(track, clip_id, &placement, clip.duration, lane);
        let auto_trimmable = valid
            || (self.config.auto_trim
                && plan_auto_trim(track, clip_id, &placement, clip.duration, lane).is_some());

        let clip = self
            .timeline
            .find_clip_mut(clip_id)
            .ok_or(CoreError::ClipNotFound { op: "drag_to", id: clip_id })?;
        clip.set_placement(placement);
        clip.set_depth(lane);

        Ok(GestureFeedback {
            valid,
            auto_trimmable,
            placement,
        })
    }

    /// Silently move the resized edge towards `edge_time`, clamped so it
    /// never crosses a neighbour or shrinks the clip below the minimum.
    pub fn resize_to(&mut self, edge_time: TimeUs) -> Result<GestureFeedback> {
        let gesture = self.live_gesture(|k| matches!(k, GestureKind::Resize(_)), "resize_to")?;
        ensure_time_in_range("resize_to", "edge", edge_time)?;
        let GestureKind::Resize(side) = gesture.kind else {
            return Err(CoreError::NoActiveGesture);
        };
        let clip_id = gesture.clip_id;
        let track = self
            .timeline
            .track_of(clip_id)
            .ok_or(CoreError::ClipNotFound { op: "resize_to", id: clip_id })?;
        let Some(clip) = track.clip(clip_id) else {
            return Err(CoreError::ClipNotFound { op: "resize_to", id: clip_id });
        };

        let requested = trim_for_edge(clip, side, edge_time);
        let trim = clamp_trim(track, clip_id, side, requested)
            .ok_or(CoreError::ClipNotFound { op: "resize_to", id: clip_id })?;
        let placement = trimmed_placement(clip, side, trim);

        self.timeline.set_clip_placement(clip_id, placement)?;
        Ok(GestureFeedback {
            valid: true,
            auto_trimmable: true,
            placement,
        })
    }

    /// Finish the gesture: restore the initial values, then apply the final
    /// ones through one command.
    pub fn end_gesture(&mut self) -> Result<GestureOutcome> {
        let gesture = self.gesture.take().ok_or(CoreError::NoActiveGesture)?;
        let clip_id = gesture.clip_id;
        let clip = self
            .timeline
            .find_clip_mut(clip_id)
            .ok_or(CoreError::ClipNotFound { op: "end_gesture", id: clip_id })?;
        let (final_placement, final_depth) = (clip.placement(), clip.depth());
        clip.set_placement(gesture.initial);
        clip.set_depth(gesture.initial_depth);

        if final_placement == gesture.initial && final_depth == gesture.initial_depth {
            debug!(%clip_id, "gesture ended without change");
            return Ok(GestureOutcome::Unchanged);
        }

        let command = match gesture.kind {
            GestureKind::Drag => Command::move_clip(
                &self.timeline,
                clip_id,
                final_placement.timestamp,
                final_depth,
                self.config.auto_trim,
            ),
            GestureKind::Resize(side) => {
                let trim = match side {
                    TrimSide::Start => final_placement.trim_start,
                    TrimSide::End => final_placement.trim_end,
                };
                Command::trim_clip(&self.timeline, clip_id, side, trim)
            }
        };

        match command {
            Ok(command) => {
                info!(%clip_id, command = %command.description, "gesture committed");
                self.history.execute(command, &mut self.timeline)?;
                Ok(GestureOutcome::Committed)
            }
            Err(e @ (CoreError::Overlap { .. } | CoreError::BelowMinimumDuration { .. })) => {
                warn!(%clip_id, error = %e, "gesture reverted");
                Ok(GestureOutcome::Reverted)
            }
            Err(e) => Err(e),
        }
    }

    /// Abandon the gesture, restoring the clip exactly as it was.
    pub fn cancel_gesture(&mut self) -> Result<()> {
        let gesture = self.gesture.take().ok_or(CoreError::NoActiveGesture)?;
        let clip = self
            .timeline
            .find_clip_mut(gesture.clip_id)
            .ok_or(CoreError::ClipNotFound { op: "cancel_gesture", id: gesture.clip_id })?;
        clip.set_placement(gesture.initial);
        clip.set_depth(gesture.initial_depth);
        debug!(clip_id = %gesture.clip_id, "gesture cancelled");
        Ok(())
    }
}
