use crate::depth::calculate_clip_depths;
use crate::error::{CoreError, Result};
use crate::types::*;
use crate::validation::is_position_valid;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Reject a caller-supplied time outside `±MAX_TIME` before any arithmetic
/// touches it.
pub fn ensure_time_in_range(op: &'static str, what: &str, value: TimeUs) -> Result<()> {
    if value.is_in_range() {
        Ok(())
    } else {
        Err(CoreError::InvalidOperation(format!(
            "{op}: {what} of {}us is out of range",
            value.0
        )))
    }
}

impl Timeline {
    pub fn track_mut(&mut self, track_id: Uuid) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == track_id)
    }

    pub fn find_clip_mut(&mut self, clip_id: Uuid) -> Option<&mut Clip> {
        self.tracks
            .iter_mut()
            .find_map(|t| t.clips.iter_mut().find(|c| c.id == clip_id))
    }

    /// Track holding a clip.
    pub fn track_of(&self, clip_id: Uuid) -> Option<&Track> {
        self.tracks.iter().find(|t| t.position(clip_id).is_some())
    }

    /// Append a clip to a track. Fails if the clip is malformed, of the wrong
    /// kind for the track, or would overlap a lane sibling.
    pub fn add_clip(&mut self, track_id: Uuid, clip: Clip) -> Result<()> {
        let track = self
            .track_mut(track_id)
            .ok_or(CoreError::TrackNotFound { op: "add_clip", id: track_id })?;

        if clip.is_audio() != (track.kind == TrackKind::Audio) {
            return Err(CoreError::InvalidOperation(format!(
                "clip {} does not belong on a {:?} track",
                clip.id, track.kind
            )));
        }
        if !clip.placement().is_well_formed(clip.duration) {
            return Err(CoreError::BelowMinimumDuration { op: "add_clip", id: clip.id });
        }
        if !is_position_valid(track, clip.id, &clip.placement(), clip.duration, clip.depth()) {
            return Err(CoreError::Overlap { op: "add_clip", id: clip.id });
        }

        track.clips.push(clip);
        Ok(())
    }

    /// Put a previously removed clip back at its old index. No overlap check:
    /// the caller restores a state that was valid when captured.
    pub fn insert_clip(&mut self, track_id: Uuid, index: usize, clip: Clip) -> Result<()> {
        let track = self
            .track_mut(track_id)
            .ok_or(CoreError::TrackNotFound { op: "insert_clip", id: track_id })?;
        let index = index.min(track.clips.len());
        track.clips.insert(index, clip);
        Ok(())
    }

    /// Remove a clip by id. Returns the track it lived on, its index and the clip.
    pub fn remove_clip(&mut self, clip_id: Uuid) -> Result<(Uuid, usize, Clip)> {
        for track in &mut self.tracks {
            if let Some(pos) = track.position(clip_id) {
                return Ok((track.id, pos, track.clips.remove(pos)));
            }
        }
        Err(CoreError::ClipNotFound { op: "remove_clip", id: clip_id })
    }

    /// Overwrite a clip's timestamp and trims without any checks.
    pub fn set_clip_placement(&mut self, clip_id: Uuid, placement: Placement) -> Result<()> {
        let clip = self
            .find_clip_mut(clip_id)
            .ok_or(CoreError::ClipNotFound { op: "set_clip_placement", id: clip_id })?;
        clip.set_placement(placement);
        Ok(())
    }

    pub fn set_clip_depth(&mut self, clip_id: Uuid, depth: Option<u32>) -> Result<()> {
        let clip = self
            .find_clip_mut(clip_id)
            .ok_or(CoreError::ClipNotFound { op: "set_clip_depth", id: clip_id })?;
        clip.set_depth(depth);
        Ok(())
    }

    /// Replace a clip wholesale, keeping its position in the track.
    pub fn replace_clip(&mut self, clip: Clip) -> Result<()> {
        let slot = self
            .find_clip_mut(clip.id)
            .ok_or(CoreError::ClipNotFound { op: "replace_clip", id: clip.id })?;
        *slot = clip;
        Ok(())
    }

    /// Check every structural rule: well-formed clips, unique ids, clip kinds
    /// matching their track, and no overlaps within a lane.
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for track in &self.tracks {
            for clip in &track.clips {
                if !seen.insert(clip.id) {
                    return Err(CoreError::InvariantViolation(format!("duplicate clip id {}", clip.id)));
                }
                if clip.is_audio() != (track.kind == TrackKind::Audio) {
                    return Err(CoreError::InvariantViolation(format!(
                        "clip {} is on a {:?} track",
                        clip.id, track.kind
                    )));
                }
                let times = [clip.timestamp, clip.duration, clip.trim_start, clip.trim_end];
                if !times.iter().all(|t| t.is_in_range()) {
                    return Err(CoreError::InvariantViolation(format!(
                        "clip {} has a time out of range",
                        clip.id
                    )));
                }
                if clip.duration <= TimeUs::ZERO || !clip.placement().is_well_formed(clip.duration) {
                    return Err(CoreError::InvariantViolation(format!(
                        "clip {} has a degenerate placement",
                        clip.id
                    )));
                }
            }

            let depths = match track.kind {
                TrackKind::Video => None,
                TrackKind::Audio => Some(calculate_clip_depths(&track.clips)),
            };
            for (i, a) in track.clips.iter().enumerate() {
                for b in &track.clips[i + 1..] {
                    let same_lane = match &depths {
                        None => true,
                        Some(d) => d.get(&a.id) == d.get(&b.id),
                    };
                    if same_lane && a.occupied_interval().overlaps(&b.occupied_interval()) {
                        return Err(CoreError::InvariantViolation(format!(
                            "clips {} and {} overlap",
                            a.id, b.id
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Placement of a clip after its source length changes from `old` to `new`.
/// The occupied interval is kept where the source is long enough: the tail trim
/// absorbs the difference, then the head trim, and only then does the clip shrink.
pub fn refit_placement(placement: Placement, old: TimeUs, new: TimeUs) -> Placement {
    let mut p = placement;
    p.trim_end += new - old;
    if p.trim_end.is_negative() {
        p.trim_start = (p.trim_start + p.trim_end).non_negative();
        p.trim_end = TimeUs::ZERO;
    }
    p
}

pub fn refit_clip(clip: &mut Clip, duration: TimeUs) {
    let placement = refit_placement(clip.placement(), clip.duration, duration);
    clip.duration = duration;
    clip.set_placement(placement);
}

impl Timeline {
    /// Give every clip cut from `source_id` the new source `duration`.
    /// Returns the previous duration of each clip touched.
    pub fn refit_source(&mut self, source_id: Uuid, duration: TimeUs) -> HashMap<Uuid, TimeUs> {
        let mut previous = HashMap::new();
        for clip in self.tracks.iter_mut().flat_map(|t| t.clips.iter_mut()) {
            if clip.source_id == source_id {
                previous.insert(clip.id, clip.duration);
                refit_clip(clip, duration);
            }
        }
        previous
    }
}

/// Split `clip` at timeline position `at` into a left half keeping the original
/// id and a right half with `right_id`. Both halves must keep at least
/// [`MIN_VISIBLE_DURATION`] visible.
pub fn split_clip(clip: &Clip, at: TimeUs, right_id: Uuid) -> Result<(Clip, Clip)> {
    let interval = clip.occupied_interval();
    if at - interval.start < MIN_VISIBLE_DURATION || interval.end - at < MIN_VISIBLE_DURATION {
        return Err(CoreError::BelowMinimumDuration { op: "split_clip", id: clip.id });
    }

    let offset = at - clip.timestamp;
    let mut left = clip.clone();
    left.trim_end = clip.duration - clip.trim_start - offset;

    let mut right = clip.clone();
    right.id = right_id;
    right.timestamp = at;
    right.trim_start = clip.trim_start + offset;

    Ok((left, right))
}
