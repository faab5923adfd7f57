//! Overlap checks used on every drag frame, and the auto-trim resolver used
//! once when a gesture is released.
//!
//! A clip only competes with its *lane siblings*: every other clip on a video
//! track, or the other clips pinned to the same depth on an audio track. An
//! audio clip without an explicit depth has no lane of its own; the depth
//! allocator stacks it wherever there is room, so it never conflicts.

use crate::types::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Clips on the same lane as `clip_id`, excluding the clip itself.
///
/// `depth` overrides the clip's own explicit depth on audio tracks (used while
/// a clip is dragged vertically).
pub fn lane_siblings(track: &Track, clip_id: Uuid, depth: Option<u32>) -> Vec<&Clip> {
    match track.kind {
        TrackKind::Video => track.clips.iter().filter(|c| c.id != clip_id).collect(),
        TrackKind::Audio => {
            let lane = depth.or_else(|| track.clip(clip_id).and_then(Clip::depth));
            match lane {
                Some(d) => track
                    .clips
                    .iter()
                    .filter(|c| c.id != clip_id && c.depth() == Some(d))
                    .collect(),
                None => vec![],
            }
        }
    }
}

/// Returns false iff the candidate's occupied interval intersects a lane sibling.
pub fn is_position_valid(
    track: &Track,
    clip_id: Uuid,
    candidate: &Placement,
    duration: TimeUs,
    depth: Option<u32>,
) -> bool {
    let interval = candidate.interval(duration);
    !lane_siblings(track, clip_id, depth)
        .iter()
        .any(|s| s.occupied_interval().overlaps(&interval))
}

/// Like [`is_position_valid`], but also accepts positions that
/// [`plan_auto_trim`] can make valid on release.
pub fn is_position_valid_or_auto_trimmable(
    track: &Track,
    clip_id: Uuid,
    candidate: &Placement,
    duration: TimeUs,
    depth: Option<u32>,
) -> bool {
    is_position_valid(track, clip_id, candidate, duration, depth)
        || plan_auto_trim(track, clip_id, candidate, duration, depth).is_some()
}

/// Trim applied to a sibling to make room for the moving clip.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NeighborTrim {
    pub clip_id: Uuid,
    pub before: Placement,
    pub after: Placement,
}

/// Outcome of a successful auto-trim resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoTrimPlan {
    /// Final placement of the moving clip. Differs from the candidate only when
    /// the moving clip had to give way.
    pub placement: Placement,
    pub neighbors: Vec<NeighborTrim>,
}

impl AutoTrimPlan {
    pub fn trims_anything(&self, candidate: &Placement) -> bool {
        !self.neighbors.is_empty() || self.placement != *candidate
    }
}

/// Work out how to make `candidate` fit on its lane by trimming.
///
/// A sibling overlapping the candidate's head gets its tail trimmed back to the
/// candidate's start; a sibling overlapping the candidate's tail gets its head
/// trimmed forward to the candidate's end. When a sibling cannot shrink that far
/// without dropping below [`MIN_VISIBLE_DURATION`], the moving clip trims its
/// own edge instead. Returns `None` when no such resolution exists: a sibling
/// contains or is contained by the candidate, two siblings overlap the same
/// side, or the moving clip itself would drop below the floor.
pub fn plan_auto_trim(
    track: &Track,
    clip_id: Uuid,
    candidate: &Placement,
    duration: TimeUs,
    depth: Option<u32>,
) -> Option<AutoTrimPlan> {
    let cand = candidate.interval(duration);
    let mut leading: Option<&Clip> = None;
    let mut trailing: Option<&Clip> = None;

    for sibling in lane_siblings(track, clip_id, depth) {
        let si = sibling.occupied_interval();
        if !si.overlaps(&cand) {
            continue;
        }
        if si.start < cand.start && si.end <= cand.end {
            if leading.replace(sibling).is_some() {
                return None;
            }
        } else if si.start >= cand.start && si.end > cand.end {
            if trailing.replace(sibling).is_some() {
                return None;
            }
        } else {
            return None;
        }
    }

    let mut placement = *candidate;
    let mut neighbors = Vec::new();

    if let Some(sibling) = leading {
        let overlap = sibling.end() - cand.start;
        let before = sibling.placement();
        let mut after = before;
        after.trim_end += overlap;
        if after.visible_duration(sibling.duration) >= MIN_VISIBLE_DURATION {
            neighbors.push(NeighborTrim {
                clip_id: sibling.id,
                before,
                after,
            });
        } else {
            placement.trim_start += overlap;
            placement.timestamp += overlap;
        }
    }

    if let Some(sibling) = trailing {
        let overlap = cand.end - sibling.timestamp;
        let before = sibling.placement();
        let mut after = before;
        after.trim_start += overlap;
        after.timestamp += overlap;
        if after.visible_duration(sibling.duration) >= MIN_VISIBLE_DURATION {
            neighbors.push(NeighborTrim {
                clip_id: sibling.id,
                before,
                after,
            });
        } else {
            placement.trim_end += overlap;
        }
    }

    if placement.visible_duration(duration) < MIN_VISIBLE_DURATION {
        return None;
    }

    Some(AutoTrimPlan {
        placement,
        neighbors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> TimeUs {
        TimeUs::from_seconds(s)
    }

    fn video_track(clips: Vec<Clip>) -> Track {
        Track {
            id: Uuid::new_v4(),
            kind: TrackKind::Video,
            clips,
        }
    }

    fn video(start: f64, len: f64) -> Clip {
        Clip::video(Uuid::new_v4(), "v.mp4", secs(start), secs(len))
    }

    fn at(start: f64) -> Placement {
        Placement::new(secs(start), TimeUs::ZERO, TimeUs::ZERO)
    }

    #[test]
    fn overlapping_drop_is_invalid_but_auto_trimmable() {
        let a = video(0.0, 10.0);
        let a_id = a.id;
        let track = video_track(vec![a]);
        let b_id = Uuid::new_v4();

        assert!(!is_position_valid(&track, b_id, &at(8.0), secs(5.0), None));
        assert!(is_position_valid_or_auto_trimmable(&track, b_id, &at(8.0), secs(5.0), None));

        let plan = plan_auto_trim(&track, b_id, &at(8.0), secs(5.0), None).unwrap();
        assert_eq!(plan.placement, at(8.0));
        assert_eq!(plan.neighbors.len(), 1);
        assert_eq!(plan.neighbors[0].clip_id, a_id);
        assert_eq!(plan.neighbors[0].after.trim_end, secs(2.0));
        assert_eq!(plan.neighbors[0].after.interval(secs(10.0)).end, secs(8.0));
    }

    #[test]
    fn touching_is_valid() {
        let track = video_track(vec![video(0.0, 10.0)]);
        assert!(is_position_valid(&track, Uuid::new_v4(), &at(10.0), secs(5.0), None));
    }

    #[test]
    fn clip_does_not_collide_with_itself() {
        let a = video(0.0, 10.0);
        let a_id = a.id;
        let track = video_track(vec![a]);
        assert!(is_position_valid(&track, a_id, &at(3.0), secs(10.0), None));
    }

    #[test]
    fn trailing_sibling_gets_its_head_trimmed() {
        let next = video(10.0, 10.0);
        let track = video_track(vec![next]);

        let plan = plan_auto_trim(&track, Uuid::new_v4(), &at(7.0), secs(5.0), None).unwrap();
        let trim = plan.neighbors[0];
        assert_eq!(trim.after.trim_start, secs(2.0));
        assert_eq!(trim.after.timestamp, secs(12.0));
        assert_eq!(trim.after.interval(secs(10.0)).end, secs(20.0));
    }

    #[test]
    fn short_sibling_makes_the_moving_clip_give_way() {
        // Sibling [0, 1) cannot lose 0.95s; the moving clip trims its head instead.
        let tiny = video(0.0, 1.0);
        let track = video_track(vec![tiny]);

        let plan = plan_auto_trim(&track, Uuid::new_v4(), &at(0.05), secs(5.0), None).unwrap();
        assert!(plan.neighbors.is_empty());
        assert_eq!(plan.placement.timestamp, secs(1.0));
        assert_eq!(plan.placement.trim_start, secs(0.95));
        assert!(plan.trims_anything(&at(0.05)));
    }

    #[test]
    fn unresolvable_when_both_would_break_the_floor() {
        let tiny = video(0.0, 1.0);
        let track = video_track(vec![tiny]);
        // A 1s clip landing at 0.05 overlaps 0.95s of a 1s sibling; neither can
        // give up 0.95s and stay above the floor.
        assert!(plan_auto_trim(&track, Uuid::new_v4(), &at(0.05), secs(1.0), None).is_none());
        assert!(!is_position_valid_or_auto_trimmable(
            &track,
            Uuid::new_v4(),
            &at(0.05),
            secs(1.0),
            None
        ));
    }

    #[test]
    fn containment_is_unresolvable() {
        let wide = video(0.0, 20.0);
        let track = video_track(vec![wide]);
        assert!(plan_auto_trim(&track, Uuid::new_v4(), &at(5.0), secs(2.0), None).is_none());

        let narrow = video(5.0, 2.0);
        let track = video_track(vec![narrow]);
        assert!(plan_auto_trim(&track, Uuid::new_v4(), &at(4.0), secs(5.0), None).is_none());
    }

    #[test]
    fn siblings_on_both_sides_are_each_trimmed() {
        let left = video(0.0, 10.0);
        let right = video(12.0, 10.0);
        let (left_id, right_id) = (left.id, right.id);
        let track = video_track(vec![left, right]);

        let plan = plan_auto_trim(&track, Uuid::new_v4(), &at(9.0), secs(4.0), None).unwrap();
        assert_eq!(plan.neighbors.len(), 2);
        let l = plan.neighbors.iter().find(|n| n.clip_id == left_id).unwrap();
        let r = plan.neighbors.iter().find(|n| n.clip_id == right_id).unwrap();
        assert_eq!(l.after.trim_end, secs(1.0));
        assert_eq!(r.after.timestamp, secs(13.0));
        assert_eq!(r.after.trim_start, secs(1.0));
    }

    #[test]
    fn covered_sibling_is_unresolvable() {
        // Candidate [1, 10) covers all of [2, 3) and the head of [4, 12).
        let track = video_track(vec![video(2.0, 1.0), video(4.0, 8.0)]);
        assert!(plan_auto_trim(&track, Uuid::new_v4(), &at(1.0), secs(9.0), None).is_none());
    }

    #[test]
    fn no_overlap_plan_is_unchanged() {
        let track = video_track(vec![video(0.0, 10.0)]);
        let plan = plan_auto_trim(&track, Uuid::new_v4(), &at(20.0), secs(1.0), None).unwrap();
        assert_eq!(plan.placement, at(20.0));
        assert!(!plan.trims_anything(&at(20.0)));
    }

    #[test]
    fn audio_lanes_only_conflict_at_the_same_depth() {
        let mut pinned = Clip::audio(Uuid::new_v4(), "a.wav", secs(0.0), secs(10.0));
        pinned.set_depth(Some(0));
        let track = Track {
            id: Uuid::new_v4(),
            kind: TrackKind::Audio,
            clips: vec![pinned],
        };
        let moving = Uuid::new_v4();

        assert!(!is_position_valid(&track, moving, &at(5.0), secs(5.0), Some(0)));
        assert!(is_position_valid(&track, moving, &at(5.0), secs(5.0), Some(1)));
        // No explicit depth: the allocator will stack it.
        assert!(is_position_valid(&track, moving, &at(5.0), secs(5.0), None));
    }

    #[test]
    fn audio_clip_uses_its_own_depth_when_none_given() {
        let mut pinned = Clip::audio(Uuid::new_v4(), "a.wav", secs(0.0), secs(10.0));
        pinned.set_depth(Some(2));
        let mut mover = Clip::audio(Uuid::new_v4(), "b.wav", secs(20.0), secs(5.0));
        mover.set_depth(Some(2));
        let mover_id = mover.id;
        let track = Track {
            id: Uuid::new_v4(),
            kind: TrackKind::Audio,
            clips: vec![pinned, mover],
        };

        assert!(!is_position_valid(&track, mover_id, &at(8.0), secs(5.0), None));
        assert_eq!(lane_siblings(&track, mover_id, None).len(), 1);
    }
}
