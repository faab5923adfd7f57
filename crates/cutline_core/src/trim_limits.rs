use crate::types::*;
use crate::validation::lane_siblings;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrimSide {
    Start,
    End,
}

/// How much the trim on `side` may be reduced before the clip runs into its
/// nearest lane sibling on that side.
///
/// Without a neighbour the limit is the trim itself (and, for the start edge,
/// the distance to timeline zero). Unknown clips yield zero.
pub fn get_max_trim_extension(track: &Track, clip_id: Uuid, side: TrimSide) -> TimeUs {
    let Some(clip) = track.clip(clip_id) else {
        return TimeUs::ZERO;
    };
    let siblings = lane_siblings(track, clip_id, None);

    match side {
        TrimSide::Start => {
            let boundary = siblings
                .iter()
                .filter(|s| s.timestamp < clip.timestamp)
                .map(|s| s.end())
                .max()
                .unwrap_or(TimeUs::ZERO);
            clip.trim_start.min((clip.timestamp - boundary).non_negative())
        }
        TrimSide::End => {
            let end = clip.end();
            match siblings
                .iter()
                .filter(|s| s.timestamp >= clip.timestamp)
                .map(|s| s.timestamp)
                .min()
            {
                Some(next_start) => clip.trim_end.min((next_start - end).non_negative()),
                None => clip.trim_end,
            }
        }
    }
}

/// Clamp a requested trim value for `side` so the clip neither runs into a
/// sibling nor drops below [`MIN_VISIBLE_DURATION`].
pub fn clamp_trim(track: &Track, clip_id: Uuid, side: TrimSide, requested: TimeUs) -> Option<TimeUs> {
    let clip = track.clip(clip_id)?;
    let (current, other) = match side {
        TrimSide::Start => (clip.trim_start, clip.trim_end),
        TrimSide::End => (clip.trim_end, clip.trim_start),
    };
    let lower = current - get_max_trim_extension(track, clip_id, side);
    let upper = (clip.duration - other - MIN_VISIBLE_DURATION).max(lower);
    Some(requested.clamp(lower, upper))
}

/// Trim value that puts the `side` edge of `clip` at `edge_time`, keeping the
/// source frames under the opposite edge where they are.
pub fn trim_for_edge(clip: &Clip, side: TrimSide, edge_time: TimeUs) -> TimeUs {
    match side {
        TrimSide::Start => clip.trim_start + (edge_time - clip.timestamp),
        TrimSide::End => clip.trim_end + (clip.end() - edge_time),
    }
}

/// Placement of `clip` after setting the trim on `side` to `trim`.
/// Start trims move the timestamp so the clip's end stays put.
pub fn trimmed_placement(clip: &Clip, side: TrimSide, trim: TimeUs) -> Placement {
    let mut placement = clip.placement();
    match side {
        TrimSide::Start => {
            placement.timestamp += trim - clip.trim_start;
            placement.trim_start = trim;
        }
        TrimSide::End => placement.trim_end = trim,
    }
    placement
}
