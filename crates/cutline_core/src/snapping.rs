use crate::types::*;
use uuid::Uuid;

/// Nearest point within `threshold` of `position`. Ties go to the earlier point.
pub fn find_snap_point(position: TimeUs, points: &[TimeUs], threshold: TimeUs) -> Option<TimeUs> {
    points
        .iter()
        .map(|&p| (p, (position - p).0.abs()))
        .filter(|&(_, dist)| dist <= threshold.0)
        .min_by_key(|&(p, dist)| (dist, p))
        .map(|(p, _)| p)
}

/// Zero plus every clip edge on the timeline, sorted and deduplicated.
/// The clip being dragged is left out so it does not snap to itself.
pub fn collect_snap_points(timeline: &Timeline, exclude: Option<Uuid>) -> Vec<TimeUs> {
    let mut points = vec![TimeUs::ZERO];
    for clip in timeline.tracks.iter().flat_map(|t| &t.clips) {
        if Some(clip.id) == exclude {
            continue;
        }
        let interval = clip.occupied_interval();
        points.push(interval.start);
        points.push(interval.end);
    }
    points.sort();
    points.dedup();
    points
}

/// Snap a dragged clip occupying `visible` from `start`: its start edge wins,
/// otherwise its end edge is tried. Returns the adjusted start.
pub fn snap_clip_start(start: TimeUs, visible: TimeUs, points: &[TimeUs], threshold: TimeUs) -> TimeUs {
    if threshold <= TimeUs::ZERO {
        return start;
    }
    if let Some(p) = find_snap_point(start, points, threshold) {
        return p;
    }
    match find_snap_point(start + visible, points, threshold) {
        Some(p) => (p - visible).non_negative(),
        None => start,
    }
}
