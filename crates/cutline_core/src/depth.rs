use crate::types::*;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Assign a stacking depth to every audio clip in `clips`.
///
/// Clips with an explicit depth keep it and mark that lane as occupied until
/// the latest end among them. The rest are placed in ascending timestamp order
/// at the lowest lane that is free by their start time (first-fit interval
/// scheduling). Clips sharing a timestamp keep their relative input order.
/// Video clips are ignored.
pub fn calculate_clip_depths(clips: &[Clip]) -> HashMap<Uuid, u32> {
    let mut depths = HashMap::new();
    let mut lane_ends: BTreeMap<u32, TimeUs> = BTreeMap::new();

    for clip in clips.iter().filter(|c| c.is_audio()) {
        if let Some(depth) = clip.depth() {
            depths.insert(clip.id, depth);
            let end = clip.end();
            lane_ends
                .entry(depth)
                .and_modify(|e| *e = (*e).max(end))
                .or_insert(end);
        }
    }

    let mut auto: Vec<&Clip> = clips
        .iter()
        .filter(|c| c.is_audio() && c.depth().is_none())
        .collect();
    auto.sort_by_key(|c| c.timestamp);

    for clip in auto {
        let mut depth = 0u32;
        while let Some(end) = lane_ends.get(&depth) {
            if *end <= clip.timestamp {
                break;
            }
            depth += 1;
        }
        lane_ends.insert(depth, clip.end());
        depths.insert(clip.id, depth);
    }

    depths
}

/// Number of lanes needed to draw the given depth map.
pub fn lane_count(depths: &HashMap<Uuid, u32>) -> u32 {
    depths.values().max().map_or(0, |d| d + 1)
}
