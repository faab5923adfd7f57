use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TimeUs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeUs(pub i64);

impl TimeUs {
    pub const ZERO: Self = Self(0);

    /// Rounds to the nearest microsecond so `0.3` maps to `300_000`, not `299_999`.
    pub fn from_seconds(s: f64) -> Self {
        Self((s * 1_000_000.0).round() as i64)
    }

    pub fn as_seconds(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamp negative values to zero.
    pub fn non_negative(self) -> Self {
        Self(self.0.max(0))
    }

    /// Within `±MAX_TIME`.
    pub fn is_in_range(self) -> bool {
        (-MAX_TIME.0..=MAX_TIME.0).contains(&self.0)
    }
}

impl Add for TimeUs {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for TimeUs {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for TimeUs {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for TimeUs {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for TimeUs {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Mul<i64> for TimeUs {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<i64> for TimeUs {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self(self.0 / rhs)
    }
}

impl fmt::Display for TimeUs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_us = self.0.unsigned_abs();
        let total_ms = total_us / 1_000;
        let ms = total_ms % 1_000;
        let total_secs = total_ms / 1_000;
        let secs = total_secs % 60;
        let total_mins = total_secs / 60;
        let mins = total_mins % 60;
        let hours = total_mins / 60;
        if self.0 < 0 {
            write!(f, "-{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        } else {
            write!(f, "{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        }
    }
}

/// Smallest visible length any clip may be trimmed down to (0.1s).
pub const MIN_VISIBLE_DURATION: TimeUs = TimeUs(100_000);

/// Largest time magnitude accepted from callers (about 31 years). Any sum or
/// difference of a few in-range values stays inside `i64`.
pub const MAX_TIME: TimeUs = TimeUs(1_000_000_000_000_000);

/// Length given to a clip whose media duration is not known yet.
pub const DEFAULT_CLIP_DURATION: TimeUs = TimeUs(5_000_000);

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

/// Half-open `[start, end)` range on the timeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Interval {
    pub start: TimeUs,
    pub end: TimeUs,
}

impl Interval {
    pub fn new(start: TimeUs, end: TimeUs) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> TimeUs {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Touching intervals (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, t: TimeUs) -> bool {
        self.start <= t && t < self.end
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// The part of a clip that moves and resizes touch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placement {
    pub timestamp: TimeUs,
    pub trim_start: TimeUs,
    pub trim_end: TimeUs,
}

impl Placement {
    pub fn new(timestamp: TimeUs, trim_start: TimeUs, trim_end: TimeUs) -> Self {
        Self {
            timestamp,
            trim_start,
            trim_end,
        }
    }

    pub fn visible_duration(&self, duration: TimeUs) -> TimeUs {
        duration - self.trim_start - self.trim_end
    }

    pub fn interval(&self, duration: TimeUs) -> Interval {
        Interval::new(self.timestamp, self.timestamp + self.visible_duration(duration))
    }

    /// Whether this placement keeps a clip of `duration` structurally valid.
    pub fn is_well_formed(&self, duration: TimeUs) -> bool {
        !self.timestamp.is_negative()
            && !self.trim_start.is_negative()
            && !self.trim_end.is_negative()
            && self.visible_duration(duration) >= MIN_VISIBLE_DURATION
    }
}

// ---------------------------------------------------------------------------
// ClipKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClipKind {
    Video,
    Audio {
        /// `None` lets the depth allocator pick a lane.
        #[serde(default)]
        depth: Option<u32>,
        #[serde(default)]
        muted: bool,
    },
}

// ---------------------------------------------------------------------------
// Clip
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Clip {
    pub id: Uuid,
    pub source_id: Uuid,
    pub url: String,
    pub timestamp: TimeUs,
    pub duration: TimeUs,
    #[serde(default)]
    pub trim_start: TimeUs,
    #[serde(default)]
    pub trim_end: TimeUs,
    pub kind: ClipKind,
}

impl Clip {
    pub fn video(source_id: Uuid, url: impl Into<String>, timestamp: TimeUs, duration: TimeUs) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            url: url.into(),
            timestamp,
            duration,
            trim_start: TimeUs::ZERO,
            trim_end: TimeUs::ZERO,
            kind: ClipKind::Video,
        }
    }

    pub fn audio(source_id: Uuid, url: impl Into<String>, timestamp: TimeUs, duration: TimeUs) -> Self {
        Self {
            kind: ClipKind::Audio {
                depth: None,
                muted: false,
            },
            ..Self::video(source_id, url, timestamp, duration)
        }
    }

    pub fn visible_duration(&self) -> TimeUs {
        self.duration - self.trim_start - self.trim_end
    }

    pub fn end(&self) -> TimeUs {
        self.timestamp + self.visible_duration()
    }

    pub fn occupied_interval(&self) -> Interval {
        Interval::new(self.timestamp, self.end())
    }

    pub fn placement(&self) -> Placement {
        Placement::new(self.timestamp, self.trim_start, self.trim_end)
    }

    pub fn set_placement(&mut self, placement: Placement) {
        self.timestamp = placement.timestamp;
        self.trim_start = placement.trim_start;
        self.trim_end = placement.trim_end;
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.kind, ClipKind::Audio { .. })
    }

    /// Explicit depth of an audio clip. Video clips and auto-stacked audio return `None`.
    pub fn depth(&self) -> Option<u32> {
        match self.kind {
            ClipKind::Audio { depth, .. } => depth,
            ClipKind::Video => None,
        }
    }

    /// No-op on video clips.
    pub fn set_depth(&mut self, new_depth: Option<u32>) {
        if let ClipKind::Audio { depth, .. } = &mut self.kind {
            *depth = new_depth;
        }
    }

    pub fn muted(&self) -> Option<bool> {
        match self.kind {
            ClipKind::Audio { muted, .. } => Some(muted),
            ClipKind::Video => None,
        }
    }

    pub fn set_muted(&mut self, value: bool) {
        if let ClipKind::Audio { muted, .. } = &mut self.kind {
            *muted = value;
        }
    }
}

// ---------------------------------------------------------------------------
// MediaRef
// ---------------------------------------------------------------------------

/// Clip creation request handed over by the media layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaRef {
    pub source_id: Uuid,
    pub url: String,
    /// Unknown until the media layer has probed the file.
    #[serde(default)]
    pub duration: Option<TimeUs>,
}

// ---------------------------------------------------------------------------
// TrackKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Video,
    Audio,
}

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: Uuid,
    pub kind: TrackKind,
    pub clips: Vec<Clip>,
}

impl Track {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            clips: vec![],
        }
    }

    pub fn clip(&self, clip_id: Uuid) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == clip_id)
    }

    pub fn position(&self, clip_id: Uuid) -> Option<usize> {
        self.clips.iter().position(|c| c.id == clip_id)
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timeline {
    pub tracks: Vec<Track>,
}

impl Timeline {
    pub fn new() -> Self {
        Self { tracks: vec![] }
    }

    /// One video track followed by one audio track.
    pub fn with_default_tracks() -> Self {
        Self {
            tracks: vec![Track::new(TrackKind::Video), Track::new(TrackKind::Audio)],
        }
    }

    pub fn track(&self, track_id: Uuid) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == track_id)
    }

    pub fn first_track_of_kind(&self, kind: TrackKind) -> Option<&Track> {
        self.tracks.iter().find(|t| t.kind == kind)
    }

    pub fn find_clip(&self, clip_id: Uuid) -> Option<&Clip> {
        self.tracks.iter().find_map(|t| t.clip(clip_id))
    }

    /// Track id and index of a clip.
    pub fn locate_clip(&self, clip_id: Uuid) -> Option<(Uuid, usize)> {
        self.tracks
            .iter()
            .find_map(|t| t.position(clip_id).map(|idx| (t.id, idx)))
    }

    pub fn clip_count(&self) -> usize {
        self.tracks.iter().map(|t| t.clips.len()).sum()
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_us_add_sub() {
        let a = TimeUs(5_000_000);
        let b = TimeUs(3_000_000);
        assert_eq!(a + b, TimeUs(8_000_000));
        assert_eq!(a - b, TimeUs(2_000_000));
        assert_eq!(-b, TimeUs(-3_000_000));
    }

    #[test]
    fn time_us_from_seconds_rounds() {
        assert_eq!(TimeUs::from_seconds(2.5), TimeUs(2_500_000));
        assert_eq!(TimeUs::from_seconds(0.3), TimeUs(300_000));
        assert_eq!(TimeUs::from_seconds(0.1), MIN_VISIBLE_DURATION);
        assert!((TimeUs(2_500_000).as_seconds() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn time_us_display() {
        assert_eq!(TimeUs(0).to_string(), "00:00:00.000");
        assert_eq!(TimeUs(1_500_000).to_string(), "00:00:01.500");
        assert_eq!(TimeUs::from_seconds(3661.5).to_string(), "01:01:01.500");
        assert_eq!(TimeUs(-1_500_000).to_string(), "-00:00:01.500");
    }

    #[test]
    fn time_us_non_negative() {
        assert_eq!(TimeUs(-5).non_negative(), TimeUs::ZERO);
        assert_eq!(TimeUs(5).non_negative(), TimeUs(5));
    }

    #[test]
    fn interval_half_open() {
        let a = Interval::new(TimeUs(0), TimeUs(10));
        let b = Interval::new(TimeUs(10), TimeUs(20));
        let c = Interval::new(TimeUs(9), TimeUs(12));
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
        assert!(a.contains(TimeUs(0)));
        assert!(!a.contains(TimeUs(10)));
    }

    #[test]
    fn clip_visible_duration_and_interval() {
        let mut clip = Clip::video(Uuid::new_v4(), "a.mp4", TimeUs(2_000_000), TimeUs(10_000_000));
        clip.trim_start = TimeUs(1_000_000);
        clip.trim_end = TimeUs(3_000_000);

        assert_eq!(clip.visible_duration(), TimeUs(6_000_000));
        assert_eq!(
            clip.occupied_interval(),
            Interval::new(TimeUs(2_000_000), TimeUs(8_000_000))
        );
        assert_eq!(clip.placement().interval(clip.duration), clip.occupied_interval());
    }

    #[test]
    fn placement_well_formed_checks_floor() {
        let duration = TimeUs(1_000_000);
        assert!(Placement::new(TimeUs(0), TimeUs(450_000), TimeUs(450_000)).is_well_formed(duration));
        assert!(!Placement::new(TimeUs(0), TimeUs(500_000), TimeUs(450_000)).is_well_formed(duration));
        assert!(!Placement::new(TimeUs(-1), TimeUs(0), TimeUs(0)).is_well_formed(duration));
        assert!(!Placement::new(TimeUs(0), TimeUs(-1), TimeUs(0)).is_well_formed(duration));
    }

    #[test]
    fn audio_accessors() {
        let mut clip = Clip::audio(Uuid::new_v4(), "a.wav", TimeUs(0), TimeUs(1_000_000));
        assert!(clip.is_audio());
        assert_eq!(clip.depth(), None);
        assert_eq!(clip.muted(), Some(false));

        clip.set_depth(Some(2));
        clip.set_muted(true);
        assert_eq!(clip.depth(), Some(2));
        assert_eq!(clip.muted(), Some(true));
    }

    #[test]
    fn video_ignores_audio_setters() {
        let mut clip = Clip::video(Uuid::new_v4(), "a.mp4", TimeUs(0), TimeUs(1_000_000));
        clip.set_depth(Some(3));
        clip.set_muted(true);
        assert_eq!(clip.depth(), None);
        assert_eq!(clip.muted(), None);
        assert_eq!(clip.kind, ClipKind::Video);
    }

    #[test]
    fn timeline_lookups() {
        let mut tl = Timeline::with_default_tracks();
        let audio_track = tl.tracks[1].id;
        let clip = Clip::audio(Uuid::new_v4(), "a.wav", TimeUs(0), TimeUs(1_000_000));
        let clip_id = clip.id;
        tl.tracks[1].clips.push(clip);

        assert_eq!(tl.locate_clip(clip_id), Some((audio_track, 0)));
        assert_eq!(tl.find_clip(clip_id).map(|c| c.id), Some(clip_id));
        assert_eq!(tl.first_track_of_kind(TrackKind::Audio).map(|t| t.id), Some(audio_track));
        assert_eq!(tl.clip_count(), 1);
        assert!(tl.locate_clip(Uuid::new_v4()).is_none());
    }

    #[test]
    fn serde_roundtrip_timeline() {
        let mut tl = Timeline::with_default_tracks();
        let mut audio = Clip::audio(Uuid::new_v4(), "music.mp3", TimeUs(0), TimeUs(8_000_000));
        audio.set_depth(Some(1));
        tl.tracks[1].clips.push(audio);
        tl.tracks[0]
            .clips
            .push(Clip::video(Uuid::new_v4(), "intro.mp4", TimeUs(0), TimeUs(3_000_000)));

        let json = serde_json::to_string(&tl).unwrap();
        let back: Timeline = serde_json::from_str(&json).unwrap();
        assert_eq!(tl, back);
    }

    #[test]
    fn clip_kind_json_shape() {
        let json = r#"{"type":"audio","depth":2}"#;
        let kind: ClipKind = serde_json::from_str(json).unwrap();
        assert_eq!(
            kind,
            ClipKind::Audio {
                depth: Some(2),
                muted: false
            }
        );
        let video: ClipKind = serde_json::from_str(r#"{"type":"video"}"#).unwrap();
        assert_eq!(video, ClipKind::Video);
    }
}
