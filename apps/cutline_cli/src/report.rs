//! Plain-text rendering of timelines, lanes and history.

use cutline_core::depth::{calculate_clip_depths, lane_count};
use cutline_core::types::{Clip, TimeUs, Timeline, TrackKind};
use std::fmt;

use crate::script::{Runner, StepReport};

fn clip_line(f: &mut fmt::Formatter<'_>, clip: &Clip, label: Option<&str>, lane: Option<u32>) -> fmt::Result {
    let interval = clip.occupied_interval();
    write!(f, "  [{} .. {}) {}", interval.start, interval.end, clip.url)?;
    if let Some(label) = label {
        write!(f, " ({label})")?;
    }
    if clip.trim_start != TimeUs::ZERO || clip.trim_end != TimeUs::ZERO {
        write!(f, " trim {}/{}", clip.trim_start, clip.trim_end)?;
    }
    if let Some(lane) = lane {
        write!(f, " lane {lane}")?;
        if clip.depth().is_none() {
            f.write_str(" (auto)")?;
        }
    }
    if clip.muted() == Some(true) {
        f.write_str(" muted")?;
    }
    writeln!(f)
}

fn timeline_lines<'a>(
    f: &mut fmt::Formatter<'_>,
    timeline: &'a Timeline,
    kinds: &[TrackKind],
    label: impl Fn(&'a Clip) -> Option<&'a str>,
) -> fmt::Result {
    for (index, track) in timeline.tracks.iter().enumerate() {
        if !kinds.contains(&track.kind) {
            continue;
        }
        let mut clips: Vec<&Clip> = track.clips.iter().collect();
        clips.sort_by_key(|c| (c.timestamp, c.id));
        match track.kind {
            TrackKind::Video => {
                writeln!(f, "track {index} video ({} clips)", clips.len())?;
                for clip in clips {
                    clip_line(f, clip, label(clip), None)?;
                }
            }
            TrackKind::Audio => {
                let depths = calculate_clip_depths(&track.clips);
                writeln!(
                    f,
                    "track {index} audio ({} clips, {} lanes)",
                    clips.len(),
                    lane_count(&depths)
                )?;
                for clip in clips {
                    clip_line(f, clip, label(clip), depths.get(&clip.id).copied())?;
                }
            }
        }
    }
    Ok(())
}

/// Step results, the final timeline and the history stack.
pub struct Report<'a> {
    runner: &'a Runner,
    steps: &'a [StepReport],
}

impl<'a> Report<'a> {
    pub fn new(runner: &'a Runner, steps: &'a [StepReport]) -> Self {
        Self { runner, steps }
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in self.steps {
            let status = if step.ok { "ok" } else { "FAILED" };
            writeln!(f, "#{:<3} {:<8} {status}: {}", step.index, step.action, step.detail)?;
        }
        writeln!(f)?;

        let editor = self.runner.editor();
        timeline_lines(f, editor.timeline(), &[TrackKind::Video, TrackKind::Audio], |clip| {
            self.runner.label_of(clip.id)
        })?;

        let history = editor.history();
        writeln!(
            f,
            "\nhistory ({} entries{})",
            history.entries().len(),
            if history.is_dirty() { ", unsaved" } else { "" }
        )?;
        for (i, command) in history.entries().iter().enumerate() {
            let marker = if i + 1 == history.cursor() { ">" } else { " " };
            writeln!(
                f,
                "{marker} {} {:?} {}",
                command.timestamp.format("%H:%M:%S"),
                command.kind(),
                command.description
            )?;
        }
        Ok(())
    }
}

/// Audio lane assignment for every audio track.
pub struct Depths<'a>(pub &'a Timeline);

impl fmt::Display for Depths<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        timeline_lines(f, self.0, &[TrackKind::Audio], |_| None)
    }
}
