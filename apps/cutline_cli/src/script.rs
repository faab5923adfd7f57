//! Edit scripts: a JSON list of steps replayed against an [`Editor`], standing
//! in for the UI and the agent. Clips and sources are referred to by labels
//! chosen in the script (or by raw uuid); times are in seconds.

use anyhow::{anyhow, bail, Context, Result};
use cutline_core::batch::ClipboardEntry;
use cutline_core::gesture::{GestureFeedback, GestureOutcome};
use cutline_core::trim_limits::TrimSide;
use cutline_core::types::{MediaRef, Placement, TimeUs};
use cutline_core::{CoreError, Editor};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing script {}", path.display()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Add {
        /// Index into the timeline's tracks.
        track: usize,
        url: String,
        /// Source label; clips added with the same label share a source.
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        duration: Option<f64>,
        at: f64,
        #[serde(rename = "as", default)]
        label: Option<String>,
    },
    Remove {
        clip: String,
    },
    Move {
        clip: String,
        at: f64,
        #[serde(default)]
        depth: Option<u32>,
    },
    Trim {
        clip: String,
        side: TrimSide,
        trim: f64,
    },
    Split {
        clip: String,
        at: f64,
        #[serde(rename = "as", default)]
        label: Option<String>,
    },
    Mute {
        clip: String,
        #[serde(default = "default_true")]
        muted: bool,
    },
    Delete {
        clips: Vec<String>,
    },
    Copy {
        clips: Vec<String>,
    },
    Paste {
        at: f64,
        #[serde(rename = "as", default)]
        labels: Vec<String>,
    },
    Undo,
    Redo,
    /// Pointer positions for a drag, then release (or cancel).
    Drag {
        clip: String,
        path: Vec<f64>,
        #[serde(default)]
        depth: Option<u32>,
        #[serde(default)]
        cancel: bool,
    },
    /// Edge positions for a resize, then release (or cancel).
    Resize {
        clip: String,
        side: TrimSide,
        path: Vec<f64>,
        #[serde(default)]
        cancel: bool,
    },
    Backfill {
        source: String,
        duration: f64,
    },
    /// Bulk rewrite recorded as one history entry.
    Agent {
        description: String,
        edits: Vec<AgentEdit>,
    },
    Save,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "edit", rename_all = "snake_case")]
pub enum AgentEdit {
    Place {
        clip: String,
        at: f64,
        #[serde(default)]
        trim_start: f64,
        #[serde(default)]
        trim_end: f64,
    },
    Remove {
        clip: String,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Add { .. } => "add",
            Step::Remove { .. } => "remove",
            Step::Move { .. } => "move",
            Step::Trim { .. } => "trim",
            Step::Split { .. } => "split",
            Step::Mute { .. } => "mute",
            Step::Delete { .. } => "delete",
            Step::Copy { .. } => "copy",
            Step::Paste { .. } => "paste",
            Step::Undo => "undo",
            Step::Redo => "redo",
            Step::Drag { .. } => "drag",
            Step::Resize { .. } => "resize",
            Step::Backfill { .. } => "backfill",
            Step::Agent { .. } => "agent",
            Step::Save => "save",
        }
    }
}

/// What happened to one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub index: usize,
    pub action: &'static str,
    pub detail: String,
    pub ok: bool,
}

fn secs(s: f64) -> TimeUs {
    TimeUs::from_seconds(s)
}

/// Replays steps against an editor, keeping track of labels and the clipboard.
pub struct Runner {
    editor: Editor,
    clips: HashMap<String, Uuid>,
    sources: HashMap<String, Uuid>,
    clipboard: Vec<ClipboardEntry>,
}

impl Runner {
    pub fn new(editor: Editor) -> Self {
        Self {
            editor,
            clips: HashMap::new(),
            sources: HashMap::new(),
            clipboard: Vec::new(),
        }
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    /// Label for a clip id, if the script named it.
    pub fn label_of(&self, clip_id: Uuid) -> Option<&str> {
        self.clips
            .iter()
            .find(|(_, id)| **id == clip_id)
            .map(|(label, _)| label.as_str())
    }

    fn clip(&self, name: &str) -> Result<Uuid> {
        if let Some(id) = self.clips.get(name) {
            return Ok(*id);
        }
        Uuid::parse_str(name).map_err(|_| anyhow!("unknown clip label {name:?}"))
    }

    fn source(&mut self, name: Option<&str>) -> Uuid {
        match name {
            Some(name) => *self.sources.entry(name.to_string()).or_insert_with(Uuid::new_v4),
            None => Uuid::new_v4(),
        }
    }

    fn track(&self, index: usize) -> Result<Uuid> {
        self.editor
            .timeline()
            .tracks
            .get(index)
            .map(|t| t.id)
            .ok_or_else(|| anyhow!("no track at index {index}"))
    }

    fn remember(&mut self, label: Option<&String>, id: Uuid) {
        if let Some(label) = label {
            self.clips.insert(label.clone(), id);
        }
    }

    /// Run every step. Failed steps are reported and skipped, unless `strict`
    /// is set, in which case the first failure aborts the run.
    pub fn run(&mut self, script: &Script, strict: bool) -> Result<Vec<StepReport>> {
        let mut reports = Vec::with_capacity(script.steps.len());
        for (index, step) in script.steps.iter().enumerate() {
            let action = step.name();
            match self.apply(step) {
                Ok(detail) => {
                    debug!(index, action, %detail, "step applied");
                    reports.push(StepReport {
                        index,
                        action,
                        detail,
                        ok: true,
                    });
                }
                Err(e) if strict => return Err(e.context(format!("step {index} ({action})"))),
                Err(e) => {
                    warn!(index, action, error = %e, "step failed");
                    reports.push(StepReport {
                        index,
                        action,
                        detail: format!("{e:#}"),
                        ok: false,
                    });
                }
            }
        }
        Ok(reports)
    }

    fn apply(&mut self, step: &Step) -> Result<String> {
        match step {
            Step::Add {
                track,
                url,
                source,
                duration,
                at,
                label,
            } => {
                let media = MediaRef {
                    source_id: self.source(source.as_deref()),
                    url: url.clone(),
                    duration: duration.map(secs),
                };
                let track_id = self.track(*track)?;
                let id = self.editor.add_clip(track_id, &media, secs(*at))?;
                self.remember(label.as_ref(), id);
                Ok(format!("added {id}"))
            }
            Step::Remove { clip } => {
                self.editor.remove_clip(self.clip(clip)?)?;
                Ok(format!("removed {clip}"))
            }
            Step::Move { clip, at, depth } => {
                self.editor.move_clip(self.clip(clip)?, secs(*at), *depth)?;
                Ok(format!("moved {clip} to {}", secs(*at)))
            }
            Step::Trim { clip, side, trim } => {
                self.editor.trim_clip(self.clip(clip)?, *side, secs(*trim))?;
                Ok(format!("trimmed {clip} {side:?}"))
            }
            Step::Split { clip, at, label } => {
                let right = self.editor.split_clip(self.clip(clip)?, secs(*at))?;
                self.remember(label.as_ref(), right);
                Ok(format!("split {clip} at {}", secs(*at)))
            }
            Step::Mute { clip, muted } => {
                self.editor.set_muted(self.clip(clip)?, *muted)?;
                Ok(format!("{clip} muted={muted}"))
            }
            Step::Delete { clips } => {
                let ids = clips.iter().map(|c| self.clip(c)).collect::<Result<Vec<_>>>()?;
                let count = self.editor.delete_clips(&ids)?;
                Ok(format!("deleted {count} clips"))
            }
            Step::Copy { clips } => {
                let ids = clips.iter().map(|c| self.clip(c)).collect::<Result<Vec<_>>>()?;
                self.clipboard = self.editor.copy_clips(&ids);
                Ok(format!("copied {} clips", self.clipboard.len()))
            }
            Step::Paste { at, labels } => {
                let ids = self.editor.paste_clips(&self.clipboard, secs(*at))?;
                for (label, id) in labels.iter().zip(&ids) {
                    self.clips.insert(label.clone(), *id);
                }
                Ok(format!("pasted {} clips at {}", ids.len(), secs(*at)))
            }
            Step::Undo => {
                let done = self.editor.undo()?;
                Ok(String::from(if done { "undone" } else { "nothing to undo" }))
            }
            Step::Redo => {
                let done = self.editor.redo()?;
                Ok(String::from(if done { "redone" } else { "nothing to redo" }))
            }
            Step::Drag {
                clip,
                path,
                depth,
                cancel,
            } => {
                let id = self.clip(clip)?;
                self.editor.begin_drag(id)?;
                let last = self.follow(path, |editor, t| editor.drag_to(secs(t), *depth));
                self.release(last, *cancel)
            }
            Step::Resize {
                clip,
                side,
                path,
                cancel,
            } => {
                let id = self.clip(clip)?;
                self.editor.begin_resize(id, *side)?;
                let last = self.follow(path, |editor, t| editor.resize_to(secs(t)));
                self.release(last, *cancel)
            }
            Step::Backfill { source, duration } => {
                let source_id = *self
                    .sources
                    .get(source)
                    .ok_or_else(|| anyhow!("unknown source label {source:?}"))?;
                let count = self.editor.backfill_duration(source_id, secs(*duration))?;
                Ok(format!("back-filled {count} clips"))
            }
            Step::Agent { description, edits } => {
                let resolved = edits
                    .iter()
                    .map(|e| match e {
                        AgentEdit::Place { clip, .. } | AgentEdit::Remove { clip } => {
                            self.clip(clip).map(|id| (id, e))
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                let changed = self.editor.external_edit(description, |timeline| {
                    for (id, edit) in &resolved {
                        match edit {
                            AgentEdit::Place {
                                at,
                                trim_start,
                                trim_end,
                                ..
                            } => timeline.set_clip_placement(
                                *id,
                                Placement::new(secs(*at), secs(*trim_start), secs(*trim_end)),
                            )?,
                            AgentEdit::Remove { .. } => {
                                timeline.remove_clip(*id)?;
                            }
                        }
                    }
                    Ok(())
                })?;
                Ok(String::from(if changed { "recorded" } else { "no change" }))
            }
            Step::Save => {
                self.editor.mark_clean();
                Ok("marked clean".into())
            }
        }
    }

    /// Feed pointer positions to a live gesture, stopping at the first error.
    fn follow<F>(&mut self, path: &[f64], mut step: F) -> Result<Option<GestureFeedback>, CoreError>
    where
        F: FnMut(&mut Editor, f64) -> Result<GestureFeedback, CoreError>,
    {
        let mut last = None;
        for &t in path {
            last = Some(step(&mut self.editor, t)?);
        }
        Ok(last)
    }

    fn release(&mut self, last: Result<Option<GestureFeedback>, CoreError>, cancel: bool) -> Result<String> {
        let feedback = match last {
            Ok(feedback) => feedback,
            Err(e) => {
                self.editor.cancel_gesture()?;
                bail!(e);
            }
        };
        if cancel {
            self.editor.cancel_gesture()?;
            return Ok("cancelled".into());
        }
        let outcome = self.editor.end_gesture()?;
        let shown = feedback.map_or("no movement".to_string(), |f| {
            format!("valid={} auto_trimmable={}", f.valid, f.auto_trimmable)
        });
        Ok(match outcome {
            GestureOutcome::Committed => format!("committed ({shown})"),
            GestureOutcome::Unchanged => "unchanged".into(),
            GestureOutcome::Reverted => format!("reverted ({shown})"),
        })
    }
}
