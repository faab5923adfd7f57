//! End-to-end editing scenarios driven through the public `Editor` API.

use cutline_core::depth::calculate_clip_depths;
use cutline_core::trim_limits::TrimSide;
use cutline_core::types::{Interval, MediaRef, TimeUs, Timeline};
use cutline_core::{Editor, EngineConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

fn s(secs: i64) -> TimeUs {
    TimeUs(secs * 1_000_000)
}

fn media(url: &str, secs: i64) -> MediaRef {
    MediaRef {
        source_id: Uuid::new_v4(),
        url: url.to_string(),
        duration: Some(s(secs)),
    }
}

struct Fixture {
    editor: Editor,
    video: Uuid,
    audio: Uuid,
}

fn fixture() -> Fixture {
    let editor = Editor::new(Timeline::with_default_tracks(), EngineConfig::default());
    let video = editor.timeline().tracks[0].id;
    let audio = editor.timeline().tracks[1].id;
    Fixture { editor, video, audio }
}

fn interval(editor: &Editor, id: Uuid) -> Interval {
    editor.timeline().find_clip(id).unwrap().occupied_interval()
}

// ---------------------------------------------------------------------------
// Exact undo
// ---------------------------------------------------------------------------

#[test]
fn every_command_kind_undoes_to_identical_timeline() {
    let mut f = fixture();
    let a = f.editor.add_clip(f.video, &media("a.mp4", 10), s(0)).unwrap();
    let b = f.editor.add_clip(f.video, &media("b.mp4", 5), s(20)).unwrap();
    let c = f.editor.add_clip(f.video, &media("c.mp4", 4), s(30)).unwrap();
    let m = f.editor.add_clip(f.audio, &media("m.wav", 8), s(2)).unwrap();

    type Edit = Box<dyn Fn(&mut Editor)>;
    let video = f.video;
    let edits: Vec<(&str, Edit)> = vec![
        ("add", Box::new(move |e: &mut Editor| {
            e.add_clip(video, &media("d.mp4", 3), s(40)).unwrap();
        })),
        ("remove middle", Box::new(move |e: &mut Editor| e.remove_clip(b).unwrap())),
        ("move with auto-trim", Box::new(move |e: &mut Editor| e.move_clip(b, s(8), None).unwrap())),
        ("move audio lane", Box::new(move |e: &mut Editor| e.move_clip(m, s(3), Some(2)).unwrap())),
        ("trim start", Box::new(move |e: &mut Editor| e.trim_clip(c, TrimSide::Start, s(1)).unwrap())),
        ("trim end", Box::new(move |e: &mut Editor| e.trim_clip(a, TrimSide::End, s(2)).unwrap())),
        ("split", Box::new(move |e: &mut Editor| {
            e.split_clip(a, s(4)).unwrap();
        })),
        ("mute", Box::new(move |e: &mut Editor| e.set_muted(m, true).unwrap())),
        ("batch delete", Box::new(move |e: &mut Editor| {
            e.delete_clips(&[c, a, m]).unwrap();
        })),
        ("paste", Box::new(move |e: &mut Editor| {
            let entries = e.copy_clips(&[a, m]);
            e.paste_clips(&entries, s(50)).unwrap();
        })),
        ("external", Box::new(move |e: &mut Editor| {
            e.external_edit("agent rewrite", |t| {
                t.remove_clip(c)?;
                let clip = t.find_clip_mut(b).unwrap();
                clip.timestamp = s(12);
                Ok(())
            })
            .unwrap();
        })),
    ];

    for (name, edit) in edits {
        let before = f.editor.timeline().clone();
        edit(&mut f.editor);
        let after = f.editor.timeline().clone();
        assert_ne!(before, after, "{name} changed nothing");

        assert!(f.editor.undo().unwrap());
        assert_eq!(f.editor.timeline(), &before, "{name} did not undo exactly");
        assert!(f.editor.redo().unwrap());
        assert_eq!(f.editor.timeline(), &after, "{name} did not redo exactly");
        assert!(f.editor.undo().unwrap());
    }
}

// ---------------------------------------------------------------------------
// Worked scenarios
// ---------------------------------------------------------------------------

#[test]
fn moving_into_a_neighbour_trims_it() {
    let mut f = fixture();
    let a = f.editor.add_clip(f.video, &media("a.mp4", 10), s(0)).unwrap();
    let b = f.editor.add_clip(f.video, &media("b.mp4", 5), s(20)).unwrap();

    f.editor.move_clip(b, s(8), None).unwrap();
    assert_eq!(f.editor.timeline().find_clip(a).unwrap().trim_end, s(2));
    assert_eq!(interval(&f.editor, a), Interval::new(s(0), s(8)));
    assert_eq!(interval(&f.editor, b), Interval::new(s(8), s(13)));
    assert_eq!(f.editor.history().entries().len(), 3);

    f.editor.undo().unwrap();
    assert_eq!(interval(&f.editor, a), Interval::new(s(0), s(10)));
    assert_eq!(interval(&f.editor, b), Interval::new(s(20), s(25)));
}

#[test]
fn batch_delete_is_one_step_and_restores_order() {
    let mut f = fixture();
    let v1 = f.editor.add_clip(f.video, &media("v1.mp4", 2), s(0)).unwrap();
    let keep = f.editor.add_clip(f.video, &media("keep.mp4", 2), s(3)).unwrap();
    let v2 = f.editor.add_clip(f.video, &media("v2.mp4", 2), s(6)).unwrap();
    let a1 = f.editor.add_clip(f.audio, &media("a1.wav", 2), s(0)).unwrap();
    let before = f.editor.timeline().clone();

    assert_eq!(f.editor.delete_clips(&[v2, a1, v1]).unwrap(), 3);
    assert_eq!(f.editor.timeline().clip_count(), 1);
    assert!(f.editor.timeline().find_clip(keep).is_some());
    assert_eq!(f.editor.history().undo_description(), Some("Delete 3 clips"));

    f.editor.undo().unwrap();
    assert_eq!(f.editor.timeline(), &before);
}

#[test]
fn paste_keeps_relative_offsets() {
    let mut f = fixture();
    let x = f.editor.add_clip(f.video, &media("x.mp4", 2), s(0)).unwrap();
    let y = f.editor.add_clip(f.video, &media("y.mp4", 2), s(3)).unwrap();
    let entries = f.editor.copy_clips(&[y, x]);

    let pasted = f.editor.paste_clips(&entries, s(20)).unwrap();
    let mut starts: Vec<TimeUs> = pasted
        .iter()
        .map(|id| f.editor.timeline().find_clip(*id).unwrap().timestamp)
        .collect();
    starts.sort();
    assert_eq!(starts, vec![s(20), s(23)]);

    f.editor.undo().unwrap();
    assert_eq!(f.editor.timeline().clip_count(), 2);
    assert!(pasted.iter().all(|id| f.editor.timeline().find_clip(*id).is_none()));
}

#[test]
fn overlapping_audio_gets_stacked_lanes() {
    let mut f = fixture();
    let a = f.editor.add_clip(f.audio, &media("a.wav", 10), s(0)).unwrap();
    let b = f.editor.add_clip(f.audio, &media("b.wav", 10), s(5)).unwrap();
    let c = f.editor.add_clip(f.audio, &media("c.wav", 3), s(12)).unwrap();

    let depths = f.editor.clip_depths(f.audio).unwrap();
    assert_eq!(depths[&a], 0);
    assert_eq!(depths[&b], 1);
    assert_eq!(depths[&c], 0);
    assert_eq!(
        calculate_clip_depths(&f.editor.timeline().tracks[1].clips),
        depths
    );
}

#[test]
fn backfilled_duration_survives_undo_and_redo() {
    let mut f = fixture();
    let source = MediaRef {
        source_id: Uuid::new_v4(),
        url: "long.mp4".into(),
        duration: None,
    };
    let clip = f.editor.add_clip(f.video, &source, s(0)).unwrap();
    f.editor.trim_clip(clip, TrimSide::End, s(1)).unwrap();

    assert_eq!(f.editor.backfill_duration(source.source_id, s(60)).unwrap(), 1);
    assert_eq!(interval(&f.editor, clip), Interval::new(s(0), s(4)));

    f.editor.undo().unwrap();
    assert_eq!(f.editor.timeline().find_clip(clip).unwrap().duration, s(60));
    assert_eq!(interval(&f.editor, clip), Interval::new(s(0), s(5)));
    f.editor.redo().unwrap();
    assert_eq!(interval(&f.editor, clip), Interval::new(s(0), s(4)));
}

// ---------------------------------------------------------------------------
// Invariants under a long edit session
// ---------------------------------------------------------------------------

fn random_time(rng: &mut StdRng, max_secs: i64) -> TimeUs {
    TimeUs(rng.gen_range(0..max_secs * 10) * 100_000)
}

#[test]
fn invariants_hold_through_mixed_edits() {
    let mut f = fixture();
    let initial = f.editor.timeline().clone();
    let mut rng = StdRng::seed_from_u64(0x9e37_79b9_7f4a_7c15);

    for _ in 0..80 {
        let ids: Vec<Uuid> = f
            .editor
            .timeline()
            .tracks
            .iter()
            .flat_map(|t| t.clips.iter().map(|c| c.id))
            .collect();
        let pick = |rng: &mut StdRng| ids.get(rng.gen_range(0..ids.len().max(1))).copied();

        // Failures are expected; they must leave the timeline valid.
        let _ = match rng.gen_range(0..8) {
            0 | 1 => {
                let track = if rng.gen_bool(0.5) { f.video } else { f.audio };
                let len = rng.gen_range(1..=8);
                let at = random_time(&mut rng, 40);
                f.editor.add_clip(track, &media("r.mp4", len), at).map(|_| ())
            }
            2 => match pick(&mut rng) {
                Some(id) => {
                    let depth = if rng.gen_bool(1.0 / 3.0) { Some(rng.gen_range(0..3)) } else { None };
                    let at = random_time(&mut rng, 40);
                    f.editor.move_clip(id, at, depth)
                }
                None => Ok(()),
            },
            3 => match pick(&mut rng) {
                Some(id) => {
                    let side = if rng.gen_bool(0.5) { TrimSide::Start } else { TrimSide::End };
                    let trim = random_time(&mut rng, 6);
                    f.editor.trim_clip(id, side, trim)
                }
                None => Ok(()),
            },
            4 => match pick(&mut rng) {
                Some(id) => {
                    let at = random_time(&mut rng, 40);
                    f.editor.split_clip(id, at).map(|_| ())
                }
                None => Ok(()),
            },
            5 => {
                let chosen: Vec<Uuid> = (0..2).filter_map(|_| pick(&mut rng)).collect();
                f.editor.delete_clips(&chosen).map(|_| ())
            }
            6 => {
                let chosen: Vec<Uuid> = (0..2).filter_map(|_| pick(&mut rng)).collect();
                let entries = f.editor.copy_clips(&chosen);
                let at = random_time(&mut rng, 60);
                f.editor.paste_clips(&entries, at).map(|_| ())
            }
            _ => {
                if rng.gen_bool(0.5) {
                    f.editor.undo().map(|_| ())
                } else {
                    f.editor.redo().map(|_| ())
                }
            }
        };
        f.editor.timeline().check_invariants().unwrap();
    }

    while f.editor.undo().unwrap() {
        f.editor.timeline().check_invariants().unwrap();
    }
    assert_eq!(f.editor.timeline(), &initial);

    while f.editor.redo().unwrap() {}
    let replayed = f.editor.timeline().clone();
    while f.editor.can_undo() {
        f.editor.undo().unwrap();
    }
    while f.editor.can_redo() {
        f.editor.redo().unwrap();
    }
    assert_eq!(f.editor.timeline(), &replayed);
    assert!(replayed.check_invariants().is_ok());
}
