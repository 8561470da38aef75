// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Sidecar JSON serialization.
//!
//! Sidecars are merged rather than overwritten: the file is read as a
//! generic JSON object so that keys written by other tools (or by the other
//! camera of the same recording) survive a save.

use crate::models::annotation::{EventMark, EventMarks};
use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};
use std::path::Path;

pub const VIDEO_FILE: &str = "video_file";
pub const AUDIO_FILE: &str = "audio_file";
pub const VIDEO_ANNOTATIONS: &str = "video_annotations";
pub const AUDIO_ANNOTATIONS: &str = "audio_annotations";

/// Read a sidecar as a JSON object. A missing file yields an empty object.
pub fn read_sidecar(path: &Path) -> Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    match serde_json::from_str::<Value>(&json)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?
    {
        Value::Object(map) => Ok(map),
        _ => bail!("{} does not contain a JSON object", path.display()),
    }
}

/// Extract the stored event marks of a sidecar into `slot_count` slots.
///
/// Entries with a null or missing frame/time are skipped, as are slot
/// numbers outside the range.
pub fn existing_marks(sidecar: &Map<String, Value>, slot_count: usize) -> EventMarks {
    let Some(Value::Object(video)) = sidecar.get(VIDEO_ANNOTATIONS) else {
        return EventMarks::new(slot_count);
    };
    let audio = match sidecar.get(AUDIO_ANNOTATIONS) {
        Some(Value::Object(audio)) => Some(audio),
        _ => None,
    };

    let stored = video.iter().filter_map(|(key, entry)| {
        let number = key.parse::<usize>().ok()?;
        let frame = entry.get("frame").and_then(Value::as_u64)?;
        let time = entry.get("time").and_then(Value::as_f64)?;
        let audio_sample = audio
            .and_then(|a| a.get(key))
            .and_then(|e| e.get("sample"))
            .and_then(Value::as_u64);
        Some((
            number,
            EventMark {
                frame,
                time,
                audio_sample,
            },
        ))
    });
    EventMarks::from_stored(slot_count, stored)
}

/// Merge the session's marks into an existing sidecar object.
pub fn merge_marks(
    existing: &mut Map<String, Value>,
    video_file: &str,
    audio_file: Option<&str>,
    marks: &EventMarks,
) {
    existing.insert(VIDEO_FILE.to_string(), Value::from(video_file));
    if let Some(audio_file) = audio_file {
        existing.insert(AUDIO_FILE.to_string(), Value::from(audio_file));
    }

    with_object(existing, VIDEO_ANNOTATIONS, |video| {
        for (number, mark) in marks.iter() {
            let entry = match mark {
                Some(m) => json!({ "frame": m.frame, "time": m.time }),
                None => json!({ "frame": null, "time": null }),
            };
            video.insert(number.to_string(), entry);
        }
    });

    // Slots without a sample drop any stale audio entry
    let any_audio = marks
        .iter()
        .any(|(_, m)| m.map_or(false, |m| m.audio_sample.is_some()));
    if any_audio || existing.contains_key(AUDIO_ANNOTATIONS) {
        with_object(existing, AUDIO_ANNOTATIONS, |audio| {
            for (number, mark) in marks.iter() {
                match mark.and_then(|m| m.audio_sample.map(|s| (s, m.time))) {
                    Some((sample, time)) => {
                        audio.insert(number.to_string(), json!({ "sample": sample, "time": time }));
                    }
                    None => {
                        audio.remove(&number.to_string());
                    }
                }
            }
        });
    }
}

/// Run `f` on the object stored under `key`, replacing any non-object value.
fn with_object(map: &mut Map<String, Value>, key: &str, f: impl FnOnce(&mut Map<String, Value>)) {
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        log::warn!("Replacing non-object '{}' in sidecar", key);
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(obj) = slot {
        f(obj);
    }
}

/// Read, merge and write the sidecar at `path`.
pub fn save_marks(
    path: &Path,
    video_file: &str,
    audio_file: Option<&str>,
    marks: &EventMarks,
) -> Result<()> {
    let mut sidecar = read_sidecar(path)?;
    merge_marks(&mut sidecar, video_file, audio_file, marks);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(&Value::Object(sidecar))?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marks_with(frames: &[(u64, f64)]) -> EventMarks {
        let mut marks = EventMarks::new(4);
        for (i, (frame, time)) in frames.iter().enumerate() {
            marks.set(i + 1, EventMark::new(*frame, *time));
        }
        marks
    }

    #[test]
    fn test_merge_preserves_unrelated_keys() {
        let mut existing = match json!({
            "subject": "P07",
            "video_file": "old.mp4",
            "video_annotations": { "extra": {"frame": 1, "time": 0.1}, "1": {"frame": 5, "time": 0.2} },
        }) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };

        merge_marks(&mut existing, "trial_cam2.mp4", None, &marks_with(&[(30, 1.0)]));

        assert_eq!(existing["subject"], "P07");
        assert_eq!(existing["video_file"], "trial_cam2.mp4");
        let video = &existing["video_annotations"];
        assert_eq!(video["extra"]["frame"], 1);
        assert_eq!(video["1"]["frame"], 30);
        assert_eq!(video["1"]["time"], 1.0);
        assert!(video["2"]["frame"].is_null());
        assert!(video["4"]["time"].is_null());
        assert!(existing.get("audio_annotations").is_none());
        assert!(existing.get("audio_file").is_none());
    }

    #[test]
    fn test_merge_writes_audio_annotations() {
        let mut marks = EventMarks::new(2);
        marks.set(1, EventMark::new(30, 1.0).with_sample_rate(16_000));
        let mut sidecar = Map::new();
        merge_marks(&mut sidecar, "a.mp4", Some("a.wav"), &marks);

        assert_eq!(sidecar["audio_file"], "a.wav");
        assert_eq!(sidecar["audio_annotations"]["1"]["sample"], 16_000);
        assert_eq!(sidecar["audio_annotations"]["1"]["time"], 1.0);
        assert!(sidecar["audio_annotations"].get("2").is_none());
    }

    #[test]
    fn test_merge_without_audio_drops_stale_samples() {
        let mut sidecar = Map::new();
        let mut marks = EventMarks::new(2);
        marks.set(1, EventMark::new(30, 1.0).with_sample_rate(1000));
        merge_marks(&mut sidecar, "a.mp4", Some("a.wav"), &marks);
        assert_eq!(sidecar["audio_annotations"]["1"]["sample"], 1000);

        let mut moved = EventMarks::new(2);
        moved.set(1, EventMark::new(90, 3.0));
        merge_marks(&mut sidecar, "a.mp4", None, &moved);
        assert_eq!(sidecar["audio_file"], "a.wav");

        let reloaded = existing_marks(&sidecar, 2);
        assert_eq!(reloaded.get(1), Some(&EventMark::new(90, 3.0)));
        assert_eq!(reloaded.get(1).and_then(|m| m.audio_sample), None);
    }

    #[test]
    fn test_merge_replaces_non_object_annotations() {
        let mut sidecar = Map::new();
        sidecar.insert(VIDEO_ANNOTATIONS.to_string(), Value::from("broken"));
        merge_marks(&mut sidecar, "a.mp4", None, &marks_with(&[(1, 0.5)]));
        assert_eq!(sidecar["video_annotations"]["1"]["frame"], 1);
    }

    #[test]
    fn test_save_then_restore_reproduces_marks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("trial.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"notes": "keep me"}"#).unwrap();

        let mut marks = EventMarks::new(4);
        marks.set(1, EventMark::new(101, 3.366_666_666_666_667).with_sample_rate(44_100));
        marks.set(2, EventMark::new(250, 8.333_333_333_333_334).with_sample_rate(44_100));
        save_marks(&path, "trial_cam1.mp4", Some("trial.wav"), &marks).unwrap();

        let sidecar = read_sidecar(&path).unwrap();
        assert_eq!(sidecar["notes"], "keep me");

        let stored = existing_marks(&sidecar, 4);
        assert_eq!(stored.get(1), marks.get(1));
        assert_eq!(stored.get(2), marks.get(2));
        assert!(stored.get(3).is_none());

        let mut session = EventMarks::new(4);
        session.restore(2, stored.get(2).unwrap());
        assert_eq!(session.get(2).unwrap().frame, 250);
        assert_eq!(session.get(2).unwrap().time, 8.333_333_333_333_334);
    }

    #[test]
    fn test_existing_marks_skips_incomplete_entries() {
        let sidecar = match json!({
            "video_annotations": {
                "1": {"frame": 10, "time": 0.5},
                "2": {"frame": null, "time": null},
                "x": {"frame": 3, "time": 0.1},
                "9": {"frame": 99, "time": 9.9}
            }
        }) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let marks = existing_marks(&sidecar, 8);
        assert_eq!(marks.get(1), Some(&EventMark::new(10, 0.5)));
        assert!(marks.get(2).is_none());
        assert_eq!(marks.iter().filter(|(_, m)| m.is_some()).count(), 1);
    }

    #[test]
    fn test_read_sidecar_missing_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.json");
        assert!(read_sidecar(&path).unwrap().is_empty());

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(read_sidecar(&path).is_err());

        std::fs::write(&path, "{not json").unwrap();
        assert!(read_sidecar(&path).is_err());
    }

    #[test]
    fn test_save_creates_annotations_folder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations").join("x.json");
        save_marks(&path, "x.mp4", None, &marks_with(&[(3, 0.1)])).unwrap();
        assert!(path.exists());
    }
}
