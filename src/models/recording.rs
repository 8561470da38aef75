// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Recording discovery.
//!
//! A recording is one video file plus the optional audio and velocity files
//! captured with it. Files are matched through a recording key: the video
//! file stem with any camera suffix removed, so that `trial3_cam1.mp4` and
//! `trial3_cam2.mp4` share `trial3.json`, `trial3.wav` and `trial3.csv`.

use crate::config::Settings;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// The files that make up one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub video: PathBuf,
    pub audio: Option<PathBuf>,
    pub velocity: Option<PathBuf>,
    pub sidecar: PathBuf,
}

impl Recording {
    /// File name of the video, as stored in the sidecar.
    pub fn video_file_name(&self) -> String {
        file_name(&self.video)
    }

    pub fn audio_file_name(&self) -> Option<String> {
        self.audio.as_deref().map(file_name)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Folders to search for recordings.
#[derive(Debug, Clone, Default)]
pub struct Folders {
    pub video_dir: PathBuf,
    pub audio_dir: Option<PathBuf>,
    pub velocity_dir: Option<PathBuf>,
    /// Where sidecars live; defaults to the video folder.
    pub annotations_dir: Option<PathBuf>,
}

/// Camera-independent key of a video file name.
pub fn recording_key(video_file_name: &str) -> String {
    let stem = Path::new(video_file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let lower = stem.to_lowercase();

    let key = if lower.contains("cam1") {
        lower.replace("cam1", "")
    } else if lower.contains("cam2") {
        lower.replace("cam2", "")
    } else {
        stem
    };

    key.trim_matches(|c| c == ' ' || c == '_' || c == '-').to_string()
}

/// Sidecar JSON file name for a video file name.
pub fn sidecar_file_name(video_file_name: &str) -> String {
    format!("{}.json", recording_key(video_file_name))
}

/// List the recordings in `folders.video_dir`, sorted by file name.
pub fn discover(folders: &Folders, settings: &Settings) -> Result<Vec<Recording>> {
    let mut videos = list_files(&folders.video_dir, |p| settings.is_video_file(p))?;
    videos.sort();

    let audio_files = match &folders.audio_dir {
        Some(dir) => list_files(dir, |p| has_extension(p, &["wav"]))?,
        None => Vec::new(),
    };
    let velocity_files = match &folders.velocity_dir {
        Some(dir) => list_files(dir, |p| has_extension(p, &["csv"]))?,
        None => Vec::new(),
    };

    let sidecar_dir = folders
        .annotations_dir
        .clone()
        .unwrap_or_else(|| folders.video_dir.clone());

    let recordings = videos
        .into_iter()
        .map(|video| {
            let name = file_name(&video);
            let key = recording_key(&name);
            let audio = find_companion(&key, &audio_files);
            let velocity = find_companion(&key, &velocity_files);
            if folders.audio_dir.is_some() && audio.is_none() {
                log::warn!("No audio file found for {}", name);
            }
            Recording {
                sidecar: sidecar_dir.join(sidecar_file_name(&name)),
                video,
                audio,
                velocity,
            }
        })
        .collect();

    Ok(recordings)
}

/// Find the file whose stem matches `key`, falling back to the first stem
/// that continues `key` with a separator (`trial1` matches `trial1_mic`,
/// never `trial10`).
fn find_companion(key: &str, candidates: &[PathBuf]) -> Option<PathBuf> {
    if key.is_empty() {
        return None;
    }
    let key = key.to_lowercase();
    let stem_of = |p: &PathBuf| {
        p.file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    };
    let extends_key = |stem: &str| {
        stem.strip_prefix(key.as_str())
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| matches!(c, '_' | '-' | ' '))
    };

    candidates
        .iter()
        .find(|p| stem_of(p) == key)
        .or_else(|| candidates.iter().find(|p| extends_key(stem_of(p).as_str())))
        .cloned()
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn list_files(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read folder {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        // Hidden files include in-progress transcodes
        let hidden = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'));
        if !hidden && path.is_file() && keep(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_key_strips_camera_suffix() {
        assert_eq!(recording_key("Trial3_Cam1.mp4"), "trial3");
        assert_eq!(recording_key("trial3-cam2.webm"), "trial3");
        assert_eq!(recording_key("cam1 session"), "session");
    }

    #[test]
    fn test_recording_key_keeps_case_without_camera() {
        assert_eq!(recording_key("Subject_A.mp4"), "Subject_A");
        assert_eq!(recording_key("_Subject_A-.mp4"), "Subject_A");
    }

    #[test]
    fn test_sidecar_file_name() {
        assert_eq!(sidecar_file_name("run_07_cam1.mp4"), "run_07.json");
        assert_eq!(sidecar_file_name("run_07_cam2.mp4"), "run_07.json");
    }

    #[test]
    fn test_discover_pairs_companion_files() {
        let root = tempfile::tempdir().unwrap();
        let video_dir = root.path().join("video");
        let audio_dir = root.path().join("audio");
        let velocity_dir = root.path().join("velocity");
        for dir in [&video_dir, &audio_dir, &velocity_dir] {
            std::fs::create_dir(dir).unwrap();
        }
        for name in ["b_cam2.mp4", "a_cam1.MP4", "notes.txt", "c.webm", ".timed_a1b2_tmp.mp4"] {
            std::fs::write(video_dir.join(name), b"").unwrap();
        }
        std::fs::write(audio_dir.join("a.wav"), b"").unwrap();
        std::fs::write(audio_dir.join("b_mic.wav"), b"").unwrap();
        std::fs::write(velocity_dir.join("A.csv"), b"").unwrap();

        let folders = Folders {
            video_dir: video_dir.clone(),
            audio_dir: Some(audio_dir.clone()),
            velocity_dir: Some(velocity_dir.clone()),
            annotations_dir: None,
        };
        let recordings = discover(&folders, &Settings::default()).unwrap();

        assert_eq!(recordings.len(), 3);
        assert_eq!(recordings[0].video_file_name(), "a_cam1.MP4");
        assert_eq!(recordings[0].audio, Some(audio_dir.join("a.wav")));
        assert_eq!(recordings[0].velocity, Some(velocity_dir.join("A.csv")));
        assert_eq!(recordings[0].sidecar, video_dir.join("a.json"));

        assert_eq!(recordings[1].audio, Some(audio_dir.join("b_mic.wav")));
        assert!(recordings[1].velocity.is_none());

        assert_eq!(recordings[2].video_file_name(), "c.webm");
        assert!(recordings[2].audio.is_none());
    }

    #[test]
    fn test_companion_needs_separator_after_key() {
        let candidates = vec![PathBuf::from("/a/trial10.wav"), PathBuf::from("/a/trial2.wav")];
        assert_eq!(find_companion("trial1", &candidates), None);
        assert_eq!(find_companion("", &candidates), None);
        assert_eq!(
            find_companion("trial2", &candidates),
            Some(PathBuf::from("/a/trial2.wav"))
        );

        let candidates = vec![PathBuf::from("/a/trial10.wav"), PathBuf::from("/a/Trial1-left.wav")];
        assert_eq!(
            find_companion("trial1", &candidates),
            Some(PathBuf::from("/a/Trial1-left.wav"))
        );
    }

    #[test]
    fn test_discover_uses_annotations_dir() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("x_cam1.mp4"), b"").unwrap();
        let folders = Folders {
            video_dir: root.path().to_path_buf(),
            annotations_dir: Some(root.path().join("json")),
            ..Default::default()
        };
        let recordings = discover(&folders, &Settings::default()).unwrap();
        assert_eq!(recordings[0].sidecar, root.path().join("json").join("x.json"));
    }

    #[test]
    fn test_discover_missing_folder_is_error() {
        let folders = Folders {
            video_dir: PathBuf::from("/definitely/not/here"),
            ..Default::default()
        };
        assert!(discover(&folders, &Settings::default()).is_err());
    }
}
