// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Per-recording session state.
//!
//! A session owns everything that changes while one recording is on
//! screen: the playback position, recently decoded frames, zoom, and the
//! new and previously stored event marks.

use super::annotation::{format_title, EventMark, EventMarks, SetOutcome};
use super::history::History;
use super::recording::Recording;
use crate::io::media::{VideoInfo, VideoSource};
use crate::io::serialization;
use crate::util::geometry::{zoom_crop, CropRect};
use anyhow::Result;
use image::RgbaImage;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bounded cache of recently decoded frames.
#[derive(Debug)]
pub struct FrameBuffer {
    frames: VecDeque<(u64, Arc<RgbaImage>)>,
    capacity: usize,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, index: u64) -> Option<Arc<RgbaImage>> {
        self.frames
            .iter()
            .rev()
            .find(|(i, _)| *i == index)
            .map(|(_, frame)| Arc::clone(frame))
    }

    pub fn push(&mut self, index: u64, frame: Arc<RgbaImage>) {
        if self.frames.iter().any(|(i, _)| *i == index) {
            return;
        }
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back((index, frame));
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

/// Zoom level and the frame pixel it is centred on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zoom {
    pub level: f32,
    pub center: Option<(u32, u32)>,
}

impl Default for Zoom {
    fn default() -> Self {
        Self {
            level: 1.0,
            center: None,
        }
    }
}

impl Zoom {
    /// Zoom in (`direction > 0`) or out by `step`, towards `cursor`.
    pub fn scroll(&mut self, direction: f32, cursor: Option<(u32, u32)>, step: f32, max: f32) {
        if direction > 0.0 {
            self.level = (self.level + step).min(max);
        } else if direction < 0.0 {
            self.level = (self.level - step).max(1.0);
        } else {
            return;
        }
        if cursor.is_some() {
            self.center = cursor;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn crop(&self, width: u32, height: u32) -> CropRect {
        zoom_crop(width, height, self.level, self.center)
    }
}

/// Direction of a held scrub key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scrub {
    Back,
    Forward,
}

/// State of the recording being annotated.
pub struct Session {
    pub recording: Recording,
    pub info: VideoInfo,
    /// Index of the displayed frame.
    pub position: u64,
    pub paused: bool,
    pub zoom: Zoom,
    pub marks: EventMarks,
    /// Marks read from the sidecar when the session started.
    pub existing: EventMarks,
    /// Whether the marks changed and need saving.
    pub dirty: bool,
    /// Audio sample rate, for deriving sample indices of marks.
    sample_rate: Option<u32>,
    frame: Option<Arc<RgbaImage>>,
    buffer: FrameBuffer,
    history: History,
}

impl Session {
    pub fn new(
        recording: Recording,
        info: VideoInfo,
        existing: EventMarks,
        sample_rate: Option<u32>,
        buffer_len: usize,
    ) -> Self {
        Self {
            recording,
            info,
            position: 0,
            paused: false,
            zoom: Zoom::default(),
            marks: EventMarks::new(existing.slot_count()),
            existing,
            dirty: false,
            sample_rate,
            frame: None,
            buffer: FrameBuffer::new(buffer_len),
            history: History::new(),
        }
    }

    /// Seconds of the displayed frame.
    pub fn current_time(&self) -> f64 {
        self.info.frame_time(self.position)
    }

    pub fn current_frame(&self) -> Option<&Arc<RgbaImage>> {
        self.frame.as_ref()
    }

    /// Display frame `index`, from the buffer if possible.
    ///
    /// Returns false when the frame lies past the end of the video.
    pub fn show(&mut self, source: &mut dyn VideoSource, index: u64) -> Result<bool> {
        let frame = match self.buffer.get(index) {
            Some(frame) => frame,
            None => match source.read_frame(index)? {
                Some(image) => {
                    let frame = Arc::new(image);
                    self.buffer.push(index, Arc::clone(&frame));
                    frame
                }
                None => return Ok(false),
            },
        };
        self.position = index;
        self.frame = Some(frame);
        Ok(true)
    }

    /// Playback tick: show the next frame, wrapping to the start at the end.
    pub fn advance(&mut self, source: &mut dyn VideoSource) -> Result<()> {
        let next = if self.frame.is_some() { self.position + 1 } else { 0 };
        if !self.show(source, next)? && next != 0 {
            log::debug!("End of video at frame {}, restarting", next);
            self.show(source, 0)?;
        }
        Ok(())
    }

    /// Move one frame while paused. Returns whether the position changed.
    pub fn step(&mut self, source: &mut dyn VideoSource, direction: Scrub) -> Result<bool> {
        if !self.paused {
            return Ok(false);
        }
        match direction {
            Scrub::Back if self.position == 0 => Ok(false),
            Scrub::Back => self.show(source, self.position - 1),
            Scrub::Forward => self.show(source, self.position + 1),
        }
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Mark event slot `number` at the displayed frame.
    pub fn mark(&mut self, number: usize) -> SetOutcome {
        let mut mark = EventMark::new(self.position, self.current_time());
        if let Some(rate) = self.sample_rate {
            mark = mark.with_sample_rate(rate);
        }
        let before = self.marks.clone();
        let outcome = self.marks.set(number, mark);
        self.record_change(before);
        outcome
    }

    /// Copy slot `number` from the stored sidecar into the new marks.
    pub fn restore(&mut self, number: usize) -> bool {
        let Some(stored) = self.existing.get(number).copied() else {
            return false;
        };
        let before = self.marks.clone();
        let restored = self.marks.restore(number, &stored);
        self.record_change(before);
        restored
    }

    pub fn clear_marks(&mut self) {
        let before = self.marks.clone();
        self.marks.clear_all();
        self.record_change(before);
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo(self.marks.clone()) {
            Some(previous) => {
                self.marks = previous;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(self.marks.clone()) {
            Some(next) => {
                self.marks = next;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Merge the marks into the recording's sidecar if they changed.
    ///
    /// The audio file name is recorded only when the audio track was loaded.
    /// Returns whether the sidecar was written.
    pub fn save(&self, audio_loaded: bool) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        let audio_file = if audio_loaded {
            self.recording.audio_file_name()
        } else {
            None
        };
        serialization::save_marks(
            &self.recording.sidecar,
            &self.recording.video_file_name(),
            audio_file.as_deref(),
            &self.marks,
        )?;
        Ok(true)
    }

    fn record_change(&mut self, before: EventMarks) {
        if before != self.marks {
            self.history.push(before);
            self.dirty = true;
        }
    }

    /// Window title for the current state.
    pub fn title(&self) -> String {
        format_title(
            &self.recording.video_file_name(),
            self.position,
            self.current_time(),
            &self.existing,
            &self.marks,
        )
    }

    pub fn buffered_frames(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Fake decoder: frame `i` is a 1x1 image whose red channel is `i`.
    pub(crate) struct CountingSource {
        pub info: VideoInfo,
        pub decoded: usize,
    }

    impl CountingSource {
        pub(crate) fn new(frames: u64) -> Self {
            Self {
                info: VideoInfo {
                    codec: "h264".into(),
                    width: 1,
                    height: 1,
                    fps: 10.0,
                    frame_count: Some(frames),
                },
                decoded: 0,
            }
        }
    }

    impl VideoSource for CountingSource {
        fn info(&self) -> &VideoInfo {
            &self.info
        }

        fn read_frame(&mut self, index: u64) -> Result<Option<RgbaImage>> {
            if index >= self.info.frame_count.unwrap_or(0) {
                return Ok(None);
            }
            self.decoded += 1;
            Ok(RgbaImage::from_raw(1, 1, vec![index as u8, 0, 0, 255]))
        }
    }

    pub(crate) fn recording() -> Recording {
        Recording {
            video: PathBuf::from("/v/trial_cam1.mp4"),
            audio: None,
            velocity: None,
            sidecar: PathBuf::from("/v/trial.json"),
        }
    }

    fn session(source: &CountingSource, sample_rate: Option<u32>) -> Session {
        Session::new(recording(), source.info.clone(), EventMarks::new(4), sample_rate, 8)
    }

    fn shown(session: &Session) -> u8 {
        session.current_frame().unwrap().get_pixel(0, 0)[0]
    }

    fn saved_session(dir: &std::path::Path) -> Session {
        let source = CountingSource::new(10);
        let recording = Recording {
            video: dir.join("trial_cam1.mp4"),
            audio: Some(dir.join("trial.wav")),
            velocity: None,
            sidecar: dir.join("trial.json"),
        };
        Session::new(recording, source.info.clone(), EventMarks::new(4), Some(1000), 8)
    }

    #[test]
    fn test_unchanged_session_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = saved_session(dir.path());
        assert!(!s.save(true).unwrap());
        assert!(!s.recording.sidecar.exists());

        assert_eq!(s.mark(2), SetOutcome::MissingPrevious);
        assert!(!s.save(true).unwrap());
        assert!(!s.recording.sidecar.exists());
    }

    #[test]
    fn test_changed_session_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = saved_session(dir.path());
        s.position = 25;
        assert!(matches!(s.mark(1), SetOutcome::Stored { .. }));
        assert!(s.save(false).unwrap());

        let sidecar = serialization::read_sidecar(&s.recording.sidecar).unwrap();
        assert_eq!(sidecar["video_file"], "trial_cam1.mp4");
        assert_eq!(sidecar["video_annotations"]["1"]["frame"], 25);
        assert!(sidecar.get("audio_file").is_none());

        assert!(s.save(true).unwrap());
        let sidecar = serialization::read_sidecar(&s.recording.sidecar).unwrap();
        assert_eq!(sidecar["audio_file"], "trial.wav");
        assert_eq!(sidecar["audio_annotations"]["1"]["sample"], 2500);
    }

    #[test]
    fn test_playback_wraps_at_end() {
        let mut source = CountingSource::new(3);
        let mut s = session(&source, None);
        for _ in 0..3 {
            s.advance(&mut source).unwrap();
        }
        assert_eq!(s.position, 2);
        s.advance(&mut source).unwrap();
        assert_eq!(s.position, 0);
        assert_eq!(shown(&s), 0);
    }

    #[test]
    fn test_scrub_back_uses_buffer() {
        let mut source = CountingSource::new(10);
        let mut s = session(&source, None);
        for _ in 0..5 {
            s.advance(&mut source).unwrap();
        }
        assert_eq!(source.decoded, 5);

        assert!(!s.step(&mut source, Scrub::Back).unwrap(), "only while paused");
        s.toggle_pause();
        assert!(s.step(&mut source, Scrub::Back).unwrap());
        assert!(s.step(&mut source, Scrub::Back).unwrap());
        assert_eq!(s.position, 2);
        assert_eq!(shown(&s), 2);
        assert_eq!(source.decoded, 5);

        assert!(s.step(&mut source, Scrub::Forward).unwrap());
        assert_eq!(s.position, 3);
        assert_eq!(source.decoded, 5);
    }

    #[test]
    fn test_scrub_stops_at_bounds() {
        let mut source = CountingSource::new(2);
        let mut s = session(&source, None);
        s.advance(&mut source).unwrap();
        s.toggle_pause();
        assert!(!s.step(&mut source, Scrub::Back).unwrap());
        assert!(s.step(&mut source, Scrub::Forward).unwrap());
        assert!(!s.step(&mut source, Scrub::Forward).unwrap());
        assert_eq!(s.position, 1);
    }

    #[test]
    fn test_frame_buffer_is_bounded() {
        let mut buffer = FrameBuffer::new(2);
        let frame = Arc::new(RgbaImage::new(1, 1));
        buffer.push(1, Arc::clone(&frame));
        buffer.push(2, Arc::clone(&frame));
        buffer.push(2, Arc::clone(&frame));
        buffer.push(3, frame);
        assert_eq!(buffer.len(), 2);
        assert!(buffer.get(1).is_none());
        assert!(buffer.get(3).is_some());
    }

    #[test]
    fn test_mark_uses_current_frame_and_audio_rate() {
        let mut source = CountingSource::new(100);
        let mut s = session(&source, Some(1000));
        for _ in 0..16 {
            s.advance(&mut source).unwrap();
        }
        assert!(!s.dirty);
        assert_eq!(s.mark(1), SetOutcome::Stored { cleared: 0 });
        let mark = s.marks.get(1).unwrap();
        assert_eq!(mark.frame, 15);
        assert_eq!(mark.time, 1.5);
        assert_eq!(mark.audio_sample, Some(1500));
        assert!(s.dirty);
        assert!(s.title().contains("New : E1 F(T): 15(1.50s)"));
    }

    #[test]
    fn test_rejected_mark_does_not_dirty() {
        let source = CountingSource::new(10);
        let mut s = session(&source, None);
        assert_eq!(s.mark(2), SetOutcome::MissingPrevious);
        assert!(!s.dirty);
    }

    #[test]
    fn test_restore_and_undo() {
        let source = CountingSource::new(10);
        let stored = EventMark {
            frame: 42,
            time: 4.2,
            audio_sample: Some(4200),
        };
        let mut s = Session::new(
            recording(),
            source.info.clone(),
            EventMarks::from_stored(4, vec![(2, stored)]),
            None,
            8,
        );
        assert!(!s.restore(1));
        assert!(!s.can_undo());
        assert!(s.restore(2));
        assert!(s.can_undo());
        assert_eq!(s.marks.get(2), Some(&stored));

        assert!(s.undo());
        assert!(s.marks.is_empty());
        assert!(s.can_redo());
        assert!(s.redo());
        assert_eq!(s.marks.get(2), Some(&stored));

        s.clear_marks();
        assert!(s.marks.is_empty());
        assert!(s.undo());
        assert_eq!(s.marks.get(2), Some(&stored));
    }

    #[test]
    fn test_zoom_scroll_clamps() {
        let mut zoom = Zoom::default();
        for _ in 0..30 {
            zoom.scroll(1.0, Some((10, 20)), 0.2, 5.0);
        }
        assert_eq!(zoom.level, 5.0);
        assert_eq!(zoom.center, Some((10, 20)));
        for _ in 0..30 {
            zoom.scroll(-1.0, None, 0.2, 5.0);
        }
        assert_eq!(zoom.level, 1.0);
        assert_eq!(zoom.center, Some((10, 20)));
        zoom.reset();
        assert_eq!(zoom, Zoom::default());
    }
}
