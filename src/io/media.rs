// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Video probing, codec normalization and frame decoding.
//!
//! `ffprobe` describes the first video stream, `ffmpeg` re-encodes files
//! that are not H.264, and frames are decoded either by a long-running
//! `ffmpeg` process writing raw RGBA to a pipe (default) or by OpenCV
//! (`video-opencv` feature).

use crate::config::{Settings, TranscodeMode};
use anyhow::{bail, Context, Result};
use image::RgbaImage;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

/// Properties of a video's first stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Known or estimated number of frames.
    pub frame_count: Option<u64>,
}

impl VideoInfo {
    /// Presentation time of frame `index` in seconds.
    pub fn frame_time(&self, index: u64) -> f64 {
        index as f64 / self.fps
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    tags: Option<ProbeTags>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

impl ProbeStream {
    /// Display rotation in degrees, from the display matrix or the legacy tag.
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse().ok())
            })
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse an ffprobe rate such as `30000/1001`.
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.trim().parse::<f64>().ok()? / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Interpret `ffprobe -of json` output.
pub fn parse_probe(json: &str) -> Result<VideoInfo> {
    let output: ProbeOutput = serde_json::from_str(json).context("Invalid ffprobe output")?;
    let Some(stream) = output.streams.into_iter().next() else {
        bail!("No video stream found");
    };

    let (Some(coded_width), Some(coded_height)) = (stream.width, stream.height) else {
        bail!("Video stream has no dimensions");
    };
    // ffmpeg decodes rotated streams upright
    let quarter_turns = (stream.rotation() / 90.0).round() as i64;
    let (width, height) = if quarter_turns.rem_euclid(2) == 1 {
        (coded_height, coded_width)
    } else {
        (coded_width, coded_height)
    };
    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .context("Video stream has no frame rate")?;

    let duration = stream
        .duration
        .or_else(|| output.format.and_then(|f| f.duration))
        .and_then(|d| d.parse::<f64>().ok());
    let frame_count = stream
        .nb_frames
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .or_else(|| duration.map(|d| (d * fps).round() as u64));

    Ok(VideoInfo {
        codec: stream.codec_name.unwrap_or_default(),
        width,
        height,
        fps,
        frame_count,
    })
}

/// Run `ffprobe` on a video file.
pub fn probe(ffprobe: &str, path: &Path) -> Result<VideoInfo> {
    let output = Command::new(ffprobe)
        .args(["-v", "error", "-select_streams", "v:0"])
        .args([
            "-show_entries",
            "stream=codec_name,width,height,r_frame_rate,avg_frame_rate,nb_frames,duration\
             :stream_side_data=rotation:stream_tags=rotate:format=duration",
        ])
        .args(["-of", "json"])
        .arg(path)
        .output()
        .with_context(|| format!("Failed to run {}", ffprobe))?;

    if !output.status.success() {
        bail!(
            "{} failed on {}: {}",
            ffprobe,
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    parse_probe(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("Failed to probe {}", path.display()))
}

/// A video ready for decoding, possibly a transcoded copy.
#[derive(Debug)]
pub struct PreparedVideo {
    pub path: PathBuf,
    /// Deleted when dropped (temporary transcodes only).
    scratch: Option<tempfile::TempPath>,
}

impl PreparedVideo {
    pub fn is_temporary(&self) -> bool {
        self.scratch.is_some()
    }
}

/// Whether a stream with this codec needs re-encoding before playback.
pub fn needs_transcode(mode: TranscodeMode, codec: &str) -> bool {
    mode != TranscodeMode::Off && !codec.eq_ignore_ascii_case("h264")
}

/// Normalize the video to H.264 according to `settings.transcode`.
///
/// A failed transcode is logged and the original file is used.
pub fn prepare(settings: &Settings, path: &Path, info: &VideoInfo) -> PreparedVideo {
    let original = PreparedVideo {
        path: path.to_path_buf(),
        scratch: None,
    };
    if !needs_transcode(settings.transcode, &info.codec) {
        log::info!("{} is {}, skipping conversion", path.display(), info.codec);
        return original;
    }

    match transcode(settings, path) {
        Ok(scratch) => match settings.transcode {
            TranscodeMode::InPlace => match scratch.persist(path) {
                Ok(()) => {
                    log::info!("Conversion done: {}", path.display());
                    original
                }
                Err(e) => {
                    log::error!("Failed to replace {}: {}", path.display(), e.error);
                    PreparedVideo {
                        path: e.path.to_path_buf(),
                        scratch: Some(e.path),
                    }
                }
            },
            _ => PreparedVideo {
                path: scratch.to_path_buf(),
                scratch: Some(scratch),
            },
        },
        Err(e) => {
            log::error!("Error converting {}: {:#}", path.display(), e);
            original
        }
    }
}

fn transcode(settings: &Settings, path: &Path) -> Result<tempfile::TempPath> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let scratch = tempfile::Builder::new()
        .prefix(".timed_")
        .suffix("_tmp.mp4")
        .tempfile_in(dir)
        .context("Failed to create scratch file")?
        .into_temp_path();

    log::info!("Converting: {} -> H.264", path.display());
    let output = Command::new(&settings.ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(path)
        .args(["-c:v", "libx264", "-preset", "slow", "-crf", "23"])
        .args(["-c:a", "aac", "-b:a", "128k"])
        .arg(&*scratch)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to run {}", settings.ffmpeg))?;

    if !output.status.success() {
        bail!("{}", String::from_utf8_lossy(&output.stderr).trim());
    }
    Ok(scratch)
}

/// Random-access frame decoding.
pub trait VideoSource: Send {
    fn info(&self) -> &VideoInfo;

    /// Decode frame `index`; `None` once past the last frame.
    fn read_frame(&mut self, index: u64) -> Result<Option<RgbaImage>>;
}

/// Open a decoder for `path` with the compiled-in backend.
pub fn open_source(settings: &Settings, path: &Path, info: VideoInfo) -> Result<Box<dyn VideoSource>> {
    #[cfg(feature = "video-opencv")]
    {
        let _ = settings;
        Ok(Box::new(opencv_source::OpenCvSource::open(path, info)?))
    }
    #[cfg(not(feature = "video-opencv"))]
    {
        Ok(Box::new(FfmpegPipeSource::open(&settings.ffmpeg, path, info)?))
    }
}

/// Frames skipped by reading ahead instead of restarting the decoder.
const MAX_READ_AHEAD: u64 = 30;

/// Decodes through an `ffmpeg` child process writing raw RGBA frames.
pub struct FfmpegPipeSource {
    ffmpeg: String,
    path: PathBuf,
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    /// Index of the frame the pipe will deliver next.
    next_index: u64,
    buffer: Vec<u8>,
}

impl FfmpegPipeSource {
    pub fn open(ffmpeg: &str, path: &Path, info: VideoInfo) -> Result<Self> {
        let (child, stdout) = spawn_decoder(ffmpeg, path, 0.0)?;
        let frame_bytes = info.width as usize * info.height as usize * 4;
        Ok(Self {
            ffmpeg: ffmpeg.to_string(),
            path: path.to_path_buf(),
            info,
            child,
            stdout,
            next_index: 0,
            buffer: vec![0u8; frame_bytes],
        })
    }

    fn restart_at(&mut self, index: u64) -> Result<()> {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let (child, stdout) = spawn_decoder(&self.ffmpeg, &self.path, self.info.frame_time(index))?;
        self.child = child;
        self.stdout = stdout;
        self.next_index = index;
        log::debug!("Restarted decoder at frame {}", index);
        Ok(())
    }

    /// Read the next frame into the buffer; false at end of stream.
    fn read_next(&mut self) -> Result<bool> {
        match self.stdout.read_exact(&mut self.buffer) {
            Ok(()) => {
                self.next_index += 1;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e).context("Failed to read frame from ffmpeg"),
        }
    }
}

impl VideoSource for FfmpegPipeSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn read_frame(&mut self, index: u64) -> Result<Option<RgbaImage>> {
        if index < self.next_index || index - self.next_index > MAX_READ_AHEAD {
            self.restart_at(index)?;
        }
        while self.next_index <= index {
            if !self.read_next()? {
                return Ok(None);
            }
        }
        Ok(RgbaImage::from_raw(
            self.info.width,
            self.info.height,
            self.buffer.clone(),
        ))
    }
}

impl Drop for FfmpegPipeSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_decoder(ffmpeg: &str, path: &Path, start_secs: f64) -> Result<(Child, ChildStdout)> {
    let mut child = Command::new(ffmpeg)
        .args(["-v", "error", "-nostdin"])
        .args(["-ss", &format!("{:.6}", start_secs)])
        .arg("-i")
        .arg(path)
        .args(["-an", "-pix_fmt", "rgba", "-f", "rawvideo", "pipe:"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        // stderr is never drained
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to start {}", ffmpeg))?;

    let stdout = child
        .stdout
        .take()
        .context("Failed to take stdout from ffmpeg decoding process")?;
    Ok((child, stdout))
}

#[cfg(feature = "video-opencv")]
mod opencv_source {
    use super::{VideoInfo, VideoSource};
    use anyhow::{bail, Context, Result};
    use image::RgbaImage;
    use opencv::{core::Mat, imgproc, prelude::*, videoio};
    use std::path::Path;

    /// Decodes through OpenCV's `VideoCapture`.
    pub struct OpenCvSource {
        capture: videoio::VideoCapture,
        info: VideoInfo,
        next_index: u64,
    }

    impl OpenCvSource {
        pub fn open(path: &Path, info: VideoInfo) -> Result<Self> {
            let capture = videoio::VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)
                .context("Failed to create VideoCapture")?;
            if !capture.is_opened()? {
                bail!("Could not open video {}", path.display());
            }
            Ok(Self {
                capture,
                info,
                next_index: 0,
            })
        }
    }

    impl VideoSource for OpenCvSource {
        fn info(&self) -> &VideoInfo {
            &self.info
        }

        fn read_frame(&mut self, index: u64) -> Result<Option<RgbaImage>> {
            if index != self.next_index {
                self.capture.set(videoio::CAP_PROP_POS_FRAMES, index as f64)?;
            }
            let mut bgr = Mat::default();
            if !self.capture.read(&mut bgr)? || bgr.empty() {
                return Ok(None);
            }
            self.next_index = index + 1;

            let mut rgba = Mat::default();
            imgproc::cvt_color(&bgr, &mut rgba, imgproc::COLOR_BGR2RGBA, 0)?;
            let bytes = rgba.data_bytes()?.to_vec();
            Ok(RgbaImage::from_raw(rgba.cols() as u32, rgba.rows() as u32, bytes))
        }
    }
}
