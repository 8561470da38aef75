// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! TIMED - Time Instant Marking for Experiment Data
//!
//! A cross-platform desktop application for marking event instants on
//! experiment videos, with synchronized audio and velocity overlays.

mod app;
mod config;
mod io;
mod models;
mod ui;
mod util;

use anyhow::{bail, Result};
use app::TimedApp;
use clap::Parser;
use config::{Settings, TranscodeMode};
use models::recording::{self, Folders};
use std::path::PathBuf;

/// Mark time instants in the videos of a folder.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Folder containing the video files (a folder picker opens if omitted)
    video_dir: Option<PathBuf>,

    /// Folder containing WAV files recorded with the videos
    #[arg(long)]
    audio_dir: Option<PathBuf>,

    /// Folder containing velocity CSV files (`Frame`, `velocity` columns)
    #[arg(long)]
    velocity_dir: Option<PathBuf>,

    /// Audio channel to display
    #[arg(long, default_value_t = 0)]
    channel: u16,

    /// Folder for the annotation JSON files (defaults to the video folder)
    #[arg(long)]
    annotations_dir: Option<PathBuf>,

    /// YAML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of event slots (1-9)
    #[arg(long)]
    slots: Option<usize>,

    /// Play videos as they are, without H.264 conversion
    #[arg(long)]
    no_transcode: bool,
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(slots) = cli.slots {
        settings.event_slots = slots;
    }
    if cli.no_transcode {
        settings.transcode = TranscodeMode::Off;
    }
    settings.validate()?;
    Ok(settings)
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    let video_dir = match cli.video_dir.clone() {
        Some(dir) => dir,
        None => match rfd::FileDialog::new()
            .set_title("Select the folder containing the videos")
            .pick_folder()
        {
            Some(dir) => dir,
            None => {
                log::info!("No folder selected");
                return Ok(());
            }
        },
    };

    let folders = Folders {
        video_dir,
        audio_dir: cli.audio_dir.clone(),
        velocity_dir: cli.velocity_dir.clone(),
        annotations_dir: cli.annotations_dir.clone(),
    };
    let recordings = recording::discover(&folders, &settings)?;
    if recordings.is_empty() {
        bail!(
            "No {} files in {}",
            settings.video_extensions.join("/"),
            folders.video_dir.display()
        );
    }
    log::info!("Found {} recording(s) in {}", recordings.len(), folders.video_dir.display());

    // Configure egui options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("TIMED - Time Instant Marking for Experiment Data"),
        ..Default::default()
    };

    // Run the application
    let channel = cli.channel;
    eframe::run_native(
        "TIMED",
        options,
        Box::new(move |_cc| Ok(Box::new(TimedApp::new(settings, recordings, channel)))),
    )
    .map_err(|e| anyhow::anyhow!("Application error: {}", e))?;

    Ok(())
}
