use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use scenewatch_core::config::Config;
use scenewatch_core::pipeline::frame_sinks::{ChangeSink, DirectoryChangeSink, NullSink};
use scenewatch_core::pipeline::monitor_feed_use_case::{MonitorFeedUseCase, RecognitionStage};
use scenewatch_core::recognition::domain::gallery::SharedGallery;
use scenewatch_core::recognition::infrastructure::directory_loader::{
    DirectoryGalleryLoader, ProfileLayout,
};
use scenewatch_core::recognition::infrastructure::onnx_face_encoder::{
    OnnxFaceEncoder, DEFAULT_DETECT_CONFIDENCE,
};
use scenewatch_core::scene::change_detector::{DetectorConfig, SceneChangeDetector};
use scenewatch_core::video::infrastructure::image_dir_source::ImageDirSource;

/// Scene-change monitoring over a directory of captured frames.
#[derive(Parser)]
#[command(name = "scenewatch")]
struct Cli {
    /// Directory of still frames to play back, in filename order.
    frames: PathBuf,

    /// Optional TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Profile image directory; enables face recognition on significant
    /// frames.
    #[arg(long)]
    profiles: Option<PathBuf>,

    /// Profile directory layout: flat or per_label.
    #[arg(long)]
    layout: Option<String>,

    /// Save each significant frame as a PNG into this directory.
    #[arg(long)]
    save_changes: Option<PathBuf>,

    /// Pixel-intensity delta above which a pixel counts as changed.
    #[arg(long)]
    intensity_threshold: Option<f64>,

    /// Smoothed changed-pixel ratio above which a change is signalled.
    #[arg(long)]
    change_ratio: Option<f64>,

    /// Sliding window size for change-ratio smoothing.
    #[arg(long)]
    smoothing: Option<usize>,

    /// Maximum embedding distance for a profile match.
    #[arg(long)]
    match_threshold: Option<f64>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_DETECT_CONFIDENCE)]
    confidence: f64,

    /// Directory searched for model files before the cache and download.
    #[arg(long)]
    models_dir: Option<PathBuf>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();

    validate(&cli)?;

    let source = ImageDirSource::open(&cli.frames)?;
    if source.is_empty() {
        return Err(format!("no frames found in {}", cli.frames.display()).into());
    }
    log::info!(
        "Monitoring {} frames from {}",
        source.len(),
        cli.frames.display()
    );

    let detector = SceneChangeDetector::new(DetectorConfig {
        intensity_threshold: cli
            .intensity_threshold
            .unwrap_or(config.detector.intensity_threshold),
        change_ratio: cli.change_ratio.unwrap_or(config.detector.change_ratio),
        smoothing: cli.smoothing.unwrap_or(config.detector.smoothing),
    });

    let change_sink: Box<dyn ChangeSink> = match &cli.save_changes {
        Some(dir) => Box::new(DirectoryChangeSink::new(dir)),
        None => Box::new(NullSink),
    };

    let recognition = match &cli.profiles {
        Some(dir) => Some(build_recognition(&cli, &config, dir)?),
        None => None,
    };

    let mut pipeline = MonitorFeedUseCase::new(
        Box::new(source),
        detector,
        change_sink,
        Box::new(NullSink),
        recognition,
    );
    let stats = pipeline.run();

    println!(
        "{} frames processed, {} significant changes, {} faces identified",
        stats.frames_processed, stats.significant_changes, stats.faces_identified
    );
    Ok(())
}

fn build_recognition(
    cli: &Cli,
    config: &Config,
    profiles_dir: &std::path::Path,
) -> Result<RecognitionStage, Box<dyn std::error::Error>> {
    let models_dir = cli
        .models_dir
        .as_deref()
        .or(config.recognition.models_dir.as_deref());
    let encoder = OnnxFaceEncoder::from_resolved_models(cli.confidence, models_dir)
        .map_err(|e| e as Box<dyn std::error::Error>)?;

    let layout = match &cli.layout {
        Some(name) => parse_layout(name)?,
        None => config.recognition.layout,
    };
    let loader = DirectoryGalleryLoader::new(profiles_dir, layout);
    let gallery = loader.rebuild(&encoder);
    log::info!(
        "Loaded {} profiles from {}",
        gallery.len(),
        profiles_dir.display()
    );

    Ok(RecognitionStage {
        encoder: Arc::new(encoder),
        gallery: Arc::new(SharedGallery::new(gallery)),
        match_threshold: cli
            .match_threshold
            .unwrap_or(config.recognition.match_threshold),
    })
}

fn parse_layout(name: &str) -> Result<ProfileLayout, Box<dyn std::error::Error>> {
    match name {
        "flat" => Ok(ProfileLayout::Flat),
        "per_label" => Ok(ProfileLayout::PerLabel),
        other => Err(format!("Invalid layout: {other} (expected flat or per_label)").into()),
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.frames.is_dir() {
        return Err(format!("Frame directory not found: {}", cli.frames.display()).into());
    }
    if let Some(dir) = &cli.profiles {
        if !dir.is_dir() {
            return Err(format!("Profile directory not found: {}", dir.display()).into());
        }
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err("Confidence must be between 0.0 and 1.0".into());
    }
    if let Some(ratio) = cli.change_ratio {
        if !(0.0..=1.0).contains(&ratio) {
            return Err("Change ratio must be between 0.0 and 1.0".into());
        }
    }
    if let Some(threshold) = cli.match_threshold {
        if threshold <= 0.0 {
            return Err("Match threshold must be positive".into());
        }
    }
    Ok(())
}
