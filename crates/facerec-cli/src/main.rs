use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facerec_core::{load_gallery, runtime, Gallery, Recognizer, ScrfdLocator};
use facerec_hw::{Camera, FrameSource, ImageSequence};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod presenter;

use config::Config;
use engine::{Engine, RunSummary};
use presenter::{ConsolePresenter, OutputFormat};

#[derive(Parser)]
#[command(name = "facerec", about = "Template-matching face recognition demo")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory of labeled reference faces
    #[arg(long, global = true)]
    gallery_dir: Option<PathBuf>,

    /// SCRFD ONNX face detection model
    #[arg(long, global = true)]
    detector_model: Option<PathBuf>,

    /// Similarity a match must exceed
    #[arg(long, global = true)]
    threshold: Option<f32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize faces in a live camera feed or replayed images
    Run {
        /// V4L2 device (defaults to the configured camera)
        #[arg(short, long, conflicts_with = "frames")]
        device: Option<String>,
        /// Replay an image file or directory instead of the camera
        #[arg(long)]
        frames: Option<PathBuf>,
        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Save annotated frames as PNG into this directory
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },
    /// Recognize the faces in a single image
    Identify {
        image: PathBuf,
        /// Treat the whole image as one face instead of running the detector
        #[arg(long)]
        whole: bool,
    },
    /// List the labels loaded from the gallery directory
    Gallery,
    /// List V4L2 capture devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Run {
            device,
            frames,
            max_frames,
            format,
            snapshot_dir,
        } => {
            let stop = Arc::new(AtomicBool::new(false));
            let options = RunOptions {
                device,
                frames,
                max_frames,
                format,
                snapshot_dir,
            };

            let worker_stop = stop.clone();
            let mut worker =
                tokio::task::spawn_blocking(move || run_loop(&config, options, worker_stop));

            let summary = tokio::select! {
                joined = &mut worker => joined,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupt received, stopping after current frame");
                    stop.store(true, Ordering::SeqCst);
                    worker.await
                }
            }
            .context("recognition worker panicked")??;

            println!(
                "{} frames, {} faces, {} recognized ({:?})",
                summary.frames, summary.faces, summary.recognized, summary.stop
            );
        }
        Commands::Identify { image, whole } => identify(&config, &image, whole)?,
        Commands::Gallery => {
            let gallery = load_gallery(&config.gallery_dir);
            if gallery.is_empty() {
                println!("No faces in {}", config.gallery_dir.display());
            }
            for label in gallery.labels() {
                println!("{label}");
            }
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
    }

    Ok(())
}

struct RunOptions {
    device: Option<String>,
    frames: Option<PathBuf>,
    max_frames: Option<u64>,
    format: OutputFormat,
    snapshot_dir: Option<PathBuf>,
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.gallery_dir {
        config.gallery_dir = dir.clone();
    }
    if let Some(model) = &cli.detector_model {
        config.detector_model = model.clone();
    }
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }
    config.validate()?;
    tracing::debug!(?config, "configuration resolved");
    Ok(config)
}

fn load_known_faces(config: &Config) -> Gallery {
    let gallery = load_gallery(&config.gallery_dir);
    if gallery.is_empty() {
        tracing::warn!(
            dir = %config.gallery_dir.display(),
            "gallery is empty, every face will be reported as unknown"
        );
    }
    gallery
}

fn run_loop(config: &Config, options: RunOptions, stop: Arc<AtomicBool>) -> Result<RunSummary> {
    runtime::init();

    let gallery = load_known_faces(config);
    let engine = Engine::new(&gallery, Recognizer::new(config.recognizer()));
    let mut locator = ScrfdLocator::load(&config.detector_model, config.detector())?;
    let mut presenter = ConsolePresenter::new(std::io::stdout().lock(), options.format, stop)
        .with_max_frames(options.max_frames)
        .with_snapshots(options.snapshot_dir);

    let summary = match options.frames {
        Some(path) => {
            let mut source = ImageSequence::open(&path)?;
            engine.run(&mut source, &mut locator, &mut presenter)?
        }
        None => {
            let device = options.device.as_deref().unwrap_or(&config.camera_device);
            let camera = Camera::open(device, config.capture_width, config.capture_height)?;
            let mut source = camera.stream()?;
            engine.run(&mut source, &mut locator, &mut presenter)?
        }
    };

    Ok(summary)
}

fn identify(config: &Config, path: &Path, whole: bool) -> Result<()> {
    let gallery = load_known_faces(config);
    let engine = Engine::new(&gallery, Recognizer::new(config.recognizer()));

    if whole {
        let face = image::open(path)
            .with_context(|| format!("cannot decode {}", path.display()))?
            .to_luma8();
        let recognition = engine.identify(&face)?;
        println!("{} ({:.3})", recognition.label, recognition.score);
        return Ok(());
    }

    runtime::init();
    let mut locator = ScrfdLocator::load(&config.detector_model, config.detector())?;
    let mut source = ImageSequence::open(path)?;
    let frame = source
        .next_frame()?
        .with_context(|| format!("cannot decode {}", path.display()))?;

    let annotations = engine.process_frame(&frame, &mut locator)?;
    if annotations.is_empty() {
        println!("No faces found");
    }
    for a in annotations {
        println!(
            "{} ({:.3}) at {},{} {}x{}",
            a.recognition.label,
            a.recognition.score,
            a.region.x,
            a.region.y,
            a.region.width,
            a.region.height
        );
    }
    Ok(())
}
