//! Result presentation: console lines, optional annotated PNG snapshots.

use crate::engine::Annotation;
use facerec_hw::Frame;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

const KNOWN_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const UNKNOWN_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

#[derive(Error, Debug)]
pub enum PresentError {
    #[error("cannot write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot write snapshot: {0}")]
    Snapshot(#[from] image::ImageError),
    #[error("cannot encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Displays per-frame results and reports whether the user wants to stop.
pub trait Presenter {
    fn present(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<(), PresentError>;

    /// Polled once per loop iteration, before the next frame is read.
    fn exit_requested(&mut self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per frame.
    Json,
}

#[derive(Serialize)]
struct FaceRecord<'a> {
    label: &'a str,
    score: f32,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

#[derive(Serialize)]
struct FrameRecord<'a> {
    seq: u32,
    faces: Vec<FaceRecord<'a>>,
}

/// Writes results to a stream, one frame per line.
///
/// Stops when the shared flag is raised (Ctrl-C) or after `max_frames`
/// frames have been presented.
pub struct ConsolePresenter<W: Write> {
    out: W,
    format: OutputFormat,
    stop: Arc<AtomicBool>,
    max_frames: Option<u64>,
    snapshot_dir: Option<PathBuf>,
    presented: u64,
}

impl<W: Write> ConsolePresenter<W> {
    pub fn new(out: W, format: OutputFormat, stop: Arc<AtomicBool>) -> Self {
        Self {
            out,
            format,
            stop,
            max_frames: None,
            snapshot_dir: None,
            presented: 0,
        }
    }

    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Save every frame with boxes drawn around the faces into `dir`.
    pub fn with_snapshots(mut self, dir: Option<PathBuf>) -> Self {
        self.snapshot_dir = dir;
        self
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_text(&mut self, frame: &Frame, annotations: &[Annotation]) -> std::io::Result<()> {
        if annotations.is_empty() {
            return writeln!(self.out, "frame {}: no faces", frame.sequence);
        }
        let faces: Vec<String> = annotations
            .iter()
            .map(|a| {
                format!(
                    "{} ({:.3}) at {},{} {}x{}",
                    a.recognition.label,
                    a.recognition.score,
                    a.region.x,
                    a.region.y,
                    a.region.width,
                    a.region.height
                )
            })
            .collect();
        writeln!(self.out, "frame {}: {}", frame.sequence, faces.join("; "))
    }

    fn write_json(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<(), PresentError> {
        let record = FrameRecord {
            seq: frame.sequence,
            faces: annotations
                .iter()
                .map(|a| FaceRecord {
                    label: &a.recognition.label,
                    score: a.recognition.score,
                    x: a.region.x,
                    y: a.region.y,
                    width: a.region.width,
                    height: a.region.height,
                })
                .collect(),
        };
        serde_json::to_writer(&mut self.out, &record)?;
        writeln!(self.out)?;
        Ok(())
    }
}

impl<W: Write> Presenter for ConsolePresenter<W> {
    fn present(&mut self, frame: &Frame, annotations: &[Annotation]) -> Result<(), PresentError> {
        match self.format {
            OutputFormat::Text => self.write_text(frame, annotations)?,
            OutputFormat::Json => self.write_json(frame, annotations)?,
        }
        self.out.flush()?;

        if let Some(dir) = &self.snapshot_dir {
            let path = save_snapshot(dir, frame, annotations)?;
            tracing::debug!(path = %path.display(), "snapshot saved");
        }

        self.presented += 1;
        Ok(())
    }

    fn exit_requested(&mut self) -> bool {
        if self.stop.load(Ordering::SeqCst) {
            return true;
        }
        self.max_frames.is_some_and(|max| self.presented >= max)
    }
}

/// Draw a box per face (green when recognized, red otherwise).
///
/// Only the boxes are drawn; labels and scores appear in the console or JSON
/// output for the same frame.
pub fn annotate(frame: &Frame, annotations: &[Annotation]) -> RgbImage {
    let mut canvas = DynamicImage::ImageLuma8(frame.image.clone()).to_rgb8();
    for a in annotations {
        if a.region.width == 0 || a.region.height == 0 {
            continue;
        }
        let rect = Rect::at(a.region.x as i32, a.region.y as i32)
            .of_size(a.region.width, a.region.height);
        let color = if a.recognition.is_known() {
            KNOWN_COLOR
        } else {
            UNKNOWN_COLOR
        };
        draw_hollow_rect_mut(&mut canvas, rect, color);
    }
    canvas
}

fn save_snapshot(
    dir: &Path,
    frame: &Frame,
    annotations: &[Annotation],
) -> Result<PathBuf, PresentError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("frame-{:06}.png", frame.sequence));
    annotate(frame, annotations).save(&path)?;
    Ok(path)
}
