//! Gallery loading from a directory of reference images.

use crate::normalizer::{normalize, NormalizeError};
use crate::types::{CanonicalFace, Gallery};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Image file extensions accepted into the gallery (compared case-insensitively).
pub const GALLERY_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Build a gallery from every reference image in `dir`.
///
/// Files are visited in file-name order. The label is the file name without
/// its extension. Files that fail to decode are logged and skipped; a missing
/// or unreadable directory yields an empty gallery.
pub fn load_gallery(dir: &Path) -> Gallery {
    let mut gallery = Gallery::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "gallery directory unreadable; gallery is empty");
            return gallery;
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_gallery_extension(path))
        .collect();
    paths.sort();

    for path in paths {
        let Some(label) = label_for(&path) else {
            tracing::warn!(path = %path.display(), "skipping gallery image without a usable label");
            continue;
        };

        let face = match load_face(&path) {
            Ok(face) => face,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping gallery image");
                continue;
            }
        };

        if gallery.insert(label.clone(), face).is_some() {
            tracing::warn!(label = %label, path = %path.display(), "duplicate label, replacing earlier image");
        }
        tracing::info!(label = %label, path = %path.display(), "loaded known face");
    }

    tracing::info!(dir = %dir.display(), count = gallery.len(), "gallery loaded");
    gallery
}

/// Decode `path` as grayscale and normalize it.
pub fn load_face(path: &Path) -> Result<CanonicalFace, GalleryError> {
    let gray = image::open(path)?.to_luma8();
    Ok(normalize(&gray)?)
}

/// Whether `path` carries one of [`GALLERY_EXTENSIONS`].
pub fn has_gallery_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| GALLERY_EXTENSIONS.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed)))
        .unwrap_or(false)
}

/// Identity label for a reference image: file name minus its last extension.
pub fn label_for(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() {
        return None;
    }
    Some(stem.to_string())
}
