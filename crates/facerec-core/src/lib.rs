//! facerec-core — gallery loading, face normalization, and recognition.
//!
//! Faces are reduced to a 120×120 histogram-equalized grayscale form and
//! matched against a gallery of reference images with multi-scale normalized
//! cross-correlation. Face location runs an SCRFD model via ONNX Runtime.

pub mod detector;
pub mod gallery;
pub mod matching;
pub mod normalizer;
pub mod recognizer;
pub mod runtime;
pub mod types;

#[cfg(test)]
mod testutil;

pub use detector::{DetectorConfig, DetectorError, FaceLocator, ScrfdLocator};
pub use gallery::{load_face, load_gallery, GalleryError};
pub use normalizer::{normalize, NormalizeError};
pub use recognizer::{Matcher, Recognizer, RecognizerConfig};
pub use types::{CanonicalFace, Gallery, GalleryEntry, Recognition, Region, CANONICAL_SIZE, UNKNOWN_LABEL};
