use image::GrayImage;

/// Side length of the canonical face representation, in pixels.
pub const CANONICAL_SIZE: u32 = 120;

/// Label reported when no gallery entry clears the similarity threshold.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Rectangular face region within a frame, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Build a region from floating-point corners, clamped to a
    /// `frame_width` × `frame_height` frame.
    ///
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn from_corners(
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<Self> {
        let fw = frame_width as f32;
        let fh = frame_height as f32;
        let left = x1.min(x2).clamp(0.0, fw).floor();
        let top = y1.min(y2).clamp(0.0, fh).floor();
        let right = x1.max(x2).clamp(0.0, fw).ceil();
        let bottom = y1.max(y2).clamp(0.0, fh).ceil();

        let width = (right - left) as u32;
        let height = (bottom - top) as u32;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self::new(left as u32, top as u32, width, height))
    }

    /// Intersect with a `frame_width` × `frame_height` frame.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<Self> {
        if self.x >= frame_width || self.y >= frame_height {
            return None;
        }
        let width = self.width.min(frame_width - self.x);
        let height = self.height.min(frame_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self::new(self.x, self.y, width, height))
    }

    /// Copy this region out of `frame`. Parts outside the frame are dropped.
    pub fn crop(&self, frame: &GrayImage) -> Option<GrayImage> {
        let clamped = self.clamp_to(frame.width(), frame.height())?;
        Some(
            image::imageops::crop_imm(frame, clamped.x, clamped.y, clamped.width, clamped.height)
                .to_image(),
        )
    }
}

/// A face reduced to the canonical form every comparison works on:
/// 120×120, single channel, histogram-equalized.
///
/// Only [`normalize`](crate::normalizer::normalize) constructs one, so two
/// canonical faces always share the same shape.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalFace {
    image: GrayImage,
}

impl CanonicalFace {
    pub(crate) fn from_normalized(image: GrayImage) -> Self {
        debug_assert_eq!(image.dimensions(), (CANONICAL_SIZE, CANONICAL_SIZE));
        Self { image }
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }
}

/// One known identity.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub label: String,
    pub face: CanonicalFace,
}

/// Ordered label → canonical face mapping of known identities.
///
/// Iteration follows insertion order. Re-inserting an existing label replaces
/// its face but keeps its original slot.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `label`. Returns the replaced face, if any.
    pub fn insert(&mut self, label: impl Into<String>, face: CanonicalFace) -> Option<CanonicalFace> {
        let label = label.into();
        match self.entries.iter_mut().find(|e| e.label == label) {
            Some(existing) => Some(std::mem::replace(&mut existing.face, face)),
            None => {
                self.entries.push(GalleryEntry { label, face });
                None
            }
        }
    }

    pub fn get(&self, label: &str) -> Option<&CanonicalFace> {
        self.entries.iter().find(|e| e.label == label).map(|e| &e.face)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GalleryEntry> {
        self.entries.iter()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of recognizing one face in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    /// Gallery label, or [`UNKNOWN_LABEL`].
    pub label: String,
    /// Winning normalized cross-correlation score; 0.0 when unknown.
    pub score: f32,
}

impl Recognition {
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            score: 0.0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.label != UNKNOWN_LABEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn canonical(value: u8) -> CanonicalFace {
        CanonicalFace::from_normalized(GrayImage::from_pixel(
            CANONICAL_SIZE,
            CANONICAL_SIZE,
            Luma([value]),
        ))
    }

    #[test]
    fn test_region_from_corners_clamps() {
        let r = Region::from_corners(-10.0, -5.0, 50.5, 40.2, 40, 30).unwrap();
        assert_eq!(r, Region::new(0, 0, 40, 30));
    }

    #[test]
    fn test_region_from_corners_outside_frame() {
        assert!(Region::from_corners(100.0, 100.0, 120.0, 130.0, 64, 64).is_none());
    }

    #[test]
    fn test_region_from_corners_swapped() {
        let r = Region::from_corners(20.0, 30.0, 10.0, 10.0, 64, 64).unwrap();
        assert_eq!(r, Region::new(10, 10, 10, 20));
    }

    #[test]
    fn test_region_clamp_partial() {
        let r = Region::new(50, 50, 100, 100).clamp_to(80, 60).unwrap();
        assert_eq!(r, Region::new(50, 50, 30, 10));
        assert!(Region::new(80, 0, 10, 10).clamp_to(80, 60).is_none());
    }

    #[test]
    fn test_region_crop_contents() {
        let frame = GrayImage::from_fn(10, 10, |x, y| Luma([(y * 10 + x) as u8]));
        let crop = Region::new(2, 3, 4, 2).crop(&frame).unwrap();
        assert_eq!(crop.dimensions(), (4, 2));
        assert_eq!(crop.get_pixel(0, 0)[0], 32);
        assert_eq!(crop.get_pixel(3, 1)[0], 45);
    }

    #[test]
    fn test_gallery_insert_replaces_in_place() {
        let mut gallery = Gallery::new();
        assert!(gallery.insert("alice", canonical(10)).is_none());
        assert!(gallery.insert("bob", canonical(20)).is_none());
        let replaced = gallery.insert("alice", canonical(30));

        assert_eq!(replaced, Some(canonical(10)));
        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery.labels().collect::<Vec<_>>(), vec!["alice", "bob"]);
        assert_eq!(gallery.get("alice"), Some(&canonical(30)));
    }

    #[test]
    fn test_recognition_unknown() {
        let r = Recognition::unknown();
        assert_eq!(r.label, UNKNOWN_LABEL);
        assert_eq!(r.score, 0.0);
        assert!(!r.is_known());
    }
}
