use crate::presenter::{PresentError, Presenter};
use facerec_core::{
    normalize, DetectorError, FaceLocator, Gallery, Matcher, NormalizeError, Recognition, Region,
};
use facerec_hw::{Frame, FrameSource, SourceError};
use image::GrayImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("frame source failed: {0}")]
    Source(#[from] SourceError),
    #[error("face locator failed: {0}")]
    Locator(#[from] DetectorError),
    #[error("presenter failed: {0}")]
    Present(#[from] PresentError),
}

/// A recognized face region, handed to the presenter.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub region: Region,
    pub recognition: Recognition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The presenter reported an exit request.
    UserExit,
    /// The frame source ran out of frames.
    EndOfStream,
}

/// Counters for a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub faces: u64,
    pub recognized: u64,
    pub stop: StopReason,
}

/// The recognition loop: frame → regions → normalize → match → present.
///
/// Borrows an immutable gallery for the whole run; holds no state between
/// frames.
pub struct Engine<'g, M: Matcher> {
    gallery: &'g Gallery,
    matcher: M,
}

impl<'g, M: Matcher> Engine<'g, M> {
    pub fn new(gallery: &'g Gallery, matcher: M) -> Self {
        Self { gallery, matcher }
    }

    /// Normalize a face crop and match it against the gallery.
    pub fn identify(&self, face: &GrayImage) -> Result<Recognition, NormalizeError> {
        let probe = normalize(face)?;
        Ok(self.matcher.compare(&probe, self.gallery))
    }

    /// Locate and recognize every face in one frame.
    ///
    /// Regions that fall outside the frame are dropped.
    pub fn process_frame(
        &self,
        frame: &Frame,
        locator: &mut dyn FaceLocator,
    ) -> Result<Vec<Annotation>, EngineError> {
        let regions = locator.locate(&frame.image)?;
        if !regions.is_empty() {
            tracing::debug!(seq = frame.sequence, faces = regions.len(), "faces detected");
        }

        let mut annotations = Vec::with_capacity(regions.len());
        for region in regions {
            let Some(crop) = region.crop(&frame.image) else {
                tracing::debug!(?region, "region outside frame, skipped");
                continue;
            };
            let recognition = match self.identify(&crop) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(?region, error = %e, "cannot normalize face region");
                    continue;
                }
            };
            tracing::debug!(
                seq = frame.sequence,
                label = %recognition.label,
                score = recognition.score,
                "recognized face"
            );
            annotations.push(Annotation {
                region,
                recognition,
            });
        }

        Ok(annotations)
    }

    /// Run until the presenter asks to exit or the source ends.
    ///
    /// The presenter is polled once at the top of every iteration. Source,
    /// locator, and presenter failures end the run with an error.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        locator: &mut dyn FaceLocator,
        presenter: &mut dyn Presenter,
    ) -> Result<RunSummary, EngineError> {
        let (mut frames, mut faces, mut recognized) = (0u64, 0u64, 0u64);

        let stop = loop {
            if presenter.exit_requested() {
                break StopReason::UserExit;
            }
            let Some(frame) = source.next_frame()? else {
                break StopReason::EndOfStream;
            };

            let annotations = self.process_frame(&frame, locator)?;
            frames += 1;
            faces += annotations.len() as u64;
            recognized += annotations.iter().filter(|a| a.recognition.is_known()).count() as u64;

            presenter.present(&frame, &annotations)?;
        };

        let summary = RunSummary {
            frames,
            faces,
            recognized,
            stop,
        };
        tracing::info!(
            frames,
            faces,
            recognized,
            stop = ?summary.stop,
            "recognition loop stopped"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facerec_core::{Recognizer, UNKNOWN_LABEL};
    use image::Luma;
    use std::collections::VecDeque;

    const FACE: Region = Region {
        x: 40,
        y: 20,
        width: 100,
        height: 110,
    };

    /// 200×160 flat frame with a textured patch where the face sits.
    fn scene() -> GrayImage {
        GrayImage::from_fn(200, 160, |x, y| {
            let inside = x >= FACE.x
                && x < FACE.x + FACE.width
                && y >= FACE.y
                && y < FACE.y + FACE.height;
            if inside {
                let (u, v) = (x as f32, y as f32);
                let value = 128.0
                    + 70.0 * (u * 0.11).sin() * (v * 0.07).cos()
                    + 30.0 * ((u + v) * 0.05).sin();
                Luma([value.round().clamp(0.0, 255.0) as u8])
            } else {
                Luma([90])
            }
        })
    }

    fn alice_gallery() -> Gallery {
        let mut gallery = Gallery::new();
        gallery.insert("alice", normalize(&FACE.crop(&scene()).unwrap()).unwrap());
        gallery
    }

    struct Frames(VecDeque<Frame>);

    impl Frames {
        fn repeat(n: u32) -> Self {
            Self((0..n).map(|i| Frame::new(scene(), i)).collect())
        }
    }

    impl FrameSource for Frames {
        fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
            Ok(self.0.pop_front())
        }
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
            Err(SourceError::Io {
                path: "/dev/video0".into(),
                source: std::io::Error::other("unplugged"),
            })
        }
    }

    struct FixedLocator(Vec<Region>);

    impl FaceLocator for FixedLocator {
        fn locate(&mut self, _frame: &GrayImage) -> Result<Vec<Region>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    struct FailingLocator;

    impl FaceLocator for FailingLocator {
        fn locate(&mut self, _frame: &GrayImage) -> Result<Vec<Region>, DetectorError> {
            Err(DetectorError::InferenceFailed("boom".into()))
        }
    }

    #[derive(Default)]
    struct Recorder {
        presented: Vec<Vec<Annotation>>,
        exit_after: Option<usize>,
    }

    impl Presenter for Recorder {
        fn present(&mut self, _frame: &Frame, annotations: &[Annotation]) -> Result<(), PresentError> {
            self.presented.push(annotations.to_vec());
            Ok(())
        }

        fn exit_requested(&mut self) -> bool {
            self.exit_after.is_some_and(|n| self.presented.len() >= n)
        }
    }

    #[test]
    fn test_run_until_end_of_stream() {
        let gallery = alice_gallery();
        let engine = Engine::new(&gallery, Recognizer::default());
        let mut presenter = Recorder::default();

        let summary = engine
            .run(&mut Frames::repeat(3), &mut FixedLocator(vec![FACE]), &mut presenter)
            .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                frames: 3,
                faces: 3,
                recognized: 3,
                stop: StopReason::EndOfStream,
            }
        );
        assert_eq!(presenter.presented.len(), 3);
        let first = &presenter.presented[0][0];
        assert_eq!(first.region, FACE);
        assert_eq!(first.recognition.label, "alice");
        assert!(first.recognition.score > 0.99);
    }

    #[test]
    fn test_exit_checked_before_each_frame() {
        let gallery = alice_gallery();
        let engine = Engine::new(&gallery, Recognizer::default());
        let mut presenter = Recorder {
            exit_after: Some(2),
            ..Recorder::default()
        };
        let mut source = Frames::repeat(10);

        let summary = engine
            .run(&mut source, &mut FixedLocator(vec![FACE]), &mut presenter)
            .unwrap();

        assert_eq!(summary.stop, StopReason::UserExit);
        assert_eq!(summary.frames, 2);
        assert_eq!(source.0.len(), 8);
    }

    #[test]
    fn test_frame_without_faces_still_presented() {
        let gallery = alice_gallery();
        let engine = Engine::new(&gallery, Recognizer::default());
        let mut presenter = Recorder::default();

        let summary = engine
            .run(&mut Frames::repeat(2), &mut FixedLocator(vec![]), &mut presenter)
            .unwrap();

        assert_eq!(summary.faces, 0);
        assert_eq!(presenter.presented, vec![Vec::<Annotation>::new(); 2]);
    }

    #[test]
    fn test_empty_gallery_reports_unknown() {
        let gallery = Gallery::new();
        let engine = Engine::new(&gallery, Recognizer::default());
        let mut presenter = Recorder::default();

        let summary = engine
            .run(&mut Frames::repeat(1), &mut FixedLocator(vec![FACE]), &mut presenter)
            .unwrap();

        assert_eq!(summary.faces, 1);
        assert_eq!(summary.recognized, 0);
        assert_eq!(presenter.presented[0][0].recognition.label, UNKNOWN_LABEL);
    }

    #[test]
    fn test_background_region_is_unknown() {
        let gallery = alice_gallery();
        let engine = Engine::new(&gallery, Recognizer::default());
        let frame = Frame::new(scene(), 0);
        let background = Region::new(150, 100, 50, 60);

        let annotations = engine
            .process_frame(&frame, &mut FixedLocator(vec![background, FACE]))
            .unwrap();

        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].recognition.label, UNKNOWN_LABEL);
        assert_eq!(annotations[1].recognition.label, "alice");
    }

    #[test]
    fn test_region_outside_frame_skipped() {
        let gallery = alice_gallery();
        let engine = Engine::new(&gallery, Recognizer::default());
        let frame = Frame::new(scene(), 0);

        let annotations = engine
            .process_frame(&frame, &mut FixedLocator(vec![Region::new(500, 500, 10, 10)]))
            .unwrap();
        assert!(annotations.is_empty());
    }

    #[test]
    fn test_locator_failure_ends_run() {
        let gallery = alice_gallery();
        let engine = Engine::new(&gallery, Recognizer::default());
        let result = engine.run(&mut Frames::repeat(3), &mut FailingLocator, &mut Recorder::default());
        assert!(matches!(result, Err(EngineError::Locator(_))));
    }

    #[test]
    fn test_source_failure_ends_run() {
        let gallery = alice_gallery();
        let engine = Engine::new(&gallery, Recognizer::default());
        let result = engine.run(&mut FailingSource, &mut FixedLocator(vec![]), &mut Recorder::default());
        assert!(matches!(result, Err(EngineError::Source(_))));
    }

    #[test]
    fn test_identify_whole_image() {
        let gallery = alice_gallery();
        let engine = Engine::new(&gallery, Recognizer::default());
        let face = FACE.crop(&scene()).unwrap();
        assert_eq!(engine.identify(&face).unwrap().label, "alice");
        assert!(engine.identify(&GrayImage::new(0, 0)).is_err());
    }
}
