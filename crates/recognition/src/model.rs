use crate::assembler::Assembler;
use crate::classifier::{Alphabet, GlyphClassifier, OnnxGlyphClassifier, TemplateClassifier};
use crate::config::{ClassifierBackend, DetectorBackend, RecognitionConfig};
use crate::detector::{ContourProposer, PlateDetector, RegionProposer, YoloProposer};
use crate::error::{ModelLoadError, RecognitionError};
use crate::image::Image;
use crate::pipeline::{Pipeline, Recognition};
use crate::rectifier::Rectifier;
use crate::segmenter::Segmenter;
use common::plates::{ModelInfo, PlateResult};
use std::path::Path;
use std::time::Instant;

/// Loaded recognition engine. Immutable after construction and safe to share
/// across threads behind an `Arc`.
pub struct RecognitionModel {
    config: RecognitionConfig,
    pipeline: Pipeline,
}

/// Validate `config`, build the configured backends and load any ONNX weights
pub fn initialize(config: RecognitionConfig) -> Result<RecognitionModel, ModelLoadError> {
    let started = Instant::now();
    config.validate()?;

    let proposer: Box<dyn RegionProposer> = match config.detector.backend {
        DetectorBackend::Contour => Box::new(ContourProposer::new(config.detector.contour.clone())),
        DetectorBackend::Yolo => {
            let proposer = YoloProposer::load(&config.detector.yolo, &config.runtime)
                .map_err(|source| session_error(config.detector.yolo.model_path.as_deref(), source))?;
            Box::new(proposer)
        }
    };

    let alphabet = Alphabet::new(&config.classifier.alphabet)
        .map_err(|e| ModelLoadError::InvalidConfig(format!("{e:#}")))?;
    let classifier: Box<dyn GlyphClassifier> = match config.classifier.backend {
        ClassifierBackend::Template => Box::new(TemplateClassifier::new(alphabet)?),
        ClassifierBackend::Onnx => {
            let classifier = OnnxGlyphClassifier::load(&config.classifier, alphabet, &config.runtime)
                .map_err(|source| session_error(config.classifier.model_path.as_deref(), source))?;
            Box::new(classifier)
        }
    };

    let model = RecognitionModel::new(config, proposer, classifier)?;
    let info = model.info();
    tracing::info!(
        detector = %info.detector,
        classifier = %info.classifier,
        provider = info.execution_provider.as_deref().unwrap_or("none"),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Recognition model loaded"
    );

    Ok(model)
}

fn session_error(path: Option<&Path>, source: anyhow::Error) -> ModelLoadError {
    ModelLoadError::Session {
        path: path.map(Path::to_path_buf).unwrap_or_default(),
        source,
    }
}

impl RecognitionModel {
    /// Assemble a model from already-built backends
    pub fn new(
        config: RecognitionConfig,
        proposer: Box<dyn RegionProposer>,
        classifier: Box<dyn GlyphClassifier>,
    ) -> Result<Self, ModelLoadError> {
        let pipeline = Pipeline {
            detector: PlateDetector::new(proposer, &config.detector),
            rectifier: Rectifier::new(config.rectifier.clone()),
            segmenter: Segmenter::new(config.segmenter.clone()),
            classifier,
            assembler: Assembler::new(config.assembler.clone())?,
            min_glyph_confidence: config.classifier.min_glyph_confidence,
        };

        Ok(Self { config, pipeline })
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// Recognize the plate in `image`, keeping the per-candidate trace
    pub fn recognize(&self, image: &Image) -> Result<Recognition, RecognitionError> {
        self.pipeline.run(image)
    }

    /// Plate text or `NoPlate`. Errors only on a backend fault.
    pub fn predict(&self, image: &Image) -> Result<PlateResult, RecognitionError> {
        Ok(self.recognize(image)?.result)
    }

    pub fn info(&self) -> ModelInfo {
        let proposer = self.pipeline.detector.proposer();
        let classifier = self.pipeline.classifier.as_ref();
        let assembler = self.pipeline.assembler.config();

        ModelInfo {
            detector: proposer.name().to_string(),
            classifier: classifier.name().to_string(),
            alphabet: classifier.alphabet().to_string(),
            min_length: assembler.min_length,
            max_length: assembler.max_length,
            format_pattern: assembler.format_pattern.clone(),
            acceptance_threshold: assembler.acceptance_threshold,
            execution_provider: proposer
                .execution_provider()
                .or_else(|| classifier.execution_provider())
                .map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::RejectReason;
    use crate::config::YoloConfig;
    use crate::detector::tests::FixedProposer;
    use crate::geometry::{BoundingRegion, Point2, Quad};
    use crate::pipeline::Outcome;
    use crate::synthetic::{render_plate, Scene};
    use anyhow::Result;
    use common::plates::PlateLayout;
    use image::GrayImage;
    use std::sync::Arc;

    const ALPHABET: &str = "0123456789ABCDEFGHKLMNPSTUVXYZ";

    struct FailingClassifier(Alphabet);

    impl GlyphClassifier for FailingClassifier {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn alphabet(&self) -> &Alphabet {
            &self.0
        }

        fn scores(&self, _patch: &GrayImage) -> Result<Vec<f32>> {
            anyhow::bail!("session poisoned")
        }
    }

    fn template() -> Box<dyn GlyphClassifier> {
        Box::new(TemplateClassifier::new(Alphabet::new(ALPHABET).unwrap()).unwrap())
    }

    fn model_with(regions: Vec<BoundingRegion>) -> RecognitionModel {
        RecognitionModel::new(
            RecognitionConfig::default(),
            Box::new(FixedProposer(regions)),
            template(),
        )
        .unwrap()
    }

    /// Two plates side by side; returns the image and their rectangles
    fn two_plate_scene() -> (Image, Quad, Quad) {
        let left = render_plate(&["51F12345"], 4).unwrap();
        let right = render_plate(&["30A67890"], 4).unwrap();
        let (w, h) = (left.width() as f32, left.height() as f32);

        let image = Scene::new(520, 120, 40)
            .place(&left, 20, 30)
            .place(&right, 280, 30)
            .into_image()
            .unwrap();

        (
            image,
            Quad::from_rect(20.0, 30.0, w - 1.0, h - 1.0),
            Quad::from_rect(280.0, 30.0, w - 1.0, h - 1.0),
        )
    }

    #[test]
    fn test_initialize_default_model() {
        let model = initialize(RecognitionConfig::default()).unwrap();
        let info = model.info();

        assert_eq!(info.detector, "contour");
        assert_eq!(info.classifier, "template");
        assert_eq!(info.alphabet, ALPHABET);
        assert_eq!(info.min_length, 7);
        assert_eq!(info.max_length, 9);
        assert!(info.execution_provider.is_none());
    }

    #[test]
    fn test_initialize_rejects_missing_model_path() {
        let mut config = RecognitionConfig::default();
        config.detector.backend = DetectorBackend::Yolo;
        config.detector.yolo = YoloConfig::default();

        assert!(matches!(
            initialize(config),
            Err(ModelLoadError::MissingModelPath { backend: "yolo", .. })
        ));
    }

    #[test]
    fn test_initialize_rejects_broken_model_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("glyphs.onnx");
        std::fs::write(&path, b"not a model").unwrap();

        let mut config = RecognitionConfig::default();
        config.classifier.backend = ClassifierBackend::Onnx;
        config.classifier.model_path = Some(path.clone());

        match initialize(config) {
            Err(ModelLoadError::Session { path: failed, .. }) => assert_eq!(failed, path),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("garbage model loaded"),
        }
    }

    #[test]
    fn test_no_candidates_is_no_plate() {
        let model = model_with(vec![]);
        let image = Scene::new(64, 32, 40).into_image().unwrap();

        let recognition = model.recognize(&image).unwrap();
        assert_eq!(recognition.result, PlateResult::NoPlate);
        assert_eq!(recognition.candidates_evaluated(), 0);
    }

    #[test]
    fn test_higher_detection_confidence_wins() {
        let (image, left, right) = two_plate_scene();

        let model = model_with(vec![
            BoundingRegion::new(left, 0.7),
            BoundingRegion::new(right, 0.9),
        ]);
        assert_eq!(model.predict(&image).unwrap().as_text(), "30A67890");

        let model = model_with(vec![
            BoundingRegion::new(left, 0.95),
            BoundingRegion::new(right, 0.6),
        ]);
        let recognition = model.recognize(&image).unwrap();
        assert_eq!(recognition.result.as_text(), "51F12345");
        assert_eq!(recognition.candidates_evaluated(), 1);
    }

    #[test]
    fn test_degenerate_candidate_does_not_abort() {
        let (image, left, _) = two_plate_scene();
        let collapsed = Quad::new([
            Point2::new(100.0, 50.0),
            Point2::new(200.0, 50.0),
            Point2::new(300.0, 50.0),
            Point2::new(150.0, 50.0),
        ]);

        let model = model_with(vec![
            BoundingRegion::new(collapsed, 0.99),
            BoundingRegion::new(left, 0.8),
        ]);
        let recognition = model.recognize(&image).unwrap();

        assert_eq!(recognition.result.as_text(), "51F12345");
        assert_eq!(
            recognition.outcomes[0].outcome,
            Outcome::RectificationFailed(crate::error::RectificationFailed::Degenerate)
        );
        assert_eq!(recognition.outcomes[1].layout, Some(PlateLayout::SingleRow));
    }

    #[test]
    fn test_rejected_candidate_falls_through_to_next() {
        let short = render_plate(&["51F123"], 4).unwrap();
        let full = render_plate(&["30A67890"], 4).unwrap();
        let image = Scene::new(520, 120, 40)
            .place(&short, 20, 30)
            .place(&full, 280, 30)
            .into_image()
            .unwrap();

        let rect = |x: f32, plate: &GrayImage| {
            Quad::from_rect(x, 30.0, plate.width() as f32 - 1.0, plate.height() as f32 - 1.0)
        };
        let model = model_with(vec![
            BoundingRegion::new(rect(20.0, &short), 0.95),
            BoundingRegion::new(rect(280.0, &full), 0.7),
        ]);
        let recognition = model.recognize(&image).unwrap();

        assert!(matches!(
            &recognition.outcomes[0].outcome,
            Outcome::Rejected {
                reason: RejectReason::Length { len: 6 },
                ..
            }
        ));
        assert_eq!(recognition.candidates_evaluated(), 2);
        assert_eq!(recognition.result.as_text(), "30A67890");
    }

    #[test]
    fn test_blank_candidate_is_no_plate() {
        let image = Scene::new(300, 100, 200).into_image().unwrap();
        let model = model_with(vec![BoundingRegion::new(
            Quad::from_rect(10.0, 10.0, 200.0, 44.0),
            0.9,
        )]);

        let recognition = model.recognize(&image).unwrap();
        assert_eq!(recognition.result, PlateResult::NoPlate);
        assert_eq!(recognition.outcomes[0].outcome, Outcome::NoGlyphs);
    }

    #[test]
    fn test_classifier_fault_is_an_error() {
        let (image, left, _) = two_plate_scene();
        let model = RecognitionModel::new(
            RecognitionConfig::default(),
            Box::new(FixedProposer(vec![BoundingRegion::new(left, 0.9)])),
            Box::new(FailingClassifier(Alphabet::new(ALPHABET).unwrap())),
        )
        .unwrap();

        assert!(matches!(
            model.predict(&image),
            Err(RecognitionError::Classifier(_))
        ));
    }

    #[test]
    fn test_predict_is_idempotent_and_shareable() {
        let (image, left, _) = two_plate_scene();
        let model = Arc::new(model_with(vec![BoundingRegion::new(left, 0.9)]));
        let image = Arc::new(image);

        let first = model.predict(&image).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let model = Arc::clone(&model);
                let image = Arc::clone(&image);
                std::thread::spawn(move || model.predict(&image).unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), first);
        }
        assert_eq!(first.as_text(), "51F12345");
    }
}
