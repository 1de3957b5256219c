//! Plate detection: proposal backends plus the shared thresholding, NMS and
//! ranking applied to whatever they propose.

mod contour;
mod yolo;

pub use contour::ContourProposer;
pub use yolo::YoloProposer;

use crate::config::DetectorConfig;
use crate::error::RecognitionError;
use crate::geometry::{non_max_suppression, BoundingRegion};
use crate::image::Image;
use image::GrayImage;

/// Source of raw plate regions
pub trait RegionProposer: Send + Sync {
    /// Backend name reported in model info (e.g., "contour")
    fn name(&self) -> &'static str;

    /// Propose candidate regions with unfiltered confidences
    ///
    /// `gray` is the grayscale rendition of `image`, computed once per call.
    fn propose(&self, image: &Image, gray: &GrayImage) -> anyhow::Result<Vec<BoundingRegion>>;

    /// ONNX execution provider in use, for learned backends
    fn execution_provider(&self) -> Option<&str> {
        None
    }
}

pub struct PlateDetector {
    proposer: Box<dyn RegionProposer>,
    min_confidence: f32,
    iou_threshold: f32,
    max_candidates: usize,
}

impl PlateDetector {
    pub fn new(proposer: Box<dyn RegionProposer>, config: &DetectorConfig) -> Self {
        Self {
            proposer,
            min_confidence: config.min_confidence,
            iou_threshold: config.iou_threshold,
            max_candidates: config.max_candidates,
        }
    }

    pub fn proposer(&self) -> &dyn RegionProposer {
        self.proposer.as_ref()
    }

    /// Ranked plate candidates, best first. An empty list means no plate.
    pub fn detect(&self, image: &Image) -> Result<Vec<BoundingRegion>, RecognitionError> {
        let gray = image.to_luma();
        self.detect_with_gray(image, &gray)
    }

    pub(crate) fn detect_with_gray(
        &self,
        image: &Image,
        gray: &GrayImage,
    ) -> Result<Vec<BoundingRegion>, RecognitionError> {
        let proposals = self
            .proposer
            .propose(image, gray)
            .map_err(RecognitionError::Detector)?;
        let proposed = proposals.len();

        let confident: Vec<BoundingRegion> = proposals
            .into_iter()
            .map(|r| BoundingRegion::new(r.quad, r.confidence))
            .filter(|r| r.confidence >= self.min_confidence)
            .collect();

        let mut candidates = non_max_suppression(confident, self.iou_threshold);
        candidates.truncate(self.max_candidates);

        tracing::debug!(
            proposer = self.proposer.name(),
            proposed,
            candidates = candidates.len(),
            "Plate detection finished"
        );

        Ok(candidates)
    }
}
