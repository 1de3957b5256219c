//! The per-image recognition run: detect, then try candidates best first
//! until one assembles into an accepted plate.

use crate::assembler::{Assembler, Assembly, RejectReason};
use crate::classifier::{ClassifiedGlyph, GlyphClassifier};
use crate::detector::PlateDetector;
use crate::error::{RecognitionError, RectificationFailed};
use crate::image::Image;
use crate::rectifier::Rectifier;
use crate::segmenter::Segmenter;
use common::plates::{PlateLayout, PlateResult};
use std::fmt;

/// What became of one detector candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    RectificationFailed(RectificationFailed),
    NoGlyphs,
    Rejected { text: String, reason: RejectReason },
    Accepted { text: String, confidence: f32 },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::RectificationFailed(err) => write!(f, "rectification failed: {err}"),
            Outcome::NoGlyphs => write!(f, "no glyphs"),
            Outcome::Rejected { text, reason } => write!(f, "rejected '{text}': {reason}"),
            Outcome::Accepted { text, .. } => write!(f, "accepted '{text}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateOutcome {
    /// Position in the detector ranking, 0 for the best
    pub rank: usize,
    pub detection_confidence: f32,
    pub layout: Option<PlateLayout>,
    pub glyphs: usize,
    pub outcome: Outcome,
}

/// Result of one run plus the trace of every candidate tried
#[derive(Debug, Clone)]
pub struct Recognition {
    pub result: PlateResult,
    pub outcomes: Vec<CandidateOutcome>,
}

impl Recognition {
    pub fn candidates_evaluated(&self) -> usize {
        self.outcomes.len()
    }
}

pub(crate) struct Pipeline {
    pub(crate) detector: PlateDetector,
    pub(crate) rectifier: Rectifier,
    pub(crate) segmenter: Segmenter,
    pub(crate) classifier: Box<dyn GlyphClassifier>,
    pub(crate) assembler: Assembler,
    pub(crate) min_glyph_confidence: f32,
}

impl Pipeline {
    pub(crate) fn run(&self, image: &Image) -> Result<Recognition, RecognitionError> {
        let gray = image.to_luma();
        let candidates = self.detector.detect_with_gray(image, &gray)?;
        if candidates.is_empty() {
            tracing::debug!("No plate candidates");
        }

        let mut outcomes = Vec::with_capacity(candidates.len());
        for (rank, region) in candidates.iter().enumerate() {
            let mut trace = CandidateOutcome {
                rank,
                detection_confidence: region.confidence,
                layout: None,
                glyphs: 0,
                outcome: Outcome::NoGlyphs,
            };

            let plate = match self.rectifier.rectify(&gray, region) {
                Ok(plate) => plate,
                Err(err) => {
                    tracing::debug!(rank, confidence = region.confidence, error = %err, "Candidate skipped");
                    trace.outcome = Outcome::RectificationFailed(err);
                    outcomes.push(trace);
                    continue;
                }
            };

            let segmentation = self.segmenter.segment(&plate);
            trace.layout = Some(segmentation.layout);
            trace.glyphs = segmentation.glyphs.len();
            if segmentation.glyphs.is_empty() {
                tracing::debug!(rank, confidence = region.confidence, "Candidate has no glyphs");
                outcomes.push(trace);
                continue;
            }

            let glyphs = segmentation
                .glyphs
                .into_iter()
                .map(|glyph| self.classifier.classify(glyph))
                .collect::<anyhow::Result<Vec<ClassifiedGlyph>>>()
                .map_err(RecognitionError::Classifier)?;

            let weak = glyphs
                .iter()
                .filter(|g| !g.is_confident(self.min_glyph_confidence))
                .count();
            if weak > 0 {
                tracing::debug!(rank, weak, "Candidate has low-confidence glyphs");
            }

            match self.assembler.assemble(&glyphs) {
                Assembly::Accepted { text, confidence } => {
                    tracing::debug!(rank, text = %text, confidence, "Candidate accepted");
                    trace.outcome = Outcome::Accepted {
                        text: text.clone(),
                        confidence,
                    };
                    outcomes.push(trace);

                    return Ok(Recognition {
                        result: PlateResult::Accepted {
                            text,
                            confidence,
                            layout: segmentation.layout,
                            detection_confidence: region.confidence,
                        },
                        outcomes,
                    });
                }
                Assembly::Rejected(reason) => {
                    let text: String = glyphs.iter().map(|g| g.label).collect();
                    tracing::debug!(rank, text = %text, reason = %reason, "Candidate rejected");
                    trace.outcome = Outcome::Rejected { text, reason };
                    outcomes.push(trace);
                }
            }
        }

        Ok(Recognition {
            result: PlateResult::NoPlate,
            outcomes,
        })
    }
}
