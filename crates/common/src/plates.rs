//! Plate recognition contracts shared by the engine, the HTTP service and the CLI.
//!
//! This module defines the outcome of a recognition call and the wire types
//! the service exchanges with its callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal text reported when no plate was recognized
pub const NO_PLATE_SENTINEL: &str = "NoPlate";

/// Axis-aligned bounding box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Physical layout of the characters on a plate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlateLayout {
    /// All characters on one line
    SingleRow,

    /// Two stacked lines, read top line first
    TwoRow,
}

/// Outcome of one recognition call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlateResult {
    /// A candidate survived every stage
    Accepted {
        /// Recognized characters, never empty
        text: String,

        /// Aggregate glyph confidence (0.0 to 1.0)
        confidence: f32,

        /// Layout decided by the segmenter
        layout: PlateLayout,

        /// Confidence of the detection the text was read from
        detection_confidence: f32,
    },

    /// No candidate met the acceptance criteria
    NoPlate,
}

impl PlateResult {
    pub fn is_plate(&self) -> bool {
        matches!(self, PlateResult::Accepted { .. })
    }

    /// Recognized text, or the `NoPlate` sentinel
    pub fn as_text(&self) -> &str {
        match self {
            PlateResult::Accepted { text, .. } => text,
            PlateResult::NoPlate => NO_PLATE_SENTINEL,
        }
    }

    pub fn confidence(&self) -> Option<f32> {
        match self {
            PlateResult::Accepted { confidence, .. } => Some(*confidence),
            PlateResult::NoPlate => None,
        }
    }
}

impl fmt::Display for PlateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}

/// JSON request carrying a base64 encoded image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizeRequest {
    /// Encoded image bytes (jpeg, png, ...) in standard base64
    pub image: String,

    /// Optional caller-side identifier echoed in logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

/// Response returned by the recognition endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizePlateResponse {
    /// Recognized plate text or `NoPlate`
    pub license_plate: String,

    /// Wall-clock processing time, rounded to two decimals
    pub processing_time_seconds: f64,

    /// Aggregate confidence when a plate was recognized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,

    /// Number of detector candidates the pipeline looked at
    #[serde(default)]
    pub candidates_evaluated: usize,
}

impl RecognizePlateResponse {
    pub fn new(result: &PlateResult, processing_time_seconds: f64, candidates_evaluated: usize) -> Self {
        Self {
            license_plate: result.as_text().to_string(),
            processing_time_seconds: (processing_time_seconds * 100.0).round() / 100.0,
            confidence: result.confidence(),
            candidates_evaluated,
        }
    }
}

/// Description of a loaded recognition model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Region proposer backend (e.g., "contour", "yolo")
    pub detector: String,

    /// Glyph classifier backend (e.g., "template", "onnx")
    pub classifier: String,

    /// Closed set of symbols the classifier can emit
    pub alphabet: String,

    /// Accepted plate length range (inclusive)
    pub min_length: usize,
    pub max_length: usize,

    /// Regex every accepted plate must match
    pub format_pattern: String,

    /// Aggregate confidence required for acceptance
    pub acceptance_threshold: f32,

    /// ONNX execution provider actually in use, if any model is ONNX backed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_provider: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plate_result_serialization() {
        let result = PlateResult::Accepted {
            text: "51F12345".to_string(),
            confidence: 0.91,
            layout: PlateLayout::SingleRow,
            detection_confidence: 0.88,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "accepted");
        assert_eq!(json["text"], "51F12345");
        assert_eq!(json["layout"], "single_row");

        let deserialized: PlateResult = serde_json::from_value(json).unwrap();
        assert_eq!(deserialized, result);

        let none = serde_json::to_value(PlateResult::NoPlate).unwrap();
        assert_eq!(none["status"], "no_plate");
    }

    #[test]
    fn test_sentinel_text() {
        assert_eq!(PlateResult::NoPlate.as_text(), "NoPlate");
        assert_eq!(PlateResult::NoPlate.to_string(), NO_PLATE_SENTINEL);
        assert!(!PlateResult::NoPlate.is_plate());
        assert_eq!(PlateResult::NoPlate.confidence(), None);
    }

    #[test]
    fn test_response_rounds_latency() {
        let result = PlateResult::Accepted {
            text: "59X112345".to_string(),
            confidence: 0.75,
            layout: PlateLayout::TwoRow,
            detection_confidence: 0.9,
        };

        let response = RecognizePlateResponse::new(&result, 0.12789, 2);
        assert_eq!(response.license_plate, "59X112345");
        assert_eq!(response.processing_time_seconds, 0.13);
        assert_eq!(response.confidence, Some(0.75));
        assert_eq!(response.candidates_evaluated, 2);

        let json = serde_json::to_value(RecognizePlateResponse::new(&PlateResult::NoPlate, 0.5, 0)).unwrap();
        assert_eq!(json["license_plate"], "NoPlate");
        assert!(json.get("confidence").is_none());
    }

    #[test]
    fn test_bounding_box_extents() {
        let bbox = BoundingBox {
            x: 10,
            y: 20,
            width: 30,
            height: 5,
        };
        assert_eq!(bbox.area(), 150);
        assert_eq!(bbox.right(), 40);
        assert_eq!(bbox.bottom(), 25);
    }
}
