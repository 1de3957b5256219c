//! Recognition model configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields the classical contour + template pipeline tuned for Vietnamese
//! plates.

use crate::error::ModelLoadError;
use common::validation;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognitionConfig {
    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub rectifier: RectifierConfig,

    #[serde(default)]
    pub segmenter: SegmenterConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub assembler: AssemblerConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

// ============================================================================
// Detector
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorBackend {
    /// Classical contour analysis, no model file
    #[default]
    Contour,
    /// Single-class YOLOv8 ONNX model
    Yolo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub backend: DetectorBackend,

    /// Regions below this confidence are discarded (0.0 to 1.0)
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// IoU threshold for NMS
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,

    /// Maximum number of candidates handed to the rest of the pipeline
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    #[serde(default)]
    pub contour: ContourConfig,

    #[serde(default)]
    pub yolo: YoloConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContourConfig {
    /// Images whose gray range is narrower than this have no plate
    #[serde(default = "default_min_contrast")]
    pub min_contrast: u8,

    /// Smallest region, as a fraction of the image area
    #[serde(default = "default_min_area_ratio")]
    pub min_area_ratio: f32,

    /// Largest region, as a fraction of the image area
    #[serde(default = "default_max_area_ratio")]
    pub max_area_ratio: f32,

    /// Smallest region in pixels
    #[serde(default = "default_min_area_px")]
    pub min_area_px: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoloConfig {
    /// Path to the plate detection ONNX model file
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Model input size (width and height)
    #[serde(default = "default_detection_input_size")]
    pub input_size: u32,

    /// Raw predictions below this score are dropped before NMS
    #[serde(default = "default_proposal_floor")]
    pub proposal_floor: f32,
}

// ============================================================================
// Rectifier / Segmenter
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RectifierConfig {
    /// Regions smaller than this many square pixels are degenerate
    #[serde(default = "default_min_quad_area")]
    pub min_area: f32,

    #[serde(default = "default_single_row_width")]
    pub single_row_width: u32,

    #[serde(default = "default_single_row_height")]
    pub single_row_height: u32,

    #[serde(default = "default_two_row_width")]
    pub two_row_width: u32,

    #[serde(default = "default_two_row_height")]
    pub two_row_height: u32,

    /// Regions with a width/height ratio below this use the two-row canvas
    #[serde(default = "default_two_row_max_aspect")]
    pub two_row_max_aspect: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    #[serde(default = "default_min_contrast")]
    pub min_contrast: u8,

    /// Glyph height bounds relative to the plate height
    #[serde(default = "default_min_height_ratio")]
    pub min_height_ratio: f32,

    #[serde(default = "default_max_height_ratio")]
    pub max_height_ratio: f32,

    /// Components with fewer ink pixels are noise
    #[serde(default = "default_min_pixels")]
    pub min_pixels: u32,

    /// Allowed relative deviation from the median glyph height
    #[serde(default = "default_height_tolerance")]
    pub height_tolerance: f32,

    /// Components wider than `split_aspect * height` are merged glyphs
    #[serde(default = "default_split_aspect")]
    pub split_aspect: f32,

    /// Expected glyph width relative to its height, used to count splits
    #[serde(default = "default_glyph_width_ratio")]
    pub glyph_width_ratio: f32,

    /// A centre gap above `row_gap_ratio * median height` separates two rows
    #[serde(default = "default_row_gap_ratio")]
    pub row_gap_ratio: f32,

    /// Stacked ink fragments closer than this share of the plate height are
    /// one broken glyph
    #[serde(default = "default_fragment_gap_ratio")]
    pub fragment_gap_ratio: f32,
}

// ============================================================================
// Classifier / Assembler
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackend {
    /// Built-in plate font, no model file
    #[default]
    Template,
    /// ONNX CNN scoring one glyph at a time
    Onnx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub backend: ClassifierBackend,

    /// Closed symbol set, in model output order
    #[serde(default = "default_alphabet")]
    pub alphabet: String,

    /// Glyphs below this confidence are flagged as uncertain
    #[serde(default = "default_min_glyph_confidence")]
    pub min_glyph_confidence: f32,

    /// Path to the glyph classifier ONNX model file
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_glyph_input_size")]
    pub input_width: u32,

    #[serde(default = "default_glyph_input_size")]
    pub input_height: u32,

    /// Apply softmax to raw logits
    #[serde(default = "default_true")]
    pub apply_softmax: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Min,
    Mean,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Aggregate confidence required for acceptance (0.0 to 1.0)
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f32,

    #[serde(default)]
    pub aggregation: Aggregation,

    /// Regex an accepted plate must match
    #[serde(default = "default_format_pattern")]
    pub format_pattern: String,

    /// Retry a format mismatch after swapping look-alike characters by position
    #[serde(default = "default_true")]
    pub coerce_confusables: bool,
}

// ============================================================================
// ONNX Runtime
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Execution provider preference (CPU, CUDA, TensorRT)
    #[serde(default = "default_execution_provider")]
    pub execution_provider: String,

    /// GPU device ID (0, 1, 2, etc.)
    #[serde(default = "default_device_id")]
    pub device_id: i32,

    /// Number of intra-operation threads
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    /// Number of inter-operation threads
    #[serde(default = "default_inter_threads")]
    pub inter_threads: usize,
}

fn default_min_confidence() -> f32 {
    0.5
}

fn default_iou_threshold() -> f32 {
    0.4
}

fn default_max_candidates() -> usize {
    10
}

fn default_min_contrast() -> u8 {
    32
}

fn default_min_area_ratio() -> f32 {
    0.002
}

fn default_max_area_ratio() -> f32 {
    0.9
}

fn default_min_area_px() -> f32 {
    100.0
}

fn default_detection_input_size() -> u32 {
    640
}

fn default_proposal_floor() -> f32 {
    0.05
}

fn default_min_quad_area() -> f32 {
    64.0
}

fn default_single_row_width() -> u32 {
    376
}

fn default_single_row_height() -> u32 {
    80
}

fn default_two_row_width() -> u32 {
    280
}

fn default_two_row_height() -> u32 {
    200
}

fn default_two_row_max_aspect() -> f32 {
    2.6
}

fn default_min_height_ratio() -> f32 {
    0.2
}

fn default_max_height_ratio() -> f32 {
    0.95
}

fn default_min_pixels() -> u32 {
    12
}

fn default_height_tolerance() -> f32 {
    0.35
}

fn default_split_aspect() -> f32 {
    1.0
}

fn default_glyph_width_ratio() -> f32 {
    0.65
}

fn default_row_gap_ratio() -> f32 {
    0.5
}

fn default_fragment_gap_ratio() -> f32 {
    0.04
}

fn default_alphabet() -> String {
    "0123456789ABCDEFGHKLMNPSTUVXYZ".to_string()
}

fn default_min_glyph_confidence() -> f32 {
    0.3
}

fn default_glyph_input_size() -> u32 {
    28
}

fn default_true() -> bool {
    true
}

fn default_min_length() -> usize {
    7
}

fn default_max_length() -> usize {
    9
}

fn default_acceptance_threshold() -> f32 {
    0.5
}

fn default_format_pattern() -> String {
    "^[0-9]{2}[A-Z][A-Z0-9]?[0-9]{4,5}$".to_string()
}

fn default_execution_provider() -> String {
    "CUDA".to_string()
}

fn default_device_id() -> i32 {
    0
}

fn default_intra_threads() -> usize {
    4
}

fn default_inter_threads() -> usize {
    1
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            backend: DetectorBackend::default(),
            min_confidence: default_min_confidence(),
            iou_threshold: default_iou_threshold(),
            max_candidates: default_max_candidates(),
            contour: ContourConfig::default(),
            yolo: YoloConfig::default(),
        }
    }
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            min_contrast: default_min_contrast(),
            min_area_ratio: default_min_area_ratio(),
            max_area_ratio: default_max_area_ratio(),
            min_area_px: default_min_area_px(),
        }
    }
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            input_size: default_detection_input_size(),
            proposal_floor: default_proposal_floor(),
        }
    }
}

impl Default for RectifierConfig {
    fn default() -> Self {
        Self {
            min_area: default_min_quad_area(),
            single_row_width: default_single_row_width(),
            single_row_height: default_single_row_height(),
            two_row_width: default_two_row_width(),
            two_row_height: default_two_row_height(),
            two_row_max_aspect: default_two_row_max_aspect(),
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_contrast: default_min_contrast(),
            min_height_ratio: default_min_height_ratio(),
            max_height_ratio: default_max_height_ratio(),
            min_pixels: default_min_pixels(),
            height_tolerance: default_height_tolerance(),
            split_aspect: default_split_aspect(),
            glyph_width_ratio: default_glyph_width_ratio(),
            row_gap_ratio: default_row_gap_ratio(),
            fragment_gap_ratio: default_fragment_gap_ratio(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ClassifierBackend::default(),
            alphabet: default_alphabet(),
            min_glyph_confidence: default_min_glyph_confidence(),
            model_path: None,
            input_width: default_glyph_input_size(),
            input_height: default_glyph_input_size(),
            apply_softmax: true,
        }
    }
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            acceptance_threshold: default_acceptance_threshold(),
            aggregation: Aggregation::default(),
            format_pattern: default_format_pattern(),
            coerce_confusables: true,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            execution_provider: default_execution_provider(),
            device_id: default_device_id(),
            intra_threads: default_intra_threads(),
            inter_threads: default_inter_threads(),
        }
    }
}

fn invalid(err: anyhow::Error) -> ModelLoadError {
    ModelLoadError::InvalidConfig(format!("{err:#}"))
}

impl RecognitionConfig {
    /// Load from an optional JSON file, apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self, ModelLoadError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ModelLoadError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ModelLoadError::InvalidConfig(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    /// Apply `LPR_EXECUTION_PROVIDER`, `LPR_DEVICE_ID` and `LPR_ACCEPTANCE_THRESHOLD`
    pub fn apply_env_overrides(&mut self) -> Result<(), ModelLoadError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ModelLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("LPR_EXECUTION_PROVIDER") {
            tracing::info!(provider = %provider, "Execution provider overridden from environment");
            self.runtime.execution_provider = provider;
        }

        if let Some(device_id) = lookup("LPR_DEVICE_ID") {
            self.runtime.device_id = device_id.trim().parse().map_err(|_| {
                ModelLoadError::InvalidConfig(format!("LPR_DEVICE_ID is not an integer: {device_id}"))
            })?;
        }

        if let Some(threshold) = lookup("LPR_ACCEPTANCE_THRESHOLD") {
            self.assembler.acceptance_threshold = threshold.trim().parse().map_err(|_| {
                ModelLoadError::InvalidConfig(format!(
                    "LPR_ACCEPTANCE_THRESHOLD is not a number: {threshold}"
                ))
            })?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ModelLoadError> {
        let detector = &self.detector;
        validation::validate_unit_interval(detector.min_confidence, "detector.min_confidence")
            .map_err(invalid)?;
        validation::validate_unit_interval(detector.iou_threshold, "detector.iou_threshold")
            .map_err(invalid)?;
        validation::validate_range(detector.max_candidates, 1, 100, "detector.max_candidates")
            .map_err(invalid)?;
        validation::validate_unit_interval(detector.contour.min_area_ratio, "detector.contour.min_area_ratio")
            .map_err(invalid)?;
        validation::validate_unit_interval(detector.contour.max_area_ratio, "detector.contour.max_area_ratio")
            .map_err(invalid)?;
        if detector.contour.min_area_ratio >= detector.contour.max_area_ratio {
            return Err(ModelLoadError::InvalidConfig(
                "detector.contour.min_area_ratio must be below max_area_ratio".to_string(),
            ));
        }
        validation::validate_unit_interval(detector.yolo.proposal_floor, "detector.yolo.proposal_floor")
            .map_err(invalid)?;
        validation::validate_range(detector.yolo.input_size, 32, 4096, "detector.yolo.input_size")
            .map_err(invalid)?;

        let rectifier = &self.rectifier;
        for (value, field) in [
            (rectifier.single_row_width, "rectifier.single_row_width"),
            (rectifier.single_row_height, "rectifier.single_row_height"),
            (rectifier.two_row_width, "rectifier.two_row_width"),
            (rectifier.two_row_height, "rectifier.two_row_height"),
        ] {
            validation::validate_range(value, 16, 2048, field).map_err(invalid)?;
        }
        if rectifier.min_area.is_nan() || rectifier.min_area < 0.0 {
            return Err(ModelLoadError::InvalidConfig(
                "rectifier.min_area must be non-negative".to_string(),
            ));
        }

        let segmenter = &self.segmenter;
        validation::validate_unit_interval(segmenter.min_height_ratio, "segmenter.min_height_ratio")
            .map_err(invalid)?;
        validation::validate_unit_interval(segmenter.max_height_ratio, "segmenter.max_height_ratio")
            .map_err(invalid)?;
        if segmenter.min_height_ratio >= segmenter.max_height_ratio {
            return Err(ModelLoadError::InvalidConfig(
                "segmenter.min_height_ratio must be below max_height_ratio".to_string(),
            ));
        }
        validation::validate_unit_interval(segmenter.height_tolerance, "segmenter.height_tolerance")
            .map_err(invalid)?;
        validation::validate_range(segmenter.split_aspect, 0.25, 10.0, "segmenter.split_aspect")
            .map_err(invalid)?;
        validation::validate_range(segmenter.glyph_width_ratio, 0.1, 2.0, "segmenter.glyph_width_ratio")
            .map_err(invalid)?;
        validation::validate_range(segmenter.row_gap_ratio, 0.05, 5.0, "segmenter.row_gap_ratio")
            .map_err(invalid)?;
        validation::validate_range(segmenter.fragment_gap_ratio, 0.0, 0.25, "segmenter.fragment_gap_ratio")
            .map_err(invalid)?;

        let classifier = &self.classifier;
        validate_alphabet(&classifier.alphabet)?;
        validation::validate_unit_interval(
            classifier.min_glyph_confidence,
            "classifier.min_glyph_confidence",
        )
        .map_err(invalid)?;
        validation::validate_range(classifier.input_width, 4, 512, "classifier.input_width")
            .map_err(invalid)?;
        validation::validate_range(classifier.input_height, 4, 512, "classifier.input_height")
            .map_err(invalid)?;

        let assembler = &self.assembler;
        validation::validate_length_range(assembler.min_length, assembler.max_length)
            .map_err(invalid)?;
        validation::validate_unit_interval(
            assembler.acceptance_threshold,
            "assembler.acceptance_threshold",
        )
        .map_err(invalid)?;
        validation::validate_regex_pattern(&assembler.format_pattern).map_err(invalid)?;

        if self.detector.backend == DetectorBackend::Yolo {
            let path = self.detector.yolo.model_path.as_deref().ok_or(
                ModelLoadError::MissingModelPath {
                    backend: "yolo",
                    field: "detector.yolo.model_path",
                },
            )?;
            validation::validate_model_path(path, "detector.yolo.model_path").map_err(invalid)?;
        }

        if self.classifier.backend == ClassifierBackend::Onnx {
            let path = self.classifier.model_path.as_deref().ok_or(
                ModelLoadError::MissingModelPath {
                    backend: "onnx",
                    field: "classifier.model_path",
                },
            )?;
            validation::validate_model_path(path, "classifier.model_path").map_err(invalid)?;
        }

        Ok(())
    }
}

fn validate_alphabet(alphabet: &str) -> Result<(), ModelLoadError> {
    validation::validate_non_empty(alphabet, "classifier.alphabet").map_err(invalid)?;

    let mut seen = HashSet::new();
    for symbol in alphabet.chars() {
        if symbol.is_whitespace() || symbol.is_control() {
            return Err(ModelLoadError::InvalidConfig(
                "classifier.alphabet must not contain whitespace".to_string(),
            ));
        }
        if !seen.insert(symbol) {
            return Err(ModelLoadError::InvalidConfig(format!(
                "classifier.alphabet repeats symbol '{symbol}'"
            )));
        }
    }
    Ok(())
}
