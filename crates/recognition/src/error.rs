use std::path::PathBuf;
use thiserror::Error;

/// Failure while building a [`crate::RecognitionModel`]. Fatal at startup.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{backend} backend requires `{field}`")]
    MissingModelPath {
        backend: &'static str,
        field: &'static str,
    },

    #[error("failed to load ONNX model {}: {source:#}", path.display())]
    Session {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to build glyph templates: {0}")]
    Template(String),
}

/// Hard fault of a model backend during `predict`
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("plate detector failed: {0:#}")]
    Detector(#[source] anyhow::Error),

    #[error("glyph classifier failed: {0:#}")]
    Classifier(#[source] anyhow::Error),
}

/// Why a candidate region could not be warped onto the canonical canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RectificationFailed {
    #[error("region is degenerate (too small or collapsed side)")]
    Degenerate,

    #[error("region corners do not form a convex quadrilateral")]
    SelfIntersecting,

    #[error("no projective transform exists for the region")]
    NoProjection,
}

/// An image that could not be decoded or whose buffer is inconsistent
#[derive(Debug, Error)]
pub enum InvalidImage {
    #[error("image dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions { width: u32, height: u32 },

    #[error("unsupported channel count {0} (expected 1, 3 or 4)")]
    UnsupportedChannels(u8),

    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to read image {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
