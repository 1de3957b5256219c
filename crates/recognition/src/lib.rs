//! License plate recognition engine.
//!
//! [`initialize`] builds a [`RecognitionModel`] from a [`RecognitionConfig`];
//! [`RecognitionModel::predict`] turns one [`Image`] into plate text or the
//! `NoPlate` sentinel.

pub mod assembler;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod image;
pub mod model;
pub mod onnx;
pub mod pipeline;
pub mod rectifier;
pub mod segmenter;
pub mod synthetic;

pub use config::RecognitionConfig;
pub use error::{InvalidImage, ModelLoadError, RecognitionError, RectificationFailed};
pub use crate::image::Image;
pub use model::{initialize, RecognitionModel};
pub use pipeline::{CandidateOutcome, Outcome, Recognition};
