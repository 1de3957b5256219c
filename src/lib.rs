//! License plate recognition.
//!
//! The engine lives in [`recognition`]; [`lpr_service`] wraps it in an HTTP
//! service and a command-line tool.

pub use common::plates::{ModelInfo, PlateLayout, PlateResult, NO_PLATE_SENTINEL};
pub use lpr_service;
pub use recognition::{initialize, Image, RecognitionConfig, RecognitionModel};
pub use telemetry;
