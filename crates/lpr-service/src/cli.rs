//! File-level recognition used by the `lpr-cli` binary.

use common::plates::PlateResult;
use recognition::{Image, RecognitionError, RecognitionModel};
use std::path::Path;
use tracing::{debug, warn};

/// Recognize the plate in the image at `path`.
///
/// A file that cannot be read or decoded yields `NoPlate`; only a backend
/// fault is an error.
pub fn recognize_file(model: &RecognitionModel, path: &Path) -> Result<PlateResult, RecognitionError> {
    let image = match Image::open(path) {
        Ok(image) => image,
        Err(e) => {
            warn!(path = %path.display(), "Cannot use input image: {}", e);
            return Ok(PlateResult::NoPlate);
        }
    };
    debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "Image loaded"
    );
    model.predict(&image)
}
