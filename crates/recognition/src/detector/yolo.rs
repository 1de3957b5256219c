use super::RegionProposer;
use crate::config::{RuntimeConfig, YoloConfig};
use crate::geometry::{BoundingRegion, Quad};
use crate::image::Image;
use crate::onnx::OnnxModel;
use anyhow::{Context, Result};
use image::GrayImage;
use ndarray::{Array, IxDyn};

const OUTPUT_NAMES: [&str; 3] = ["output0", "output", "boxes"];

/// Learned detector: single-class YOLOv8 exported to ONNX
pub struct YoloProposer {
    model: OnnxModel,
    input_size: u32,
    proposal_floor: f32,
}

impl YoloProposer {
    pub fn load(config: &YoloConfig, runtime: &RuntimeConfig) -> Result<Self> {
        let model_path = config
            .model_path
            .as_deref()
            .context("detector.yolo.model_path is not set")?;
        Ok(Self::with_model(OnnxModel::load(model_path, runtime)?, config))
    }

    pub fn with_model(model: OnnxModel, config: &YoloConfig) -> Self {
        Self {
            model,
            input_size: config.input_size,
            proposal_floor: config.proposal_floor,
        }
    }
}

/// Resize to the square model input, NCHW, scaled to [0, 1]
pub(crate) fn preprocess(image: &Image, size: u32) -> Array<f32, IxDyn> {
    let resized = image
        .as_dynamic()
        .resize_exact(size, size, image::imageops::FilterType::Triangle);
    let rgb_img = resized.to_rgb8();

    let mut input = Array::zeros(IxDyn(&[1, 3, size as usize, size as usize]));
    for (x, y, pixel) in rgb_img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        input[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
        input[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
        input[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
    }
    input
}

/// Decode a `[1, 5, N]` output (cx, cy, w, h, score) into source-image regions
pub(crate) fn postprocess(
    output: &Array<f32, IxDyn>,
    input_size: u32,
    original_width: u32,
    original_height: u32,
    proposal_floor: f32,
) -> Result<Vec<BoundingRegion>> {
    let shape = output.shape();
    if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
        anyhow::bail!("unexpected detector output shape {:?}, expected [1, 5, N]", shape);
    }

    let scale_x = original_width as f32 / input_size as f32;
    let scale_y = original_height as f32 / input_size as f32;
    let max_x = original_width as f32;
    let max_y = original_height as f32;

    let mut regions = Vec::new();
    for i in 0..shape[2] {
        let confidence = output[[0, 4, i]];
        if confidence.is_nan() || confidence < proposal_floor {
            continue;
        }

        let cx = output[[0, 0, i]];
        let cy = output[[0, 1, i]];
        let w = output[[0, 2, i]];
        let h = output[[0, 3, i]];

        let x0 = ((cx - w / 2.0) * scale_x).clamp(0.0, max_x);
        let y0 = ((cy - h / 2.0) * scale_y).clamp(0.0, max_y);
        let x1 = ((cx + w / 2.0) * scale_x).clamp(0.0, max_x);
        let y1 = ((cy + h / 2.0) * scale_y).clamp(0.0, max_y);

        regions.push(BoundingRegion::new(
            Quad::from_rect(x0, y0, x1 - x0, y1 - y0),
            confidence,
        ));
    }

    Ok(regions)
}

impl RegionProposer for YoloProposer {
    fn name(&self) -> &'static str {
        "yolo"
    }

    fn propose(&self, image: &Image, _gray: &GrayImage) -> Result<Vec<BoundingRegion>> {
        let input = preprocess(image, self.input_size);

        let inference_start = std::time::Instant::now();
        let output = self.model.run(input, &OUTPUT_NAMES)?;
        tracing::debug!(
            provider = self.model.provider(),
            inference_ms = inference_start.elapsed().as_millis() as u64,
            "Plate detector inference finished"
        );

        postprocess(
            &output,
            self.input_size,
            image.width(),
            image.height(),
            self.proposal_floor,
        )
    }

    fn execution_provider(&self) -> Option<&str> {
        Some(self.model.provider())
    }
}
