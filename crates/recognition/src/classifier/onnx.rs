use super::{Alphabet, GlyphClassifier};
use crate::config::{ClassifierConfig, RuntimeConfig};
use crate::onnx::OnnxModel;
use anyhow::{Context, Result};
use image::GrayImage;
use ndarray::{Array, IxDyn};

const OUTPUT_NAMES: [&str; 3] = ["output", "output0", "logits"];

/// Glyph CNN exported to ONNX: `[1, 1, H, W]` in, one score per symbol out
pub struct OnnxGlyphClassifier {
    model: OnnxModel,
    alphabet: Alphabet,
    input_width: u32,
    input_height: u32,
    apply_softmax: bool,
}

impl OnnxGlyphClassifier {
    pub fn load(config: &ClassifierConfig, alphabet: Alphabet, runtime: &RuntimeConfig) -> Result<Self> {
        let model_path = config
            .model_path
            .as_deref()
            .context("classifier.model_path is not set")?;
        let model = OnnxModel::load(model_path, runtime)?;

        Ok(Self {
            model,
            alphabet,
            input_width: config.input_width,
            input_height: config.input_height,
            apply_softmax: config.apply_softmax,
        })
    }
}

/// Resize a glyph patch to the model input, NCHW, scaled to [0, 1]
pub(crate) fn preprocess(patch: &GrayImage, width: u32, height: u32) -> Array<f32, IxDyn> {
    let resized = image::imageops::resize(
        patch,
        width,
        height,
        image::imageops::FilterType::Triangle,
    );

    let mut input = Array::zeros(IxDyn(&[1, 1, height as usize, width as usize]));
    for (x, y, pixel) in resized.enumerate_pixels() {
        input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
    }
    input
}

pub(crate) fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        vec![0.0; logits.len()]
    }
}

impl GlyphClassifier for OnnxGlyphClassifier {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    fn scores(&self, patch: &GrayImage) -> Result<Vec<f32>> {
        let input = preprocess(patch, self.input_width, self.input_height);
        let output = self.model.run(input, &OUTPUT_NAMES)?;

        let raw: Vec<f32> = output.iter().copied().collect();
        if raw.len() != self.alphabet.len() {
            anyhow::bail!(
                "glyph model produced {} scores, alphabet has {} symbols",
                raw.len(),
                self.alphabet.len()
            );
        }

        let scores = if self.apply_softmax { softmax(&raw) } else { raw };
        Ok(scores
            .into_iter()
            .map(|s| if s.is_nan() { 0.0 } else { s.clamp(0.0, 1.0) })
            .collect())
    }

    fn execution_provider(&self) -> Option<&str> {
        Some(self.model.provider())
    }
}
