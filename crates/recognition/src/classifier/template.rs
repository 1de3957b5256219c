use super::{font, Alphabet, GlyphClassifier};
use crate::error::ModelLoadError;
use anyhow::Result;
use image::imageops::{self, FilterType};
use image::GrayImage;

/// Normalized comparison grid
const TEMPLATE_WIDTH: u32 = 20;
const TEMPLATE_HEIGHT: u32 = 28;

/// Cell size used when rasterizing the font into templates
const RENDER_SCALE: u32 = 4;

/// Pixels darker than this count as ink when cropping
const INK_LEVEL: u8 = 128;

/// Normalized cross-correlation against the built-in plate font
pub struct TemplateClassifier {
    alphabet: Alphabet,
    templates: Vec<Vec<f32>>,
}

impl TemplateClassifier {
    pub fn new(alphabet: Alphabet) -> Result<Self, ModelLoadError> {
        let templates = alphabet
            .symbols()
            .iter()
            .map(|&symbol| {
                let rendered = font::render(symbol, RENDER_SCALE).ok_or_else(|| {
                    ModelLoadError::Template(format!("no built-in glyph for '{symbol}'"))
                })?;
                normalize(&rendered).ok_or_else(|| {
                    ModelLoadError::Template(format!("glyph '{symbol}' renders blank"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            alphabet,
            templates,
        })
    }
}

impl GlyphClassifier for TemplateClassifier {
    fn name(&self) -> &'static str {
        "template"
    }

    fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    fn scores(&self, patch: &GrayImage) -> Result<Vec<f32>> {
        let Some(vector) = normalize(patch) else {
            return Ok(vec![0.0; self.templates.len()]);
        };

        Ok(self
            .templates
            .iter()
            .map(|template| {
                let ncc: f32 = template.iter().zip(&vector).map(|(a, b)| a * b).sum();
                ncc.clamp(0.0, 1.0)
            })
            .collect())
    }
}

/// Crop to ink, resize onto the comparison grid and scale to zero mean and
/// unit norm. `None` for a patch without ink or without variation.
fn normalize(patch: &GrayImage) -> Option<Vec<f32>> {
    let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0, 0);
    for (x, y, pixel) in patch.enumerate_pixels() {
        if pixel[0] < INK_LEVEL {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
    }
    if x0 > x1 || y0 > y1 {
        return None;
    }

    let cropped = imageops::crop_imm(patch, x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image();
    let resized = imageops::resize(&cropped, TEMPLATE_WIDTH, TEMPLATE_HEIGHT, FilterType::Triangle);

    let mut values: Vec<f32> = resized
        .pixels()
        .map(|p| (255 - p[0]) as f32 / 255.0)
        .collect();
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    values.iter_mut().for_each(|v| *v -= mean);

    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm < 1e-6 {
        return None;
    }
    values.iter_mut().for_each(|v| *v /= norm);
    Some(values)
}
