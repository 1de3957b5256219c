//! Synthetic plates and scenes rendered with the built-in font.
//!
//! Plates are white paper with black glyphs. Layout is measured in font
//! cells: a two-cell margin, one cell between glyphs and two cells between
//! rows, with every row centred.

use crate::classifier::font::{self, GLYPH_ROWS};
use crate::error::InvalidImage;
use crate::image::Image;
use image::{imageops, GrayImage, Luma};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

pub const PAPER: u8 = 255;
pub const INK: u8 = 0;

const MARGIN_CELLS: u32 = 2;
const SPACING_CELLS: u32 = 1;
const ROW_GAP_CELLS: u32 = 2;

fn row_cells(row: &str) -> Option<u32> {
    let mut width = 0;
    for (i, symbol) in row.chars().enumerate() {
        if i > 0 {
            width += SPACING_CELLS;
        }
        width += font::glyph_width(symbol)?;
    }
    Some(width)
}

/// Render plate rows top to bottom, `scale` pixels per font cell.
///
/// Returns `None` when a row is empty or uses a symbol the font lacks.
pub fn render_plate(rows: &[&str], scale: u32) -> Option<GrayImage> {
    let scale = scale.max(1);
    let widths = rows
        .iter()
        .map(|row| row_cells(row).filter(|w| *w > 0))
        .collect::<Option<Vec<u32>>>()?;
    let widest = widths.iter().copied().max()?;

    let row_count = rows.len() as u32;
    let width_cells = widest + 2 * MARGIN_CELLS;
    let height_cells = row_count * GLYPH_ROWS + (row_count - 1) * ROW_GAP_CELLS + 2 * MARGIN_CELLS;
    let mut plate = GrayImage::from_pixel(width_cells * scale, height_cells * scale, Luma([PAPER]));

    for (r, (row, row_width)) in rows.iter().zip(&widths).enumerate() {
        let mut x = MARGIN_CELLS + (widest - row_width) / 2;
        let y = MARGIN_CELLS + r as u32 * (GLYPH_ROWS + ROW_GAP_CELLS);
        for symbol in row.chars() {
            let glyph = font::render(symbol, scale)?;
            imageops::overlay(&mut plate, &glyph, (x * scale) as i64, (y * scale) as i64);
            x += font::glyph_width(symbol)? + SPACING_CELLS;
        }
    }

    Some(plate)
}

/// Grayscale scene builder
#[derive(Debug, Clone)]
pub struct Scene {
    canvas: GrayImage,
    background: u8,
}

impl Scene {
    pub fn new(width: u32, height: u32, background: u8) -> Self {
        Self {
            canvas: GrayImage::from_pixel(width, height, Luma([background])),
            background,
        }
    }

    /// Paste `plate` with its top-left corner at (x, y)
    pub fn place(mut self, plate: &GrayImage, x: i64, y: i64) -> Self {
        imageops::overlay(&mut self.canvas, plate, x, y);
        self
    }

    pub fn place_centered(self, plate: &GrayImage) -> Self {
        let x = (self.canvas.width() as i64 - plate.width() as i64) / 2;
        let y = (self.canvas.height() as i64 - plate.height() as i64) / 2;
        self.place(plate, x, y)
    }

    /// Rotate the whole scene clockwise about its centre, filling with background
    pub fn rotate(mut self, degrees: f32) -> Self {
        self.canvas = rotate_about_center(
            &self.canvas,
            degrees.to_radians(),
            Interpolation::Bilinear,
            Luma([self.background]),
        );
        self
    }

    pub fn gray(&self) -> &GrayImage {
        &self.canvas
    }

    pub fn into_gray(self) -> GrayImage {
        self.canvas
    }

    pub fn into_image(self) -> Result<Image, InvalidImage> {
        Image::from_gray(self.canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_row_dimensions() {
        // 8 glyphs of 5 cells, 7 gaps, 2 margins
        let plate = render_plate(&["51F12345"], 6).unwrap();
        assert_eq!(plate.dimensions(), (51 * 6, 11 * 6));
        assert_eq!(plate.get_pixel(0, 0)[0], PAPER);
        // Top bar of the '5'
        assert_eq!(plate.get_pixel(2 * 6, 2 * 6)[0], INK);
    }

    #[test]
    fn test_two_row_plate_is_centred() {
        let plate = render_plate(&["59-X1", "123.45"], 4).unwrap();
        // Widest row is 31 cells, rows stack to 7 + 2 + 7 cells
        assert_eq!(plate.dimensions(), (35 * 4, 20 * 4));

        // Top row is 27 cells wide, so it starts two cells in from the margin
        let top_left_ink = (0..plate.width())
            .find(|&x| (0..9 * 4).any(|y| plate.get_pixel(x, y)[0] == INK))
            .unwrap();
        assert_eq!(top_left_ink, 4 * 4);
    }

    #[test]
    fn test_unknown_symbol_or_empty_row() {
        assert!(render_plate(&["51O12345"], 2).is_none());
        assert!(render_plate(&[""], 2).is_none());
        assert!(render_plate(&[], 2).is_none());
    }

    #[test]
    fn test_scene_placement_and_rotation() {
        let plate = render_plate(&["12"], 2).unwrap();
        let scene = Scene::new(100, 60, 40).place(&plate, 10, 5);
        assert_eq!(scene.gray().get_pixel(0, 0)[0], 40);
        assert_eq!(scene.gray().get_pixel(10, 5)[0], PAPER);

        let rotated = scene.rotate(15.0);
        assert_eq!(rotated.gray().dimensions(), (100, 60));
        assert_eq!(rotated.gray().get_pixel(0, 0)[0], 40);

        let image = rotated.into_image().unwrap();
        assert_eq!(image.channels(), 1);
    }
}
