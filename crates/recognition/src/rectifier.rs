//! Perspective correction of a detected region onto a canonical plate canvas.

use crate::config::RectifierConfig;
use crate::error::RectificationFailed;
use crate::geometry::{BoundingRegion, Convexity};
use common::plates::PlateLayout;
use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

/// Shortest usable quad side, in pixels
const MIN_SIDE: f32 = 2.0;

/// Canonical grayscale plate ready for segmentation
#[derive(Debug, Clone)]
pub struct RectifiedPlate {
    pub image: GrayImage,
    /// Layout implied by the canvas the region was warped onto
    pub layout_hint: PlateLayout,
    pub detection_confidence: f32,
}

pub struct Rectifier {
    config: RectifierConfig,
}

impl Rectifier {
    pub fn new(config: RectifierConfig) -> Self {
        Self { config }
    }

    fn canvas(&self, aspect: f32) -> (u32, u32, PlateLayout) {
        if aspect < self.config.two_row_max_aspect {
            (
                self.config.two_row_width,
                self.config.two_row_height,
                PlateLayout::TwoRow,
            )
        } else {
            (
                self.config.single_row_width,
                self.config.single_row_height,
                PlateLayout::SingleRow,
            )
        }
    }

    pub fn rectify(
        &self,
        gray: &GrayImage,
        region: &BoundingRegion,
    ) -> Result<RectifiedPlate, RectificationFailed> {
        let mut quad = region.quad;

        if quad
            .corners
            .iter()
            .any(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(RectificationFailed::Degenerate);
        }
        if quad.side_lengths().iter().any(|&side| side < MIN_SIDE) {
            return Err(RectificationFailed::Degenerate);
        }

        match quad.convexity() {
            Convexity::Convex => {}
            Convexity::Collinear => return Err(RectificationFailed::Degenerate),
            Convexity::Mixed => return Err(RectificationFailed::SelfIntersecting),
        }

        if !quad.is_clockwise() {
            quad = quad.mirrored();
        }
        if quad.area() < self.config.min_area {
            return Err(RectificationFailed::Degenerate);
        }

        let (width, height, layout_hint) = self.canvas(quad.aspect_ratio());
        let (w, h) = (width as f32, height as f32);

        let src = quad.corners.map(|p| (p.x, p.y));
        let dst = [(0.0, 0.0), (w - 1.0, 0.0), (w - 1.0, h - 1.0), (0.0, h - 1.0)];
        let projection =
            Projection::from_control_points(src, dst).ok_or(RectificationFailed::NoProjection)?;

        let mut image = GrayImage::new(width, height);
        warp_into(gray, &projection, Interpolation::Bilinear, Luma([255u8]), &mut image);

        Ok(RectifiedPlate {
            image,
            layout_hint,
            detection_confidence: region.confidence,
        })
    }
}
