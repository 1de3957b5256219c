//! Quadrilaterals, overlap and non-maximum suppression.
//!
//! Coordinates are image coordinates: x grows right, y grows down. A quad
//! whose corners run top-left, top-right, bottom-right, bottom-left is
//! clockwise on screen and has a positive signed area.

use common::plates::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// How the edges of a quad turn when walked in corner order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convexity {
    Convex,
    /// Three consecutive corners are collinear
    Collinear,
    /// Edge turns change sign: a bow-tie or a dent
    Mixed,
}

/// Four corners: top-left, top-right, bottom-right, bottom-left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub corners: [Point2; 4],
}

impl Quad {
    pub const fn new(corners: [Point2; 4]) -> Self {
        Self { corners }
    }

    pub fn from_rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new([
            Point2::new(x, y),
            Point2::new(x + width, y),
            Point2::new(x + width, y + height),
            Point2::new(x, y + height),
        ])
    }

    /// Order four arbitrary corners clockwise, starting from the one closest
    /// to the image origin
    pub fn from_unordered(points: [Point2; 4]) -> Self {
        let cx = points.iter().map(|p| p.x).sum::<f32>() / 4.0;
        let cy = points.iter().map(|p| p.y).sum::<f32>() / 4.0;

        let mut sorted = points;
        sorted.sort_by(|a, b| {
            let angle_a = (a.y - cy).atan2(a.x - cx);
            let angle_b = (b.y - cy).atan2(b.x - cx);
            angle_a.total_cmp(&angle_b)
        });

        let start = sorted
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (a.x + a.y).total_cmp(&(b.x + b.y)))
            .map(|(i, _)| i)
            .unwrap_or(0);
        sorted.rotate_left(start);

        Self::new(sorted)
    }

    /// Shoelace area, positive for clockwise-on-screen order
    pub fn signed_area(&self) -> f32 {
        let c = &self.corners;
        let twice: f32 = (0..4)
            .map(|i| {
                let (p, q) = (c[i], c[(i + 1) % 4]);
                p.x * q.y - q.x * p.y
            })
            .sum();
        twice / 2.0
    }

    pub fn area(&self) -> f32 {
        self.signed_area().abs()
    }

    pub fn is_clockwise(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Same corners walked in the opposite direction, keeping the first corner
    pub fn mirrored(&self) -> Self {
        let c = self.corners;
        Self::new([c[0], c[3], c[2], c[1]])
    }

    pub fn convexity(&self) -> Convexity {
        let c = &self.corners;
        let mut positive = 0;
        let mut negative = 0;

        for i in 0..4 {
            let (a, b, d) = (c[i], c[(i + 1) % 4], c[(i + 2) % 4]);
            let cross = (b.x - a.x) * (d.y - b.y) - (b.y - a.y) * (d.x - b.x);
            if cross.abs() <= f32::EPSILON {
                return Convexity::Collinear;
            }
            if cross > 0.0 {
                positive += 1;
            } else {
                negative += 1;
            }
        }

        if positive == 4 || negative == 4 {
            Convexity::Convex
        } else {
            Convexity::Mixed
        }
    }

    pub fn side_lengths(&self) -> [f32; 4] {
        let c = &self.corners;
        [
            c[0].distance(&c[1]),
            c[1].distance(&c[2]),
            c[2].distance(&c[3]),
            c[3].distance(&c[0]),
        ]
    }

    /// Mean length of the top and bottom edges
    pub fn width(&self) -> f32 {
        let [top, _, bottom, _] = self.side_lengths();
        (top + bottom) / 2.0
    }

    /// Mean length of the left and right edges
    pub fn height(&self) -> f32 {
        let [_, right, _, left] = self.side_lengths();
        (right + left) / 2.0
    }

    pub fn aspect_ratio(&self) -> f32 {
        let height = self.height();
        if height > 0.0 {
            self.width() / height
        } else {
            0.0
        }
    }

    /// Axis-aligned extent as (min_x, min_y, max_x, max_y)
    pub fn extent(&self) -> (f32, f32, f32, f32) {
        self.corners.iter().fold(
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }

    /// Integer bounding box clipped to the image origin
    pub fn bounding_box(&self) -> BoundingBox {
        let (x0, y0, x1, y1) = self.extent();
        let x = x0.max(0.0).floor();
        let y = y0.max(0.0).floor();
        BoundingBox {
            x: x as u32,
            y: y as u32,
            width: (x1 - x).max(0.0).ceil() as u32,
            height: (y1 - y).max(0.0).ceil() as u32,
        }
    }
}

/// Candidate plate location with its detection confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingRegion {
    pub quad: Quad,
    pub confidence: f32,
}

impl BoundingRegion {
    pub fn new(quad: Quad, confidence: f32) -> Self {
        Self {
            quad,
            confidence: clamp_confidence(confidence),
        }
    }
}

/// Clamp a score into [0, 1]; NaN counts as no confidence at all
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Intersection over union of the axis-aligned extents of two quads
pub fn iou(a: &Quad, b: &Quad) -> f32 {
    let (ax0, ay0, ax1, ay1) = a.extent();
    let (bx0, by0, bx1, by1) = b.extent();

    let x1 = ax0.max(bx0);
    let y1 = ay0.max(by0);
    let x2 = ax1.min(bx1);
    let y2 = ay1.min(by1);

    let intersection = if x2 > x1 && y2 > y1 {
        (x2 - x1) * (y2 - y1)
    } else {
        0.0
    };

    let area_a = (ax1 - ax0) * (ay1 - ay0);
    let area_b = (bx1 - bx0) * (by1 - by0);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Greedy non-maximum suppression
///
/// Returns survivors in descending confidence; equal confidences keep their
/// input order.
pub fn non_max_suppression(mut regions: Vec<BoundingRegion>, iou_threshold: f32) -> Vec<BoundingRegion> {
    regions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<BoundingRegion> = Vec::with_capacity(regions.len());
    for region in regions {
        if keep
            .iter()
            .all(|kept| iou(&kept.quad, &region.quad) < iou_threshold)
        {
            keep.push(region);
        }
    }
    keep
}
