use super::RegionProposer;
use crate::config::ContourConfig;
use crate::geometry::{BoundingRegion, Point2, Quad};
use crate::image::Image;
use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::geometry::min_area_rect;
use imageproc::point::Point;
use imageproc::region_labelling::{connected_components, Connectivity};
use imageproc::stats::histogram;

/// Aspect bands a plate can fall in: two-row and single-row
const ASPECT_BANDS: [(f32, f32); 2] = [(1.1, 2.2), (3.0, 6.0)];
const ASPECT_SIGMA: f32 = 0.25;

/// Dark fraction expected inside a plate, and where the score reaches zero
const INK_BAND: (f32, f32) = (0.08, 0.45);
const INK_LIMITS: (f32, f32) = (0.02, 0.70);

/// Regions covering this share of the image get the full size factor
const FULL_SIZE_RATIO: f32 = 0.05;

/// Classical detector: plate-shaped blobs of one grey class with a plausible
/// amount of contrasting text inside. Both light plates with dark text and
/// dark plates with light text are proposed.
pub struct ContourProposer {
    config: ContourConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    /// Plate body above the cut, text below
    Light,
    /// Plate body at or below the cut, text above
    Dark,
}

/// One binarization of the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cut {
    level: u8,
    polarity: Polarity,
}

impl Cut {
    fn keeps(&self, value: u8) -> bool {
        match self.polarity {
            Polarity::Light => value > self.level,
            Polarity::Dark => value <= self.level,
        }
    }
}

struct Component {
    pixels: u32,
    boundary: Vec<Point<i32>>,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Component {
    fn new(x: u32, y: u32) -> Self {
        Self {
            pixels: 0,
            boundary: Vec::new(),
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn bbox_area(&self) -> f32 {
        ((self.max_x - self.min_x + 1) * (self.max_y - self.min_y + 1)) as f32
    }
}

impl ContourProposer {
    pub fn new(config: ContourConfig) -> Self {
        Self { config }
    }

    fn components(&self, gray: &GrayImage, cut: Cut) -> Vec<Component> {
        let mut mask = GrayImage::new(gray.width(), gray.height());
        for (x, y, pixel) in gray.enumerate_pixels() {
            if cut.keeps(pixel[0]) {
                mask.put_pixel(x, y, Luma([255u8]));
            }
        }

        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
        let (width, height) = labels.dimensions();
        let mut components: Vec<Option<Component>> = Vec::new();

        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0];
            if label == 0 {
                continue;
            }
            let index = label as usize - 1;
            if components.len() <= index {
                components.resize_with(index + 1, || None);
            }
            let component = components[index].get_or_insert_with(|| Component::new(x, y));

            component.pixels += 1;
            component.min_x = component.min_x.min(x);
            component.min_y = component.min_y.min(y);
            component.max_x = component.max_x.max(x);
            component.max_y = component.max_y.max(y);

            let on_edge = x == 0 || y == 0 || x + 1 == width || y + 1 == height;
            let is_boundary = on_edge
                || labels.get_pixel(x - 1, y)[0] != label
                || labels.get_pixel(x + 1, y)[0] != label
                || labels.get_pixel(x, y - 1)[0] != label
                || labels.get_pixel(x, y + 1)[0] != label;
            if is_boundary {
                component.boundary.push(Point::new(x as i32, y as i32));
            }
        }

        components.into_iter().flatten().collect()
    }

    fn score(&self, component: &Component, image_area: f32) -> Option<BoundingRegion> {
        let flat = component.max_x == component.min_x || component.max_y == component.min_y;
        if flat || component.bbox_area() < self.config.min_area_px {
            return None;
        }

        let corners = min_area_rect(&component.boundary)
            .map(|p| Point2::new(p.x as f32, p.y as f32));
        let quad = Quad::from_unordered(corners);

        // Corners sit on pixel centres, so the covered area is one pixel wider each way
        let area = (quad.width() + 1.0) * (quad.height() + 1.0);
        let area_ratio = area / image_area;
        if area < self.config.min_area_px
            || area_ratio < self.config.min_area_ratio
            || area_ratio > self.config.max_area_ratio
        {
            return None;
        }

        let ink = (1.0 - component.pixels as f32 / area).clamp(0.0, 1.0);
        let confidence =
            aspect_score(quad.aspect_ratio()) * ink_score(ink) * size_factor(area_ratio);

        Some(BoundingRegion::new(quad, confidence))
    }
}

impl RegionProposer for ContourProposer {
    fn name(&self) -> &'static str {
        "contour"
    }

    fn propose(&self, _image: &Image, gray: &GrayImage) -> anyhow::Result<Vec<BoundingRegion>> {
        let (min, max) = gray
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        if max.saturating_sub(min) < self.config.min_contrast {
            tracing::debug!(min, max, "Image below contrast gate, no proposals");
            return Ok(Vec::new());
        }

        let image_area = (gray.width() * gray.height()) as f32;
        let mut regions = Vec::new();
        for cut in cuts(gray) {
            let before = regions.len();
            regions.extend(
                self.components(gray, cut)
                    .iter()
                    .filter_map(|component| self.score(component, image_area))
                    .filter(|region| region.confidence > 0.0),
            );
            tracing::trace!(
                level = cut.level,
                polarity = ?cut.polarity,
                regions = regions.len() - before,
                "Threshold cut scanned"
            );
        }

        Ok(regions)
    }
}

/// The global Otsu cut in both polarities, plus a second split inside each
/// class. The inner splits separate a plate from a background that shares
/// its class, such as a white plate on a light car.
fn cuts(gray: &GrayImage) -> Vec<Cut> {
    let hist = histogram(gray).channels[0];
    let global = otsu_level(gray);

    let mut cuts = vec![
        Cut {
            level: global,
            polarity: Polarity::Light,
        },
        Cut {
            level: global,
            polarity: Polarity::Dark,
        },
    ];
    if let Some(level) = global.checked_add(1).and_then(|lo| otsu_within(&hist, lo, u8::MAX)) {
        cuts.push(Cut {
            level,
            polarity: Polarity::Light,
        });
    }
    if let Some(level) = otsu_within(&hist, 0, global) {
        cuts.push(Cut {
            level,
            polarity: Polarity::Dark,
        });
    }
    cuts
}

/// Otsu level of the histogram restricted to `lo..=hi`, or `None` when the
/// range holds fewer than two distinct grey levels
fn otsu_within(hist: &[u32; 256], lo: u8, hi: u8) -> Option<u8> {
    let range = lo as usize..=hi as usize;
    let total: u64 = hist[range.clone()].iter().map(|&count| count as u64).sum();
    let total_sum: f64 = range.clone().map(|t| t as f64 * hist[t] as f64).sum();

    let mut background_weight = 0u64;
    let mut background_sum = 0f64;
    let mut largest_variance = 0f64;
    let mut best = None;

    for t in range {
        background_weight += hist[t] as u64;
        if background_weight == 0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0 {
            break;
        }

        background_sum += t as f64 * hist[t] as f64;
        let mean_diff = background_sum / background_weight as f64
            - (total_sum - background_sum) / foreground_weight as f64;
        let variance = background_weight as f64 * foreground_weight as f64 * mean_diff.powi(2);
        if variance > largest_variance {
            largest_variance = variance;
            best = Some(t as u8);
        }
    }

    best
}

/// 1 inside a plate aspect band, Gaussian falloff in log space outside
pub(crate) fn aspect_score(aspect: f32) -> f32 {
    if aspect.is_nan() || aspect <= 0.0 {
        return 0.0;
    }

    let distance = ASPECT_BANDS
        .iter()
        .map(|&(lo, hi)| {
            if aspect < lo {
                (lo / aspect).ln()
            } else if aspect > hi {
                (aspect / hi).ln()
            } else {
                0.0
            }
        })
        .fold(f32::INFINITY, f32::min);

    (-(distance / ASPECT_SIGMA).powi(2)).exp()
}

/// 1 inside the expected ink band, linear to 0 at the limits
pub(crate) fn ink_score(ink: f32) -> f32 {
    let (lo, hi) = INK_BAND;
    let (floor, ceiling) = INK_LIMITS;

    if ink <= floor || ink >= ceiling {
        0.0
    } else if ink < lo {
        (ink - floor) / (lo - floor)
    } else if ink > hi {
        (ceiling - ink) / (ceiling - hi)
    } else {
        1.0
    }
}

pub(crate) fn size_factor(area_ratio: f32) -> f32 {
    0.75 + 0.25 * (area_ratio / FULL_SIZE_RATIO).min(1.0)
}
