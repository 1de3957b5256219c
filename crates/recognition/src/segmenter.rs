//! Character segmentation of a rectified plate.
//!
//! Glyphs are the dark connected components of an Otsu-binarized plate that
//! survive size and height-consistency filters. Resampling can break a thin
//! stroke apart, so fragments that overlap along one axis and nearly touch
//! along the other are folded back into one glyph before filtering. Each glyph
//! carries a binary patch (ink 0, paper 255) cropped tight to its ink.

use crate::config::SegmenterConfig;
use crate::rectifier::RectifiedPlate;
use common::plates::{BoundingBox, PlateLayout};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contrast::otsu_level;
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::HashMap;

const INK: Luma<u8> = Luma([0]);
const PAPER: Luma<u8> = Luma([255]);

/// Side-by-side fragments at most this many pixels apart are one glyph
const SIDE_GAP_PX: i64 = 2;

/// Floor for the stacked-fragment gap on small canvases
const MIN_STACK_GAP_PX: f32 = 2.0;

type Labels = ImageBuffer<Luma<u32>, Vec<u32>>;

/// One character cell within a rectified plate
#[derive(Debug, Clone)]
pub struct GlyphRegion {
    /// Tight ink bounds in plate coordinates
    pub rect: BoundingBox,
    /// 0 for the top row
    pub row: usize,
    /// Reading order within the plate, unique per plate
    pub index: usize,
    pub patch: GrayImage,
}

#[derive(Debug, Clone)]
pub struct Segmentation {
    pub layout: PlateLayout,
    pub glyphs: Vec<GlyphRegion>,
}

impl Segmentation {
    fn empty(layout: PlateLayout) -> Self {
        Self {
            layout,
            glyphs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Blob {
    label: u32,
    pixels: u32,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Blob {
    fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Empty rows between the two blobs, negative when their rows overlap
    fn gap_y(&self, other: &Blob) -> i64 {
        span_gap((self.min_y, self.max_y), (other.min_y, other.max_y))
    }

    fn gap_x(&self, other: &Blob) -> i64 {
        span_gap((self.min_x, self.max_x), (other.min_x, other.max_x))
    }

    /// Two pieces of one glyph: stacked with overlapping columns, or side by
    /// side with overlapping rows
    fn is_fragment_of(&self, other: &Blob, max_stack_gap: f32) -> bool {
        let narrower = self.width().min(other.width()) as i64;
        let shorter = self.height().min(other.height()) as i64;

        let stacked =
            -self.gap_x(other) * 2 >= narrower && self.gap_y(other) as f32 <= max_stack_gap;
        let beside = -self.gap_y(other) * 2 >= shorter && self.gap_x(other) <= SIDE_GAP_PX;
        stacked || beside
    }

    fn absorb(&mut self, other: &Blob) {
        self.pixels += other.pixels;
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }
}

fn span_gap(a: (u32, u32), b: (u32, u32)) -> i64 {
    a.0.max(b.0) as i64 - a.1.min(b.1) as i64 - 1
}

/// A glyph before rows and indices are assigned
struct Piece {
    rect: BoundingBox,
    patch: GrayImage,
}

impl Piece {
    fn centre_y(&self) -> f32 {
        self.rect.y as f32 + self.rect.height as f32 / 2.0
    }
}

pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn segment(&self, plate: &RectifiedPlate) -> Segmentation {
        let image = &plate.image;
        let (width, height) = image.dimensions();

        let (min, max) = image
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        if max.saturating_sub(min) < self.config.min_contrast {
            return Segmentation::empty(plate.layout_hint);
        }

        let mask = ink_mask(image);
        let mut labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
        let inner: Vec<Blob> = collect_blobs(&labels)
            .into_iter()
            .filter(|b| b.min_x > 0 && b.min_y > 0 && b.max_x + 1 < width && b.max_y + 1 < height)
            .collect();
        let blobs = self.merge_fragments(&mut labels, inner);

        let plate_height = height as f32;
        let sized: Vec<Blob> = blobs
            .into_iter()
            .filter(|b| {
                let ratio = b.height() as f32 / plate_height;
                ratio >= self.config.min_height_ratio && ratio <= self.config.max_height_ratio
            })
            .filter(|b| b.pixels >= self.config.min_pixels)
            .collect();

        let Some(median) = median_height(&sized) else {
            return Segmentation::empty(plate.layout_hint);
        };

        let tolerance = self.config.height_tolerance * median;
        let mut pieces = Vec::new();
        for blob in sized
            .iter()
            .filter(|b| (b.height() as f32 - median).abs() <= tolerance)
        {
            if blob.width() as f32 > self.config.split_aspect * blob.height() as f32 {
                pieces.extend(self.split(&labels, blob));
            } else if let Some(piece) = crop_piece(&labels, blob, blob.min_x, blob.max_x) {
                pieces.push(piece);
            }
        }

        if pieces.is_empty() {
            return Segmentation::empty(plate.layout_hint);
        }

        let (layout, rows) = self.assign_rows(&pieces, median);

        let mut ordered: Vec<(usize, Piece)> = rows.into_iter().zip(pieces).collect();
        ordered.sort_by_key(|(row, piece)| (*row, piece.rect.x));

        let glyphs = ordered
            .into_iter()
            .enumerate()
            .map(|(index, (row, piece))| GlyphRegion {
                rect: piece.rect,
                row,
                index,
                patch: piece.patch,
            })
            .collect();

        Segmentation { layout, glyphs }
    }

    /// Fold fragments into the blob they belong to. Absorbed components are
    /// relabelled in `labels` so cropping sees one component per glyph.
    fn merge_fragments(&self, labels: &mut Labels, mut blobs: Vec<Blob>) -> Vec<Blob> {
        let max_stack_gap =
            (self.config.fragment_gap_ratio * labels.height() as f32).max(MIN_STACK_GAP_PX);
        blobs.sort_by_key(|b| (b.min_y, b.min_x));

        let mut absorbed_into: HashMap<u32, u32> = HashMap::new();
        while let Some((keep, absorb)) = find_fragment_pair(&blobs, max_stack_gap) {
            let fragment = blobs.remove(absorb);
            blobs[keep].absorb(&fragment);
            absorbed_into.insert(fragment.label, blobs[keep].label);
        }

        if !absorbed_into.is_empty() {
            tracing::trace!(merged = absorbed_into.len(), "Glyph fragments merged");
            for label in labels.pixels_mut() {
                let mut target = label[0];
                while let Some(&next) = absorbed_into.get(&target) {
                    target = next;
                }
                label.0[0] = target;
            }
        }

        blobs
    }

    /// Cut a merged component into equal vertical slices
    fn split(&self, labels: &Labels, blob: &Blob) -> Vec<Piece> {
        let w = blob.width() as f32;
        let h = blob.height() as f32;
        let count = ((w / (self.config.glyph_width_ratio * h)).round() as u32).max(2);

        (0..count)
            .filter_map(|i| {
                let x0 = blob.min_x + (i as f32 * w / count as f32).round() as u32;
                let x1 = blob.min_x + ((i + 1) as f32 * w / count as f32).round() as u32;
                if x1 <= x0 {
                    return None;
                }
                crop_piece(labels, blob, x0, x1 - 1)
            })
            .collect()
    }

    /// Decide single or two-row layout from the vertical glyph centres
    fn assign_rows(&self, pieces: &[Piece], median: f32) -> (PlateLayout, Vec<usize>) {
        let mut centres: Vec<f32> = pieces.iter().map(Piece::centre_y).collect();
        centres.sort_by(f32::total_cmp);

        let widest_gap = centres
            .windows(2)
            .map(|pair| (pair[1] - pair[0], (pair[0] + pair[1]) / 2.0))
            .max_by(|a, b| a.0.total_cmp(&b.0));

        match widest_gap {
            Some((gap, split_at)) if gap > self.config.row_gap_ratio * median => {
                let rows = pieces
                    .iter()
                    .map(|p| usize::from(p.centre_y() > split_at))
                    .collect();
                (PlateLayout::TwoRow, rows)
            }
            _ => (PlateLayout::SingleRow, vec![0; pieces.len()]),
        }
    }
}

/// Ink is the dark Otsu class unless it covers most of the plate, in which
/// case the plate is light-on-dark and the polarity flips
fn ink_mask(image: &GrayImage) -> GrayImage {
    let level = otsu_level(image);
    let total = image.width() as u64 * image.height() as u64;
    let dark = image.pixels().filter(|p| p[0] <= level).count() as u64;
    let inverted = dark * 2 > total;

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let is_dark = image.get_pixel(x, y)[0] <= level;
        if is_dark != inverted {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// First pair in scan order where the later blob is a fragment of the earlier
fn find_fragment_pair(blobs: &[Blob], max_stack_gap: f32) -> Option<(usize, usize)> {
    blobs.iter().enumerate().find_map(|(i, blob)| {
        blobs[i + 1..]
            .iter()
            .position(|other| blob.is_fragment_of(other, max_stack_gap))
            .map(|offset| (i, i + 1 + offset))
    })
}

fn collect_blobs(labels: &Labels) -> Vec<Blob> {
    let mut blobs: Vec<Option<Blob>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        let index = label as usize - 1;
        if blobs.len() <= index {
            blobs.resize(index + 1, None);
        }
        let blob = blobs[index].get_or_insert(Blob {
            label,
            pixels: 0,
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        });
        blob.pixels += 1;
        blob.min_x = blob.min_x.min(x);
        blob.min_y = blob.min_y.min(y);
        blob.max_x = blob.max_x.max(x);
        blob.max_y = blob.max_y.max(y);
    }
    blobs.into_iter().flatten().collect()
}

fn median_height(blobs: &[Blob]) -> Option<f32> {
    let mut heights: Vec<u32> = blobs.iter().map(Blob::height).collect();
    if heights.is_empty() {
        return None;
    }
    heights.sort_unstable();
    let mid = heights.len() / 2;
    let median = if heights.len() % 2 == 0 {
        (heights[mid - 1] + heights[mid]) as f32 / 2.0
    } else {
        heights[mid] as f32
    };
    Some(median)
}

/// Binary patch of one component restricted to columns `x0..=x1`, cropped
/// tight to its ink
fn crop_piece(
    labels: &Labels,
    blob: &Blob,
    x0: u32,
    x1: u32,
) -> Option<Piece> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for y in blob.min_y..=blob.max_y {
        for x in x0..=x1 {
            if labels.get_pixel(x, y)[0] == blob.label {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((lx, ly, hx, hy)) => (lx.min(x), ly.min(y), hx.max(x), hy.max(y)),
                });
            }
        }
    }

    let (lx, ly, hx, hy) = bounds?;
    let rect = BoundingBox {
        x: lx,
        y: ly,
        width: hx - lx + 1,
        height: hy - ly + 1,
    };
    let patch = GrayImage::from_fn(rect.width, rect.height, |px, py| {
        if labels.get_pixel(lx + px, ly + py)[0] == blob.label {
            INK
        } else {
            PAPER
        }
    });

    Some(Piece { rect, patch })
}
