//! Built-in 5x7 plate font.
//!
//! Covers the plate alphabet plus the '-' and '.' separators printed between
//! the series and the serial. Every glyph is a single 8-connected stroke.

use image::{GrayImage, Luma};

pub const GLYPH_ROWS: u32 = 7;

const FONT: &[(char, [&str; 7])] = &[
    ('0', [".###.", "#...#", "#..##", "#.#.#", "##..#", "#...#", ".###."]),
    ('1', ["..#..", ".##..", "..#..", "..#..", "..#..", "..#..", ".###."]),
    ('2', [".###.", "#...#", "....#", "...#.", "..#..", ".#...", "#####"]),
    ('3', ["#####", "...#.", "..#..", "...#.", "....#", "#...#", ".###."]),
    ('4', ["...#.", "..##.", ".#.#.", "#..#.", "#####", "...#.", "...#."]),
    ('5', ["#####", "#....", "####.", "....#", "....#", "#...#", ".###."]),
    ('6', ["..##.", ".#...", "#....", "####.", "#...#", "#...#", ".###."]),
    ('7', ["#####", "....#", "...#.", "..#..", ".#...", ".#...", ".#..."]),
    ('8', [".###.", "#...#", "#...#", ".###.", "#...#", "#...#", ".###."]),
    ('9', [".###.", "#...#", "#...#", ".####", "....#", "...#.", ".##.."]),
    ('A', [".###.", "#...#", "#...#", "#####", "#...#", "#...#", "#...#"]),
    ('B', ["####.", "#...#", "#...#", "####.", "#...#", "#...#", "####."]),
    ('C', [".###.", "#...#", "#....", "#....", "#....", "#...#", ".###."]),
    ('D', ["####.", "#...#", "#...#", "#...#", "#...#", "#...#", "####."]),
    ('E', ["#####", "#....", "#....", "####.", "#....", "#....", "#####"]),
    ('F', ["#####", "#....", "#....", "####.", "#....", "#....", "#...."]),
    ('G', [".###.", "#...#", "#....", "#.###", "#...#", "#...#", ".####"]),
    ('H', ["#...#", "#...#", "#...#", "#####", "#...#", "#...#", "#...#"]),
    ('K', ["#...#", "#..#.", "#.#..", "##...", "#.#..", "#..#.", "#...#"]),
    ('L', ["#....", "#....", "#....", "#....", "#....", "#....", "#####"]),
    ('M', ["#...#", "##.##", "#.#.#", "#.#.#", "#...#", "#...#", "#...#"]),
    ('N', ["#...#", "#...#", "##..#", "#.#.#", "#..##", "#...#", "#...#"]),
    ('P', ["####.", "#...#", "#...#", "####.", "#....", "#....", "#...."]),
    ('S', [".####", "#....", "#....", ".###.", "....#", "....#", "####."]),
    ('T', ["#####", "..#..", "..#..", "..#..", "..#..", "..#..", "..#.."]),
    ('U', ["#...#", "#...#", "#...#", "#...#", "#...#", "#...#", ".###."]),
    ('V', ["#...#", "#...#", "#...#", "#...#", "#...#", ".#.#.", "..#.."]),
    ('X', ["#...#", "#...#", ".#.#.", "..#..", ".#.#.", "#...#", "#...#"]),
    ('Y', ["#...#", "#...#", ".#.#.", "..#..", "..#..", "..#..", "..#.."]),
    ('Z', ["#####", "....#", "...#.", "..#..", ".#...", "#....", "#####"]),
    ('-', ["...", "...", "...", "###", "...", "...", "..."]),
    ('.', [".", ".", ".", ".", ".", ".", "#"]),
];

/// Row bitmap of a symbol, '#' for ink
pub fn glyph(symbol: char) -> Option<&'static [&'static str; 7]> {
    FONT.iter()
        .find(|(c, _)| *c == symbol)
        .map(|(_, rows)| rows)
}

/// Width of a symbol in font cells
pub fn glyph_width(symbol: char) -> Option<u32> {
    glyph(symbol).map(|rows| rows[0].len() as u32)
}

/// Render a symbol as dark ink on white paper, `scale` pixels per cell
pub fn render(symbol: char, scale: u32) -> Option<GrayImage> {
    let rows = glyph(symbol)?;
    let scale = scale.max(1);
    let width = rows[0].len() as u32;

    Some(GrayImage::from_fn(width * scale, GLYPH_ROWS * scale, |x, y| {
        let cell = rows[(y / scale) as usize].as_bytes()[(x / scale) as usize];
        if cell == b'#' {
            Luma([0])
        } else {
            Luma([255])
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::region_labelling::{connected_components, Connectivity};

    #[test]
    fn test_font_covers_plate_alphabet() {
        for symbol in "0123456789ABCDEFGHKLMNPSTUVXYZ-.".chars() {
            assert!(glyph(symbol).is_some(), "missing glyph {symbol}");
        }
        assert!(glyph('O').is_none());
        assert!(glyph('I').is_none());
    }

    #[test]
    fn test_rows_have_consistent_width() {
        for (symbol, rows) in FONT {
            let width = rows[0].len();
            assert!(rows.iter().all(|r| r.len() == width), "ragged glyph {symbol}");
        }
        assert_eq!(glyph_width('8'), Some(5));
        assert_eq!(glyph_width('-'), Some(3));
    }

    #[test]
    fn test_glyphs_are_single_strokes() {
        for (symbol, _) in FONT {
            let ink = render(*symbol, 1).unwrap();
            let mask = GrayImage::from_fn(ink.width(), ink.height(), |x, y| {
                Luma([255 - ink.get_pixel(x, y)[0]])
            });
            let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
            let components = labels.pixels().map(|p| p[0]).max().unwrap_or(0);
            assert_eq!(components, 1, "glyph {symbol} is not one stroke");
        }
    }

    #[test]
    fn test_render_scale() {
        let image = render('7', 3).unwrap();
        assert_eq!(image.dimensions(), (15, 21));
        assert_eq!(image.get_pixel(0, 0)[0], 0);
        assert_eq!(image.get_pixel(0, 3)[0], 255);
    }

    #[test]
    fn test_distinct_bitmaps() {
        for (i, (a, rows_a)) in FONT.iter().enumerate() {
            for (b, rows_b) in &FONT[i + 1..] {
                assert_ne!(rows_a, rows_b, "{a} and {b} share a bitmap");
            }
        }
    }
}
