//! Plate string assembly and acceptance.

use crate::classifier::ClassifiedGlyph;
use crate::config::{Aggregation, AssemblerConfig};
use crate::error::ModelLoadError;
use common::validation;
use regex::Regex;
use std::fmt;

/// Look-alike pairs as (letter, digit)
const CONFUSABLES: [(char, char); 6] = [
    ('B', '8'),
    ('D', '0'),
    ('G', '6'),
    ('S', '5'),
    ('Z', '2'),
    ('A', '4'),
];

/// Leading and trailing positions that always hold digits
const PROVINCE_DIGITS: usize = 2;
const SERIAL_DIGITS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    Length { len: usize },
    LowConfidence,
    Format,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Empty => write!(f, "no glyphs"),
            RejectReason::Length { len } => write!(f, "length {len} out of range"),
            RejectReason::LowConfidence => write!(f, "confidence below threshold"),
            RejectReason::Format => write!(f, "format mismatch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Assembly {
    Accepted { text: String, confidence: f32 },
    Rejected(RejectReason),
}

pub struct Assembler {
    config: AssemblerConfig,
    format: Regex,
}

impl Assembler {
    pub fn new(config: AssemblerConfig) -> Result<Self, ModelLoadError> {
        let format = validation::validate_regex_pattern(&config.format_pattern)
            .map_err(|e| ModelLoadError::InvalidConfig(format!("{e:#}")))?;
        Ok(Self { config, format })
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn assemble(&self, glyphs: &[ClassifiedGlyph]) -> Assembly {
        if glyphs.is_empty() {
            return Assembly::Rejected(RejectReason::Empty);
        }

        let mut ordered: Vec<&ClassifiedGlyph> = glyphs.iter().collect();
        ordered.sort_by_key(|g| g.index());
        let text: String = ordered.iter().map(|g| g.label).collect();

        let len = ordered.len();
        if len < self.config.min_length || len > self.config.max_length {
            return Assembly::Rejected(RejectReason::Length { len });
        }

        let confidence = self.aggregate(&ordered);
        if confidence < self.config.acceptance_threshold {
            return Assembly::Rejected(RejectReason::LowConfidence);
        }

        if self.format.is_match(&text) {
            return Assembly::Accepted { text, confidence };
        }

        if self.config.coerce_confusables {
            let coerced = coerce(&text);
            if self.format.is_match(&coerced) {
                tracing::debug!(raw = %text, coerced = %coerced, "Plate text coerced to format");
                return Assembly::Accepted {
                    text: coerced,
                    confidence,
                };
            }
        }

        Assembly::Rejected(RejectReason::Format)
    }

    fn aggregate(&self, glyphs: &[&ClassifiedGlyph]) -> f32 {
        let confidences = glyphs.iter().map(|g| g.confidence);
        match self.config.aggregation {
            Aggregation::Min => confidences.fold(f32::INFINITY, f32::min),
            Aggregation::Mean => confidences.sum::<f32>() / glyphs.len() as f32,
        }
    }
}

fn to_digit(c: char) -> char {
    CONFUSABLES
        .iter()
        .find(|(letter, _)| *letter == c)
        .map(|(_, digit)| *digit)
        .unwrap_or(c)
}

fn to_letter(c: char) -> char {
    CONFUSABLES
        .iter()
        .find(|(_, digit)| *digit == c)
        .map(|(letter, _)| *letter)
        .unwrap_or(c)
}

/// Province digits and serial digits become digits, the series becomes a letter
fn coerce(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if i < PROVINCE_DIGITS || i + SERIAL_DIGITS >= len {
                to_digit(c)
            } else if i == PROVINCE_DIGITS {
                to_letter(c)
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::GlyphRegion;
    use common::plates::BoundingBox;
    use image::GrayImage;

    fn glyph(index: usize, label: char, confidence: f32) -> ClassifiedGlyph {
        ClassifiedGlyph {
            region: GlyphRegion {
                rect: BoundingBox {
                    x: index as u32 * 10,
                    y: 0,
                    width: 8,
                    height: 12,
                },
                row: 0,
                index,
                patch: GrayImage::new(1, 1),
            },
            label,
            confidence,
        }
    }

    fn glyphs(text: &str, confidence: f32) -> Vec<ClassifiedGlyph> {
        text.chars()
            .enumerate()
            .map(|(i, c)| glyph(i, c, confidence))
            .collect()
    }

    fn assembler() -> Assembler {
        Assembler::new(AssemblerConfig::default()).unwrap()
    }

    #[test]
    fn test_accepts_valid_plate() {
        let assembly = assembler().assemble(&glyphs("51F12345", 0.9));
        assert_eq!(
            assembly,
            Assembly::Accepted {
                text: "51F12345".to_string(),
                confidence: 0.9
            }
        );
    }

    #[test]
    fn test_orders_by_index() {
        let mut shuffled = glyphs("29A12345", 0.8);
        shuffled.reverse();
        match assembler().assemble(&shuffled) {
            Assembly::Accepted { text, .. } => assert_eq!(text, "29A12345"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_length_bounds() {
        assert_eq!(
            assembler().assemble(&glyphs("51F123", 0.9)),
            Assembly::Rejected(RejectReason::Length { len: 6 })
        );
        assert_eq!(
            assembler().assemble(&glyphs("51F1234567", 0.9)),
            Assembly::Rejected(RejectReason::Length { len: 10 })
        );
        assert_eq!(assembler().assemble(&[]), Assembly::Rejected(RejectReason::Empty));
    }

    #[test]
    fn test_min_aggregation() {
        let mut set = glyphs("51F12345", 0.9);
        set[4].confidence = 0.4;
        assert_eq!(
            assembler().assemble(&set),
            Assembly::Rejected(RejectReason::LowConfidence)
        );
    }

    #[test]
    fn test_mean_aggregation() {
        let config = AssemblerConfig {
            aggregation: Aggregation::Mean,
            ..AssemblerConfig::default()
        };
        let mut set = glyphs("51F12345", 0.9);
        set[4].confidence = 0.4;

        match Assembler::new(config).unwrap().assemble(&set) {
            Assembly::Accepted { confidence, .. } => assert!((confidence - 0.8375).abs() < 1e-6),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_lower_threshold_never_rejects_more() {
        let set = glyphs("51F12345", 0.55);
        let strict = assembler().assemble(&set);
        let lenient = Assembler::new(AssemblerConfig {
            acceptance_threshold: 0.3,
            ..AssemblerConfig::default()
        })
        .unwrap()
        .assemble(&set);

        assert!(matches!(strict, Assembly::Accepted { .. }));
        assert_eq!(strict, lenient);
    }

    #[test]
    fn test_confusables_are_coerced_by_position() {
        // 'S' in the province, '8' as the series, 'B' and 'Z' in the serial
        match assembler().assemble(&glyphs("S18123BZ", 0.9)) {
            Assembly::Accepted { text, .. } => assert_eq!(text, "51B12382"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_format_mismatch_without_coercion() {
        let config = AssemblerConfig {
            coerce_confusables: false,
            ..AssemblerConfig::default()
        };
        assert_eq!(
            Assembler::new(config).unwrap().assemble(&glyphs("S1F12345", 0.9)),
            Assembly::Rejected(RejectReason::Format)
        );

        // Coercion cannot fix a letter with no digit twin
        assert_eq!(
            assembler().assemble(&glyphs("51F1234K", 0.9)),
            Assembly::Rejected(RejectReason::Format)
        );
    }

    #[test]
    fn test_coerce() {
        assert_eq!(coerce("B2812345"), "82B12345");
        assert_eq!(coerce("51FA0DG55"), "51FA00655");
    }
}
