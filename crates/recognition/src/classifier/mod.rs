//! Per-glyph classification over a closed alphabet.

pub mod font;
mod onnx;
mod template;

pub use onnx::OnnxGlyphClassifier;
pub use template::TemplateClassifier;

use crate::geometry::clamp_confidence;
use crate::segmenter::GlyphRegion;
use anyhow::{anyhow, bail, Result};
use image::GrayImage;
use std::collections::HashSet;
use std::fmt;

/// Ordered, duplicate-free set of symbols a classifier can emit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<char>,
}

impl Alphabet {
    pub fn new(symbols: &str) -> Result<Self> {
        let symbols: Vec<char> = symbols.chars().collect();
        if symbols.is_empty() {
            bail!("alphabet must not be empty");
        }

        let mut seen = HashSet::new();
        if let Some(dup) = symbols.iter().find(|c| !seen.insert(**c)) {
            bail!("alphabet repeats symbol '{}'", dup);
        }

        Ok(Self { symbols })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbol(&self, index: usize) -> Option<char> {
        self.symbols.get(index).copied()
    }

    pub fn index_of(&self, symbol: char) -> Option<usize> {
        self.symbols.iter().position(|&c| c == symbol)
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.symbols.iter().try_for_each(|c| write!(f, "{c}"))
    }
}

/// A glyph with its label
#[derive(Debug, Clone)]
pub struct ClassifiedGlyph {
    pub region: GlyphRegion,
    pub label: char,
    /// Score of the winning symbol (0.0 to 1.0)
    pub confidence: f32,
}

impl ClassifiedGlyph {
    pub fn index(&self) -> usize {
        self.region.index
    }

    pub fn is_confident(&self, min_confidence: f32) -> bool {
        self.confidence >= min_confidence
    }
}

/// Scores one glyph patch against every symbol of its alphabet
pub trait GlyphClassifier: Send + Sync {
    /// Backend name reported in model info (e.g., "template")
    fn name(&self) -> &'static str;

    fn alphabet(&self) -> &Alphabet;

    /// One score in [0, 1] per alphabet symbol, in alphabet order
    fn scores(&self, patch: &GrayImage) -> Result<Vec<f32>>;

    /// ONNX execution provider in use, for learned backends
    fn execution_provider(&self) -> Option<&str> {
        None
    }

    /// Pick the best-scoring symbol; the lowest index wins ties
    fn classify(&self, region: GlyphRegion) -> Result<ClassifiedGlyph> {
        let scores = self.scores(&region.patch)?;
        let alphabet = self.alphabet();
        if scores.len() != alphabet.len() {
            bail!(
                "classifier returned {} scores for an alphabet of {} symbols",
                scores.len(),
                alphabet.len()
            );
        }

        let (best, score) = argmax(&scores).ok_or_else(|| anyhow!("classifier returned no scores"))?;
        let label = alphabet
            .symbol(best)
            .ok_or_else(|| anyhow!("score index {} outside alphabet", best))?;

        Ok(ClassifiedGlyph {
            region,
            label,
            confidence: clamp_confidence(score),
        })
    }
}

/// Index and value of the first maximum; NaN scores count as zero
pub(crate) fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .map(|&s| if s.is_nan() { 0.0 } else { s })
        .enumerate()
        .fold(None, |best, (i, s)| match best {
            Some((_, top)) if s <= top => best,
            _ => Some((i, s)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::plates::BoundingBox;

    struct FixedScores {
        alphabet: Alphabet,
        scores: Vec<f32>,
    }

    impl GlyphClassifier for FixedScores {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn alphabet(&self) -> &Alphabet {
            &self.alphabet
        }

        fn scores(&self, _patch: &GrayImage) -> Result<Vec<f32>> {
            Ok(self.scores.clone())
        }
    }

    fn region() -> GlyphRegion {
        GlyphRegion {
            rect: BoundingBox {
                x: 0,
                y: 0,
                width: 4,
                height: 6,
            },
            row: 0,
            index: 3,
            patch: GrayImage::new(4, 6),
        }
    }

    #[test]
    fn test_alphabet() {
        let alphabet = Alphabet::new("0123456789ABCDEFGHKLMNPSTUVXYZ").unwrap();
        assert_eq!(alphabet.len(), 30);
        assert_eq!(alphabet.symbol(10), Some('A'));
        assert_eq!(alphabet.index_of('Z'), Some(29));
        assert_eq!(alphabet.index_of('O'), None);
        assert_eq!(alphabet.to_string(), "0123456789ABCDEFGHKLMNPSTUVXYZ");

        assert!(Alphabet::new("").is_err());
        assert!(Alphabet::new("ABA").is_err());
    }

    #[test]
    fn test_argmax_ties_and_nan() {
        assert_eq!(argmax(&[0.2, 0.7, 0.7]), Some((1, 0.7)));
        assert_eq!(argmax(&[f32::NAN, 0.1]), Some((1, 0.1)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_classify_picks_best_symbol() {
        let classifier = FixedScores {
            alphabet: Alphabet::new("AB8").unwrap(),
            scores: vec![0.1, 0.6, 0.6],
        };

        let glyph = classifier.classify(region()).unwrap();
        assert_eq!(glyph.label, 'B');
        assert_eq!(glyph.confidence, 0.6);
        assert_eq!(glyph.index(), 3);
        assert!(glyph.is_confident(0.3));
        assert!(!glyph.is_confident(0.7));
    }

    #[test]
    fn test_low_confidence_glyph_is_still_returned() {
        let classifier = FixedScores {
            alphabet: Alphabet::new("AB").unwrap(),
            scores: vec![0.05, 0.1],
        };

        let glyph = classifier.classify(region()).unwrap();
        assert_eq!(glyph.label, 'B');
        assert!(!glyph.is_confident(0.3));
    }

    #[test]
    fn test_score_count_mismatch_is_an_error() {
        let classifier = FixedScores {
            alphabet: Alphabet::new("ABC").unwrap(),
            scores: vec![0.5, 0.5],
        };
        assert!(classifier.classify(region()).is_err());
    }
}
