//! Input validation utilities for recognition configuration and requests
//!
//! Configuration values are checked once at load time so the pipeline never
//! has to second-guess a threshold or a pattern while serving requests.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::path::Path;

// ============================================================================
// CONSTANTS: Input Size Limits
// ============================================================================

/// Maximum length for regex patterns (prevent ReDoS)
pub const MAX_REGEX_LENGTH: usize = 256;

/// Maximum regex complexity (nested groups)
pub const MAX_REGEX_COMPLEXITY: usize = 10;

/// Maximum length for caller-supplied identifiers
pub const MAX_ID_LENGTH: usize = 256;

/// Longest plate string any jurisdiction is allowed to configure
pub const MAX_PLATE_LENGTH: usize = 16;

// ============================================================================
// String Validation
// ============================================================================

/// Validate string length does not exceed maximum
pub fn validate_length(value: &str, max_length: usize, field_name: &str) -> Result<()> {
    if value.len() > max_length {
        return Err(anyhow!(
            "{} exceeds maximum length of {} characters (got {})",
            field_name,
            max_length,
            value.len()
        ));
    }
    Ok(())
}

/// Validate string is not empty or whitespace only
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }
    Ok(())
}

/// Validate an identifier supplied by a caller (source ids, node ids)
pub fn validate_id(id: &str, field_name: &str) -> Result<()> {
    validate_non_empty(id, field_name)?;
    validate_length(id, MAX_ID_LENGTH, field_name)?;

    if id.chars().any(|c| c.is_control()) {
        return Err(anyhow!("{} contains control characters", field_name));
    }
    Ok(())
}

// ============================================================================
// Regex Validation (Prevent ReDoS)
// ============================================================================

/// Validate a plate format pattern and compile it
pub fn validate_regex_pattern(pattern: &str) -> Result<Regex> {
    validate_non_empty(pattern, "format pattern")?;
    validate_length(pattern, MAX_REGEX_LENGTH, "format pattern")?;

    let open_parens = pattern.chars().filter(|&c| c == '(').count();
    if open_parens > MAX_REGEX_COMPLEXITY {
        return Err(anyhow!(
            "Regex pattern is too complex ({} groups, max {})",
            open_parens,
            MAX_REGEX_COMPLEXITY
        ));
    }

    let dangerous_patterns = ["(.*)*", "(.+)+", "(a*)*", "(a+)+"];
    for dangerous in &dangerous_patterns {
        if pattern.contains(dangerous) {
            return Err(anyhow!(
                "Regex pattern contains dangerous nested quantifiers that could cause ReDoS: {}",
                dangerous
            ));
        }
    }

    Regex::new(pattern).context("Invalid regex pattern")
}

// ============================================================================
// Numeric Validation
// ============================================================================

/// Validate value is within range. Values that do not compare, such as NaN,
/// are rejected.
pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    min: T,
    max: T,
    field_name: &str,
) -> Result<()> {
    if value.partial_cmp(&min).is_none() || value.partial_cmp(&max).is_none() {
        return Err(anyhow!("{} must be a number, got {}", field_name, value));
    }
    if value < min || value > max {
        return Err(anyhow!(
            "{} must be between {} and {}, got {}",
            field_name,
            min,
            max,
            value
        ));
    }
    Ok(())
}

/// Validate a probability-like threshold lies in [0, 1]
pub fn validate_unit_interval(value: f32, field_name: &str) -> Result<()> {
    validate_range(value, 0.0, 1.0, field_name)
}

/// Validate an inclusive plate length range
pub fn validate_length_range(min: usize, max: usize) -> Result<()> {
    if min == 0 {
        return Err(anyhow!("min_length must be at least 1"));
    }
    if min > max {
        return Err(anyhow!(
            "min_length ({}) must not exceed max_length ({})",
            min,
            max
        ));
    }
    validate_range(max, 1, MAX_PLATE_LENGTH, "max_length")
}

// ============================================================================
// Path Validation
// ============================================================================

/// Validate that a model weight file exists and is a regular file
pub fn validate_model_path(path: &Path, field_name: &str) -> Result<()> {
    let display = path.display().to_string();
    validate_non_empty(&display, field_name)?;

    let metadata = std::fs::metadata(path)
        .with_context(|| format!("{} '{}' is not accessible", field_name, display))?;
    if !metadata.is_file() {
        return Err(anyhow!("{} '{}' is not a file", field_name, display));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("gate-camera-1", "source_id").is_ok());

        assert!(validate_id("", "source_id").is_err());
        assert!(validate_id("   ", "source_id").is_err());
        assert!(validate_id("bad\nid", "source_id").is_err());
        assert!(validate_id(&"a".repeat(300), "source_id").is_err());
    }

    #[test]
    fn test_validate_regex_pattern() {
        let regex = validate_regex_pattern("^[0-9]{2}[A-Z][A-Z0-9]?[0-9]{4,5}$").unwrap();
        assert!(regex.is_match("51F12345"));

        assert!(validate_regex_pattern("").is_err());
        assert!(validate_regex_pattern("(a+)+$").is_err());
        assert!(validate_regex_pattern("[unclosed").is_err());
        assert!(validate_regex_pattern(&"a".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range(5, 1, 10, "count").is_ok());
        assert!(validate_range(1.0f32, 0.25, 10.0, "aspect").is_ok());
        assert!(validate_range(0, 1, 10, "count").is_err());
        assert!(validate_range(12.5f32, 0.25, 10.0, "aspect").is_err());

        let err = validate_range(f32::NAN, 0.25, 10.0, "aspect").unwrap_err();
        assert!(err.to_string().contains("must be a number"));
        assert!(validate_range(f64::NAN, 0.0, 1.0, "ratio").is_err());
    }

    #[test]
    fn test_validate_unit_interval() {
        assert!(validate_unit_interval(0.0, "threshold").is_ok());
        assert!(validate_unit_interval(0.5, "threshold").is_ok());
        assert!(validate_unit_interval(1.0, "threshold").is_ok());

        assert!(validate_unit_interval(-0.1, "threshold").is_err());
        assert!(validate_unit_interval(1.5, "threshold").is_err());
        assert!(validate_unit_interval(f32::NAN, "threshold").is_err());
    }

    #[test]
    fn test_validate_length_range() {
        assert!(validate_length_range(7, 9).is_ok());
        assert!(validate_length_range(1, 1).is_ok());

        assert!(validate_length_range(0, 9).is_err());
        assert!(validate_length_range(9, 7).is_err());
        assert!(validate_length_range(1, 40).is_err());
    }

    #[test]
    fn test_validate_model_path() {
        let temp_dir = TempDir::new().unwrap();
        let model = temp_dir.path().join("detector.onnx");
        std::fs::write(&model, b"onnx").unwrap();

        assert!(validate_model_path(&model, "detector.model_path").is_ok());
        assert!(validate_model_path(temp_dir.path(), "detector.model_path").is_err());
        assert!(validate_model_path(&temp_dir.path().join("missing.onnx"), "detector.model_path").is_err());
    }
}
