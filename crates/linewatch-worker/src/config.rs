//! Pipeline configuration.

use linewatch_models::{ConfidenceThreshold, DefectClasses, DEFAULT_CONFIDENCE_THRESHOLD};

/// Default overlay color (red).
pub const DEFAULT_HIGHLIGHT_COLOR: [u8; 3] = [255, 0, 0];

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum confidence for a detection to be recorded
    pub confidence_threshold: ConfidenceThreshold,
    /// Class names that get segmented
    pub defect_classes: DefectClasses,
    /// RGB color painted where a mask is set
    pub highlight_color: [u8; 3],
    /// Maximum stage runs executing at once across all sessions
    pub max_concurrent_jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: ConfidenceThreshold::default(),
            defect_classes: DefectClasses::default(),
            highlight_color: DEFAULT_HIGHLIGHT_COLOR,
            max_concurrent_jobs: 4,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            confidence_threshold: ConfidenceThreshold::new(
                std::env::var("CONFIDENCE_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            ),
            defect_classes: std::env::var("DEFECT_CLASSES")
                .ok()
                .map(|s| DefectClasses::parse(&s))
                .filter(|classes| !classes.is_empty())
                .unwrap_or_default(),
            highlight_color: std::env::var("MASK_HIGHLIGHT_COLOR")
                .ok()
                .and_then(|s| parse_color(&s))
                .unwrap_or(DEFAULT_HIGHLIGHT_COLOR),
            max_concurrent_jobs: std::env::var("PIPELINE_MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(4),
        }
    }
}

/// Parse `r,g,b` into a color.
pub fn parse_color(value: &str) -> Option<[u8; 3]> {
    let parts: Vec<u8> = value
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    match parts.as_slice() {
        [r, g, b] => Some([*r, *g, *b]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("255,0,0"), Some([255, 0, 0]));
        assert_eq!(parse_color(" 12, 34 ,56 "), Some([12, 34, 56]));
        assert_eq!(parse_color("255,0"), None);
        assert_eq!(parse_color("256,0,0"), None);
        assert_eq!(parse_color("red"), None);
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.confidence_threshold.value(), 0.4);
        assert!(config.defect_classes.contains("nest"));
        assert_eq!(config.highlight_color, [255, 0, 0]);
        assert_eq!(config.max_concurrent_jobs, 4);
    }
}
