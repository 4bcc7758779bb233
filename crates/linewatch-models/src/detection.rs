//! Detection records and the filters applied to them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default minimum confidence for a detection to be recorded.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.4;

/// Class names segmented by default.
pub const DEFAULT_DEFECT_CLASSES: &[&str] = &["bad_insulator", "damaged_insulator", "nest"];

/// Axis-aligned box in image pixel coordinates, serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox(pub [f64; 4]);

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self([x1, y1, x2, y2])
    }

    pub fn x1(&self) -> f64 {
        self.0[0]
    }

    pub fn y1(&self) -> f64 {
        self.0[1]
    }

    pub fn x2(&self) -> f64 {
        self.0[2]
    }

    pub fn y2(&self) -> f64 {
        self.0[3]
    }

    pub fn width(&self) -> f64 {
        self.x2() - self.x1()
    }

    pub fn height(&self) -> f64 {
        self.y2() - self.y1()
    }

    /// True when all coordinates are finite and the box has positive area.
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|v| v.is_finite()) && self.x1() < self.x2() && self.y1() < self.y2()
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.1}, {:.1}, {:.1}, {:.1}]",
            self.x1(),
            self.y1(),
            self.x2(),
            self.y2()
        )
    }
}

/// A single object found by the detection model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Model class label. The inference service sends this as `class`.
    #[serde(alias = "class")]
    pub class_name: String,
    /// Detection confidence [0, 1]
    pub confidence: f64,
    /// Box in source image pixels
    pub bbox: BoundingBox,
}

impl DetectionRecord {
    pub fn new(class_name: impl Into<String>, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
            bbox,
        }
    }
}

/// Minimum confidence a detection needs before it is persisted or counted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceThreshold(f64);

impl ConfidenceThreshold {
    /// Create a threshold, clamped to [0, 1].
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Whether a record passes the threshold and is well formed.
    pub fn accepts(&self, record: &DetectionRecord) -> bool {
        (0.0..=1.0).contains(&record.confidence)
            && record.confidence >= self.0
            && record.bbox.is_valid()
    }

    /// Keep only accepted records, preserving order.
    pub fn filter(&self, records: Vec<DetectionRecord>) -> Vec<DetectionRecord> {
        records.into_iter().filter(|r| self.accepts(r)).collect()
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

/// Allow-list of class names that the segmentation stage masks.
///
/// Matching is by name only (trimmed, ASCII case-insensitive). Numeric
/// class ids are not stable across model versions and are never used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefectClasses {
    names: BTreeSet<String>,
}

impl DefectClasses {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| normalize_class(n.as_ref()))
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    /// Parse a comma separated list, e.g. `"bad_insulator, nest"`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.names.contains(&normalize_class(class_name))
    }

    pub fn is_target(&self, record: &DetectionRecord) -> bool {
        self.contains(&record.class_name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Default for DefectClasses {
    fn default() -> Self {
        Self::new(DEFAULT_DEFECT_CLASSES)
    }
}

fn normalize_class(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
