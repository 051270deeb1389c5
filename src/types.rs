//! Core data types for alt-text compliance evaluation
//!
//! This module defines the image-type and grade enumerations, the single
//! grade-to-ordinal table consulted by the parser and the tests, and the
//! shapes that flow between the evaluator, the store, and the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role an image plays on the page, as judged by the model
///
/// The grading rubric is bilingual, so `parse` accepts both the canonical
/// tokens and the Korean category names the model may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    /// Supports the body copy or carries information that matters in context
    Informational,

    /// Triggers an interaction such as click or touch
    Functional,

    /// Purely visual, conveys no information
    Decorative,

    /// Tables, charts, infographics needing structural description
    Complex,
}

impl ImageType {
    /// Canonical wire token
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Informational => "informational",
            ImageType::Functional => "functional",
            ImageType::Decorative => "decorative",
            ImageType::Complex => "complex",
        }
    }

    /// Parse a model-emitted label, canonical or Korean
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "informational" | "정보성" | "정보성 이미지" => Some(ImageType::Informational),
            "functional" | "기능성" | "기능성 이미지" => Some(ImageType::Functional),
            "decorative" | "장식적" | "장식적 이미지" => Some(ImageType::Decorative),
            "complex" | "복합적" | "복합적 이미지" => Some(ImageType::Complex),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compliance grade assigned to a piece of alt text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grade {
    VeryHigh,
    SomewhatHigh,
    SomewhatLow,
    VeryLow,
}

/// Ordinal assigned when the model's grade label is missing or unrecognized
pub const DEFAULT_ORDINAL: i64 = 2;

impl Grade {
    /// Canonical wire token
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::VeryHigh => "very-high",
            Grade::SomewhatHigh => "somewhat-high",
            Grade::SomewhatLow => "somewhat-low",
            Grade::VeryLow => "very-low",
        }
    }

    /// Numeric ordinal used for aggregation: 0 is best, 3 is worst
    pub fn ordinal(&self) -> i64 {
        match self {
            Grade::VeryHigh => 0,
            Grade::SomewhatHigh => 1,
            Grade::SomewhatLow => 2,
            Grade::VeryLow => 3,
        }
    }

    /// Parse a model-emitted label, canonical or Korean
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "very-high" | "매우높음" => Some(Grade::VeryHigh),
            "somewhat-high" | "조금높음" => Some(Grade::SomewhatHigh),
            "somewhat-low" | "조금낮음" => Some(Grade::SomewhatLow),
            "very-low" | "매우낮음" => Some(Grade::VeryLow),
            _ => None,
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a raw grade label to its compliant ordinal
///
/// Unknown labels default to somewhat-low rather than failing the evaluation.
pub fn compliant_ordinal(raw_grade: &str) -> i64 {
    Grade::parse(raw_grade)
        .map(|g| g.ordinal())
        .unwrap_or(DEFAULT_ORDINAL)
}

/// Normalized evaluator output
///
/// `image_type` and `grade` hold the canonical token when the model's label
/// was recognized and the raw model string otherwise; `compliant` is always
/// derived from `grade` through the ordinal table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    #[serde(rename = "type")]
    pub image_type: String,
    pub grade: String,
    pub reason: String,
    pub improvement: String,
    pub compliant: i64,
}

/// One persisted evaluation; immutable after insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Store-assigned, monotonically increasing
    pub id: i64,

    /// The alt text that was graded
    pub alt_text: String,

    /// Data-URL image payload the evaluation ran against
    pub image_data: Option<String>,

    pub image_type: Option<String>,
    pub grade: Option<String>,
    pub reason: Option<String>,
    pub improvement: Option<String>,
    pub compliant: Option<i64>,

    /// Store-assigned at insert time, never updated
    pub created_at: DateTime<Utc>,
}

/// Grouped counts over the whole evaluations table
///
/// Rows whose category column is NULL are bucketed under the key `"null"`;
/// compliant ordinals become stringified keys since JSON object keys are
/// strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_evaluations: i64,
    pub type_distribution: BTreeMap<String, i64>,
    pub grade_distribution: BTreeMap<String, i64>,
    pub compliant_distribution: BTreeMap<String, i64>,
}
