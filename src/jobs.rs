//! Typed transformation-job descriptors.
//!
//! External configuration (a JSON array of job objects) becomes a
//! [`TransformationJob`] list exactly once, here at the boundary. Unknown
//! `kind` discriminators, unknown enum values, and missing required
//! parameters are configuration errors reported before any job executes.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationJob {
    /// Target column names, in order; names absent from the table at
    /// execution time are skipped silently.
    pub columns: Vec<String>,
    #[serde(flatten)]
    pub kind: JobKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum JobKind {
    /// Cast to text, trim, uppercase, replace internal spaces with `_`.
    NormalizeString,
    /// Parse as numeric; store as nullable integer; unparsable becomes Null.
    CastInteger,
    /// Parse as numeric and round half-to-even to `decimals` places.
    CastFloat {
        #[serde(default = "default_float_decimals")]
        decimals: u32,
    },
    /// Coerce standard truthy/falsy forms to a nullable boolean.
    CastBoolean,
    /// Multiply by 100, round, and render as `<value>%` text.
    FormatPercent {
        #[serde(default = "default_percent_decimals")]
        decimals: u32,
    },
    /// Parse permissively (month-first) and render via `pattern`.
    FormatDate { pattern: DatePattern },
    /// Apply an arithmetic operation with a constant factor.
    Scale { operation: ScaleOp, factor: f64 },
    /// Fill currently-missing cells according to `strategy`.
    FillMissing {
        strategy: FillStrategy,
        #[serde(default)]
        fill_value: Option<serde_json::Value>,
    },
    /// Detect and replace outliers in a numeric column.
    HandleOutlier {
        method: OutlierMethod,
        #[serde(default = "default_outlier_threshold")]
        threshold: f64,
        replace: OutlierReplace,
    },
}

fn default_float_decimals() -> u32 {
    4
}

fn default_percent_decimals() -> u32 {
    2
}

fn default_outlier_threshold() -> f64 {
    3.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatePattern {
    #[serde(rename = "YYYY-MM-DD")]
    YearMonthDay,
    #[serde(rename = "DD-MM-YY")]
    DayMonthYear,
    #[serde(rename = "MM-YY")]
    MonthYear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleOp {
    Mul,
    Div,
    Add,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillStrategy {
    Mean,
    Median,
    Mode,
    Constant,
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    Zscore,
    Iqr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierReplace {
    Mean,
    Median,
    Clip,
    Null,
}

/// Parses a JSON job list, failing fast on any structural problem.
pub fn parse_jobs(json: &str) -> Result<Vec<TransformationJob>, EngineError> {
    let jobs: Vec<TransformationJob> = serde_json::from_str(json)
        .map_err(|e| EngineError::Configuration(format!("invalid job list: {e}")))?;
    validate_jobs(&jobs)?;
    Ok(jobs)
}

/// Structural validation applied before any job executes.
pub fn validate_jobs(jobs: &[TransformationJob]) -> Result<(), EngineError> {
    for (index, job) in jobs.iter().enumerate() {
        match &job.kind {
            JobKind::FillMissing {
                strategy: FillStrategy::Constant,
                fill_value: None,
            } => {
                return Err(EngineError::Configuration(format!(
                    "job {index}: fill-missing with strategy 'constant' requires fill_value"
                )));
            }
            JobKind::FillMissing {
                fill_value: Some(value),
                ..
            } if value.is_array() || value.is_object() => {
                return Err(EngineError::Configuration(format!(
                    "job {index}: fill_value must be a scalar"
                )));
            }
            JobKind::HandleOutlier { threshold, .. } if !threshold.is_finite() || *threshold < 0.0 => {
                return Err(EngineError::Configuration(format!(
                    "job {index}: handle-outlier threshold must be a non-negative number"
                )));
            }
            JobKind::Scale { factor, .. } if !factor.is_finite() => {
                return Err(EngineError::Configuration(format!(
                    "job {index}: scale factor must be finite"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}
