use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_MAX_CA_MARKS: f64 = 30.0;
pub const DEFAULT_MAX_EXAM_MARKS: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub const ALL: [Grade; 5] = [Grade::A, Grade::B, Grade::C, Grade::D, Grade::F];

    pub fn letter(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

/// Bands are lower-inclusive: 80 A, 70 B, 60 C, 50 D. `max_total` must be > 0.
pub fn compute_grade(total: f64, max_total: f64) -> Grade {
    let percentage = total / max_total * 100.0;
    if percentage >= 80.0 {
        Grade::A
    } else if percentage >= 70.0 {
        Grade::B
    } else if percentage >= 60.0 {
        Grade::C
    } else if percentage >= 50.0 {
        Grade::D
    } else {
        Grade::F
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkField {
    CaMarks,
    ExamMarks,
}

impl MarkField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ca_marks" | "caMarks" => Some(Self::CaMarks),
            "exam_marks" | "examMarks" => Some(Self::ExamMarks),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::CaMarks => "ca_marks",
            Self::ExamMarks => "exam_marks",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::CaMarks => "CA marks",
            Self::ExamMarks => "Exam marks",
        }
    }
}

impl fmt::Display for MarkField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradeError {
    #[error("invalid mark limits: {0}")]
    Configuration(String),
    #[error("{} cannot exceed {max}", .field.label())]
    AboveMaximum { field: MarkField, value: f64, max: f64 },
    #[error("{} is not a number", .field.label())]
    NotANumber { field: MarkField, raw: String },
        #[error("{} cannot be negative", .field.label())]
    BelowMinimum { field: MarkField, value: f64 },
    #[error("row {row} is out of range (roster has {len} rows)")]
    RowOutOfRange { row: usize, len: usize },
    #[error("duplicate student id in roster: {0}")]
    DuplicateStudent(String),
}

impl GradeError {
    pub fn code(&self) -> &'static str {
        match self {
            GradeError::Configuration(_) => "bad_config",
            GradeError::AboveMaximum { .. }
            | GradeError::BelowMinimum { .. }
            | GradeError::NotANumber { .. } => "validation_failed",
            GradeError::RowOutOfRange { .. } => "not_found",
            GradeError::DuplicateStudent(_) => "bad_params",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkLimits {
    max_ca_marks: f64,
    max_exam_marks: f64,
}

impl MarkLimits {
    pub fn new(max_ca_marks: f64, max_exam_marks: f64) -> Result<Self, GradeError> {
        for (name, v) in [("maxCaMarks", max_ca_marks), ("maxExamMarks", max_exam_marks)] {
            if !v.is_finite() || v < 0.0 {
                return Err(GradeError::Configuration(format!(
                    "{} must be a finite, non-negative number (got {})",
                    name, v
                )));
            }
        }
        if max_ca_marks + max_exam_marks <= 0.0 {
            return Err(GradeError::Configuration(
                "maxCaMarks + maxExamMarks must be > 0".to_string(),
            ));
        }
        Ok(Self {
            max_ca_marks,
            max_exam_marks,
        })
    }

    pub fn max_ca_marks(&self) -> f64 {
        self.max_ca_marks
    }

    pub fn max_exam_marks(&self) -> f64 {
        self.max_exam_marks
    }

    pub fn max_total(&self) -> f64 {
        self.max_ca_marks + self.max_exam_marks
    }

    pub fn max_for(&self, field: MarkField) -> f64 {
        match field {
            MarkField::CaMarks => self.max_ca_marks,
            MarkField::ExamMarks => self.max_exam_marks,
        }
    }

    pub fn check(&self, field: MarkField, value: f64) -> Result<f64, GradeError> {
        if value < 0.0 {
            return Err(GradeError::BelowMinimum { field, value });
        }
        let max = self.max_for(field);
        if value > max {
            return Err(GradeError::AboveMaximum { field, value, max });
        }
        // -0 reads back as 0.
        Ok(value + 0.0)
    }

    pub fn clamp(&self, field: MarkField, value: f64) -> f64 {
        if !value.is_finite() {
            return 0.0;
        }
        value.clamp(0.0, self.max_for(field))
    }

    pub fn grade_for(&self, total: f64) -> Grade {
        compute_grade(total, self.max_total())
    }
}

impl Default for MarkLimits {
    fn default() -> Self {
        Self {
            max_ca_marks: DEFAULT_MAX_CA_MARKS,
            max_exam_marks: DEFAULT_MAX_EXAM_MARKS,
        }
    }
}

/// Blank-as-zero parse for typed cells. Non-numeric and non-finite text
/// also reads as 0.
pub fn parse_mark(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

// Pasted cells: blank is 0, other text is an error.
pub fn parse_pasted_mark(field: MarkField, raw: &str) -> Result<f64, GradeError> {
    let t = raw.trim();
    if t.is_empty() {
        return Ok(0.0);
    }
    match t.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(GradeError::NotANumber {
            field,
            raw: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_band_boundaries_are_lower_inclusive() {
        assert_eq!(compute_grade(80.0, 100.0), Grade::A);
        assert_eq!(compute_grade(79.999, 100.0), Grade::B);
        assert_eq!(compute_grade(70.0, 100.0), Grade::B);
        assert_eq!(compute_grade(69.99, 100.0), Grade::C);
        assert_eq!(compute_grade(60.0, 100.0), Grade::C);
        assert_eq!(compute_grade(50.0, 100.0), Grade::D);
        assert_eq!(compute_grade(49.5, 100.0), Grade::F);
        assert_eq!(compute_grade(0.0, 100.0), Grade::F);
        assert_eq!(compute_grade(100.0, 100.0), Grade::A);
    }

    #[test]
    fn grade_scales_with_max_total() {
        assert_eq!(compute_grade(40.0, 50.0), Grade::A);
        assert_eq!(compute_grade(39.0, 50.0), Grade::B);
        assert_eq!(compute_grade(25.0, 50.0), Grade::D);
    }

    #[test]
    fn grade_never_improves_as_total_drops() {
        let max_total = 100.0;
        let mut prev = compute_grade(max_total, max_total);
        let mut total = max_total;
        while total >= 0.0 {
            let g = compute_grade(total, max_total);
            assert!(Grade::ALL.contains(&g));
            // Grade derives Ord with A < F, so a worse grade compares greater.
            assert!(g >= prev, "grade improved at total={}", total);
            prev = g;
            total -= 0.25;
        }
    }

    #[test]
    fn limits_reject_non_positive_total() {
        assert!(matches!(
            MarkLimits::new(0.0, 0.0),
            Err(GradeError::Configuration(_))
        ));
        assert!(matches!(
            MarkLimits::new(-10.0, 5.0),
            Err(GradeError::Configuration(_))
        ));
        assert!(matches!(
            MarkLimits::new(f64::NAN, 70.0),
            Err(GradeError::Configuration(_))
        ));
        assert!(MarkLimits::new(0.0, 100.0).is_ok());
    }

    #[test]
    fn check_names_field_and_limit() {
        let limits = MarkLimits::default();
        let e = limits.check(MarkField::CaMarks, 45.0).unwrap_err();
        assert_eq!(e.to_string(), "CA marks cannot exceed 30");
        let e = limits.check(MarkField::ExamMarks, -1.0).unwrap_err();
        assert_eq!(e.to_string(), "Exam marks cannot be negative");
        assert_eq!(limits.check(MarkField::ExamMarks, 70.0), Ok(70.0));
    }

    #[test]
    fn parse_mark_treats_blank_and_garbage_as_zero() {
        assert_eq!(parse_mark(""), 0.0);
        assert_eq!(parse_mark("   "), 0.0);
        assert_eq!(parse_mark("abc"), 0.0);
        assert_eq!(parse_mark("NaN"), 0.0);
        assert_eq!(parse_mark("inf"), 0.0);
        assert_eq!(parse_mark(" 12.5 "), 12.5);
        assert_eq!(parse_mark("-3"), -3.0);
    }

    #[test]
    fn negative_zero_is_stored_as_zero() {
        let limits = MarkLimits::default();
        let v = limits
            .check(MarkField::CaMarks, parse_mark("-0"))
            .expect("zero is in range");
        assert!(v.is_sign_positive());
        assert_eq!(serde_json::json!(v).to_string(), "0.0");
    }

    #[test]
    fn pasted_marks_reject_text() {
        assert_eq!(parse_pasted_mark(MarkField::CaMarks, " "), Ok(0.0));
        assert_eq!(parse_pasted_mark(MarkField::CaMarks, "12.5"), Ok(12.5));
        let e = parse_pasted_mark(MarkField::CaMarks, "25 60").unwrap_err();
        assert_eq!(e.to_string(), "CA marks is not a number");
        assert_eq!(e.code(), "validation_failed");
        assert!(parse_pasted_mark(MarkField::ExamMarks, "inf").is_err());
    }
}
