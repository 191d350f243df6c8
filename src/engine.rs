use crate::grading::{parse_mark, parse_pasted_mark, Grade, GradeError, MarkField, MarkLimits};
use crate::paste;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A student as delivered by the results API. Prior marks are optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RosterStudent {
    #[serde(alias = "studentId", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, alias = "matricNumber", deserialize_with = "null_as_empty")]
    pub matric_number: String,
    #[serde(default, alias = "fullName", deserialize_with = "null_as_empty")]
    pub full_name: String,
    #[serde(default, alias = "caMarks", deserialize_with = "lenient_mark")]
    pub ca_marks: Option<f64>,
    #[serde(default, alias = "examMarks", deserialize_with = "lenient_mark")]
    pub exam_marks: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
}

fn string_or_number<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }
    Ok(match Id::deserialize(de)? {
        Id::Text(s) => s,
        Id::Unsigned(n) => n.to_string(),
        Id::Signed(n) => n.to_string(),
    })
}

fn null_as_empty<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}

// Marks stored as DECIMAL come back as strings ("25.00"); blank means absent.
fn lenient_mark<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Mark {
        Number(f64),
        Text(String),
    }
    match Option::<Mark>::deserialize(de)? {
        None => Ok(None),
        Some(Mark::Number(v)) => Ok(Some(v)),
        Some(Mark::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Mark::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| <D::Error as serde::de::Error>::custom(format!("invalid mark: {:?}", s))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRow {
    student_id: String,
    matric_number: String,
    full_name: String,
    ca_marks: f64,
    exam_marks: f64,
    total_marks: f64,
    grade: Grade,
    comment: String,
}

impl ScoreRow {
    fn seed(student: &RosterStudent, limits: &MarkLimits) -> Self {
        let ca_marks = seed_mark(student, MarkField::CaMarks, student.ca_marks, limits);
        let exam_marks = seed_mark(student, MarkField::ExamMarks, student.exam_marks, limits);
        let mut row = Self {
            student_id: student.id.clone(),
            matric_number: student.matric_number.clone(),
            full_name: student.full_name.clone(),
            ca_marks,
            exam_marks,
            total_marks: 0.0,
            grade: Grade::F,
            comment: student.comment.clone().unwrap_or_default(),
        };
        row.recompute(limits);
        row
    }

    fn recompute(&mut self, limits: &MarkLimits) {
        self.total_marks = self.ca_marks + self.exam_marks;
        self.grade = limits.grade_for(self.total_marks);
    }

    fn set_mark(&mut self, field: MarkField, value: f64) {
        match field {
            MarkField::CaMarks => self.ca_marks = value,
            MarkField::ExamMarks => self.exam_marks = value,
        }
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn ca_marks(&self) -> f64 {
        self.ca_marks
    }

    pub fn exam_marks(&self) -> f64 {
        self.exam_marks
    }

    pub fn total_marks(&self) -> f64 {
        self.total_marks
    }

    pub fn grade(&self) -> Grade {
        self.grade
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }
}

fn seed_mark(
    student: &RosterStudent,
    field: MarkField,
    prior: Option<f64>,
    limits: &MarkLimits,
) -> f64 {
    let raw = prior.unwrap_or(0.0);
    let seeded = limits.clamp(field, raw);
    if seeded != raw {
        tracing::warn!(
            student_id = %student.id,
            field = %field,
            prior = raw,
            seeded,
            "prior mark outside limits; clamped"
        );
    }
    seeded
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellField {
    Mark(MarkField),
    Comment,
}

impl CellField {
    pub fn parse(s: &str) -> Option<Self> {
        if s == "comment" {
            return Some(Self::Comment);
        }
        MarkField::parse(s).map(Self::Mark)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub student_id: String,
    pub ca_marks: f64,
    pub exam_marks: f64,
    pub comment: String,
}

impl From<&ScoreRow> for ScoreSubmission {
    fn from(row: &ScoreRow) -> Self {
        Self {
            student_id: row.student_id().to_string(),
            ca_marks: row.ca_marks(),
            exam_marks: row.exam_marks(),
            comment: row.comment().to_string(),
        }
    }
}

pub trait ResultSink {
    fn save_draft(&mut self, course_id: &str, rows: &[ScoreSubmission]) -> anyhow::Result<()>;
    fn submit(&mut self, course_id: &str, rows: &[ScoreSubmission]) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteRejection {
    pub row: usize,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<MarkField>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteResult {
    pub applied_rows: usize,
    pub rejected_rows: Vec<usize>,
    pub ignored_lines: usize,
    pub rejections: Vec<PasteRejection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSummary {
    pub row_count: usize,
    pub grade_a_count: usize,
    pub grade_f_count: usize,
    pub grade_counts: BTreeMap<Grade, usize>,
    /// `None` for an empty roster.
    pub average_total: Option<f64>,
    pub average_total_display: String,
}

#[derive(Debug, Clone)]
pub struct GradeEntryEngine {
    course_id: String,
    limits: MarkLimits,
    roster: Vec<RosterStudent>,
    rows: Vec<ScoreRow>,
}

impl GradeEntryEngine {
    pub fn initialize(
        course_id: impl Into<String>,
        roster: Vec<RosterStudent>,
        limits: MarkLimits,
    ) -> Result<Self, GradeError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(roster.len());
        for s in &roster {
            if !seen.insert(s.id.as_str()) {
                return Err(GradeError::DuplicateStudent(s.id.clone()));
            }
        }

        let rows = build_rows(&roster, &limits);
        Ok(Self {
            course_id: course_id.into(),
            limits,
            roster,
            rows,
        })
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn limits(&self) -> MarkLimits {
        self.limits
    }

    pub fn rows(&self) -> &[ScoreRow] {
        &self.rows
    }

    pub fn set_cell(
        &mut self,
        row: usize,
        field: CellField,
        raw: &str,
    ) -> Result<&ScoreRow, GradeError> {
        let len = self.rows.len();
        let limits = self.limits;
        let target = self
            .rows
            .get_mut(row)
            .ok_or(GradeError::RowOutOfRange { row, len })?;

        match field {
            CellField::Comment => target.comment = raw.to_string(),
            CellField::Mark(mark) => {
                let value = limits.check(mark, parse_mark(raw))?;
                target.set_mark(mark, value);
                target.recompute(&limits);
            }
        }
        Ok(&*target)
    }

    pub fn apply_pasted_block(&mut self, text: &str) -> PasteResult {
        self.apply_pasted_block_at(0, text)
    }

    /// A row is applied whole or not at all.
    pub fn apply_pasted_block_at(&mut self, start_row: usize, text: &str) -> PasteResult {
        let limits = self.limits;
        let mut result = PasteResult::default();

        for (line, pasted) in paste::parse_block(text).iter().enumerate() {
            let row = start_row + line;
            let Some(target) = self.rows.get_mut(row) else {
                result.ignored_lines += 1;
                continue;
            };

            let Some((ca_raw, exam_raw)) = pasted.first_two() else {
                result.rejected_rows.push(row);
                result.rejections.push(PasteRejection {
                    row,
                    line,
                    field: None,
                    message: format!("Row {}: expected CA and Exam columns", row + 1),
                });
                continue;
            };

            let checked = parse_pasted_mark(MarkField::CaMarks, ca_raw)
                .and_then(|ca| limits.check(MarkField::CaMarks, ca))
                .and_then(|ca| {
                    parse_pasted_mark(MarkField::ExamMarks, exam_raw)
                        .and_then(|exam| limits.check(MarkField::ExamMarks, exam))
                        .map(|exam| (ca, exam))
                });

            match checked {
                Ok((ca, exam)) => {
                    target.set_mark(MarkField::CaMarks, ca);
                    target.set_mark(MarkField::ExamMarks, exam);
                    target.recompute(&limits);
                    result.applied_rows += 1;
                }
                Err(e) => {
                    let field = match &e {
                        GradeError::AboveMaximum { field, .. }
                        | GradeError::BelowMinimum { field, .. }
                        | GradeError::NotANumber { field, .. } => Some(*field),
                        _ => None,
                    };
                    result.rejected_rows.push(row);
                    result.rejections.push(PasteRejection {
                        row,
                        line,
                        field,
                        message: format!("Row {}: {}", row + 1, e),
                    });
                }
            }
        }

        result
    }

    pub fn reset(&mut self) -> &[ScoreRow] {
        self.rows = build_rows(&self.roster, &self.limits);
        &self.rows
    }

    pub fn submissions(&self) -> Vec<ScoreSubmission> {
        self.rows.iter().map(ScoreSubmission::from).collect()
    }

    /// Returns the number of rows handed to the sink.
    pub fn save_draft<S: ResultSink + ?Sized>(&self, sink: &mut S) -> anyhow::Result<usize> {
        let rows = self.submissions();
        sink.save_draft(&self.course_id, &rows).map(|()| rows.len())
    }

    pub fn submit<S: ResultSink + ?Sized>(&self, sink: &mut S) -> anyhow::Result<usize> {
        let rows = self.submissions();
        sink.submit(&self.course_id, &rows).map(|()| rows.len())
    }

    pub fn summary(&self) -> GridSummary {
        let mut grade_counts: BTreeMap<Grade, usize> =
            Grade::ALL.iter().map(|g| (*g, 0)).collect();
        let mut sum_total = 0.0;
        for row in &self.rows {
            *grade_counts.entry(row.grade).or_insert(0) += 1;
            sum_total += row.total_marks;
        }

        let row_count = self.rows.len();
        let average_total = if row_count > 0 {
            Some(sum_total / row_count as f64)
        } else {
            None
        };
        let average_total_display = match average_total {
            Some(avg) => format!("{:.1}", avg),
            None => "N/A".to_string(),
        };

        GridSummary {
            row_count,
            grade_a_count: grade_counts.get(&Grade::A).copied().unwrap_or(0),
            grade_f_count: grade_counts.get(&Grade::F).copied().unwrap_or(0),
            grade_counts,
            average_total,
            average_total_display,
        }
    }
}

fn build_rows(roster: &[RosterStudent], limits: &MarkLimits) -> Vec<ScoreRow> {
    roster.iter().map(|s| ScoreRow::seed(s, limits)).collect()
}
