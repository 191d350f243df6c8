use crate::grading::{MarkField, MarkLimits};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldSpec {
    #[serde(rename_all = "camelCase")]
    Text {
        name: String,
        label: String,
        required: bool,
        max_len: Option<usize>,
        pattern: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Number {
        name: String,
        label: String,
        required: bool,
        min: Option<f64>,
        max: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    Select {
        name: String,
        label: String,
        required: bool,
        options: Vec<SelectOption>,
    },
    #[serde(rename_all = "camelCase")]
    Checkbox {
        name: String,
        label: String,
        required: bool,
    },
    #[serde(rename_all = "camelCase")]
    TextArea {
        name: String,
        label: String,
        required: bool,
        max_len: Option<usize>,
    },
}

impl FieldSpec {
    pub fn name(&self) -> &str {
        match self {
            FieldSpec::Text { name, .. }
            | FieldSpec::Number { name, .. }
            | FieldSpec::Select { name, .. }
            | FieldSpec::Checkbox { name, .. }
            | FieldSpec::TextArea { name, .. } => name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FieldSpec::Text { label, .. }
            | FieldSpec::Number { label, .. }
            | FieldSpec::Select { label, .. }
            | FieldSpec::Checkbox { label, .. }
            | FieldSpec::TextArea { label, .. } => label,
        }
    }

    pub fn required(&self) -> bool {
        match self {
            FieldSpec::Text { required, .. }
            | FieldSpec::Number { required, .. }
            | FieldSpec::Select { required, .. }
            | FieldSpec::Checkbox { required, .. }
            | FieldSpec::TextArea { required, .. } => *required,
        }
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        let label = self.label();
        match self {
            FieldSpec::Text {
                max_len, pattern, ..
            } => {
                let s = value_text(value).ok_or_else(|| format!("{} must be text", label))?;
                check_len(label, &s, *max_len)?;
                if let Some(pattern) = pattern {
                    let re = Regex::new(pattern)
                        .map_err(|_| format!("{} has an invalid pattern", label))?;
                    if !re.is_match(&s) {
                        return Err(format!("{} is not valid", label));
                    }
                }
                Ok(())
            }
            FieldSpec::Number { min, max, .. } => {
                let n = value_number(value).ok_or_else(|| format!("{} must be a number", label))?;
                match (min, max) {
                    (Some(lo), Some(hi)) if n < *lo || n > *hi => {
                        Err(format!("{} must be between {} and {}", label, lo, hi))
                    }
                    (Some(lo), None) if n < *lo => Err(format!("{} must be at least {}", label, lo)),
                    (None, Some(hi)) if n > *hi => Err(format!("{} must be at most {}", label, hi)),
                    _ => Ok(()),
                }
            }
            FieldSpec::Select { options, .. } => {
                let s = value_text(value).ok_or_else(|| format!("{} must be text", label))?;
                if options.iter().any(|o| o.value == s) {
                    Ok(())
                } else {
                    Err(format!("{} has an unknown option", label))
                }
            }
            FieldSpec::Checkbox { required, .. } => match value.as_bool() {
                Some(false) if *required => Err(format!("{} is required", label)),
                Some(_) => Ok(()),
                None => Err(format!("{} must be true or false", label)),
            },
            FieldSpec::TextArea { max_len, .. } => {
                let s = value_text(value).ok_or_else(|| format!("{} must be text", label))?;
                check_len(label, &s, *max_len)
            }
        }
    }
}

fn check_len(label: &str, s: &str, max_len: Option<usize>) -> Result<(), String> {
    match max_len {
        Some(max) if s.chars().count() > max => {
            Err(format!("{} must be at most {} characters", label, max))
        }
        _ => Ok(()),
    }
}

fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn is_blank(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// Field name -> first error message. An empty map means the form is valid.
pub fn validate_form(fields: &[FieldSpec], values: &Map<String, Value>) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    for field in fields {
        let value = values.get(field.name());
        if is_blank(value) {
            if field.required() {
                errors.insert(field.name().to_string(), format!("{} is required", field.label()));
            }
            continue;
        }
        if let Some(v) = value {
            if let Err(msg) = field.check(v) {
                errors.insert(field.name().to_string(), msg);
            }
        }
    }
    errors
}

pub fn grade_entry_form(limits: &MarkLimits) -> Vec<FieldSpec> {
    let mark = |field: MarkField, name: &str| FieldSpec::Number {
        name: name.to_string(),
        label: format!("{} Score", field_title(field)),
        required: true,
        min: Some(0.0),
        max: Some(limits.max_for(field)),
    };
    vec![
        mark(MarkField::CaMarks, "ca_score"),
        mark(MarkField::ExamMarks, "exam_score"),
        FieldSpec::TextArea {
            name: "comments".to_string(),
            label: "Comments".to_string(),
            required: false,
            max_len: Some(1000),
        },
    ]
}

fn field_title(field: MarkField) -> &'static str {
    match field {
        MarkField::CaMarks => "CA",
        MarkField::ExamMarks => "Exam",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub ca_score: f64,
    pub exam_score: f64,
    pub total_score: f64,
    pub comments: String,
}

pub fn parse_grade_entry(
    limits: &MarkLimits,
    values: &Map<String, Value>,
) -> Result<GradeEntry, BTreeMap<String, String>> {
    let errors = validate_form(&grade_entry_form(limits), values);
    if !errors.is_empty() {
        return Err(errors);
    }
    let num = |k: &str| values.get(k).and_then(value_number).unwrap_or(0.0);
    let ca_score = num("ca_score");
    let exam_score = num("exam_score");
    Ok(GradeEntry {
        ca_score,
        exam_score,
        total_score: ca_score + exam_score,
        comments: values
            .get("comments")
            .and_then(value_text)
            .unwrap_or_default(),
    })
}
