//! Validation of the model's structured completion.
//!
//! The completion is free text that should contain one JSON object with a
//! `students` array. Everything numeric in it is treated as a hint: totals,
//! grades and the class summary are recomputed by `scores`.

use crate::scores::ClassSummary;
use crate::student::{self, StudentReport};
use serde::Serialize;

/// Reported and recomputed totals further apart than this get logged.
const TOTAL_DRIFT_WARN: f64 = 0.1;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("AI response did not contain valid JSON")]
    NoJsonObject,
    #[error("failed to parse AI response: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("AI response has no students array")]
    MissingStudents,
}

impl AnalysisError {
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::NoJsonObject => "analysis_no_json",
            AnalysisError::InvalidJson(_) => "analysis_bad_json",
            AnalysisError::MissingStudents => "analysis_no_students",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub students: Vec<StudentReport>,
    pub summary: ClassSummary,
    /// Entries of the `students` array that were not objects.
    pub dropped: usize,
}

/// Slice from the first `{` to the last `}`.
pub fn extract_json_object(content: &str) -> Result<&str, AnalysisError> {
    let start = content.find('{').ok_or(AnalysisError::NoJsonObject)?;
    let end = content.rfind('}').ok_or(AnalysisError::NoJsonObject)?;
    if end < start {
        return Err(AnalysisError::NoJsonObject);
    }
    Ok(&content[start..=end])
}

pub fn parse_analysis(content: &str) -> Result<AnalysisResult, AnalysisError> {
    let json_str = extract_json_object(content)?;
    let root: serde_json::Value = serde_json::from_str(json_str)?;
    let items = root
        .get("students")
        .and_then(|v| v.as_array())
        .ok_or(AnalysisError::MissingStudents)?;

    let mut students = Vec::with_capacity(items.len());
    let mut dropped = 0usize;
    for (idx, item) in items.iter().enumerate() {
        let Some(s) = StudentReport::from_json(item) else {
            tracing::warn!(index = idx, "dropping non-object student entry");
            dropped += 1;
            continue;
        };
        if let Some(reported) = s.reported_total {
            if (reported - s.total_score).abs() > TOTAL_DRIFT_WARN {
                tracing::warn!(
                    roll_no = %s.roll_no,
                    reported,
                    computed = s.total_score,
                    "model total disagrees with computed total"
                );
            }
        }
        students.push(s);
    }

    let summary = student::class_summary(&students);
    tracing::info!(
        students = students.len(),
        dropped,
        avg_score = summary.avg_score,
        "analysis ingested"
    );
    Ok(AnalysisResult {
        students,
        summary,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETION: &str = r#"Here is the report:
```json
{
  "summary": { "totalStudents": 2, "topPerformer": "Ravi", "avgScore": 99 },
  "gradeDistribution": { "A": 2 },
  "students": [
    {
      "rollNo": "1", "name": "Asha", "totalScore": 70,
      "subjects": [
        { "name": "Maths", "score": 80, "marks": 40, "maxMarks": 50 },
        { "name": "Science", "score": 60, "marks": 30, "maxMarks": 50 }
      ]
    },
    {
      "rollNo": "2", "name": "Ravi", "totalScore": 95,
      "subjects": [
        { "name": "Maths", "score": 50, "maxMarks": 100 }
      ]
    },
    42
  ]
}
```
Let me know if you need anything else."#;

    #[test]
    fn extracts_object_from_wrapped_text() {
        let s = extract_json_object("noise {\"a\": {\"b\": 1}} trailing").expect("slice");
        assert_eq!(s, "{\"a\": {\"b\": 1}}");
        assert!(matches!(
            extract_json_object("no braces here"),
            Err(AnalysisError::NoJsonObject)
        ));
        assert!(matches!(
            extract_json_object("} backwards {"),
            Err(AnalysisError::NoJsonObject)
        ));
    }

    #[test]
    fn summary_is_recomputed_not_trusted() {
        let r = parse_analysis(COMPLETION).expect("analysis");
        assert_eq!(r.students.len(), 2);
        assert_eq!(r.dropped, 1);
        assert_eq!(r.students[0].total_score, 70.0);
        assert_eq!(r.students[1].total_score, 50.0);
        assert_eq!(r.summary.total_students, 2);
        assert_eq!(r.summary.top_performer, "Asha");
        assert_eq!(r.summary.avg_score, 60.0);
        assert_eq!(r.summary.grade_distribution.b, 1);
        assert_eq!(r.summary.grade_distribution.c, 1);
    }

    #[test]
    fn broken_json_and_missing_students_are_distinct_errors() {
        let e = parse_analysis("{ \"students\": [ }").unwrap_err();
        assert_eq!(e.code(), "analysis_bad_json");
        let e = parse_analysis("{ \"summary\": {} }").unwrap_err();
        assert_eq!(e.code(), "analysis_no_students");
        let e = parse_analysis("sorry, I cannot help").unwrap_err();
        assert_eq!(e.code(), "analysis_no_json");
    }
}
