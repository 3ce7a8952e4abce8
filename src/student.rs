use crate::scores::{self, ClassSummary, StudentScores, SubjectRecord};
use crate::sheet::whole_number;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthStep {
    pub priority: String,
    pub description: String,
}

/// One student's validated record. Totals and grade always come from the
/// aggregator, whatever the upstream source claimed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub roll_no: String,
    pub name: String,
    pub father_name: Option<String>,
    pub class_name: Option<String>,
    pub custom_attributes: BTreeMap<String, String>,
    pub grade: String,
    pub total_score: f64,
    /// Total as supplied upstream, kept for review only.
    pub reported_total: Option<f64>,
    pub subjects: Vec<SubjectRecord>,
    pub remarks: Option<String>,
    pub strengths: Vec<String>,
    pub growth_plan: Vec<GrowthStep>,
    pub objective_score: Option<f64>,
    pub subjective_score: Option<f64>,
}

const KNOWN_KEYS: &[&str] = &[
    "rollNo",
    "name",
    "fatherName",
    "className",
    "Class",
    "customAttributes",
    "grade",
    "totalScore",
    "reportedTotal",
    "subjects",
    "remarks",
    "strengths",
    "growthPlan",
    "objectiveScore",
    "subjectiveScore",
];

pub fn scalar_string(v: &serde_json::Value) -> Option<String> {
    let s = match v {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => match n.as_f64().and_then(whole_number) {
            Some(i) => i.to_string(),
            None => n.to_string(),
        },
        serde_json::Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn opt_number(v: Option<&serde_json::Value>) -> Option<f64> {
    match v {
        None | Some(serde_json::Value::Null) => None,
        Some(other) => Some(scores::coerce_number(other)),
    }
}

fn string_list(v: Option<&serde_json::Value>) -> Vec<String> {
    match v {
        Some(serde_json::Value::Array(items)) => items.iter().filter_map(scalar_string).collect(),
        Some(other) => scalar_string(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn growth_plan(v: Option<&serde_json::Value>) -> Vec<GrowthStep> {
    let Some(items) = v.and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            serde_json::Value::Object(_) => {
                let priority = item.get("priority").and_then(scalar_string).unwrap_or_default();
                let description = item
                    .get("description")
                    .and_then(scalar_string)
                    .unwrap_or_default();
                if priority.is_empty() && description.is_empty() {
                    None
                } else {
                    Some(GrowthStep {
                        priority,
                        description,
                    })
                }
            }
            other => scalar_string(other).map(|description| GrowthStep {
                priority: String::new(),
                description,
            }),
        })
        .collect()
}

impl StudentReport {
    /// Lenient parse of a student object. Returns `None` for non-objects.
    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        let obj = v.as_object()?;

        let mut custom_attributes = BTreeMap::new();
        if let Some(serde_json::Value::Object(attrs)) = obj.get("customAttributes") {
            for (k, val) in attrs {
                if let Some(s) = scalar_string(val) {
                    custom_attributes.insert(k.trim().to_string(), s);
                }
            }
        }
        for (k, val) in obj {
            if KNOWN_KEYS.contains(&k.as_str()) {
                continue;
            }
            if let Some(s) = scalar_string(val) {
                custom_attributes.entry(k.trim().to_string()).or_insert(s);
            }
        }

        let subjects = obj
            .get("subjects")
            .and_then(|s| s.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.is_object())
                    .map(SubjectRecord::from_json)
                    .collect()
            })
            .unwrap_or_default();

        let reported_total = opt_number(obj.get("reportedTotal").or_else(|| obj.get("totalScore")));

        let mut out = Self {
            roll_no: obj.get("rollNo").and_then(scalar_string).unwrap_or_default(),
            name: obj.get("name").and_then(scalar_string).unwrap_or_default(),
            father_name: obj.get("fatherName").and_then(scalar_string),
            class_name: obj
                .get("className")
                .or_else(|| obj.get("Class"))
                .and_then(scalar_string),
            custom_attributes,
            grade: String::new(),
            total_score: 0.0,
            reported_total,
            subjects,
            remarks: obj.get("remarks").and_then(scalar_string),
            strengths: string_list(obj.get("strengths")),
            growth_plan: growth_plan(obj.get("growthPlan")),
            objective_score: opt_number(obj.get("objectiveScore")),
            subjective_score: opt_number(obj.get("subjectiveScore")),
        };
        out.recompute();
        Some(out)
    }

    pub fn recompute(&mut self) {
        self.total_score = scores::total_percentage(&self.subjects);
        self.grade = scores::letter_grade(self.total_score).to_string();
    }

    pub fn scores(&self) -> StudentScores<'_> {
        StudentScores {
            name: &self.name,
            total: self.total_score,
            subjects: &self.subjects,
        }
    }

    /// Sets a subject's percentage; numeric subjects get their marks rescaled to match.
    pub fn set_subject_score(&mut self, subject_index: usize, score: f64) -> bool {
        let Some(subject) = self.subjects.get_mut(subject_index) else {
            return false;
        };
        let score = if score.is_finite() { score } else { 0.0 };
        subject.score = score;
        if let scores::MaxMarks::Points(max) = subject.max_marks {
            subject.marks = scores::Marks::Points(score * max / 100.0);
        }
        self.recompute();
        true
    }
}

/// Review-step edits. `None` leaves a field untouched; a `null` attribute value removes it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    pub roll_no: Option<String>,
    pub name: Option<String>,
    pub father_name: Option<String>,
    pub class_name: Option<String>,
    pub remarks: Option<String>,
    pub custom_attributes: Option<BTreeMap<String, Option<String>>>,
}

impl StudentPatch {
    pub fn apply(self, student: &mut StudentReport) {
        if let Some(v) = self.roll_no {
            student.roll_no = v.trim().to_string();
        }
        if let Some(v) = self.name {
            student.name = v.trim().to_string();
        }
        if let Some(v) = self.father_name {
            student.father_name = non_empty(v);
        }
        if let Some(v) = self.class_name {
            student.class_name = non_empty(v);
        }
        if let Some(v) = self.remarks {
            student.remarks = non_empty(v);
        }
        if let Some(attrs) = self.custom_attributes {
            for (k, v) in attrs {
                match v.and_then(non_empty) {
                    Some(v) => {
                        student.custom_attributes.insert(k, v);
                    }
                    None => {
                        student.custom_attributes.remove(&k);
                    }
                }
            }
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

pub fn class_summary(students: &[StudentReport]) -> ClassSummary {
    scores::summarize_class(students.iter().map(StudentReport::scores))
}
