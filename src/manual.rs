use crate::scores::{self, Marks, SubjectRecord, GRADE_SENTINEL};
use crate::sheet::{Cell, RawGrid};
use crate::student::StudentReport;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

fn default_max_marks() -> String {
    "100".to_string()
}

/// Manual-entry template: categories nest, subjects are leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntryNode {
    Category {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default)]
        children: Vec<EntryNode>,
    },
    Subject {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default, rename = "marksObtained")]
        marks_obtained: String,
        #[serde(default = "default_max_marks", rename = "maxMarks")]
        max_marks: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualProfile {
    pub name: String,
    pub roll_no: String,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
}

/// Payload handed to the model for a manually entered student.
pub fn analysis_input(profile: &ManualProfile, tree: &[EntryNode]) -> Value {
    let mut student_profile = Map::new();
    student_profile.insert("name".into(), Value::String(profile.name.clone()));
    student_profile.insert("rollNo".into(), Value::String(profile.roll_no.clone()));
    if let Some(class) = profile.class_name.as_ref().filter(|c| !c.trim().is_empty()) {
        student_profile.insert("Class".into(), Value::String(class.clone()));
    }
    for f in &profile.custom_fields {
        let key = f.key.trim();
        if key.is_empty() {
            continue;
        }
        student_profile.insert(key.to_string(), Value::String(f.value.clone()));
    }

    let mut academic = Map::new();
    for node in tree {
        academic.insert(node_name(node).to_string(), node_payload(node));
    }

    json!({
        "studentProfile": Value::Object(student_profile),
        "academicPerformance": Value::Object(academic),
    })
}

fn node_name(node: &EntryNode) -> &str {
    match node {
        EntryNode::Category { name, .. } | EntryNode::Subject { name, .. } => name,
    }
}

fn node_payload(node: &EntryNode) -> Value {
    match node {
        EntryNode::Subject {
            name,
            marks_obtained,
            max_marks,
            ..
        } => json!({ "name": name, "marks": marks_obtained, "maxMarks": max_marks }),
        EntryNode::Category { children, .. } => {
            let mut out = Map::new();
            for child in children {
                out.insert(node_name(child).to_string(), node_payload(child));
            }
            Value::Object(out)
        }
    }
}

/// Subject records computed locally from the template, category = nearest
/// enclosing category.
pub fn flatten_subjects(tree: &[EntryNode]) -> Vec<SubjectRecord> {
    let mut out = Vec::new();
    collect_subjects(tree, None, &mut out);
    out
}

fn collect_subjects(nodes: &[EntryNode], category: Option<&str>, out: &mut Vec<SubjectRecord>) {
    for node in nodes {
        match node {
            EntryNode::Category { name, children, .. } => {
                collect_subjects(children, Some(name.as_str()), out);
            }
            EntryNode::Subject {
                name,
                marks_obtained,
                max_marks,
                ..
            } => out.push(subject_record(
                name,
                category.unwrap_or(""),
                marks_obtained,
                max_marks,
            )),
        }
    }
}

fn subject_record(name: &str, category: &str, marks: &str, max_marks: &str) -> SubjectRecord {
    if max_marks.trim() == GRADE_SENTINEL {
        return SubjectRecord::graded(name.trim(), category, marks.trim(), 0.0);
    }
    let max = scores::coerce_number(&Value::String(max_marks.to_string()));
    let marks = Marks::from_json(&Value::String(marks.to_string())).unwrap_or(Marks::Points(0.0));
    let score = if max > 0.0 {
        scores::round_off_1_decimal(marks.value() / max * 100.0)
    } else {
        0.0
    };
    SubjectRecord {
        name: name.trim().to_string(),
        category: scores::normalize_category(category),
        marks,
        max_marks: scores::MaxMarks::Points(max),
        score,
    }
}

/// Builds a student record without the model; narrative fields stay empty.
pub fn generate_student(profile: &ManualProfile, tree: &[EntryNode]) -> StudentReport {
    let custom_attributes: BTreeMap<String, String> = profile
        .custom_fields
        .iter()
        .filter(|f| !f.key.trim().is_empty() && !f.value.trim().is_empty())
        .map(|f| (f.key.trim().to_string(), f.value.trim().to_string()))
        .collect();
    let mut s = StudentReport {
        roll_no: profile.roll_no.trim().to_string(),
        name: profile.name.trim().to_string(),
        father_name: None,
        class_name: profile
            .class_name
            .as_ref()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
        custom_attributes,
        grade: String::new(),
        total_score: 0.0,
        reported_total: None,
        subjects: flatten_subjects(tree),
        remarks: None,
        strengths: Vec::new(),
        growth_plan: Vec::new(),
        objective_score: None,
        subjective_score: None,
    };
    s.recompute();
    s
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SheetStudent {
    pub roll_no: String,
    pub name: String,
    pub father_name: String,
    pub class_name: String,
    pub remarks: String,
    /// Obtained marks keyed by subject node id.
    pub marks: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetLayout {
    pub header_row: Vec<String>,
    pub data_rows: Vec<Vec<String>>,
}

impl SheetLayout {
    pub fn to_grid(&self) -> RawGrid {
        std::iter::once(&self.header_row)
            .chain(self.data_rows.iter())
            .map(|row| {
                row.iter()
                    .map(|v| if v.is_empty() { Cell::Empty } else { Cell::text(v.clone()) })
                    .collect()
            })
            .collect()
    }
}

const STATIC_HEADERS: [&str; 4] = ["Roll No", "Student Name", "Father Name", "Class"];

/// Flat spreadsheet layout: identity columns, a marks/max pair per subject, remarks.
pub fn sheet_layout(template: &[EntryNode], students: &[SheetStudent]) -> SheetLayout {
    let mut subjects: Vec<(&str, &str, &str)> = Vec::new(); // id, name, max
    collect_layout_subjects(template, &mut subjects);

    let mut header_row: Vec<String> = STATIC_HEADERS.iter().map(|h| h.to_string()).collect();
    for (_, name, _) in &subjects {
        header_row.push(format!("{name} (Marks)"));
        header_row.push(format!("{name} (Max)"));
    }
    header_row.push("Remarks".to_string());

    let data_rows = students
        .iter()
        .map(|s| {
            let mut row = vec![
                s.roll_no.clone(),
                s.name.clone(),
                s.father_name.clone(),
                s.class_name.clone(),
            ];
            for (id, _, max) in &subjects {
                row.push(s.marks.get(*id).cloned().unwrap_or_default());
                row.push(if max.trim().is_empty() {
                    default_max_marks()
                } else {
                    max.to_string()
                });
            }
            row.push(s.remarks.clone());
            row
        })
        .collect();

    SheetLayout {
        header_row,
        data_rows,
    }
}

fn collect_layout_subjects<'a>(nodes: &'a [EntryNode], out: &mut Vec<(&'a str, &'a str, &'a str)>) {
    for node in nodes {
        match node {
            EntryNode::Category { children, .. } => collect_layout_subjects(children, out),
            EntryNode::Subject {
                id,
                name,
                max_marks,
                ..
            } => out.push((id.as_str(), name.as_str(), max_marks.as_str())),
        }
    }
}
