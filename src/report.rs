use crate::scores::{self, Marks, MaxMarks};
use crate::student::{GrowthStep, StudentReport};
use anyhow::Context;
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;
use serde_json::json;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const REPORTS_DIR: &str = "reports";
pub const BUNDLE_FORMAT: &str = "reportd-reports-v1";

const FOOTER_TEXT: &str = "Generated by reportd";

/// Chart color for subjects whose category is somehow unknown.
const FALLBACK_COLOR: &str = "#14b8a6";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRow {
    pub label: String,
    pub average: f64,
    pub total_marks: f64,
    pub total_max_marks: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRow {
    pub name: String,
    pub category: String,
    pub color: &'static str,
    pub graded: bool,
    pub marks: String,
    pub max_marks: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBar {
    pub name: String,
    pub score: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Strength {
    pub title: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportModel {
    pub exam_title: String,
    pub name: String,
    pub roll_no: String,
    pub father_name: Option<String>,
    pub class_name: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub categories: Vec<CategoryRow>,
    pub subjects: Vec<SubjectRow>,
    /// Numeric subjects only.
    pub chart: Vec<ChartBar>,
    pub total_marks: f64,
    pub total_max_marks: f64,
    pub total_percentage: f64,
    pub grade: &'static str,
    pub motivation: &'static str,
    pub remarks: String,
    pub strengths: Vec<Strength>,
    pub growth_plan: Vec<GrowthStep>,
}

fn is_father_key(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "fathername" | "father name" | "father's name"
    )
}

/// Plain number formatting for marks: integers without a fraction, else 2 decimals max.
pub fn format_number(x: f64) -> String {
    if !x.is_finite() {
        return "0".to_string();
    }
    let r = (x * 100.0).round() / 100.0;
    if r.fract() == 0.0 {
        format!("{r:.0}")
    } else {
        r.to_string()
    }
}

fn motivation(total: f64) -> &'static str {
    if total >= 60.0 {
        "Absolute Champion!"
    } else if total >= 40.0 {
        "Rising Star!"
    } else {
        "Keep Smiling & Growing!"
    }
}

pub fn fallback_remark(name: &str) -> String {
    format!(
        "{name} has shown consistent effort tailored to their grade level. With continued focus on their identified growth areas, they can achieve even greater potential in future assessments."
    )
}

fn split_strength(s: &str) -> Strength {
    match s.split_once(':') {
        Some((title, desc)) if !title.trim().is_empty() && !desc.trim().is_empty() => Strength {
            title: Some(title.trim().to_string()),
            description: desc.trim().to_string(),
        },
        _ => Strength {
            title: None,
            description: s.trim().to_string(),
        },
    }
}

pub fn report_model(student: &StudentReport, exam_title: &str) -> ReportModel {
    let b = scores::breakdown(&student.subjects);
    let color_of = |cat: &str| {
        b.categories
            .iter()
            .find(|c| c.name == scores::normalize_category(cat))
            .map(|c| c.color)
            .unwrap_or(FALLBACK_COLOR)
    };

    let categories = b
        .categories
        .iter()
        .zip(&b.category_averages)
        .map(|(c, avg)| CategoryRow {
            label: c.name.clone(),
            average: *avg,
            total_marks: c.total_marks,
            total_max_marks: c.total_max_marks,
            color: c.color,
        })
        .collect();

    let subjects = student
        .subjects
        .iter()
        .map(|s| SubjectRow {
            name: s.name.clone(),
            category: scores::normalize_category(&s.category),
            color: color_of(&s.category),
            graded: s.is_graded(),
            marks: match &s.marks {
                Marks::Points(v) => format_number(*v),
                Marks::Label(l) if l.is_empty() => "-".to_string(),
                Marks::Label(l) => l.clone(),
            },
            max_marks: match s.max_marks {
                MaxMarks::Points(v) => format_number(v),
                MaxMarks::Grade => scores::GRADE_SENTINEL.to_string(),
            },
            score: s.score,
        })
        .collect();

    let chart = student
        .subjects
        .iter()
        .filter(|s| !s.is_graded())
        .map(|s| ChartBar {
            name: s.name.clone(),
            score: s.score,
            color: color_of(&s.category),
        })
        .collect();

    let remarks = student
        .remarks
        .clone()
        .unwrap_or_else(|| fallback_remark(&student.name));

    ReportModel {
        exam_title: exam_title.to_string(),
        name: student.name.clone(),
        roll_no: student.roll_no.clone(),
        father_name: student.father_name.clone(),
        class_name: student.class_name.clone(),
        attributes: student
            .custom_attributes
            .iter()
            .filter(|(k, _)| !is_father_key(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        categories,
        subjects,
        chart,
        total_marks: b.categories.iter().map(|c| c.total_marks).sum(),
        total_max_marks: b.categories.iter().map(|c| c.total_max_marks).sum(),
        total_percentage: b.total_percentage,
        grade: b.grade,
        motivation: motivation(b.total_percentage),
        remarks,
        strengths: student.strengths.iter().map(|s| split_strength(s)).collect(),
        growth_plan: student.growth_plan.clone(),
    }
}

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; color: #1e293b; margin: 0; padding: 24px 40px; -webkit-print-color-adjust: exact; print-color-adjust: exact; }
h1, h2, h3 { margin: 0 0 8px 0; }
.exam { text-align: center; text-transform: uppercase; letter-spacing: 0.05em; }
.card { border: 2px solid #e2e8f0; border-radius: 16px; padding: 24px; margin-top: 16px; break-inside: avoid; }
.identity { display: flex; justify-content: space-between; gap: 24px; }
.badge { display: inline-block; padding: 4px 10px; margin: 4px 4px 0 0; border-radius: 8px; background: #eef2ff; font-size: 13px; }
.total { font-size: 40px; font-weight: 800; }
.bar { height: 14px; border-radius: 4px; }
.bar-row { display: grid; grid-template-columns: 160px 1fr 56px; gap: 8px; align-items: center; margin: 4px 0; }
.dot { display: inline-block; width: 8px; height: 8px; border-radius: 50%; margin-right: 6px; }
table { width: 100%; border-collapse: collapse; }
th, td { padding: 8px; border-bottom: 1px solid #e2e8f0; text-align: left; }
footer { margin-top: 24px; text-align: center; color: #94a3b8; font-size: 12px; }
"#;

fn bar_rows(out: &mut String, items: impl Iterator<Item = (String, f64, &'static str)>) {
    for (label, percent, color) in items {
        let width = percent.clamp(0.0, 100.0);
        out.push_str(&format!(
            "<div class=\"bar-row\"><span>{}</span><div class=\"bar\" style=\"width: {}%; background: {}\"></div><span>{}%</span></div>\n",
            encode_text(&label),
            format_number(width),
            encode_double_quoted_attribute(color),
            format_number(percent)
        ));
    }
}

/// Self-contained HTML5 document; all styling is inline and no assets are fetched.
pub fn render_html(model: &ReportModel) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n");
    out.push_str(&format!(
        "<title>{} - Performance Report</title>\n<style>{}</style>\n</head>\n<body>\n",
        encode_text(&model.name),
        STYLE
    ));
    out.push_str(&format!(
        "<h2 class=\"exam\">{}</h2>\n",
        encode_text(&model.exam_title)
    ));

    out.push_str("<div class=\"card identity\">\n<div>\n");
    out.push_str(&format!("<h1>{}</h1>\n", encode_text(&model.name)));
    if let Some(father) = &model.father_name {
        out.push_str(&format!(
            "<div>Father's Name: <strong>{}</strong></div>\n",
            encode_text(father)
        ));
    }
    out.push_str(&format!(
        "<div>Roll No: <strong>{}</strong> &middot; Class: <strong>{}</strong></div>\n",
        encode_text(&model.roll_no),
        encode_text(model.class_name.as_deref().unwrap_or("N/A"))
    ));
    for (k, v) in &model.attributes {
        out.push_str(&format!(
            "<span class=\"badge\"><strong>{}</strong> {}</span>\n",
            encode_text(k),
            encode_text(v)
        ));
    }
    out.push_str("</div>\n<div>\n");
    out.push_str(&format!(
        "<div class=\"total\">{}%</div>\n<div>Grade {} &middot; {}</div>\n",
        format_number(model.total_percentage),
        model.grade,
        encode_text(model.motivation)
    ));
    out.push_str("</div>\n</div>\n");

    out.push_str("<div class=\"card\">\n<h3>Performance Summary</h3>\n");
    out.push_str(&format!("<p>{}</p>\n</div>\n", encode_text(&model.remarks)));

    out.push_str("<div class=\"card\">\n<h3>Category Averages</h3>\n");
    bar_rows(
        &mut out,
        model
            .categories
            .iter()
            .filter(|c| c.total_max_marks > 0.0)
            .map(|c| (c.label.clone(), c.average, c.color)),
    );
    out.push_str("<h3>Subject Scores</h3>\n");
    bar_rows(
        &mut out,
        model.chart.iter().map(|c| (c.name.clone(), c.score, c.color)),
    );
    out.push_str("</div>\n");

    out.push_str("<div class=\"card\">\n<h3>Complete Marksheet</h3>\n<table>\n");
    out.push_str("<tr><th>Subject</th><th>Category</th><th>Max Marks</th><th>Obtained</th><th>Score</th></tr>\n");
    for s in &model.subjects {
        let score = if s.graded {
            "-".to_string()
        } else {
            format!("{}%", format_number(s.score))
        };
        out.push_str(&format!(
            "<tr><td><span class=\"dot\" style=\"background: {}\"></span>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            encode_double_quoted_attribute(s.color),
            encode_text(&s.name),
            encode_text(&s.category),
            encode_text(&s.max_marks),
            encode_text(&s.marks),
            score
        ));
    }
    out.push_str(&format!(
        "<tr><th colspan=\"2\">Total</th><th>{}</th><th>{}</th><th>{}%</th></tr>\n</table>\n</div>\n",
        format_number(model.total_max_marks),
        format_number(model.total_marks),
        format_number(model.total_percentage)
    ));

    if !model.strengths.is_empty() || !model.growth_plan.is_empty() {
        out.push_str("<div class=\"card\">\n");
        if !model.strengths.is_empty() {
            out.push_str("<h3>Key Strengths</h3>\n<ul>\n");
            for s in &model.strengths {
                match &s.title {
                    Some(t) => out.push_str(&format!(
                        "<li><strong>{}:</strong> {}</li>\n",
                        encode_text(t),
                        encode_text(&s.description)
                    )),
                    None => out.push_str(&format!("<li>{}</li>\n", encode_text(&s.description))),
                }
            }
            out.push_str("</ul>\n");
        }
        if !model.growth_plan.is_empty() {
            out.push_str("<h3>Areas for Growth</h3>\n<ul>\n");
            for g in &model.growth_plan {
                out.push_str(&format!(
                    "<li><strong>{}:</strong> {}</li>\n",
                    encode_text(&g.priority),
                    encode_text(&g.description)
                ));
            }
            out.push_str("</ul>\n");
        }
        out.push_str("</div>\n");
    }

    out.push_str(&format!(
        "<footer>{}</footer>\n</body>\n</html>\n",
        FOOTER_TEXT
    ));
    out
}

fn file_stem(part: &str) -> String {
    let cleaned: String = part
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "student".to_string()
    } else {
        cleaned
    }
}

/// Entry name `reports/<rollNo>_<name>.html`, suffixed when already taken.
fn report_entry_name(student: &StudentReport, taken: &[String]) -> String {
    let base = format!("{}_{}", file_stem(&student.roll_no), file_stem(&student.name));
    let mut candidate = format!("{REPORTS_DIR}/{base}.html");
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{REPORTS_DIR}/{base}_{n}.html");
        n += 1;
    }
    candidate
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub files: Vec<String>,
}

pub fn export_reports_zip(
    students: &[StudentReport],
    exam_title: &str,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files: Vec<String> = Vec::with_capacity(students.len());
    let mut entries = Vec::with_capacity(students.len());
    for s in students {
        let name = report_entry_name(s, &files);
        let html = render_html(&report_model(s, exam_title));
        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start entry {name}"))?;
        zip.write_all(html.as_bytes())
            .with_context(|| format!("failed to write entry {name}"))?;
        entries.push(json!({ "rollNo": s.roll_no, "name": s.name, "file": name }));
        files.push(name);
    }

    let manifest = json!({
        "format": BUNDLE_FORMAT,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "examTitle": exam_title,
        "reports": entries,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.finish().context("failed to finalize zip bundle")?;
    tracing::info!(
        reports = files.len(),
        path = %out_path.to_string_lossy(),
        "report bundle written"
    );

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT.to_string(),
        entry_count: files.len() + 1,
        files,
    })
}
