use serde::{Serialize, Serializer};

pub const DEFAULT_CATEGORY: &str = "General";

/// Literal `maxMarks` value marking a letter-graded subject.
pub const GRADE_SENTINEL: &str = "Grade";

/// Category colors, assigned in first-seen order and reused after six.
pub const CATEGORY_COLORS: [&str; 6] = [
    "#3b82f6", "#f97316", "#a855f7", "#10b981", "#ef4444", "#eab308",
];

/// `Int(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Round half up to an integer.
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Lenient numeric coercion: anything that is not a finite number becomes 0.
pub fn coerce_number(v: &serde_json::Value) -> f64 {
    let n = match v {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => parse_number(s).unwrap_or(0.0),
        serde_json::Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Marks {
    Points(f64),
    /// Letter grade or other non-numeric text, kept for display.
    Label(String),
}

impl Marks {
    pub fn value(&self) -> f64 {
        match self {
            Marks::Points(v) => *v,
            Marks::Label(s) => parse_number(s).unwrap_or(0.0),
        }
    }

    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        match v {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => match parse_number(s) {
                Some(n) => Some(Marks::Points(n)),
                None if s.trim().is_empty() => None,
                None => Some(Marks::Label(s.trim().to_string())),
            },
            other => Some(Marks::Points(coerce_number(other))),
        }
    }
}

impl Serialize for Marks {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Marks::Points(v) => serializer.serialize_f64(*v),
            Marks::Label(s) => serializer.serialize_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxMarks {
    Points(f64),
    Grade,
}

impl MaxMarks {
    pub fn is_grade(&self) -> bool {
        matches!(self, MaxMarks::Grade)
    }

    pub fn from_json(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::String(s) if s == GRADE_SENTINEL => MaxMarks::Grade,
            other => MaxMarks::Points(coerce_number(other)),
        }
    }
}

impl Serialize for MaxMarks {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MaxMarks::Points(v) => serializer.serialize_f64(*v),
            MaxMarks::Grade => serializer.serialize_str(GRADE_SENTINEL),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub name: String,
    pub category: String,
    pub marks: Marks,
    pub max_marks: MaxMarks,
    /// Percentage 0-100.
    pub score: f64,
}

impl SubjectRecord {
    pub fn new(name: &str, category: &str, marks: f64, max_marks: f64, score: f64) -> Self {
        Self {
            name: name.to_string(),
            category: normalize_category(category),
            marks: Marks::Points(marks),
            max_marks: MaxMarks::Points(max_marks),
            score,
        }
    }

    pub fn graded(name: &str, category: &str, label: &str, score: f64) -> Self {
        Self {
            name: name.to_string(),
            category: normalize_category(category),
            marks: Marks::Label(label.to_string()),
            max_marks: MaxMarks::Grade,
            score,
        }
    }

    pub fn is_graded(&self) -> bool {
        self.max_marks.is_grade()
    }

    /// Lenient parse of one subject object. Missing `score` is derived from
    /// numeric marks, missing `marks` from the score, when `maxMarks` is numeric.
    pub fn from_json(v: &serde_json::Value) -> Self {
        let name = v
            .get("name")
            .map(|n| match n {
                serde_json::Value::String(s) => s.trim().to_string(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        let category =
            normalize_category(v.get("category").and_then(|c| c.as_str()).unwrap_or(""));
        let max_marks = v
            .get("maxMarks")
            .map(MaxMarks::from_json)
            .unwrap_or(MaxMarks::Points(0.0));
        let marks = v.get("marks").and_then(Marks::from_json);
        let score = v.get("score").filter(|s| !s.is_null()).map(coerce_number);

        let (marks, score) = match (marks, score, max_marks) {
            (Some(m), Some(s), _) => (m, s),
            (Some(m), None, MaxMarks::Points(max)) => {
                let s = if max > 0.0 {
                    round_off_1_decimal(m.value() / max * 100.0)
                } else {
                    0.0
                };
                (m, s)
            }
            (Some(m), None, MaxMarks::Grade) => (m, 0.0),
            (None, Some(s), MaxMarks::Points(max)) => (Marks::Points(s * max / 100.0), s),
            (None, Some(s), MaxMarks::Grade) => (Marks::Label(String::new()), s),
            (None, None, _) => (Marks::Points(0.0), 0.0),
        };

        Self {
            name,
            category,
            marks,
            max_marks,
            score,
        }
    }
}

pub fn normalize_category(raw: &str) -> String {
    let t = raw.trim();
    if t.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        t.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAggregate {
    pub name: String,
    pub color: &'static str,
    /// Sum of member percentages.
    pub total_score: f64,
    pub total_marks: f64,
    pub total_max_marks: f64,
    pub count: usize,
}

impl CategoryAggregate {
    /// Mean of member percentages, rounded to an integer. Not derived from marks.
    pub fn average_percent(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        round_half_up(self.total_score / self.count as f64)
    }
}

/// Category rollups in first-seen order.
pub fn aggregate_by_category(subjects: &[SubjectRecord]) -> Vec<CategoryAggregate> {
    let mut out: Vec<CategoryAggregate> = Vec::new();
    for s in subjects {
        let category = normalize_category(&s.category);
        let idx = match out.iter().position(|c| c.name == category) {
            Some(i) => i,
            None => {
                out.push(CategoryAggregate {
                    name: category,
                    color: CATEGORY_COLORS[out.len() % CATEGORY_COLORS.len()],
                    total_score: 0.0,
                    total_marks: 0.0,
                    total_max_marks: 0.0,
                    count: 0,
                });
                out.len() - 1
            }
        };

        let MaxMarks::Points(max) = s.max_marks else {
            continue;
        };
        let entry = &mut out[idx];
        entry.total_score += finite_or_zero(s.score);
        entry.total_marks += finite_or_zero(s.marks.value());
        entry.total_max_marks += finite_or_zero(max);
        entry.count += 1;
    }
    out
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// `(Σ marks / Σ maxMarks) * 100` over the rollups, 1 decimal; 0 when nothing is eligible.
pub fn total_from_categories(categories: &[CategoryAggregate]) -> f64 {
    let marks: f64 = categories.iter().map(|c| c.total_marks).sum();
    let max: f64 = categories.iter().map(|c| c.total_max_marks).sum();
    if max == 0.0 {
        return 0.0;
    }
    round_off_1_decimal(marks / max * 100.0)
}

pub fn total_percentage(subjects: &[SubjectRecord]) -> f64 {
    total_from_categories(&aggregate_by_category(subjects))
}

pub fn letter_grade(percent: f64) -> &'static str {
    if percent >= 75.0 {
        "A"
    } else if percent >= 60.0 {
        "B"
    } else if percent >= 45.0 {
        "C"
    } else {
        "D"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub categories: Vec<CategoryAggregate>,
    pub category_averages: Vec<f64>,
    pub total_percentage: f64,
    pub grade: &'static str,
}

pub fn breakdown(subjects: &[SubjectRecord]) -> ScoreBreakdown {
    let categories = aggregate_by_category(subjects);
    let category_averages = categories.iter().map(|c| c.average_percent()).collect();
    let total = total_from_categories(&categories);
    ScoreBreakdown {
        categories,
        category_averages,
        total_percentage: total,
        grade: letter_grade(total),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StudentScores<'a> {
    pub name: &'a str,
    pub total: f64,
    pub subjects: &'a [SubjectRecord],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeDistribution {
    #[serde(rename = "A")]
    pub a: usize,
    #[serde(rename = "B")]
    pub b: usize,
    #[serde(rename = "C")]
    pub c: usize,
    #[serde(rename = "D")]
    pub d: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPerformance {
    pub name: String,
    pub average: f64,
    pub student_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub total_students: usize,
    pub top_performer: String,
    pub avg_score: f64,
    pub grade_distribution: GradeDistribution,
    pub subject_performance: Vec<SubjectPerformance>,
}

pub fn summarize_class<'a, I>(students: I) -> ClassSummary
where
    I: IntoIterator<Item = StudentScores<'a>>,
{
    let mut total_students = 0usize;
    let mut sum_totals = 0.0_f64;
    let mut top: Option<(f64, &str)> = None;
    let mut dist = GradeDistribution {
        a: 0,
        b: 0,
        c: 0,
        d: 0,
    };
    // name, sum of scores, count
    let mut per_subject: Vec<(String, f64, usize)> = Vec::new();

    for s in students {
        total_students += 1;
        sum_totals += s.total;
        // Ties go to the later student.
        if top.map(|(best, _)| !(best > s.total)).unwrap_or(true) {
            top = Some((s.total, s.name));
        }
        match letter_grade(s.total) {
            "A" => dist.a += 1,
            "B" => dist.b += 1,
            "C" => dist.c += 1,
            _ => dist.d += 1,
        }
        for sub in s.subjects.iter().filter(|sub| !sub.is_graded()) {
            match per_subject.iter_mut().find(|(n, _, _)| *n == sub.name) {
                Some(entry) => {
                    entry.1 += finite_or_zero(sub.score);
                    entry.2 += 1;
                }
                None => per_subject.push((sub.name.clone(), finite_or_zero(sub.score), 1)),
            }
        }
    }

    let avg_score = if total_students > 0 {
        round_off_1_decimal(sum_totals / total_students as f64)
    } else {
        0.0
    };

    ClassSummary {
        total_students,
        top_performer: top.map(|(_, n)| n.to_string()).unwrap_or_default(),
        avg_score,
        grade_distribution: dist,
        subject_performance: per_subject
            .into_iter()
            .map(|(name, sum, count)| SubjectPerformance {
                name,
                average: round_off_1_decimal(sum / count as f64),
                student_count: count,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_off_matches_vb6() {
        assert_eq!(round_off_1_decimal(0.0), 0.0);
        assert_eq!(round_off_1_decimal(3.54), 3.5);
        assert_eq!(round_off_1_decimal(3.55), 3.6);
        assert_eq!(round_off_1_decimal(58.333333), 58.3);
        assert_eq!(round_half_up(74.5), 75.0);
        assert_eq!(round_half_up(74.49), 74.0);
    }

    #[test]
    fn graded_subjects_stay_out_of_the_total() {
        let subjects = vec![
            SubjectRecord::graded("Art", "Co-Scholastic", "A", 90.0),
            SubjectRecord::new("Maths", "Scholastic", 40.0, 50.0, 80.0),
            SubjectRecord::new("Science", "Scholastic", 30.0, 50.0, 60.0),
        ];
        assert_eq!(total_percentage(&subjects), 70.0);

        let cats = aggregate_by_category(&subjects);
        assert_eq!(cats.len(), 2);
        assert_eq!(cats[0].name, "Co-Scholastic");
        assert_eq!(cats[0].count, 0);
        assert_eq!(cats[0].total_max_marks, 0.0);
        assert_eq!(cats[0].average_percent(), 0.0);
        assert_eq!(cats[1].count, 2);
    }

    #[test]
    fn category_average_and_weighted_total_differ() {
        let subjects = vec![
            SubjectRecord::new("Math", "Scholastic", 10.0, 10.0, 100.0),
            SubjectRecord::new("Science", "Scholastic", 25.0, 50.0, 50.0),
        ];
        let b = breakdown(&subjects);
        assert_eq!(b.categories.len(), 1);
        assert_eq!(b.category_averages, vec![75.0]);
        assert_eq!(b.total_percentage, 58.3);
        assert_ne!(b.category_averages[0], b.total_percentage);
        assert_eq!(b.grade, "C");
    }

    #[test]
    fn aggregation_is_idempotent() {
        let subjects = vec![
            SubjectRecord::new("Math", "", 10.0, 10.0, 100.0),
            SubjectRecord::new("Hindi", "Languages", 20.0, 40.0, 50.0),
        ];
        let first = aggregate_by_category(&subjects);
        let second = aggregate_by_category(&subjects);
        assert_eq!(first, second);
        assert_eq!(first[0].name, DEFAULT_CATEGORY);
    }

    #[test]
    fn category_colors_follow_first_seen_order() {
        let subjects = vec![
            SubjectRecord::new("b1", "B", 1.0, 2.0, 50.0),
            SubjectRecord::new("a1", "A", 1.0, 2.0, 50.0),
            SubjectRecord::new("b2", "B", 1.0, 2.0, 50.0),
            SubjectRecord::new("a2", "A", 1.0, 2.0, 50.0),
        ];
        for _ in 0..3 {
            let cats = aggregate_by_category(&subjects);
            assert_eq!(cats[0].name, "B");
            assert_eq!(cats[0].color, CATEGORY_COLORS[0]);
            assert_eq!(cats[1].name, "A");
            assert_eq!(cats[1].color, CATEGORY_COLORS[1]);
            assert_ne!(cats[0].color, cats[1].color);
        }
    }

    #[test]
    fn palette_wraps_after_six_categories() {
        let subjects: Vec<SubjectRecord> = (0..8)
            .map(|i| SubjectRecord::new("s", &format!("C{i}"), 1.0, 1.0, 100.0))
            .collect();
        let cats = aggregate_by_category(&subjects);
        assert_eq!(cats[6].color, CATEGORY_COLORS[0]);
        assert_eq!(cats[7].color, CATEGORY_COLORS[1]);
    }

    #[test]
    fn no_eligible_subjects_gives_zero_total() {
        assert_eq!(total_percentage(&[]), 0.0);
        let only_graded = vec![SubjectRecord::graded("Music", "Arts", "B", 0.0)];
        assert_eq!(total_percentage(&only_graded), 0.0);
    }

    #[test]
    fn malformed_values_coerce_to_zero() {
        assert_eq!(coerce_number(&json!("abc")), 0.0);
        assert_eq!(coerce_number(&json!(" 12.5 ")), 12.5);
        assert_eq!(coerce_number(&json!(null)), 0.0);
        assert_eq!(coerce_number(&json!("")), 0.0);
        assert_eq!(coerce_number(&json!(true)), 1.0);

        let s = SubjectRecord::from_json(&json!({
            "name": "Maths", "score": "n/a", "marks": "absent", "maxMarks": "fifty"
        }));
        assert_eq!(s.max_marks, MaxMarks::Points(0.0));
        assert_eq!(s.marks, Marks::Label("absent".into()));
        assert_eq!(s.score, 0.0);
        assert_eq!(total_percentage(&[s]), 0.0);
    }

    #[test]
    fn subject_from_json_derives_missing_fields() {
        let from_score = SubjectRecord::from_json(&json!({
            "name": "English", "score": 80, "maxMarks": 50
        }));
        assert_eq!(from_score.marks, Marks::Points(40.0));
        assert_eq!(from_score.category, DEFAULT_CATEGORY);

        let from_marks = SubjectRecord::from_json(&json!({
            "name": "Hindi", "marks": "18", "maxMarks": 30, "category": " Languages "
        }));
        assert_eq!(from_marks.score, 60.0);
        assert_eq!(from_marks.category, "Languages");

        let graded = SubjectRecord::from_json(&json!({
            "name": "Art", "score": 90, "marks": "A", "maxMarks": "Grade"
        }));
        assert!(graded.is_graded());
        assert_eq!(graded.marks, Marks::Label("A".into()));
    }

    #[test]
    fn subject_serializes_grade_sentinel() {
        let s = SubjectRecord::graded("Art", "Co-Scholastic", "A", 90.0);
        let v = serde_json::to_value(&s).expect("json");
        assert_eq!(v["maxMarks"], json!("Grade"));
        assert_eq!(v["marks"], json!("A"));
        assert_eq!(v["category"], json!("Co-Scholastic"));
    }

    #[test]
    fn class_summary_counts_grades_and_ties_go_to_later_student() {
        let a = vec![SubjectRecord::new("Maths", "", 40.0, 50.0, 80.0)];
        let b = vec![
            SubjectRecord::new("Maths", "", 30.0, 50.0, 60.0),
            SubjectRecord::graded("Art", "", "A", 95.0),
        ];
        let c = vec![SubjectRecord::new("Maths", "", 40.0, 50.0, 80.0)];
        let summary = summarize_class(vec![
            StudentScores { name: "Asha", total: 80.0, subjects: &a },
            StudentScores { name: "Ravi", total: 60.0, subjects: &b },
            StudentScores { name: "Meera", total: 80.0, subjects: &c },
        ]);
        assert_eq!(summary.total_students, 3);
        assert_eq!(summary.top_performer, "Meera");
        assert_eq!(summary.avg_score, 73.3);
        assert_eq!(summary.grade_distribution.a, 2);
        assert_eq!(summary.grade_distribution.b, 1);
        assert_eq!(summary.subject_performance.len(), 1);
        assert_eq!(summary.subject_performance[0].name, "Maths");
        assert_eq!(summary.subject_performance[0].average, 73.3);
        assert_eq!(summary.subject_performance[0].student_count, 3);
    }

    #[test]
    fn letter_grade_thresholds() {
        assert_eq!(letter_grade(75.0), "A");
        assert_eq!(letter_grade(74.9), "B");
        assert_eq!(letter_grade(60.0), "B");
        assert_eq!(letter_grade(45.0), "C");
        assert_eq!(letter_grade(44.9), "D");
    }
}
