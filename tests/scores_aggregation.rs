#[path = "../src/scores.rs"]
mod scores;

use scores::{SubjectRecord, CATEGORY_COLORS, DEFAULT_CATEGORY};
use serde_json::json;

fn report_card() -> Vec<SubjectRecord> {
    [
        json!({ "name": "English", "category": "Languages", "marks": 72, "maxMarks": 100 }),
        json!({ "name": "Hindi", "category": "Languages", "marks": 40, "maxMarks": 50 }),
        json!({ "name": "Maths", "category": "Scholastic", "marks": 95, "maxMarks": 100 }),
        json!({ "name": "Drawing", "category": "Co-Scholastic", "marks": "A+", "maxMarks": "Grade" }),
        json!({ "name": "GK", "marks": "8", "maxMarks": "10" }),
    ]
    .iter()
    .map(SubjectRecord::from_json)
    .collect()
}

#[test]
fn weighted_total_uses_marks_not_percentages() {
    let subjects = report_card();
    // (72 + 40 + 95 + 8) / (100 + 50 + 100 + 10)
    assert_eq!(scores::total_percentage(&subjects), 82.7);
    assert_eq!(scores::letter_grade(82.7), "A");
}

#[test]
fn category_rollups_for_a_mixed_card() {
    let b = scores::breakdown(&report_card());
    let names: Vec<&str> = b.categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Languages", "Scholastic", "Co-Scholastic", DEFAULT_CATEGORY]);
    let colors: Vec<&str> = b.categories.iter().map(|c| c.color).collect();
    assert_eq!(colors, CATEGORY_COLORS[..4].to_vec());
    // Languages: mean of 72% and 80%.
    assert_eq!(b.category_averages, vec![76.0, 95.0, 0.0, 80.0]);
    assert_eq!(b.categories[2].count, 0);
    assert_eq!(b.categories[0].total_max_marks, 150.0);
}

#[test]
fn class_summary_over_recomputed_totals() {
    let card = report_card();
    let weak = vec![
        SubjectRecord::new("English", "Languages", 30.0, 100.0, 30.0),
        SubjectRecord::new("Science", "Scholastic", 31.0, 50.0, 62.0),
    ];
    let summary = scores::summarize_class(vec![
        scores::StudentScores { name: "Asha", total: scores::total_percentage(&card), subjects: &card },
        scores::StudentScores { name: "Ravi", total: scores::total_percentage(&weak), subjects: &weak },
    ]);
    assert_eq!(summary.top_performer, "Asha");
    // (82.7 + 40.7) / 2
    assert_eq!(summary.avg_score, 61.7);
    assert_eq!(summary.grade_distribution.a, 1);
    assert_eq!(summary.grade_distribution.d, 1);
    let english = &summary.subject_performance[0];
    assert_eq!(english.name, "English");
    assert_eq!(english.average, 51.0);
    assert_eq!(english.student_count, 2);
    assert!(summary.subject_performance.iter().all(|s| s.name != "Drawing"));

    let v = serde_json::to_value(&summary).expect("json");
    assert_eq!(v["gradeDistribution"], json!({ "A": 1, "B": 0, "C": 0, "D": 1 }));
}
