use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_reportd");
    let mut child = Command::new(exe)
        .env_remove("REPORTD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn reportd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

const COMPLETION: &str = r#"```json
{
  "students": [
    {
      "rollNo": "1", "name": "Asha", "fatherName": "R. Verma", "className": "10",
      "totalScore": 99,
      "subjects": [
        { "name": "Maths", "category": "Scholastic", "marks": 40, "maxMarks": 50, "score": 80 },
        { "name": "Science", "category": "Scholastic", "marks": 30, "maxMarks": 50, "score": 60 },
        { "name": "Art", "category": "Co-Scholastic", "marks": "A", "maxMarks": "Grade", "score": 95 }
      ],
      "remarks": "Steady work.",
      "strengths": ["Reasoning: clear steps"],
      "growthPlan": [{ "priority": "Science", "description": "Revise diagrams." }]
    },
    {
      "rollNo": 2, "name": "Ravi",
      "subjects": [
        { "name": "Maths", "category": "Scholastic", "marks": 20, "maxMarks": 50, "score": 40 }
      ]
    }
  ]
}
```"#;

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("reportd-router-smoke");
    let zip_out = workspace.join("reports.zip");
    let csv_out = workspace.join("verified.csv");
    let layout_out = workspace.join("layout.csv");
    let xlsx_out = workspace.join("Final_Student_Report.xlsx");
    let layout_xlsx_out = workspace.join("student_data.xlsx");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["workspacePath"].is_null());

    let before = request(&mut stdin, &mut reader, "2", "workspace.save", json!({}));
    assert_eq!(error_code(&before), "no_workspace");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let settings = request_ok(&mut stdin, &mut reader, "4", "settings.get", json!({}));
    assert_eq!(settings["examTitle"], json!("Talent Hunt Examination 2026"));
    let settings = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "settings.update",
        json!({ "examTitle": "Mid Term 2026" }),
    );
    assert_eq!(settings["examTitle"], json!("Mid Term 2026"));
    assert_eq!(settings["model"], json!("llama-3.3-70b-versatile"));

    let sheet = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "sheet.reconstruct",
        json!({ "grid": [
            ["", "Term 1", ""],
            ["Roll No", "Maths", "Science"],
            [1, 45, 30]
        ]}),
    );
    assert_eq!(sheet["headerRowIndex"], json!(1));
    assert_eq!(sheet["finalHeaders"], json!(["Roll No", "Term 1 - Maths", "Term 1 - Science"]));
    assert_eq!(sheet["rows"][0]["Term 1 - Maths"], json!(45));
    assert_eq!(sheet["rows"][0]["Roll No"].to_string(), "1");

    let empty = request(&mut stdin, &mut reader, "7", "sheet.reconstruct", json!({ "grid": [] }));
    assert_eq!(error_code(&empty), "empty_sheet");

    let ingested = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "analysis.ingest",
        json!({ "content": COMPLETION }),
    );
    assert_eq!(ingested["students"][0]["totalScore"], json!(70.0));
    assert_eq!(ingested["students"][0]["reportedTotal"], json!(99.0));
    assert_eq!(ingested["summary"]["topPerformer"], json!("Asha"));
    assert_eq!(ingested["summary"]["gradeDistribution"]["D"], json!(1));

    let bad = request(
        &mut stdin,
        &mut reader,
        "9",
        "analysis.ingest",
        json!({ "content": "I could not read the sheet." }),
    );
    assert_eq!(error_code(&bad), "analysis_no_json");

    let agg = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "scores.aggregate",
        json!({ "subjects": [
            { "name": "Math", "category": "Scholastic", "marks": 10, "maxMarks": 10, "score": 100 },
            { "name": "Science", "category": "Scholastic", "marks": 25, "maxMarks": 50, "score": 50 }
        ]}),
    );
    assert_eq!(agg["categoryAverages"], json!([75.0]));
    assert_eq!(agg["totalPercentage"], json!(58.3));
    assert_eq!(agg["grade"], json!("C"));

    let _ = request_ok(&mut stdin, &mut reader, "11", "students.list", json!({}));
    let got = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "students.get",
        json!({ "rollNo": 2 }),
    );
    assert_eq!(got["index"], json!(1));
    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "students.setSubjectScore",
        json!({ "index": 1, "subjectIndex": 0, "score": "90" }),
    );
    assert_eq!(updated["student"]["totalScore"], json!(90.0));
    assert_eq!(updated["student"]["grade"], json!("A"));
    assert_eq!(updated["summary"]["topPerformer"], json!("Ravi"));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "students.update",
        json!({ "index": 1, "patch": { "fatherName": "S. Kumar" } }),
    );
    let missing = request(
        &mut stdin,
        &mut reader,
        "15",
        "students.update",
        json!({ "index": 9, "patch": {} }),
    );
    assert_eq!(error_code(&missing), "not_found");

    let tree = json!([
        { "type": "category", "name": "Scholastic", "children": [
            { "type": "subject", "id": "m", "name": "Maths", "marksObtained": "45", "maxMarks": "50" }
        ]},
        { "type": "subject", "id": "g", "name": "GK", "marksObtained": "8", "maxMarks": "10" }
    ]);
    let profile = json!({ "name": "Kabir", "rollNo": "3", "customFields": [] });
    let input = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "manual.analysisInput",
        json!({ "profile": profile, "tree": tree }),
    );
    assert_eq!(input["studentProfile"]["rollNo"], json!("3"));
    let flat = request_ok(&mut stdin, &mut reader, "17", "manual.flatten", json!({ "tree": tree }));
    assert_eq!(flat["subjects"][1]["category"], json!("General"));
    let generated = request_ok(
        &mut stdin,
        &mut reader,
        "18",
        "manual.generate",
        json!({ "profile": profile, "tree": tree }),
    );
    assert_eq!(generated["index"], json!(2));
    assert_eq!(generated["summary"]["totalStudents"], json!(3));
    let layout = request_ok(
        &mut stdin,
        &mut reader,
        "19",
        "manual.sheetLayout",
        json!({ "template": tree, "students": [{ "rollNo": "3", "name": "Kabir", "marks": { "m": "45" } }] }),
    );
    assert_eq!(layout["headerRow"][4], json!("Maths (Marks)"));

    let model = request_ok(&mut stdin, &mut reader, "20", "reports.model", json!({ "rollNo": "1" }));
    assert_eq!(model["examTitle"], json!("Mid Term 2026"));
    assert_eq!(model["chart"].as_array().map(|a| a.len()), Some(2));
    let html = request_ok(&mut stdin, &mut reader, "21", "reports.renderHtml", json!({ "rollNo": "1" }));
    assert!(html["html"].as_str().unwrap_or("").contains("Steady work."));
    let zip = request_ok(
        &mut stdin,
        &mut reader,
        "22",
        "reports.exportZip",
        json!({ "outPath": zip_out.to_string_lossy() }),
    );
    assert_eq!(zip["entryCount"], json!(4));
    assert!(zip_out.is_file());

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "23",
        "export.csv",
        json!({ "outPath": csv_out.to_string_lossy() }),
    );
    assert!(csv_out.is_file());
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "24",
        "export.sheetLayoutCsv",
        json!({ "outPath": layout_out.to_string_lossy(), "template": tree, "students": [] }),
    );
    assert!(layout_out.is_file());
    let verified = request_ok(
        &mut stdin,
        &mut reader,
        "24x",
        "export.xlsx",
        json!({ "outPath": xlsx_out.to_string_lossy() }),
    );
    assert_eq!(verified["rows"], json!(3));
    assert!(xlsx_out.is_file());
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "24y",
        "export.sheetLayoutXlsx",
        json!({ "outPath": layout_xlsx_out.to_string_lossy(), "template": tree, "students": [] }),
    );
    assert!(layout_xlsx_out.is_file());
    let reparsed = request_ok(
        &mut stdin,
        &mut reader,
        "24z",
        "sheet.parse",
        json!({ "path": layout_xlsx_out.to_string_lossy() }),
    );
    assert_eq!(reparsed["sheet"]["finalHeaders"][0], json!("Roll No"));

    let _ = request_ok(&mut stdin, &mut reader, "25", "workspace.save", json!({}));
    let cleared = request_ok(&mut stdin, &mut reader, "26", "students.clear", json!({}));
    assert_eq!(cleared["removed"], json!(3));

    let unknown = request(&mut stdin, &mut reader, "27", "classes.list", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn unparseable_line_gets_bad_json_without_id() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    writeln!(stdin, "{{not json").expect("write");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let v: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(v["ok"], json!(false));
    assert_eq!(error_code(&v), "bad_json");
    assert!(v.get("id").is_none());

    let _ = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    drop(stdin);
    let _ = child.wait();
}
