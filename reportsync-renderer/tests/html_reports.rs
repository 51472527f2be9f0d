use std::fs;

use reportsync_core::{ArtifactGenerator, LocalRecord};
use reportsync_renderer::{HtmlReportGenerator, REPORT_TEMPLATE};
use tempfile::TempDir;

fn write_record(dir: &TempDir, name: &str, body: &str) -> LocalRecord {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    LocalRecord::load(&path).unwrap()
}

#[test]
fn loaded_record_renders_every_leaf() {
    let work = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let record = write_record(
        &work,
        "alice.json",
        r#"{"patient":{"name":"Alice","dob":"1960-02-01"},"tumors":[{"name":"T1","grade":2}]}"#,
    );

    let generator = HtmlReportGenerator::new(out.path(), None).unwrap();
    let artifact = generator.generate(&record).unwrap();
    let html = fs::read_to_string(&artifact).unwrap();

    for needle in ["patient.dob", "1960-02-01", "tumors.0.grade", "T1"] {
        assert!(html.contains(needle), "missing {needle} in\n{html}");
    }
    assert!(!html.contains('\r'));
}

#[test]
fn rerender_overwrites_previous_artifact() {
    let work = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let templates = TempDir::new().unwrap();
    fs::write(templates.path().join(REPORT_TEMPLATE), "{{ record.v }}").unwrap();
    let generator = HtmlReportGenerator::new(out.path(), Some(templates.path())).unwrap();

    let first = write_record(&work, "r.json", r#"{"v":1}"#);
    generator.generate(&first).unwrap();
    let second = write_record(&work, "r.json", r#"{"v":2}"#);
    let artifact = generator.generate(&second).unwrap();

    assert_eq!(fs::read_to_string(artifact).unwrap(), "2");
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 1);
}

#[test]
fn missing_artifact_dir_is_created() {
    let work = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let nested = out.path().join("a").join("b");
    let record = write_record(&work, "n.json", "{}");

    let artifact = HtmlReportGenerator::new(&nested, None)
        .unwrap()
        .generate(&record)
        .unwrap();
    assert!(artifact.starts_with(&nested));
}
