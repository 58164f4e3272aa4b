//! End-to-end extraction and packing.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use pbix_archive::{Compression, PackageWriter};
use pbix_core::{
    ConversionContext, ConversionError, ExtractOptions, PackOptions, PartRequirements,
    PartStatus, extract, pack, read_package, read_project,
};
use pbix_codec::{Registry, TextEncoding, encode_text};
use pbix_model::{BlobCollection, Document, DocumentSlot, LogicalModel, PartKind};
use pbix_normalization::normalize;
use pbix_persistence::{ProjectRecord, list_managed_files};
use serde_json::json;
use tempfile::{TempDir, tempdir};
use walkdir::WalkDir;

fn run_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn ctx() -> ConversionContext {
    ConversionContext::new("test").with_run_at(run_at())
}

fn utf16(text: &str) -> Vec<u8> {
    encode_text(text, TextEncoding::Utf16Le)
}

/// Builds packages part by part.
struct Fixture {
    parts: Vec<(String, String, Vec<u8>)>,
}

impl Fixture {
    fn v3() -> Self {
        Self {
            parts: vec![("Version".into(), "text/plain".into(), utf16("3.0"))],
        }
    }

    fn without_version() -> Self {
        Self { parts: Vec::new() }
    }

    fn part(mut self, name: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        self.parts
            .push((name.to_string(), content_type.to_string(), bytes));
        self
    }

    fn json_part(self, name: &str, text: &str) -> Self {
        self.part(name, "application/json", utf16(text))
    }

    fn write(&self, path: &Path) -> PathBuf {
        let mut writer = PackageWriter::create(path, Compression::Deflated).unwrap();
        for (name, content_type, bytes) in &self.parts {
            writer.write_part(name, content_type, bytes).unwrap();
        }
        writer.finalize().unwrap()
    }
}

fn sample() -> Fixture {
    Fixture::v3()
        .part(
            "Connections",
            "application/json",
            br#"{"Version":1,"RemoteArtifacts":[],"Connections":[{"Name":"EntityDataSource","ConnectionType":"pbiServiceLive"}]}"#.to_vec(),
        )
        .json_part(
            "Report/Layout",
            r#"{"sections":[{"name":"ReportSection","displayName":"Page 1"}],"id":0,"config":"{}"}"#,
        )
        .json_part(
            "DataModelSchema",
            r#"{"name":"model","model":{"tables":[{"name":"Sales","lineageTag":"t-1","partitions":[{"name":"q1"}]}]}}"#,
        )
        .part(
            "Report/StaticResources/SharedResources/BaseThemes/CY24SU02.json",
            "application/json",
            b"{\"name\":\"theme\"}".to_vec(),
        )
        .part("SecurityBindings", "application/octet-stream", vec![0x00, 0x01, 0x02])
}

fn normalized(mut model: LogicalModel) -> LogicalModel {
    for document in model.documents.values_mut() {
        *document = normalize(document);
    }
    model
}

fn workspace() -> (TempDir, PathBuf, PathBuf) {
    let dir = tempdir().unwrap();
    let package = dir.path().join("report.pbix");
    let project = dir.path().join("report");
    (dir, package, project)
}

fn snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            (rel, fs::read(entry.path()).unwrap())
        })
        .collect()
}

#[test]
fn extract_writes_the_project_layout() {
    let (_dir, package, project) = workspace();
    sample().write(&package);

    let report = extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();

    assert_eq!(report.version.as_str(), "3.0");
    for path in [
        ".pbixproj.json",
        "Connections.json",
        "Report/Layout.json",
        "Model/DataModelSchema.json",
        "StaticResources/SharedResources/BaseThemes/CY24SU02.json",
        "Unrecognized/SecurityBindings",
    ] {
        assert!(project.join(path).is_file(), "missing {path}");
    }
    assert_eq!(
        fs::read(project.join("Unrecognized/SecurityBindings")).unwrap(),
        vec![0x00, 0x01, 0x02]
    );
    assert_eq!(report.commit.written, 6);
    assert_eq!(report.stability.baselined, 2);
    assert!(report.parts.iter().all(|p| p.tree_path.is_some()));
}

#[test]
fn documents_are_written_canonically() {
    let (_dir, package, project) = workspace();
    sample().write(&package);
    extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();

    let connections = fs::read_to_string(project.join("Connections.json")).unwrap();
    insta::assert_snapshot!(connections, @r#"
    {
      "Connections": [
        {
          "ConnectionType": "pbiServiceLive",
          "Name": "EntityDataSource"
        }
      ],
      "RemoteArtifacts": [],
      "Version": 1
    }
    "#);
    let layout = fs::read_to_string(project.join("Report/Layout.json")).unwrap();
    assert!(layout.starts_with("{\n  \"config\": \"{}\",\n  \"id\": 0,\n"));
    assert!(layout.ends_with("}\n"));
}

#[test]
fn connections_and_layout_give_two_canonical_files() {
    let (_dir, package, project) = workspace();
    Fixture::v3()
        .part(
            "Connections",
            "application/json",
            br#"{"Version":1,"Connections":[]}"#.to_vec(),
        )
        .json_part("Report/Layout", r#"{"sections":[],"id":0,"config":"{}"}"#)
        .write(&package);
    extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();

    let files: Vec<String> = list_managed_files(&project)
        .unwrap()
        .into_iter()
        .filter(|path| path != ".pbixproj.json")
        .collect();
    assert_eq!(files, vec!["Connections.json", "Report/Layout.json"]);
    assert_eq!(
        fs::read_to_string(project.join("Connections.json")).unwrap(),
        "{\n  \"Connections\": [],\n  \"Version\": 1\n}\n"
    );
    assert_eq!(
        fs::read_to_string(project.join("Report/Layout.json")).unwrap(),
        "{\n  \"config\": \"{}\",\n  \"id\": 0,\n  \"sections\": []\n}\n"
    );

    let before = snapshot(&project);
    extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();
    assert_eq!(snapshot(&project), before);
}

#[test]
fn re_extraction_is_byte_identical() {
    let (_dir, package, project) = workspace();
    sample().write(&package);
    let first = extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();
    assert!(!first.source_unchanged);
    let before = snapshot(&project);

    let second = extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();
    assert!(second.source_unchanged);
    assert_eq!(second.stability.unchanged, 2);
    assert_eq!(snapshot(&project), before);
}

#[test]
fn extract_then_pack_round_trips() {
    let (dir, package, project) = workspace();
    sample().write(&package);
    extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();

    let repacked = dir.path().join("repacked.pbix");
    let report = pack(&project, &repacked, &PackOptions::default(), &mut ctx()).unwrap();
    assert_eq!(report.part_count(), 6);

    let registry = Registry::default();
    let original = normalized(read_package(&package, &registry).unwrap());
    let from_project = normalized(read_project(&project).unwrap());
    let from_repacked = normalized(read_package(&repacked, &registry).unwrap());
    assert_eq!(from_project, original);
    assert_eq!(from_repacked, from_project);

    let second_project = dir.path().join("second");
    extract(&repacked, &second_project, &ExtractOptions::default(), &mut ctx()).unwrap();
    assert_eq!(
        normalized(read_project(&second_project).unwrap()),
        from_project
    );
}

#[test]
fn unknown_parts_survive_a_round_trip() {
    let (dir, package, project) = workspace();
    Fixture::v3()
        .part("Settings", "application/json", utf16(r#"{"Version":4}"#))
        .part("CustomData/blob.bin", "application/x-custom", vec![9, 8, 7])
        .write(&package);
    extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();

    let record = ProjectRecord::from_json(
        &fs::read_to_string(project.join(".pbixproj.json")).unwrap(),
        &project,
    )
    .unwrap();
    assert_eq!(
        record.content_types.get("CustomData/blob.bin").map(String::as_str),
        Some("application/x-custom")
    );

    let repacked = dir.path().join("repacked.pbix");
    pack(&project, &repacked, &PackOptions::default(), &mut ctx()).unwrap();
    let mut reader = pbix_archive::PackageReader::open(&repacked).unwrap();
    assert_eq!(reader.read_part("CustomData/blob.bin").unwrap(), vec![9, 8, 7]);
    let descriptor = reader
        .list_parts()
        .iter()
        .find(|p| p.name == "CustomData/blob.bin")
        .cloned()
        .unwrap();
    assert_eq!(descriptor.content_type.as_deref(), Some("application/x-custom"));
}

#[test]
fn query_ids_stay_stable_across_extractions() {
    let (dir, package, project) = workspace();
    let schema = |partition: &str| {
        json!({"model": {"tables": [
            {"name": "Sales", "lineageTag": "t-1", "partitions": [{"name": partition}]}
        ]}})
        .to_string()
    };
    Fixture::v3()
        .json_part("DataModelSchema", &schema("q1"))
        .write(&package);
    extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();

    let resaved = dir.path().join("resaved.pbix");
    Fixture::v3()
        .json_part("DataModelSchema", &schema("q2"))
        .write(&resaved);
    let report = extract(&resaved, &project, &ExtractOptions::default(), &mut ctx()).unwrap();
    assert_eq!(report.stability.rewritten, 1);

    let text = fs::read_to_string(project.join("Model/DataModelSchema.json")).unwrap();
    assert!(text.contains("\"name\": \"q1\""));
    assert!(!text.contains("q2"));

    let record = ProjectRecord::from_json(
        &fs::read_to_string(project.join(".pbixproj.json")).unwrap(),
        &project,
    )
    .unwrap();
    let entry = record.identifiers.get("Query: Sales").unwrap();
    assert_eq!(entry.stable_id, "q1");
    assert_eq!(entry.observed_id, "q2");
}

#[test]
fn disabled_stable_ids_keep_fresh_values() {
    let (dir, package, project) = workspace();
    let schema = |partition: &str| {
        json!({"model": {"tables": [{"name": "Sales", "partitions": [{"name": partition}]}]}})
            .to_string()
    };
    Fixture::v3()
        .json_part("DataModelSchema", &schema("q1"))
        .write(&package);
    let options = ExtractOptions::default().with_stable_ids(false);
    extract(&package, &project, &options, &mut ctx()).unwrap();

    let resaved = dir.path().join("resaved.pbix");
    Fixture::v3()
        .json_part("DataModelSchema", &schema("q2"))
        .write(&resaved);
    extract(&resaved, &project, &options, &mut ctx()).unwrap();

    let text = fs::read_to_string(project.join("Model/DataModelSchema.json")).unwrap();
    assert!(text.contains("\"name\": \"q2\""));
}

#[test]
fn unsupported_version_leaves_project_untouched() {
    let (dir, package, project) = workspace();
    sample().write(&package);
    extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();
    let before = snapshot(&project);

    let old = dir.path().join("old.pbix");
    Fixture::without_version()
        .part("Version", "text/plain", utf16("1.28"))
        .json_part("Report/Layout", "{}")
        .write(&old);
    let err = extract(&old, &project, &ExtractOptions::default(), &mut ctx()).unwrap_err();
    match err {
        ConversionError::UnsupportedVersion { found, .. } => assert_eq!(found, "1.28"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(snapshot(&project), before);

    let missing = dir.path().join("missing.pbix");
    Fixture::without_version()
        .json_part("Report/Layout", "{}")
        .write(&missing);
    let err = extract(&missing, &project, &ExtractOptions::default(), &mut ctx()).unwrap_err();
    assert!(matches!(err, ConversionError::UnsupportedVersion { .. }));
    assert_eq!(snapshot(&project), before);
}

#[test]
fn missing_package_is_not_found() {
    let (_dir, package, project) = workspace();
    let err = extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap_err();
    assert!(matches!(err, ConversionError::NotFound { .. }));
    assert!(!project.exists());
}

#[test]
fn malformed_content_types_is_not_a_package() {
    let (_dir, package, project) = workspace();
    {
        let file = fs::File::create(&package).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(br#"<Types><Override PartName="/Version" /></Types>"#)
            .unwrap();
        zip.start_file("Version", options).unwrap();
        zip.write_all(&utf16("3.0")).unwrap();
        zip.finish().unwrap();
    }

    let err = extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap_err();
    assert!(
        matches!(err, ConversionError::NotAPackage { .. }),
        "unexpected error: {err}"
    );
    assert!(err.suggestion().is_some());
    assert!(!project.exists());
}

#[test]
fn required_decode_failure_fails_without_writing() {
    let (_dir, package, project) = workspace();
    Fixture::v3()
        .json_part("Report/Layout", "{\"sections\": [")
        .write(&package);

    let err = extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap_err();
    match err {
        ConversionError::PartDecodeFailure { part, .. } => assert_eq!(part, "Report/Layout"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!project.join(".pbixproj.json").exists());
}

#[test]
fn optional_decode_failure_is_skipped() {
    let (_dir, package, project) = workspace();
    Fixture::v3()
        .json_part("Report/Layout", "{\"sections\": [")
        .json_part("Settings", "{}")
        .write(&package);

    let options = ExtractOptions::default().with_requirements(
        PartRequirements::default().make_optional(PartKind::Document(DocumentSlot::ReportLayout)),
    );
    let mut ctx = ctx();
    let report = extract(&package, &project, &options, &mut ctx).unwrap();

    let skipped: Vec<&str> = report.skipped().map(|p| p.part.as_str()).collect();
    assert_eq!(skipped, vec!["Report/Layout"]);
    assert_eq!(ctx.warning_count(), 1);
    assert!(!project.join("Report/Layout.json").exists());
    assert!(project.join("ReportSettings.json").exists());
}

#[test]
fn schema_extractor_supplies_missing_schema() {
    let (_dir, package, project) = workspace();
    Fixture::v3().json_part("Settings", "{}").write(&package);

    let extractor = |_: &Path| -> Result<Document, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Document::Json(json!({"model": {"tables": []}})))
    };
    let options = ExtractOptions::default().with_schema_extractor(Box::new(extractor));
    extract(&package, &project, &options, &mut ctx()).unwrap();

    let text = fs::read_to_string(project.join("Model/DataModelSchema.json")).unwrap();
    assert!(text.contains("\"tables\": []"));
}

#[test]
fn failing_schema_extractor_is_a_decode_failure() {
    let (_dir, package, project) = workspace();
    Fixture::v3().json_part("Settings", "{}").write(&package);

    let extractor = |_: &Path| -> Result<Document, Box<dyn std::error::Error + Send + Sync>> {
        Err("engine unavailable".into())
    };
    let options = ExtractOptions::default().with_schema_extractor(Box::new(extractor));
    let err = extract(&package, &project, &options, &mut ctx()).unwrap_err();
    match err {
        ConversionError::PartDecodeFailure { part, reason } => {
            assert_eq!(part, "DataModelSchema");
            assert!(reason.contains("engine unavailable"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn pack_requires_a_record() {
    let (dir, package, _project) = workspace();
    let err = pack(dir.path(), &package, &PackOptions::default(), &mut ctx()).unwrap_err();
    assert!(matches!(err, ConversionError::NotAProject { .. }));
    assert!(!package.exists());
}

#[test]
fn pack_reports_missing_slot() {
    let (dir, package, project) = workspace();
    sample().write(&package);
    extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();
    fs::remove_file(project.join("Report/Layout.json")).unwrap();

    let repacked = dir.path().join("repacked.pbix");
    let err = pack(&project, &repacked, &PackOptions::default(), &mut ctx()).unwrap_err();
    match err {
        ConversionError::MissingSlot { slot, .. } => assert_eq!(slot, DocumentSlot::ReportLayout),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!repacked.exists());
}

#[test]
fn pack_rejects_an_edited_file_that_does_not_parse() {
    let (dir, package, project) = workspace();
    sample().write(&package);
    extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();
    fs::write(project.join("Connections.json"), "{ not json").unwrap();

    let repacked = dir.path().join("repacked.pbix");
    let err = pack(&project, &repacked, &PackOptions::default(), &mut ctx()).unwrap_err();
    assert!(matches!(err, ConversionError::PartDecodeFailure { .. }));
    assert!(!repacked.exists());
}

#[test]
fn pack_ignores_files_outside_the_layout() {
    let (dir, package, project) = workspace();
    sample().write(&package);
    extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();
    fs::write(project.join("README.md"), "notes").unwrap();

    let repacked = dir.path().join("repacked.pbix");
    let mut ctx = ctx();
    let report = pack(&project, &repacked, &PackOptions::default(), &mut ctx).unwrap();
    assert_eq!(report.part_count(), 6);
    assert_eq!(ctx.warning_count(), 1);
}

#[test]
fn pack_output_is_deterministic() {
    let (dir, package, project) = workspace();
    sample().write(&package);
    extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();

    let a = dir.path().join("a.pbix");
    let b = dir.path().join("b.pbix");
    pack(&project, &a, &PackOptions::default(), &mut ctx()).unwrap();
    pack(&project, &b, &PackOptions::default(), &mut ctx()).unwrap();
    assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
}

#[test]
fn blob_names_are_sanitized_and_restored() {
    let (dir, package, project) = workspace();
    Fixture::v3()
        .part(
            "Report/CustomVisuals/visual:1/package.json",
            "application/json",
            b"{}".to_vec(),
        )
        .write(&package);
    let report = extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap();
    assert!(project.join("CustomVisuals/visual_1/package.json").is_file());
    assert!(report.parts.iter().any(|p| p.status == PartStatus::Preserved));

    let repacked = dir.path().join("repacked.pbix");
    pack(&project, &repacked, &PackOptions::default(), &mut ctx()).unwrap();
    let model = read_package(&repacked, &Registry::default()).unwrap();
    assert_eq!(
        model.blob(BlobCollection::CustomVisuals, "visual:1/package.json"),
        Some(&b"{}"[..])
    );
}

#[test]
fn colliding_blob_names_are_rejected() {
    let (_dir, package, project) = workspace();
    Fixture::v3()
        .part("Report/StaticResources/Logo.png", "image/png", vec![1])
        .part("Report/StaticResources/logo.png", "image/png", vec![2])
        .write(&package);
    let err = extract(&package, &project, &ExtractOptions::default(), &mut ctx()).unwrap_err();
    assert!(matches!(err, ConversionError::IdentifierCollision { .. }));
    assert!(!project.exists() || snapshot(&project).is_empty());
}
