//! Integration tests for package reading and writing.

use std::io::{Cursor, Write};

use pbix_archive::{ArchiveError, Compression, PackageReader, PackageWriter};
use tempfile::tempdir;

fn write_sample(path: &std::path::Path, compression: Compression) {
    let mut writer = PackageWriter::create(path, compression).unwrap();
    writer
        .write_part("Version", "text/plain", &[0x33, 0x00])
        .unwrap();
    writer
        .write_part("Report/Layout", "application/json", b"{}")
        .unwrap();
    writer
        .write_part("Report/StaticResources/logo.png", "image/png", &[0x89, b'P'])
        .unwrap();
    writer.finalize().unwrap();
}

#[test]
fn written_package_reads_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sample.pbix");
    write_sample(&path, Compression::Deflated);

    let mut reader = PackageReader::open(&path).unwrap();
    let names: Vec<&str> = reader
        .list_parts()
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["Version", "Report/Layout", "Report/StaticResources/logo.png"]
    );
    assert_eq!(
        reader.list_parts()[2].content_type.as_deref(),
        Some("image/png")
    );
    assert_eq!(reader.read_part("Report/Layout").unwrap(), b"{}");
    assert!(matches!(
        reader.read_part("Missing"),
        Err(ArchiveError::PartMissing(_))
    ));
}

#[test]
fn output_is_byte_identical_across_runs() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.pbix");
    let b = dir.path().join("b.pbix");
    write_sample(&a, Compression::Stored);
    write_sample(&b, Compression::Stored);
    assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
}

#[test]
fn finalize_replaces_existing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sample.pbix");
    std::fs::write(&path, b"old contents").unwrap();
    write_sample(&path, Compression::Deflated);
    assert!(PackageReader::open(&path).is_ok());
}

#[test]
fn plain_file_is_not_a_package() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.pbix");
    std::fs::write(&path, b"definitely not a zip").unwrap();
    assert!(matches!(
        PackageReader::open(&path),
        Err(ArchiveError::NotAPackage { .. })
    ));
}

#[test]
fn zip_without_content_types_is_not_a_package() {
    let mut buffer = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buffer));
        zip.start_file("Version", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"3").unwrap();
        zip.finish().unwrap();
    }
    let result = PackageReader::from_reader(Cursor::new(buffer), "memory.pbix");
    assert!(matches!(result, Err(ArchiveError::NotAPackage { .. })));
}

#[test]
fn malformed_content_types_is_not_a_package() {
    let mut buffer = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buffer));
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(br#"<Types><Override PartName="/Version" /></Types>"#)
            .unwrap();
        zip.start_file("Version", options).unwrap();
        zip.write_all(b"3").unwrap();
        zip.finish().unwrap();
    }
    let result = PackageReader::from_reader(Cursor::new(buffer), "memory.pbix");
    match result {
        Err(ArchiveError::NotAPackage { reason, .. }) => {
            assert!(reason.contains("ContentType"), "{reason}");
        }
        Err(other) => panic!("expected NotAPackage, got {other:?}"),
        Ok(_) => panic!("expected an error"),
    }
}

#[test]
fn missing_file_reports_not_found() {
    let dir = tempdir().unwrap();
    let err = match PackageReader::open(&dir.path().join("absent.pbix")) {
        Err(err) => err,
        Ok(_) => panic!("expected an error"),
    };
    assert!(err.is_not_found());
}
