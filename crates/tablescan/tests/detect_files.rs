use std::io::Write;

use pretty_assertions::assert_eq;
use tablescan::{detect_workbook_kind, DetectError, OpenError, TableScanner, TextEncoding, WorkbookKind};
use tempfile::NamedTempFile;

fn write_file(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn zip_packages_classify_as_packaged_xml() {
    // A deflate-mode local file header carries the `\x14` version byte the
    // signature requires.
    let file = write_file(b"\x50\x4B\x03\x04\x14\x00\x00\x00\x08\x00rest-of-zip");
    let detection = detect_workbook_kind(file.path()).unwrap();
    assert_eq!(detection.kind, WorkbookKind::PackagedXml);
    assert_eq!(detection.encoding, TextEncoding::Utf8);
    assert!(detection.bom.is_empty());
}

#[test]
fn compound_documents_classify_as_legacy_binary() {
    let file = write_file(b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1\x00\x00");
    let detection = detect_workbook_kind(file.path()).unwrap();
    assert_eq!(detection.kind, WorkbookKind::LegacyBinary);
}

#[test]
fn xml_prefix_classifies_as_flat_xml_with_and_without_bom() {
    let plain = write_file(b"<?xml version=\"1.0\"?><Workbook/>");
    let detection = detect_workbook_kind(plain.path()).unwrap();
    assert_eq!(detection.kind, WorkbookKind::FlatXml);
    assert_eq!(detection.encoding, TextEncoding::Unknown);

    let with_bom = write_file(b"\xEF\xBB\xBF<?xml version=\"1.0\"?><Workbook/>");
    let detection = detect_workbook_kind(with_bom.path()).unwrap();
    assert_eq!(detection.kind, WorkbookKind::FlatXml);
    assert_eq!(detection.encoding, TextEncoding::Utf8);
    assert_eq!(detection.bom, b"\xEF\xBB\xBF");
}

#[test]
fn html_is_recognised_but_not_scannable() {
    let file = write_file(b"<html><body><table></table></body></html>");
    let detection = detect_workbook_kind(file.path()).unwrap();
    assert_eq!(detection.kind, WorkbookKind::Html);

    let err = TableScanner::open(file.path()).unwrap_err();
    assert!(matches!(err, OpenError::Unsupported(WorkbookKind::Html)));
}

#[test]
fn unknown_signatures_fail_to_open() {
    let file = write_file(b"name,age\nalice,30\n");
    let detection = detect_workbook_kind(file.path()).unwrap();
    assert_eq!(detection.kind, WorkbookKind::Unknown);

    let err = TableScanner::open(file.path()).unwrap_err();
    assert!(matches!(err, OpenError::Unsupported(WorkbookKind::Unknown)));
}

#[test]
fn empty_files_report_a_short_read() {
    let file = write_file(b"");
    let err = detect_workbook_kind(file.path()).unwrap_err();
    assert!(matches!(err, DetectError::ShortRead));
}

#[test]
fn detection_is_stable_across_reads() {
    let file = write_file(b"<?xml version=\"1.0\"?><Workbook/>");
    let first = detect_workbook_kind(file.path()).unwrap();
    let second = detect_workbook_kind(file.path()).unwrap();
    assert_eq!(first, second);
}
