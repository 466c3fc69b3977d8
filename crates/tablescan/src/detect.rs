use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::DetectError;

/// Workbook wire format, classified from the file's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookKind {
    /// ZIP-packaged OOXML workbook (`.xlsx`).
    PackagedXml,
    /// OLE2 compound-document binary workbook (`.xls`).
    LegacyBinary,
    /// Flat SpreadsheetML 2003 XML workbook.
    FlatXml,
    /// Recognised but not supported for scanning.
    Html,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Unknown,
    Utf8,
    Utf16Be,
    Utf16Le,
}

/// Detection outcome: the classified kind, the text encoding (meaningful for
/// the text-based kinds), and the byte-order mark that was present, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub kind: WorkbookKind,
    pub encoding: TextEncoding,
    pub bom: &'static [u8],
}

const SIGNATURE_ZIP: &[u8] = b"\x50\x4B\x03\x04\x14";
const SIGNATURE_OLE2: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";
const SIGNATURE_XML: &[u8] = b"<?xml";
const SIGNATURE_HTML: &[u8] = b"<html";

pub(crate) const BOM_UTF8: &[u8] = b"\xEF\xBB\xBF";
pub(crate) const BOM_UTF16_BE: &[u8] = b"\xFE\xFF";
pub(crate) const BOM_UTF16_LE: &[u8] = b"\xFF\xFE";

/// Classify a workbook file by its first bytes.
///
/// Reads at most 64 bytes in one pass; never parses further into the file.
pub fn detect_workbook_kind(path: impl AsRef<Path>) -> Result<Detection, DetectError> {
    let mut file = File::open(path.as_ref()).map_err(DetectError::Open)?;
    let mut signature = [0u8; 64];
    let mut filled = 0;
    while filled < signature.len() {
        match file.read(&mut signature[filled..]).map_err(DetectError::Read)? {
            0 => break,
            n => filled += n,
        }
    }
    if filled == 0 {
        return Err(DetectError::ShortRead);
    }
    Ok(classify(&signature[..filled]))
}

fn classify(signature: &[u8]) -> Detection {
    if signature.starts_with(SIGNATURE_ZIP) {
        return Detection {
            kind: WorkbookKind::PackagedXml,
            encoding: TextEncoding::Utf8,
            bom: &[],
        };
    }
    if signature.starts_with(SIGNATURE_OLE2) {
        return Detection {
            kind: WorkbookKind::LegacyBinary,
            encoding: TextEncoding::Utf8,
            bom: &[],
        };
    }

    // Only text-based formats remain; strip one optional byte-order mark and
    // bring UTF-16 content into UTF-8 before comparing prefixes.
    let mut encoding = TextEncoding::Unknown;
    let mut bom: &'static [u8] = &[];
    let mut decoded = Vec::new();
    let mut prefix = signature;
    if let Some(rest) = signature.strip_prefix(BOM_UTF8) {
        encoding = TextEncoding::Utf8;
        bom = BOM_UTF8;
        prefix = rest;
    } else if let Some(rest) = signature.strip_prefix(BOM_UTF16_BE) {
        encoding = TextEncoding::Utf16Be;
        bom = BOM_UTF16_BE;
        let (text, _, _) = encoding_rs::UTF_16BE.decode(rest);
        decoded = text.into_owned().into_bytes();
        prefix = &decoded;
    } else if let Some(rest) = signature.strip_prefix(BOM_UTF16_LE) {
        encoding = TextEncoding::Utf16Le;
        bom = BOM_UTF16_LE;
        let (text, _, _) = encoding_rs::UTF_16LE.decode(rest);
        decoded = text.into_owned().into_bytes();
        prefix = &decoded;
    }

    if prefix.starts_with(SIGNATURE_XML) {
        return Detection {
            kind: WorkbookKind::FlatXml,
            encoding,
            bom,
        };
    }
    if prefix.starts_with(SIGNATURE_HTML) {
        return Detection {
            kind: WorkbookKind::Html,
            encoding,
            bom,
        };
    }
    Detection {
        kind: WorkbookKind::Unknown,
        encoding: TextEncoding::Unknown,
        bom,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_by_signature() {
        assert_eq!(
            classify(b"\x50\x4B\x03\x04\x14\x00rest").kind,
            WorkbookKind::PackagedXml
        );
        assert_eq!(
            classify(b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1garbage").kind,
            WorkbookKind::LegacyBinary
        );
        assert_eq!(
            classify(b"<?xml version=\"1.0\"?>").kind,
            WorkbookKind::FlatXml
        );
        assert_eq!(classify(b"<html><body>").kind, WorkbookKind::Html);
        assert_eq!(classify(b"plain text").kind, WorkbookKind::Unknown);
    }

    #[test]
    fn strips_the_utf8_bom() {
        let detection = classify(b"\xEF\xBB\xBF<?xml version=\"1.0\"?>");
        assert_eq!(detection.kind, WorkbookKind::FlatXml);
        assert_eq!(detection.encoding, TextEncoding::Utf8);
        assert_eq!(detection.bom, BOM_UTF8);
    }

    #[test]
    fn decodes_utf16_before_comparing() {
        let mut le = vec![0xFF, 0xFE];
        for unit in "<?xml version".encode_utf16() {
            le.extend_from_slice(&unit.to_le_bytes());
        }
        let detection = classify(&le);
        assert_eq!(detection.kind, WorkbookKind::FlatXml);
        assert_eq!(detection.encoding, TextEncoding::Utf16Le);

        let mut be = vec![0xFE, 0xFF];
        for unit in "<?xml version".encode_utf16() {
            be.extend_from_slice(&unit.to_be_bytes());
        }
        let detection = classify(&be);
        assert_eq!(detection.kind, WorkbookKind::FlatXml);
        assert_eq!(detection.encoding, TextEncoding::Utf16Be);
    }

    #[test]
    fn a_short_prefix_never_matches_a_longer_signature() {
        assert_eq!(classify(b"\x50\x4B").kind, WorkbookKind::Unknown);
    }
}
