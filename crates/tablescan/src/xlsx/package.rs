use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Take};
use std::path::{Path, PathBuf};

use flate2::read::DeflateDecoder;
use zip::CompressionMethod;
use zip::ZipArchive;

use crate::error::OpenError;

/// An open `.xlsx` package: the ZIP member table plus a member-name lookup
/// that tolerates producers that mix path case.
pub(crate) struct Package {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
    exact: HashMap<String, usize>,
    lowercase: HashMap<String, usize>,
}

impl Package {
    pub(crate) fn open(path: &Path) -> Result<Package, OpenError> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;
        let mut exact = HashMap::with_capacity(archive.len());
        let mut lowercase = HashMap::with_capacity(archive.len());
        for index in 0..archive.len() {
            let name = archive.by_index_raw(index)?.name().to_string();
            lowercase.entry(name.to_lowercase()).or_insert(index);
            exact.entry(name).or_insert(index);
        }
        Ok(Package {
            path: path.to_path_buf(),
            archive,
            exact,
            lowercase,
        })
    }

    /// Exact member lookup first, case-insensitive second.
    pub(crate) fn find(&self, member: &str) -> Option<usize> {
        self.exact
            .get(member)
            .or_else(|| self.lowercase.get(&member.to_lowercase()))
            .copied()
    }

    pub(crate) fn contains(&self, member: &str) -> bool {
        self.find(member).is_some()
    }

    /// Read a whole member into memory. Returns `None` when the member does
    /// not exist; callers decide whether that is fatal.
    pub(crate) fn read_member(&mut self, member: &str) -> Option<Result<Vec<u8>, OpenError>> {
        let index = self.find(member)?;
        let mut read = || -> Result<Vec<u8>, OpenError> {
            let mut entry = self.archive.by_index(index)?;
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            Ok(bytes)
        };
        Some(read())
    }

    /// Open a member as an independent streaming reader.
    ///
    /// The scanner keeps a sheet stream open across many `scan` calls, so it
    /// cannot borrow the archive for the duration; instead the member's data
    /// segment is read through a second file handle with its own inflater.
    pub(crate) fn open_member_stream(&mut self, member: &str) -> io::Result<MemberStream> {
        let index = self.find(member).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no member {member}"))
        })?;
        let (data_start, compressed_size, method) = {
            let entry = self.archive.by_index_raw(index).map_err(|e| {
                io::Error::new(io::ErrorKind::InvalidData, e.to_string())
            })?;
            (entry.data_start(), entry.compressed_size(), entry.compression())
        };
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(data_start))?;
        let raw = file.take(compressed_size);
        match method {
            CompressionMethod::Stored => Ok(MemberStream::Stored(raw)),
            CompressionMethod::Deflated => Ok(MemberStream::Deflated(DeflateDecoder::new(raw))),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported compression method {other:?} for {member}"),
            )),
        }
    }
}

/// Decompressing reader over one ZIP member, independent of the archive
/// handle.
pub(crate) enum MemberStream {
    Stored(Take<File>),
    Deflated(DeflateDecoder<Take<File>>),
}

impl Read for MemberStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            MemberStream::Stored(inner) => inner.read(buf),
            MemberStream::Deflated(inner) => inner.read(buf),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Relationship {
    pub id: String,
    pub type_: String,
    pub target: String,
}

pub(crate) fn parse_relationships(xml: &str, part: &str) -> Result<Vec<Relationship>, OpenError> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| OpenError::Xml {
        part: part.to_string(),
        message: e.to_string(),
    })?;
    let mut relationships = Vec::new();
    for node in doc.descendants().filter(|n| n.is_element()) {
        if node.tag_name().name() != "Relationship" {
            continue;
        }
        let Some(id) = node.attribute("Id") else {
            continue;
        };
        relationships.push(Relationship {
            id: id.to_string(),
            type_: node.attribute("Type").unwrap_or_default().to_string(),
            target: node.attribute("Target").unwrap_or_default().to_string(),
        });
    }
    Ok(relationships)
}

/// Resolve a relationship target against the part that declared it.
/// A leading `/` addresses the package root.
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize(absolute);
    }
    let base_dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    normalize(&format!("{base_dir}/{target}"))
}

fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn targets_resolve_relative_to_the_workbook() {
        assert_eq!(
            resolve_target("xl/workbook.xml", "worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "/xl/styles.xml"),
            "xl/styles.xml"
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "../customXml/item1.xml"),
            "customXml/item1.xml"
        );
    }

    #[test]
    fn relationship_parsing_keeps_document_order() {
        let xml = r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://x/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://x/styles" Target="styles.xml"/>
</Relationships>"#;
        let rels = parse_relationships(xml, "xl/_rels/workbook.xml.rels").unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].id, "rId1");
        assert_eq!(rels[1].target, "styles.xml");
    }
}
