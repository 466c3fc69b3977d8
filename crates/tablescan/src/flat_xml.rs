use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quick_xml::events::Event;
use quick_xml::Reader;
use tablescan_format::locale;

use crate::detect::TextEncoding;
use crate::error::{OpenError, ScanError};
use crate::scanner::{HideLevel, SheetInfo};
use crate::xmlutil::attribute;

/// Position of the decoder inside a worksheet region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Root,
    Worksheet,
    Table,
    Row,
}

#[derive(Debug)]
struct FlatSheet {
    info: SheetInfo,
    /// Byte offset of the sheet's `<Worksheet>` start tag.
    start: u64,
    /// Byte offset just before the sheet's `</Worksheet>` end tag.
    stop: u64,
}

/// Where sheet bytes come from: the file itself for UTF-8 sources, or an
/// in-memory UTF-8 transcode for UTF-16 sources.
#[derive(Debug)]
enum FlatSource {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

impl FlatSource {
    fn open_at(&self, start: u64) -> io::Result<FlatReader> {
        match self {
            FlatSource::File(path) => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::Start(start))?;
                Ok(FlatReader::File(file))
            }
            FlatSource::Memory(bytes) => {
                let mut cursor = Cursor::new(Arc::clone(bytes));
                cursor.set_position(start);
                Ok(FlatReader::Memory(cursor))
            }
        }
    }
}

#[derive(Debug)]
enum FlatReader {
    File(File),
    Memory(Cursor<Arc<[u8]>>),
}

impl Read for FlatReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FlatReader::File(inner) => inner.read(buf),
            FlatReader::Memory(inner) => inner.read(buf),
        }
    }
}

/// Streaming row reader for flat SpreadsheetML 2003 workbooks.
///
/// Opening makes one pass over the document to record each `Worksheet`'s
/// byte range and visibility; scanning then streams rows from a seek-bounded
/// region per sheet.
pub struct FlatXmlScanner {
    source: FlatSource,
    sheets: Vec<FlatSheet>,
    infos: Vec<SheetInfo>,
    selected: usize,
    last_error: Option<ScanError>,
    iter: IterState,
}

impl std::fmt::Debug for FlatXmlScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatXmlScanner")
            .field("source", &self.source)
            .field("sheets", &self.sheets)
            .field("infos", &self.infos)
            .field("selected", &self.selected)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

struct IterState {
    sheet_id: usize,
    emitted_row: u64,
    scanned_row: u64,
    data: Vec<String>,
    capacity: usize,
    segment: Segment,
    initial_offset: u64,
    reader: Option<Reader<BufReader<FlatReader>>>,
}

impl IterState {
    fn new() -> Self {
        IterState {
            sheet_id: 0,
            emitted_row: 0,
            scanned_row: 0,
            data: Vec::new(),
            capacity: 0,
            segment: Segment::Root,
            initial_offset: 0,
            reader: None,
        }
    }

    fn reset(&mut self, sheet_id: usize) {
        self.sheet_id = sheet_id;
        self.emitted_row = 0;
        self.scanned_row = 0;
        self.data = Vec::new();
        self.capacity = 0;
        self.segment = Segment::Root;
        self.initial_offset = 0;
        self.reader = None;
    }
}

impl FlatXmlScanner {
    pub fn open(path: impl AsRef<Path>, encoding: TextEncoding) -> Result<FlatXmlScanner, OpenError> {
        let path = path.as_ref();
        let source = match encoding {
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
                let bytes = std::fs::read(path)?;
                let utf8 = transcode_utf16(&bytes, encoding == TextEncoding::Utf16Le);
                FlatSource::Memory(utf8.into())
            }
            _ => FlatSource::File(path.to_path_buf()),
        };

        let mut scanner = FlatXmlScanner {
            source,
            sheets: Vec::new(),
            infos: Vec::new(),
            selected: 0,
            last_error: None,
            iter: IterState::new(),
        };
        scanner.index_sheets()?;
        let _ = scanner.set_sheet_id(scanner.selected);
        Ok(scanner)
    }

    /// One pass over the whole document, recording each worksheet's byte
    /// range, name, visibility, and selection flag.
    fn index_sheets(&mut self) -> Result<(), OpenError> {
        let stream = self.source.open_at(0)?;
        let mut reader = Reader::from_reader(BufReader::new(stream));
        reader.config_mut().trim_text(false);

        let mut buf = Vec::new();
        let mut skip_buf = Vec::new();
        // 0 = document, 1 = Workbook, 2 = Worksheet.
        let mut level = 0u8;
        let mut sheet_start = 0u64;
        let mut sheet_name = String::new();
        let mut hide_level = HideLevel::Visible;
        let mut sheet_selected = false;

        loop {
            let position_before = reader.buffer_position() as u64;
            buf.clear();
            let event = reader.read_event_into(&mut buf).map_err(|e| OpenError::Xml {
                part: "workbook".to_string(),
                message: format!("at byte {position_before}: {e}"),
            })?;
            match event {
                Event::Eof => break,
                Event::Start(ref e) => match (level, e.local_name().as_ref()) {
                    (0, b"Workbook") => level = 1,
                    (1, b"Worksheet") => {
                        level = 2;
                        sheet_start = position_before;
                        sheet_name = attribute(e, b"Name").unwrap_or_default();
                        hide_level = HideLevel::Visible;
                        sheet_selected = false;
                    }
                    (2, b"WorksheetOptions") => {
                        let (visible, selected) =
                            read_worksheet_options(&mut reader, &mut skip_buf)?;
                        hide_level = match visible.to_lowercase().as_str() {
                            "sheethidden" => HideLevel::Hidden,
                            "sheetveryhidden" => HideLevel::VeryHidden,
                            _ => HideLevel::Visible,
                        };
                        sheet_selected = selected;
                    }
                    _ => {
                        // Table contents are not examined during indexing.
                        let name = e.name().as_ref().to_vec();
                        skip_buf.clear();
                        reader
                            .read_to_end_into(quick_xml::name::QName(&name), &mut skip_buf)
                            .map_err(|e| OpenError::Xml {
                                part: "workbook".to_string(),
                                message: e.to_string(),
                            })?;
                    }
                },
                Event::End(ref e) => match (level, e.local_name().as_ref()) {
                    (1, b"Workbook") => level = 0,
                    (2, b"Worksheet") => {
                        if sheet_selected {
                            self.selected = self.sheets.len();
                        }
                        let info = SheetInfo {
                            name: std::mem::take(&mut sheet_name),
                            hide_level,
                        };
                        self.infos.push(info.clone());
                        self.sheets.push(FlatSheet {
                            info,
                            start: sheet_start,
                            stop: position_before,
                        });
                        level = 1;
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        Ok(())
    }

    pub fn sheets(&self) -> &[SheetInfo] {
        &self.infos
    }

    pub fn current_sheet_id(&self) -> usize {
        self.iter.sheet_id
    }

    pub fn set_sheet_id(&mut self, id: usize) -> Result<(), ScanError> {
        self.last_error = None;
        self.iter.reset(self.iter.sheet_id);
        if id >= self.sheets.len() {
            return Err(ScanError::SheetOutOfRange(id));
        }
        self.iter.sheet_id = id;
        Ok(())
    }

    /// The locale only affects formatting, which this backend does not do;
    /// the tag is still validated.
    pub fn set_locale(&mut self, tag: &str) -> Result<(), ScanError> {
        locale(tag)
            .map(|_| ())
            .ok_or_else(|| ScanError::UnknownLocale(tag.to_string()))
    }

    pub fn scan(&mut self) -> Result<bool, ScanError> {
        if self.iter.scanned_row > self.iter.emitted_row {
            self.iter.emitted_row += 1;
            self.last_error = None;
            return Ok(true);
        }
        match self.scan_row() {
            Ok(true) => {
                self.iter.emitted_row += 1;
                self.last_error = None;
                Ok(true)
            }
            Ok(false) => {
                self.last_error = None;
                Ok(false)
            }
            Err(err) => {
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    pub fn scanned(&self) -> &[String] {
        if self.iter.scanned_row > self.iter.emitted_row {
            return &[];
        }
        &self.iter.data
    }

    pub fn last_scan_error(&self) -> Option<&ScanError> {
        self.last_error.as_ref()
    }

    pub fn close(self) -> io::Result<()> {
        Ok(())
    }

    fn ensure_reader(&mut self) -> Result<(), ScanError> {
        if self.iter.reader.is_none() {
            let start = self.sheets[self.iter.sheet_id].start;
            let stream = self.source.open_at(start)?;
            let mut reader = Reader::from_reader(BufReader::new(stream));
            reader.config_mut().trim_text(false);
            self.iter.initial_offset = start;
            self.iter.reader = Some(reader);
        }
        Ok(())
    }

    fn scan_row(&mut self) -> Result<bool, ScanError> {
        self.ensure_reader()?;
        let stop = self.sheets[self.iter.sheet_id].stop;
        self.iter.data = Vec::with_capacity(self.iter.capacity);

        let mut buf = Vec::new();
        let mut skip_buf = Vec::new();
        loop {
            let offset = {
                let reader = self.iter.reader.as_ref().expect("reader opened above");
                self.iter.initial_offset + reader.buffer_position() as u64
            };
            // Never iterate out of the sheet's byte range.
            if offset > stop {
                let sheet = self.iter.sheet_id;
                let _ = self.set_sheet_id(sheet);
                return Ok(false);
            }

            buf.clear();
            let event = {
                let reader = self.iter.reader.as_mut().expect("reader opened above");
                match reader.read_event_into(&mut buf) {
                    Ok(event) => event,
                    Err(e) => {
                        let err = ScanError::Xml {
                            path: self.sheet_name().to_string(),
                            offset,
                            message: e.to_string(),
                        };
                        let sheet = self.iter.sheet_id;
                        let _ = self.set_sheet_id(sheet);
                        return Err(err);
                    }
                }
            };
            if self.iter.data.len() > self.iter.capacity {
                self.iter.capacity = self.iter.data.len();
            }

            match event {
                Event::Eof => {
                    let sheet = self.iter.sheet_id;
                    let _ = self.set_sheet_id(sheet);
                    return Ok(false);
                }

                Event::Start(ref e) | Event::Empty(ref e) => {
                    let empty = matches!(event, Event::Empty(_));
                    let name = e.local_name();
                    match self.iter.segment {
                        Segment::Root => {
                            if name.as_ref() == b"Worksheet" && !empty {
                                self.iter.segment = Segment::Worksheet;
                            } else if !empty {
                                self.skip_subtree(e, &mut skip_buf)?;
                            }
                        }
                        Segment::Worksheet => {
                            if name.as_ref() == b"Table" && !empty {
                                self.iter.segment = Segment::Table;
                            } else if !empty {
                                self.skip_subtree(e, &mut skip_buf)?;
                            }
                        }
                        Segment::Table => {
                            if name.as_ref() == b"Row" {
                                self.iter.data = Vec::with_capacity(self.iter.capacity);
                                match attribute(e, b"Index") {
                                    Some(value) => {
                                        let number: u64 =
                                            value.trim().parse().map_err(|_| {
                                                ScanError::AttributeNotInteger {
                                                    element: "Row",
                                                    attribute: "Index",
                                                    offset,
                                                }
                                            })?;
                                        if number <= self.iter.scanned_row {
                                            return Err(ScanError::RowNumbersNotIncreasing {
                                                path: self.sheet_name().to_string(),
                                                previous: self.iter.scanned_row,
                                                current: number,
                                            });
                                        }
                                        self.iter.scanned_row = number;
                                    }
                                    None => self.iter.scanned_row += 1,
                                }
                                if empty {
                                    return Ok(true);
                                }
                                self.iter.segment = Segment::Row;
                            } else if !empty {
                                self.skip_subtree(e, &mut skip_buf)?;
                            }
                        }
                        Segment::Row => {
                            if name.as_ref() == b"Cell" {
                                let column = match attribute(e, b"Index") {
                                    Some(value) => value.trim().parse().map_err(|_| {
                                        ScanError::AttributeNotInteger {
                                            element: "Cell",
                                            attribute: "Index",
                                            offset,
                                        }
                                    })?,
                                    None => self.iter.data.len() + 1,
                                };
                                let merge_across: usize = match attribute(e, b"MergeAcross") {
                                    Some(value) => value.trim().parse().map_err(|_| {
                                        ScanError::AttributeNotInteger {
                                            element: "Cell",
                                            attribute: "MergeAcross",
                                            offset,
                                        }
                                    })?,
                                    None => 0,
                                };
                                let text = if empty {
                                    String::new()
                                } else {
                                    self.read_cell_data(&mut skip_buf)?
                                };
                                if column == 0 || self.iter.data.len() > column - 1 {
                                    return Err(ScanError::CellIndexCollision {
                                        row: self.iter.scanned_row,
                                        column,
                                    });
                                }
                                let data = &mut self.iter.data;
                                while data.len() < column - 1 {
                                    data.push(String::new());
                                }
                                data.push(text);
                                // Merged cells claim trailing empty columns.
                                for _ in 0..merge_across {
                                    data.push(String::new());
                                }
                            } else if !empty {
                                self.skip_subtree(e, &mut skip_buf)?;
                            }
                        }
                    }
                }

                Event::End(ref e) => {
                    let name = e.local_name();
                    match self.iter.segment {
                        Segment::Worksheet if name.as_ref() == b"Worksheet" => {
                            self.iter.segment = Segment::Root;
                        }
                        Segment::Table if name.as_ref() == b"Table" => {
                            self.iter.segment = Segment::Worksheet;
                        }
                        Segment::Row if name.as_ref() == b"Row" => {
                            self.iter.segment = Segment::Table;
                            return Ok(true);
                        }
                        _ => {}
                    }
                }

                _ => {}
            }
        }
    }

    /// Consume a `Cell` subtree, returning the concatenated text of its
    /// `Data` descendants.
    fn read_cell_data(&mut self, buf: &mut Vec<u8>) -> Result<String, ScanError> {
        let reader = self.iter.reader.as_mut().expect("reader opened above");
        let mut text = String::new();
        let mut depth = 1usize;
        let mut data_depth = 0usize;
        loop {
            buf.clear();
            let event = reader.read_event_into(buf).map_err(|e| ScanError::Xml {
                path: self.infos[self.iter.sheet_id].name.clone(),
                offset: 0,
                message: e.to_string(),
            })?;
            match event {
                Event::Eof => {
                    return Err(ScanError::Xml {
                        path: self.infos[self.iter.sheet_id].name.clone(),
                        offset: 0,
                        message: "unexpected end of file inside <Cell>".to_string(),
                    })
                }
                Event::Start(ref e) => {
                    depth += 1;
                    if e.local_name().as_ref() == b"Data" || data_depth > 0 {
                        data_depth += 1;
                    }
                }
                Event::End(_) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                    data_depth = data_depth.saturating_sub(1);
                }
                Event::Text(ref t) if data_depth > 0 => {
                    if let Ok(chunk) = t.unescape() {
                        text.push_str(&chunk);
                    }
                }
                Event::CData(ref t) if data_depth > 0 => {
                    text.push_str(&String::from_utf8_lossy(t));
                }
                _ => {}
            }
        }
    }

    fn skip_subtree(
        &mut self,
        start: &quick_xml::events::BytesStart<'_>,
        skip_buf: &mut Vec<u8>,
    ) -> Result<(), ScanError> {
        skip_buf.clear();
        let name = start.name().as_ref().to_vec();
        let reader = self.iter.reader.as_mut().expect("reader opened above");
        reader
            .read_to_end_into(quick_xml::name::QName(&name), skip_buf)
            .map_err(|e| ScanError::Xml {
                path: self.infos[self.iter.sheet_id].name.clone(),
                offset: 0,
                message: e.to_string(),
            })?;
        Ok(())
    }

    fn sheet_name(&self) -> &str {
        &self.infos[self.iter.sheet_id].name
    }
}

/// Read `WorksheetOptions`: the `Visible` state text and whether a
/// `Selected` marker is present.
fn read_worksheet_options(
    reader: &mut Reader<BufReader<FlatReader>>,
    buf: &mut Vec<u8>,
) -> Result<(String, bool), OpenError> {
    let mut visible = String::new();
    let mut selected = false;
    let mut depth = 1usize;
    let mut in_visible = false;
    loop {
        buf.clear();
        let event = reader.read_event_into(buf).map_err(|e| OpenError::Xml {
            part: "workbook".to_string(),
            message: e.to_string(),
        })?;
        match event {
            Event::Eof => {
                return Err(OpenError::Xml {
                    part: "workbook".to_string(),
                    message: "unexpected end of file inside <WorksheetOptions>".to_string(),
                })
            }
            Event::Start(ref e) => {
                depth += 1;
                match e.local_name().as_ref() {
                    b"Visible" => in_visible = true,
                    b"Selected" => selected = true,
                    _ => {}
                }
            }
            Event::Empty(ref e) => {
                if e.local_name().as_ref() == b"Selected" {
                    selected = true;
                }
            }
            Event::End(_) => {
                in_visible = false;
                depth -= 1;
                if depth == 0 {
                    return Ok((visible, selected));
                }
            }
            Event::Text(ref t) if in_visible => {
                if let Ok(chunk) = t.unescape() {
                    visible.push_str(&chunk);
                }
            }
            _ => {}
        }
    }
}

/// Decode a UTF-16 document to UTF-8 and rewrite the XML prolog's
/// `encoding` attribute so the decoder accepts the transcoded bytes.
fn transcode_utf16(bytes: &[u8], little_endian: bool) -> Vec<u8> {
    let (text, _, _) = if little_endian {
        encoding_rs::UTF_16LE.decode(bytes)
    } else {
        encoding_rs::UTF_16BE.decode(bytes)
    };
    let mut text = text.into_owned();
    if let Some(prolog_end) = text.find("?>") {
        let lowered = text[..prolog_end].to_lowercase();
        if let Some(position) = lowered.find("utf-16") {
            text.replace_range(position..position + "utf-16".len(), "utf-8");
        }
    }
    text.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn utf16_transcoding_rewrites_the_prolog() {
        let source = "<?xml version=\"1.0\" encoding=\"UTF-16\"?><Workbook/>";
        let mut bytes = vec![0xFF, 0xFE];
        for unit in source.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let utf8 = transcode_utf16(&bytes, true);
        let text = String::from_utf8(utf8).unwrap();
        assert_eq!(
            text,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><Workbook/>"
        );
    }
}
