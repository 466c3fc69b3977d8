mod metadata;
mod package;

use std::io::BufReader;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tablescan_format::{
    locale, parse_number_format, CellFormatter, CellKind, Locale, ParsedNumberFormat,
};

use crate::a1::{parse_cell_range, parse_cell_ref};
use crate::error::{OpenError, ScanError};
use crate::scanner::SheetInfo;
use crate::xlsx::package::{MemberStream, Package};
use crate::xmlutil::attribute;

const DEFAULT_SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const DEFAULT_STYLES_PART: &str = "xl/styles.xml";
const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

/// Position of the decoder inside a worksheet part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Root,
    Worksheet,
    SheetData,
    Row,
    Cell,
    InlineString,
}

/// Streaming row reader for ZIP-packaged OOXML workbooks.
///
/// Workbook metadata (sheet list, shared strings, styles) loads eagerly;
/// sheet bodies stream lazily, one row per [`XlsxScanner::scan`].
pub struct XlsxScanner {
    package: Package,
    infos: Vec<SheetInfo>,
    sheet_parts: Vec<String>,
    selected: usize,
    shared_strings: Vec<String>,
    formats: FormatCache,
    formatter: CellFormatter,
    locale: &'static Locale,
    last_error: Option<ScanError>,
    iter: IterState,
}

impl std::fmt::Debug for XlsxScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XlsxScanner")
            .field("infos", &self.infos)
            .field("sheet_parts", &self.sheet_parts)
            .field("selected", &self.selected)
            .field("shared_strings", &self.shared_strings)
            .field("formats", &self.formats)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

struct IterState {
    sheet_id: usize,
    /// Row number the last `scan` accounted for, 1-based.
    emitted_row: u64,
    /// Row number most recently decoded from the part. Runs ahead of
    /// `emitted_row` when the source skips row numbers.
    scanned_row: u64,
    data: Vec<String>,
    /// Running column-capacity estimate for the row buffer.
    capacity: usize,
    segment: Segment,
    reader: Option<Reader<BufReader<MemberStream>>>,
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
        self.reader = None;
    }
}

impl XlsxScanner {
    pub fn open(path: impl AsRef<Path>) -> Result<XlsxScanner, OpenError> {
        let mut package = Package::open(path.as_ref())?;

        let rels_xml = read_required(&mut package, WORKBOOK_RELS_PART)?;
        let rels = package::parse_relationships(&rels_xml, WORKBOOK_RELS_PART)?;
        let mut shared_strings_part = DEFAULT_SHARED_STRINGS_PART.to_string();
        let mut styles_part = DEFAULT_STYLES_PART.to_string();
        let mut targets_by_id = Vec::new();
        for rel in &rels {
            let target = package::resolve_target(WORKBOOK_PART, &rel.target);
            // The relationship type URI ends in its kind (`.../styles`).
            let kind = rel.type_.rsplit('/').next().unwrap_or_default();
            if kind.eq_ignore_ascii_case("styles") {
                styles_part = target.clone();
            } else if kind.eq_ignore_ascii_case("sharedStrings") {
                shared_strings_part = target.clone();
            }
            targets_by_id.push((rel.id.clone(), target));
        }

        // Both parts are optional; a workbook without them simply has empty
        // tables.
        let shared_strings = match package.find(&shared_strings_part) {
            Some(_) => {
                let stream = package
                    .open_member_stream(&shared_strings_part)
                    .map_err(OpenError::Io)?;
                metadata::read_shared_strings(BufReader::new(stream), &shared_strings_part)?
            }
            None => Vec::new(),
        };
        let styles = match package.read_member(&styles_part) {
            Some(bytes) => {
                let xml = into_utf8(bytes?, &styles_part)?;
                metadata::parse_styles(&xml, &styles_part)?
            }
            None => metadata::StylesMeta::default(),
        };

        let workbook_xml = read_required(&mut package, WORKBOOK_PART)?;
        let workbook = metadata::parse_workbook(&workbook_xml, WORKBOOK_PART)?;

        let mut infos = Vec::with_capacity(workbook.sheets.len());
        let mut sheet_parts = Vec::with_capacity(workbook.sheets.len());
        for sheet in workbook.sheets {
            // A sheet with no resolvable part is not fatal here; selecting it
            // fails instead.
            let part = targets_by_id
                .iter()
                .find(|(id, _)| *id == sheet.rel_id)
                .map(|(_, target)| target.clone())
                .unwrap_or_default();
            infos.push(sheet.info);
            sheet_parts.push(part);
        }

        let default_locale = locale("en").expect("en locale is built in");
        let mut formatter = CellFormatter::new(default_locale);
        formatter.set_date1904(workbook.date1904);

        let mut scanner = XlsxScanner {
            package,
            infos,
            sheet_parts,
            selected: workbook.selected,
            shared_strings,
            formats: FormatCache::new(styles),
            formatter,
            locale: default_locale,
            last_error: None,
            iter: IterState::new(),
        };
        let _ = scanner.set_sheet_id(scanner.selected);
        Ok(scanner)
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
        if id >= self.sheet_parts.len() {
            return Err(ScanError::SheetOutOfRange(id));
        }
        if !self.package.contains(&self.sheet_parts[id]) {
            return Err(ScanError::SheetOpen {
                path: self.sheet_parts[id].clone(),
                message: "no such package member".to_string(),
            });
        }
        self.iter.sheet_id = id;
        Ok(())
    }

    pub fn set_locale(&mut self, tag: &str) -> Result<(), ScanError> {
        let locale = locale(tag).ok_or_else(|| ScanError::UnknownLocale(tag.to_string()))?;
        self.locale = locale;
        self.formatter.set_locale(locale);
        self.formats.invalidate();
        Ok(())
    }

    pub fn formatter_mut(&mut self) -> &mut CellFormatter {
        &mut self.formatter
    }

    /// Advance one row. `Ok(true)` means a row is available through
    /// [`XlsxScanner::scanned`]; `Ok(false)` is the end of the sheet.
    pub fn scan(&mut self) -> Result<bool, ScanError> {
        // While the decoded row runs ahead of the emitted counter the gap is
        // bridged with synthesized empty rows.
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

    /// Cells of the last emitted row. Empty while bridging a row-number gap.
    pub fn scanned(&self) -> &[String] {
        if self.iter.scanned_row > self.iter.emitted_row {
            return &[];
        }
        &self.iter.data
    }

    pub fn last_scan_error(&self) -> Option<&ScanError> {
        self.last_error.as_ref()
    }

    pub fn close(self) -> std::io::Result<()> {
        Ok(())
    }

    fn sheet_part(&self) -> &str {
        &self.sheet_parts[self.iter.sheet_id]
    }

    fn ensure_reader(&mut self) -> Result<(), ScanError> {
        if self.iter.reader.is_none() {
            let part = self.sheet_parts[self.iter.sheet_id].clone();
            let stream = self
                .package
                .open_member_stream(&part)
                .map_err(|e| ScanError::SheetOpen {
                    path: part.clone(),
                    message: e.to_string(),
                })?;
            let mut reader = Reader::from_reader(BufReader::new(stream));
            reader.config_mut().trim_text(false);
            self.iter.reader = Some(reader);
        }
        Ok(())
    }

    /// Drive the token stream until a row boundary or the end of the sheet.
    fn scan_row(&mut self) -> Result<bool, ScanError> {
        self.ensure_reader()?;

        let mut buf = Vec::new();
        let mut skip_buf = Vec::new();
        // Per-cell transients; a cell never crosses a `scan` boundary.
        let mut cell_text = String::new();
        let mut cell_type = String::new();
        let mut cell_style: i64 = -1;
        let mut cell_column: usize = 0;
        let mut capturing_value = false;
        let mut capturing_inline = false;

        loop {
            buf.clear();
            let event = {
                let reader = self.iter.reader.as_mut().expect("reader opened above");
                match reader.read_event_into(&mut buf) {
                    Ok(event) => event,
                    Err(e) => return Err(self.fail_resetting(e.to_string())),
                }
            };

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
                            if name.as_ref() == b"worksheet" && !empty {
                                self.iter.segment = Segment::Worksheet;
                            } else if !empty {
                                self.skip_subtree(e, &mut skip_buf)?;
                            }
                        }
                        Segment::Worksheet => {
                            if name.as_ref() == b"sheetData" && !empty {
                                self.iter.segment = Segment::SheetData;
                            } else {
                                if name.as_ref() == b"dimension" {
                                    if let Some(reference) = attribute(e, b"ref") {
                                        if let Ok((_, (max_col, _))) = parse_cell_range(&reference)
                                        {
                                            self.iter.capacity = max_col;
                                        }
                                    }
                                }
                                if !empty {
                                    self.skip_subtree(e, &mut skip_buf)?;
                                }
                            }
                        }
                        Segment::SheetData => {
                            if name.as_ref() == b"row" {
                                self.iter.data = Vec::with_capacity(self.iter.capacity);
                                match attribute(e, b"r") {
                                    Some(value) => {
                                        let number: u64 = value.trim().parse().map_err(|_| {
                                            ScanError::RowNumberNotInteger {
                                                path: self.sheet_part().to_string(),
                                                value: value.to_string(),
                                            }
                                        })?;
                                        if number <= self.iter.emitted_row {
                                            return Err(ScanError::RowNumbersNotIncreasing {
                                                path: self.sheet_part().to_string(),
                                                previous: self.iter.emitted_row,
                                                current: number,
                                            });
                                        }
                                        self.iter.scanned_row = number;
                                    }
                                    None => self.iter.scanned_row = self.iter.emitted_row + 1,
                                }
                                if empty {
                                    // A self-closed row is an empty row.
                                    return Ok(true);
                                }
                                self.iter.segment = Segment::Row;
                            } else if !empty {
                                self.skip_subtree(e, &mut skip_buf)?;
                            }
                        }
                        Segment::Row => {
                            if name.as_ref() == b"c" {
                                cell_text.clear();
                                cell_type = attribute(e, b"t").unwrap_or_default();
                                cell_style = attribute(e, b"s")
                                    .and_then(|s| s.trim().parse().ok())
                                    .unwrap_or(-1);
                                // A cell without a usable coordinate, or one
                                // that disagrees with the row number, is
                                // skipped.
                                let coords = attribute(e, b"r")
                                    .and_then(|r| parse_cell_ref(&r).ok())
                                    .filter(|(_, row)| *row == self.iter.scanned_row);
                                match coords {
                                    Some((column, _)) => {
                                        cell_column = column;
                                        if column > self.iter.capacity {
                                            self.iter.capacity = column;
                                        }
                                        if empty {
                                            self.finish_cell(
                                                &mut cell_text,
                                                &cell_type,
                                                cell_style,
                                                cell_column,
                                            );
                                        } else {
                                            self.iter.segment = Segment::Cell;
                                        }
                                    }
                                    None => {
                                        if !empty {
                                            self.skip_subtree(e, &mut skip_buf)?;
                                        }
                                    }
                                }
                            } else if !empty {
                                self.skip_subtree(e, &mut skip_buf)?;
                            }
                        }
                        Segment::Cell => {
                            if name.as_ref() == b"is" && cell_type == "inlineStr" && !empty {
                                self.iter.segment = Segment::InlineString;
                            } else if name.as_ref() == b"v" && cell_type != "inlineStr" {
                                if empty {
                                    // Nothing to capture.
                                } else {
                                    capturing_value = true;
                                }
                            } else if !empty {
                                self.skip_subtree(e, &mut skip_buf)?;
                            }
                        }
                        Segment::InlineString => {
                            if name.as_ref() == b"r" && !empty {
                                // Rich-text run: descend and take its text.
                            } else if name.as_ref() == b"t" && !empty {
                                capturing_inline = true;
                            } else if !empty {
                                self.skip_subtree(e, &mut skip_buf)?;
                            }
                        }
                    }
                }

                Event::Text(ref t) if capturing_value || capturing_inline => {
                    match t.unescape() {
                        Ok(text) => cell_text.push_str(&text),
                        Err(e) => return Err(self.fail_resetting(e.to_string())),
                    }
                }

                Event::CData(ref t) if capturing_value || capturing_inline => {
                    cell_text.push_str(&String::from_utf8_lossy(t));
                }

                Event::End(ref e) => {
                    let name = e.local_name();
                    match self.iter.segment {
                        Segment::Worksheet if name.as_ref() == b"worksheet" => {
                            self.iter.segment = Segment::Root;
                        }
                        Segment::SheetData if name.as_ref() == b"sheetData" => {
                            self.iter.segment = Segment::Worksheet;
                        }
                        Segment::Row if name.as_ref() == b"row" => {
                            self.iter.segment = Segment::SheetData;
                            return Ok(true);
                        }
                        Segment::Cell => {
                            if name.as_ref() == b"v" {
                                if capturing_value {
                                    capturing_value = false;
                                    // Shared-string cells hold a table index.
                                    if cell_type == "s" {
                                        let resolved = match cell_text
                                            .trim_matches(' ')
                                            .parse::<usize>()
                                        {
                                            Ok(index) => self
                                                .shared_strings
                                                .get(index)
                                                .cloned()
                                                .unwrap_or_default(),
                                            // Not an integer: keep the text.
                                            Err(_) => cell_text.clone(),
                                        };
                                        cell_text = resolved;
                                    }
                                }
                            } else if name.as_ref() == b"c" {
                                self.iter.segment = Segment::Row;
                                self.finish_cell(
                                    &mut cell_text,
                                    &cell_type,
                                    cell_style,
                                    cell_column,
                                );
                            }
                        }
                        Segment::InlineString => {
                            if name.as_ref() == b"t" {
                                capturing_inline = false;
                            } else if name.as_ref() == b"is" {
                                self.iter.segment = Segment::Cell;
                            }
                        }
                        _ => {}
                    }
                }

                _ => {}
            }
        }
    }

    /// Build a scan error at the current decoder position and reset the
    /// sheet stream so the next `scan` starts over.
    fn fail_resetting(&mut self, message: String) -> ScanError {
        let offset = self
            .iter
            .reader
            .as_ref()
            .map(|r| r.buffer_position() as u64)
            .unwrap_or(0);
        let err = ScanError::Xml {
            path: self.sheet_part().to_string(),
            offset,
            message,
        };
        let sheet = self.iter.sheet_id;
        let _ = self.set_sheet_id(sheet);
        err
    }

    /// Format the finished cell and deposit it at its declared column,
    /// padding earlier unclaimed slots with empty strings.
    fn finish_cell(&mut self, cell_text: &mut String, cell_type: &str, style: i64, column: usize) {
        let parsed = self.formats.resolve(style, self.locale);
        let kind = CellKind::from_tag(cell_type);
        // Rendering errors are non-fatal; the best-effort string stands.
        let (value, _) = self.formatter.format_value(cell_text, kind, parsed);
        cell_text.clear();

        let data = &mut self.iter.data;
        if data.len() >= column {
            data[column - 1] = value;
        } else {
            while data.len() < column - 1 {
                data.push(String::new());
            }
            data.push(value);
        }
    }

    fn skip_subtree(
        &mut self,
        start: &BytesStart<'_>,
        skip_buf: &mut Vec<u8>,
    ) -> Result<(), ScanError> {
        skip_buf.clear();
        let name = start.name().as_ref().to_vec();
        let reader = self.iter.reader.as_mut().expect("reader opened above");
        reader
            .read_to_end_into(quick_xml::name::QName(&name), skip_buf)
            .map_err(|e| ScanError::Xml {
                path: self.sheet_parts[self.iter.sheet_id].clone(),
                offset: reader.buffer_position() as u64,
                message: e.to_string(),
            })?;
        Ok(())
    }
}

fn read_required(package: &mut Package, part: &str) -> Result<String, OpenError> {
    match package.read_member(part) {
        Some(bytes) => into_utf8(bytes?, part),
        None => Err(OpenError::MissingPart(part.to_string())),
    }
}

fn into_utf8(bytes: Vec<u8>, part: &str) -> Result<String, OpenError> {
    String::from_utf8(bytes).map_err(|e| OpenError::Xml {
        part: part.to_string(),
        message: e.to_string(),
    })
}

/// Parsed number formats keyed by style id.
///
/// Resolution is lazy: a style id is parsed once and cached; switching
/// locales invalidates the cache wholesale because the built-in table and
/// system formats are locale data.
#[derive(Debug)]
struct FormatCache {
    custom_formats: Vec<String>,
    style_to_format: Vec<usize>,
    parsed: Vec<Option<ParsedNumberFormat>>,
}

impl FormatCache {
    fn new(styles: metadata::StylesMeta) -> Self {
        FormatCache {
            custom_formats: styles.custom_formats,
            style_to_format: styles.style_to_format,
            parsed: Vec::new(),
        }
    }

    fn invalidate(&mut self) {
        self.parsed.clear();
    }

    /// Resolve a style id to its parsed number format, falling back to style
    /// 0 for out-of-range ids and to the locale's built-in table when the
    /// workbook supplies no override.
    fn resolve(&mut self, style_id: i64, locale: &'static Locale) -> &ParsedNumberFormat {
        if self.style_to_format.is_empty() {
            // A workbook without cellXfs still needs a default style.
            self.style_to_format.push(0);
        }
        if self.custom_formats.is_empty() {
            self.custom_formats = vec![String::new(); locale.builtin_formats.len()];
        }
        let style = if style_id < 0 || style_id as usize >= self.style_to_format.len() {
            0
        } else {
            style_id as usize
        };
        if self.parsed.len() < style + 1 {
            self.parsed.resize(style + 1, None);
        }
        if self.parsed[style].is_none() {
            let mut format_id = self.style_to_format[style];
            if format_id >= self.custom_formats.len() {
                format_id = 0;
            }
            let mut code = if format_id < locale.builtin_formats.len()
                && self.custom_formats[format_id].is_empty()
            {
                locale.builtin_formats[format_id].to_string()
            } else {
                self.custom_formats[format_id].clone()
            };
            // `[$...]`-prefixed codes are either a known system format or an
            // annotation to drop.
            if code.starts_with("[$") {
                if let Some(close) = code.find(']') {
                    let token = &code[..=close];
                    match locale
                        .system_formats
                        .iter()
                        .find(|(candidate, _)| *candidate == token)
                    {
                        Some((_, system)) => code = system.to_string(),
                        None => code = code[close + 1..].to_string(),
                    }
                }
            }
            self.parsed[style] = Some(parse_number_format(&code));
        }
        self.parsed[style].as_ref().expect("filled above")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cache(custom: &[(usize, &str)], xfs: &[usize]) -> FormatCache {
        let mut styles = metadata::StylesMeta {
            custom_formats: Vec::new(),
            style_to_format: xfs.to_vec(),
        };
        for (id, code) in custom {
            if styles.custom_formats.len() < id + 1 {
                styles.custom_formats.resize(id + 1, String::new());
            }
            styles.custom_formats[*id] = code.to_string();
        }
        FormatCache::new(styles)
    }

    #[test]
    fn style_resolution_prefers_workbook_overrides() {
        let en = locale("en").unwrap();
        let mut formats = cache(&[(164, "0.000")], &[0, 164]);
        assert_eq!(formats.resolve(1, en).code, "0.000");
        // Format id 0 has no override; the built-in wins.
        assert_eq!(formats.resolve(0, en).code, "general");
    }

    #[test]
    fn out_of_range_styles_fall_back_to_style_zero() {
        let en = locale("en").unwrap();
        let mut formats = cache(&[], &[2]);
        // Style id -1 and 99 both resolve like style 0, whose format id is 2.
        assert_eq!(formats.resolve(-1, en).code, "0.00");
        assert_eq!(formats.resolve(99, en).code, "0.00");
    }

    #[test]
    fn system_format_tokens_substitute_the_locale_pattern() {
        let en = locale("en").unwrap();
        let mut formats = cache(&[(165, "[$-F800]")], &[165]);
        assert_eq!(formats.resolve(0, en).code, "dddd, mmmm dd, yyyy");
        // Unknown bracket annotations are dropped instead.
        let mut formats = cache(&[(165, "[$USD-409]0.00")], &[165]);
        assert_eq!(formats.resolve(0, en).code, "0.00");
    }

    #[test]
    fn empty_style_tables_still_resolve() {
        let en = locale("en").unwrap();
        let mut formats = cache(&[], &[]);
        assert_eq!(formats.resolve(0, en).code, "general");
    }

    #[test]
    fn locale_change_invalidates_cached_formats() {
        let en = locale("en").unwrap();
        let ru = locale("ru").unwrap();
        let mut formats = cache(&[], &[14]);
        assert_eq!(formats.resolve(0, en).code, "m/d/yyyy");
        formats.invalidate();
        assert_eq!(formats.resolve(0, ru).code, "dd.mm.yyyy");
    }
}
