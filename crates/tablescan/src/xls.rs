use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use calamine::{Data, Range, Reader as _, SheetVisible, Xls};
use tablescan_format::locale;

use crate::error::{OpenError, ScanError};
use crate::scanner::{HideLevel, SheetInfo};

/// Row reader for legacy OLE2 binary workbooks, adapted over the `calamine`
/// decoder.
///
/// The decoder owns value decoding on this path; cells surface as
/// best-effort display text and the scanner formatter is not available.
pub struct XlsScanner {
    workbook: Xls<BufReader<File>>,
    infos: Vec<SheetInfo>,
    names: Vec<String>,
    last_error: Option<ScanError>,
    sheet_id: usize,
    /// Row number the last `scan` accounted for, 1-based.
    emitted_row: u64,
    data: Vec<String>,
    /// Decoded cells of the current sheet, loaded on the first `scan` after
    /// a sheet switch.
    range: Option<Range<Data>>,
}

impl std::fmt::Debug for XlsScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XlsScanner")
            .field("infos", &self.infos)
            .field("names", &self.names)
            .field("last_error", &self.last_error)
            .field("sheet_id", &self.sheet_id)
            .field("emitted_row", &self.emitted_row)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl XlsScanner {
    pub fn open(path: impl AsRef<Path>) -> Result<XlsScanner, OpenError> {
        let file = File::open(path.as_ref())?;
        let workbook =
            Xls::new(BufReader::new(file)).map_err(|e| OpenError::Legacy(e.to_string()))?;

        let mut infos = Vec::new();
        let mut names = Vec::new();
        for sheet in workbook.sheets_metadata() {
            infos.push(SheetInfo {
                name: sheet.name.clone(),
                hide_level: match sheet.visible {
                    SheetVisible::Hidden => HideLevel::Hidden,
                    SheetVisible::VeryHidden => HideLevel::VeryHidden,
                    _ => HideLevel::Visible,
                },
            });
            names.push(sheet.name.clone());
        }

        Ok(XlsScanner {
            workbook,
            infos,
            names,
            last_error: None,
            sheet_id: 0,
            emitted_row: 0,
            data: Vec::new(),
            range: None,
        })
    }

    pub fn sheets(&self) -> &[SheetInfo] {
        &self.infos
    }

    pub fn current_sheet_id(&self) -> usize {
        self.sheet_id
    }

    pub fn set_sheet_id(&mut self, id: usize) -> Result<(), ScanError> {
        self.last_error = None;
        self.emitted_row = 0;
        self.data = Vec::new();
        self.range = None;
        if id >= self.names.len() {
            return Err(ScanError::SheetOutOfRange(id));
        }
        self.sheet_id = id;
        Ok(())
    }

    /// The locale only affects formatting, which the external decoder owns
    /// on this path; the tag is still validated.
    pub fn set_locale(&mut self, tag: &str) -> Result<(), ScanError> {
        locale(tag)
            .map(|_| ())
            .ok_or_else(|| ScanError::UnknownLocale(tag.to_string()))
    }

    pub fn scan(&mut self) -> Result<bool, ScanError> {
        match self.scan_row() {
            Ok(advanced) => {
                if advanced {
                    self.emitted_row += 1;
                }
                self.last_error = None;
                Ok(advanced)
            }
            Err(err) => {
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    pub fn scanned(&self) -> &[String] {
        &self.data
    }

    pub fn last_scan_error(&self) -> Option<&ScanError> {
        self.last_error.as_ref()
    }

    pub fn close(self) -> io::Result<()> {
        Ok(())
    }

    fn scan_row(&mut self) -> Result<bool, ScanError> {
        if self.range.is_none() {
            let name = self.names[self.sheet_id].clone();
            let range = self
                .workbook
                .worksheet_range(&name)
                .map_err(|e| ScanError::SheetOpen {
                    path: name,
                    message: e.to_string(),
                })?;
            self.range = Some(range);
        }
        let range = self.range.as_ref().expect("loaded above");

        // 0-based absolute index of the row to decode.
        let row_index = self.emitted_row;
        let Some((start_row, start_col)) = range.start() else {
            // An empty sheet has no rows at all.
            return Ok(false);
        };
        let (end_row, end_col) = range.end().unwrap_or((start_row, start_col));
        if row_index > u64::from(end_row) {
            return Ok(false);
        }

        self.data.clear();
        if row_index < u64::from(start_row) {
            // Leading rows before the decoded range are empty.
            return Ok(true);
        }

        // Columns left of the range's first column pad with empty strings so
        // cells land at their true positions.
        self.data.reserve(end_col as usize + 1);
        for _ in 0..start_col {
            self.data.push(String::new());
        }
        for column in start_col..=end_col {
            let value = range
                .get_value((row_index as u32, column))
                .map(display_text)
                .unwrap_or_default();
            self.data.push(value);
        }
        Ok(true)
    }
}

/// Best-effort display text for a decoded cell value.
fn display_text(value: &Data) -> String {
    match value {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Float(number) => format!("{number}"),
        Data::Int(number) => number.to_string(),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::Error(error) => error.to_string(),
        Data::DateTime(datetime) => match datetime.as_datetime() {
            Some(civil) => civil.to_string(),
            None => datetime.as_f64().to_string(),
        },
        Data::DateTimeIso(text) | Data::DurationIso(text) => text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decoded_values_render_as_display_text() {
        assert_eq!(display_text(&Data::Empty), "");
        assert_eq!(display_text(&Data::String("txt".to_string())), "txt");
        assert_eq!(display_text(&Data::Float(1.5)), "1.5");
        assert_eq!(display_text(&Data::Int(-3)), "-3");
        assert_eq!(display_text(&Data::Bool(true)), "TRUE");
        assert_eq!(display_text(&Data::Bool(false)), "FALSE");
    }
}
