use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::OpenError;
use crate::scanner::{HideLevel, SheetInfo};

const SHEET_STATE_HIDDEN: &str = "hidden";
const SHEET_STATE_VERY_HIDDEN: &str = "veryHidden";

/// One worksheet entry from `xl/workbook.xml`.
pub(crate) struct WorkbookSheet {
    pub info: SheetInfo,
    /// Relationship id pointing at the worksheet part.
    pub rel_id: String,
}

pub(crate) struct WorkbookMeta {
    pub sheets: Vec<WorkbookSheet>,
    pub date1904: bool,
    /// `activeTab` clamped into the valid sheet range.
    pub selected: usize,
}

pub(crate) fn parse_workbook(xml: &str, part: &str) -> Result<WorkbookMeta, OpenError> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| OpenError::Xml {
        part: part.to_string(),
        message: e.to_string(),
    })?;

    let mut sheets = Vec::new();
    for sheet in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "sheet")
    {
        let hide_level = match sheet.attribute("state") {
            Some(SHEET_STATE_HIDDEN) => HideLevel::Hidden,
            Some(SHEET_STATE_VERY_HIDDEN) => HideLevel::VeryHidden,
            _ => HideLevel::Visible,
        };
        // The relationship id attribute is namespaced (`r:id`); match on the
        // local name so prefix choices don't matter.
        let rel_id = sheet
            .attributes()
            .find(|a| a.name() == "id")
            .map(|a| a.value().to_string())
            .unwrap_or_default();
        sheets.push(WorkbookSheet {
            info: SheetInfo {
                name: sheet.attribute("name").unwrap_or_default().to_string(),
                hide_level,
            },
            rel_id,
        });
    }

    let date1904 = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "workbookPr")
        .and_then(|n| n.attribute("date1904"))
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let mut selected = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "workbookView")
        .and_then(|n| n.attribute("activeTab"))
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    if selected >= sheets.len() {
        selected = sheets.len().saturating_sub(1);
    }

    Ok(WorkbookMeta {
        sheets,
        date1904,
        selected,
    })
}

/// Style data needed for formatting: workbook-defined format codes by id and
/// the `cellXfs` style-id to format-id vector.
#[derive(Default)]
pub(crate) struct StylesMeta {
    /// Indexed by format id; empty string means "no workbook override".
    pub custom_formats: Vec<String>,
    /// Indexed by style id.
    pub style_to_format: Vec<usize>,
}

pub(crate) fn parse_styles(xml: &str, part: &str) -> Result<StylesMeta, OpenError> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| OpenError::Xml {
        part: part.to_string(),
        message: e.to_string(),
    })?;
    let mut styles = StylesMeta::default();

    if let Some(num_fmts) = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "numFmts")
    {
        for num_fmt in num_fmts
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "numFmt")
        {
            let Some(id) = num_fmt
                .attribute("numFmtId")
                .and_then(|v| v.parse::<usize>().ok())
            else {
                continue;
            };
            let code = num_fmt.attribute("formatCode").unwrap_or_default();
            if styles.custom_formats.len() < id + 1 {
                styles.custom_formats.resize(id + 1, String::new());
            }
            styles.custom_formats[id] = code.to_string();
        }
    }

    if let Some(cell_xfs) = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "cellXfs")
    {
        for xf in cell_xfs
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "xf")
        {
            let format_id = xf
                .attribute("numFmtId")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);
            styles.style_to_format.push(format_id);
        }
    }

    Ok(styles)
}

/// Stream `xl/sharedStrings.xml`, concatenating the text children of each
/// `si` (rich-text runs included) into one table entry.
pub(crate) fn read_shared_strings(
    reader: impl BufRead,
    part: &str,
) -> Result<Vec<String>, OpenError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(false);

    let mut table = Vec::new();
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut text_depth = 0usize;
    loop {
        let event = xml.read_event_into(&mut buf).map_err(|e| OpenError::Xml {
            part: part.to_string(),
            message: e.to_string(),
        })?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => text_depth += 1,
                _ => {}
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"si" => table.push(std::mem::take(&mut current)),
                b"t" => text_depth = text_depth.saturating_sub(1),
                _ => {}
            },
            Event::Text(ref t) if text_depth > 0 => {
                let text = t.unescape().map_err(|e| OpenError::Xml {
                    part: part.to_string(),
                    message: e.to_string(),
                })?;
                current.push_str(&text);
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn workbook_metadata_covers_sheets_and_flags() {
        let xml = r#"<?xml version="1.0"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
          xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <workbookPr date1904="1"/>
  <bookViews><workbookView activeTab="2"/></bookViews>
  <sheets>
    <sheet name="Data" sheetId="1" r:id="rId1"/>
    <sheet name="Hidden" sheetId="2" state="hidden" r:id="rId2"/>
    <sheet name="Secret" sheetId="3" state="veryHidden" r:id="rId3"/>
  </sheets>
</workbook>"#;
        let meta = parse_workbook(xml, "xl/workbook.xml").unwrap();
        assert_eq!(meta.sheets.len(), 3);
        assert_eq!(meta.sheets[0].info.name, "Data");
        assert_eq!(meta.sheets[0].info.hide_level, HideLevel::Visible);
        assert_eq!(meta.sheets[1].info.hide_level, HideLevel::Hidden);
        assert_eq!(meta.sheets[2].info.hide_level, HideLevel::VeryHidden);
        assert_eq!(meta.sheets[2].rel_id, "rId3");
        assert!(meta.date1904);
        assert_eq!(meta.selected, 2);
    }

    #[test]
    fn active_tab_is_clamped() {
        let xml = r#"<workbook>
  <bookViews><workbookView activeTab="9"/></bookViews>
  <sheets><sheet name="Only" sheetId="1"/></sheets>
</workbook>"#;
        let meta = parse_workbook(xml, "xl/workbook.xml").unwrap();
        assert_eq!(meta.selected, 0);
    }

    #[test]
    fn styles_collect_custom_formats_and_xfs() {
        let xml = r#"<styleSheet>
  <numFmts count="1">
    <numFmt numFmtId="164" formatCode="0.000"/>
  </numFmts>
  <cellXfs count="3">
    <xf numFmtId="0"/>
    <xf numFmtId="164"/>
    <xf numFmtId="14"/>
  </cellXfs>
</styleSheet>"#;
        let styles = parse_styles(xml, "xl/styles.xml").unwrap();
        assert_eq!(styles.style_to_format, vec![0, 164, 14]);
        assert_eq!(styles.custom_formats[164], "0.000");
        assert_eq!(styles.custom_formats[14], "");
    }

    #[test]
    fn shared_strings_concatenate_rich_runs() {
        let xml = r#"<sst>
  <si><t>plain</t></si>
  <si><r><t>rich </t></r><r><t>text</t></r></si>
  <si><t xml:space="preserve"> spaced </t></si>
</sst>"#;
        let table = read_shared_strings(xml.as_bytes(), "xl/sharedStrings.xml").unwrap();
        assert_eq!(table, vec!["plain", "rich text", " spaced "]);
    }
}
