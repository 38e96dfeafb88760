//! Spreadsheet adapter - renders the first worksheet as CSV text
//!
//! The delimited extractor does the actual work; this module only turns
//! typed cells into the strings a bank CSV export would contain.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use super::delimited;
use crate::domain::result::{Error, Result};
use crate::domain::RawTransactionCandidate;

/// Extract candidates from the first worksheet of a workbook
pub fn extract(path: &Path) -> Result<Vec<RawTransactionCandidate>> {
    let text = to_delimited_text(path)?;
    delimited::extract(&text)
}

/// Render the first worksheet as comma-separated text
pub fn to_delimited_text(path: &Path) -> Result<String> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::UnsupportedFormat(format!("could not open workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::no_transactions("spreadsheet", "The workbook has no worksheets."))?
        .map_err(|e| Error::Other(format!("could not read worksheet: {}", e)))?;

    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
    for row in range.rows() {
        let cells: Vec<String> = row.iter().map(cell_to_string).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        writer
            .write_record(&cells)
            .map_err(|e| Error::Other(format!("could not render worksheet: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Other(format!("could not render worksheet: {}", e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Cell value as it would appear in a text export
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => format_float(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| format_float(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{:.2}", f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    use calamine::{ExcelDateTime, ExcelDateTimeType};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use crate::domain::Direction;

    const SHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    /// Write a single-sheet xlsx whose sheetData is `rows`.
    /// Style index 1 is the built-in short date format (numFmtId 14).
    fn write_workbook(path: &Path, rows: &str) {
        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#
                    .to_string(),
            ),
            (
                "_rels/.rels",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="{}/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#,
                    REL_NS
                ),
            ),
            (
                "xl/workbook.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="{}" xmlns:r="{}"><sheets><sheet name="Statement" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
                    SHEET_NS, REL_NS
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="{rel}/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="{rel}/styles" Target="styles.xml"/>
</Relationships>"#,
                    rel = REL_NS
                ),
            ),
            (
                "xl/styles.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="{}"><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/></cellXfs></styleSheet>"#,
                    SHEET_NS
                ),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="{}"><sheetData>{}</sheetData></worksheet>"#,
                    SHEET_NS, rows
                ),
            ),
        ];

        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, body) in parts {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn text_cell(cell: &str, text: &str) -> String {
        format!(r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#, cell, text)
    }

    fn number_cell(cell: &str, value: &str) -> String {
        format!(r#"<c r="{}"><v>{}</v></c>"#, cell, value)
    }

    fn date_cell(cell: &str, serial: u32) -> String {
        format!(r#"<c r="{}" s="1"><v>{}</v></c>"#, cell, serial)
    }

    #[test]
    fn test_cell_rendering() {
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::String("  Coffee ".to_string())), "Coffee");
        assert_eq!(cell_to_string(&Data::Float(150.0)), "150");
        assert_eq!(cell_to_string(&Data::Float(12.5)), "12.50");
        assert_eq!(cell_to_string(&Data::Int(-3)), "-3");
        assert_eq!(
            cell_to_string(&Data::DateTime(ExcelDateTime::new(
                45292.0,
                ExcelDateTimeType::DateTime,
                false
            ))),
            "2024-01-01"
        );
    }

    #[test]
    fn test_first_worksheet_goes_through_delimited_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jan.xlsx");
        let rows = [
            format!(
                r#"<row r="1">{}{}{}{}</row>"#,
                text_cell("A1", "Date"),
                text_cell("B1", "Description"),
                text_cell("C1", "Debit"),
                text_cell("D1", "Credit")
            ),
            format!(
                r#"<row r="2">{}{}{}{}</row>"#,
                text_cell("A2", "01-01-2024"),
                text_cell("B2", "Coffee Shop"),
                number_cell("C2", "150.00"),
                number_cell("D2", "0")
            ),
            // Native date cell, 45293 is 2024-01-02
            format!(
                r#"<row r="3">{}{}{}{}</row>"#,
                date_cell("A3", 45293),
                text_cell("B3", "Salary"),
                number_cell("C3", "0"),
                number_cell("D3", "5000")
            ),
        ]
        .concat();
        write_workbook(&path, &rows);

        let text = to_delimited_text(&path).unwrap();
        assert!(text.contains("2024-01-02,Salary"), "rendered: {}", text);

        let candidates = extract(&path).unwrap();
        assert_eq!(candidates.len(), 2);

        let coffee = &candidates[0];
        assert_eq!(coffee.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(coffee.description, "Coffee Shop");
        assert_eq!(coffee.amount, Decimal::new(15000, 2));
        assert_eq!(coffee.direction, Direction::Outflow);

        let salary = &candidates[1];
        assert_eq!(salary.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(salary.amount, Decimal::new(500000, 2));
        assert_eq!(salary.direction, Direction::Inflow);
    }

    #[test]
    fn test_unreadable_workbook_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"PK\x03\x04 not really a zip").unwrap();
        let err = extract(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }
}
