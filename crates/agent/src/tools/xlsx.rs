//! Minimal .xlsx reader
//!
//! Reads the cell grid of the first worksheet straight from the OOXML
//! parts. Shared strings, inline strings, booleans and plain values are
//! supported; formulas contribute their cached value.

use std::io::{Cursor, Read};
use std::sync::LazyLock;

use regex::Regex;
use zip::ZipArchive;

use super::{decode_entities, ToolError};

const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const FIRST_SHEET: &str = "xl/worksheets/sheet1.xml";

static SI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<si>(.*?)</si>").expect("valid shared string regex"));
static TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<t\b[^>]*>(.*?)</t>").expect("valid text regex"));
static ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<row\b[^>]*?(?:/>|>(.*?)</row>)").expect("valid row regex")
});
static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<c\b([^>]*?)(?:/>|>(.*?)</c>)").expect("valid cell regex"));
static REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\br="([A-Z]+)[0-9]+""#).expect("valid reference regex"));
static TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bt="([A-Za-z]+)""#).expect("valid type regex"));
static VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<v>(.*?)</v>").expect("valid value regex"));

fn parse_err(what: &str, e: impl std::fmt::Display) -> ToolError {
    ToolError::Parse(format!("xlsx {}: {}", what, e))
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String, ToolError> {
    let mut file = archive.by_name(name).map_err(|e| parse_err(name, e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| parse_err(name, e))?;
    Ok(content)
}

/// Concatenated `<t>` runs of one fragment
fn text_runs(fragment: &str) -> String {
    let joined: String = TEXT_RE
        .captures_iter(fragment)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();
    decode_entities(&joined)
}

/// Zero-based column index of a reference like `AB12`
fn column_index(letters: &str) -> usize {
    letters
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize)
        - 1
}

fn parse_shared_strings(xml: &str) -> Vec<String> {
    SI_RE
        .captures_iter(xml)
        .map(|c| c.get(1).map(|m| text_runs(m.as_str())).unwrap_or_default())
        .collect()
}

fn cell_value(attrs: &str, body: &str, shared: &[String]) -> Result<String, ToolError> {
    let kind = TYPE_RE
        .captures(attrs)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or("n");
    if kind == "inlineStr" {
        return Ok(text_runs(body));
    }

    let raw = match VALUE_RE.captures(body).and_then(|c| c.get(1)) {
        Some(m) => decode_entities(m.as_str()),
        None => return Ok(String::new()),
    };
    match kind {
        "s" => {
            let idx: usize = raw
                .trim()
                .parse()
                .map_err(|e| parse_err("shared string index", e))?;
            shared
                .get(idx)
                .cloned()
                .ok_or_else(|| parse_err("shared string index", idx))
        }
        "b" => Ok(if raw.trim() == "1" { "TRUE" } else { "FALSE" }.to_string()),
        _ => Ok(raw),
    }
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, ToolError> {
    let mut grid = Vec::new();
    for row in ROW_RE.captures_iter(xml) {
        let body = row.get(1).map(|m| m.as_str()).unwrap_or("");
        let mut cells: Vec<String> = Vec::new();
        for cell in CELL_RE.captures_iter(body) {
            let attrs = cell.get(1).map(|m| m.as_str()).unwrap_or("");
            let content = cell.get(2).map(|m| m.as_str()).unwrap_or("");
            let col = REF_RE
                .captures(attrs)
                .and_then(|c| c.get(1))
                .map(|m| column_index(m.as_str()))
                .unwrap_or(cells.len());
            if cells.len() <= col {
                cells.resize(col + 1, String::new());
            }
            cells[col] = cell_value(attrs, content, shared)?;
        }
        grid.push(cells);
    }
    Ok(grid)
}

/// Cell grid of the first worksheet, one `Vec` per row
pub(crate) fn read_first_sheet(data: &[u8]) -> Result<Vec<Vec<String>>, ToolError> {
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|e| parse_err("archive", e))?;

    let mut sheets: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(String::from)
        .collect();
    sheets.sort();
    let sheet = if sheets.iter().any(|n| n == FIRST_SHEET) {
        FIRST_SHEET.to_string()
    } else {
        sheets
            .into_iter()
            .next()
            .ok_or_else(|| ToolError::Parse("xlsx workbook has no worksheets".to_string()))?
    };

    let shared = if archive.file_names().any(|n| n == SHARED_STRINGS) {
        parse_shared_strings(&read_entry(&mut archive, SHARED_STRINGS)?)
    } else {
        Vec::new()
    };
    let xml = read_entry(&mut archive, &sheet)?;
    parse_sheet(&xml, &shared)
}
