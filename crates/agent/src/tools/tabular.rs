//! Table analysis: interact_tabular
//!
//! Loads a CSV, TSV or XLSX attachment and answers one operation per call.
//! Workbooks contribute their first worksheet.
//! Numeric operations skip cells that do not parse as numbers (after
//! stripping `$`, `,` and `%`) and report how many were skipped.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::files::extension;
use super::math::number_value;
use super::xlsx::read_first_sheet;
use super::{parse_args, FileResolver, ParamKind, ToolDescriptor, ToolError, ToolPayload, ToolTrait};

const DEFAULT_HEAD_ROWS: usize = 5;
const DEFAULT_FILTER_ROWS: usize = 20;

/// In-memory table with a header row
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn parse(data: &[u8], delimiter: u8) -> Result<Self, ToolError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(data);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ToolError::Parse(format!("table header: {}", e)))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ToolError::Parse(format!("table row: {}", e)))?;
            let mut row: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }
        Ok(Self { headers, rows })
    }

    /// First row is the header; shorter rows are padded
    pub fn from_grid(grid: Vec<Vec<String>>) -> Result<Self, ToolError> {
        let mut grid = grid.into_iter();
        let headers: Vec<String> = grid
            .next()
            .ok_or_else(|| ToolError::Parse("table is empty".to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let rows = grid
            .map(|row| {
                let mut row: Vec<String> = row.iter().map(|c| c.trim().to_string()).collect();
                row.resize(headers.len(), String::new());
                row
            })
            .collect();
        Ok(Self { headers, rows })
    }

    pub async fn load(path: &Path) -> Result<Self, ToolError> {
        let delimiter = match extension(path).as_deref() {
            Some("csv") => b',',
            Some("tsv") | Some("tab") => b'\t',
            Some("xlsx") => {
                let data = tokio::fs::read(path).await?;
                return Self::from_grid(read_first_sheet(&data)?);
            }
            other => {
                return Err(ToolError::Unsupported(format!(
                    "table format '{}' (use csv, tsv or xlsx)",
                    other.unwrap_or("none")
                )))
            }
        };
        let data = tokio::fs::read(path).await?;
        Self::parse(&data, delimiter)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Exact header match first, then case-insensitive
    pub fn column_index(&self, name: &str) -> Result<usize, ToolError> {
        let name = name.trim();
        self.headers
            .iter()
            .position(|h| h == name)
            .or_else(|| self.headers.iter().position(|h| h.eq_ignore_ascii_case(name)))
            .ok_or_else(|| {
                ToolError::InvalidArguments(format!(
                    "no column '{}'; columns are: {}",
                    name,
                    self.headers.join(", ")
                ))
            })
    }

    fn row_object(&self, row: &[String]) -> Value {
        let map: Map<String, Value> = self
            .headers
            .iter()
            .zip(row)
            .map(|(h, c)| (h.clone(), json!(c)))
            .collect();
        Value::Object(map)
    }

    /// Parsed numbers of one column plus the count of skipped cells
    fn numbers(&self, col: usize) -> (Vec<f64>, usize) {
        let mut values = Vec::new();
        let mut skipped = 0;
        for row in &self.rows {
            match parse_number(&row[col]) {
                Some(n) => values.push(n),
                None => skipped += 1,
            }
        }
        (values, skipped)
    }
}

/// Lenient number parsing for spreadsheet-style cells
pub fn parse_number(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Aggregate {
    Sum,
    Mean,
    Min,
    Max,
}

fn aggregate(values: &[f64], agg: Aggregate) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(match agg {
        Aggregate::Sum => values.iter().sum(),
        Aggregate::Mean => values.iter().sum::<f64>() / values.len() as f64,
        Aggregate::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        Aggregate::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

#[derive(Deserialize)]
struct TabularArgs {
    file_path: String,
    operation: String,
    column: Option<String>,
    value: Option<Value>,
    n: Option<usize>,
}

fn cell_matches(cell: &str, value: &Value) -> bool {
    match value {
        Value::String(s) => cell.eq_ignore_ascii_case(s.trim()),
        Value::Number(n) => match (parse_number(cell), n.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        Value::Bool(b) => cell.eq_ignore_ascii_case(&b.to_string()),
        _ => false,
    }
}

fn require<'a>(field: &'a Option<String>, operation: &str) -> Result<&'a str, ToolError> {
    field.as_deref().ok_or_else(|| {
        ToolError::InvalidArguments(format!("operation '{}' needs a column", operation))
    })
}

/// Run one operation against a loaded table
pub fn apply_operation(
    table: &Table,
    operation: &str,
    column: Option<String>,
    value: Option<Value>,
    n: Option<usize>,
) -> Result<Value, ToolError> {
    let op = operation.trim().to_ascii_lowercase();
    match op.as_str() {
        "columns" => Ok(json!({"columns": table.headers(), "rows": table.len()})),
        "head" => {
            let rows: Vec<Value> = table
                .rows
                .iter()
                .take(n.unwrap_or(DEFAULT_HEAD_ROWS))
                .map(|r| table.row_object(r))
                .collect();
            Ok(json!({"rows": rows, "total_rows": table.len()}))
        }
        "describe" => {
            let mut columns = Map::new();
            for (i, header) in table.headers().iter().enumerate() {
                let (values, skipped) = table.numbers(i);
                let stats = if values.is_empty() {
                    let distinct: std::collections::HashSet<&str> =
                        table.rows.iter().map(|r| r[i].as_str()).collect();
                    json!({"type": "text", "distinct": distinct.len()})
                } else {
                    json!({
                        "type": "number",
                        "count": values.len(),
                        "skipped": skipped,
                        "mean": aggregate(&values, Aggregate::Mean).map(number_value),
                        "min": aggregate(&values, Aggregate::Min).map(number_value),
                        "max": aggregate(&values, Aggregate::Max).map(number_value),
                    })
                };
                columns.insert(header.clone(), stats);
            }
            Ok(json!({"rows": table.len(), "columns": columns}))
        }
        "count" => match (&column, &value) {
            (Some(col), Some(v)) => {
                let idx = table.column_index(col)?;
                let count = table.rows.iter().filter(|r| cell_matches(&r[idx], v)).count();
                Ok(json!({"count": count}))
            }
            _ => Ok(json!({"count": table.len()})),
        },
        "sum" | "mean" | "min" | "max" => {
            let agg = match op.as_str() {
                "sum" => Aggregate::Sum,
                "mean" => Aggregate::Mean,
                "min" => Aggregate::Min,
                _ => Aggregate::Max,
            };
            let idx = table.column_index(require(&column, &op)?)?;
            let (values, skipped) = table.numbers(idx);
            let result = aggregate(&values, agg).ok_or_else(|| {
                ToolError::Math(format!(
                    "column '{}' has no numeric values",
                    table.headers()[idx]
                ))
            })?;
            Ok(json!({
                "result": number_value(result),
                "counted": values.len(),
                "skipped": skipped,
            }))
        }
        "unique" => {
            let idx = table.column_index(require(&column, &op)?)?;
            let mut order = Vec::new();
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for row in &table.rows {
                let cell = row[idx].as_str();
                let count = counts.entry(cell).or_insert(0);
                if *count == 0 {
                    order.push(cell);
                }
                *count += 1;
            }
            let values: Vec<Value> = order
                .into_iter()
                .map(|v| json!({"value": v, "count": counts[v]}))
                .collect();
            Ok(json!({"unique": values}))
        }
        "filter" => {
            let idx = table.column_index(require(&column, &op)?)?;
            let value = value.ok_or_else(|| {
                ToolError::InvalidArguments("operation 'filter' needs a value".to_string())
            })?;
            let matching: Vec<&Vec<String>> = table
                .rows
                .iter()
                .filter(|r| cell_matches(&r[idx], &value))
                .collect();
            let rows: Vec<Value> = matching
                .iter()
                .take(n.unwrap_or(DEFAULT_FILTER_ROWS))
                .map(|r| table.row_object(r))
                .collect();
            Ok(json!({"matches": matching.len(), "rows": rows}))
        }
        other => Err(ToolError::InvalidArguments(format!(
            "unknown operation '{}'; use columns, head, describe, count, sum, mean, min, max, unique or filter",
            other
        ))),
    }
}

pub struct InteractTabularTool {
    files: FileResolver,
}

impl InteractTabularTool {
    pub fn new(files: FileResolver) -> Self {
        Self { files }
    }
}

#[async_trait]
impl ToolTrait for InteractTabularTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "interact_tabular",
            "Analyse a CSV, TSV or XLSX file. Operations: columns, head, describe, count, sum, mean, min, max, unique, filter.",
        )
        .param("file_path", ParamKind::String, "Path to the .csv, .tsv or .xlsx file")
        .param("operation", ParamKind::String, "Operation to run")
        .optional(
            "column",
            ParamKind::String,
            "Column for sum, mean, min, max, unique, filter and count",
        )
        .optional(
            "value",
            ParamKind::String,
            "Value to match for filter and count",
        )
        .optional("n", ParamKind::Integer, "Row limit for head and filter")
    }

    async fn execute(&self, args: Value) -> Result<ToolPayload, ToolError> {
        let args: TabularArgs = parse_args(args)?;
        let path = self.files.resolve(&args.file_path)?;
        debug!("{} on {:?}", args.operation, path);

        let table = Table::load(&path).await?;
        let result = apply_operation(&table, &args.operation, args.column, args.value, args.n)?;
        Ok(ToolPayload::Structured(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALES: &str = "\
Location,Burgers,Fries,Soda
Pinebrook,1594,\"$2,005\",1900
Wharvton,1983,2008,n/a
Sagrada,2019,1976,2036
Pinebrook,1600,1900,2001
";

    fn table() -> Table {
        Table::parse(SALES.as_bytes(), b',').unwrap()
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("$2,005"), Some(2005.0));
        assert_eq!(parse_number("12.5%"), Some(12.5));
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_columns_and_head() {
        let t = table();
        let v = apply_operation(&t, "columns", None, None, None).unwrap();
        assert_eq!(v["columns"], json!(["Location", "Burgers", "Fries", "Soda"]));
        assert_eq!(v["rows"], 4);

        let v = apply_operation(&t, "head", None, None, Some(1)).unwrap();
        assert_eq!(v["rows"][0]["Fries"], "$2,005");
        assert_eq!(v["total_rows"], 4);
    }

    #[test]
    fn test_sum_skips_non_numeric() {
        let t = table();
        let v = apply_operation(&t, "sum", Some("soda".to_string()), None, None).unwrap();
        assert_eq!(v["result"], 5937);
        assert_eq!(v["counted"], 3);
        assert_eq!(v["skipped"], 1);

        let v = apply_operation(&t, "sum", Some("Fries".to_string()), None, None).unwrap();
        assert_eq!(v["result"], 7889);
    }

    #[test]
    fn test_mean_min_max() {
        let t = table();
        let col = || Some("Burgers".to_string());
        assert_eq!(apply_operation(&t, "min", col(), None, None).unwrap()["result"], 1594);
        assert_eq!(apply_operation(&t, "max", col(), None, None).unwrap()["result"], 2019);
        assert_eq!(
            apply_operation(&t, "mean", col(), None, None).unwrap()["result"],
            1799
        );
    }

    #[test]
    fn test_unique_count_filter() {
        let t = table();
        let v = apply_operation(&t, "unique", Some("Location".to_string()), None, None).unwrap();
        assert_eq!(v["unique"][0], json!({"value": "Pinebrook", "count": 2}));
        assert_eq!(v["unique"].as_array().unwrap().len(), 3);

        let v = apply_operation(
            &t,
            "count",
            Some("Location".to_string()),
            Some(json!("pinebrook")),
            None,
        )
        .unwrap();
        assert_eq!(v["count"], 2);

        let v = apply_operation(
            &t,
            "filter",
            Some("Burgers".to_string()),
            Some(json!(2019)),
            None,
        )
        .unwrap();
        assert_eq!(v["matches"], 1);
        assert_eq!(v["rows"][0]["Location"], "Sagrada");
    }

    #[test]
    fn test_describe() {
        let v = apply_operation(&table(), "describe", None, None, None).unwrap();
        assert_eq!(v["columns"]["Location"]["type"], "text");
        assert_eq!(v["columns"]["Location"]["distinct"], 3);
        assert_eq!(v["columns"]["Soda"]["skipped"], 1);
    }

    #[test]
    fn test_errors() {
        let t = table();
        assert!(matches!(
            apply_operation(&t, "sum", None, None, None),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(apply_operation(&t, "sum", Some("Price".to_string()), None, None)
            .unwrap_err()
            .to_string()
            .contains("columns are: Location, Burgers, Fries, Soda"));
        assert!(matches!(
            apply_operation(&t, "pivot", None, None, None),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            apply_operation(&t, "sum", Some("Location".to_string()), None, None),
            Err(ToolError::Math(_))
        ));
    }

    #[tokio::test]
    async fn test_load_rejects_legacy_spreadsheets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.xls");
        std::fs::write(&path, b"\xD0\xCF\x11\xE0").unwrap();
        assert!(matches!(
            Table::load(&path).await,
            Err(ToolError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_load_corrupt_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.xlsx");
        std::fs::write(&path, b"PK").unwrap();
        assert!(matches!(Table::load(&path).await, Err(ToolError::Parse(_))));
    }

    #[test]
    fn test_from_grid_pads_rows() {
        let grid = vec![
            vec![" a ".to_string(), "b".to_string()],
            vec!["1".to_string()],
        ];
        let t = Table::from_grid(grid).unwrap();
        assert_eq!(t.headers(), ["a", "b"]);
        assert_eq!(t.len(), 1);
        assert!(matches!(Table::from_grid(Vec::new()), Err(ToolError::Parse(_))));
    }

    #[tokio::test]
    async fn test_tool_reads_xlsx() {
        use crate::tools::xlsx::tests::{workbook, SHARED, SHEET};

        let dir = tempfile::tempdir().unwrap();
        let data = workbook(&[
            ("xl/sharedStrings.xml", SHARED),
            ("xl/worksheets/sheet1.xml", SHEET),
        ]);
        std::fs::write(dir.path().join("menu.xlsx"), data).unwrap();

        let tool = InteractTabularTool::new(FileResolver::new(Some(dir.path().to_path_buf())));
        let payload = tool
            .execute(json!({"file_path": "menu.xlsx", "operation": "sum", "column": "sales"}))
            .await
            .unwrap();
        assert_eq!(
            payload,
            ToolPayload::Structured(json!({"result": 2008, "counted": 2, "skipped": 1}))
        );

        let payload = tool
            .execute(json!({"file_path": "menu.xlsx", "operation": "count", "column": "Open", "value": "TRUE"}))
            .await
            .unwrap();
        assert_eq!(payload, ToolPayload::Structured(json!({"count": 1})));
    }

    #[tokio::test]
    async fn test_tool_reads_tsv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("t.tsv"), "a\tb\n1\t2\n3\t4\n").unwrap();

        let tool = InteractTabularTool::new(FileResolver::new(Some(dir.path().to_path_buf())));
        let payload = tool
            .execute(json!({"file_path": "t.tsv", "operation": "sum", "column": "b"}))
            .await
            .unwrap();
        assert_eq!(
            payload,
            ToolPayload::Structured(json!({"result": 6, "counted": 2, "skipped": 0}))
        );
    }
}
