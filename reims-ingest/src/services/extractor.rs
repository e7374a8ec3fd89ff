//! Text and table extraction
//!
//! Dispatches on file kind:
//! - **PDF**: all page text concatenated, then a per-document-type set of
//!   named regexes pulls line-item amounts ("Total Assets: $1,234") into a
//!   flat `name → f64` map. Lines that match nothing are dropped.
//! - **CSV / Excel**: first sheet (or the CSV) loaded as rows keyed by the
//!   header row, with row/column counts and the columns whose headers look
//!   property-related.
//!
//! Everything here is synchronous and CPU bound; async callers should run it
//! under `spawn_blocking`.

use calamine::{open_workbook_auto, Data, Reader};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use reims_common::{DocumentType, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Header keywords that mark a column as property-related
const PROPERTY_COLUMN_KEYWORDS: &[&str] = &[
    "property", "address", "unit", "suite", "tenant", "rent", "sqft", "sq ft", "square",
    "occupancy", "lease",
];

/// Physical file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Csv,
    Excel,
    Unknown,
}

/// Determine the file kind from extension, then magic bytes, then the
/// declared content type
pub fn detect_file_kind(path: &Path, content_type: Option<&str>) -> FileKind {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match by_extension.as_deref() {
        Some("pdf") => return FileKind::Pdf,
        Some("csv") => return FileKind::Csv,
        Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => return FileKind::Excel,
        _ => {}
    }

    if let Ok(Some(kind)) = infer::get_from_path(path) {
        if let Some(k) = kind_from_mime(kind.mime_type()) {
            return k;
        }
    }

    content_type.and_then(kind_from_mime).unwrap_or(FileKind::Unknown)
}

fn kind_from_mime(mime: &str) -> Option<FileKind> {
    match mime {
        "application/pdf" => Some(FileKind::Pdf),
        "text/csv" | "application/csv" => Some(FileKind::Csv),
        "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        | "application/vnd.oasis.opendocument.spreadsheet" => Some(FileKind::Excel),
        _ => None,
    }
}

/// Table loaded from a CSV or spreadsheet
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TabularData {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
    pub records: Vec<Map<String, Value>>,
    pub property_columns: Vec<String>,
}

/// Result of running an extractor over one file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Extraction {
    PdfText {
        text: String,
        metrics: BTreeMap<String, f64>,
    },
    Tabular(TabularData),
    Unsupported {
        reason: String,
    },
}

impl Extraction {
    /// Value stored in `extracted_data.extraction_kind`
    pub fn kind(&self) -> &'static str {
        match self {
            Extraction::PdfText { .. } => "pdf_text",
            Extraction::Tabular(_) => "tabular",
            Extraction::Unsupported { .. } => "unsupported",
        }
    }

    pub fn metrics(&self) -> BTreeMap<String, f64> {
        match self {
            Extraction::PdfText { metrics, .. } => metrics.clone(),
            _ => BTreeMap::new(),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Extraction::PdfText { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Extract a file on disk
pub fn extract_file(
    path: &Path,
    content_type: Option<&str>,
    doc_type: DocumentType,
) -> Result<Extraction> {
    match detect_file_kind(path, content_type) {
        FileKind::Pdf => {
            let text = extract_pdf_text(path)?;
            let metrics = extract_metrics(&text, doc_type);
            tracing::debug!(
                path = %path.display(),
                chars = text.len(),
                metrics = metrics.len(),
                "Extracted PDF text"
            );
            Ok(Extraction::PdfText { text, metrics })
        }
        FileKind::Csv => Ok(Extraction::Tabular(read_csv(path)?)),
        FileKind::Excel => Ok(Extraction::Tabular(read_excel(path)?)),
        FileKind::Unknown => Ok(Extraction::Unsupported {
            reason: format!("Unrecognised file format: {}", path.display()),
        }),
    }
}

/// Concatenated text of every page
pub fn extract_pdf_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;

    // The PDF parser panics on some malformed files; treat that as a failed
    // extraction rather than taking the worker down.
    let outcome = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes));

    match outcome {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(Error::Extraction(format!(
            "PDF text extraction failed for {}: {}",
            path.display(),
            e
        ))),
        Err(_) => Err(Error::Extraction(format!(
            "PDF parser aborted on {}",
            path.display()
        ))),
    }
}

/// Metric label patterns per document type
const BALANCE_SHEET: &[(&str, &str)] = &[
    ("total_assets", r"total\s+assets"),
    ("total_liabilities", r"total\s+liabilities"),
    ("total_equity", r"total\s+(?:owners'?\s+|partners'?\s+)?(?:equity|capital)"),
    ("cash", r"^[ \t]*cash(?:\s+and\s+cash\s+equivalents)?"),
];
const INCOME_STATEMENT: &[(&str, &str)] = &[
    ("total_revenue", r"total\s+(?:operating\s+)?(?:revenues?|income)"),
    ("total_expenses", r"total\s+(?:operating\s+)?expenses"),
    ("net_operating_income", r"(?:net\s+operating\s+income|\bnoi\b)"),
    ("net_income", r"net\s+income"),
];
const CASH_FLOW: &[(&str, &str)] = &[
    (
        "operating_cash_flow",
        r"net\s+cash\s+(?:provided\s+by|from|used\s+in)\s+operating\s+activities",
    ),
    (
        "investing_cash_flow",
        r"net\s+cash\s+(?:provided\s+by|from|used\s+in)\s+investing\s+activities",
    ),
    (
        "financing_cash_flow",
        r"net\s+cash\s+(?:provided\s+by|from|used\s+in)\s+financing\s+activities",
    ),
    (
        "net_change_in_cash",
        r"net\s+(?:increase|decrease|change)\s+(?:\(decrease\)\s+)?in\s+cash",
    ),
];
const RENT_ROLL: &[(&str, &str)] = &[
    ("total_units", r"total\s+units"),
    ("occupied_units", r"occupied\s+units"),
    ("vacant_units", r"vacant\s+units"),
    ("total_rent", r"total\s+(?:monthly\s+)?rent"),
    ("total_sqft", r"total\s+(?:sq\.?\s*ft\.?|square\s+feet|sf|gla)"),
];

/// Amount on the same line as its label. Only spaces and tabs may separate
/// the parts, so a label with no figure never borrows one from the next line.
const AMOUNT_PATTERN: &str = r"\(?[ \t]*-?[ \t]*\$?[ \t]*\d[\d,]*(?:\.\d+)?[ \t]*\)?";

type MetricRegexes = Vec<(&'static str, Regex)>;

fn compile_metrics(table: &[(&'static str, &'static str)]) -> MetricRegexes {
    table
        .iter()
        .map(|(name, label)| {
            let pattern = format!(r"{}[ \t]*[:.]*[ \t]*(?P<amount>{})", label, AMOUNT_PATTERN);
            let re = RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .multi_line(true)
                .build()
                .unwrap();
            (*name, re)
        })
        .collect()
}

static BALANCE_SHEET_METRICS: Lazy<MetricRegexes> = Lazy::new(|| compile_metrics(BALANCE_SHEET));
static INCOME_STATEMENT_METRICS: Lazy<MetricRegexes> =
    Lazy::new(|| compile_metrics(INCOME_STATEMENT));
static CASH_FLOW_METRICS: Lazy<MetricRegexes> = Lazy::new(|| compile_metrics(CASH_FLOW));
static RENT_ROLL_METRICS: Lazy<MetricRegexes> = Lazy::new(|| compile_metrics(RENT_ROLL));

static DECLARED_UNITS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)total[ \t]+(?:units|spaces|suites)[ \t]*[:.]*[ \t]*(\d{1,5})\b").unwrap()
});

/// Compiled patterns that apply to `doc_type`
fn metric_regexes(doc_type: DocumentType) -> Vec<&'static MetricRegexes> {
    match doc_type {
        DocumentType::BalanceSheet => vec![&*BALANCE_SHEET_METRICS],
        DocumentType::IncomeStatement => vec![&*INCOME_STATEMENT_METRICS],
        DocumentType::CashFlowStatement => vec![&*CASH_FLOW_METRICS],
        DocumentType::RentRoll => vec![&*RENT_ROLL_METRICS],
        DocumentType::Other => vec![
            &*BALANCE_SHEET_METRICS,
            &*INCOME_STATEMENT_METRICS,
            &*CASH_FLOW_METRICS,
            &*RENT_ROLL_METRICS,
        ],
    }
}

/// Pull named amounts out of free text. First occurrence of each label wins.
pub fn extract_metrics(text: &str, doc_type: DocumentType) -> BTreeMap<String, f64> {
    let mut metrics = BTreeMap::new();

    for (name, re) in metric_regexes(doc_type).into_iter().flatten() {
        if let Some(value) = re
            .captures(text)
            .and_then(|caps| caps.name("amount"))
            .and_then(|m| parse_amount(m.as_str()))
        {
            metrics.insert(name.to_string(), value);
        }
    }

    metrics
}

/// Parse an accounting amount: `$1,234.50`, `(1,234)` and `-1234` forms
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let negative =
        (trimmed.starts_with('(') && trimmed.ends_with(')')) || trimmed.contains('-');
    let digits: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let value: f64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Load a CSV file; the first row is the header
pub fn read_csv(path: &Path) -> Result<TabularData> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::Extraction(format!("Open CSV {}: {}", path.display(), e)))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::Extraction(format!("Read CSV header {}: {}", path.display(), e)))?
        .iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => rows.push(
                record
                    .iter()
                    .map(|field| Value::String(field.to_string()))
                    .collect::<Vec<_>>(),
            ),
            Err(e) => {
                tracing::warn!(path = %path.display(), row = index + 2, "Skipping bad CSV row: {}", e);
            }
        }
    }

    Ok(build_table(headers, rows))
}

/// Load the first worksheet of a spreadsheet
pub fn read_excel(path: &Path) -> Result<TabularData> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::Extraction(format!("Open workbook {}: {}", path.display(), e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::Extraction(format!("Workbook has no sheets: {}", path.display())))?
        .map_err(|e| Error::Extraction(format!("Read sheet {}: {}", path.display(), e)))?;

    let mut rows = range
        .rows()
        .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)));

    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => Vec::new(),
    };
    let body: Vec<Vec<Value>> = rows.map(|row| row.iter().map(cell_to_json).collect()).collect();

    Ok(build_table(headers, body))
}

fn cell_to_json(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::String(String::new()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => Value::String(s.trim().to_string()),
        other => Value::String(other.to_string()),
    }
}

fn build_table(headers: Vec<String>, rows: Vec<Vec<Value>>) -> TabularData {
    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if h.is_empty() {
                format!("column_{}", i + 1)
            } else {
                h.clone()
            }
        })
        .collect();

    let records: Vec<Map<String, Value>> = rows
        .into_iter()
        .map(|row| {
            columns
                .iter()
                .cloned()
                .zip(row.into_iter().chain(std::iter::repeat(Value::String(String::new()))))
                .collect()
        })
        .collect();

    let property_columns = columns
        .iter()
        .filter(|c| {
            let lowered = c.to_lowercase();
            PROPERTY_COLUMN_KEYWORDS.iter().any(|k| lowered.contains(k))
        })
        .cloned()
        .collect();

    TabularData {
        row_count: records.len(),
        column_count: columns.len(),
        columns,
        records,
        property_columns,
    }
}

/// `Total Units: 37` style declarations in rent roll text
pub fn declared_unit_count(text: &str) -> Option<usize> {
    DECLARED_UNITS.captures(text)?.get(1)?.as_str().parse().ok()
}
