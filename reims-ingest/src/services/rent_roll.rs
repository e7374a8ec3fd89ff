//! Rent roll parsing
//!
//! Maps rows of a tabular rent roll (CSV or first spreadsheet sheet) onto
//! [`UnitRecord`]s. Column roles are found by header synonym: an exact
//! header match wins over a header that merely contains the synonym as
//! whole words. Each column is claimed by at most one role.
//!
//! Rows that are entirely blank, and summary rows whose unit or tenant cell
//! starts with "total", are skipped. Rows with no unit number are kept with
//! an empty `unit_number` so the importer's validation reports them.

use chrono::{Duration, NaiveDate};
use reims_common::models::UnitRecord;
use reims_common::{Error, Result, UnitStatus};
use serde_json::{Map, Value};

use super::extractor::{declared_unit_count, parse_amount, TabularData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Unit,
    Tenant,
    Status,
    LeaseStart,
    LeaseEnd,
    Sqft,
    Rent,
}

/// Resolution order matters: earlier roles claim columns first
const ROLE_SYNONYMS: &[(Role, &[&str])] = &[
    (
        Role::Unit,
        &["unit", "unit number", "unit no", "unit id", "suite", "space", "store", "unit suite"],
    ),
    (Role::Tenant, &["tenant", "tenant name", "lessee", "occupant", "dba", "business name"]),
    (Role::Status, &["status", "unit status", "lease status", "occupancy status", "occupancy"]),
    (
        Role::LeaseStart,
        &["lease start", "start date", "lease start date", "commencement", "lease from", "move in"],
    ),
    (
        Role::LeaseEnd,
        &["lease end", "end date", "lease end date", "expiration", "lease expiration", "lease to", "expiry"],
    ),
    (Role::Sqft, &["sqft", "sq ft", "square feet", "square footage", "area", "gla", "sf", "rsf"]),
    (Role::Rent, &["monthly rent", "rent", "base rent", "current rent", "monthly base rent"]),
];

/// Lowercase, non-alphanumerics folded to single spaces
fn normalize_header(header: &str) -> String {
    header
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains_words(haystack: &str, needle: &str) -> bool {
    format!(" {} ", haystack).contains(&format!(" {} ", needle))
}

/// Column name for each role, where one could be found
#[derive(Debug, Default)]
struct ColumnMap {
    unit: Option<String>,
    tenant: Option<String>,
    status: Option<String>,
    lease_start: Option<String>,
    lease_end: Option<String>,
    sqft: Option<String>,
    rent: Option<String>,
}

impl ColumnMap {
    fn resolve(columns: &[String]) -> Self {
        let normalized: Vec<String> = columns.iter().map(|c| normalize_header(c)).collect();
        let mut claimed = vec![false; columns.len()];
        let mut map = ColumnMap::default();

        for (role, synonyms) in ROLE_SYNONYMS {
            let exact = normalized
                .iter()
                .enumerate()
                .find(|(i, h)| !claimed[*i] && synonyms.contains(&h.as_str()))
                .map(|(i, _)| i);
            let found = exact.or_else(|| {
                normalized
                    .iter()
                    .enumerate()
                    .find(|(i, h)| !claimed[*i] && synonyms.iter().any(|s| contains_words(h, s)))
                    .map(|(i, _)| i)
            });

            if let Some(i) = found {
                claimed[i] = true;
                let name = Some(columns[i].clone());
                match role {
                    Role::Unit => map.unit = name,
                    Role::Tenant => map.tenant = name,
                    Role::Status => map.status = name,
                    Role::LeaseStart => map.lease_start = name,
                    Role::LeaseEnd => map.lease_end = name,
                    Role::Sqft => map.sqft = name,
                    Role::Rent => map.rent = name,
                }
            }
        }

        map
    }
}

/// Convert tabular rent roll rows to unit records
pub fn units_from_records(table: &TabularData) -> Result<Vec<UnitRecord>> {
    let columns = ColumnMap::resolve(&table.columns);
    let unit_column = columns.unit.as_deref().ok_or_else(|| {
        Error::InvalidInput(format!(
            "Rent roll has no unit column (headers: {})",
            table.columns.join(", ")
        ))
    })?;

    let mut units = Vec::new();
    for (index, record) in table.records.iter().enumerate() {
        if record.values().all(|v| cell_text(v).is_empty()) {
            continue;
        }

        let unit_number = cell_text_at(record, Some(unit_column));
        let tenant_raw = cell_text_at(record, columns.tenant.as_deref());

        if is_summary(&unit_number) || is_summary(&tenant_raw) {
            tracing::debug!(row = index + 1, "Skipping rent roll summary row");
            continue;
        }

        let tenant_name = if tenant_raw.is_empty() || tenant_raw.eq_ignore_ascii_case("vacant") {
            None
        } else {
            Some(tenant_raw)
        };
        let status_raw = cell_text_at(record, columns.status.as_deref());

        units.push(UnitRecord {
            unit_number,
            status: normalize_status(&status_raw, tenant_name.as_deref()),
            tenant_name,
            sqft: cell_amount(record, columns.sqft.as_deref()),
            monthly_rent: cell_amount(record, columns.rent.as_deref()),
            lease_start: cell_date(record, columns.lease_start.as_deref()),
            lease_end: cell_date(record, columns.lease_end.as_deref()),
        });
    }

    Ok(units)
}

/// "Total Units" figure declared in a summary row of the table
pub fn declared_unit_count_in_table(table: &TabularData) -> Option<usize> {
    let text = table
        .records
        .iter()
        .map(|r| {
            table
                .columns
                .iter()
                .filter_map(|c| r.get(c))
                .map(cell_text)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n");
    declared_unit_count(&text)
}

fn is_summary(text: &str) -> bool {
    text.to_lowercase().starts_with("total")
}

/// Words that flip the meaning of the status after them
const NEGATIONS: &[&str] = &["not", "non", "no"];

/// Single words that already mean the unit is empty
const VACANT_WORDS: &[&str] = &[
    "vacant", "vacated", "available", "empty", "unoccupied", "unleased", "unrented", "inactive",
];

const OCCUPIED_WORDS: &[&str] = &["occupied", "leased", "current", "active", "rented"];

/// Map a free-form status cell to a unit status.
///
/// Words are matched whole. An explicit status wins over the tenant column;
/// only an unrecognised or blank status falls back to it, where a named
/// tenant means occupied.
pub fn normalize_status(raw: &str, tenant: Option<&str>) -> UnitStatus {
    let s = normalize_header(raw);
    let words: Vec<&str> = s.split(' ').filter(|w| !w.is_empty()).collect();
    let has = |list: &[&str]| words.iter().any(|w| list.contains(w));

    if words.iter().any(|w| w.starts_with("maint")) || has(&["down", "offline"]) {
        UnitStatus::Maintenance
    } else if contains_words(&s, "under lease") || has(&["pending"]) {
        UnitStatus::UnderLease
    } else if has(NEGATIONS) {
        // "not vacant" is occupied; "not leased", "non occupied" are empty
        if has(VACANT_WORDS) {
            UnitStatus::Occupied
        } else {
            UnitStatus::Vacant
        }
    } else if has(VACANT_WORDS) {
        UnitStatus::Vacant
    } else if has(OCCUPIED_WORDS) {
        UnitStatus::Occupied
    } else if tenant.is_some() {
        UnitStatus::Occupied
    } else {
        UnitStatus::Vacant
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn cell_text_at(record: &Map<String, Value>, column: Option<&str>) -> String {
    column
        .and_then(|c| record.get(c))
        .map(cell_text)
        .unwrap_or_default()
}

fn cell_amount(record: &Map<String, Value>, column: Option<&str>) -> Option<f64> {
    match column.and_then(|c| record.get(c))? {
        Value::Number(n) => n.as_f64(),
        other => parse_amount(&cell_text(other)),
    }
}

fn cell_date(record: &Map<String, Value>, column: Option<&str>) -> Option<NaiveDate> {
    match column.and_then(|c| record.get(c))? {
        Value::Number(n) => n.as_f64().and_then(excel_serial_date),
        other => parse_date(&cell_text(other)),
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%m-%d-%Y", "%d-%b-%Y", "%d-%b-%y", "%b %d, %Y",
    "%B %d, %Y", "%Y/%m/%d",
];

/// Parse a lease date written in one of the common US formats, or as an
/// Excel serial day number
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // "2024-01-15 00:00:00" and "2024-01-15T00:00:00"
    let date_part = trimmed.split([' ', 'T']).next().unwrap_or(trimmed);
    for candidate in [trimmed, date_part] {
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(candidate, format) {
                return Some(date);
            }
        }
    }

    trimmed.parse::<f64>().ok().and_then(excel_serial_date)
}

/// Excel's 1900 date system, counted from 1899-12-30
fn excel_serial_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial.trunc() as i64))
}
