//! Filename metadata: year, period and property
//!
//! Filenames in the document archive follow no fixed convention, so each
//! field is pulled out independently:
//! - year: first standalone 4-digit token in 2020–2029
//! - period: a month name or abbreviation combined with the year
//! - property: first alias pattern that matches

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use reims_common::config::AliasConfig;
use reims_common::{Error, Result};

/// Built-in alias table: (canonical name, case-insensitive pattern)
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("Eastern Shore Plaza", r"eastern\s*shore|\besp\b"),
    ("Hammond Aire", r"hammond|\bhmnd\b"),
    ("The Crossings of Spring Hill", r"crossings|spring\s*hill|\btcsh\b"),
    ("Wendover Commons", r"wendover|\bwend\b"),
];

// Digits on either side disqualify the token (e.g. invoice numbers).
static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])(202[0-9])(?:[^0-9]|$)").unwrap());

static MONTH: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(
        r"\b(jan|january|feb|february|mar|march|apr|april|may|jun|june|jul|july|aug|august|sep|sept|september|oct|october|nov|november|dec|december)\b",
    )
    .case_insensitive(true)
    .build()
    .unwrap()
});

/// Extract the document year, or `fallback_year` when the name carries none
pub fn extract_year(name: &str, fallback_year: i32) -> i32 {
    year_token(name).unwrap_or(fallback_year)
}

fn year_token(name: &str) -> Option<i32> {
    YEAR.captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `YYYY-MM` when the name mentions a month, using `year` for the year part
pub fn extract_period(name: &str, year: i32) -> Option<String> {
    let normalized = spaced(name);
    let month = MONTH.captures(&normalized)?.get(1)?.as_str().to_lowercase();
    let number = match &month[..3] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };

    Some(format!("{:04}-{:02}", year, number))
}

/// `_` and `-` become spaces so `\b` sees the word boundaries
fn spaced(name: &str) -> String {
    name.chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect()
}

/// Ordered alias table resolving filenames to canonical property names
#[derive(Debug, Clone)]
pub struct PropertyAliases {
    entries: Vec<(String, Regex)>,
}

impl PropertyAliases {
    /// Built-in aliases followed by `extra` (from the TOML config)
    pub fn new(extra: &[AliasConfig]) -> Result<Self> {
        let mut entries = Vec::with_capacity(BUILTIN_ALIASES.len() + extra.len());

        for (name, pattern) in BUILTIN_ALIASES {
            entries.push((name.to_string(), compile(pattern)?));
        }
        for alias in extra {
            entries.push((alias.name.clone(), compile(&alias.pattern)?));
        }

        Ok(Self { entries })
    }

    /// Built-in table only
    pub fn builtin() -> Self {
        // The built-in patterns are constants covered by tests.
        Self::new(&[]).unwrap_or(Self {
            entries: Vec::new(),
        })
    }

    /// Canonical property name for a filename, if any alias matches
    pub fn resolve(&self, name: &str) -> Option<String> {
        let normalized = spaced(name);
        self.entries
            .iter()
            .find(|(_, re)| re.is_match(&normalized))
            .map(|(canonical, _)| canonical.clone())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::Config(format!("Invalid alias pattern '{}': {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hammond_rent_roll_example() {
        let name = "Hammond Rent Roll April 2025.pdf";
        assert_eq!(extract_year(name, 2030), 2025);
        assert_eq!(extract_period(name, 2025).as_deref(), Some("2025-04"));
        assert_eq!(
            PropertyAliases::builtin().resolve(name).as_deref(),
            Some("Hammond Aire")
        );
    }

    #[test]
    fn test_year_defaults_when_absent() {
        assert_eq!(extract_year("Balance Sheet.pdf", 2026), 2026);
    }

    #[test]
    fn test_year_outside_range_ignored() {
        assert_eq!(extract_year("Income 2019.pdf", 2026), 2026);
        assert_eq!(extract_year("Invoice 120245.pdf", 2026), 2026);
    }

    #[test]
    fn test_year_with_underscores() {
        assert_eq!(extract_year("ESP_2024_Balance_Sheet.pdf", 2026), 2024);
    }

    #[test]
    fn test_period_abbreviation_and_underscores() {
        assert_eq!(
            extract_period("wend_rent_roll_sep_2024.xlsx", 2024).as_deref(),
            Some("2024-09")
        );
        assert_eq!(extract_period("Annual Report 2024.pdf", 2024), None);
    }

    #[test]
    fn test_period_ignores_words_containing_month() {
        assert_eq!(extract_period("Market Summary 2024.pdf", 2024), None);
    }

    #[test]
    fn test_builtin_abbreviations() {
        let aliases = PropertyAliases::builtin();
        assert_eq!(aliases.resolve("ESP 2024 Cash Flow.pdf").as_deref(), Some("Eastern Shore Plaza"));
        assert_eq!(aliases.resolve("TCSH_Income_Statement.pdf").as_deref(), Some("The Crossings of Spring Hill"));
        assert_eq!(aliases.resolve("Wendover Commons BS.pdf").as_deref(), Some("Wendover Commons"));
        assert_eq!(aliases.resolve("Unknown Center.pdf"), None);
    }

    #[test]
    fn test_abbreviation_needs_word_boundary() {
        assert_eq!(PropertyAliases::builtin().resolve("respite.pdf"), None);
    }

    #[test]
    fn test_configured_aliases_appended() {
        let aliases = PropertyAliases::new(&[AliasConfig {
            name: "Lakeside Center".to_string(),
            pattern: r"lakeside|\blsc\b".to_string(),
        }])
        .unwrap();
        assert_eq!(aliases.resolve("LSC Rent Roll.csv").as_deref(), Some("Lakeside Center"));
        assert_eq!(aliases.names().count(), 5);
    }

    #[test]
    fn test_invalid_alias_pattern_is_config_error() {
        let result = PropertyAliases::new(&[AliasConfig {
            name: "Broken".to_string(),
            pattern: "(".to_string(),
        }]);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
