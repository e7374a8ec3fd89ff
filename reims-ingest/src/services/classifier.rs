//! Document type classification
//!
//! Maps a filename or storage path to one of the five document types by
//! case-insensitive phrase matching. First match wins; anything unmatched is
//! `Other`. Never fails.

use reims_common::DocumentType;

/// Phrase table, checked in order. Rent roll comes first so that
/// "Rent Roll with Income Statement Summary" stays a rent roll.
const PHRASES: &[(DocumentType, &[&str])] = &[
    (DocumentType::RentRoll, &["rent roll", "rentroll"]),
    (DocumentType::BalanceSheet, &["balance sheet", "balancesheet"]),
    (
        DocumentType::IncomeStatement,
        &[
            "income statement",
            "incomestatement",
            "profit and loss",
            "profit loss",
            "p&l",
            "operating statement",
        ],
    ),
    (
        DocumentType::CashFlowStatement,
        &["cash flow", "cashflow"],
    ),
];

/// Classify a filename or object key
pub fn classify_document(name: &str) -> DocumentType {
    let normalized = normalize(name);

    PHRASES
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|p| normalized.contains(p)))
        .map(|(doc_type, _)| *doc_type)
        .unwrap_or(DocumentType::Other)
}

/// Lowercase, with `_` `-` `.` and path separators folded to single spaces
fn normalize(name: &str) -> String {
    let lowered: String = name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '_' | '-' | '.' | '/' | '\\' => ' ',
            other => other,
        })
        .collect();

    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_roll_variants() {
        for name in [
            "Hammond Rent Roll April 2025.pdf",
            "hammond_rent_roll_2025.xlsx",
            "ESP-RENT-ROLL.csv",
            "wendover rentroll.pdf",
        ] {
            assert_eq!(classify_document(name), DocumentType::RentRoll, "{}", name);
        }
    }

    #[test]
    fn test_financial_statements() {
        assert_eq!(
            classify_document("ESP 2024 Balance Sheet.pdf"),
            DocumentType::BalanceSheet
        );
        assert_eq!(
            classify_document("TCSH_2024_Income_Statement.pdf"),
            DocumentType::IncomeStatement
        );
        assert_eq!(
            classify_document("Wendover P&L Q3.pdf"),
            DocumentType::IncomeStatement
        );
        assert_eq!(
            classify_document("Hammond Cash-Flow 2023.xlsx"),
            DocumentType::CashFlowStatement
        );
    }

    #[test]
    fn test_storage_path_classified() {
        assert_eq!(
            classify_document("reims-files/Hammond Aire/2024/balance_sheet/statement.pdf"),
            DocumentType::BalanceSheet
        );
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(
            classify_document("Rent Roll and Income Statement.pdf"),
            DocumentType::RentRoll
        );
    }

    #[test]
    fn test_unmatched_is_other() {
        assert_eq!(classify_document("lease agreement.docx"), DocumentType::Other);
        assert_eq!(classify_document(""), DocumentType::Other);
    }
}
