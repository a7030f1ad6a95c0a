//! Closed vocabularies of the accounting engine: voucher types and ledger groups.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoucherType {
    Sales,
    Purchase,
    Payment,
    Receipt,
    Journal,
    Contra,
    #[serde(rename = "Credit Note")]
    CreditNote,
    #[serde(rename = "Debit Note")]
    DebitNote,
}

impl VoucherType {
    pub const ALL: [VoucherType; 8] = [
        VoucherType::Sales,
        VoucherType::Purchase,
        VoucherType::Payment,
        VoucherType::Receipt,
        VoucherType::Journal,
        VoucherType::Contra,
        VoucherType::CreditNote,
        VoucherType::DebitNote,
    ];

    /// Name as stored by the engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherType::Sales => "Sales",
            VoucherType::Purchase => "Purchase",
            VoucherType::Payment => "Payment",
            VoucherType::Receipt => "Receipt",
            VoucherType::Journal => "Journal",
            VoucherType::Contra => "Contra",
            VoucherType::CreditNote => "Credit Note",
            VoucherType::DebitNote => "Debit Note",
        }
    }

    /// Exact engine name, ignoring case and separators.
    pub fn parse(name: &str) -> Option<VoucherType> {
        let key = normalize(name);
        Self::ALL.into_iter().find(|t| normalize(t.as_str()) == key)
    }

    /// First voucher type mentioned in free text. Two-word types are checked first
    /// so "credit note" does not read as a bare keyword.
    pub fn mentioned_in(text: &str) -> Option<VoucherType> {
        let lower = text.to_lowercase();
        const KEYWORDS: &[(&str, VoucherType)] = &[
            ("credit note", VoucherType::CreditNote),
            ("debit note", VoucherType::DebitNote),
            ("sales", VoucherType::Sales),
            ("sale", VoucherType::Sales),
            ("purchase", VoucherType::Purchase),
            ("payment", VoucherType::Payment),
            ("receipt", VoucherType::Receipt),
            ("journal", VoucherType::Journal),
            ("contra", VoucherType::Contra),
        ];
        KEYWORDS
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .map(|(_, t)| *t)
    }

    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|t| t.as_str().to_string()).collect()
    }
}

impl fmt::Display for VoucherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard ledger groups, as named by the engine.
pub const LEDGER_GROUPS: &[&str] = &[
    "Sundry Debtors",
    "Sundry Creditors",
    "Bank Accounts",
    "Cash-in-Hand",
    "Sales Accounts",
    "Purchase Accounts",
    "Indirect Expenses",
    "Direct Expenses",
    "Indirect Incomes",
    "Direct Incomes",
    "Current Assets",
    "Current Liabilities",
    "Fixed Assets",
    "Duties & Taxes",
];

pub const SUNDRY_DEBTORS: &str = "Sundry Debtors";
pub const SUNDRY_CREDITORS: &str = "Sundry Creditors";

/// First standard ledger group named in free text. "Indirect" groups are listed
/// before "Direct" ones because one name contains the other.
pub fn ledger_group_in(text: &str) -> Option<&'static str> {
    let key = normalize(text);
    LEDGER_GROUPS
        .iter()
        .find(|group| key.contains(&normalize(group)))
        .copied()
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || *c == '&')
        .flat_map(char::to_lowercase)
        .collect()
}
