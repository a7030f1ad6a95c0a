//! Fixed report and summary definitions.
//!
//! Each report is a predefined [`FilterSet`] run through the same pipeline as
//! any other request, so it is built, whitelisted and cached the same way.
//! Summaries combine several such filter sets and aggregate in-process.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tallygate_common::models::{DateRange, FilterSet};

use crate::intent::AGGREGATE_ROW_LIMIT;
use crate::vocabulary::{VoucherType, SUNDRY_CREDITORS, SUNDRY_DEBTORS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "report", rename_all = "snake_case")]
pub enum Report {
    Companies,
    Ledgers {
        group: Option<String>,
    },
    SundryDebtors,
    SundryCreditors,
    Vouchers {
        voucher_type: Option<VoucherType>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    StockItems,
    ExpenseLedgers,
}

impl Report {
    pub const NAMES: [&'static str; 7] = [
        "companies",
        "ledgers",
        "sundry-debtors",
        "sundry-creditors",
        "vouchers",
        "stock-items",
        "expense-ledgers",
    ];

    /// Report by name, without options. Accepts `-` or `_` as separator.
    pub fn from_name(name: &str) -> Option<Report> {
        let report = match name.trim().to_lowercase().replace('_', "-").as_str() {
            "companies" => Report::Companies,
            "ledgers" => Report::Ledgers { group: None },
            "sundry-debtors" | "debtors" => Report::SundryDebtors,
            "sundry-creditors" | "creditors" => Report::SundryCreditors,
            "vouchers" => Report::Vouchers {
                voucher_type: None,
                from: None,
                to: None,
            },
            "stock-items" | "stock" => Report::StockItems,
            "expense-ledgers" | "expenses" => Report::ExpenseLedgers,
            _ => return None,
        };
        Some(report)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Report::Companies => "companies",
            Report::Ledgers { .. } => "ledgers",
            Report::SundryDebtors => "sundry-debtors",
            Report::SundryCreditors => "sundry-creditors",
            Report::Vouchers { .. } => "vouchers",
            Report::StockItems => "stock-items",
            Report::ExpenseLedgers => "expense-ledgers",
        }
    }

    /// The filter set behind the report. `limit` falls back to the executor default.
    pub fn filter_set(&self, company: Option<String>, limit: Option<usize>) -> FilterSet {
        let mut fs = match self {
            Report::Companies => FilterSet::new("Company").order_by("Name", false),
            Report::Ledgers { group } => {
                let fs = FilterSet::new("Ledger").order_by("Name", false);
                match group {
                    Some(g) => fs.predicate("Parent", "=", g.as_str()),
                    None => fs,
                }
            }
            Report::SundryDebtors => party_ledgers(SUNDRY_DEBTORS),
            Report::SundryCreditors => party_ledgers(SUNDRY_CREDITORS),
            Report::Vouchers {
                voucher_type,
                from,
                to,
            } => {
                let mut fs = FilterSet::new("Voucher").order_by("Date", true);
                if let Some(t) = voucher_type {
                    fs = fs.predicate("VoucherType", "=", t.as_str());
                }
                if from.is_some() || to.is_some() {
                    fs = fs.between(*from, *to);
                }
                fs
            }
            Report::StockItems => FilterSet::new("StockItem").order_by("Name", false),
            Report::ExpenseLedgers => FilterSet::new("Ledger")
                .field("Name")
                .field("Parent")
                .field("ClosingBalance")
                .predicate("IsExpense", "=", true)
                .order_by("ClosingBalance", true),
        };
        fs.company = company;
        fs.limit = limit;
        fs
    }
}

/// Multi-query summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Summary {
    Financial,
    Stock,
    Dashboard,
}

impl Summary {
    pub const NAMES: [&'static str; 3] = ["financial", "stock", "dashboard"];

    pub fn from_name(name: &str) -> Option<Summary> {
        match name.trim().to_lowercase().as_str() {
            "financial" | "finance" | "financial-summary" => Some(Summary::Financial),
            "stock" | "stock-summary" | "inventory" => Some(Summary::Stock),
            "dashboard" => Some(Summary::Dashboard),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Summary::Financial => "financial",
            Summary::Stock => "stock",
            Summary::Dashboard => "dashboard",
        }
    }
}

/// The five queries behind a financial summary.
#[derive(Debug, Clone, PartialEq)]
pub struct FinancialQueries {
    pub revenue_ledgers: FilterSet,
    pub expense_ledgers: FilterSet,
    /// Receipts and payments, restricted to `window` when one is given.
    pub cash_vouchers: FilterSet,
    pub debtors: FilterSet,
    pub creditors: FilterSet,
}

impl FinancialQueries {
    pub fn new(company: Option<String>, window: Option<DateRange>) -> Self {
        let ledgers = |flag: &str| {
            FilterSet::new("Ledger")
                .field("Name")
                .field("ClosingBalance")
                .predicate(flag, "=", true)
                .limit(AGGREGATE_ROW_LIMIT)
        };
        let mut cash_vouchers = FilterSet::new("Voucher")
            .field("Date")
            .field("VoucherType")
            .field("Amount")
            .predicate(
                "VoucherType",
                "in",
                vec![VoucherType::Receipt.as_str(), VoucherType::Payment.as_str()],
            )
            .limit(AGGREGATE_ROW_LIMIT);
        cash_vouchers.date_range = window;

        let mut queries = Self {
            revenue_ledgers: ledgers("IsRevenue"),
            expense_ledgers: ledgers("IsExpense"),
            cash_vouchers,
            debtors: party_ledgers(SUNDRY_DEBTORS).limit(AGGREGATE_ROW_LIMIT),
            creditors: party_ledgers(SUNDRY_CREDITORS).limit(AGGREGATE_ROW_LIMIT),
        };
        for fs in queries.iter_mut() {
            fs.company = company.clone();
        }
        queries
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut FilterSet> {
        [
            &mut self.revenue_ledgers,
            &mut self.expense_ledgers,
            &mut self.cash_vouchers,
            &mut self.debtors,
            &mut self.creditors,
        ]
        .into_iter()
    }
}

/// Stock items with the columns the stock summary groups on.
pub fn stock_summary_query(company: Option<String>) -> FilterSet {
    let mut fs = FilterSet::new("StockItem")
        .field("Name")
        .field("StockGroup")
        .field("ClosingValue")
        .limit(AGGREGATE_ROW_LIMIT);
    fs.company = company;
    fs
}

fn party_ledgers(group: &str) -> FilterSet {
    FilterSet::new("Ledger")
        .field("Name")
        .field("Parent")
        .field("ClosingBalance")
        .predicate("Parent", "=", group)
        .order_by("ClosingBalance", true)
}
