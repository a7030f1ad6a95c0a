//! Free-text intent classification.
//!
//! Classification is an ordered list of `(pattern, constructor)` rules over a
//! fixed taxonomy. The first matching rule wins, so narrower rules come first.
//! Text that looks like raw query syntax never reaches the rules.
//!
//! An [`Intent`] is turned into a [`FilterSet`] once, through an [`IntentScope`]
//! that carries the date window, company and dashboard overrides.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tallygate_common::models::{DashboardFilters, DateRange, FilterSet, RequestContext};
use tallygate_error::{ErrorCode, ErrorContext, GateError};
use tallygate_sql::MAX_LIMIT;

use crate::dates::{self, capture_number, DateWindow, LAST_DAYS, PAST_MONTHS};
use crate::vocabulary::{ledger_group_in, VoucherType};

pub const DEFAULT_TREND_MONTHS: u32 = 12;
pub const MAX_TREND_MONTHS: u32 = 36;
pub const DEFAULT_TOP_N: usize = 10;
pub const MAX_TOP_N: usize = 100;
pub const DEFAULT_CASH_FLOW_DAYS: u32 = 30;
pub const MAX_CASH_FLOW_DAYS: u32 = 366;
pub const VOUCHER_LIST_LIMIT: usize = 50;

/// Rows fetched for an in-process aggregate.
pub const AGGREGATE_ROW_LIMIT: usize = MAX_LIMIT;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    SalesTrend { months: u32 },
    TopCustomers { count: usize },
    CashFlow { days: u32 },
    ExpenseBreakdown { group: Option<String> },
    VoucherList { voucher_type: Option<VoucherType> },
    Unrecognized { text: String },
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::SalesTrend { .. } => "sales_trend",
            Intent::TopCustomers { .. } => "top_customers",
            Intent::CashFlow { .. } => "cash_flow",
            Intent::ExpenseBreakdown { .. } => "expense_breakdown",
            Intent::VoucherList { .. } => "voucher_list",
            Intent::Unrecognized { .. } => "unrecognized",
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Intent::Unrecognized { .. })
    }

    /// The filter set this intent stands for. `None` for unrecognized text.
    pub fn filter_set(&self, scope: &IntentScope) -> Option<FilterSet> {
        let window = |fallback: DateWindow| scope.window.unwrap_or_else(|| fallback.to_range());

        let mut fs = match self {
            Intent::SalesTrend { months } => {
                let range = window(dates::past_months(*months, scope.today));
                FilterSet::new("Voucher")
                    .field("Date")
                    .field("Amount")
                    .predicate("VoucherType", "=", VoucherType::Sales.as_str())
                    .between(range.from, range.to)
                    .order_by("Date", false)
                    .limit(AGGREGATE_ROW_LIMIT)
            }
            Intent::TopCustomers { .. } => {
                let mut fs = FilterSet::new("Voucher")
                    .field("PartyName")
                    .field("Amount")
                    .predicate("VoucherType", "=", VoucherType::Sales.as_str())
                    .limit(AGGREGATE_ROW_LIMIT);
                fs.date_range = scope.window;
                fs
            }
            Intent::CashFlow { days } => {
                let range = window(dates::last_days(*days, scope.today));
                FilterSet::new("Voucher")
                    .field("Date")
                    .field("VoucherType")
                    .field("Amount")
                    .predicate(
                        "VoucherType",
                        "in",
                        vec![VoucherType::Receipt.as_str(), VoucherType::Payment.as_str()],
                    )
                    .between(range.from, range.to)
                    .order_by("Date", false)
                    .limit(AGGREGATE_ROW_LIMIT)
            }
            Intent::ExpenseBreakdown { group } => {
                let mut fs = FilterSet::new("Ledger")
                    .field("Name")
                    .field("Parent")
                    .field("ClosingBalance")
                    .predicate("IsExpense", "=", true);
                if let Some(group) = group.as_ref().or(scope.ledger_group.as_ref()) {
                    fs = fs.predicate("Parent", "=", group.as_str());
                }
                fs.order_by("Parent", false).limit(AGGREGATE_ROW_LIMIT)
            }
            Intent::VoucherList { voucher_type } => {
                let mut fs = FilterSet::new("Voucher")
                    .order_by("Date", true)
                    .limit(VOUCHER_LIST_LIMIT);
                if let Some(t) = scope.voucher_type.or(*voucher_type) {
                    fs = fs.predicate("VoucherType", "=", t.as_str());
                }
                fs.date_range = scope.window;
                fs
            }
            Intent::Unrecognized { .. } => return None,
        };

        fs.company = scope.company.clone();
        Some(fs)
    }
}

/// Pluggable text classifier. Implementations must be deterministic for a
/// given `(text, context)` and fall back to [`Intent::Unrecognized`].
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, text: &str, context: &RequestContext) -> Intent;
}

/// The built-in keyword classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternClassifier;

impl IntentClassifier for PatternClassifier {
    fn classify(&self, text: &str, context: &RequestContext) -> Intent {
        resolve(text, context)
    }
}

struct IntentRule {
    name: &'static str,
    pattern: Regex,
    build: fn(&str, NaiveDate) -> Intent,
}

static RAW_QUERY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ; | -- | /\*
        | \b(?:drop|truncate|alter|create)\s+(?:table|database|view|index|schema)\b
        | \bdelete\s+from\b
        | \binsert\s+into\b
        | \bupdate\s+\w+\s+set\b
        | \bselect\b.*\bfrom\b
        | \bunion\s+(?:all\s+)?select\b
        | \bexec(?:ute)?\s*\(
        | \bor\s+1\s*=\s*1\b
        ",
    )
    .unwrap()
});

static TOP_N: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:top|best|biggest|largest|leading|first)\s+(\d{1,4})\b").unwrap());

static RULES: Lazy<Vec<IntentRule>> = Lazy::new(|| {
    vec![
        IntentRule {
            name: "top_customers",
            pattern: Regex::new(
                r"\b(?:top|best|biggest|largest|leading)\s+(?:\d{1,4}\s+)?(?:customers?|debtors?|clients?|buyers?|part(?:y|ies))\b|\b(?:customers?|clients?)\s+by\s+(?:sales|revenue)\b",
            )
            .unwrap(),
            build: |text, _| Intent::TopCustomers {
                count: capture_number(&TOP_N, text)
                    .map(|n| n as usize)
                    .unwrap_or(DEFAULT_TOP_N)
                    .clamp(1, MAX_TOP_N),
            },
        },
        IntentRule {
            name: "voucher_list",
            pattern: Regex::new(
                r"\b(?:vouchers?|transactions?|entries|day\s*book|credit\s+notes?|debit\s+notes?)\b",
            )
            .unwrap(),
            build: |text, _| Intent::VoucherList {
                voucher_type: VoucherType::mentioned_in(text),
            },
        },
        IntentRule {
            name: "cash_flow",
            pattern: Regex::new(
                r"\bcash\s*flows?\b|\bcash\s+(?:in|out)\b|\b(?:inflows?|outflows?)\b|\breceipts?\s+(?:and|&|vs\.?)\s+payments?\b",
            )
            .unwrap(),
            build: |text, today| {
                let days = capture_number(&LAST_DAYS, text)
                    .or_else(|| dates::extract_window(text, today).map(|w| w.days()))
                    .unwrap_or(DEFAULT_CASH_FLOW_DAYS);
                Intent::CashFlow {
                    days: days.clamp(1, MAX_CASH_FLOW_DAYS),
                }
            },
        },
        IntentRule {
            name: "expense_breakdown",
            pattern: Regex::new(r"\b(?:expenses?|expenditures?|spending|costs?|overheads?)\b")
                .unwrap(),
            build: |text, _| Intent::ExpenseBreakdown {
                group: ledger_group_in(text)
                    .filter(|g| g.ends_with("Expenses"))
                    .map(str::to_string),
            },
        },
        IntentRule {
            name: "sales_trend",
            pattern: Regex::new(r"\b(?:sales|revenue|turnover|sold)\b").unwrap(),
            build: |text, today| {
                let months = capture_number(&PAST_MONTHS, text)
                    .or_else(|| dates::extract_window(text, today).map(|w| w.months_spanned()))
                    .unwrap_or(DEFAULT_TREND_MONTHS);
                Intent::SalesTrend {
                    months: months.clamp(1, MAX_TREND_MONTHS),
                }
            },
        },
    ]
});

/// Names of the rules in evaluation order.
pub fn rule_names() -> Vec<&'static str> {
    RULES.iter().map(|r| r.name).collect()
}

/// Classify `text`. `context.today` anchors relative dates.
pub fn resolve(text: &str, context: &RequestContext) -> Intent {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() || RAW_QUERY.is_match(&lower) {
        return Intent::Unrecognized {
            text: text.to_string(),
        };
    }

    let today = context.today.unwrap_or_else(dates::today);
    RULES
        .iter()
        .find(|rule| rule.pattern.is_match(&lower))
        .map(|rule| (rule.build)(&lower, today))
        .unwrap_or_else(|| Intent::Unrecognized {
            text: text.to_string(),
        })
}

/// Everything besides the intent itself that shapes the filter set.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentScope {
    pub today: NaiveDate,
    pub window: Option<DateRange>,
    pub company: Option<String>,
    pub voucher_type: Option<VoucherType>,
    pub ledger_group: Option<String>,
}

impl IntentScope {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            window: None,
            company: None,
            voucher_type: None,
            ledger_group: None,
        }
    }

    /// Scope for a text request. Dashboard filters win over what the text says.
    pub fn from_request(
        text: &str,
        context: &RequestContext,
        filters: Option<&DashboardFilters>,
    ) -> Result<Self, GateError> {
        let today = context.today.unwrap_or_else(dates::today);
        let window = dates::merge_with_dashboard(dates::extract_window(text, today), filters);

        let voucher_type = match filters.and_then(|f| f.voucher_type.as_deref()) {
            Some(name) => Some(VoucherType::parse(name).ok_or_else(|| {
                GateError::new(
                    ErrorCode::TypeMismatch,
                    format!("Unknown voucher type '{}'", name),
                )
                .with_context(ErrorContext::TypeMismatch {
                    field: "voucher_type".to_string(),
                    expected: VoucherType::names().join(", "),
                })
            })?),
            None => None,
        };

        let ledger_group = filters
            .and_then(|f| f.ledger_group.clone())
            .or_else(|| ledger_group_in(text).map(str::to_string));

        let company = filters
            .and_then(|f| f.company.clone())
            .or_else(|| context.company.clone());

        Ok(Self {
            today,
            window,
            company,
            voucher_type,
            ledger_group,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ctx() -> RequestContext {
        RequestContext {
            company: None,
            today: Some(d(2024, 7, 17)),
        }
    }

    #[test]
    fn test_sales_this_month() {
        let text = "Show me sales for this month";
        let intent = resolve(text, &ctx());
        assert_eq!(intent, Intent::SalesTrend { months: 1 });

        let scope = IntentScope::from_request(text, &ctx(), None).unwrap();
        let fs = intent.filter_set(&scope).unwrap();
        assert_eq!(fs.entity, "Voucher");
        assert_eq!(fs.predicates[0].field, "VoucherType");
        assert_eq!(fs.predicates[0].value, serde_json::json!("Sales"));
        let range = fs.date_range.unwrap();
        assert_eq!(range.from, Some(d(2024, 7, 1)));
        assert_eq!(range.to, Some(d(2024, 7, 17)));
    }

    #[test]
    fn test_sales_defaults_to_twelve_months() {
        let intent = resolve("monthly revenue trend", &ctx());
        assert_eq!(intent, Intent::SalesTrend { months: 12 });

        let fs = intent.filter_set(&IntentScope::new(d(2024, 7, 17))).unwrap();
        assert_eq!(fs.date_range.unwrap().from, Some(d(2023, 8, 1)));
    }

    #[test]
    fn test_sales_month_count_is_clamped() {
        assert_eq!(
            resolve("sales for the last 6 months", &ctx()),
            Intent::SalesTrend { months: 6 }
        );
        assert_eq!(
            resolve("sales over the past 500 months", &ctx()),
            Intent::SalesTrend {
                months: MAX_TREND_MONTHS
            }
        );
    }

    #[test]
    fn test_top_customers() {
        assert_eq!(
            resolve("top customers", &ctx()),
            Intent::TopCustomers { count: 10 }
        );
        assert_eq!(
            resolve("Top 5 customers this year", &ctx()),
            Intent::TopCustomers { count: 5 }
        );
        assert_eq!(
            resolve("top 9999 customers", &ctx()),
            Intent::TopCustomers { count: MAX_TOP_N }
        );
        assert_eq!(
            resolve("customers by sales", &ctx()),
            Intent::TopCustomers { count: 10 }
        );
    }

    #[test]
    fn test_cash_flow() {
        assert_eq!(resolve("cash flow", &ctx()), Intent::CashFlow { days: 30 });
        assert_eq!(
            resolve("cashflow for the last 7 days", &ctx()),
            Intent::CashFlow { days: 7 }
        );
        assert_eq!(
            resolve("receipts and payments this month", &ctx()),
            Intent::CashFlow { days: 17 }
        );
    }

    #[test]
    fn test_expenses() {
        assert_eq!(
            resolve("expense breakdown", &ctx()),
            Intent::ExpenseBreakdown { group: None }
        );
        assert_eq!(
            resolve("where are my indirect expenses going", &ctx()),
            Intent::ExpenseBreakdown {
                group: Some("Indirect Expenses".to_string())
            }
        );
    }

    #[test]
    fn test_voucher_list_beats_sales() {
        assert_eq!(
            resolve("list sales vouchers", &ctx()),
            Intent::VoucherList {
                voucher_type: Some(VoucherType::Sales)
            }
        );
        assert_eq!(
            resolve("show recent transactions", &ctx()),
            Intent::VoucherList { voucher_type: None }
        );
    }

    #[test]
    fn test_raw_query_syntax_is_unrecognized() {
        for text in [
            "drop table Ledger",
            "SELECT * FROM Voucher",
            "sales; DELETE FROM Ledger",
            "top customers' OR 1=1 --",
            "sales union select Name from Company",
        ] {
            assert!(
                matches!(resolve(text, &ctx()), Intent::Unrecognized { .. }),
                "{} should be unrecognized",
                text
            );
        }
    }

    #[test]
    fn test_no_match_keeps_text() {
        assert_eq!(
            resolve("what is the weather", &ctx()),
            Intent::Unrecognized {
                text: "what is the weather".to_string()
            }
        );
        assert!(!resolve("   ", &ctx()).is_recognized());
        assert!(Intent::Unrecognized { text: String::new() }
            .filter_set(&IntentScope::new(d(2024, 1, 1)))
            .is_none());
    }

    #[test]
    fn test_rule_order() {
        assert_eq!(
            rule_names(),
            vec![
                "top_customers",
                "voucher_list",
                "cash_flow",
                "expense_breakdown",
                "sales_trend"
            ]
        );
    }

    #[test]
    fn test_dashboard_filters_override_scope() {
        let filters = DashboardFilters {
            company: Some("Beta Exports".to_string()),
            date_from: Some(d(2024, 4, 1)),
            voucher_type: Some("receipt".to_string()),
            ..Default::default()
        };
        let context = RequestContext {
            company: Some("Acme Traders".to_string()),
            ..ctx()
        };
        let text = "list payment vouchers this month";
        let scope = IntentScope::from_request(text, &context, Some(&filters)).unwrap();
        assert_eq!(scope.company.as_deref(), Some("Beta Exports"));
        assert_eq!(scope.voucher_type, Some(VoucherType::Receipt));

        let fs = resolve(text, &context).filter_set(&scope).unwrap();
        assert_eq!(fs.company.as_deref(), Some("Beta Exports"));
        assert_eq!(fs.predicates[0].value, serde_json::json!("Receipt"));
        assert_eq!(fs.date_range.unwrap().from, Some(d(2024, 4, 1)));
        assert_eq!(fs.limit, Some(VOUCHER_LIST_LIMIT));
    }

    #[test]
    fn test_unknown_dashboard_voucher_type() {
        let filters = DashboardFilters {
            voucher_type: Some("Memo".to_string()),
            ..Default::default()
        };
        let err = IntentScope::from_request("vouchers", &ctx(), Some(&filters)).unwrap_err();
        assert_eq!(err.code, ErrorCode::TypeMismatch);
    }

    #[test]
    fn test_cash_flow_filter_set() {
        let fs = Intent::CashFlow { days: 7 }
            .filter_set(&IntentScope::new(d(2024, 7, 17)))
            .unwrap();
        assert_eq!(fs.predicates[0].op, "in");
        assert_eq!(
            fs.predicates[0].value,
            serde_json::json!(["Receipt", "Payment"])
        );
        assert_eq!(fs.date_range.unwrap().from, Some(d(2024, 7, 11)));
    }
}
