//! Chart-ready aggregates computed from fetched rows.
//!
//! Aggregation happens in-process over rows that already passed the whitelist;
//! no aggregate SQL is ever sent to the source.

use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tallygate_common::models::{
    Aggregate, AggregateRow, ChartData, ChartType, Dataset, DateRange, RowSet,
};

use crate::vocabulary::VoucherType;

/// An aggregate and the chart drawn from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Summarized {
    pub aggregate: Aggregate,
    pub chart: ChartData,
}

fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn date(value: &Value) -> Option<NaiveDate> {
    value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d").ok())
}

fn text(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or_default()
}

/// Cell accessor that tolerates missing columns.
struct Columns<'a> {
    rows: &'a RowSet,
}

impl<'a> Columns<'a> {
    fn index(&self, name: &str) -> Option<usize> {
        self.rows.column_index(name)
    }

    fn cell(row: &'a [Value], idx: Option<usize>) -> &'a Value {
        idx.and_then(|i| row.get(i)).unwrap_or(&Value::Null)
    }
}

fn average(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        (total / Decimal::from(count)).round_dp(2)
    }
}

fn month_label(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_else(|| format!("{}-{:02}", year, month))
}

/// Every (year, month) from `from` to `to`, inclusive.
fn months_between(from: NaiveDate, to: NaiveDate) -> Vec<(i32, u32)> {
    let mut out = Vec::new();
    let (mut y, mut m) = (from.year(), from.month());
    while (y, m) <= (to.year(), to.month()) {
        out.push((y, m));
        if m == 12 {
            y += 1;
            m = 1;
        } else {
            m += 1;
        }
    }
    out
}

/// Monthly sales totals. Every month of `window` gets a bucket, empty months included.
pub fn sales_trend(rows: &RowSet, window: Option<DateRange>) -> Summarized {
    let cols = Columns { rows };
    let (date_idx, amount_idx) = (cols.index("Date"), cols.index("Amount"));

    let mut buckets: BTreeMap<(i32, u32), (Decimal, usize)> = BTreeMap::new();
    for row in &rows.rows {
        let Some(d) = date(Columns::cell(row, date_idx)) else {
            continue;
        };
        let amount = decimal(Columns::cell(row, amount_idx)).unwrap_or_default().abs();
        let bucket = buckets.entry((d.year(), d.month())).or_default();
        bucket.0 += amount;
        bucket.1 += 1;
    }

    let span = match window.and_then(|w| w.from.zip(w.to)) {
        Some((from, to)) => Some((from, to)),
        None => buckets
            .keys()
            .next()
            .zip(buckets.keys().next_back())
            .and_then(|(&(y0, m0), &(y1, m1))| {
                NaiveDate::from_ymd_opt(y0, m0, 1).zip(NaiveDate::from_ymd_opt(y1, m1, 1))
            }),
    };
    let months = span
        .map(|(from, to)| months_between(from, to))
        .unwrap_or_default();

    let mut total = Decimal::ZERO;
    let mut transactions = 0;
    let agg_rows: Vec<AggregateRow> = months
        .iter()
        .map(|key| {
            let (amount, count) = buckets.get(key).copied().unwrap_or_default();
            total += amount;
            transactions += count;
            AggregateRow {
                label: month_label(key.0, key.1),
                values: vec![amount, Decimal::from(count)],
            }
        })
        .collect();

    let mut summary = BTreeMap::new();
    summary.insert("total_sales".to_string(), total);
    summary.insert("months".to_string(), Decimal::from(agg_rows.len()));
    summary.insert("average_monthly".to_string(), average(total, agg_rows.len()));
    summary.insert("transactions".to_string(), Decimal::from(transactions));

    let chart = ChartData {
        chart_type: ChartType::Line,
        title: "Monthly Sales".to_string(),
        labels: agg_rows.iter().map(|r| r.label.clone()).collect(),
        datasets: vec![Dataset {
            label: "Sales".to_string(),
            data: agg_rows.iter().map(|r| to_f64(r.values[0])).collect(),
        }],
    };

    Summarized {
        aggregate: Aggregate {
            title: "Monthly Sales".to_string(),
            columns: vec!["Sales".to_string(), "Vouchers".to_string()],
            rows: agg_rows,
            summary,
            source_rows: rows.len(),
        },
        chart,
    }
}

/// Customers ranked by total sales, highest first. Ties break on name.
pub fn top_customers(rows: &RowSet, count: usize) -> Summarized {
    let cols = Columns { rows };
    let (party_idx, amount_idx) = (cols.index("PartyName"), cols.index("Amount"));

    let mut totals: HashMap<String, Decimal> = HashMap::new();
    for row in &rows.rows {
        let Some(party) = text(Columns::cell(row, party_idx)) else {
            continue;
        };
        let amount = decimal(Columns::cell(row, amount_idx)).unwrap_or_default().abs();
        *totals.entry(party.to_string()).or_default() += amount;
    }

    let customers = totals.len();
    let grand_total: Decimal = totals.values().copied().sum();
    let mut ranked: Vec<(String, Decimal)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(count);

    let top_total: Decimal = ranked.iter().map(|(_, v)| *v).sum();
    let share = if grand_total.is_zero() {
        Decimal::ZERO
    } else {
        (top_total * Decimal::ONE_HUNDRED / grand_total).round_dp(2)
    };

    let mut summary = BTreeMap::new();
    summary.insert("top_total".to_string(), top_total);
    summary.insert("customers".to_string(), Decimal::from(customers));
    summary.insert("share_percent".to_string(), share);
    summary.insert("average".to_string(), average(top_total, ranked.len()));

    let title = format!("Top {} Customers", count);
    let chart = ChartData {
        chart_type: ChartType::Bar,
        title: title.clone(),
        labels: ranked.iter().map(|(name, _)| name.clone()).collect(),
        datasets: vec![Dataset {
            label: "Sales".to_string(),
            data: ranked.iter().map(|(_, v)| to_f64(*v)).collect(),
        }],
    };

    Summarized {
        aggregate: Aggregate {
            title,
            columns: vec!["Sales".to_string()],
            rows: ranked
                .into_iter()
                .map(|(label, v)| AggregateRow {
                    label,
                    values: vec![v],
                })
                .collect(),
            summary,
            source_rows: rows.len(),
        },
        chart,
    }
}

/// Daily receipts (in), payments (out) and their difference.
pub fn cash_flow(rows: &RowSet) -> Summarized {
    let cols = Columns { rows };
    let (date_idx, type_idx, amount_idx) = (
        cols.index("Date"),
        cols.index("VoucherType"),
        cols.index("Amount"),
    );

    let mut days: BTreeMap<NaiveDate, (Decimal, Decimal)> = BTreeMap::new();
    for row in &rows.rows {
        let Some(d) = date(Columns::cell(row, date_idx)) else {
            continue;
        };
        let kind = text(Columns::cell(row, type_idx)).and_then(VoucherType::parse);
        let amount = decimal(Columns::cell(row, amount_idx)).unwrap_or_default().abs();
        let day = days.entry(d).or_default();
        match kind {
            Some(VoucherType::Receipt) => day.0 += amount,
            Some(VoucherType::Payment) => day.1 += amount,
            _ => {}
        }
    }

    let (mut total_in, mut total_out) = (Decimal::ZERO, Decimal::ZERO);
    let agg_rows: Vec<AggregateRow> = days
        .iter()
        .map(|(d, (inflow, outflow))| {
            total_in += *inflow;
            total_out += *outflow;
            AggregateRow {
                label: d.format("%Y-%m-%d").to_string(),
                values: vec![*inflow, *outflow, *inflow - *outflow],
            }
        })
        .collect();

    let mut summary = BTreeMap::new();
    summary.insert("total_inflow".to_string(), total_in);
    summary.insert("total_outflow".to_string(), total_out);
    summary.insert("net_flow".to_string(), total_in - total_out);
    summary.insert("days".to_string(), Decimal::from(agg_rows.len()));

    let series = |label: &str, col: usize| Dataset {
        label: label.to_string(),
        data: agg_rows.iter().map(|r| to_f64(r.values[col])).collect(),
    };
    let chart = ChartData {
        chart_type: ChartType::Line,
        title: "Daily Cash Flow".to_string(),
        labels: agg_rows.iter().map(|r| r.label.clone()).collect(),
        datasets: vec![series("Inflow", 0), series("Outflow", 1), series("Net", 2)],
    };

    Summarized {
        aggregate: Aggregate {
            title: "Daily Cash Flow".to_string(),
            columns: vec![
                "Inflow".to_string(),
                "Outflow".to_string(),
                "Net".to_string(),
            ],
            rows: agg_rows,
            summary,
            source_rows: rows.len(),
        },
        chart,
    }
}

/// Expense ledger balances summed per group, largest group first.
pub fn expense_breakdown(rows: &RowSet) -> Summarized {
    let cols = Columns { rows };
    let (parent_idx, balance_idx) = (cols.index("Parent"), cols.index("ClosingBalance"));

    let mut groups: HashMap<String, Decimal> = HashMap::new();
    for row in &rows.rows {
        let group = text(Columns::cell(row, parent_idx)).unwrap_or("Ungrouped");
        let balance = decimal(Columns::cell(row, balance_idx)).unwrap_or_default().abs();
        *groups.entry(group.to_string()).or_default() += balance;
    }

    let mut ranked: Vec<(String, Decimal)> = groups.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let total: Decimal = ranked.iter().map(|(_, v)| *v).sum();

    let mut summary = BTreeMap::new();
    summary.insert("total_expenses".to_string(), total);
    summary.insert("groups".to_string(), Decimal::from(ranked.len()));
    summary.insert("ledgers".to_string(), Decimal::from(rows.len()));

    let chart = ChartData {
        chart_type: ChartType::Pie,
        title: "Expenses by Group".to_string(),
        labels: ranked.iter().map(|(g, _)| g.clone()).collect(),
        datasets: vec![Dataset {
            label: "Expenses".to_string(),
            data: ranked.iter().map(|(_, v)| to_f64(*v)).collect(),
        }],
    };

    Summarized {
        aggregate: Aggregate {
            title: "Expenses by Group".to_string(),
            columns: vec!["Amount".to_string()],
            rows: ranked
                .into_iter()
                .map(|(label, v)| AggregateRow {
                    label,
                    values: vec![v],
                })
                .collect(),
            summary,
            source_rows: rows.len(),
        },
        chart,
    }
}

/// Row sets behind a financial summary, one per whitelisted query.
#[derive(Debug, Clone, Copy)]
pub struct FinancialInputs<'a> {
    pub revenue_ledgers: &'a RowSet,
    pub expense_ledgers: &'a RowSet,
    /// Receipt and payment vouchers.
    pub cash_vouchers: &'a RowSet,
    pub debtors: &'a RowSet,
    pub creditors: &'a RowSet,
}

fn column_total(rows: &RowSet, column: &str) -> Decimal {
    let idx = rows.column_index(column);
    rows.rows
        .iter()
        .filter_map(|row| decimal(Columns::cell(row, idx)))
        .map(|d| d.abs())
        .sum()
}

/// Headline figures: cash in and out, receivables, payables and profit.
pub fn financial_summary(inputs: FinancialInputs<'_>) -> Summarized {
    let cash = inputs.cash_vouchers;
    let (type_idx, amount_idx) = (cash.column_index("VoucherType"), cash.column_index("Amount"));
    let (mut receipts, mut payments) = (Decimal::ZERO, Decimal::ZERO);
    for row in &cash.rows {
        let amount = decimal(Columns::cell(row, amount_idx)).unwrap_or_default().abs();
        match text(Columns::cell(row, type_idx)).and_then(VoucherType::parse) {
            Some(VoucherType::Receipt) => receipts += amount,
            Some(VoucherType::Payment) => payments += amount,
            _ => {}
        }
    }

    let revenue = column_total(inputs.revenue_ledgers, "ClosingBalance");
    let expenses = column_total(inputs.expense_ledgers, "ClosingBalance");
    let debtors = column_total(inputs.debtors, "ClosingBalance");
    let creditors = column_total(inputs.creditors, "ClosingBalance");

    let figures = [
        ("Receipts", "total_receipts", receipts),
        ("Payments", "total_payments", payments),
        ("Cash Balance", "cash_balance", receipts - payments),
        ("Debtors", "total_debtors", debtors),
        ("Creditors", "total_creditors", creditors),
        ("Revenue", "total_revenue", revenue),
        ("Expenses", "total_expenses", expenses),
        ("Net Profit", "net_profit", revenue - expenses),
    ];

    let summary: BTreeMap<String, Decimal> = figures
        .iter()
        .map(|(_, key, value)| (key.to_string(), *value))
        .collect();
    let agg_rows: Vec<AggregateRow> = figures
        .iter()
        .map(|(label, _, value)| AggregateRow {
            label: label.to_string(),
            values: vec![*value],
        })
        .collect();

    let chart = ChartData {
        chart_type: ChartType::Bar,
        title: "Financial Summary".to_string(),
        labels: agg_rows.iter().map(|r| r.label.clone()).collect(),
        datasets: vec![Dataset {
            label: "Amount".to_string(),
            data: agg_rows.iter().map(|r| to_f64(r.values[0])).collect(),
        }],
    };

    Summarized {
        aggregate: Aggregate {
            title: "Financial Summary".to_string(),
            columns: vec!["Amount".to_string()],
            rows: agg_rows,
            summary,
            source_rows: inputs.revenue_ledgers.len()
                + inputs.expense_ledgers.len()
                + cash.len()
                + inputs.debtors.len()
                + inputs.creditors.len(),
        },
        chart,
    }
}

/// Closing stock value and item count per stock group, most valuable first.
pub fn stock_summary(rows: &RowSet) -> Summarized {
    let cols = Columns { rows };
    let (group_idx, value_idx) = (cols.index("StockGroup"), cols.index("ClosingValue"));

    let mut groups: HashMap<String, (Decimal, usize)> = HashMap::new();
    for row in &rows.rows {
        let group = text(Columns::cell(row, group_idx)).unwrap_or("Ungrouped");
        let value = decimal(Columns::cell(row, value_idx)).unwrap_or_default().abs();
        let entry = groups.entry(group.to_string()).or_default();
        entry.0 += value;
        entry.1 += 1;
    }

    let mut ranked: Vec<(String, (Decimal, usize))> = groups.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then_with(|| a.0.cmp(&b.0)));
    let total: Decimal = ranked.iter().map(|(_, (v, _))| *v).sum();

    let mut summary = BTreeMap::new();
    summary.insert("total_value".to_string(), total);
    summary.insert("groups".to_string(), Decimal::from(ranked.len()));
    summary.insert("items".to_string(), Decimal::from(rows.len()));

    let chart = ChartData {
        chart_type: ChartType::Pie,
        title: "Stock Value by Group".to_string(),
        labels: ranked.iter().map(|(g, _)| g.clone()).collect(),
        datasets: vec![Dataset {
            label: "Value".to_string(),
            data: ranked.iter().map(|(_, (v, _))| to_f64(*v)).collect(),
        }],
    };

    Summarized {
        aggregate: Aggregate {
            title: "Stock Summary".to_string(),
            columns: vec!["Value".to_string(), "Items".to_string()],
            rows: ranked
                .into_iter()
                .map(|(label, (value, count))| AggregateRow {
                    label,
                    values: vec![value, Decimal::from(count)],
                })
                .collect(),
            summary,
            source_rows: rows.len(),
        },
        chart,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn vouchers(rows: Vec<Vec<Value>>) -> RowSet {
        RowSet {
            columns: vec![
                "Date".to_string(),
                "VoucherType".to_string(),
                "Amount".to_string(),
                "PartyName".to_string(),
            ],
            rows,
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_sales_trend_fills_empty_months() {
        let rows = vouchers(vec![
            vec![json!("2024-05-03"), json!("Sales"), json!(1000), json!("Ravi Stores")],
            vec![json!("2024-05-20"), json!("Sales"), json!("250.50"), json!("Mehta & Sons")],
            vec![json!("2024-07-01"), json!("Sales"), json!(-400), json!("Ravi Stores")],
        ]);
        let window = DateRange {
            from: Some(d(2024, 5, 1)),
            to: Some(d(2024, 7, 17)),
        };
        let out = sales_trend(&rows, Some(window));

        let labels: Vec<&str> = out.aggregate.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["May 2024", "Jun 2024", "Jul 2024"]);
        assert_eq!(out.aggregate.rows[0].values[0], dec("1250.50"));
        assert_eq!(out.aggregate.rows[1].values[0], Decimal::ZERO);
        assert_eq!(out.aggregate.rows[2].values[0], dec("400"));
        assert_eq!(out.aggregate.summary["total_sales"], dec("1650.50"));
        assert_eq!(out.aggregate.summary["average_monthly"], dec("550.17"));
        assert_eq!(out.aggregate.source_rows, 3);
        assert_eq!(out.chart.chart_type, ChartType::Line);
        assert_eq!(out.chart.datasets[0].data, vec![1250.5, 0.0, 400.0]);
    }

    #[test]
    fn test_sales_trend_without_window_uses_data_span() {
        let rows = vouchers(vec![
            vec![json!("2024-01-10"), json!("Sales"), json!(10), json!("A")],
            vec![json!("2024-03-10"), json!("Sales"), json!(20), json!("B")],
        ]);
        let out = sales_trend(&rows, None);
        assert_eq!(out.aggregate.rows.len(), 3);

        let empty = sales_trend(&vouchers(vec![]), None);
        assert!(empty.aggregate.rows.is_empty());
        assert_eq!(empty.aggregate.summary["average_monthly"], Decimal::ZERO);
    }

    #[test]
    fn test_top_customers_ranks_and_truncates() {
        let rows = vouchers(vec![
            vec![json!("2024-05-03"), json!("Sales"), json!(100), json!("Beta")],
            vec![json!("2024-05-04"), json!("Sales"), json!(300), json!("Alpha")],
            vec![json!("2024-05-05"), json!("Sales"), json!(250), json!("Beta")],
            vec![json!("2024-05-06"), json!("Sales"), json!(50), json!("Gamma")],
            vec![json!("2024-05-07"), json!("Sales"), json!(80), Value::Null],
        ]);
        let out = top_customers(&rows, 2);
        let labels: Vec<&str> = out.aggregate.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Beta", "Alpha"]);
        assert_eq!(out.aggregate.summary["top_total"], dec("650"));
        assert_eq!(out.aggregate.summary["customers"], dec("3"));
        assert_eq!(out.aggregate.summary["share_percent"], dec("92.86"));
        assert_eq!(out.chart.chart_type, ChartType::Bar);
        assert_eq!(out.chart.title, "Top 2 Customers");
    }

    #[test]
    fn test_cash_flow_daily_net() {
        let rows = vouchers(vec![
            vec![json!("2024-07-02"), json!("Receipt"), json!(500), Value::Null],
            vec![json!("2024-07-02"), json!("Payment"), json!(200), Value::Null],
            vec![json!("2024-07-01"), json!("Payment"), json!(-75), Value::Null],
        ]);
        let out = cash_flow(&rows);
        assert_eq!(out.aggregate.rows[0].label, "2024-07-01");
        assert_eq!(
            out.aggregate.rows[1].values,
            vec![dec("500"), dec("200"), dec("300")]
        );
        assert_eq!(out.aggregate.summary["net_flow"], dec("225"));
        assert_eq!(out.chart.datasets.len(), 3);
        assert_eq!(out.chart.datasets[2].label, "Net");
    }

    #[test]
    fn test_expense_breakdown_groups() {
        let rows = RowSet {
            columns: vec![
                "Name".to_string(),
                "Parent".to_string(),
                "ClosingBalance".to_string(),
            ],
            rows: vec![
                vec![json!("Rent"), json!("Indirect Expenses"), json!(-12000)],
                vec![json!("Power"), json!("Indirect Expenses"), json!(-3000)],
                vec![json!("Freight"), json!("Direct Expenses"), json!(4500)],
            ],
        };
        let out = expense_breakdown(&rows);
        assert_eq!(out.aggregate.rows[0].label, "Indirect Expenses");
        assert_eq!(out.aggregate.rows[0].values, vec![dec("15000")]);
        assert_eq!(out.aggregate.summary["total_expenses"], dec("19500"));
        assert_eq!(out.chart.chart_type, ChartType::Pie);
    }

    fn balances(rows: Vec<(&str, i64)>) -> RowSet {
        RowSet {
            columns: vec!["Name".to_string(), "ClosingBalance".to_string()],
            rows: rows
                .into_iter()
                .map(|(name, balance)| vec![json!(name), json!(balance)])
                .collect(),
        }
    }

    #[test]
    fn test_financial_summary_figures() {
        let revenue = balances(vec![("Sales Account", -50000), ("Interest Received", -1500)]);
        let expenses = balances(vec![("Rent", 12000), ("Wages", 7500)]);
        let debtors = balances(vec![("Ravi Stores", 14999)]);
        let creditors = balances(vec![("Meena Agencies", -3200)]);
        let cash = vouchers(vec![
            vec![json!("2024-07-05"), json!("Receipt"), json!(4000), Value::Null],
            vec![json!("2024-07-06"), json!("Payment"), json!("1500.25"), Value::Null],
            vec![json!("2024-07-07"), json!("Sales"), json!(999), Value::Null],
        ]);

        let out = financial_summary(FinancialInputs {
            revenue_ledgers: &revenue,
            expense_ledgers: &expenses,
            cash_vouchers: &cash,
            debtors: &debtors,
            creditors: &creditors,
        });
        let s = &out.aggregate.summary;
        assert_eq!(s["total_receipts"], dec("4000"));
        assert_eq!(s["total_payments"], dec("1500.25"));
        assert_eq!(s["cash_balance"], dec("2499.75"));
        assert_eq!(s["total_debtors"], dec("14999"));
        assert_eq!(s["total_creditors"], dec("3200"));
        assert_eq!(s["total_revenue"], dec("51500"));
        assert_eq!(s["total_expenses"], dec("19500"));
        assert_eq!(s["net_profit"], dec("32000"));
        assert_eq!(out.aggregate.rows.len(), 8);
        assert_eq!(out.aggregate.rows[7].label, "Net Profit");
        assert_eq!(out.aggregate.source_rows, 9);
        assert_eq!(out.chart.chart_type, ChartType::Bar);
    }

    #[test]
    fn test_stock_summary_groups() {
        let rows = RowSet {
            columns: vec![
                "Name".to_string(),
                "StockGroup".to_string(),
                "ClosingValue".to_string(),
            ],
            rows: vec![
                vec![json!("Basmati 25kg"), json!("Grains"), json!(42000)],
                vec![json!("Toor Dal"), json!("Pulses"), json!(9000)],
                vec![json!("Sona Masoori"), json!("Grains"), json!("18000.50")],
                vec![json!("Jute Bags"), Value::Null, json!(600)],
            ],
        };
        let out = stock_summary(&rows);
        let labels: Vec<&str> = out.aggregate.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Grains", "Pulses", "Ungrouped"]);
        assert_eq!(out.aggregate.rows[0].values, vec![dec("60000.50"), dec("2")]);
        assert_eq!(out.aggregate.summary["total_value"], dec("69600.50"));
        assert_eq!(out.aggregate.summary["items"], dec("4"));
        assert_eq!(out.chart.chart_type, ChartType::Pie);
    }
}
