//! End-to-end requests through the executor against an in-memory fixture.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tallygate_common::config::{CacheSettings, ExecutionSettings, PoolSettings, RetrySettings};
use tallygate_common::models::{
    ChartType, DashboardFilters, FilterSet, QueryRequest, RequestContext, TextQuery,
};
use tallygate_error::ErrorContext;
use tallygate_connectors::sources::fixture::{FixtureConnector, FixtureData};
use tallygate_connectors::ConnectionPool;
use tallygate_error::ErrorCode;
use tallygate_runtime::{QueryExecutor, Report, ResultCache, Summary};

const FIXTURE: &str = r#"
companies:
  - name: Acme Traders
    tables:
      Company:
        - { Name: Acme Traders, StartOfBooks: "2024-04-01", Currency: INR }
      Ledger:
        - { Name: Rent, Parent: Indirect Expenses, ClosingBalance: 12000, IsExpense: true }
        - { Name: Wages, Parent: Direct Expenses, ClosingBalance: 7500, IsExpense: true }
        - { Name: Cash, Parent: Cash-in-Hand, ClosingBalance: 5000, IsExpense: false }
        - { Name: Ravi Stores, Parent: Sundry Debtors, ClosingBalance: 14999, IsExpense: false }
        - { Name: Meena Agencies, Parent: Sundry Debtors, ClosingBalance: 2500, IsExpense: false }
        - { Name: Kiran Suppliers, Parent: Sundry Creditors, ClosingBalance: -3200, IsExpense: false }
        - { Name: Sales Account, Parent: Sales Accounts, ClosingBalance: -17499, IsRevenue: true, IsExpense: false }
      Voucher:
        - { Date: "2024-06-20", VoucherNumber: S-1, VoucherType: Sales, Amount: 9999, PartyName: Ravi Stores }
        - { Date: "2024-07-02", VoucherNumber: S-2, VoucherType: Sales, Amount: 5000, PartyName: Ravi Stores }
        - { Date: "2024-07-10", VoucherNumber: S-3, VoucherType: Sales, Amount: 2500, PartyName: Meena Agencies }
        - { Date: "2024-07-05", VoucherNumber: R-1, VoucherType: Receipt, Amount: 4000, PartyName: Ravi Stores }
        - { Date: "2024-07-06", VoucherNumber: P-1, VoucherType: Payment, Amount: 1500, PartyName: Landlord }
      StockItem:
        - { Name: Basmati 25kg, StockGroup: Grains, ClosingStock: 40, ClosingValue: 42000, Unit: Bag }
        - { Name: Toor Dal, StockGroup: Pulses, ClosingStock: 90, ClosingValue: 9000, Unit: Kg }
        - { Name: Sona Masoori, StockGroup: Grains, ClosingStock: 30, ClosingValue: 18000, Unit: Bag }
"#;

fn executor(pool_size: usize) -> QueryExecutor {
    executor_over(FIXTURE, pool_size)
}

fn executor_over(fixture: &str, pool_size: usize) -> QueryExecutor {
    let data = FixtureData::from_yaml_str(fixture).unwrap();
    let pool = ConnectionPool::new(
        Arc::new(FixtureConnector::new("fixture", data)),
        PoolSettings {
            max_size: pool_size,
            acquire_timeout_ms: 2_000,
        },
        RetrySettings::default(),
    );
    let cache = Arc::new(ResultCache::new(CacheSettings::default()));
    QueryExecutor::new(
        pool,
        cache,
        ExecutionSettings::default(),
        RetrySettings::default(),
    )
}

fn ask(text: &str) -> TextQuery {
    TextQuery {
        query_text: text.to_string(),
        context: RequestContext {
            company: None,
            today: NaiveDate::from_ymd_opt(2024, 7, 17),
        },
        filters: None,
    }
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[tokio::test]
async fn test_sales_this_month() {
    let exec = executor(2);
    let resp = exec.ask(&ask("Show me sales for this month")).await;
    assert!(resp.success, "{}", resp.message);

    let agg = resp.aggregate().unwrap();
    assert_eq!(agg.summary["total_sales"], dec("7500"));
    assert_eq!(agg.summary["transactions"], dec("2"));
    assert_eq!(agg.rows.len(), 1);
    assert_eq!(agg.rows[0].label, "Jul 2024");

    let chart = resp.chart_data.unwrap();
    assert_eq!(chart.chart_type, ChartType::Line);
}

#[tokio::test]
async fn test_repeated_question_is_served_from_cache() {
    let exec = executor(2);
    let first = exec.ask(&ask("sales this month")).await;
    let second = exec.ask(&ask("sales this month")).await;
    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(first.aggregate(), second.aggregate());
}

#[tokio::test]
async fn test_top_customers() {
    let exec = executor(2);
    let resp = exec.ask(&ask("top 2 customers")).await;
    assert!(resp.success, "{}", resp.message);

    let agg = resp.aggregate().unwrap();
    assert_eq!(agg.rows[0].label, "Ravi Stores");
    assert_eq!(agg.summary["top_total"], dec("17499"));
    assert_eq!(agg.summary["share_percent"], dec("100"));
    assert_eq!(resp.chart_data.unwrap().title, "Top 2 Customers");
}

#[tokio::test]
async fn test_cash_flow() {
    let exec = executor(2);
    let resp = exec.ask(&ask("cash flow for the last 30 days")).await;
    assert!(resp.success, "{}", resp.message);

    let agg = resp.aggregate().unwrap();
    assert_eq!(agg.summary["total_inflow"], dec("4000"));
    assert_eq!(agg.summary["total_outflow"], dec("1500"));
    assert_eq!(agg.summary["net_flow"], dec("2500"));
    assert_eq!(resp.chart_data.unwrap().datasets.len(), 3);
}

#[tokio::test]
async fn test_expense_breakdown() {
    let exec = executor(2);
    let resp = exec.ask(&ask("expense breakdown")).await;
    assert!(resp.success, "{}", resp.message);

    let agg = resp.aggregate().unwrap();
    assert_eq!(agg.summary["total_expenses"], dec("19500"));
    assert_eq!(agg.summary["groups"], dec("2"));
    assert_eq!(resp.chart_data.unwrap().chart_type, ChartType::Pie);
}

#[tokio::test]
async fn test_dashboard_filters_override_text_window() {
    let exec = executor(2);
    let mut request = ask("sales this month");
    request.filters = Some(DashboardFilters {
        date_from: NaiveDate::from_ymd_opt(2024, 6, 1),
        ..Default::default()
    });
    let resp = exec.ask(&request).await;
    let agg = resp.aggregate().unwrap();
    assert_eq!(agg.summary["total_sales"], dec("17499"));
    assert_eq!(agg.rows.len(), 2);
}

#[tokio::test]
async fn test_voucher_list_returns_rows() {
    let exec = executor(2);
    let resp = exec.ask(&ask("list payment vouchers")).await;
    assert!(resp.success, "{}", resp.message);
    let rows = resp.rows().unwrap();
    assert_eq!(rows.len(), 1);
    let number = rows.column_index("VoucherNumber").unwrap();
    assert_eq!(rows.rows[0][number], serde_json::json!("P-1"));
}

#[tokio::test]
async fn test_raw_sql_text_is_not_executed() {
    let exec = executor(2);
    let resp = exec.ask(&ask("SELECT * FROM Ledger; DROP TABLE Ledger")).await;
    assert!(!resp.success);
    assert_eq!(resp.error_code, Some(ErrorCode::UnrecognizedIntent));
    assert_eq!(exec.pool_stats().opened, 0);
}

#[tokio::test]
async fn test_reports() {
    let exec = executor(2);

    let debtors = exec.run_report(&Report::SundryDebtors, None).await;
    assert!(debtors.success, "{}", debtors.message);
    let rows = debtors.rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.rows[0][0], serde_json::json!("Ravi Stores"));

    let companies = exec
        .run_report(&Report::from_name("companies").unwrap(), None)
        .await;
    assert_eq!(companies.rows().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_company_fails_without_retry() {
    let exec = executor(2);
    let mut filters = FilterSet::new("Ledger").field("Name");
    filters.company = Some("Nobody Ltd".to_string());
    let resp = exec.handle(&QueryRequest::Structured(filters)).await;
    assert!(!resp.success);
    assert_eq!(resp.error_code, Some(ErrorCode::ProtocolError));
}

#[tokio::test]
async fn test_concurrent_requests_share_a_bounded_pool() {
    let exec = Arc::new(executor(2));

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let exec = exec.clone();
            tokio::spawn(async move {
                // Distinct limits keep every request off the cache.
                let filters = FilterSet::new("Voucher").field("Amount").limit(i + 1);
                exec.execute_filters(&filters).await
            })
        })
        .collect();

    for resp in futures::future::join_all(handles).await {
        let resp = resp.unwrap();
        assert!(resp.success, "{}", resp.message);
    }

    let stats = exec.pool_stats();
    assert!(stats.opened <= 2, "opened {} sessions", stats.opened);
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.acquire_timeouts, 0);
}

/// 5000 small sales plus one large sale later in the year.
fn busy_shop() -> String {
    let mut yaml = String::from("companies:\n  - name: Busy Mart\n    tables:\n      Voucher:\n");
    for i in 0..5000 {
        yaml.push_str(&format!(
            "        - {{ Date: \"2024-01-{:02}\", VoucherNumber: S-{}, VoucherType: Sales, Amount: 1, PartyName: Small }}\n",
            i % 28 + 1,
            i
        ));
    }
    yaml.push_str(
        "        - { Date: \"2024-07-10\", VoucherNumber: W-1, VoucherType: Sales, Amount: 1000000, PartyName: Whale }\n",
    );
    yaml
}

#[tokio::test]
async fn test_aggregate_over_row_limit_is_refused() {
    let exec = executor_over(&busy_shop(), 2);

    let resp = exec.ask(&ask("top 5 customers")).await;
    assert!(!resp.success, "partial totals reported as success: {}", resp.message);
    assert_eq!(resp.error_code, Some(ErrorCode::AggregateInputTruncated));
    assert!(!resp.retryable);
    assert!(resp.hint.unwrap().contains("Narrow the date window"));
    assert!(resp.query_id.is_some());
    match resp.error_context {
        Some(ErrorContext::Bound { requested, maximum }) => {
            assert_eq!(requested, 5000);
            assert_eq!(maximum, 5000);
        }
        other => panic!("unexpected context: {:?}", other),
    }

    // A narrower window fits under the limit and finds the large customer.
    let resp = exec.ask(&ask("top 5 customers this month")).await;
    assert!(resp.success, "{}", resp.message);
    let agg = resp.aggregate().unwrap();
    assert_eq!(agg.rows[0].label, "Whale");
    assert_eq!(agg.summary["top_total"], dec("1000000"));
}

#[tokio::test]
async fn test_financial_summary() {
    let exec = executor(2);
    let resp = exec.financial_summary(None, None).await;
    assert!(resp.success, "{}", resp.message);

    let s = &resp.aggregate().unwrap().summary;
    assert_eq!(s["total_receipts"], dec("4000"));
    assert_eq!(s["total_payments"], dec("1500"));
    assert_eq!(s["cash_balance"], dec("2500"));
    assert_eq!(s["total_debtors"], dec("17499"));
    assert_eq!(s["total_creditors"], dec("3200"));
    assert_eq!(s["total_revenue"], dec("17499"));
    assert_eq!(s["total_expenses"], dec("19500"));
    assert_eq!(s["net_profit"], dec("-2001"));
    assert!(!resp.cache_hit);

    let again = exec.run_summary(Summary::Financial, &RequestContext::default(), None).await;
    assert!(again.cache_hit);
    assert_eq!(again.aggregate(), resp.aggregate());
}

#[tokio::test]
async fn test_stock_summary() {
    let exec = executor(2);
    let resp = exec.stock_summary(None).await;
    assert!(resp.success, "{}", resp.message);

    let agg = resp.aggregate().unwrap();
    assert_eq!(agg.rows[0].label, "Grains");
    assert_eq!(agg.rows[0].values, vec![dec("60000"), dec("2")]);
    assert_eq!(agg.summary["total_value"], dec("69000"));
    assert_eq!(agg.summary["groups"], dec("2"));
}

#[tokio::test]
async fn test_dashboard_sections() {
    let exec = executor(2);
    let context = RequestContext {
        company: None,
        today: NaiveDate::from_ymd_opt(2024, 7, 17),
    };
    let resp = exec.dashboard(&context, None).await;
    assert!(resp.success, "{}", resp.message);

    let dashboard = resp.dashboard().unwrap();
    assert_eq!(dashboard.sections.len(), 6);
    assert_eq!(dashboard.failed(), 0);

    let vouchers = dashboard.section("recent_vouchers").unwrap();
    assert_eq!(vouchers.rows().unwrap().len(), 5);
    let trend = dashboard.section("sales_trend").unwrap().aggregate().unwrap();
    assert_eq!(trend.rows.len(), 6);
    assert_eq!(trend.summary["total_sales"], dec("17499"));
    let customers = dashboard.section("top_customers").unwrap().aggregate().unwrap();
    assert_eq!(customers.rows[0].label, "Ravi Stores");
    let financial = dashboard.section("financial_summary").unwrap().aggregate().unwrap();
    assert_eq!(financial.summary["net_profit"], dec("-2001"));
}

#[tokio::test]
async fn test_dashboard_sections_fail_independently() {
    let exec = executor(2);
    let filters = DashboardFilters {
        company: Some("Nobody Ltd".to_string()),
        ..Default::default()
    };
    let resp = exec
        .run_summary(Summary::Dashboard, &RequestContext::default(), Some(&filters))
        .await;
    assert!(resp.success);
    assert!(resp.message.contains("6 of 6 sections failed"));
    let dashboard = resp.dashboard().unwrap();
    let section = dashboard.section("sales_trend").unwrap();
    assert_eq!(section.error_code, Some(ErrorCode::ProtocolError));
    assert_eq!(section.stage.as_deref(), Some("executing"));

    let bad_type = DashboardFilters {
        voucher_type: Some("Memo".to_string()),
        ..Default::default()
    };
    let resp = exec.dashboard(&RequestContext::default(), Some(&bad_type)).await;
    assert!(!resp.success);
    assert_eq!(resp.error_code, Some(ErrorCode::TypeMismatch));
}
