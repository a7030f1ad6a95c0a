//! Query executor.
//!
//! Drives one request through
//! `Building → Validating → CacheCheck → (hit → Done) | (miss → Acquiring → Executing → Storing → Done)`.
//! Any stage may fail; failures become an unsuccessful [`QueryResponse`].
//!
//! The session is handed back to the pool as soon as execution finishes, before
//! the result is stored, so a failing store never strands a session. Dropping
//! an in-flight request drops its session, which frees the pool slot.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tallygate_common::config::{ExecutionSettings, RetrySettings};
use tallygate_common::models::{
    ChartData, Dashboard, DashboardFilters, DashboardSection, DateRange, FilterSet, QueryRequest,
    QueryResponse, RequestContext, ResponseData, RowSet, TextQuery,
};
use tallygate_common::retry::retry_async_if;
use tallygate_common::scrubber::scrub_truncated;
use tallygate_connectors::{ConnectionPool, ExecutionError, PoolError, PoolStats};
use tallygate_error::{ErrorCode, ErrorContext, GateError};
use tallygate_sql::{validate, CanonicalQuery, Entity, Fingerprint, QueryBuilder, ValidationVerdict};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregate::{self, FinancialInputs, Summarized};
use crate::cache::{CacheStats, ResultCache};
use crate::intent::{Intent, IntentClassifier, IntentScope, PatternClassifier};
use crate::reports::{stock_summary_query, FinancialQueries, Report, Summary};

/// Longest slice of request text echoed back in errors or logs.
const ECHO_CHARS: usize = 80;

const DASHBOARD_RECENT_VOUCHERS: usize = 10;
const DASHBOARD_TOP_CUSTOMERS: usize = 5;
const DASHBOARD_TREND_MONTHS: u32 = 6;
const DASHBOARD_CASH_FLOW_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStage {
    Building,
    Validating,
    CacheCheck,
    Acquiring,
    Executing,
    Storing,
    Done,
}

impl fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStage::Building => "building",
            ExecutionStage::Validating => "validating",
            ExecutionStage::CacheCheck => "cache_check",
            ExecutionStage::Acquiring => "acquiring",
            ExecutionStage::Executing => "executing",
            ExecutionStage::Storing => "storing",
            ExecutionStage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Rows for one canonical query, fresh or cached.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub query: CanonicalQuery,
    pub rows: Arc<RowSet>,
    pub cache_hit: bool,
}

struct Answer {
    message: String,
    data: ResponseData,
    chart: Option<ChartData>,
    cache_hit: bool,
}

impl Answer {
    fn summarized(summary: Summarized, cache_hit: bool) -> Self {
        Self {
            message: format!(
                "{} computed from {} record(s)",
                summary.aggregate.title, summary.aggregate.source_rows
            ),
            data: ResponseData::Aggregate(summary.aggregate),
            chart: Some(summary.chart),
            cache_hit,
        }
    }
}

fn respond(result: Result<Answer, GateError>, started: Instant) -> QueryResponse {
    match result {
        Ok(a) => QueryResponse::success(a.message, a.data, a.chart, a.cache_hit, elapsed_ms(started)),
        Err(e) => QueryResponse::failure(e, elapsed_ms(started)),
    }
}

#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Pool(PoolError),
    #[error(transparent)]
    Execution(ExecutionError),
}

impl AttemptError {
    /// The pool already retries session opens, so only execution failures are retried here.
    fn is_transient(&self) -> bool {
        match self {
            AttemptError::Pool(_) => false,
            AttemptError::Execution(e) => e.is_transient(),
        }
    }
}

pub struct QueryExecutor {
    pool: ConnectionPool,
    cache: Arc<ResultCache>,
    builder: QueryBuilder,
    classifier: Arc<dyn IntentClassifier>,
    execution_timeout: Duration,
    retry: RetrySettings,
}

impl QueryExecutor {
    pub fn new(
        pool: ConnectionPool,
        cache: Arc<ResultCache>,
        execution: ExecutionSettings,
        retry: RetrySettings,
    ) -> Self {
        Self {
            pool,
            cache,
            builder: QueryBuilder::new(execution.default_limit),
            classifier: Arc::new(PatternClassifier),
            execution_timeout: Duration::from_millis(execution.timeout_ms),
            retry,
        }
    }

    /// Company used when a request names none.
    pub fn with_default_company(mut self, company: Option<String>) -> Self {
        self.builder = self.builder.with_default_company(company);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Entry point for the inbound union.
    pub async fn handle(&self, request: &QueryRequest) -> QueryResponse {
        match request {
            QueryRequest::Text(text) => self.ask(text).await,
            QueryRequest::Structured(filters) => self.execute_filters(filters).await,
        }
    }

    /// Run a structured filter set and return its rows.
    pub async fn execute_filters(&self, filters: &FilterSet) -> QueryResponse {
        let started = Instant::now();
        match self.fetch(filters).await {
            Ok(fetched) => {
                let message = format!(
                    "Retrieved {} {} record(s)",
                    fetched.rows.len(),
                    fetched.query.entity
                );
                QueryResponse::success(
                    message,
                    ResponseData::Rows((*fetched.rows).clone()),
                    None,
                    fetched.cache_hit,
                    elapsed_ms(started),
                )
            }
            Err(e) => QueryResponse::failure(e, elapsed_ms(started)),
        }
    }

    /// Run a named report.
    pub async fn run_report(&self, report: &Report, company: Option<String>) -> QueryResponse {
        info!(target: "queries", report = report.name(), "Running report");
        self.execute_filters(&report.filter_set(company, None)).await
    }

    /// Classify free text, fetch the rows its intent needs and summarize them.
    pub async fn ask(&self, request: &TextQuery) -> QueryResponse {
        let started = Instant::now();
        respond(self.answer(request).await, started)
    }

    async fn answer(&self, request: &TextQuery) -> Result<Answer, GateError> {
        let text = &request.query_text;
        let intent = self.classifier.classify(text, &request.context);
        info!(
            target: "queries",
            intent = intent.kind(),
            text = %scrub_truncated(text, ECHO_CHARS),
            "Resolved intent"
        );
        if !intent.is_recognized() {
            return Err(unrecognized(text));
        }

        let scope = IntentScope::from_request(text, &request.context, request.filters.as_ref())?;
        self.answer_intent(&intent, &scope).await
    }

    async fn answer_intent(&self, intent: &Intent, scope: &IntentScope) -> Result<Answer, GateError> {
        let Some(filters) = intent.filter_set(scope) else {
            let text = match intent {
                Intent::Unrecognized { text } => text.as_str(),
                _ => "",
            };
            return Err(unrecognized(text));
        };

        if let Intent::VoucherList { .. } = intent {
            let fetched = self.fetch(&filters).await?;
            return Ok(Answer {
                message: format!("Retrieved {} voucher(s)", fetched.rows.len()),
                data: ResponseData::Rows((*fetched.rows).clone()),
                chart: None,
                cache_hit: fetched.cache_hit,
            });
        }

        let fetched = self.fetch_complete(&filters).await?;
        let rows = &fetched.rows;
        let summary = match intent {
            Intent::SalesTrend { .. } => aggregate::sales_trend(rows, filters.date_range),
            Intent::TopCustomers { count } => aggregate::top_customers(rows, *count),
            Intent::CashFlow { .. } => aggregate::cash_flow(rows),
            Intent::ExpenseBreakdown { .. } => aggregate::expense_breakdown(rows),
            Intent::VoucherList { .. } | Intent::Unrecognized { .. } => {
                return Err(GateError::new(
                    ErrorCode::Internal,
                    format!("intent '{}' has no aggregate", intent.kind()),
                ))
            }
        };
        Ok(Answer::summarized(summary, fetched.cache_hit))
    }

    /// Receipts, payments, receivables, payables and profit in one aggregate.
    /// `window` restricts the cash figures; balances are as of today.
    pub async fn financial_summary(
        &self,
        company: Option<String>,
        window: Option<DateRange>,
    ) -> QueryResponse {
        let started = Instant::now();
        respond(self.financial_answer(company, window).await, started)
    }

    async fn financial_answer(
        &self,
        company: Option<String>,
        window: Option<DateRange>,
    ) -> Result<Answer, GateError> {
        let queries = FinancialQueries::new(company, window);
        let (revenue, expenses, cash, debtors, creditors) = tokio::try_join!(
            self.fetch_complete(&queries.revenue_ledgers),
            self.fetch_complete(&queries.expense_ledgers),
            self.fetch_complete(&queries.cash_vouchers),
            self.fetch_complete(&queries.debtors),
            self.fetch_complete(&queries.creditors),
        )?;

        let summary = aggregate::financial_summary(FinancialInputs {
            revenue_ledgers: &*revenue.rows,
            expense_ledgers: &*expenses.rows,
            cash_vouchers: &*cash.rows,
            debtors: &*debtors.rows,
            creditors: &*creditors.rows,
        });
        let cache_hit = [&revenue, &expenses, &cash, &debtors, &creditors]
            .iter()
            .all(|f| f.cache_hit);
        Ok(Answer::summarized(summary, cache_hit))
    }

    /// Closing stock value and item count per stock group.
    pub async fn stock_summary(&self, company: Option<String>) -> QueryResponse {
        let started = Instant::now();
        let result = self
            .fetch_complete(&stock_summary_query(company))
            .await
            .map(|fetched| {
                Answer::summarized(aggregate::stock_summary(&fetched.rows), fetched.cache_hit)
            });
        respond(result, started)
    }

    /// Every dashboard section in one response. Sections run concurrently on
    /// the shared pool, and a failed section does not fail the others.
    pub async fn dashboard(
        &self,
        context: &RequestContext,
        filters: Option<&DashboardFilters>,
    ) -> QueryResponse {
        let started = Instant::now();
        let scope = match IntentScope::from_request("", context, filters) {
            Ok(scope) => scope,
            Err(e) => return QueryResponse::failure(e, elapsed_ms(started)),
        };

        let recent = Report::Vouchers {
            voucher_type: scope.voucher_type,
            from: scope.window.and_then(|w| w.from),
            to: scope.window.and_then(|w| w.to),
        }
        .filter_set(scope.company.clone(), Some(DASHBOARD_RECENT_VOUCHERS));

        let (financial, vouchers, customers, trend, cash, expenses) = tokio::join!(
            self.financial_summary(scope.company.clone(), scope.window),
            self.execute_filters(&recent),
            self.section(Intent::TopCustomers { count: DASHBOARD_TOP_CUSTOMERS }, &scope),
            self.section(Intent::SalesTrend { months: DASHBOARD_TREND_MONTHS }, &scope),
            self.section(Intent::CashFlow { days: DASHBOARD_CASH_FLOW_DAYS }, &scope),
            self.section(Intent::ExpenseBreakdown { group: None }, &scope),
        );

        let sections: Vec<DashboardSection> = [
            ("financial_summary", financial),
            ("recent_vouchers", vouchers),
            ("top_customers", customers),
            ("sales_trend", trend),
            ("cash_flow", cash),
            ("expense_breakdown", expenses),
        ]
        .into_iter()
        .map(|(name, response)| DashboardSection {
            name: name.to_string(),
            response,
        })
        .collect();

        let dashboard = Dashboard { sections };
        let failed = dashboard.failed();
        let total = dashboard.sections.len();
        let cache_hit = dashboard.sections.iter().all(|s| s.response.cache_hit);
        let message = if failed == 0 {
            format!("Dashboard refreshed, {} sections", total)
        } else {
            warn!(target: "queries", failed, total, "Dashboard sections failed");
            format!("Dashboard refreshed, {} of {} sections failed", failed, total)
        };

        QueryResponse::success(
            message,
            ResponseData::Dashboard(dashboard),
            None,
            cache_hit,
            elapsed_ms(started),
        )
    }

    async fn section(&self, intent: Intent, scope: &IntentScope) -> QueryResponse {
        let started = Instant::now();
        respond(self.answer_intent(&intent, scope).await, started)
    }

    /// Run a summary. Company and window come from `filters`, then `context`.
    pub async fn run_summary(
        &self,
        summary: Summary,
        context: &RequestContext,
        filters: Option<&DashboardFilters>,
    ) -> QueryResponse {
        info!(target: "queries", summary = summary.name(), "Running summary");
        let company = filters
            .and_then(|f| f.company.clone())
            .or_else(|| context.company.clone());
        match summary {
            Summary::Financial => {
                let window = filters
                    .filter(|f| f.date_from.is_some() || f.date_to.is_some())
                    .map(|f| DateRange {
                        from: f.date_from,
                        to: f.date_to,
                    });
                self.financial_summary(company, window).await
            }
            Summary::Stock => self.stock_summary(company).await,
            Summary::Dashboard => self.dashboard(context, filters).await,
        }
    }

    /// Fetch rows for an in-process aggregate. A row set that reached its limit
    /// is refused, since totals over it would silently leave rows out.
    async fn fetch_complete(&self, filters: &FilterSet) -> Result<Fetched, GateError> {
        let fetched = self.fetch(filters).await?;
        let limit = fetched.query.limit;
        if limit == 0 || fetched.rows.len() < limit {
            return Ok(fetched);
        }

        let query_id = Fingerprint::of(&fetched.query).short();
        warn!(
            target: "queries",
            entity = %fetched.query.entity,
            rows = fetched.rows.len(),
            query_id = %query_id,
            "Aggregate input reached the row limit"
        );
        Err(GateError::new(
            ErrorCode::AggregateInputTruncated,
            format!(
                "{} rows matched at least {} records, too many to aggregate completely",
                fetched.query.entity, limit
            ),
        )
        .with_context(ErrorContext::Bound {
            requested: fetched.rows.len(),
            maximum: limit,
        })
        .with_hint("Narrow the date window, or filter by company, voucher type or group")
        .for_query(query_id))
    }

    /// Build, validate, then serve from cache or the source.
    pub async fn fetch(&self, filters: &FilterSet) -> Result<Fetched, GateError> {
        let started = Instant::now();
        let mut stage = ExecutionStage::Building;
        let mut query_id = None;
        match self.run(filters, &mut stage, &mut query_id).await {
            Ok(fetched) => {
                info!(
                    target: "queries",
                    entity = %fetched.query.entity,
                    rows = fetched.rows.len(),
                    cache_hit = fetched.cache_hit,
                    duration_ms = elapsed_ms(started),
                    "Query completed"
                );
                Ok(fetched)
            }
            Err(e) => {
                let mut e = e.at_stage(stage);
                if let Some(id) = query_id {
                    e = e.for_query(id);
                }
                warn!(
                    target: "queries",
                    stage = %stage,
                    code = %e.code,
                    query_id = e.query_id.as_deref().unwrap_or("-"),
                    retryable = e.is_retryable(),
                    duration_ms = elapsed_ms(started),
                    "Query failed: {}",
                    e.message
                );
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        filters: &FilterSet,
        stage: &mut ExecutionStage,
        query_id: &mut Option<String>,
    ) -> Result<Fetched, GateError> {
        *stage = ExecutionStage::Building;
        let query = self.builder.build(filters)?;

        *stage = ExecutionStage::Validating;
        if let ValidationVerdict::Deny(reason) = validate(&query) {
            warn!(
                target: "security",
                entity = %query.entity,
                reason = reason.kind(),
                "Query denied: {}",
                reason
            );
            return Err(reason.into());
        }

        *stage = ExecutionStage::CacheCheck;
        let fingerprint = Fingerprint::of(&query);
        *query_id = Some(fingerprint.short());
        if let Some(entry) = self.cache.get(&fingerprint).await {
            *stage = ExecutionStage::Done;
            return Ok(Fetched {
                query,
                rows: entry.rows,
                cache_hit: true,
            });
        }

        *stage = ExecutionStage::Acquiring;
        let rows = Arc::new(self.execute_with_retry(&query, stage).await?);

        *stage = ExecutionStage::Storing;
        let ttl = self.cache.ttl_for(query.entity);
        if let Err(e) = self.cache.put(fingerprint, rows.clone(), ttl).await {
            warn!(target: "cache", key = %fingerprint.short(), error = %e, "Result not cached");
        }

        *stage = ExecutionStage::Done;
        Ok(Fetched {
            query,
            rows,
            cache_hit: false,
        })
    }

    async fn execute_with_retry(
        &self,
        query: &CanonicalQuery,
        stage: &mut ExecutionStage,
    ) -> Result<RowSet, GateError> {
        let attempts = AtomicU32::new(0);
        let result = retry_async_if(
            "execute query",
            self.retry,
            || {
                attempts.fetch_add(1, Ordering::Relaxed);
                self.attempt(query)
            },
            AttemptError::is_transient,
        )
        .await;

        let source = self.pool.source_name();
        result.map_err(|e| match e {
            AttemptError::Pool(e) => e.into_gate_error(source),
            AttemptError::Execution(e) => {
                *stage = ExecutionStage::Executing;
                e.into_gate_error(source, attempts.load(Ordering::Relaxed))
            }
        })
    }

    /// One acquire-execute-release cycle. The session goes back healthy only on success.
    async fn attempt(&self, query: &CanonicalQuery) -> Result<RowSet, AttemptError> {
        let mut session = self.pool.get().await.map_err(AttemptError::Pool)?;

        let outcome = match tokio::time::timeout(self.execution_timeout, session.execute(query)).await
        {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::Timeout {
                after_ms: self.execution_timeout.as_millis() as u64,
            }),
        };

        session.release(outcome.is_ok());
        if let Err(e) = &outcome {
            debug!(target: "pool", error = %e, "Session discarded after failed execution");
        }
        outcome.map_err(AttemptError::Execution)
    }

    /// Acquire a session, ping it and give it back.
    pub async fn test_connection(&self) -> QueryResponse {
        let started = Instant::now();
        let source = self.pool.source_name().to_string();

        let mut session = match self.pool.get().await {
            Ok(session) => session,
            Err(e) => return QueryResponse::failure(e.into_gate_error(&source), elapsed_ms(started)),
        };
        let ping = match tokio::time::timeout(self.execution_timeout, session.ping()).await {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::Timeout {
                after_ms: self.execution_timeout.as_millis() as u64,
            }),
        };
        session.release(ping.is_ok());

        let ms = elapsed_ms(started);
        match ping {
            Ok(()) => {
                info!(target: "pool", source = %source, response_time_ms = ms, "Connection test passed");
                let rows = RowSet {
                    columns: vec!["source".to_string(), "response_time_ms".to_string()],
                    rows: vec![vec![source.clone().into(), ms.into()]],
                };
                QueryResponse::success(
                    format!("Connected to '{}' in {} ms", source, ms),
                    ResponseData::Rows(rows),
                    None,
                    false,
                    ms,
                )
            }
            Err(e) => QueryResponse::failure(e.into_gate_error(&source, 1), ms),
        }
    }

    /// Drop cached results for an entity after it changed at the source.
    pub fn invalidate(&self, entity: Entity) -> Result<(), GateError> {
        Ok(self.cache.invalidate(entity)?)
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn unrecognized(text: &str) -> GateError {
    GateError::new(
        ErrorCode::UnrecognizedIntent,
        "Could not understand the request",
    )
    .with_context(ErrorContext::Intent {
        text: scrub_truncated(text, ECHO_CHARS),
    })
    .with_hint(
        "Try 'sales for the last 6 months', 'top 5 customers', 'cash flow this month', \
         'expense breakdown' or 'list payment vouchers'",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tallygate_common::config::{CacheSettings, PoolSettings};
    use tallygate_connectors::{ConnectError, Connector, SourceSession};

    /// Counts executions; fails the first `failures` of them with `error`.
    struct ScriptedConnector {
        executions: Arc<AtomicUsize>,
        failures: usize,
        error: ExecutionError,
    }

    struct ScriptedSession {
        executions: Arc<AtomicUsize>,
        failures: usize,
        error: ExecutionError,
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn connect(&self) -> Result<Box<dyn SourceSession>, ConnectError> {
            Ok(Box::new(ScriptedSession {
                executions: self.executions.clone(),
                failures: self.failures,
                error: self.error.clone(),
            }))
        }
    }

    #[async_trait]
    impl SourceSession for ScriptedSession {
        async fn execute(&mut self, _query: &CanonicalQuery) -> Result<RowSet, ExecutionError> {
            let n = self.executions.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(self.error.clone());
            }
            Ok(RowSet {
                columns: vec!["Name".to_string()],
                rows: vec![vec![serde_json::json!("Cash")]],
            })
        }

        async fn ping(&mut self) -> Result<(), ExecutionError> {
            Ok(())
        }
    }

    fn executor(failures: usize, error: ExecutionError) -> (QueryExecutor, Arc<AtomicUsize>) {
        let executions = Arc::new(AtomicUsize::new(0));
        let connector = Arc::new(ScriptedConnector {
            executions: executions.clone(),
            failures,
            error,
        });
        let retry = RetrySettings {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        let pool = ConnectionPool::new(
            connector,
            PoolSettings {
                max_size: 2,
                acquire_timeout_ms: 200,
            },
            retry,
        );
        let cache = Arc::new(ResultCache::new(CacheSettings::default()));
        let exec = QueryExecutor::new(pool, cache, ExecutionSettings::default(), retry);
        (exec, executions)
    }

    fn ledgers() -> FilterSet {
        FilterSet::new("Ledger").field("Name")
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let (exec, executions) = executor(2, ExecutionError::ConnectivityLost("reset".into()));
        let resp = exec.execute_filters(&ledgers()).await;
        assert!(resp.success, "{}", resp.message);
        assert_eq!(executions.load(Ordering::SeqCst), 3);
        // Failed sessions were discarded, the successful one is idle again.
        let stats = exec.pool_stats();
        assert_eq!(stats.discarded, 2);
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.in_use, 0);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let (exec, executions) = executor(10, ExecutionError::ConnectivityLost("reset".into()));
        let resp = exec.execute_filters(&ledgers()).await;
        assert!(!resp.success);
        assert!(resp.retryable);
        assert_eq!(resp.error_code, Some(ErrorCode::ConnectivityLost));
        assert_eq!(executions.load(Ordering::SeqCst), 3);
        assert_eq!(exec.pool_stats().in_use, 0);
    }

    #[tokio::test]
    async fn test_protocol_error_not_retried() {
        let (exec, executions) = executor(10, ExecutionError::ProtocolError("bad body".into()));
        let resp = exec.execute_filters(&ledgers()).await;
        assert_eq!(resp.error_code, Some(ErrorCode::ProtocolError));
        assert!(!resp.retryable);
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert_eq!(exec.pool_stats().discarded, 1);
        assert_eq!(resp.stage.as_deref(), Some("executing"));
        let query = QueryBuilder::default().build(&ledgers()).unwrap();
        assert_eq!(resp.query_id, Some(Fingerprint::of(&query).short()));
    }

    #[tokio::test]
    async fn test_second_identical_request_hits_cache() {
        let (exec, executions) = executor(0, ExecutionError::ProtocolError(String::new()));
        let first = exec.execute_filters(&ledgers()).await;
        let second = exec.execute_filters(&ledgers()).await;
        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(first.rows(), second.rows());
        assert_eq!(executions.load(Ordering::SeqCst), 1);

        exec.invalidate(Entity::Ledger).unwrap();
        let third = exec.execute_filters(&ledgers()).await;
        assert!(!third.cache_hit);
        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_field_never_reaches_source() {
        let (exec, executions) = executor(0, ExecutionError::ProtocolError(String::new()));
        let resp = exec
            .execute_filters(&FilterSet::new("Ledger").field("Passwrd"))
            .await;
        assert_eq!(resp.error_code, Some(ErrorCode::UnknownField));
        assert_eq!(resp.stage.as_deref(), Some("building"));
        assert!(resp.query_id.is_none());
        assert_eq!(executions.load(Ordering::SeqCst), 0);
        assert_eq!(exec.pool_stats().opened, 0);
    }

    #[tokio::test]
    async fn test_limit_above_ceiling_denied() {
        let (exec, executions) = executor(0, ExecutionError::ProtocolError(String::new()));
        let resp = exec.execute_filters(&ledgers().limit(1_000_000)).await;
        assert!(!resp.success);
        assert_eq!(resp.error_code, Some(ErrorCode::LimitExceedsCeiling));
        assert!(resp.message.contains("limit exceeds ceiling"));
        assert_eq!(executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_text_is_scrubbed() {
        let (exec, _) = executor(0, ExecutionError::ProtocolError(String::new()));
        let resp = exec
            .ask(&TextQuery {
                query_text: "drop table Ledger; mail ravi@example.com".to_string(),
                context: Default::default(),
                filters: None,
            })
            .await;
        assert_eq!(resp.error_code, Some(ErrorCode::UnrecognizedIntent));
        match resp.error_context {
            Some(ErrorContext::Intent { text }) => assert!(!text.contains("ravi@example.com")),
            other => panic!("unexpected context: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unrecognized_text_wins_over_bad_dashboard_filters() {
        let (exec, executions) = executor(0, ExecutionError::ProtocolError(String::new()));
        let resp = exec
            .ask(&TextQuery {
                query_text: "drop table Ledger".to_string(),
                context: Default::default(),
                filters: Some(DashboardFilters {
                    voucher_type: Some("Memo".to_string()),
                    ..Default::default()
                }),
            })
            .await;
        assert_eq!(resp.error_code, Some(ErrorCode::UnrecognizedIntent));
        assert_eq!(executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connection_pings_and_returns_session() {
        let (exec, _) = executor(0, ExecutionError::ProtocolError(String::new()));
        let resp = exec.test_connection().await;
        assert!(resp.success);
        assert_eq!(resp.rows().unwrap().rows[0][0], serde_json::json!("scripted"));
        assert_eq!(exec.pool_stats().idle, 1);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(ExecutionStage::CacheCheck.to_string(), "cache_check");
        assert_eq!(
            serde_json::to_value(ExecutionStage::Storing).unwrap(),
            serde_json::json!("storing")
        );
    }
}
