//! Fixture source loaded through the registry, served through the pool.

use std::io::Write;
use tallygate_common::config::{ExecutionSettings, PoolSettings, RetrySettings, SourceSettings};
use tallygate_common::models::FilterSet;
use tallygate_connectors::{default_registry, ConnectionPool};
use tallygate_error::ErrorCode;
use tallygate_sql::QueryBuilder;

const FIXTURE: &str = r#"
companies:
  - name: Acme Traders
    tables:
      StockItem:
        - { Name: Widget, StockGroup: Hardware, ClosingStock: 40, ClosingValue: 8000, Unit: Nos }
        - { Name: Gadget, StockGroup: Hardware, ClosingStock: 5, ClosingValue: 2500, Unit: Nos }
"#;

#[tokio::test]
async fn test_fixture_through_pool() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    write!(file, "{}", FIXTURE).unwrap();

    let source = SourceSettings {
        source_type: "fixture".to_string(),
        fixture_path: Some(file.path().to_string_lossy().into_owned()),
        ..Default::default()
    };
    let connector = default_registry()
        .create_connector(&source, &ExecutionSettings::default())
        .await
        .unwrap();
    let pool = ConnectionPool::new(connector, PoolSettings::default(), RetrySettings::default());

    let query = QueryBuilder::default()
        .build(
            &FilterSet::new("StockItem")
                .field("Name")
                .predicate("ClosingStock", "<", 10),
        )
        .unwrap();

    let mut session = pool.get().await.unwrap();
    let rows = session.execute(&query).await.unwrap();
    pool.release(session, true);

    assert_eq!(rows.rows, vec![vec![serde_json::json!("Gadget")]]);
    assert_eq!(pool.stats().idle, 1);
}

#[tokio::test]
async fn test_fixture_requires_path() {
    let source = SourceSettings {
        source_type: "fixture".to_string(),
        ..Default::default()
    };
    let err = match default_registry()
        .create_connector(&source, &ExecutionSettings::default())
        .await
    {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };
    assert_eq!(err.code, ErrorCode::InvalidConfig);
}

#[tokio::test]
async fn test_malformed_fixture() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    write!(file, "companies: [ {{ name: Acme, tables: {{ Employee: [] }} }} ]").unwrap();

    let source = SourceSettings {
        source_type: "fixture".to_string(),
        fixture_path: Some(file.path().to_string_lossy().into_owned()),
        ..Default::default()
    };
    let err = match default_registry()
        .create_connector(&source, &ExecutionSettings::default())
        .await
    {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };
    assert_eq!(err.code, ErrorCode::InvalidFixture);
}
