//! `PostgreSQL` Gateway Tests
//!
//! These run against a live server loaded with the CMPS schema and are
//! ignored by default. Point them at a database with the `CMPS_DB_*`
//! variables and run:
//! cargo test --test postgres_gateway -- --ignored

#![cfg(feature = "postgres")]

use cmps_console::config::StoredConnection;
use cmps_console::{
    catalog, ConnectionSettings, Dispatcher, ExecutionGateway, Notice, Outcome, PostgresGateway,
    Screen,
};

fn settings() -> ConnectionSettings {
    StoredConnection::from_env()
        .and_then(|stored| stored.resolve())
        .expect("Set CMPS_DB_HOST, CMPS_DB_NAME, CMPS_DB_USER and CMPS_DB_PASSWORD")
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_connect_and_validate() {
    let gateway = PostgresGateway::new(settings());
    let info = gateway.validate_connection().await.expect("Should connect");

    assert!(!info.database_version.is_empty());
    assert_eq!(info.connected_database, gateway.settings().database);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_statements_run_in_cmps_namespace() {
    let gateway = PostgresGateway::new(settings());
    let result = gateway
        .execute("SELECT current_schema()", true, &[])
        .await
        .expect("Should execute")
        .expect("Should fetch rows");

    assert_eq!(result.rows, vec![vec!["cmps_db".to_string()]]);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_view_exam_schedule_through_dispatcher() {
    let gateway = PostgresGateway::new(settings());
    let mut dispatcher = Dispatcher::new(catalog(), Screen::default());
    dispatcher.select_category("Exam Management").unwrap();
    dispatcher.select_command("View Exam Schedule").unwrap();
    dispatcher.open_form().unwrap();

    let outcome = dispatcher.execute_with(&gateway).await.expect("Should dispatch");
    assert!(matches!(outcome, Outcome::Result(_)));
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_deleting_unknown_student_is_not_an_error() {
    let gateway = PostgresGateway::new(settings());
    let mut dispatcher = Dispatcher::new(catalog(), Screen::default());
    dispatcher.select_category("Student Management").unwrap();
    dispatcher.select_command("Delete Student").unwrap();
    dispatcher.open_form().unwrap().set_value("sno", "99999999").unwrap();

    let outcome = dispatcher.execute_with(&gateway).await.expect("Should dispatch");
    assert!(matches!(outcome, Outcome::Notice(Notice::Info { .. })));
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_wrong_password_is_connection_failure() {
    let mut settings = settings();
    settings.password = "definitely-not-the-password".to_string();

    let err = PostgresGateway::new(settings).execute("SELECT 1", true, &[]).await.unwrap_err();
    assert_eq!(err.error_code(), "CONNECTION_FAILED");
    assert!(!err.message().contains("definitely-not-the-password"));
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_timeout_returns_before_statement_finishes() {
    let mut settings = settings();
    settings.timeout_ms = Some(500);
    let gateway = PostgresGateway::new(settings);

    let start = std::time::Instant::now();
    let err = gateway.execute("SELECT pg_sleep(5)", false, &[]).await.unwrap_err();

    assert_eq!(err.error_code(), "STATEMENT_FAILED");
    assert!(err.message().contains("timeout of 500ms"));
    assert!(start.elapsed() < std::time::Duration::from_secs(3));

    // The server cancelled the sleep, so the next call is not held up
    let result = gateway.execute("SELECT 1", true, &[]).await.unwrap().unwrap();
    assert_eq!(result.rows, vec![vec!["1".to_string()]]);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_end_of_day_time_reads_back() {
    let gateway = PostgresGateway::new(settings());
    let result = gateway
        .execute("SELECT $1::time", true, &["24:00:00".to_string()])
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.rows, vec![vec!["24:00:00".to_string()]]);
}
