//! Integration tests for the error handlers wrapping sync and async functions.

mod common;

use common::{capture_logs, test_config, RecordingChannel};
use std::time::{Duration, Instant};
use tg_notify::{
    handle_cache_errors, handle_database_errors, handle_errors, Category, ErrorManager,
};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
enum AppError {
    #[error("{0}")]
    Value(String),
    #[error("invalid port: {0}")]
    Port(String),
}

async fn load_user(id: u64) -> Result<String, AppError> {
    if id == 0 {
        Ok("root".to_string())
    } else {
        Err(AppError::Value("x".to_string()))
    }
}

fn parse_port(input: &str) -> Result<u16, AppError> {
    input.parse().map_err(|_| AppError::Port(input.to_string()))
}

fn configured_manager() -> (ErrorManager, tokio::sync::mpsc::UnboundedReceiver<common::SentMessage>) {
    let (channel, rx) = RecordingChannel::new();
    let manager = ErrorManager::new();
    manager.configure_with_channel(test_config(), channel).unwrap();
    (manager, rx)
}

#[tokio::test]
async fn test_async_wrapper_reports_once_and_returns_original_error() {
    let (manager, mut rx) = configured_manager();
    let load = handle_database_errors()
        .with_manager(manager)
        .wrap_async("load_user", load_user);

    let err = load(7).await.unwrap_err();
    assert_eq!(err, AppError::Value("x".to_string()));
    assert_eq!(err.to_string(), "x");

    let sent = rx.try_recv().unwrap();
    assert!(sent.text.contains("*Category:* database"));
    assert!(sent.text.contains("*Message:* Error while executing: load\\_user"));
    assert!(sent.text.contains("  - function: load\\_user"));
    assert!(sent.text.contains("  - args: 7"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_async_wrapper_passes_success_through() {
    let (manager, mut rx) = configured_manager();
    let load = handle_database_errors()
        .with_manager(manager)
        .wrap_async("load_user", load_user);

    assert_eq!(load(0).await, Ok("root".to_string()));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_operation_label_names_the_report() {
    let (manager, mut rx) = configured_manager();
    let handler = handle_cache_errors()
        .operation("refresh pricing cache")
        .with_manager(manager);

    let result = handler
        .run("refresh", ("eu", 3), |(region, tries)| async move {
            Err::<(), _>(AppError::Value(format!("{region} failed after {tries}")))
        })
        .await;
    assert_eq!(result, Err(AppError::Value("eu failed after 3".to_string())));

    let sent = rx.try_recv().unwrap();
    assert!(sent.text.contains("Error while executing: refresh pricing cache"));
    assert!(sent.text.contains("  - function: refresh"));
    assert!(sent.text.contains("  - args: (\"eu\", 3)"));
}

#[tokio::test]
async fn test_sync_wrapper_returns_before_report() {
    let (manager, mut rx) = configured_manager();
    let parse = handle_errors(Category::Validation)
        .with_manager(manager)
        .wrap("parse_port", parse_port);

    assert_eq!(parse("8080"), Ok(8080));

    let err = parse("http").unwrap_err();
    assert_eq!(err, AppError::Port("http".to_string()));

    // The report is spawned, not awaited: nothing has been sent yet on this
    // single-threaded runtime.
    assert!(rx.try_recv().is_err());

    let sent = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(sent.text.contains("*Category:* validation"));
    assert!(sent.text.contains("  - function: parse\\_port"));
    assert!(sent.text.ends_with("invalid port: http\n```"));
}

#[tokio::test]
async fn test_failing_transport_does_not_change_the_error() {
    let (logs, _guard) = capture_logs();
    let (channel, mut rx) = RecordingChannel::failing();
    let manager = ErrorManager::new();
    manager.configure_with_channel(test_config(), channel).unwrap();

    let load = handle_database_errors()
        .with_manager(manager)
        .wrap_async("load_user", load_user);

    assert_eq!(
        load(3).await.unwrap_err(),
        AppError::Value("x".to_string())
    );
    assert!(rx.try_recv().is_ok());
    assert!(logs.contents().contains("Failed to send notification"));
}

fn recv_within(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<common::SentMessage>,
    timeout: Duration,
) -> common::SentMessage {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(sent) = rx.try_recv() {
            return sent;
        }
        assert!(Instant::now() < deadline, "report was not delivered");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_sync_wrapper_without_runtime_delivers_in_order() {
    let (manager, mut rx) = configured_manager();
    let parse = handle_errors(Category::Validation)
        .with_manager(manager)
        .wrap("parse_port", parse_port);

    assert_eq!(parse("abc"), Err(AppError::Port("abc".to_string())));
    assert_eq!(parse("xyz"), Err(AppError::Port("xyz".to_string())));

    let first = recv_within(&mut rx, Duration::from_secs(2));
    let second = recv_within(&mut rx, Duration::from_secs(2));
    assert!(first.text.contains("*Message:* Error while executing: parse\\_port"));
    assert!(first.text.contains("  - args: \"abc\""));
    assert!(second.text.contains("  - args: \"xyz\""));
}

#[test]
fn test_sync_wrapper_from_plain_thread() {
    let (manager, mut rx) = configured_manager();
    let parse = handle_errors(Category::Validation)
        .with_manager(manager)
        .wrap("parse_port", parse_port);

    let result = std::thread::spawn(move || parse("nope")).join().unwrap();
    assert_eq!(result, Err(AppError::Port("nope".to_string())));

    let sent = recv_within(&mut rx, Duration::from_secs(2));
    assert!(sent.text.ends_with("invalid port: nope\n```"));
}
