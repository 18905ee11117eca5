#![cfg(unix)]

mod common;

use std::time::Duration;

use common::{reply, FakeServer};
use toolmask_policy::ProxyConfig;
use toolmask_runtime::{format_listing, Lister, RuntimeError, NO_DESCRIPTION};

fn names(tools: &[toolmask_proxy::ToolDescriptor]) -> Vec<&str> {
    tools.iter().map(|t| t.name.as_str()).collect()
}

#[tokio::test]
async fn test_lists_all_tools_without_filter() {
    let mut lister = Lister::new(FakeServer::new().config()).unwrap();
    let tools = lister.list_tools().await.unwrap();

    assert_eq!(names(&tools), vec!["add", "subtract", "get-args"]);
    assert_eq!(
        format_listing(&tools),
        vec![
            "add: Adds two numbers".to_string(),
            format!("subtract: {}", NO_DESCRIPTION),
            "get-args: Echo args".to_string(),
        ]
    );
    assert!(!lister.is_running());
}

#[tokio::test]
async fn test_include_filter() {
    let config = FakeServer::new().config().with_include(["add"]);
    let tools = Lister::new(config).unwrap().list_tools().await.unwrap();
    assert_eq!(names(&tools), vec!["add"]);
}

#[tokio::test]
async fn test_exclude_filter() {
    let config = FakeServer::new().config().with_exclude(["get-*"]);
    let tools = Lister::new(config).unwrap().list_tools().await.unwrap();
    assert_eq!(names(&tools), vec!["add", "subtract"]);
}

#[tokio::test]
async fn test_skips_noise_before_tools_list_response() {
    let noise = format!(
        "{}; printf 'not json\\n\\n'; {}; {}",
        reply(r#"{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info"}}"#),
        reply(r#"{"jsonrpc":"2.0","id":99,"result":{}}"#),
        reply(common::TOOLS_REPLY),
    );
    let config = FakeServer::new().on_tools_list(noise).config();
    let tools = Lister::new(config).unwrap().list_tools().await.unwrap();
    assert_eq!(tools.len(), 3);
}

#[tokio::test]
async fn test_tools_list_error_stops_server() {
    let pid_file = tempfile::NamedTempFile::new().unwrap();
    let server = FakeServer::new()
        .record_pid(pid_file.path())
        .on_tools_list(reply(
            r#"{"jsonrpc":"2.0","id":__ID__,"error":{"code":-32603,"message":"tools exploded"}}"#,
        ));

    let mut lister = Lister::new(server.config()).unwrap();
    let err = lister.list_tools().await.unwrap_err();
    match err {
        RuntimeError::ToolsListFailed(message) => assert_eq!(message, "tools exploded"),
        other => panic!("Expected ToolsListFailed, got {:?}", other),
    }
    assert!(!lister.is_running());

    let pid = std::fs::read_to_string(pid_file.path()).unwrap();
    let pid = pid.trim();
    assert!(!pid.is_empty());
    if cfg!(target_os = "linux") {
        assert!(
            !std::path::Path::new(&format!("/proc/{}", pid)).exists(),
            "target server {} still alive",
            pid
        );
    }
}

#[tokio::test]
async fn test_initialize_error() {
    let config = FakeServer::new()
        .on_initialize(reply(
            r#"{"jsonrpc":"2.0","id":__ID__,"error":{"code":-32600,"message":"unsupported protocol"}}"#,
        ))
        .config();
    let mut lister = Lister::new(config).unwrap();
    match lister.list_tools().await.unwrap_err() {
        RuntimeError::InitializeFailed(message) => assert_eq!(message, "unsupported protocol"),
        other => panic!("Expected InitializeFailed, got {:?}", other),
    }
    assert!(!lister.is_running());
}

#[tokio::test]
async fn test_server_exiting_early() {
    let mut lister = Lister::new(ProxyConfig::new(["sh", "-c", "exit 3"])).unwrap();
    let err = lister.list_tools().await.unwrap_err();
    assert!(matches!(err, RuntimeError::ServerClosed), "got {:?}", err);
}

#[tokio::test]
async fn test_missing_executable() {
    let mut lister = Lister::new(ProxyConfig::new(["/nonexistent/toolmask-test-server"])).unwrap();
    let err = lister.list_tools().await.unwrap_err();
    assert!(matches!(err, RuntimeError::SpawnFailure { .. }));
}

#[tokio::test]
async fn test_timeout_when_server_never_answers() {
    let config = FakeServer::new()
        .on_initialize(":")
        .config()
        .with_list_timeout(Duration::from_millis(300));
    let mut lister = Lister::new(config).unwrap();
    let err = lister.list_tools().await.unwrap_err();
    assert!(matches!(err, RuntimeError::Timeout(_)), "got {:?}", err);
    assert!(!lister.is_running());
}
