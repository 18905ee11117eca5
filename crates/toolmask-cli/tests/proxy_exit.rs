#![cfg(unix)]

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the proxy with a stdin pipe the test keeps open
fn spawn_proxy(target: &[&str]) -> Child {
    Command::new(env!("CARGO_BIN_EXE_toolmask"))
        .arg("--")
        .args(target)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap()
}

async fn wait_for_exit(child: &mut Child) -> ExitStatus {
    tokio::time::timeout(EXIT_TIMEOUT, child.wait())
        .await
        .expect("toolmask kept running with its stdin still open")
        .unwrap()
}

#[tokio::test]
async fn test_exits_when_server_exits_while_client_stays_connected() {
    let mut proxy = spawn_proxy(&["sh", "-c", "exit 0"]);
    let _stdin = proxy.stdin.take().unwrap();

    let status = wait_for_exit(&mut proxy).await;
    assert_eq!(status.code(), Some(1));
}

#[tokio::test]
async fn test_exits_on_sigterm_while_client_stays_connected() {
    let mut proxy = spawn_proxy(&["cat"]);
    let mut stdin = proxy.stdin.take().unwrap();
    let mut stdout = BufReader::new(proxy.stdout.take().unwrap()).lines();

    // One round trip through cat so the session is up before signalling
    stdin.write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n").await.unwrap();
    let echoed = tokio::time::timeout(EXIT_TIMEOUT, stdout.next_line())
        .await
        .expect("no echo from the proxied server")
        .unwrap();
    assert_eq!(echoed.as_deref(), Some("{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}"));
    tokio::time::sleep(Duration::from_millis(200)).await;

    let pid = proxy.id().unwrap().to_string();
    let killed = Command::new("kill").args(["-TERM", &pid]).status().await.unwrap();
    assert!(killed.success());

    let status = wait_for_exit(&mut proxy).await;
    assert_eq!(status.code(), Some(0));
    drop(stdin);
}

#[tokio::test]
async fn test_exits_cleanly_when_client_closes_input() {
    let mut proxy = spawn_proxy(&["cat"]);
    drop(proxy.stdin.take());

    let status = wait_for_exit(&mut proxy).await;
    assert!(status.success());
}
