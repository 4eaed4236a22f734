use assert_cmd::prelude::*;
use futures_util::{SinkExt, StreamExt};
use std::{fs, net::TcpListener as StdListener, process::Command, time::Duration};
use tempfile::TempDir;
use tokio::{net::TcpListener, sync::mpsc};
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};

/// Minimal relay that acknowledges every EVENT and forwards it to `tx`.
async fn spawn_relay(tx: mpsc::UnboundedSender<serde_json::Value>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(txt) = msg {
                let val: serde_json::Value = serde_json::from_str(&txt).unwrap();
                if val[0] == "EVENT" {
                    let id = val[1]["id"].clone();
                    let _ = tx.send(val[1].clone());
                    let ok = serde_json::json!(["OK", id, true, ""]);
                    ws.send(Message::Text(ok.to_string())).await.unwrap();
                }
            }
        }
    });
    format!("ws://{addr}")
}

fn free_port() -> u16 {
    StdListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn article_cli_broadcasts_and_prints_naddr() {
    let dir = TempDir::new().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let relay_a = spawn_relay(tx.clone()).await;
    let relay_b = spawn_relay(tx).await;
    let dead = format!("ws://127.0.0.1:{}", free_port());

    let env_path = dir.path().join("env");
    fs::write(
        &env_path,
        format!(
            "NSEC=nsec1vl029mgpspedva04g90vltkh6fvh240zqtv9k0t9af8935ke9laqsnlfe5\n\
             RELAYS={relay_a},{dead},{relay_b}\nCONNECT_TIMEOUT=2\nPUBLISH_TIMEOUT=2\n"
        ),
    )
    .unwrap();
    let body = dir.path().join("post.md");
    fs::write(&body, "body text").unwrap();

    let env_arg = env_path.to_str().unwrap().to_string();
    let body_arg = body.to_str().unwrap().to_string();
    let out = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("postr")
            .unwrap()
            .args([
                "--env",
                &env_arg,
                "article",
                &body_arg,
                "--title",
                "Notes on X",
                "--identifier",
                "202401010000",
                "-t",
                "go",
                "--min-delivered",
                "2",
            ])
            .output()
            .unwrap()
    })
    .await
    .unwrap();
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(
        out.status.success(),
        "stdout: {stdout}\nstderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    assert!(stdout.contains(&format!("Relay {relay_a}: delivered")));
    assert!(stdout.contains(&format!("Relay {relay_b}: delivered")));
    assert!(stdout.contains(&format!("Relay {dead}: connection failed")));
    assert!(stdout.lines().any(|l| l.starts_with("Author: npub1")));
    let naddr = stdout.lines().last().unwrap();
    assert!(naddr.starts_with("naddr1"), "{naddr}");

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first["kind"], 30023);
    assert_eq!(first["tags"][1], serde_json::json!(["d", "202401010000"]));

    // the naddr decodes back to the published coordinates
    let out = Command::cargo_bin("postr")
        .unwrap()
        .args(["decode", naddr])
        .output()
        .unwrap();
    let decoded = String::from_utf8(out.stdout).unwrap();
    assert!(decoded.contains("kind 30023"));
    assert!(decoded.contains(&format!("pubkey {}", first["pubkey"].as_str().unwrap())));
    assert!(decoded.contains("identifier 202401010000"));
    assert!(decoded.contains(&format!("relay {dead}")));
}
