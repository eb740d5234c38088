//! Integration tests for the LSP bridge.
//!
//! `cat` stands in for the language server: it echoes every framed body
//! back, so the bridge's proxying can be checked without one installed.

#![cfg(unix)]

use anyhow::{Context, Result, anyhow};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use situ_classroom::lsp::{BridgeConnector, LspBridge};

const WAIT: Duration = Duration::from_secs(5);

type Session = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_bridge() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let _bridge = LspBridge::new("cat".to_string(), Vec::new()).start(listener);
    Ok(format!("ws://{addr}"))
}

async fn next_json(session: &mut Session) -> Result<Value> {
    loop {
        let frame = tokio::time::timeout(WAIT, session.next())
            .await
            .context("timed out waiting for the bridge")?
            .context("bridge closed the connection")??;
        match frame {
            Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
            Message::Close(_) => return Err(anyhow!("bridge closed the session")),
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_announces_cargo_root_and_proxies_bodies() -> Result<()> {
    let dir = TempDir::new()?;
    let crate_dir = dir.path().join("hello");
    fs::create_dir_all(crate_dir.join("src"))?;
    fs::write(crate_dir.join("Cargo.toml"), "[package]\nname = \"hello\"\n")?;
    let file = crate_dir.join("src/main.rs");
    fs::write(&file, "fn main() {}\n")?;

    let base = start_bridge().await?;
    let url = BridgeConnector::new(base, WAIT).session_url(&file)?;
    let (mut session, _) = connect_async(url.as_str()).await?;

    assert_eq!(
        next_json(&mut session).await?,
        json!({ "cargo-root": crate_dir.to_string_lossy() })
    );

    let body = json!({ "jsonrpc": "2.0", "method": "$/ping", "params": { "n": 1 } });
    session.send(Message::text(body.to_string())).await?;
    assert_eq!(next_json(&mut session).await?, body);

    // Bodies stay intact across several frames in a row.
    for n in 2..5 {
        let body = json!({ "jsonrpc": "2.0", "id": n, "result": "ünïcode" });
        session.send(Message::text(body.to_string())).await?;
        assert_eq!(next_json(&mut session).await?, body);
    }

    session.close(None).await?;
    Ok(())
}

#[tokio::test]
async fn test_loose_file_uses_its_directory() -> Result<()> {
    let dir = TempDir::new()?;
    let file = dir.path().join("scratch.rs");
    fs::write(&file, "")?;

    let base = start_bridge().await?;
    let url = BridgeConnector::new(base, WAIT).session_url(&file)?;
    let (mut session, _) = connect_async(url.as_str()).await?;

    assert_eq!(
        next_json(&mut session).await?,
        json!({ "cargo-root": dir.path().to_string_lossy() })
    );
    Ok(())
}

#[tokio::test]
async fn test_session_without_path_is_closed() -> Result<()> {
    let base = start_bridge().await?;
    let (mut session, _) = connect_async(base.as_str()).await?;

    let frame = tokio::time::timeout(WAIT, session.next())
        .await
        .context("timed out waiting for the bridge")?;
    assert!(matches!(frame, None | Some(Ok(Message::Close(_)) | Err(_))));
    Ok(())
}
