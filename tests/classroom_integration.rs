//! Integration tests for the classroom server over real WebSocket
//! connections.

use anyhow::{Context, Result, anyhow};
use futures_util::{SinkExt, StreamExt};
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use situ_classroom::editor::{ContentChange, EditorHandler};
use situ_classroom::lesson::Lesson;
use situ_classroom::lsp::BridgeConnector;
use situ_classroom::protocol::{
    Action, ClientMessage, EditorAction, MessageKind, ServerMessage, decode_server_message,
};
use situ_classroom::server::{ClassroomServer, PathValidator, ShellRunner};
use situ_classroom::transport::Client;

const WAIT: Duration = Duration::from_secs(5);

type Peer = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Classroom {
    dir: TempDir,
    addr: SocketAddr,
}

impl Classroom {
    async fn start(shell: bool) -> Result<Self> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("lesson.rs"), "fn main() {}\n")?;

        let validator = PathValidator::new(dir.path())?;
        let shell = shell.then(|| ShellRunner::new(validator.root().to_path_buf(), WAIT));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let _server = ClassroomServer::new(validator, shell).start(listener);

        Ok(Self { dir, addr })
    }

    fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    async fn connect(&self) -> Result<Peer> {
        let (peer, _) = connect_async(self.url()).await?;
        Ok(peer)
    }
}

async fn send(peer: &mut Peer, message: &ClientMessage) -> Result<()> {
    send_raw(peer, &serde_json::to_string(message)?).await
}

async fn send_raw(peer: &mut Peer, text: &str) -> Result<()> {
    peer.send(Message::text(text.to_string())).await?;
    Ok(())
}

async fn recv(peer: &mut Peer) -> Result<ServerMessage> {
    loop {
        let frame = tokio::time::timeout(WAIT, peer.next())
            .await
            .context("timed out waiting for a server message")?
            .context("server closed the connection")??;
        if let Message::Text(text) = frame {
            return decode_server_message(text.as_str())?
                .ok_or_else(|| anyhow!("unexpected message: {}", text.as_str()));
        }
    }
}

/// Sends `OpenFile` and waits for the reply. The server handles one peer's
/// frames in order, so this also flushes everything sent before it.
async fn open(peer: &mut Peer, path: &str) -> Result<ServerMessage> {
    send(
        peer,
        &ClientMessage::OpenFile {
            path: path.to_string(),
        },
    )
    .await?;
    recv(peer).await
}

fn change(text: &str) -> Action {
    EditorAction::change(text.to_string()).into()
}

#[tokio::test]
async fn test_open_save_and_errors() -> Result<()> {
    let classroom = Classroom::start(false).await?;
    let mut peer = classroom.connect().await?;
    let lesson_path = classroom.dir.path().canonicalize()?.join("lesson.rs");

    assert_eq!(
        open(&mut peer, "lesson.rs").await?,
        ServerMessage::FileContents {
            contents: "fn main() {}\n".to_string(),
            path: lesson_path.to_string_lossy().into_owned(),
        }
    );

    send(
        &mut peer,
        &ClientMessage::SaveFile {
            path: "src/new.rs".to_string(),
            contents: "// new\n".to_string(),
        },
    )
    .await?;
    match open(&mut peer, "src/new.rs").await? {
        ServerMessage::FileContents { contents, .. } => assert_eq!(contents, "// new\n"),
        other => return Err(anyhow!("expected FileContents, got {other:?}")),
    }
    assert_eq!(
        fs::read_to_string(classroom.dir.path().join("src/new.rs"))?,
        "// new\n"
    );

    assert!(matches!(
        open(&mut peer, "missing.rs").await?,
        ServerMessage::Error { .. }
    ));
    assert!(matches!(
        open(&mut peer, "../lesson.rs").await?,
        ServerMessage::Error { .. }
    ));

    send(
        &mut peer,
        &ClientMessage::ShellExec {
            command: "ls".to_string(),
        },
    )
    .await?;
    match recv(&mut peer).await? {
        ServerMessage::Error { message } => assert!(message.contains("disabled")),
        other => return Err(anyhow!("expected Error, got {other:?}")),
    }
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_shell_exec_runs_in_root() -> Result<()> {
    let classroom = Classroom::start(true).await?;
    let mut peer = classroom.connect().await?;

    send(
        &mut peer,
        &ClientMessage::ShellExec {
            command: "cat lesson.rs; exit 3".to_string(),
        },
    )
    .await?;
    assert_eq!(
        recv(&mut peer).await?,
        ServerMessage::ShellOutput {
            output: "fn main() {}\n[exit status 3]".to_string(),
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_malformed_and_unknown_frames() -> Result<()> {
    let classroom = Classroom::start(false).await?;
    let mut peer = classroom.connect().await?;

    send_raw(&mut peer, "not json").await?;
    assert!(matches!(recv(&mut peer).await?, ServerMessage::Error { .. }));

    send_raw(&mut peer, r#"{"type":"SaveFile","path":"a.rs"}"#).await?;
    match recv(&mut peer).await? {
        ServerMessage::Error { message } => assert!(message.contains("SaveFile")),
        other => return Err(anyhow!("expected Error, got {other:?}")),
    }

    // Unknown tags get no reply at all.
    send_raw(&mut peer, r#"{"type":"Telemetry","n":1}"#).await?;
    assert!(matches!(
        open(&mut peer, "lesson.rs").await?,
        ServerMessage::FileContents { .. }
    ));
    Ok(())
}

#[tokio::test]
async fn test_actions_relay_to_others_but_not_sender() -> Result<()> {
    let classroom = Classroom::start(false).await?;
    let mut instructor = classroom.connect().await?;
    let mut student = classroom.connect().await?;

    let action = change("[]");
    send(
        &mut instructor,
        &ClientMessage::RecordAction {
            action: action.clone(),
        },
    )
    .await?;

    assert_eq!(
        recv(&mut student).await?,
        ServerMessage::ReplayAction { action }
    );
    // Had the action echoed back it would arrive before this reply.
    assert!(matches!(
        open(&mut instructor, "lesson.rs").await?,
        ServerMessage::FileContents { .. }
    ));
    Ok(())
}

#[tokio::test]
async fn test_late_peer_receives_backlog_in_order() -> Result<()> {
    let classroom = Classroom::start(false).await?;
    let mut instructor = classroom.connect().await?;

    let first = change(r#"[{"range":{"startLineNumber":1,"startColumn":1,"endLineNumber":1,"endColumn":1},"text":"a"}]"#);
    let second: Action = EditorAction::save().into();
    for action in [&first, &second] {
        send(
            &mut instructor,
            &ClientMessage::RecordAction {
                action: action.clone(),
            },
        )
        .await?;
    }
    open(&mut instructor, "lesson.rs").await?;

    let mut late = classroom.connect().await?;
    assert_eq!(
        recv(&mut late).await?,
        ServerMessage::ReplayAction { action: first }
    );
    assert_eq!(
        recv(&mut late).await?,
        ServerMessage::ReplayAction { action: second }
    );
    Ok(())
}

/// An editor session driven by its own transport, the way `situ follow`
/// wires one up.
struct Session {
    handler: EditorHandler<BridgeConnector>,
    inbox: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Session {
    async fn join(url: String, path: &str, recording: bool) -> Result<Self> {
        let mut client = Client::new();
        let (tx, inbox) = mpsc::unbounded_channel();
        for kind in [
            MessageKind::FileContents,
            MessageKind::ReplayAction,
            MessageKind::Error,
        ] {
            let tx = tx.clone();
            client.add_listener(kind, move |message: &ServerMessage| {
                let _ = tx.send(message.clone());
            });
        }

        let outbox = client.outbox();
        let mut lesson = Lesson::new();
        if recording {
            lesson.broadcast_to(outbox.clone());
            lesson.start_recording();
        }
        let handler = EditorHandler::new(outbox.clone(), lesson);
        outbox.send(ClientMessage::OpenFile {
            path: path.to_string(),
        })?;
        tokio::spawn(async move { client.run(&url).await });

        let mut session = Self { handler, inbox };
        session.step().await?;
        Ok(session)
    }

    /// Handles the next message from the server.
    async fn step(&mut self) -> Result<()> {
        let message = tokio::time::timeout(WAIT, self.inbox.recv())
            .await
            .context("timed out waiting for the server")?
            .context("connection closed")?;
        self.handler.handle_message(message).await
    }
}

#[tokio::test]
async fn test_follower_replays_instructor_edits() -> Result<()> {
    let classroom = Classroom::start(false).await?;
    let mut student = Session::join(classroom.url(), "lesson.rs", false).await?;
    let mut instructor = Session::join(classroom.url(), "lesson.rs", true).await?;

    instructor
        .handler
        .on_local_change(&[ContentChange::insert(1, 1, "// step one\n")])?;
    instructor
        .handler
        .on_local_change(&[ContentChange::insert(2, 12, "\n    println!(\"hi\");\n")])?;
    instructor.handler.on_local_save()?;

    for _ in 0..3 {
        student.step().await?;
    }

    let expected = "// step one\nfn main() {\n    println!(\"hi\");\n}\n";
    assert_eq!(instructor.handler.current_text(), Some(expected));
    assert_eq!(student.handler.current_text(), Some(expected));
    assert_eq!(student.handler.lesson().actions.len(), 3);
    assert!(instructor.inbox.try_recv().is_err());

    let saved = classroom.dir.path().join("lesson.rs");
    let deadline = tokio::time::Instant::now() + WAIT;
    while fs::read_to_string(&saved)? != expected {
        if tokio::time::Instant::now() > deadline {
            return Err(anyhow!("lesson.rs was never saved"));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(())
}
