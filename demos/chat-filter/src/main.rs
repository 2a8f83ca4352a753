//! A single relayed connection driven from the terminal.
//!
//! Reads client packets as JSON lines on stdin, runs them through a word
//! filter, and prints what the backend would receive as JSON lines on
//! stdout. Logs go to stderr; set `RUST_LOG` to change the level.
//!
//! ```text
//! $ echo '{"type":"Chat","message":"oh heck","timestamp":1,"salt":0,"signature":null,"last_seen":null}' \
//!     | cargo run -p chat-filter
//! {"packet":{"type":"Chat","message":"oh ****",...},"route":"Backend"}
//! ```
//!
//! An optional first argument names a JSON file with a `RelayConfig`.

use chatrelay::prelude::*;

use chatrelay::protocol::{Codec, JsonCodec};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// ---------------------------------------------------------------------------
// Extensions
// ---------------------------------------------------------------------------

/// Masks banned words in chat. A message made only of banned words is
/// dropped.
struct WordFilter {
    banned: Vec<String>,
}

impl WordFilter {
    fn new<'a>(words: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            banned: words.into_iter().map(str::to_lowercase).collect(),
        }
    }

    fn is_banned(&self, word: &str) -> bool {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        self.banned.iter().any(|b| b.eq_ignore_ascii_case(word))
    }

    fn filter(&self, text: &str) -> EventResult {
        let words: Vec<&str> = text.split_whitespace().collect();
        let hits = words.iter().filter(|w| self.is_banned(w)).count();
        if hits == 0 {
            return EventResult::Allowed;
        }
        if hits == words.len() {
            return EventResult::Denied;
        }
        let masked = words
            .iter()
            .map(|w| {
                if self.is_banned(w) {
                    "*".repeat(w.chars().count())
                } else {
                    (*w).to_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        EventResult::Modified(masked)
    }
}

impl ChatEvents for WordFilter {
    async fn fire(&self, mut event: ChatEvent) -> Result<ChatEvent, ExtensionError> {
        if event.kind() == MessageKind::Chat {
            let result = self.filter(event.content());
            event.set_result(result);
        }
        Ok(event)
    }
}

/// Proxy-side commands: only `ping`.
struct LocalCommands;

impl CommandExecutor for LocalCommands {
    async fn execute(
        &self,
        connection: ConnectionId,
        command: &str,
    ) -> Result<bool, ExtensionError> {
        if command.trim() == "ping" {
            tracing::info!(%connection, "pong");
            return Ok(true);
        }
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

type Connection = ChatConnection<WordFilter, LocalCommands>;

/// Feeds stdin into the connection until EOF.
async fn relay_stdin(connection: &Connection) -> Result<(), Box<dyn std::error::Error>> {
    let codec = JsonCodec;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match codec.decode::<ServerboundPacket>(line.as_bytes()) {
            Ok(packet) => {
                connection.handle_packet(packet)?;
            }
            Err(e) => tracing::warn!(error = %e, "skipping unreadable line"),
        }
    }
    Ok(())
}

async fn load_config() -> Result<RelayConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = tokio::fs::read_to_string(&path).await?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(RelayConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chatrelay=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (failures_tx, mut failures) = mpsc::unbounded_channel();
    let relay = ChatRelay::builder()
        .config(load_config().await?)
        .failure_sink(failures_tx)
        .build(WordFilter::new(["heck", "darn"]), LocalCommands);

    let (sink, mut backend) = ChannelSink::new();
    let connection = relay.connect(ConnectionId::new(1), sink);

    let printer = tokio::spawn(async move {
        let codec = JsonCodec;
        while let Some(packet) = backend.recv().await {
            match codec.encode(&packet) {
                Ok(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
                Err(e) => tracing::error!(error = %e, "could not print packet"),
            }
        }
    });
    tokio::spawn(async move {
        while let Some(failure) = failures.recv().await {
            tracing::warn!(seq = %failure.seq, reason = %failure.reason, "dropped");
        }
    });

    let reason = tokio::select! {
        reason = connection.closed() => reason,
        read = relay_stdin(&connection) => {
            read?;
            connection.settled().await;
            connection.close();
            connection.closed().await
        }
    };
    match reason {
        CloseReason::Closed => tracing::info!("input finished"),
        CloseReason::Terminated(reason) => {
            tracing::error!(%reason, message = reason.message(), "connection terminated");
        }
    }

    let _ = printer.await;
    Ok(())
}
