//! Line-oriented console bridge: host messages in on stdin, simulation
//! events out as JSON lines on stdout.
//!
//! Accepted input lines:
//!
//! ```text
//! down <code>    key pressed (e.g. `down KeyJ`)
//! up <code>      key released
//! start | pause | resume | reset
//! quit
//! {"type": ...}  any HostMsg as JSON
//! ```

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::game::input::Edge;

use super::protocol::{Command, HostMsg, SimEvent};

/// Parse one console line. Blank and unrecognized lines yield `None`.
pub fn parse_line(line: &str) -> Option<HostMsg> {
    let line = line.trim();
    if line.starts_with('{') {
        return serde_json::from_str(line).ok();
    }

    let mut parts = line.split_whitespace();
    let word = parts.next()?;
    let msg = match word.to_ascii_lowercase().as_str() {
        "down" | "up" => {
            let code = parts.next()?.to_string();
            let edge = if word.eq_ignore_ascii_case("down") {
                Edge::Down
            } else {
                Edge::Up
            };
            HostMsg::Key { code, edge }
        }
        "start" => HostMsg::Command {
            command: Command::Start,
        },
        "pause" => HostMsg::Command {
            command: Command::Pause,
        },
        "resume" => HostMsg::Command {
            command: Command::Resume,
        },
        "reset" => HostMsg::Command {
            command: Command::Reset,
        },
        "quit" | "exit" => HostMsg::Shutdown,
        _ => return None,
    };
    Some(msg)
}

/// Forward host lines into the match until EOF, `quit`, or the match
/// goes away
pub async fn read_commands<R>(reader: R, input_tx: mpsc::Sender<HostMsg>) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let Some(msg) = parse_line(&line) else {
            if !line.trim().is_empty() {
                warn!(line = %line.trim(), "Unrecognized console input");
            }
            continue;
        };
        let quit = msg == HostMsg::Shutdown;
        if input_tx.send(msg).await.is_err() {
            debug!("Match loop gone, closing console");
            break;
        }
        if quit {
            break;
        }
    }
    Ok(())
}

/// Write every simulation event as one JSON line until the match closes
pub async fn forward_events<W>(
    mut event_rx: broadcast::Receiver<SimEvent>,
    mut writer: W,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        match event_rx.recv().await {
            Ok(event) => {
                let mut line = serde_json::to_vec(&event)?;
                line.push(b'\n');
                writer.write_all(&line).await?;
                writer.flush().await?;
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(lagged_count = n, "Console lagged, skipping {} events", n);
                // Continue - a slow reader never stalls the match
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Event channel closed");
                break;
            }
        }
    }
    Ok(())
}
