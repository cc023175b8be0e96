//! Live update channel: best-effort push with a polling fallback.
//!
//! One WebSocket connect attempt against the URL derived from the API
//! base. Connected, we forward `task-created` / `task-updated`
//! notifications to the owner as refresh signals. If the connect fails
//! (hosting environments often refuse long-lived connections) we install
//! a fixed-interval poller feeding the same signal. A connection that
//! was live and then dropped gets neither fallback nor reconnect; the
//! owner keeps its manual refresh affordance for that case.
//!
//! Shutdown aborts the task unconditionally; no timer or socket outlives
//! the owning view.

use crate::logging;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Externally observable channel state.
///
/// `connecting -> connected | connect_error`, `connected -> disconnected`.
/// `ConnectError` means the fallback poller is running and updates may be
/// delayed; the shell must render that distinctly from `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connecting,
    Connected,
    ConnectError,
    Disconnected,
}

impl ChannelStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ChannelStatus::Connecting => "connecting…",
            ChannelStatus::Connected => "live",
            ChannelStatus::ConnectError => "polling (updates delayed)",
            ChannelStatus::Disconnected => "offline (refresh manually)",
        }
    }
}

/// Derive the socket URL from the API base: strip the `/api` suffix and
/// swap the scheme to ws(s).
pub fn socket_url(api_base: &str) -> String {
    let base = api_base.trim_end_matches('/');
    let base = base.strip_suffix("/api").unwrap_or(base);
    if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    }
}

/// Notifications that should trigger a collection re-fetch. No payload
/// contract beyond "something changed".
fn is_refresh_notification(text: &str) -> bool {
    let name = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => value
            .get("event")
            .and_then(|e| e.as_str())
            .map(|s| s.to_string()),
        Err(_) => Some(text.trim().to_string()),
    };
    matches!(name.as_deref(), Some("task-created") | Some("task-updated"))
}

pub struct LiveChannel {
    status_rx: watch::Receiver<ChannelStatus>,
    task: JoinHandle<()>,
}

impl LiveChannel {
    /// Spawn the channel. Returns the handle and the refresh signal
    /// receiver; both the push path and the fallback poller feed the
    /// same receiver, so the owner has a single loader path.
    pub fn connect(url: String, poll_interval: Duration) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (status_tx, status_rx) = watch::channel(ChannelStatus::Connecting);
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(url, status_tx, refresh_tx, poll_interval));

        (Self { status_rx, task }, refresh_rx)
    }

    pub fn status(&self) -> ChannelStatus {
        *self.status_rx.borrow()
    }

    pub fn status_rx(&self) -> watch::Receiver<ChannelStatus> {
        self.status_rx.clone()
    }

    /// Tear down the socket and any fallback timer
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    url: String,
    status_tx: watch::Sender<ChannelStatus>,
    refresh_tx: mpsc::UnboundedSender<()>,
    poll_interval: Duration,
) {
    match connect_async(&url).await {
        Ok((ws, _)) => {
            logging::info(&format!("Live channel connected: {}", url));
            let _ = status_tx.send(ChannelStatus::Connected);

            let (_write, mut read) = ws.split();
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if is_refresh_notification(&text) && refresh_tx.send(()).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }

            // A live connection that dropped: single attempt only, no
            // reconnect loop and no fallback. Manual refresh remains.
            logging::warn("Live channel dropped; not reconnecting");
            let _ = status_tx.send(ChannelStatus::Disconnected);
        }
        Err(e) => {
            logging::warn(&format!(
                "Live channel connect failed ({}); falling back to polling every {:?}",
                e, poll_interval
            ));
            let _ = status_tx.send(ChannelStatus::ConnectError);

            let mut ticker = tokio::time::interval(poll_interval);
            // interval fires immediately; the owner just loaded, skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if refresh_tx.send(()).is_err() {
                    return;
                }
            }
        }
    }
}
