//! Logging setup with real-time streaming to push-channel clients.
//!
//! Log lines are mirrored onto a broadcast channel so WebSocket clients can
//! follow the daemon's log in real time. ANSI color escapes are stripped
//! before broadcast.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    layer::{Context, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "ffqueue=info,sqlx=warn";

/// Broadcast channel capacity for log events.
const LOG_BROADCAST_CAPACITY: usize = 1024;

static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid ansi regex"));

/// A single log event for broadcasting to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
}

/// Handle for subscribing to the live log stream.
#[derive(Clone)]
pub struct LogBroadcaster {
    tx: broadcast::Sender<LogEvent>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(LOG_BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.tx.subscribe()
    }

    fn send(&self, event: LogEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove ANSI color escapes from a log line.
pub fn strip_ansi(input: &str) -> String {
    ANSI_RE.replace_all(input, "").into_owned()
}

/// tracing layer mirroring events onto the broadcaster.
struct BroadcastLayer {
    broadcaster: LogBroadcaster,
}

impl<S: Subscriber> Layer<S> for BroadcastLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.broadcaster.send(LogEvent {
            timestamp: Utc::now(),
            level: event.metadata().level().to_string(),
            target: event.metadata().target().to_string(),
            message: strip_ansi(&visitor.message),
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

/// Initialize logging and return the broadcaster feeding the push channel.
///
/// `loglevel` may be a bare level (`debug`) applied to the crate, or a full
/// filter directive; `RUST_LOG` takes precedence over both.
pub fn init(loglevel: &str) -> LogBroadcaster {
    let directive = if loglevel.contains('=') || loglevel.contains(',') {
        loglevel.to_string()
    } else {
        format!("ffqueue={},sqlx=warn", loglevel)
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let broadcaster = LogBroadcaster::new();
    let layer = BroadcastLayer {
        broadcaster: broadcaster.clone(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(layer)
        .init();

    broadcaster
}
