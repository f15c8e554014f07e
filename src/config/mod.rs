//! Server configuration and shared encoder-path cell.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Command-line options for the daemon.
#[derive(Debug, Clone, Parser)]
#[command(name = "ffqueue", about = "Media-transcoding task daemon")]
pub struct ServerConfig {
    /// Path to the encoder binary (discovered on PATH when omitted).
    #[arg(long = "ffmpeg", short = 'f', env = "FFQUEUE_FFMPEG")]
    pub ffmpeg: Option<String>,

    /// Port the HTTP API listens on.
    #[arg(long, short = 'p', env = "FFQUEUE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// SQLite database URL.
    #[arg(
        long,
        short = 'b',
        env = "FFQUEUE_DATABASE",
        default_value = "sqlite:ffqueue.db?mode=rwc"
    )]
    pub database: String,

    /// Maximum number of concurrently running tasks.
    #[arg(
        long = "max-concurrent-tasks",
        short = 'm',
        env = "FFQUEUE_MAX_CONCURRENT_TASKS",
        default_value_t = 3
    )]
    pub max_concurrent_tasks: usize,

    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    #[arg(long, env = "FFQUEUE_LOGLEVEL", default_value = "info")]
    pub loglevel: String,
}

/// Interval between encoder-path rediscovery runs.
const DISCOVERY_INTERVAL: Duration = Duration::from_secs(10);

/// Shared cell holding the resolved encoder binary path.
///
/// Readers take a shared lock; the single background discovery task is the
/// only writer. An empty path means the binary is currently unavailable.
#[derive(Clone)]
pub struct EncoderLocator {
    path: Arc<RwLock<String>>,
}

impl EncoderLocator {
    pub fn new(configured: Option<String>) -> Self {
        let initial = configured.unwrap_or_else(|| "ffmpeg".to_string());
        Self {
            path: Arc::new(RwLock::new(initial)),
        }
    }

    /// Current encoder path; empty when discovery has not found the binary.
    pub fn current(&self) -> String {
        self.path.read().clone()
    }

    pub fn is_available(&self) -> bool {
        !self.path.read().is_empty()
    }

    fn rediscover(&self, found_before: bool) -> bool {
        let mut path = self.path.write();
        let candidate = if path.is_empty() {
            "ffmpeg".to_string()
        } else {
            path.clone()
        };
        match which::which(&candidate) {
            Ok(resolved) => {
                *path = resolved.to_string_lossy().into_owned();
                if !found_before {
                    info!("encoder binary found at {}", *path);
                }
                true
            }
            Err(e) => {
                *path = String::new();
                if found_before {
                    error!(
                        "encoder binary not found in PATH; install it or pass --ffmpeg: {}",
                        e
                    );
                }
                false
            }
        }
    }

    /// Spawn the periodic single-writer rediscovery task.
    pub fn spawn_discovery(&self, shutdown: CancellationToken) {
        let locator = self.clone();
        tokio::spawn(async move {
            // Log loudly on the first miss as well.
            let mut found = locator.rediscover(true);
            let mut tick = tokio::time::interval(DISCOVERY_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tick.tick() => {
                        found = locator.rediscover(found);
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_defaults_to_ffmpeg() {
        let locator = EncoderLocator::new(None);
        assert_eq!(locator.current(), "ffmpeg");
        assert!(locator.is_available());
    }

    #[test]
    fn test_locator_uses_configured_path() {
        let locator = EncoderLocator::new(Some("/opt/ffmpeg/bin/ffmpeg".to_string()));
        assert_eq!(locator.current(), "/opt/ffmpeg/bin/ffmpeg");
    }

    #[test]
    #[cfg(unix)]
    fn test_rediscover_resolves_real_binary() {
        // `sh` exists on every unix box; the locator should resolve it to an
        // absolute path.
        let locator = EncoderLocator::new(Some("sh".to_string()));
        assert!(locator.rediscover(false));
        assert!(locator.current().ends_with("/sh"));
    }

    #[test]
    fn test_rediscover_clears_missing_binary() {
        let locator = EncoderLocator::new(Some("definitely-not-a-real-encoder".to_string()));
        assert!(!locator.rediscover(true));
        assert!(!locator.is_available());
    }
}
