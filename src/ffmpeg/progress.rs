//! Parsing of the encoder's stderr stream into progress updates.
//!
//! The encoder interleaves free-form log lines with `key=value` progress
//! frames (enabled via `-progress pipe:2`). A `Duration: HH:MM:SS.ff` line
//! near the start of the stream carries the total input duration; each frame
//! is terminated by its `progress=` key.

use std::sync::LazyLock;

use regex::Regex;

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Duration: (\d+:\d+:\d+\.\d+)").expect("valid duration regex"));

/// A single progress observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Percent complete, 0..=100, two decimals.
    pub percent: f64,
    /// Estimated seconds remaining, -1 when unknown.
    pub remaining: f64,
}

/// Stateful scanner over one sub-command's stderr lines.
#[derive(Debug, Default)]
pub struct ProgressParser {
    /// Total input duration in seconds; 0 until the Duration line is seen.
    duration: f64,
    out_time_secs: Option<f64>,
    speed: Option<f64>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Feed one stderr line; returns an update when a frame completes.
    pub fn observe_line(&mut self, line: &str) -> Option<ProgressUpdate> {
        // First Duration match wins for this sub-command.
        if self.duration == 0.0 {
            if let Some(caps) = DURATION_RE.captures(line) {
                self.duration = parse_clock(&caps[1]).unwrap_or(0.0);
                return None;
            }
        }

        let (key, value) = line.split_once('=')?;
        let key = key.trim();
        let value = value.trim();

        match key {
            "out_time_ms" => {
                // Despite the name this field carries microseconds.
                self.out_time_secs = value.parse::<i64>().ok().map(|v| v as f64 / 1_000_000.0);
            }
            "out_time" => {
                if self.out_time_secs.is_none() {
                    self.out_time_secs = parse_clock(value);
                }
            }
            "speed" => {
                self.speed = value.strip_suffix('x').unwrap_or(value).trim().parse().ok();
            }
            "frame" | "fps" | "bitrate" => {}
            "progress" => return self.finalize_frame(),
            _ => {}
        }

        None
    }

    fn finalize_frame(&mut self) -> Option<ProgressUpdate> {
        let time = self.out_time_secs.take()?;
        let percent = if self.duration > 0.0 {
            ((time / self.duration * 100.0) * 100.0).round() / 100.0
        } else {
            // Unknown total: hold at zero until the encoder exits.
            0.0
        };
        // The encoder reports a sentinel negative out_time before the first
        // real frame.
        let percent = percent.clamp(0.0, 100.0);

        let remaining = match self.speed {
            Some(speed) if speed > 0.0 && self.duration > 0.0 => {
                ((self.duration - time) / speed).max(0.0)
            }
            _ => -1.0,
        };

        Some(ProgressUpdate { percent, remaining })
    }
}

/// Parse a `HH:MM:SS.ff` clock value into seconds.
fn parse_clock(value: &str) -> Option<f64> {
    let mut parts = value.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
