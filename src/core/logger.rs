//! Wire trace logging
//!
//! Records every command written to the controller and every report byte read
//! back, with timestamps, in one of a few line-oriented formats.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared handle used by the session
pub type WireLog = Arc<Mutex<WireLogger>>;

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Printable text, control bytes escaped
    #[default]
    Text,
    /// Hex dump
    Hex,
    /// JSON lines
    JsonLines,
}

impl LogFormat {
    /// Get file extension for format
    pub fn extension(&self) -> &'static str {
        match self {
            LogFormat::Text => "txt",
            LogFormat::Hex => "hex",
            LogFormat::JsonLines => "jsonl",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "hex" => Ok(Self::Hex),
            "json" | "jsonl" | "jsonlines" => Ok(Self::JsonLines),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Data direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    /// Report byte from the controller
    Received,
    /// Command to the controller
    Sent,
    /// Session lifecycle note
    Info,
}

impl Direction {
    fn tag(self) -> &'static str {
        match self {
            Direction::Received => "RX",
            Direction::Sent => "TX",
            Direction::Info => "##",
        }
    }
}

/// A single log entry
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LogEntry {
    /// When the bytes crossed the wire
    pub timestamp: DateTime<Local>,
    /// Which way
    pub direction: Direction,
    /// Raw bytes
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl LogEntry {
    /// Create new entry stamped now
    pub fn new(direction: Direction, data: Vec<u8>) -> Self {
        Self {
            timestamp: Local::now(),
            direction,
            data,
        }
    }

    /// Format as text, with `\r` and other control bytes escaped
    pub fn to_text(&self) -> String {
        let text: String = self.data.iter().map(|b| escape(*b)).collect();
        format!(
            "[{}] {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.direction.tag(),
            text
        )
    }

    /// Format as hex
    pub fn to_hex(&self) -> String {
        let hex: Vec<String> = self.data.iter().map(|b| format!("{:02X}", b)).collect();
        format!(
            "[{}] {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.direction.tag(),
            hex.join(" ")
        )
    }

    /// Format as JSON line
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn render(&self, format: LogFormat) -> String {
        match format {
            LogFormat::Text => self.to_text(),
            LogFormat::Hex => self.to_hex(),
            LogFormat::JsonLines => self.to_json(),
        }
    }
}

fn escape(byte: u8) -> String {
    match byte {
        b'\r' => "\\r".to_string(),
        b'\n' => "\\n".to_string(),
        0x20..=0x7E => (byte as char).to_string(),
        _ => format!("\\x{:02X}", byte),
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode_upper(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Wire trace logger
pub struct WireLogger {
    file: BufWriter<File>,
    format: LogFormat,
    path: PathBuf,
    lines_logged: usize,
}

impl WireLogger {
    /// Open (append) a trace file
    pub fn open(path: &Path, format: LogFormat) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: BufWriter::new(file),
            format,
            path: path.to_path_buf(),
            lines_logged: 0,
        })
    }

    /// Open a trace file wrapped for sharing with a session
    pub fn shared(path: &Path, format: LogFormat) -> std::io::Result<WireLog> {
        Self::open(path, format).map(|logger| Arc::new(Mutex::new(logger)))
    }

    /// Trace file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log data
    pub fn log(&mut self, direction: Direction, data: &[u8]) {
        let entry = LogEntry::new(direction, data.to_vec());
        if let Err(e) = writeln!(self.file, "{}", entry.render(self.format)) {
            tracing::warn!("Wire log write to {} failed: {}", self.path.display(), e);
            return;
        }
        self.lines_logged += 1;

        if self.lines_logged % 100 == 0 {
            let _ = self.file.flush();
        }
    }

    /// Log received data
    pub fn log_rx(&mut self, data: &[u8]) {
        self.log(Direction::Received, data);
    }

    /// Log sent data
    pub fn log_tx(&mut self, data: &[u8]) {
        self.log(Direction::Sent, data);
    }

    /// Log info message
    pub fn log_info(&mut self, message: &str) {
        self.log(Direction::Info, message.as_bytes());
    }

    /// Lines written so far
    pub fn lines_logged(&self) -> usize {
        self.lines_logged
    }

    /// Flush to disk
    pub fn flush(&mut self) {
        let _ = self.file.flush();
    }
}

impl Drop for WireLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Generate trace filename with timestamp
pub fn generate_log_filename(prefix: &str, format: LogFormat) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}.{}", prefix, timestamp, format.extension())
}
