//! Log console
//!
//! In-memory list of recent log records, fed from any thread through a
//! [`ConsoleSender`] and drained on the main loop. Mirrors the columns of a
//! log list view: Time, Level, Logger, Message.

use chrono::{DateTime, Local};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::Path;

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CSV_HEADER: [&str; 4] = ["Time", "Level", "Logger", "Message"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleRecord {
    pub timestamp: DateTime<Local>,
    pub level: log::Level,
    pub target: String,
    pub message: String,
}

impl ConsoleRecord {
    pub fn new(level: log::Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn from_record(record: &log::Record<'_>) -> Self {
        Self::new(record.level(), record.target(), record.args().to_string())
    }

    pub fn time_column(&self) -> String {
        self.timestamp.format(TIME_FORMAT).to_string()
    }

    /// Time, Level, Logger, Message
    pub fn columns(&self) -> [String; 4] {
        [
            self.time_column(),
            self.level.to_string(),
            self.target.clone(),
            self.message.clone(),
        ]
    }
}

/// Cloneable, thread-safe sending half
#[derive(Debug, Clone)]
pub struct ConsoleSender {
    tx: Sender<ConsoleRecord>,
}

impl ConsoleSender {
    /// Fire-and-forget; records are dropped once the console is gone
    pub fn send(&self, record: ConsoleRecord) {
        let _ = self.tx.send(record);
    }
}

#[derive(Debug)]
pub struct LogConsole {
    rx: Receiver<ConsoleRecord>,
    records: VecDeque<ConsoleRecord>,
    capacity: usize,
}

/// Create a console keeping at most `capacity` records
pub fn channel(capacity: usize) -> (ConsoleSender, LogConsole) {
    let (tx, rx) = unbounded();
    let console = LogConsole {
        rx,
        records: VecDeque::new(),
        capacity: capacity.max(1),
    };
    (ConsoleSender { tx }, console)
}

impl LogConsole {
    /// Move pending records into the console; returns how many arrived
    pub fn drain(&mut self) -> usize {
        let mut received = 0;
        while let Ok(record) = self.rx.try_recv() {
            if self.records.len() == self.capacity {
                self.records.pop_front();
            }
            self.records.push_back(record);
            received += 1;
        }
        received
    }

    pub fn records(&self) -> impl Iterator<Item = &ConsoleRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All records as rows of columns, oldest first
    pub fn get_messages(&self) -> Vec<[String; 4]> {
        self.records.iter().map(ConsoleRecord::columns).collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn to_csv(&self) -> String {
        let mut out = csv_row(&CSV_HEADER);
        for record in &self.records {
            out.push_str(&csv_row(&record.columns()));
        }
        out
    }

    /// Write every record to `path` as CSV
    pub fn export_csv(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        file.write_all(self.to_csv().as_bytes())?;
        log::info!("✓ Exported {} log record(s) to {}", self.len(), path.display());
        Ok(())
    }
}

fn csv_row<S: AsRef<str>>(fields: &[S]) -> String {
    let mut row = fields
        .iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    row.push_str("\r\n");
    row
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
