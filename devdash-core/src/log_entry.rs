//! Structured log records and the helpers that build them from raw text.
//!
//! Control sockets hand back unstructured lines. Each line is turned into a
//! [`LogEntry`] by extracting a timestamp (falling back to the time it was
//! received) and classifying its severity by keyword.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

const ERROR_KEYWORDS: &[&str] = &["error", "err", "fatal", "critical", "panic", "exception", "fail"];
const WARN_KEYWORDS: &[&str] = &["warn", "warning", "caution"];
const DEBUG_KEYWORDS: &[&str] = &["debug", "trace", "verbose"];

/// Classify a message by keyword, case-insensitively.
///
/// Priority is Error > Warn > Debug; anything else is Info.
pub fn detect_level(text: &str) -> LogLevel {
    let lower = text.to_lowercase();
    let any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if any(ERROR_KEYWORDS) {
        return LogLevel::Error;
    }
    if any(WARN_KEYWORDS) {
        return LogLevel::Warn;
    }
    if any(DEBUG_KEYWORDS) {
        return LogLevel::Debug;
    }

    LogLevel::Info
}

static ISO_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?")
        .expect("valid iso timestamp regex")
});

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:Mon|Tue|Wed|Thu|Fri|Sat|Sun)\s+(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+(\d{1,2})\s+(\d{1,2}:\d{2}:\d{2})\s+(AM|PM)\s+\w+\s+(\d{4})",
    )
    .expect("valid date timestamp regex")
});

static TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{2}:\d{2}:\d{2}(?:\.\d+)?\b").expect("valid time timestamp regex")
});

/// Find and parse the first recognizable timestamp in a log line.
///
/// Shapes are tried in order: ISO-8601 (with or without offset),
/// `Mon Jan 2 03:04:05 PM MST 2006`, then a bare `15:04:05` which is
/// dated today. Timestamps without an offset are read as local time; the
/// zone abbreviation in the long date form is ignored.
pub fn parse_log_timestamp(line: &str) -> Option<DateTime<Local>> {
    if let Some(m) = ISO_PATTERN.find(line) {
        if let Some(ts) = parse_iso(m.as_str()) {
            return Some(ts);
        }
    }

    if let Some(caps) = DATE_PATTERN.captures(line) {
        let normalized = format!("{} {} {} {} {}", &caps[1], &caps[2], &caps[3], &caps[4], &caps[5]);
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, "%b %d %I:%M:%S %p %Y") {
            if let Some(ts) = local(naive) {
                return Some(ts);
            }
        }
    }

    if let Some(m) = TIME_PATTERN.find(line) {
        if let Ok(time) = NaiveTime::parse_from_str(m.as_str(), "%H:%M:%S%.f") {
            let today: NaiveDate = Local::now().date_naive();
            return local(today.and_time(time));
        }
    }

    None
}

fn parse_iso(raw: &str) -> Option<DateTime<Local>> {
    // Accept a space separator by rewriting it to the RFC 3339 form.
    let normalized: String = raw
        .char_indices()
        .map(|(i, c)| if i == 10 && c == ' ' { 'T' } else { c })
        .collect();

    if let Ok(ts) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(ts.with_timezone(&Local));
    }
    if let Ok(ts) = DateTime::<FixedOffset>::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts.with_timezone(&Local));
    }
    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(local)
}

fn local(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    Local.from_local_datetime(&naive).earliest()
}

/// A single log line attributed to a service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub service: String,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(
        timestamp: DateTime<Local>,
        service: impl Into<String>,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            service: service.into(),
            level,
            message: message.into(),
        }
    }

    /// Build an entry from a raw line, using `received_at` when the line
    /// carries no parseable timestamp.
    pub fn from_raw(service: &str, line: &str, received_at: DateTime<Local>) -> Self {
        Self {
            timestamp: parse_log_timestamp(line).unwrap_or(received_at),
            service: service.to_string(),
            level: detect_level(line),
            message: line.to_string(),
        }
    }
}
