//! Turns repeated "last K lines" fetches into a stream of new entries.
//!
//! Control sockets return a sliding window of each service's recent output,
//! so consecutive polls overlap. The ingestor keeps the previous window per
//! service and only converts the lines past the overlap.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};

use crate::interleaver::LogInterleaver;
use crate::log_entry::LogEntry;

#[derive(Debug, Default)]
pub struct LogIngestor {
    previous: BTreeMap<String, Vec<String>>,
}

/// Length of the longest suffix of `previous` that is a prefix of `current`.
fn overlap(previous: &[String], current: &[String]) -> usize {
    (0..previous.len())
        .map(|shift| previous.len() - shift)
        .find(|&len| len <= current.len() && current[..len] == previous[previous.len() - len..])
        .unwrap_or(0)
}

impl LogIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert the unseen tail of `lines` (oldest first) into entries.
    ///
    /// The window is aligned against the previous one for `service`: the
    /// longest run where the old window's tail equals the new window's head
    /// is treated as already seen. With no overlap the whole window is new.
    pub fn ingest(&mut self, service: &str, lines: &[String], received_at: DateTime<Local>) -> Vec<LogEntry> {
        if lines.is_empty() {
            return Vec::new();
        }

        let start = self
            .previous
            .get(service)
            .map_or(0, |previous| overlap(previous, lines));

        self.previous.insert(service.to_string(), lines.to_vec());

        lines[start..]
            .iter()
            .map(|line| LogEntry::from_raw(service, line, received_at))
            .collect()
    }

    /// Ingest and queue the new entries on `interleaver`. Returns how many
    /// entries were queued.
    pub fn ingest_into(
        &mut self,
        interleaver: &LogInterleaver,
        service: &str,
        lines: &[String],
        received_at: DateTime<Local>,
    ) -> usize {
        let entries = self.ingest(service, lines, received_at);
        let count = entries.len();
        for entry in entries {
            interleaver.add(entry);
        }
        count
    }

    /// Forget all services, e.g. when switching projects.
    pub fn reset(&mut self) {
        self.previous.clear();
    }
}
