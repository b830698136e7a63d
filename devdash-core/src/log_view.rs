//! Read-side projection over a [`LogBuffer`]: service filter, search,
//! match navigation, and scroll/follow state.
//!
//! The view never copies entries into its own storage; every query reads
//! the buffer and re-applies the pipeline:
//!
//! 1. keep entries whose service equals the service filter (if set)
//! 2. in filter mode with an active query, keep only matching messages
//!
//! `offset` counts lines back from the newest displayed line.

use std::ops::Range;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::log_buffer::LogBuffer;
use crate::log_entry::LogEntry;

/// A case-insensitive literal search term.
#[derive(Clone, Debug)]
pub struct SearchQuery {
    raw: String,
    pattern: Option<Regex>,
    lowered: String,
}

impl SearchQuery {
    /// Returns `None` for an empty query.
    pub fn new(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        let pattern = RegexBuilder::new(&regex::escape(raw))
            .case_insensitive(true)
            .build()
            .ok();
        Some(Self {
            raw: raw.to_string(),
            pattern,
            lowered: raw.to_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_match(&self, text: &str) -> bool {
        match &self.pattern {
            Some(re) => re.is_match(text),
            None => text.to_lowercase().contains(&self.lowered),
        }
    }

    /// Byte ranges of every non-overlapping match in `text`.
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        match &self.pattern {
            Some(re) => re.find_iter(text).map(|m| m.range()).collect(),
            None => Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct LogView {
    buffer: Arc<LogBuffer>,
    width: usize,
    height: usize,
    offset: usize,
    follow: bool,
    service: String,
    search: Option<SearchQuery>,
    filter_mode: bool,
    /// Positions into the service-filtered sequence whose message matches.
    matches: Vec<usize>,
    match_cursor: usize,
}

impl LogView {
    /// A view over its own buffer of default capacity.
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_buffer(Arc::new(LogBuffer::default()), width, height)
    }

    /// A view over a shared buffer, e.g. one fed by a log interleaver.
    pub fn with_buffer(buffer: Arc<LogBuffer>, width: usize, height: usize) -> Self {
        Self {
            buffer,
            width,
            height,
            offset: 0,
            follow: true,
            service: String::new(),
            search: None,
            filter_mode: false,
            matches: Vec::new(),
            match_cursor: 0,
        }
    }

    pub fn buffer(&self) -> &Arc<LogBuffer> {
        &self.buffer
    }

    pub fn add_entry(&mut self, entry: LogEntry) {
        self.buffer.add(entry);
        if self.follow {
            self.offset = 0;
        }
    }

    /// Restrict the view to one service; an empty name shows all.
    pub fn set_service(&mut self, service: impl Into<String>) {
        self.service = service.into();
        self.offset = 0;
        self.recompute_matches();
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn set_size(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Entries after the service filter only.
    pub fn service_filtered(&self) -> Vec<LogEntry> {
        let all = self.buffer.lines();
        if self.service.is_empty() {
            return all;
        }
        all.into_iter().filter(|e| e.service == self.service).collect()
    }

    /// Entries after the full pipeline, oldest first.
    pub fn displayed(&self) -> Vec<LogEntry> {
        let lines = self.service_filtered();
        match (&self.search, self.filter_mode) {
            (Some(query), true) => lines
                .into_iter()
                .filter(|e| query.is_match(&e.message))
                .collect(),
            _ => lines,
        }
    }

    /// The window of at most `height` entries ending `offset` lines before
    /// the newest displayed entry.
    pub fn visible_lines(&self) -> Vec<LogEntry> {
        let mut lines = self.displayed();
        let total = lines.len();
        let end = total - self.offset.min(total);
        let start = end.saturating_sub(self.height);
        lines.truncate(end);
        lines.drain(..start);
        lines
    }

    /// `(current line, total)` for a position indicator. The current line
    /// is 1-based and counts the newest visible line.
    pub fn scroll_info(&self) -> (usize, usize) {
        let total = self.displayed().len();
        if total == 0 {
            return (0, 0);
        }
        let current = total.saturating_sub(self.offset).clamp(1, total);
        (current, total)
    }

    fn max_offset(&self) -> usize {
        self.displayed().len().saturating_sub(self.height)
    }

    // Scrolling

    pub fn scroll_up(&mut self) {
        self.follow = false;
        if self.offset < self.max_offset() {
            self.offset += 1;
        }
    }

    pub fn scroll_down(&mut self) {
        self.offset = self.offset.saturating_sub(1);
        if self.offset == 0 {
            self.follow = true;
        }
    }

    pub fn page_up(&mut self) {
        self.follow = false;
        self.offset = (self.offset + self.height).min(self.max_offset());
    }

    pub fn page_down(&mut self) {
        self.offset = self.offset.saturating_sub(self.height);
        if self.offset == 0 {
            self.follow = true;
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.follow = false;
        self.offset = self.max_offset();
    }

    pub fn scroll_to_bottom(&mut self) {
        self.offset = 0;
        self.follow = true;
    }

    // Follow mode

    pub fn toggle_follow(&mut self) {
        self.set_follow(!self.follow);
    }

    pub fn set_follow(&mut self, follow: bool) {
        self.follow = follow;
        if follow {
            self.offset = 0;
        }
    }

    pub fn is_following(&self) -> bool {
        self.follow
    }

    /// Remove every entry from the underlying buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.offset = 0;
        self.matches.clear();
        self.match_cursor = 0;
    }

    // Search

    /// Set the query, rebuild the match list, and jump to the first match.
    pub fn set_search(&mut self, query: &str) {
        self.search = SearchQuery::new(query);
        self.recompute_matches();
        if !self.matches.is_empty() {
            self.scroll_to_match(0);
        }
    }

    pub fn clear_search(&mut self) {
        self.search = None;
        self.filter_mode = false;
        self.matches.clear();
        self.match_cursor = 0;
    }

    /// Flip between highlighting matches and showing only matches.
    pub fn toggle_filter(&mut self) {
        self.filter_mode = !self.filter_mode;
        self.offset = 0;
    }

    pub fn next_match(&mut self) {
        if self.matches.is_empty() {
            return;
        }
        self.match_cursor = (self.match_cursor + 1) % self.matches.len();
        self.scroll_to_match(self.match_cursor);
    }

    pub fn prev_match(&mut self) {
        if self.matches.is_empty() {
            return;
        }
        self.match_cursor = self
            .match_cursor
            .checked_sub(1)
            .unwrap_or(self.matches.len() - 1);
        self.scroll_to_match(self.match_cursor);
    }

    pub fn search_query(&self) -> &str {
        self.search.as_ref().map(SearchQuery::as_str).unwrap_or("")
    }

    pub fn is_search_active(&self) -> bool {
        self.search.is_some()
    }

    pub fn is_filter_mode(&self) -> bool {
        self.filter_mode
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// 1-based position of the match cursor, or 0 without matches.
    pub fn current_match(&self) -> usize {
        if self.matches.is_empty() {
            0
        } else {
            self.match_cursor + 1
        }
    }

    /// Byte ranges in `message` to highlight for the active query.
    pub fn highlight_spans(&self, message: &str) -> Vec<Range<usize>> {
        self.search
            .as_ref()
            .map(|q| q.spans(message))
            .unwrap_or_default()
    }

    fn recompute_matches(&mut self) {
        self.matches.clear();
        self.match_cursor = 0;
        let Some(query) = &self.search else {
            return;
        };
        self.matches = self
            .service_filtered()
            .iter()
            .enumerate()
            .filter(|(_, e)| query.is_match(&e.message))
            .map(|(i, _)| i)
            .collect();
    }

    /// Center the match at `idx` in the viewport.
    fn scroll_to_match(&mut self, idx: usize) {
        let Some(&line) = self.matches.get(idx) else {
            return;
        };

        // In filter mode only matches are displayed, so the match's rank is
        // its display position.
        let (position, total) = if self.filter_mode {
            (idx, self.displayed().len())
        } else {
            (line, self.service_filtered().len())
        };

        let max_offset = total.saturating_sub(self.height);
        let wanted = total as isize - position as isize - (self.height / 2) as isize;
        self.offset = (wanted.max(0) as usize).min(max_offset);
        self.follow = false;
    }
}
