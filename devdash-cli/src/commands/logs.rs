use std::ops::Range;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::Local;
use tracing::warn;

use devdash_core::ingest::LogIngestor;
use devdash_core::interleaver::LogInterleaver;
use devdash_core::log_buffer::LogBuffer;
use devdash_core::log_entry::{LogEntry, LogLevel};
use devdash_core::log_view::LogView;
use devdash_core::status::ControlSocket;

use super::Context;
use crate::client::ComposeClient;

const DEFAULT_WIDTH: usize = 120;

pub struct LogsArgs {
    pub project: String,
    pub service: Option<String>,
    pub grep: Option<String>,
    pub filter: bool,
    pub lines: usize,
}

pub async fn run_logs(ctx: &mut Context, args: LogsArgs) -> Result<()> {
    let project = ctx.project(&args.project)?.clone();
    let client = ComposeClient::new(project.socket_path());

    let samples = client
        .status()
        .await
        .with_context(|| format!("querying {} (is it running?)", project.name))?;

    ctx.registry.touch(&project.path);
    ctx.save_registry()?;

    let interleaver = LogInterleaver::new(Arc::new(LogBuffer::new(ctx.config.logs.buffer_capacity)));
    let mut ingestor = LogIngestor::new();
    let received_at = Local::now();

    let wanted = samples
        .iter()
        .filter(|s| args.service.as_deref().is_none_or(|name| name == s.name));
    for sample in wanted {
        match client.logs(&sample.name, ctx.config.logs.fetch_lines).await {
            Ok(lines) => {
                ingestor.ingest_into(&interleaver, &sample.name, &lines, received_at);
            }
            Err(e) => warn!(service = %sample.name, error = %e, "could not fetch logs"),
        }
    }
    interleaver.stop().await;

    let mut view = LogView::with_buffer(Arc::clone(interleaver.output()), DEFAULT_WIDTH, args.lines);
    if let Some(width) = terminal_width() {
        view.set_size(width, args.lines);
    }
    configure_view(&mut view, &args, ctx.config.logs.follow);

    let lines = view.visible_lines();
    let service_width = lines.iter().map(|e| e.service.len()).max().unwrap_or(0);
    for entry in &lines {
        let spans = view.highlight_spans(&entry.message);
        println!("{}", render_line(entry, service_width, &spans));
    }

    if view.is_search_active() {
        let (current, total) = view.scroll_info();
        println!("{}", "-".repeat(view.width()));
        println!(
            "{} match(es) for '{}', line {current}/{total}",
            view.match_count(),
            view.search_query()
        );
    }
    Ok(())
}

/// Apply the command line's service, search and filter choices. With `follow`
/// the view sits on the newest lines and the newest match; without it, on the
/// oldest.
fn configure_view(view: &mut LogView, args: &LogsArgs, follow: bool) {
    if let Some(service) = &args.service {
        view.set_service(service.as_str());
    }
    if follow {
        view.set_follow(true);
    } else {
        view.scroll_to_top();
    }

    if let Some(query) = &args.grep {
        view.set_search(query);
        if args.filter {
            view.toggle_filter();
            if !follow {
                view.scroll_to_top();
            }
        } else if follow {
            view.prev_match();
        }
    }
}

fn terminal_width() -> Option<usize> {
    std::env::var("COLUMNS").ok().and_then(|c| c.parse().ok())
}

fn level_color(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "\x1b[31m",
        LogLevel::Warn => "\x1b[33m",
        LogLevel::Debug => "\x1b[2m",
        LogLevel::Info => "\x1b[0m",
    }
}

pub(crate) fn render_line(entry: &LogEntry, service_width: usize, spans: &[Range<usize>]) -> String {
    format!(
        "\x1b[2m{}\x1b[0m \x1b[36m{:<service_width$}\x1b[0m {}{:<5}\x1b[0m {}",
        entry.timestamp.format("%H:%M:%S"),
        entry.service,
        level_color(entry.level),
        entry.level,
        highlight(&entry.message, spans)
    )
}

/// Wrap each span of `message` in reverse video.
fn highlight(message: &str, spans: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(message.len() + spans.len() * 8);
    let mut cursor = 0;
    for span in spans {
        out.push_str(&message[cursor..span.start]);
        out.push_str("\x1b[7m");
        out.push_str(&message[span.clone()]);
        out.push_str("\x1b[27m");
        cursor = span.end;
    }
    out.push_str(&message[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_wraps_spans() {
        assert_eq!(highlight("no match", &[]), "no match");
        assert_eq!(
            highlight("Error then error", &[0..5, 11..16]),
            "\x1b[7mError\x1b[27m then \x1b[7merror\x1b[27m"
        );
    }

    #[test]
    fn test_render_line_pads_service() {
        let entry = LogEntry::new(Local::now(), "db", LogLevel::Warn, "slow query");
        let line = render_line(&entry, 5, &[]);
        assert!(line.contains("db   \x1b[0m"));
        assert!(line.contains("warn "));
        assert!(line.ends_with("slow query"));
    }

    fn args(grep: Option<&str>, filter: bool) -> LogsArgs {
        LogsArgs {
            project: "shop".to_string(),
            service: None,
            grep: grep.map(str::to_string),
            filter,
            lines: 3,
        }
    }

    fn view_of(messages: &[&str]) -> LogView {
        let buffer = Arc::new(LogBuffer::new(100));
        for message in messages {
            buffer.add(LogEntry::new(Local::now(), "api", LogLevel::Info, *message));
        }
        LogView::with_buffer(buffer, 80, 3)
    }

    fn messages(view: &LogView) -> Vec<String> {
        view.visible_lines().into_iter().map(|e| e.message).collect()
    }

    const LINES: [&str; 6] = ["boot", "error a", "two", "three", "error b", "five"];

    #[test]
    fn test_follow_shows_newest_lines() {
        let mut view = view_of(&LINES);
        configure_view(&mut view, &args(None, false), true);
        assert!(view.is_following());
        assert_eq!(messages(&view), vec!["three", "error b", "five"]);
    }

    #[test]
    fn test_no_follow_starts_at_oldest_lines() {
        let mut view = view_of(&LINES);
        configure_view(&mut view, &args(None, false), false);
        assert!(!view.is_following());
        assert_eq!(messages(&view), vec!["boot", "error a", "two"]);
    }

    #[test]
    fn test_search_lands_on_newest_match_when_following() {
        let mut view = view_of(&LINES);
        configure_view(&mut view, &args(Some("error"), false), true);
        assert_eq!(view.current_match(), 2);

        let mut view = view_of(&LINES);
        configure_view(&mut view, &args(Some("error"), false), false);
        assert_eq!(view.current_match(), 1);
    }

    #[test]
    fn test_filter_without_follow_starts_at_oldest_match() {
        let mut view = view_of(&["error 1", "x", "error 2", "error 3", "error 4"]);
        configure_view(&mut view, &args(Some("error"), true), false);
        assert_eq!(messages(&view), vec!["error 1", "error 2", "error 3"]);
    }
}
