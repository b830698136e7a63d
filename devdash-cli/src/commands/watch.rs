use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use tokio::sync::{mpsc, watch};

use devdash_core::alerts::{AlertHistory, AlertKind};
use devdash_core::health::HealthEvent;
use devdash_core::interleaver::LogInterleaver;
use devdash_core::log_buffer::LogBuffer;
use devdash_core::project_state::{ProjectState, detect_state};
use devdash_core::registry::Project;

use super::Context;
use super::logs::render_line;
use crate::client::ComposeClient;
use crate::poller::{ProjectPoller, StateWatcher};

/// Left column width for service names in the live stream.
const SERVICE_WIDTH: usize = 12;

pub async fn run_watch(ctx: &mut Context, name: &str) -> Result<()> {
    let project = ctx.project(name)?.clone();
    let client = Arc::new(ComposeClient::new(project.socket_path()));

    let state = detect_state(&project, client.as_ref()).await;
    if !matches!(state, ProjectState::Running | ProjectState::Degraded) {
        bail!("{} is {state}; nothing to watch", project.name);
    }

    ctx.registry.touch(&project.path);
    ctx.save_registry()?;

    let interleaver = Arc::new(LogInterleaver::with_interval(
        Arc::new(LogBuffer::new(ctx.config.logs.buffer_capacity)),
        ctx.config.flush_interval(),
    ));
    interleaver.start();
    let buffer = interleaver.output();

    let poller = ProjectPoller::new(
        project.name.clone(),
        client,
        Arc::clone(&interleaver),
        AlertHistory::new(ctx.config.alerts.capacity),
        ctx.config.logs.fetch_lines,
    );
    let (event_tx, mut event_rx) = mpsc::channel::<HealthEvent>(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(poller.run(ctx.config.focused_interval(), event_tx, shutdown_rx.clone()));

    let others: Vec<Project> = ctx
        .registry
        .visible()
        .filter(|p| p.path != project.path)
        .cloned()
        .collect();
    let (change_tx, mut change_rx) = mpsc::channel(16);
    let background = StateWatcher::new(others, |p: &Project| ComposeClient::new(p.socket_path()));
    let background = tokio::spawn(background.run(ctx.config.background_interval(), change_tx, shutdown_rx));

    println!("Watching {} ({state})... (Ctrl+C to stop)\n", project.name);

    let crashes_only = ctx.config.alerts.notify_crashes_only;
    let mut printer = tokio::time::interval(ctx.config.flush_interval());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            Some(event) = event_rx.recv() => {
                let kind = AlertKind::from(event.kind);
                if !crashes_only || kind.is_critical() {
                    println!(
                        "\x1b[1m[{}] {} {}\x1b[0m (exit {})",
                        kind.badge(),
                        event.project,
                        event.service,
                        event.exit_code
                    );
                }
            }
            Some(change) = change_rx.recv() => {
                println!("\x1b[2m[{}] {} -> {}\x1b[0m", change.project, change.from, change.to);
            }
            _ = printer.tick() => {
                for entry in buffer.drain() {
                    println!("{}", render_line(&entry, SERVICE_WIDTH, &[]));
                }
            }
        }
    }

    // Unblock any sender before asking the tasks to stop.
    drop(event_rx);
    drop(change_rx);
    let _ = shutdown_tx.send(true);
    let poller = task.await.context("poller task failed")?;
    background.await.context("background watcher failed")?;
    interleaver.stop().await;
    for entry in buffer.drain() {
        println!("{}", render_line(&entry, SERVICE_WIDTH, &[]));
    }

    let alerts = poller.alerts();
    println!("\nStopped. {} alert(s) this session.", alerts.len());
    for alert in alerts.recent(5) {
        println!(
            "  {} [{}] {}: {}",
            alert.timestamp.format("%H:%M:%S"),
            alert.kind.badge(),
            alert.service,
            alert.message
        );
    }
    Ok(())
}
