use anyhow::Result;
use tracing::info;

use devdash_core::project_state::{ProjectState, detect_state};
use devdash_core::scanner::scan;

use super::Context;
use crate::client::ComposeClient;

pub async fn run_status(ctx: &mut Context) -> Result<()> {
    if ctx.registry.projects.is_empty() && ctx.config.projects.auto_discover {
        let found = scan(&ctx.config.projects.scan_paths, ctx.config.projects.scan_depth);
        if !found.is_empty() {
            info!(count = found.len(), "auto-discovered projects");
            for path in found {
                ctx.registry.add(path);
            }
            ctx.save_registry()?;
        }
    }

    let projects: Vec<_> = ctx.registry.visible().collect();
    if projects.is_empty() {
        println!("No projects registered. Run `devdash scan --add` or `devdash add <path>`.");
        return Ok(());
    }

    let width = projects.iter().map(|p| p.name.len()).max().unwrap_or(0);
    let mut stale = 0;

    for project in projects {
        let client = ComposeClient::new(project.socket_path());
        let state = detect_state(project, &client).await;
        if state == ProjectState::Stale {
            stale += 1;
        }
        println!(
            "{}{:<width$}\x1b[0m  {:<8}  {}",
            state_color(state),
            project.name,
            state,
            project.path.display()
        );
    }

    if stale > 0 {
        println!("\n{stale} stale project(s). Clean up with `devdash repair <project>`.");
    }
    Ok(())
}

fn state_color(state: ProjectState) -> &'static str {
    match state {
        ProjectState::Running => "\x1b[32m",
        ProjectState::Degraded => "\x1b[33m",
        ProjectState::Stale | ProjectState::Missing => "\x1b[31m",
        ProjectState::Idle => "\x1b[2m",
    }
}
