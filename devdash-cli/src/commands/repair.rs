use anyhow::{Context as _, Result, bail};

use devdash_core::project_state::{detect_state, repair};

use super::Context;
use crate::client::ComposeClient;

pub async fn run_repair(ctx: &Context, name: &str) -> Result<()> {
    let project = ctx.project(name)?;
    let client = ComposeClient::new(project.socket_path());

    let before = detect_state(project, &client).await;
    if !before.needs_repair() {
        bail!("{} is {before}; only stale projects can be repaired", project.name);
    }

    repair(project).with_context(|| format!("repairing {}", project.name))?;

    let after = detect_state(project, &client).await;
    println!("{}: {before} -> {after}", project.name);
    Ok(())
}
