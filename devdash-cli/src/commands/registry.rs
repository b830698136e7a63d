use std::path::Path;

use anyhow::{Context as _, Result};

use devdash_core::scanner::{PROJECT_MARKER, expand_home};

use super::Context;

pub fn run_add(ctx: &mut Context, path: &Path) -> Result<()> {
    let expanded = expand_home(path);
    let path = std::fs::canonicalize(&expanded)
        .with_context(|| format!("resolving {}", expanded.display()))?;

    if !path.join(PROJECT_MARKER).exists() {
        println!("warning: {} has no {PROJECT_MARKER}", path.display());
    }

    let project = ctx.registry.add(path);
    println!("Added {} ({})", project.name, project.path.display());
    ctx.save_registry()
}

pub fn run_remove(ctx: &mut Context, name_or_path: &str) -> Result<()> {
    let project = ctx.project(name_or_path)?;
    let (name, path) = (project.name.clone(), project.path.clone());

    ctx.registry.remove(&path);
    ctx.save_registry()?;
    println!("Removed {name} ({})", path.display());
    Ok(())
}

pub fn run_hide(ctx: &mut Context, name_or_path: &str) -> Result<()> {
    set_hidden(ctx, name_or_path, true)
}

pub fn run_unhide(ctx: &mut Context, name_or_path: &str) -> Result<()> {
    set_hidden(ctx, name_or_path, false)
}

fn set_hidden(ctx: &mut Context, name_or_path: &str, hidden: bool) -> Result<()> {
    let project = ctx.project(name_or_path)?;
    let (name, path) = (project.name.clone(), project.path.clone());

    ctx.registry.set_hidden(&path, hidden);
    ctx.save_registry()?;
    println!("{} {name}", if hidden { "Hid" } else { "Unhid" });
    Ok(())
}
