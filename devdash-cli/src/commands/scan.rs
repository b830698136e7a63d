use anyhow::Result;

use devdash_core::scanner::scan;

use super::Context;

pub fn run_scan(ctx: &mut Context, add: bool) -> Result<()> {
    let roots = &ctx.config.projects.scan_paths;
    let found = scan(roots, ctx.config.projects.scan_depth);

    if found.is_empty() {
        let roots: Vec<String> = roots.iter().map(|p| p.display().to_string()).collect();
        println!("No projects found under {}", roots.join(", "));
        return Ok(());
    }

    let mut added = 0;
    for path in found {
        let known = ctx.registry.find_by_path(&path).is_some();
        let marker = if known { "  " } else { "+ " };
        println!("{marker}{}", path.display());
        if add && !known {
            ctx.registry.add(path);
            added += 1;
        }
    }

    if add {
        if added > 0 {
            ctx.save_registry()?;
        }
        println!("\nAdded {added} project(s).");
    }
    Ok(())
}
