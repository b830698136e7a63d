mod logs;
mod registry;
mod repair;
mod scan;
mod service;
mod status;
mod watch;

use std::path::PathBuf;
#[cfg(test)]
use std::path::Path;

use anyhow::{Context as _, Result, anyhow};

use devdash_core::config::DevdashConfig;
use devdash_core::registry::{Project, Registry};

pub use logs::{LogsArgs, run_logs};
pub use registry::{run_add, run_hide, run_remove, run_unhide};
pub use repair::run_repair;
pub use scan::run_scan;
pub use service::{run_service, run_stop};
pub use status::run_status;
pub use watch::run_watch;

/// Loaded configuration and project registry shared by every command.
pub struct Context {
    pub config: DevdashConfig,
    pub registry: Registry,
    pub registry_path: PathBuf,
}

impl Context {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => DevdashConfig::load(&path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => DevdashConfig::discover().context("loading config")?.1,
        };

        let registry_path = Registry::default_path();
        let registry = Registry::load(&registry_path)?;

        Ok(Self {
            config,
            registry,
            registry_path,
        })
    }

    pub fn save_registry(&self) -> Result<()> {
        self.registry.save(&self.registry_path)?;
        Ok(())
    }

    /// Resolve a project by name or path, or fail listing what is known.
    pub fn project(&self, name_or_path: &str) -> Result<&Project> {
        self.registry.resolve(name_or_path).ok_or_else(|| {
            let known: Vec<&str> = self.registry.visible().map(|p| p.name.as_str()).collect();
            if known.is_empty() {
                anyhow!("unknown project '{name_or_path}' (no projects registered)")
            } else {
                anyhow!("unknown project '{name_or_path}'. Available: {}", known.join(", "))
            }
        })
    }
}

#[cfg(test)]
impl Context {
    /// Default config with an empty registry saved under `dir`.
    pub(crate) fn in_dir(dir: &Path) -> Self {
        Self {
            config: DevdashConfig::default(),
            registry: Registry::default(),
            registry_path: dir.join("projects.yaml"),
        }
    }
}
