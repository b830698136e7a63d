//! Registered projects and their on-disk list.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Directory (relative to a project root) holding the supervisor's runtime
/// artifacts. devenv usually makes it a symlink into `/run/user/$UID`.
pub const RUN_DIR: &str = ".devenv/run";

/// Control socket file name inside [`RUN_DIR`].
pub const SOCKET_NAME: &str = "pc.sock";

const REGISTRY_ENV: &str = "DEVDASH_REGISTRY";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub last_active: Option<DateTime<Local>>,
}

impl Project {
    /// A project named after the last component of its path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            path,
            hidden: false,
            last_active: Some(Local::now()),
        }
    }

    pub fn run_dir(&self) -> PathBuf {
        self.path.join(RUN_DIR)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.run_dir().join(SOCKET_NAME)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to access registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse registry {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl Registry {
    /// `$DEVDASH_REGISTRY`, else `<config dir>/devdash/projects.yaml`.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(REGISTRY_ENV) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("devdash")
            .join("projects.yaml")
    }

    /// Load from `path`; a missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no registry file, starting empty");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(RegistryError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_yaml::from_str(&content).map_err(|source| RegistryError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let io_err = |source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        let yaml = serde_yaml::to_string(self).map_err(|source| RegistryError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, yaml).map_err(io_err)
    }

    /// Register `path` unless it already is. Returns the stored project.
    pub fn add(&mut self, path: impl Into<PathBuf>) -> &Project {
        let path = path.into();
        let idx = match self.projects.iter().position(|p| p.path == path) {
            Some(idx) => idx,
            None => {
                self.projects.push(Project::new(path));
                self.projects.len() - 1
            }
        };
        &self.projects[idx]
    }

    /// Remove the project at `path`. Returns whether anything was removed.
    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.projects.len();
        self.projects.retain(|p| p.path != path);
        self.projects.len() != before
    }

    /// Hide or reveal the project at `path`. Returns whether it exists.
    pub fn set_hidden(&mut self, path: &Path, hidden: bool) -> bool {
        self.find_mut(path).map(|p| p.hidden = hidden).is_some()
    }

    /// Record that the project at `path` was just looked at.
    pub fn touch(&mut self, path: &Path) -> bool {
        self.find_mut(path)
            .map(|p| p.last_active = Some(Local::now()))
            .is_some()
    }

    fn find_mut(&mut self, path: &Path) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.path == path)
    }

    pub fn find_by_path(&self, path: &Path) -> Option<&Project> {
        self.projects.iter().find(|p| p.path == path)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// Look a project up by name first, then by path.
    pub fn resolve(&self, name_or_path: &str) -> Option<&Project> {
        self.find_by_name(name_or_path)
            .or_else(|| self.find_by_path(Path::new(name_or_path)))
    }

    /// Projects not marked hidden, in registration order.
    pub fn visible(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter().filter(|p| !p.hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_project_paths() {
        let project = Project::new("/home/me/code/shop");
        assert_eq!(project.name, "shop");
        assert_eq!(project.run_dir(), PathBuf::from("/home/me/code/shop/.devenv/run"));
        assert_eq!(
            project.socket_path(),
            PathBuf::from("/home/me/code/shop/.devenv/run/pc.sock")
        );
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut reg = Registry::default();
        reg.add("/code/a");
        reg.add("/code/b");
        reg.add("/code/a");
        assert_eq!(reg.projects.len(), 2);
        assert_eq!(reg.find_by_name("b").unwrap().path, PathBuf::from("/code/b"));
    }

    #[test]
    fn test_remove_and_visible() {
        let mut reg = Registry::default();
        reg.add("/code/a");
        reg.add("/code/b");
        reg.projects[1].hidden = true;

        let visible: Vec<_> = reg.visible().map(|p| p.name.as_str()).collect();
        assert_eq!(visible, vec!["a"]);

        assert!(reg.remove(Path::new("/code/a")));
        assert!(!reg.remove(Path::new("/code/a")));
        assert_eq!(reg.projects.len(), 1);
    }

    #[test]
    fn test_hide_and_unhide() {
        let mut reg = Registry::default();
        reg.add("/code/a");
        reg.add("/code/b");

        assert!(reg.set_hidden(Path::new("/code/a"), true));
        let visible: Vec<_> = reg.visible().map(|p| p.name.as_str()).collect();
        assert_eq!(visible, vec!["b"]);
        // Hidden projects still resolve so they can be revealed again.
        assert!(reg.resolve("a").is_some());

        assert!(reg.set_hidden(Path::new("/code/a"), false));
        assert_eq!(reg.visible().count(), 2);
        assert!(!reg.set_hidden(Path::new("/code/nope"), true));
    }

    #[test]
    fn test_touch_updates_last_active() {
        let mut reg = Registry::default();
        reg.add("/code/a");
        reg.projects[0].last_active = None;

        assert!(reg.touch(Path::new("/code/a")));
        assert!(reg.projects[0].last_active.is_some());
        assert!(!reg.touch(Path::new("/code/nope")));
    }

    #[test]
    fn test_resolve_by_name_or_path() {
        let mut reg = Registry::default();
        reg.add("/code/api");
        assert!(reg.resolve("api").is_some());
        assert!(reg.resolve("/code/api").is_some());
        assert!(reg.resolve("nope").is_none());
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let reg = Registry::load(&dir.path().join("projects.yaml")).unwrap();
        assert!(reg.projects.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("projects.yaml");

        let mut reg = Registry::default();
        reg.add("/code/api");
        reg.save(&path).unwrap();

        let loaded = Registry::load(&path).unwrap();
        assert_eq!(loaded, reg);
    }

    #[test]
    fn test_load_rejects_bad_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("projects.yaml");
        std::fs::write(&path, "projects: [unclosed").unwrap();
        assert!(matches!(Registry::load(&path), Err(RegistryError::Yaml { .. })));
    }
}
