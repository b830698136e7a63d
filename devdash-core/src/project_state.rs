//! Project state classification.
//!
//! A project's state is never stored. Every poll gathers fresh signals
//! (does the path exist, does the control socket answer, what does it
//! report) and [`classify`] maps them to a [`ProjectState`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::registry::Project;
use crate::status::{ControlSocket, ServiceSample};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectState {
    /// Nothing running, nothing left behind.
    Idle,
    /// Every service is up (or the socket answers but status is unknown).
    Running,
    /// Some, but not all, services are up.
    Degraded,
    /// An orphaned control socket blocks starting the project; needs repair.
    Stale,
    /// The project directory is gone.
    Missing,
}

impl ProjectState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Degraded => "degraded",
            Self::Stale => "stale",
            Self::Missing => "missing",
        }
    }

    pub fn needs_repair(&self) -> bool {
        matches!(self, Self::Stale)
    }
}

impl std::fmt::Display for ProjectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

/// Result of asking a reachable socket for its service list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusOutcome {
    /// The socket accepted a connection but the status call failed.
    Failed,
    Services { total: usize, running: usize },
}

impl StatusOutcome {
    pub fn from_samples(samples: &[ServiceSample]) -> Self {
        Self::Services {
            total: samples.len(),
            running: samples.iter().filter(|s| s.is_running).count(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketSignal {
    Reachable(StatusOutcome),
    /// Nothing answers, but the socket file is still on disk.
    Orphaned,
    /// Nothing answers and there is no socket file.
    Absent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeSignals {
    pub path_exists: bool,
    pub socket: SocketSignal,
}

/// Map live signals to a state. Pure; see the module docs.
pub fn classify(signals: &ProbeSignals) -> ProjectState {
    if !signals.path_exists {
        return ProjectState::Missing;
    }

    match signals.socket {
        // One failed status call on a live socket is not worth flapping over.
        SocketSignal::Reachable(StatusOutcome::Failed) => ProjectState::Running,
        SocketSignal::Reachable(StatusOutcome::Services { total: 0, .. }) => ProjectState::Idle,
        SocketSignal::Reachable(StatusOutcome::Services { total, running }) if running == total => {
            ProjectState::Running
        }
        SocketSignal::Reachable(StatusOutcome::Services { running: 0, .. }) => ProjectState::Stale,
        SocketSignal::Reachable(StatusOutcome::Services { .. }) => ProjectState::Degraded,
        SocketSignal::Orphaned => ProjectState::Stale,
        SocketSignal::Absent => ProjectState::Idle,
    }
}

/// Gather signals for `project` through `socket`.
///
/// The socket is only contacted when the project directory exists.
pub async fn probe<C>(project: &Project, socket: &C) -> ProbeSignals
where
    C: ControlSocket + ?Sized,
{
    if !project.path.exists() {
        return ProbeSignals {
            path_exists: false,
            socket: SocketSignal::Absent,
        };
    }

    let socket = if socket.ping().await {
        match socket.status().await {
            Ok(samples) => SocketSignal::Reachable(StatusOutcome::from_samples(&samples)),
            Err(e) => {
                debug!(project = %project.name, error = %e, "status query failed on reachable socket");
                SocketSignal::Reachable(StatusOutcome::Failed)
            }
        }
    } else if project.socket_path().exists() {
        SocketSignal::Orphaned
    } else {
        SocketSignal::Absent
    };

    ProbeSignals {
        path_exists: true,
        socket,
    }
}

/// Probe and classify in one step.
pub async fn detect_state<C>(project: &Project, socket: &C) -> ProjectState
where
    C: ControlSocket + ?Sized,
{
    let signals = probe(project, socket).await;
    let state = classify(&signals);
    debug!(project = %project.name, %state, signals = ?signals, "classified project");
    state
}

#[derive(Debug, thiserror::Error)]
#[error("failed to remove run directory {path}: {source}")]
pub struct RepairError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Delete the project's run directory (control socket and symlinks).
///
/// A run directory that is already gone counts as repaired. The next
/// classification observes the result; nothing is cached here.
pub fn repair(project: &Project) -> Result<(), RepairError> {
    let run_dir = project.run_dir();
    let removed = match std::fs::symlink_metadata(&run_dir) {
        Ok(meta) if meta.file_type().is_dir() => std::fs::remove_dir_all(&run_dir),
        // A symlink (the usual devenv layout) or stray file: drop the entry itself.
        Ok(_) => std::fs::remove_file(&run_dir),
        Err(e) => Err(e),
    };

    match removed {
        Ok(()) => {
            info!(project = %project.name, path = %run_dir.display(), "removed run directory");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(RepairError {
            path: run_dir,
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{ServiceAction, StatusError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FakeSocket {
        reachable: bool,
        services: Option<Vec<ServiceSample>>,
        calls: AtomicUsize,
    }

    impl FakeSocket {
        fn unreachable() -> Self {
            Self { reachable: false, services: None, calls: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Self { reachable: true, services: None, calls: AtomicUsize::new(0) }
        }

        fn with(services: &[(&str, bool)]) -> Self {
            Self {
                reachable: true,
                services: Some(
                    services
                        .iter()
                        .map(|(name, running)| ServiceSample::new(*name, *running, 0))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ControlSocket for FakeSocket {
        async fn ping(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reachable
        }

        async fn status(&self) -> Result<Vec<ServiceSample>, StatusError> {
            self.services
                .clone()
                .ok_or_else(|| StatusError::Timeout(std::time::Duration::from_secs(5)))
        }

        async fn logs(&self, _service: &str, _limit: usize) -> Result<Vec<String>, StatusError> {
            Ok(Vec::new())
        }

        async fn control(&self, _service: &str, _action: ServiceAction) -> Result<(), StatusError> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), StatusError> {
            Ok(())
        }
    }

    fn project_in(dir: &TempDir) -> Project {
        Project::new(dir.path().join("shop"))
    }

    fn make_socket_file(project: &Project) {
        std::fs::create_dir_all(project.run_dir()).unwrap();
        std::fs::write(project.socket_path(), b"").unwrap();
    }

    fn signals(socket: SocketSignal) -> ProbeSignals {
        ProbeSignals { path_exists: true, socket }
    }

    #[test]
    fn test_classify_table() {
        let services = |total, running| SocketSignal::Reachable(StatusOutcome::Services { total, running });

        assert_eq!(
            classify(&ProbeSignals { path_exists: false, socket: services(3, 3) }),
            ProjectState::Missing
        );
        assert_eq!(classify(&signals(SocketSignal::Reachable(StatusOutcome::Failed))), ProjectState::Running);
        assert_eq!(classify(&signals(services(0, 0))), ProjectState::Idle);
        assert_eq!(classify(&signals(services(3, 3))), ProjectState::Running);
        assert_eq!(classify(&signals(services(3, 1))), ProjectState::Degraded);
        assert_eq!(classify(&signals(services(3, 0))), ProjectState::Stale);
        assert_eq!(classify(&signals(SocketSignal::Orphaned)), ProjectState::Stale);
        assert_eq!(classify(&signals(SocketSignal::Absent)), ProjectState::Idle);
    }

    #[tokio::test]
    async fn test_missing_path_short_circuits() {
        let dir = TempDir::new().unwrap();
        let project = project_in(&dir);
        let socket = FakeSocket::with(&[("api", true)]);

        assert_eq!(detect_state(&project, &socket).await, ProjectState::Missing);
        assert_eq!(socket.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_existing_path_without_run_dir_is_idle() {
        let dir = TempDir::new().unwrap();
        let project = project_in(&dir);
        std::fs::create_dir_all(&project.path).unwrap();

        assert_eq!(detect_state(&project, &FakeSocket::unreachable()).await, ProjectState::Idle);
    }

    #[tokio::test]
    async fn test_orphaned_socket_is_stale() {
        let dir = TempDir::new().unwrap();
        let project = project_in(&dir);
        make_socket_file(&project);

        assert_eq!(detect_state(&project, &FakeSocket::unreachable()).await, ProjectState::Stale);
    }

    #[tokio::test]
    async fn test_reachable_socket_states() {
        let dir = TempDir::new().unwrap();
        let project = project_in(&dir);
        make_socket_file(&project);

        let all = FakeSocket::with(&[("api", true), ("db", true)]);
        assert_eq!(detect_state(&project, &all).await, ProjectState::Running);

        let some = FakeSocket::with(&[("api", true), ("db", false)]);
        assert_eq!(detect_state(&project, &some).await, ProjectState::Degraded);

        let none = FakeSocket::with(&[("api", false), ("db", false)]);
        assert_eq!(detect_state(&project, &none).await, ProjectState::Stale);

        let empty = FakeSocket::with(&[]);
        assert_eq!(detect_state(&project, &empty).await, ProjectState::Idle);

        assert_eq!(detect_state(&project, &FakeSocket::failing()).await, ProjectState::Running);
    }

    #[tokio::test]
    async fn test_repair_clears_stale_state() {
        let dir = TempDir::new().unwrap();
        let project = project_in(&dir);
        make_socket_file(&project);
        std::fs::write(project.run_dir().join("pc.pid"), b"123").unwrap();

        let socket = FakeSocket::unreachable();
        assert_eq!(detect_state(&project, &socket).await, ProjectState::Stale);

        repair(&project).unwrap();
        assert!(!project.run_dir().exists());
        assert_eq!(detect_state(&project, &socket).await, ProjectState::Idle);
    }

    #[test]
    fn test_repair_removes_symlinked_run_dir_only() {
        let dir = TempDir::new().unwrap();
        let project = project_in(&dir);
        std::fs::create_dir_all(project.path.join(".devenv")).unwrap();

        let target = dir.path().join("runtime");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("pc.sock"), b"").unwrap();
        std::os::unix::fs::symlink(&target, project.run_dir()).unwrap();

        repair(&project).unwrap();
        assert!(std::fs::symlink_metadata(project.run_dir()).is_err());
        // The link target is left alone.
        assert!(target.join("pc.sock").exists());
    }

    #[test]
    fn test_repair_without_run_dir_is_ok() {
        let dir = TempDir::new().unwrap();
        let project = project_in(&dir);
        std::fs::create_dir_all(&project.path).unwrap();
        assert!(repair(&project).is_ok());
    }

    #[test]
    fn test_repair_surfaces_filesystem_errors() {
        let dir = TempDir::new().unwrap();
        let project = project_in(&dir);
        std::fs::create_dir_all(&project.path).unwrap();
        // `.devenv` is a file, so `.devenv/run` cannot be inspected.
        std::fs::write(project.path.join(".devenv"), b"").unwrap();

        let err = repair(&project).unwrap_err();
        assert_eq!(err.path, project.run_dir());
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(ProjectState::Degraded.to_string(), "degraded");
        assert!(ProjectState::Stale.needs_repair());
        assert!(!ProjectState::Idle.needs_repair());
    }
}
