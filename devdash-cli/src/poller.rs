use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use devdash_core::alerts::AlertHistory;
use devdash_core::health::{HealthEvent, HealthMonitor};
use devdash_core::ingest::LogIngestor;
use devdash_core::interleaver::LogInterleaver;
use devdash_core::project_state::{ProjectState, detect_state};
use devdash_core::registry::Project;
use devdash_core::status::{ControlSocket, StatusError};

/// What one poll cycle produced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub services: usize,
    pub events: usize,
    pub lines: usize,
}

/// Periodically pulls status and logs for a single project.
pub struct ProjectPoller {
    project: String,
    socket: Arc<dyn ControlSocket>,
    monitor: HealthMonitor,
    alerts: AlertHistory,
    ingestor: LogIngestor,
    interleaver: Arc<LogInterleaver>,
    fetch_lines: usize,
}

impl ProjectPoller {
    pub fn new(
        project: impl Into<String>,
        socket: Arc<dyn ControlSocket>,
        interleaver: Arc<LogInterleaver>,
        alerts: AlertHistory,
        fetch_lines: usize,
    ) -> Self {
        Self {
            project: project.into(),
            socket,
            monitor: HealthMonitor::new(),
            alerts,
            ingestor: LogIngestor::new(),
            interleaver,
            fetch_lines,
        }
    }

    pub fn alerts(&self) -> &AlertHistory {
        &self.alerts
    }

    /// Run one status + logs cycle. Health events go to `alerts` and `events`.
    ///
    /// Events never wait for channel capacity: when `events` is full the event
    /// is only kept in the alert history.
    pub async fn poll_once(
        &mut self,
        events: &mpsc::Sender<HealthEvent>,
    ) -> Result<CycleReport, StatusError> {
        let samples = self.socket.status().await?;
        let mut report = CycleReport {
            services: samples.len(),
            ..CycleReport::default()
        };

        for sample in &samples {
            let event = self.monitor.update_service(
                &self.project,
                &sample.name,
                sample.is_running,
                sample.exit_code,
            );
            if let Some(event) = event {
                self.alerts.record(&event);
                report.events += 1;
                match events.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(event)) => {
                        warn!(project = %self.project, service = %event.service, "event channel full, dropping event");
                    }
                    // Nobody is listening any more.
                    Err(TrySendError::Closed(_)) => {}
                }
            }
        }

        let received_at = Local::now();
        for sample in &samples {
            match self.socket.logs(&sample.name, self.fetch_lines).await {
                Ok(lines) => {
                    report.lines += self.ingestor.ingest_into(
                        &self.interleaver,
                        &sample.name,
                        &lines,
                        received_at,
                    );
                }
                Err(e) => {
                    debug!(project = %self.project, service = %sample.name, error = %e, "log fetch failed");
                }
            }
        }

        Ok(report)
    }

    /// Poll every `every` until `shutdown` flips to true or its sender drops.
    /// Returns the poller so callers can inspect the alert history.
    pub async fn run(
        mut self,
        every: Duration,
        events: mpsc::Sender<HealthEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once(&events).await {
                        Ok(report) => {
                            debug!(
                                project = %self.project,
                                services = report.services,
                                events = report.events,
                                lines = report.lines,
                                tracked = self.monitor.tracked(),
                                "poll cycle"
                            );
                        }
                        Err(e) => {
                            debug!(project = %self.project, error = %e, "status poll failed, skipping cycle");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.monitor.close();
        self
    }
}

/// A project whose classification changed between two background checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateChange {
    pub project: String,
    pub from: ProjectState,
    pub to: ProjectState,
}

/// Re-classifies a set of projects on a slow interval and reports changes.
///
/// The first observation of each project is recorded without a report.
pub struct StateWatcher<F> {
    projects: Vec<Project>,
    connect: F,
    last: HashMap<PathBuf, ProjectState>,
}

impl<F, C> StateWatcher<F>
where
    F: Fn(&Project) -> C + Send,
    C: ControlSocket,
{
    pub fn new(projects: Vec<Project>, connect: F) -> Self {
        Self {
            projects,
            connect,
            last: HashMap::new(),
        }
    }

    pub fn last_state(&self, project: &Project) -> Option<ProjectState> {
        self.last.get(&project.path).copied()
    }

    pub async fn check_once(&mut self) -> Vec<StateChange> {
        let mut changes = Vec::new();
        for project in &self.projects {
            let socket = (self.connect)(project);
            let state = detect_state(project, &socket).await;
            match self.last.insert(project.path.clone(), state) {
                Some(previous) if previous != state => changes.push(StateChange {
                    project: project.name.clone(),
                    from: previous,
                    to: state,
                }),
                _ => {}
            }
        }
        changes
    }

    /// Check every `every` until `shutdown` flips to true or its sender drops.
    pub async fn run(
        mut self,
        every: Duration,
        changes: mpsc::Sender<StateChange>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for change in self.check_once().await {
                        debug!(project = %change.project, from = %change.from, to = %change.to, "background state change");
                        if changes.try_send(change).is_err() {
                            debug!("state change channel unavailable, dropping change");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
