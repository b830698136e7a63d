//! Per-service lifecycle tracking.
//!
//! Each poll hands the monitor a `(running, exit_code)` sample for every
//! service of a project. The monitor keeps the last known state per
//! `(project, service)` and turns state changes into [`HealthEvent`]s:
//!
//! | from            | sample             | to              | event     |
//! |-----------------|--------------------|-----------------|-----------|
//! | unknown         | running            | running         | Started   |
//! | unknown         | stopped            | clean / crashed | -         |
//! | running         | stopped, exit 0    | clean           | Stopped   |
//! | running         | stopped, exit != 0 | crashed         | Crashed   |
//! | crashed         | running            | running         | Recovered |
//! | clean           | running            | running         | Started   |
//! | clean / crashed | stopped            | unchanged       | -         |
//!
//! Repeating the current state never produces an event.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthEventKind {
    Started,
    Stopped,
    Crashed,
    Recovered,
}

impl HealthEventKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Crashed => "crashed",
            Self::Recovered => "recovered",
        }
    }
}

impl std::fmt::Display for HealthEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
    pub kind: HealthEventKind,
    pub project: String,
    pub service: String,
    pub exit_code: i32,
    pub timestamp: DateTime<Local>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Running,
    StoppedClean,
    StoppedCrashed,
}

impl Lifecycle {
    fn from_sample(running: bool, exit_code: i32) -> Self {
        match (running, exit_code) {
            (true, _) => Self::Running,
            (false, 0) => Self::StoppedClean,
            (false, _) => Self::StoppedCrashed,
        }
    }

    fn is_stopped(self) -> bool {
        self != Self::Running
    }
}

#[derive(Clone, Copy, Debug)]
struct ServiceRecord {
    lifecycle: Lifecycle,
    exit_code: i32,
}

/// Last known state of a tracked service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceState {
    pub running: bool,
    pub exit_code: i32,
}

#[derive(Debug)]
pub struct HealthMonitor {
    states: BTreeMap<(String, String), ServiceRecord>,
    events: Option<broadcast::Sender<HealthEvent>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            states: BTreeMap::new(),
            events: Some(events),
        }
    }

    /// Feed one sample. Returns the event this sample caused, if any; the
    /// same event is also published to subscribers.
    pub fn update_service(
        &mut self,
        project: &str,
        service: &str,
        running: bool,
        exit_code: i32,
    ) -> Option<HealthEvent> {
        let key = (project.to_string(), service.to_string());
        let previous = self.states.get(&key).map(|r| r.lifecycle);
        let next = match (previous, Lifecycle::from_sample(running, exit_code)) {
            // A stopped service stays in the stopped state it entered first.
            (Some(prev), sampled) if prev.is_stopped() && sampled.is_stopped() => prev,
            (_, sampled) => sampled,
        };
        self.states.insert(key, ServiceRecord { lifecycle: next, exit_code });

        let kind = match (previous, next) {
            (None, Lifecycle::Running) => HealthEventKind::Started,
            // A service first seen stopped stays quiet so a dashboard
            // opening on a half-down project does not flood alerts.
            (None, _) => return None,
            (Some(prev), next) if prev == next => return None,
            (Some(Lifecycle::Running), Lifecycle::StoppedClean) => HealthEventKind::Stopped,
            (Some(Lifecycle::Running), Lifecycle::StoppedCrashed) => HealthEventKind::Crashed,
            (Some(Lifecycle::StoppedCrashed), Lifecycle::Running) => HealthEventKind::Recovered,
            (Some(Lifecycle::StoppedClean), Lifecycle::Running) => HealthEventKind::Started,
            (Some(_), _) => return None,
        };

        let event = HealthEvent {
            kind,
            project: project.to_string(),
            service: service.to_string(),
            exit_code,
            timestamp: Local::now(),
        };

        match kind {
            HealthEventKind::Crashed => {
                info!(project, service, exit_code, "service crashed");
            }
            _ => debug!(project, service, event = %kind, "service lifecycle event"),
        }

        if let Some(tx) = &self.events {
            // No subscribers is fine; the return value is the primary path.
            let _ = tx.send(event.clone());
        }

        Some(event)
    }

    pub fn get_state(&self, project: &str, service: &str) -> Option<ServiceState> {
        self.states
            .get(&(project.to_string(), service.to_string()))
            .map(|r| ServiceState {
                running: r.lifecycle == Lifecycle::Running,
                exit_code: r.exit_code,
            })
    }

    /// Forget every tracked service, e.g. when focus moves to another project.
    pub fn clear_states(&mut self) {
        self.states.clear();
    }

    pub fn tracked(&self) -> usize {
        self.states.len()
    }

    /// Receive events asynchronously. `None` once the monitor is closed.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<HealthEvent>> {
        self.events.as_ref().map(broadcast::Sender::subscribe)
    }

    /// Release the event channel; subscribers see it close.
    pub fn close(&mut self) {
        self.events = None;
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}
