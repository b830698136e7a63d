//! Bounded history of service alerts derived from health events.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::health::{HealthEvent, HealthEventKind};

/// Default number of alerts kept.
pub const DEFAULT_ALERT_CAPACITY: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Crashed,
    Recovered,
    Started,
    Stopped,
}

impl AlertKind {
    /// Short badge for list rendering
    pub fn badge(&self) -> &'static str {
        match self {
            AlertKind::Crashed => "CRASH",
            AlertKind::Recovered => "RECOVER",
            AlertKind::Started => "START",
            AlertKind::Stopped => "STOP",
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, AlertKind::Crashed)
    }
}

impl From<HealthEventKind> for AlertKind {
    fn from(kind: HealthEventKind) -> Self {
        match kind {
            HealthEventKind::Crashed => AlertKind::Crashed,
            HealthEventKind::Recovered => AlertKind::Recovered,
            HealthEventKind::Started => AlertKind::Started,
            HealthEventKind::Stopped => AlertKind::Stopped,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub project: String,
    pub service: String,
    pub message: String,
    pub timestamp: DateTime<Local>,
}

impl From<&HealthEvent> for Alert {
    fn from(event: &HealthEvent) -> Self {
        let message = match event.kind {
            HealthEventKind::Crashed => format!("exited with code {}", event.exit_code),
            other => other.label().to_string(),
        };
        Self {
            kind: event.kind.into(),
            project: event.project.clone(),
            service: event.service.clone(),
            message,
            timestamp: event.timestamp,
        }
    }
}

/// FIFO of the most recent alerts.
#[derive(Clone, Debug)]
pub struct AlertHistory {
    cap: usize,
    alerts: VecDeque<Alert>,
}

impl AlertHistory {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            alerts: VecDeque::with_capacity(cap),
        }
    }

    pub fn push(&mut self, alert: Alert) {
        if self.alerts.len() >= self.cap {
            self.alerts.pop_front();
        }
        self.alerts.push_back(alert);
    }

    /// Record a health event and return the stored alert.
    pub fn record(&mut self, event: &HealthEvent) -> &Alert {
        self.push(Alert::from(event));
        &self.alerts[self.alerts.len() - 1]
    }

    /// Oldest first.
    pub fn all(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }

    /// Up to `n` alerts, newest first.
    pub fn recent(&self, n: usize) -> Vec<Alert> {
        self.alerts.iter().rev().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }
}

impl Default for AlertHistory {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_CAPACITY)
    }
}
