//! Service status as reported by a project's control socket, and the trait
//! through which the rest of the crate talks to that socket.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One managed service as reported by the process supervisor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSample {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub pid: i64,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub restarts: u32,
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub mem: i64,
    /// Uptime as reported by the supervisor (free-form).
    #[serde(default, rename = "system_time")]
    pub uptime: String,
}

impl ServiceSample {
    pub fn new(name: impl Into<String>, is_running: bool, exit_code: i32) -> Self {
        Self {
            name: name.into(),
            is_running,
            exit_code,
            ..Self::default()
        }
    }
}

/// Wire shape of the `/processes` response.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessesResponse {
    #[serde(default)]
    pub data: Vec<ServiceSample>,
}

/// Wire shape of the `/process/logs/...` response.
#[derive(Debug, Default, Deserialize)]
pub struct LogsResponse {
    #[serde(default)]
    pub logs: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("control socket unreachable: {0}")]
    Connect(#[source] std::io::Error),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("unexpected HTTP status {status} from {path}")]
    Http { status: u16, path: String },

    #[error("control socket transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid JSON from control socket: {0}")]
    Json(#[from] serde_json::Error),
}

/// Lifecycle action on a single managed service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl ServiceAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

impl std::fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

/// A per-project control endpoint.
///
/// Implementations do their own I/O and timeouts; callers treat every
/// failure as transient and retry on the next poll.
#[async_trait]
pub trait ControlSocket: Send + Sync {
    /// Connect and immediately disconnect. `true` if something accepted.
    async fn ping(&self) -> bool;

    /// Current status of every managed service.
    async fn status(&self) -> Result<Vec<ServiceSample>, StatusError>;

    /// The most recent `limit` raw log lines of one service, oldest first.
    async fn logs(&self, service: &str, limit: usize) -> Result<Vec<String>, StatusError>;

    /// Start, stop or restart one service.
    async fn control(&self, service: &str, action: ServiceAction) -> Result<(), StatusError>;

    /// Stop every service and the supervisor itself.
    async fn shutdown(&self) -> Result<(), StatusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_processes_response() {
        let json = r#"{
            "data": [
                {"name": "postgres", "namespace": "default", "status": "Running",
                 "is_running": true, "pid": 4242, "exit_code": 0,
                 "system_time": "3m", "restarts": 1, "mem": 1048576, "cpu": 0.5},
                {"name": "worker", "is_running": false, "exit_code": 137}
            ]
        }"#;
        let resp: ProcessesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.data.len(), 2);

        let pg = &resp.data[0];
        assert_eq!(pg.name, "postgres");
        assert!(pg.is_running);
        assert_eq!(pg.pid, 4242);
        assert_eq!(pg.uptime, "3m");
        assert_eq!(pg.restarts, 1);

        let worker = &resp.data[1];
        assert!(!worker.is_running);
        assert_eq!(worker.exit_code, 137);
        assert_eq!(worker.pid, 0);
    }

    #[test]
    fn test_service_action_labels() {
        assert_eq!(ServiceAction::Restart.to_string(), "restart");
        assert_eq!(format!("{:<7}|", ServiceAction::Stop), "stop   |");
        let parsed: ServiceAction = serde_json::from_str(r#""start""#).unwrap();
        assert_eq!(parsed, ServiceAction::Start);
    }

    #[test]
    fn test_decode_logs_response() {
        let resp: LogsResponse = serde_json::from_str(r#"{"logs": ["a", "b"]}"#).unwrap();
        assert_eq!(resp.logs, vec!["a", "b"]);

        let empty: LogsResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.logs.is_empty());
    }
}
