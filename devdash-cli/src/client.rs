//! process-compose REST API spoken over a project's Unix socket.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::header::{ACCEPT, HOST};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use tokio::net::UnixStream;
use tracing::debug;

use devdash_core::status::{
    ControlSocket, LogsResponse, ProcessesResponse, ServiceAction, ServiceSample, StatusError,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

fn transport(e: impl std::error::Error + Send + Sync + 'static) -> StatusError {
    StatusError::Transport(Box::new(e))
}

pub struct ComposeClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl ComposeClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, StatusError> {
        let body = self.request(Method::GET, path).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post(&self, path: &str) -> Result<(), StatusError> {
        self.request(Method::POST, path).await.map(|_| ())
    }

    async fn request(&self, method: Method, path: &str) -> Result<Bytes, StatusError> {
        tokio::time::timeout(self.timeout, self.round_trip(method, path))
            .await
            .map_err(|_| StatusError::Timeout(self.timeout))?
    }

    async fn round_trip(&self, method: Method, path: &str) -> Result<Bytes, StatusError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(StatusError::Connect)?;

        let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(transport)?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "control socket connection ended with error");
            }
        });

        let request = Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, "localhost")
            .header(ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(transport)?;

        let response = sender.send_request(request).await.map_err(transport)?;
        let status = response.status();
        let body = response.into_body().collect().await.map_err(transport)?.to_bytes();
        debug!(path, status = status.as_u16(), bytes = body.len(), "control socket response");

        if status != StatusCode::OK {
            return Err(StatusError::Http {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl ControlSocket for ComposeClient {
    async fn ping(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path)).await,
            Ok(Ok(_))
        )
    }

    async fn status(&self) -> Result<Vec<ServiceSample>, StatusError> {
        let resp: ProcessesResponse = self.get("/processes").await?;
        Ok(resp.data)
    }

    async fn logs(&self, service: &str, limit: usize) -> Result<Vec<String>, StatusError> {
        let path = format!("/process/logs/{}/0/{limit}", encode_segment(service));
        let resp: LogsResponse = self.get(&path).await?;
        Ok(resp.logs)
    }

    async fn control(&self, service: &str, action: ServiceAction) -> Result<(), StatusError> {
        self.post(&format!("/process/{}/{action}", encode_segment(service)))
            .await
    }

    async fn shutdown(&self) -> Result<(), StatusError> {
        self.post("/project/stop").await
    }
}

/// Percent-encode a single URL path segment.
fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
