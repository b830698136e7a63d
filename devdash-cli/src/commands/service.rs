use anyhow::{Context as _, Result, bail};

use devdash_core::project_state::{ProjectState, detect_state};
use devdash_core::status::{ControlSocket, ServiceAction};

use super::Context;
use crate::client::ComposeClient;

pub async fn run_service(
    ctx: &Context,
    name: &str,
    action: ServiceAction,
    service: &str,
) -> Result<()> {
    let project = ctx.project(name)?;
    let client = ComposeClient::new(project.socket_path());

    client
        .control(service, action)
        .await
        .with_context(|| format!("could not {action} {service} in {}", project.name))?;
    println!("{}: {action} {service}", project.name);
    Ok(())
}

/// Ask a running project's supervisor to shut every service down.
pub async fn run_stop(ctx: &Context, name: &str) -> Result<()> {
    let project = ctx.project(name)?;
    let client = ComposeClient::new(project.socket_path());

    let state = detect_state(project, &client).await;
    if !matches!(state, ProjectState::Running | ProjectState::Degraded) {
        bail!("{} is {state}; nothing to stop", project.name);
    }

    client
        .shutdown()
        .await
        .with_context(|| format!("stopping {}", project.name))?;
    println!("Stopping {} ({state})", project.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    /// A supervisor stand-in: answers `/processes` with one running service,
    /// rejects actions on `ghost`, accepts everything else. Stops after the
    /// first POST and returns every request line it saw.
    fn supervisor(project_dir: &Path) -> tokio::task::JoinHandle<Vec<String>> {
        let run_dir = project_dir.join(".devenv/run");
        std::fs::create_dir_all(&run_dir).unwrap();
        let listener = UnixListener::bind(run_dir.join("pc.sock")).unwrap();

        tokio::spawn(async move {
            let mut seen = Vec::new();
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                }
                // Pings connect and hang up without a request.
                let Some(line) = String::from_utf8_lossy(&head).lines().next().map(str::to_string) else {
                    continue;
                };

                let response = if line.starts_with("GET /processes ") {
                    let body = r#"{"data":[{"name":"api","is_running":true}]}"#;
                    format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{body}", body.len())
                } else if line.contains("/ghost/") {
                    "HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n".to_string()
                } else {
                    "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n{}".to_string()
                };
                stream.write_all(response.as_bytes()).await.unwrap();

                let done = line.starts_with("POST ");
                seen.push(line);
                if done {
                    return seen;
                }
            }
        })
    }

    fn context_with(dir: &TempDir, project_dir: &Path) -> Context {
        let mut ctx = Context::in_dir(dir.path());
        ctx.registry.add(project_dir);
        ctx
    }

    #[tokio::test]
    async fn test_service_actions_reach_supervisor() {
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join("shop");
        let ctx = context_with(&dir, &project_dir);

        for (action, expected) in [
            (ServiceAction::Start, "POST /process/api/start HTTP/1.1"),
            (ServiceAction::Stop, "POST /process/api/stop HTTP/1.1"),
            (ServiceAction::Restart, "POST /process/api/restart HTTP/1.1"),
        ] {
            let _ = std::fs::remove_file(project_dir.join(".devenv/run/pc.sock"));
            let server = supervisor(&project_dir);
            run_service(&ctx, "shop", action, "api").await.unwrap();
            assert_eq!(server.await.unwrap(), vec![expected]);
        }
    }

    #[tokio::test]
    async fn test_rejected_action_is_an_error() {
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join("shop");
        let ctx = context_with(&dir, &project_dir);
        let _server = supervisor(&project_dir);

        let err = run_service(&ctx, "shop", ServiceAction::Restart, "ghost")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("restart ghost"));
    }

    #[tokio::test]
    async fn test_stop_shuts_down_running_project() {
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join("shop");
        let ctx = context_with(&dir, &project_dir);
        let server = supervisor(&project_dir);

        run_stop(&ctx, "shop").await.unwrap();

        let requests = server.await.unwrap();
        assert!(requests.contains(&"GET /processes HTTP/1.1".to_string()));
        assert_eq!(requests.last().unwrap(), "POST /project/stop HTTP/1.1");
    }

    #[tokio::test]
    async fn test_stop_refuses_idle_project() {
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join("shop");
        std::fs::create_dir(&project_dir).unwrap();
        let ctx = context_with(&dir, &project_dir);

        let err = run_stop(&ctx, "shop").await.unwrap_err();
        assert!(err.to_string().contains("idle"));
    }

    #[tokio::test]
    async fn test_unknown_project() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::in_dir(dir.path());
        assert!(run_stop(&ctx, "nowhere").await.is_err());
    }
}
