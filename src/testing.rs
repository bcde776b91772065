//! Test helpers: gatherer scripts and throwaway HTTP endpoints.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::routing::any;
use axum::Router;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Write an executable `/bin/sh` gatherer script into `dir`.
#[cfg(unix)]
pub fn write_gatherer(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write gatherer");
    let mut permissions = std::fs::metadata(&path)
        .expect("gatherer metadata")
        .permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).expect("chmod gatherer");
    path
}

/// An HTTP request as seen by [`spawn_sink`].
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    /// Header names are lowercased.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }
}

#[derive(Clone)]
struct SinkState {
    status: StatusCode,
    requests: mpsc::UnboundedSender<CapturedRequest>,
}

/// Start an HTTP endpoint that answers every request to `/report` with
/// `status` and forwards what it received. Returns the endpoint URL.
pub async fn spawn_sink(status: u16) -> (String, mpsc::UnboundedReceiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind sink");
    let addr = listener.local_addr().expect("sink address");
    let (tx, rx) = mpsc::unbounded_channel();

    let state = SinkState {
        status: StatusCode::from_u16(status).expect("valid status code"),
        requests: tx,
    };
    let app = Router::new()
        .route("/report", any(capture))
        .with_state(state);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{addr}/report"), rx)
}

async fn capture(
    State(state): State<SinkState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();

    let _ = state.requests.send(CapturedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        headers,
        body: body.to_vec(),
    });

    (state.status, "ok")
}

/// Start an endpoint that accepts connections but never answers.
pub async fn spawn_silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind silent server");
    let addr = listener.local_addr().expect("silent server address");

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    format!("http://{addr}/report")
}
