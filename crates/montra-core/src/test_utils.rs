//! Test utilities for montra-core
//!
//! Two local servers for integration tests and offline development:
//! - [`MockCompletionServer`] speaks the chat-completions protocol and records
//!   every request body it receives
//! - [`MockSiteServer`] serves canned product and listing pages

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Json, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// How long `/slow/...` pages take to answer
pub const SLOW_PAGE_DELAY: Duration = Duration::from_secs(2);

/// Default reply when nothing is scripted
const DEFAULT_COMPLETION: &str = r#"{"title": "Lunch", "amount": 15, "type": "expense"}"#;

#[derive(Debug, Clone)]
enum Scripted {
    Content(String),
    Status(u16),
    NoChoices,
}

#[derive(Default)]
struct CompletionState {
    replies: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<Value>>,
}

/// Mock chat-completions endpoint
pub struct MockCompletionServer {
    addr: SocketAddr,
    state: Arc<CompletionState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockCompletionServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state = Arc::new(CompletionState::default());
        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_completion))
            .with_state(state.clone());

        let (addr, shutdown_tx) = serve(app).await;
        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue the content of the next completion
    pub fn reply_with(&self, content: &str) {
        self.push(Scripted::Content(content.to_string()));
    }

    /// Queue an HTTP error for the next completion
    pub fn fail_with(&self, status: u16) {
        self.push(Scripted::Status(status));
    }

    /// Queue a successful response with no choices
    pub fn reply_empty(&self) {
        self.push(Scripted::NoChoices);
    }

    fn push(&self, reply: Scripted) {
        self.state.replies.lock().unwrap().push_back(reply);
    }

    /// Request bodies received so far
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockCompletionServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_models() -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [
            {"id": "mock-text", "object": "model"},
            {"id": "mock-vision", "object": "model"}
        ]
    }))
}

async fn handle_completion(
    State(state): State<Arc<CompletionState>>,
    Json(body): Json<Value>,
) -> Response {
    let model = body["model"].as_str().unwrap_or("mock").to_string();
    state.requests.lock().unwrap().push(body);

    let scripted = state.replies.lock().unwrap().pop_front();
    let content = match scripted {
        Some(Scripted::Status(code)) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, "scripted failure").into_response();
        }
        Some(Scripted::NoChoices) => {
            return Json(json!({"id": "mock", "model": model, "choices": []})).into_response();
        }
        Some(Scripted::Content(content)) => content,
        None => DEFAULT_COMPLETION.to_string(),
    };

    Json(json!({
        "id": "mock",
        "object": "chat.completion",
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

/// Mock shop serving fixed pages by path
///
/// Paths under `/slow/` answer after [`SLOW_PAGE_DELAY`]; unknown paths are 404.
pub struct MockSiteServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockSiteServer {
    pub async fn start(pages: Vec<(&str, &str)>) -> Self {
        let pages: HashMap<String, String> = pages
            .into_iter()
            .map(|(path, body)| (path.to_string(), body.to_string()))
            .collect();
        let app = Router::new()
            .fallback(handle_page)
            .with_state(Arc::new(pages));

        let (addr, shutdown_tx) = serve(app).await;
        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockSiteServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_page(State(pages): State<Arc<HashMap<String, String>>>, uri: Uri) -> Response {
    let path = uri.path();
    if path.starts_with("/slow/") {
        tokio::time::sleep(SLOW_PAGE_DELAY).await;
    }
    match pages.get(path) {
        Some(body) => Html(body.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

async fn serve(app: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .unwrap();
    });

    (addr, shutdown_tx)
}
