//! Test utilities for sift-core
//!
//! This module provides a mock Ollama embedding server that can be used for
//! development and integration tests. The server runs on its own thread with a
//! private tokio runtime, so blocking clients can call it from plain `#[test]`s.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::embedding::HashingEmbedder;

/// Mock Ollama server for testing and development
pub struct MockOllamaServer {
    addr: SocketAddr,
    embed_requests: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Clone)]
struct MockState {
    embedder: HashingEmbedder,
    embed_requests: Arc<AtomicUsize>,
    fail: bool,
}

impl MockOllamaServer {
    /// Start the mock server on an available port
    pub fn start() -> Self {
        Self::start_with(false)
    }

    /// Start a mock server whose embed endpoint always returns 500
    pub fn start_failing() -> Self {
        Self::start_with(true)
    }

    fn start_with(fail: bool) -> Self {
        let embed_requests = Arc::new(AtomicUsize::new(0));
        let state = MockState {
            embedder: HashingEmbedder::default(),
            embed_requests: embed_requests.clone(),
            fail,
        };

        let (addr_tx, addr_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let app = Router::new()
                    .route("/api/tags", get(handle_tags))
                    .route("/api/embed", post(handle_embed))
                    .with_state(state);

                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                addr_tx.send(listener.local_addr().unwrap()).unwrap();

                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        shutdown_rx.await.ok();
                    })
                    .await
                    .unwrap();
            });
        });

        let addr = addr_rx.recv().unwrap();

        Self {
            addr,
            embed_requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of requests received by the embed endpoint
    pub fn embed_requests(&self) -> usize {
        self.embed_requests.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ollama tags endpoint response (health check)
async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "nomic-embed-text:latest".to_string(),
            modified_at: "2024-01-01T00:00:00Z".to_string(),
            size: 274_000_000,
        }],
    })
}

/// Ollama embed endpoint
async fn handle_embed(
    State(state): State<MockState>,
    Json(request): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, StatusCode> {
    state.embed_requests.fetch_add(1, Ordering::SeqCst);
    if state.fail {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let embeddings = request
        .input
        .iter()
        .map(|text| state.embedder.embed_one(text))
        .collect();

    Ok(Json(EmbedResponse {
        model: request.model,
        embeddings,
    }))
}

#[derive(Deserialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Serialize)]
struct EmbedResponse {
    model: String,
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Serialize)]
struct ModelInfo {
    name: String,
    modified_at: String,
    size: u64,
}
