//! Integration tests for Stockroom.
//!
//! Each [`TestContext`] serves the full router on an ephemeral
//! `127.0.0.1` port, backed by a snapshot in a temporary directory and a
//! local seed catalog server, and talks to it over HTTP with `reqwest`.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p stockroom-integration-tests
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use stockroom_server::config::ServerConfig;
use stockroom_server::routes;
use stockroom_server::state::AppState;
use stockroom_server::store::{CatalogStore, SnapshotFile};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Signing secret used by every test server.
pub const TEST_JWT_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

/// Seed endpoint that refuses connections.
pub const UNREACHABLE_SEED_URL: &str = "http://127.0.0.1:9/api/v1/products";

/// A local stand-in for the remote seed catalog.
pub struct SeedServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl SeedServer {
    /// Serve `items` as the seed catalog.
    pub async fn start(items: Value) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/api/v1/products", get(serve_seed))
            .with_state((Arc::clone(&hits), Arc::new(items)));

        let (addr, handle) = serve(app).await;
        Self {
            url: format!("http://{addr}/api/v1/products"),
            hits,
            handle,
        }
    }

    /// Number of fetches received.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for SeedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_seed(
    State((hits, items)): State<(Arc<AtomicUsize>, Arc<Value>)>,
) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    Json(items.as_ref().clone())
}

/// Three products in the remote catalog format.
#[must_use]
pub fn seed_items() -> Value {
    json!([
        {
            "id": 11,
            "title": "Classic Grey Hooded Sweatshirt",
            "price": 90,
            "description": "Soft and warm",
            "categoryId": 1,
            "images": ["https://i.imgur.com/R2PN9Wq.jpeg"]
        },
        {
            "id": 12,
            "title": "Classic Black Baseball Cap",
            "price": 58,
            "description": "Adjustable strap",
            "categoryId": 1,
            "images": ["https://i.imgur.com/KeqG6r4.jpeg"]
        },
        {
            "id": 13,
            "title": "Sleek Wireless Mouse",
            "price": 10,
            "description": "Ergonomic",
            "categoryId": 2,
            "images": "https://i.imgur.com/w3Y8NwQ.jpeg"
        }
    ])
}

/// A running server plus everything it needs.
pub struct TestContext {
    pub client: reqwest::Client,
    pub base_url: String,
    pub state: AppState,
    env: HashMap<String, String>,
    dir: Arc<TempDir>,
    handle: JoinHandle<()>,
}

impl TestContext {
    /// Start a server whose seed catalog is served by `seed`.
    pub async fn new(seed: &SeedServer) -> Self {
        Self::with_env(&seed.url, &[]).await
    }

    /// Start a server with extra `STOCKROOM_*` variables.
    pub async fn with_env(seed_url: &str, extra: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let snapshot_path = dir.path().join("catalog.json");
        CatalogStore::create_empty(&SnapshotFile::new(&snapshot_path), false)
            .expect("create snapshot");

        let mut env: HashMap<String, String> = [
            ("STOCKROOM_JWT_SECRET", TEST_JWT_SECRET),
            ("STOCKROOM_SEED_URL", seed_url),
            ("STOCKROOM_SEED_TIMEOUT_SECS", "2"),
        ]
        .into_iter()
        .chain(extra.iter().copied())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        env.insert(
            "STOCKROOM_SNAPSHOT_PATH".to_string(),
            snapshot_path.display().to_string(),
        );

        Self::launch(env, Arc::new(dir)).await
    }

    async fn launch(env: HashMap<String, String>, dir: Arc<TempDir>) -> Self {
        let config =
            ServerConfig::from_lookup(|key| env.get(key).cloned()).expect("test configuration");
        let state = AppState::new(config).expect("open store");
        let (addr, handle) = serve(routes::app(state.clone())).await;

        Self {
            client: reqwest::Client::new(),
            base_url: format!("http://{addr}"),
            state,
            env,
            dir,
            handle,
        }
    }

    /// Stop the server, write the final snapshot and start a new process
    /// over the same snapshot file.
    pub async fn restart(self) -> Self {
        self.handle.abort();
        self.state.store().close().await.expect("close store");
        let env = self.env.clone();
        let dir = Arc::clone(&self.dir);
        drop(self);
        Self::launch(env, dir).await
    }

    /// Path of the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.path().join("catalog.json")
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// POST /api/v1/register
    pub async fn register(&self, name: &str, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/v1/register"))
            .json(&json!({ "name": name, "username": username, "password": password }))
            .send()
            .await
            .expect("register request")
    }

    /// POST /api/v1/auth
    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/v1/auth"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("login request")
    }

    /// Register an account and return its bearer token.
    pub async fn token(&self, username: &str) -> String {
        let body: Value = self
            .register(username, username, "secret123")
            .await
            .json()
            .await
            .expect("register body");
        body["token"].as_str().expect("token in body").to_string()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(app: Router) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (addr, handle)
}
