//! An in-memory stand-in for the bosk REST interface.
//!
//! Stores raw bodies by path. GET returns 404 for unknown paths, PUT replaces,
//! DELETE removes. When credentials are set, every request must carry the
//! matching Basic `Authorization` header or it is answered with 401.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::get,
    Router,
};
use tokio::{net::TcpListener, sync::RwLock};

pub type Nodes = Arc<RwLock<HashMap<String, String>>>;

#[derive(Clone)]
struct AppState {
    nodes: Nodes,
    authorization: Option<String>,
}

pub struct FakeBosk {
    pub addr: SocketAddr,
    pub nodes: Nodes,
}

impl FakeBosk {
    /// Start a server that accepts unauthenticated requests.
    pub async fn start() -> Self {
        Self::start_with(None).await
    }

    /// Start a server that only accepts the given `Authorization` header.
    pub async fn start_with_auth(authorization: &str) -> Self {
        Self::start_with(Some(authorization.to_string())).await
    }

    async fn start_with(authorization: Option<String>) -> Self {
        let nodes: Nodes = Arc::new(RwLock::new(HashMap::new()));
        let app = Router::new()
            .route("/{*path}", get(get_node).put(put_node).delete(delete_node))
            .with_state(AppState {
                nodes: Arc::clone(&nodes),
                authorization,
            });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, nodes }
    }

    /// The prefix to configure the provider with.
    pub fn url_prefix(&self) -> String {
        format!("http://{}/nodes/", self.addr)
    }

    /// The stored body at `nodes/<id>`, if any.
    pub async fn node(&self, id: &str) -> Option<String> {
        self.nodes.read().await.get(&format!("nodes/{}", id)).cloned()
    }

    /// Store a body directly, bypassing the provider.
    pub async fn insert(&self, id: &str, body: &str) {
        self.nodes
            .write()
            .await
            .insert(format!("nodes/{}", id), body.to_string());
    }
}

fn authorized(state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    match &state.authorization {
        None => Ok(()),
        Some(expected) => {
            let actual = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
            if actual == Some(expected.as_str()) {
                Ok(())
            } else {
                Err(StatusCode::UNAUTHORIZED)
            }
        }
    }
}

async fn get_node(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<String, StatusCode> {
    authorized(&state, &headers)?;
    state
        .nodes
        .read()
        .await
        .get(&path)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)
}

async fn put_node(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    authorized(&state, &headers)?;
    let body = String::from_utf8(body.to_vec()).map_err(|_| StatusCode::BAD_REQUEST)?;
    state.nodes.write().await.insert(path, body);
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_node(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, StatusCode> {
    authorized(&state, &headers)?;
    match state.nodes.write().await.remove(&path) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(StatusCode::NOT_FOUND),
    }
}
