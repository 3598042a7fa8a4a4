//! Relay server listener
//!
//! Serves WebSocket upgrades on any path and spawns a connection task per
//! socket. Plain HTTP requests get a fixed 404.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::server::connection::serve_socket;
use crate::server::coordinator::{Coordinator, CoordinatorHandle};

/// Frame relay server
pub struct RelayServer {
    config: ServerConfig,
}

#[derive(Clone)]
struct AppState {
    coordinator: CoordinatorHandle,
    connection_semaphore: Option<Arc<Semaphore>>,
    max_message_size: usize,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Relay server listening");

        let (coordinator, handle) = Coordinator::new(&self.config);
        let coordinator_task = coordinator.spawn();
        let sweeper = handle.spawn_sweeper(self.config.relay.heartbeat_interval);

        let connection_semaphore = if self.config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(self.config.max_connections)))
        } else {
            None
        };
        let state = AppState {
            coordinator: handle,
            connection_semaphore,
            max_message_size: self.config.max_message_size,
        };
        let app = Router::new().fallback(upgrade).with_state(state);

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        // Stop background tasks on shutdown
        sweeper.abort();
        coordinator_task.abort();

        result.map_err(Into::into)
    }
}

async fn upgrade(
    State(state): State<AppState>,
    ws: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Ok(ws) = ws else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };

    // Check connection limit
    let permit = match state.connection_semaphore {
        Some(ref sem) => match sem.clone().try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!("Connection rejected: limit reached");
                return (StatusCode::SERVICE_UNAVAILABLE, "Connection limit reached")
                    .into_response();
            }
        },
        None => None,
    };

    let coordinator = state.coordinator.clone();
    ws.max_message_size(state.max_message_size)
        .max_frame_size(state.max_message_size)
        .on_upgrade(move |socket| async move {
            let _permit = permit;
            serve_socket(socket, coordinator).await;
        })
}
