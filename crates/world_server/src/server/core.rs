//! Core world server implementation.
//!
//! This module contains the main `WorldServer` struct: it owns the shared
//! state, binds the listener and runs the accept loop until shutdown.

use crate::{
    config::ServerConfig,
    error::ServerError,
    security::SecurityManager,
    server::{handlers::handle_connection, ServerContext},
    shutdown::ShutdownState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use world_core::{DiceLogBook, MembershipStore, MemoryMembershipStore, RoomRegistry};

/// The core world server structure.
///
/// `WorldServer` accepts WebSocket connections and hands each one to a
/// connection handler that shares a single [`ServerContext`]: the
/// membership gate, the room registry, the dice log and the connection
/// manager.
///
/// # Architecture
///
/// * **Membership Gate**: admits connections to worlds
/// * **Room Registry**: one room of shared state per world
/// * **Connection Management**: WebSocket lifecycle and room-scoped delivery
/// * **Security**: per-IP connection limits, rate limiting, input validation
pub struct WorldServer {
    /// Server configuration settings
    config: ServerConfig,

    /// State shared with every connection handler
    context: Arc<ServerContext>,

    /// Connection and message policing
    security: Arc<SecurityManager>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl WorldServer {
    /// Creates a new world server over existing state.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration parameters for server behavior
    /// * `store` - Membership store consulted by the gate
    /// * `rooms` - Registered worlds and their rooms
    /// * `dice` - Dice log shared by all rooms
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn MembershipStore>,
        rooms: Arc<RoomRegistry>,
        dice: Arc<DiceLogBook>,
    ) -> Self {
        let context = Arc::new(ServerContext::new(&config, store, rooms, dice));
        let security = Arc::new(SecurityManager::new(config.security.clone()));
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            config,
            context,
            security,
            shutdown_sender,
        }
    }

    /// Creates a server with an empty in-memory store and no worlds.
    pub fn with_config(config: ServerConfig) -> Self {
        let dice = Arc::new(DiceLogBook::new(config.dice_log_capacity));
        Self::new(
            config,
            Arc::new(MemoryMembershipStore::new()),
            Arc::new(RoomRegistry::new()),
            dice,
        )
    }

    /// Starts the server and accepts connections until shutdown is initiated
    /// through `shutdown_state`.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the server started and stopped cleanly, or a `ServerError`
    /// if the listener could not be bound.
    pub async fn start_with_shutdown_state(&self, shutdown_state: ShutdownState) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, Some(shutdown_state)).await
    }

    /// Starts the server and accepts connections until [`WorldServer::shutdown`].
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, None).await
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| {
                ServerError::Network(format!("Failed to bind {}: {e}", self.config.bind_address))
            })
    }

    /// Runs the accept loop on an already bound listener.
    ///
    /// # Shutdown
    ///
    /// The loop ends when the shutdown state is initiated or
    /// [`WorldServer::shutdown`] is called. Open connections are then sent a
    /// close frame and `shutdown_state` is marked complete.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown_state: Option<ShutdownState>,
    ) -> Result<(), ServerError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(e.to_string()))?;
        info!("🚀 World server listening on {}", local_addr);
        info!(
            "🌍 Serving {} world(s), bootstrap scope: {}",
            self.context.rooms.world_count(),
            self.config.bootstrap_scope
        );

        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        let external_shutdown = {
            let shutdown_state = shutdown_state.clone();
            async move {
                match shutdown_state {
                    Some(state) => state.wait_for_shutdown().await,
                    None => std::future::pending().await,
                }
            }
        };

        let accept_loop = async {
            let mut housekeeping = interval(Duration::from_secs(60));
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, addr)) => self.accept(stream, addr).await,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            break;
                        }
                    },
                    _ = housekeeping.tick() => self.security.cleanup().await,
                }
            }
        };

        tokio::select! {
            _ = accept_loop => {}
            _ = external_shutdown => info!("🛑 Accept loop stopping - shutdown initiated"),
            _ = shutdown_receiver.recv() => info!("Internal shutdown signal received"),
        }

        info!("🧹 Performing server cleanup...");
        let closed = self.context.connections.close_all("Server shutting down").await;
        if closed > 0 {
            info!("🔌 Closed {} open connection(s)", closed);
        }
        if let Some(state) = shutdown_state {
            state.complete_shutdown();
        }
        info!("Server stopped");
        Ok(())
    }

    async fn accept(&self, stream: tokio::net::TcpStream, addr: SocketAddr) {
        if self.context.connections.connection_count().await >= self.config.max_connections {
            warn!("🚧 Refusing {}: connection limit {} reached", addr, self.config.max_connections);
            return;
        }
        if let Err(e) = self.security.validate_connection(addr.ip()).await {
            warn!("🛡️ Refusing {}: {}", addr, e);
            return;
        }

        let ctx = self.context.clone();
        let security = self.security.clone();
        let idle_timeout = match self.config.connection_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, ctx, security.clone(), idle_timeout).await {
                debug!("Connection error: {:?}", e);
            }
            security.on_disconnect(addr.ip()).await;
        });
    }

    /// Stops a server started with [`WorldServer::start`].
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("Shutting down server...");
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    /// Shared state, used by the application to snapshot it.
    pub fn context(&self) -> Arc<ServerContext> {
        self.context.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
