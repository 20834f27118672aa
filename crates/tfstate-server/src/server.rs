use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::{build_router, AppState};

/// Terraform remote state server.
pub struct TfStateServer {
    config: ServerConfig,
    state: AppState,
}

impl TfStateServer {
    /// Validate the config and wire up the backend. Nothing is touched on
    /// disk until [`TfStateServer::serve`].
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let state = AppState::from_config(&config);
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Initialize the store, then serve until Ctrl-C.
    ///
    /// An unreadable key source fails here rather than on the first write.
    pub async fn serve(self) -> ServerResult<()> {
        if let Some(cipher) = self.config.encryption.cipher() {
            let key = cipher.current_key()?;
            info!(fingerprint = %key.fingerprint(), "state encryption key loaded");
        }
        self.state.backend.init().await?;
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            bind = %self.config.bind_addr,
            encrypt_states = self.config.encryption.encrypt_states,
            "tfstate server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    #[test]
    fn refuses_invalid_config() {
        assert!(TfStateServer::new(ServerConfig::default()).is_err());
    }

    #[test]
    fn server_construction() {
        let mut config = ServerConfig::default();
        config.storage = StorageConfig::Memory;
        config.encryption.key = Some("k".into());
        let server = TfStateServer::new(config).unwrap();
        assert_eq!(server.config().bind_addr, "127.0.0.1:8080".parse().unwrap());
        let _router = server.router();
    }
}
