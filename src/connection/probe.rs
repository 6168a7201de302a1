//! Connection liveness checks.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ConnectionConfig;
use crate::db::Connector;
use crate::error::Result;

/// A successful liveness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// The engine's version string.
    pub version: String,
    /// Display-safe description of the target (no password).
    pub target: String,
}

/// Opens a short-lived connection and asks the engine for its version.
///
/// Safe to call repeatedly; nothing is changed on the server.
#[derive(Clone)]
pub struct ConnectionProbe {
    connector: Arc<dyn Connector>,
}

impl ConnectionProbe {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Probes an explicit configuration.
    pub async fn probe(&self, config: &ConnectionConfig) -> Result<ProbeReport> {
        let target = config.display_string();
        let mut client = match self.connector.connect(config).await {
            Ok(client) => client,
            Err(e) => {
                warn!("Connection check for {target} failed: {}", e.details());
                return Err(e);
            }
        };

        let version = client.server_version().await;

        if let Err(e) = client.close().await {
            warn!("Failed to close probe connection: {e}");
        }

        let version = version?;
        info!("Connection check for {target} succeeded: {version}");
        Ok(ProbeReport { version, target })
    }
}
