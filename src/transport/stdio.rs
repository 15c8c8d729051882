//! Stdio transport for the MCP server.

use crate::db::ConnectionManager;
use crate::error::{DbError, DbResult};
use crate::llm::ChatClient;
use crate::mcp::Nl2SqlService;
use crate::tools::AskSettings;
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use tracing::{info, warn};

/// Reads JSON-RPC messages from stdin and writes responses to stdout.
pub struct StdioTransport {
    connection_manager: Arc<ConnectionManager>,
    client: Arc<dyn ChatClient>,
    settings: Arc<AskSettings>,
}

impl StdioTransport {
    pub fn new(
        connection_manager: Arc<ConnectionManager>,
        client: Arc<dyn ChatClient>,
        settings: Arc<AskSettings>,
    ) -> Self {
        Self {
            connection_manager,
            client,
            settings,
        }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting MCP server with stdio transport");

        let service = Nl2SqlService::new(
            self.connection_manager.clone(),
            self.client.clone(),
            self.settings.clone(),
        );

        let running_service = service
            .serve(stdio())
            .await
            .map_err(|e| DbError::internal(format!("Failed to start stdio transport: {}", e)))?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(_quit_reason) => info!("Stdio transport completed normally"),
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        return Err(DbError::internal(format!("Stdio transport error: {}", e)));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
        }

        info!("Disposing database providers");
        self.connection_manager.close_all().await;

        if shutdown_requested {
            // stdin reads block; select! cannot interrupt them
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}
