//! MCP service implementation using rmcp.
//!
//! [`Nl2SqlService`] exposes the schema and question-answering tools over
//! MCP through the rmcp tool macros.

use crate::db::ConnectionManager;
use crate::llm::ChatClient;
use crate::models::ConnectionInfo;
use crate::tools::ask::{AskInput, AskOutput, AskSettings, AskToolHandler};
use crate::tools::schema::{
    DescribeSchemaInput, DescribeSchemaOutput, ListTablesInput, ListTablesOutput,
    SchemaToolHandler,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    schemars::JsonSchema,
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize, JsonSchema)]
pub struct ListConnectionsOutput {
    pub connections: Vec<ConnectionInfo>,
    pub count: usize,
}

#[derive(Clone)]
pub struct Nl2SqlService {
    connection_manager: Arc<ConnectionManager>,
    client: Arc<dyn ChatClient>,
    settings: Arc<AskSettings>,
    tool_router: ToolRouter<Self>,
}

impl Nl2SqlService {
    pub fn new(
        connection_manager: Arc<ConnectionManager>,
        client: Arc<dyn ChatClient>,
        settings: Arc<AskSettings>,
    ) -> Self {
        Self {
            connection_manager,
            client,
            settings,
            tool_router: Self::tool_router(),
        }
    }

    /// Trim the connection ID and reject an empty one, pointing the caller
    /// at list_connections.
    fn validate_connection_id(&self, provided: &str) -> Result<String, McpError> {
        let trimmed = provided.trim();
        if trimmed.is_empty() {
            Err(McpError::invalid_params(
                "connection_id is required. Call list_connections first to get available database IDs.",
                None,
            ))
        } else {
            Ok(trimmed.to_string())
        }
    }

    fn schema_handler(&self) -> SchemaToolHandler {
        SchemaToolHandler::new(self.connection_manager.clone(), self.settings.filters.clone())
    }
}

#[tool_router]
impl Nl2SqlService {
    #[tool(
        description = "List all available database connections.\nReturns connection IDs, database types, SQL dialects and whether the connection is writable."
    )]
    async fn list_connections(&self) -> Json<ListConnectionsOutput> {
        let connections = self.connection_manager.list_connections_detail().await;
        let count = connections.len();
        Json(ListConnectionsOutput { connections, count })
    }

    #[tool(
        description = "List the tables visible to question answering, after the server's include/exclude filters."
    )]
    async fn list_tables(
        &self,
        Parameters(mut input): Parameters<ListTablesInput>,
    ) -> Result<Json<ListTablesOutput>, McpError> {
        input.connection_id = self.validate_connection_id(&input.connection_id)?;
        self.schema_handler()
            .list_tables(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Show the schema document used to answer questions: one CREATE TABLE statement per visible table, with excluded columns removed."
    )]
    async fn describe_schema(
        &self,
        Parameters(mut input): Parameters<DescribeSchemaInput>,
    ) -> Result<Json<DescribeSchemaOutput>, McpError> {
        input.connection_id = self.validate_connection_id(&input.connection_id)?;
        self.schema_handler()
            .describe_schema(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Answer a question about the data in plain language.\nGenerates SQL, runs it, and repairs it from the database's error message when it fails.\nReturns the final SQL, every attempt, and the rows. Output format: json (default), table, or markdown."
    )]
    async fn ask(
        &self,
        Parameters(mut input): Parameters<AskInput>,
        context: RequestContext<RoleServer>,
    ) -> Result<Json<AskOutput>, McpError> {
        input.connection_id = self.validate_connection_id(&input.connection_id)?;
        let handler = AskToolHandler::new(
            self.connection_manager.clone(),
            self.client.clone(),
            self.settings.clone(),
        );
        handler
            .ask(input, context.ct)
            .await
            .map(Json)
            .map_err(McpError::from)
    }
}

#[tool_handler]
impl ServerHandler for Nl2SqlService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "db-nl2sql-server".to_owned(),
                title: Some("NL2SQL Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Answers questions about SQL databases in plain language.\n\
                \n\
                ## Workflow\n\
                1. Call `list_connections` to get available database IDs\n\
                2. Optionally call `describe_schema` to see the tables and columns the server knows about\n\
                3. Call `ask` with the `connection_id` and a question\n\
                \n\
                ## Failed questions\n\
                When no generated query runs successfully, the error's `data.attempts` lists every \
                SQL statement tried and the database's reason for rejecting it."
                    .to_string(),
            ),
        }
    }
}
