//! Skill Graph MCP Server
//!
//! Tracks planned tasks, version-control commits and the skills they
//! reflect, and answers dependency, staleness and skill-growth queries over
//! MCP or from the command line.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use rmcp::{
    ErrorData, RoleServer, ServerHandler, ServiceExt,
    model::{
        CallToolRequestParams, CallToolResult, Content, InitializeResult, ListToolsResult,
        PaginatedRequestParams, ServerCapabilities,
    },
    service::RequestContext,
    transport::io::stdio,
};
use serde_json::{Value, json};
use skill_graph_mcp::cli::{Cli, Command, run_command};
use skill_graph_mcp::config::{Config, ConfigLoader, SourceMode};
use skill_graph_mcp::db;
use skill_graph_mcp::error::ToolError;
use skill_graph_mcp::logging::{LogLevelFilter, LogTarget, Logger, init_tracing};
use skill_graph_mcp::source::{DataSource, DemoSource, FallbackSource, LiveSource};
use skill_graph_mcp::tools::{ToolContext, ToolHandler};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// MCP server handler.
#[derive(Clone)]
struct SkillGraphServer {
    tool_handler: Arc<ToolHandler>,
    /// Atomic level filter for logging (client can adjust via logging/setLevel).
    level_filter: Arc<LogLevelFilter>,
}

impl SkillGraphServer {
    fn new(source: Arc<FallbackSource>, level_filter: Arc<LogLevelFilter>) -> Self {
        Self {
            tool_handler: Arc::new(ToolHandler::new(source)),
            level_filter,
        }
    }
}

const INSTRUCTIONS: &str = "\
Skill graph over planned tasks and commits. Record work with create_task and store_commit, \
run link_commits to attach commits to tasks, then query stale_tasks, blocked_tasks, \
critical_path, knowledge_gaps and skill_trend. Every response carries is_demo, which is true \
when the store was unreachable and the answer comes from the demo dataset.";

impl ServerHandler for SkillGraphServer {
    fn get_info(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: Default::default(),
            server_info: rmcp::model::Implementation {
                name: "skill-graph-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            capabilities: ServerCapabilities {
                tools: Some(rmcp::model::ToolsCapability::default()),
                logging: Some(Default::default()),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    async fn set_level(
        &self,
        request: rmcp::model::SetLevelRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<(), ErrorData> {
        self.level_filter.set(request.level);
        info!(level = ?request.level, "Logging level updated via MCP");
        Ok(())
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            tools: self.tool_handler.get_tools(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let tool_name = request.name.clone();
        let start = std::time::Instant::now();

        let logger = Logger::new()
            .with_peer(context.peer.clone())
            .with_level_filter(Arc::clone(&self.level_filter))
            .with_name(format!("tool:{}", tool_name));
        let tool_ctx = ToolContext::new(logger);

        let args = Value::Object(request.arguments.unwrap_or_default());
        match self.tool_handler.call_tool(&tool_name, args, &tool_ctx).await {
            Ok(result) => {
                debug!(
                    tool = %tool_name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool call succeeded"
                );
                Ok(CallToolResult {
                    content: vec![Content::text(result.to_string())],
                    is_error: None,
                    meta: None,
                    structured_content: None,
                })
            }
            Err(e) => {
                let tool_err = ToolError::from(e);
                warn!(
                    tool = %tool_name,
                    error_code = ?tool_err.code,
                    error_kind = tool_err.code.kind(),
                    error_message = %tool_err.message,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool call failed"
                );
                let error_json = serde_json::to_string(&tool_err)
                    .unwrap_or_else(|_| json!({ "error": tool_err.to_string() }).to_string());
                Ok(CallToolResult {
                    content: vec![Content::text(error_json)],
                    is_error: Some(true),
                    meta: None,
                    structured_content: None,
                })
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&LogTarget::parse(&cli.log), cli.verbose)?;

    // SAFETY: set at startup before any other threads are spawned.
    if let Some(config_path) = &cli.config {
        unsafe {
            std::env::set_var("SKILL_GRAPH_CONFIG_PATH", config_path);
        }
    }
    let mut loader = ConfigLoader::load()?;
    for path in loader.sources() {
        debug!(path = %path.display(), "Loaded config file");
    }

    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.store.db_path = db_path.into();
    }
    if cli.demo {
        config.store.mode = SourceMode::Demo;
    }
    config.validate()?;
    let config = Arc::new(loader.into_config());

    let source = Arc::new(build_source(Arc::clone(&config))?);

    match cli.command {
        Some(Command::Serve) | None => run_server(source).await?,
        Some(command) => {
            let output = run_command(&source, command)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    db::close_shared()?;
    Ok(())
}

/// Live store with demo fallback, or the demo dataset alone in demo mode.
fn build_source(config: Arc<Config>) -> Result<FallbackSource> {
    match config.store.mode {
        SourceMode::Demo => {
            info!("Demo mode: serving the static demo dataset");
            let demo: Arc<dyn DataSource> = Arc::new(DemoSource::new(config, Utc::now())?);
            Ok(FallbackSource::new(demo))
        }
        SourceMode::Live => {
            info!(db_path = %config.store.db_path.display(), "Using live store");
            let live: Arc<dyn DataSource> = Arc::new(LiveSource::shared(config)?);
            Ok(FallbackSource::new(live))
        }
    }
}

async fn run_server(source: Arc<FallbackSource>) -> Result<()> {
    let level_filter = Arc::new(LogLevelFilter::default());
    let server = SkillGraphServer::new(source, level_filter);

    info!("Starting Skill Graph MCP server");
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    info!("Server stopped");
    Ok(())
}
