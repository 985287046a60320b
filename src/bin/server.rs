//! Mnemonic MCP Server
//!
//! Run with: mnemonic-server

use clap::Parser;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mnemonic::config::{db_path_in, MnemonicConfig};
use mnemonic::error::{MnemonicError, Result};
use mnemonic::mcp::{
    get_tool_definitions, methods, InitializeResult, McpHandler, McpRequest, McpResponse,
    McpServer, ToolCallResult,
};
use mnemonic::{ConflictPolicy, ImportOptions, MaintenanceOptions, MemoryEngine};
use mnemonic::types::*;

#[derive(Parser, Debug)]
#[command(name = "mnemonic-server")]
#[command(about = "Mnemonic MCP server for weighted AI memory")]
struct Args {
    /// Data directory holding memories.db
    #[arg(long, env = "MNEMONIC_DATA_DIR")]
    data_dir: Option<String>,

    /// Database path (overrides --data-dir)
    #[arg(long, env = "MNEMONIC_DB_PATH")]
    db_path: Option<String>,

    /// Storage mode (local or cloud-safe)
    #[arg(long, env = "MNEMONIC_STORAGE_MODE", default_value = "local")]
    storage_mode: String,

    /// How long to wait on a locked database, in milliseconds
    #[arg(long, env = "MNEMONIC_BUSY_TIMEOUT_MS", default_value = "5000")]
    busy_timeout_ms: u64,
}

/// MCP request handler
struct MnemonicHandler {
    engine: MemoryEngine,
}

fn parse_args<T: DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| MnemonicError::validation("arguments", e.to_string()))
}

fn required_str<'a>(params: &'a Value, field: &str) -> Result<&'a str> {
    params
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| MnemonicError::validation(field, "is required"))
}

impl MnemonicHandler {
    fn new(engine: MemoryEngine) -> Self {
        Self { engine }
    }

    fn handle_tool_call(&self, name: &str, params: Value) -> Value {
        let result = match name {
            "mnemonic_create" => self.tool_create(params),
            "mnemonic_get" => self.tool_get(params),
            "mnemonic_update" => self.tool_update(params),
            "mnemonic_delete" => self.tool_delete(params),
            "mnemonic_search" => self.tool_search(params),
            "mnemonic_list" => self.tool_list(params),
            "mnemonic_pin" => self.tool_pin(params),
            "mnemonic_triggers" => self.tool_triggers(params),
            "mnemonic_export" => self.tool_export(),
            "mnemonic_import" => self.tool_import(params),
            "mnemonic_stats" => self.tool_stats(),
            "mnemonic_maintenance" => self.tool_maintenance(params),
            _ => return json!({"error": format!("Unknown tool: {}", name)}),
        };

        result.unwrap_or_else(|e| {
            tracing::debug!(tool = name, error = %e, "Tool call failed");
            let mut body = json!({"error": e.to_string(), "code": e.code()});
            if let Some(summary) = e.import_summary() {
                body["summary"] = json!(summary);
            }
            body
        })
    }

    fn tool_create(&self, params: Value) -> Result<Value> {
        let input: CreateMemoryInput = parse_args(params)?;
        Ok(json!(self.engine.create(input)?))
    }

    fn tool_get(&self, params: Value) -> Result<Value> {
        let id = required_str(&params, "id")?;
        Ok(json!(self.engine.get(id)?))
    }

    fn tool_update(&self, params: Value) -> Result<Value> {
        let id = required_str(&params, "id")?.to_string();
        let input: UpdateMemoryInput = parse_args(params)?;
        Ok(json!(self.engine.update(&id, input)?))
    }

    fn tool_delete(&self, params: Value) -> Result<Value> {
        let id = required_str(&params, "id")?;
        let deleted = self.engine.delete(id)?;
        Ok(json!({"deleted": deleted, "id": id}))
    }

    fn tool_search(&self, params: Value) -> Result<Value> {
        let options: SearchOptions = parse_args(params)?;
        Ok(json!(self.engine.search(options)?))
    }

    fn tool_list(&self, params: Value) -> Result<Value> {
        let options: ListOptions = parse_args(params)?;
        Ok(json!(self.engine.list(options)?))
    }

    fn tool_pin(&self, params: Value) -> Result<Value> {
        let id = required_str(&params, "id")?;
        let pinned = params.get("pinned").and_then(|v| v.as_bool()).unwrap_or(true);
        Ok(json!(self.engine.pin(id, pinned)?))
    }

    fn tool_triggers(&self, params: Value) -> Result<Value> {
        let text = required_str(&params, "text")?;
        let limit = params
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|l| l as usize);
        let memories = self.engine.match_triggers(text, limit)?;
        Ok(json!({"count": memories.len(), "memories": memories}))
    }

    fn tool_export(&self) -> Result<Value> {
        Ok(json!(self.engine.export()?))
    }

    fn tool_import(&self, params: Value) -> Result<Value> {
        let document = params
            .get("document")
            .ok_or_else(|| MnemonicError::validation("document", "is required"))?;
        let policy = match params.get("policy").and_then(|v| v.as_str()) {
            Some(p) => p
                .parse::<ConflictPolicy>()
                .map_err(|e| MnemonicError::validation("policy", e))?,
            None => ConflictPolicy::default(),
        };
        let preserve_ids = params
            .get("preserve_ids")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let options = ImportOptions {
            policy,
            preserve_ids,
        };
        Ok(json!(self.engine.import(document, options)?))
    }

    fn tool_stats(&self) -> Result<Value> {
        Ok(json!(self.engine.stats()?))
    }

    fn tool_maintenance(&self, params: Value) -> Result<Value> {
        let options: MaintenanceOptions = parse_args(params)?;
        Ok(json!(self.engine.maintenance(options)?))
    }
}

impl McpHandler for MnemonicHandler {
    fn handle_request(&self, request: McpRequest) -> McpResponse {
        match request.method.as_str() {
            methods::INITIALIZE => {
                let result = InitializeResult::default();
                McpResponse::success(request.id, json!(result))
            }
            methods::INITIALIZED | methods::PING => McpResponse::success(request.id, json!({})),
            methods::LIST_TOOLS => {
                let tools = get_tool_definitions();
                McpResponse::success(request.id, json!({"tools": tools}))
            }
            methods::CALL_TOOL => {
                let Some(name) = request.params.get("name").and_then(|v| v.as_str()) else {
                    return McpResponse::from_error(
                        request.id,
                        MnemonicError::validation("name", "is required"),
                    );
                };
                let arguments = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or(json!({}));

                let result = self.handle_tool_call(name, arguments);
                let tool_result = ToolCallResult::json(&result);
                McpResponse::success(request.id, json!(tool_result))
            }
            _ => McpResponse::error(
                request.id,
                mnemonic::mcp::protocol::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is for MCP protocol)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let db_path = match args.db_path {
        Some(path) => shellexpand::tilde(&path).to_string(),
        None => db_path_in(args.data_dir.as_deref()),
    };

    let mut config = MnemonicConfig::new(db_path);
    config.storage_mode = args
        .storage_mode
        .parse::<StorageMode>()
        .map_err(MnemonicError::Config)?;
    config.busy_timeout_ms = args.busy_timeout_ms;

    let engine = MemoryEngine::open(config)?;
    let server = McpServer::new(MnemonicHandler::new(engine));

    tracing::info!("Mnemonic MCP server starting...");
    server.run()?;

    Ok(())
}
