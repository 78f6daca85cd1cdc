use anyhow::Result;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;
use tracing::{info, warn};

use swlc::{LotteryError, LotteryType};

use crate::use_cases::LotteryUseCase;

#[derive(Debug, serde::Deserialize)]
struct JsonRpcRequest {
    #[serde(default = "default_jsonrpc")]
    jsonrpc: String,
    method: String,
    params: Option<Value>,
    id: Option<Value>,
}

fn default_jsonrpc() -> String {
    "2.0".to_string()
}

#[derive(Debug, serde::Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Option<Value>,
}

#[derive(Debug, serde::Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

#[derive(Debug, serde::Serialize)]
struct Tool {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

pub struct MCPHandler {
    lottery_use_case: Arc<LotteryUseCase>,
}

impl MCPHandler {
    pub fn new(lottery_use_case: Arc<LotteryUseCase>) -> Self {
        Self { lottery_use_case }
    }

    pub async fn serve<R, W>(self, reader: R, mut writer: W) -> Result<()>
    where
        R: BufRead,
        W: Write,
    {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str::<JsonRpcRequest>(&line) {
                Ok(req) => req,
                Err(e) => {
                    warn!("Failed to parse request: {} - Line: {}", e, line);
                    let error_response = JsonRpcResponse {
                        jsonrpc: "2.0".to_string(),
                        result: None,
                        error: Some(JsonRpcError {
                            code: -32700,
                            message: "Parse error".to_string(),
                            data: Some(json!(e.to_string())),
                        }),
                        id: None,
                    };
                    let response_json = serde_json::to_string(&error_response)?;
                    writeln!(writer, "{}", response_json)?;
                    writer.flush()?;
                    continue;
                }
            };

            if request.jsonrpc != "2.0" {
                warn!("Unexpected jsonrpc version {:?}", request.jsonrpc);
            }

            // Notifications never get a response
            let is_notification =
                request.id.is_none() || request.method.starts_with("notifications/");

            if is_notification {
                if request.method == "notifications/initialized" {
                    info!("🎰 Client initialized");
                }
                continue;
            }

            let response = self.handle_request(request).await;
            let response_json = serde_json::to_string(&response)?;
            writeln!(writer, "{}", response_json)?;
            writer.flush()?;
        }

        Ok(())
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id).await,
            "tools/list" => self.handle_list_tools(request.id).await,
            "tools/call" => self.handle_call_tool(request.params, request.id).await,
            _ => error_response(
                request.id,
                -32601,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    async fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("🎰 Initializing welfare lottery MCP server");
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "swlc-mcp-server",
                    "version": env!("CARGO_PKG_VERSION")
                }
            })),
            error: None,
            id: Some(id.unwrap_or(json!(1))),
        }
    }

    async fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools = self.get_tools();
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(json!({ "tools": tools })),
            error: None,
            id: Some(id.unwrap_or(json!(1))),
        }
    }

    async fn handle_call_tool(&self, params: Option<Value>, id: Option<Value>) -> JsonRpcResponse {
        let params = match params {
            Some(p) => p,
            None => return error_response(id, -32602, "Missing params".to_string()),
        };

        let tool_name = match params.get("name").and_then(|n| n.as_str()) {
            Some(name) => name,
            None => return error_response(id, -32602, "Missing tool name".to_string()),
        };

        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
        let arguments_map: HashMap<String, Value> = match serde_json::from_value(arguments) {
            Ok(map) => map,
            Err(_) => {
                return error_response(id, -32602, "Tool arguments must be an object".to_string());
            }
        };

        match self.execute_tool(tool_name, &arguments_map).await {
            Ok(content) => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                result: Some(json!({
                    "content": [
                        {
                            "type": "text",
                            "text": content
                        }
                    ]
                })),
                error: None,
                id: Some(id.unwrap_or(json!(1))),
            },
            Err(e) => {
                warn!("{} failed: {:#}", tool_name, e);
                error_response(id, error_code(&e), format!("Tool execution error: {:#}", e))
            }
        }
    }

    async fn execute_tool(
        &self,
        tool_name: &str,
        arguments: &HashMap<String, Value>,
    ) -> Result<String> {
        let use_case = &self.lottery_use_case;
        match tool_name {
            "get_latest_ssq" => use_case.get_latest(LotteryType::Ssq).await,
            "get_latest_3d" => use_case.get_latest(LotteryType::Fc3d).await,
            "get_latest_qlc" => use_case.get_latest(LotteryType::Qlc).await,
            "get_latest_kl8" => use_case.get_latest(LotteryType::Kl8).await,
            "get_latest_result" => use_case.get_latest_result(arguments).await,
            "get_historical_data" => use_case.get_historical_data(arguments).await,
            "analyze_numbers" => use_case.analyze_numbers(arguments).await,
            "generate_random_numbers" => use_case.generate_random_numbers(arguments).await,
            "generate_recommendations" => use_case.generate_recommendations(arguments).await,
            "run_backtest" => use_case.run_backtest(arguments).await,
            "sync_lottery_data" => use_case.sync_lottery_data(arguments).await,
            "get_database_info" => use_case.get_database_info(arguments).await,
            _ => Err(
                LotteryError::invalid_parameter("name", format!("unknown tool {}", tool_name))
                    .into(),
            ),
        }
    }

    fn get_tools(&self) -> Vec<Tool> {
        let lottery_type = json!({
            "type": "string",
            "enum": ["ssq", "3d", "qlc", "kl8"],
            "description": "Lottery type: ssq (双色球), 3d (福彩3D), qlc (七乐彩), kl8 (快乐8)"
        });

        let mut tools: Vec<Tool> = LotteryType::ALL
            .into_iter()
            .map(|t| Tool {
                name: format!("get_latest_{}", t.code()),
                description: format!("Get the latest {} ({}) draw result", t.name(), t.code()),
                input_schema: json!({
                    "type": "object",
                    "properties": {}
                }),
            })
            .collect();

        tools.extend([
            Tool {
                name: "get_latest_result".to_string(),
                description: "Get the latest draw result of any lottery type".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "lottery_type": lottery_type
                    },
                    "required": ["lottery_type"]
                }),
            },
            Tool {
                name: "get_historical_data".to_string(),
                description: "Get recent draw results, newest first".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "lottery_type": lottery_type,
                        "periods": {
                            "type": "integer",
                            "description": "Number of periods, 1-500 (default: 10)"
                        }
                    },
                    "required": ["lottery_type"]
                }),
            },
            Tool {
                name: "analyze_numbers".to_string(),
                description: "Frequency, hot/cold and consecutive-number statistics over recent draws"
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "lottery_type": lottery_type,
                        "periods": {
                            "type": "integer",
                            "description": "Analysis window, 5-500 (default: 30)"
                        }
                    },
                    "required": ["lottery_type"]
                }),
            },
            Tool {
                name: "generate_random_numbers".to_string(),
                description: "Generate uniformly random number sets".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "lottery_type": lottery_type,
                        "count": {
                            "type": "integer",
                            "description": "Number of sets, 1-10 (default: 1)"
                        },
                        "seed": {
                            "type": "integer",
                            "description": "Optional seed for reproducible output"
                        }
                    },
                    "required": ["lottery_type"]
                }),
            },
            Tool {
                name: "generate_recommendations".to_string(),
                description: "Generate number sets weighted by recent statistics".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "lottery_type": lottery_type,
                        "count": {
                            "type": "integer",
                            "description": "Number of sets, 1-10 (default: 1)"
                        },
                        "strategy": {
                            "type": "string",
                            "enum": ["uniform_random", "hot_weighted", "cold_weighted", "balanced"],
                            "description": "Sampling strategy (default: balanced)"
                        },
                        "seed": {
                            "type": "integer",
                            "description": "Optional seed for reproducible output"
                        }
                    },
                    "required": ["lottery_type"]
                }),
            },
            Tool {
                name: "run_backtest".to_string(),
                description: "Replay history and score every strategy against the draws that followed"
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "lottery_type": lottery_type,
                        "window_size": {
                            "type": "integer",
                            "description": "Statistics window, 50-500 (default: 100)"
                        },
                        "step": {
                            "type": "integer",
                            "description": "Distance between tested positions, 10-100 (default: 50)"
                        },
                        "seed": {
                            "type": "integer",
                            "description": "Optional seed for reproducible output"
                        }
                    },
                    "required": ["lottery_type"]
                }),
            },
            Tool {
                name: "sync_lottery_data".to_string(),
                description: "Fetch recent draws from the official source regardless of freshness"
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "lottery_type": lottery_type,
                        "periods": {
                            "type": "integer",
                            "description": "Number of periods, 1-50 (default: 10)"
                        }
                    },
                    "required": ["lottery_type"]
                }),
            },
            Tool {
                name: "get_database_info".to_string(),
                description: "Stored record counts, latest periods and recent sync attempts"
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {}
                }),
            },
        ]);

        tools
    }
}

/// Caller mistakes map to "invalid params"; everything else is internal.
fn error_code(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<LotteryError>() {
        Some(err) if err.is_caller_error() => -32602,
        _ => -32603,
    }
}

fn error_response(id: Option<Value>, code: i32, message: String) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        result: None,
        error: Some(JsonRpcError {
            code,
            message,
            data: None,
        }),
        id: Some(id.unwrap_or(json!(1))),
    }
}

pub fn stdio() -> (BufReader<io::Stdin>, io::Stdout) {
    (BufReader::new(io::stdin()), io::stdout())
}
