//! Line-delimited JSON-RPC loop.
//!
//! One request per input line, one response line per answered request.
//! Requests are handled to completion before the next line is read.

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ServerResult;
use crate::rpc::{
    text_content, RpcRequest, RpcResponse, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND,
};
use crate::service::PriceService;
use crate::tools::tool_definitions;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "stock-prices-server";

/// Serve requests from `reader` until EOF, writing responses to `writer`.
///
/// Malformed lines are logged and skipped. Only transport failures end the
/// loop early.
pub async fn serve<R, W>(service: &PriceService, reader: R, mut writer: W) -> ServerResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("Invalid JSON received: {}", e);
                continue;
            }
        };

        if let Some(response) = handle_request(service, request).await {
            let mut encoded = serde_json::to_string(&response)?;
            encoded.push('\n');
            writer.write_all(encoded.as_bytes()).await?;
            writer.flush().await?;
        }
    }

    tracing::info!("Input closed, shutting down");
    Ok(())
}

/// Answer one request. Returns `None` when no response is due.
pub async fn handle_request(service: &PriceService, request: RpcRequest) -> Option<RpcResponse> {
    let RpcRequest {
        id, method, params, ..
    } = request;
    tracing::debug!("Received {} (id: {:?})", method, id);

    match method.as_str() {
        "initialize" => Some(RpcResponse::success(id, initialize_result())),
        "tools/list" => Some(RpcResponse::success(
            id,
            json!({ "tools": tool_definitions() }),
        )),
        "tools/call" => Some(call_tool(service, id, params).await),
        _ if id.is_none() => {
            tracing::debug!("Ignoring notification {}", method);
            None
        }
        _ => {
            tracing::warn!("Unknown method: {}", method);
            Some(RpcResponse::failure(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            ))
        }
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {}
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

async fn call_tool(service: &PriceService, id: Option<Value>, params: Option<Value>) -> RpcResponse {
    let mut params = params.unwrap_or(Value::Null);

    let Some(name) = params.get("name").and_then(Value::as_str).map(str::to_string) else {
        return RpcResponse::failure(id, INVALID_PARAMS, "Missing tool name");
    };
    let arguments = params
        .get_mut("arguments")
        .map(Value::take)
        .unwrap_or(Value::Null);

    tracing::info!("Calling tool {}", name);
    let payload = service.call_tool(&name, arguments).await;

    match text_content(&payload) {
        Ok(result) => RpcResponse::success(id, result),
        Err(e) => RpcResponse::failure(id, INTERNAL_ERROR, e.to_string()),
    }
}
