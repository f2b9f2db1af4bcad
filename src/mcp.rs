// MIST Gateway - MCP JSON-RPC Server
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// MCP server: JSON-RPC 2.0 over stdio, one message per line.
// Stdout carries protocol traffic only. Logging goes to stderr.

use crate::tools::Gateway;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "mist-gateway";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const INSTRUCTIONS: &str = "Personal assistant tools. Notes are local markdown files. \
Mail, calendar and tasks use the configured Google account. Git tools take a repo_path. \
Notion tools use the configured integration token. Gmail messages, threads, calendar \
events and tasks can also be read as resources.";

/// Write one JSON-RPC message followed by a newline
fn write_message<W: Write>(out: &mut W, message: &Value) -> Result<()> {
    let line = serde_json::to_string(message).context("serialize response")?;
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Send JSON-RPC response
fn send_response<W: Write>(out: &mut W, id: &Value, result: Value) -> Result<()> {
    write_message(
        out,
        &json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result,
        }),
    )
}

/// Send JSON-RPC error response
fn send_error<W: Write>(out: &mut W, id: &Value, code: i64, message: &str) -> Result<()> {
    write_message(
        out,
        &json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message },
        }),
    )
}

/// Handle one parsed message, writing at most one response
fn handle_message<W: Write>(gateway: &mut Gateway, msg: &Value, out: &mut W) -> Result<()> {
    let method = msg["method"].as_str().unwrap_or("");
    let id = &msg["id"];
    let params = &msg["params"];

    log::debug!("Received: {}", method);

    match method {
        "initialize" => send_response(
            out,
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {}, "resources": {} },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION,
                },
                "instructions": INSTRUCTIONS,
            }),
        ),

        // No response for notifications
        m if m.starts_with("notifications/") => Ok(()),

        "ping" => send_response(out, id, json!({})),

        "tools/list" => send_response(out, id, json!({ "tools": gateway.tool_definitions() })),

        "tools/call" => {
            let name = params["name"].as_str().unwrap_or("");
            let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
            let output = gateway.call(name, &args);
            send_response(
                out,
                id,
                json!({
                    "content": [{ "type": "text", "text": output.text }],
                    "isError": output.is_error,
                }),
            )
        }

        "resources/list" => send_response(out, id, json!({ "resources": [] })),

        "resources/templates/list" => send_response(
            out,
            id,
            json!({ "resourceTemplates": gateway.resource_templates() }),
        ),

        "resources/read" => {
            let uri = params["uri"].as_str().unwrap_or("");
            match gateway.read_resource(uri) {
                Ok(text) => send_response(
                    out,
                    id,
                    json!({
                        "contents": [{ "uri": uri, "mimeType": "text/plain", "text": text }],
                    }),
                ),
                Err(e) => {
                    log::warn!("READ {} failed: {}", uri, e);
                    send_error(out, id, e.rpc_code(), &e.to_string())
                }
            }
        }

        _ => {
            if id.is_null() {
                Ok(())
            } else {
                send_error(out, id, -32601, &format!("Unknown method: {}", method))
            }
        }
    }
}

/// Serve until the input closes
pub fn serve<R: BufRead, W: Write>(gateway: &mut Gateway, input: R, out: &mut W) -> Result<()> {
    for line in input.lines() {
        let line = line.context("read request line")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let msg: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("JSON parse error: {}", e);
                send_error(out, &Value::Null, -32700, &format!("Parse error: {}", e))?;
                continue;
            }
        };

        if !msg.is_object() {
            log::warn!("Request is not a JSON object");
            send_error(out, &Value::Null, -32600, "Invalid Request")?;
            continue;
        }

        handle_message(gateway, &msg, out)?;
    }
    Ok(())
}

/// Main MCP server loop on stdin/stdout
pub fn run(mut gateway: Gateway) -> Result<()> {
    log::info!("Starting {} v{}", SERVER_NAME, SERVER_VERSION);
    log::info!("{}", gateway.config().summary());

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serve(&mut gateway, stdin.lock(), &mut out)?;

    log::info!("stdin closed, shutting down");
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
