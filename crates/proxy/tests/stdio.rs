use openapi_mcp_test_support::{KillOnDrop, asana_spec, write_spec_file};
use serde_json::{Value, json};
use std::io::{BufRead as _, BufReader, Write as _};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

fn proxy_command(spec_path: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_openapi-mcp-proxy"));
    cmd.arg("--spec")
        .arg(spec_path)
        .env_remove("RUST_LOG")
        .env_remove("TOOL_WHITELIST")
        .env_remove("SERVER_URL_OVERRIDE")
        .env_remove("API_KEY")
        .env("LOG_LEVEL", "warn");
    cmd
}

#[test]
fn print_tools_lists_every_operation() -> anyhow::Result<()> {
    let spec = write_spec_file(&asana_spec(None))?;
    let output = proxy_command(spec.path().to_str().expect("utf-8 path"))
        .arg("--print-tools")
        .arg("--tool-name-prefix")
        .arg("asana_")
        .output()?;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let tools: Vec<Value> = serde_json::from_slice(&output.stdout)?;
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert_eq!(
        names,
        vec![
            "asana_get_workspaces_custom_fields",
            "asana_getProject",
            "asana_updateProject",
            "asana_deleteProject",
            "asana_createProject",
            "asana_get_users_me",
        ]
    );
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["workspace_gid"]));
    assert_eq!(tools[0]["annotations"]["readOnlyHint"], true);
    Ok(())
}

#[test]
fn unreadable_spec_still_starts_with_no_tools() -> anyhow::Result<()> {
    let output = proxy_command("/definitely/missing/openapi.yaml")
        .arg("--print-tools")
        .output()?;
    assert!(output.status.success());
    let tools: Vec<Value> = serde_json::from_slice(&output.stdout)?;
    assert!(tools.is_empty());
    Ok(())
}

#[test]
fn stdio_handshake_and_tools_list() -> anyhow::Result<()> {
    let spec = write_spec_file(&asana_spec(None))?;
    let mut child = proxy_command(spec.path().to_str().expect("utf-8 path"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;
    let mut stdin = child.stdin.take().expect("stdin");
    let stdout = child.stdout.take().expect("stdout");
    let _guard = KillOnDrop(child);

    let (tx, rx) = mpsc::channel::<Value>();
    std::thread::spawn(move || {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            if let Ok(msg) = serde_json::from_str::<Value>(&line)
                && tx.send(msg).is_err()
            {
                break;
            }
        }
    });

    let mut send = |msg: Value| -> anyhow::Result<()> {
        writeln!(stdin, "{msg}")?;
        stdin.flush()?;
        Ok(())
    };
    let recv = |id: i64| -> anyhow::Result<Value> {
        loop {
            let msg = rx.recv_timeout(Duration::from_secs(10))?;
            if msg["id"] == json!(id) {
                return Ok(msg);
            }
        }
    };

    send(json!({
        "jsonrpc": "2.0", "id": 1, "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": { "name": "stdio-test", "version": "0" }
        }
    }))?;
    let init = recv(1)?;
    assert_eq!(init["result"]["serverInfo"]["name"], "openapi-mcp-proxy");
    assert!(init["result"]["capabilities"]["tools"].is_object());

    send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))?;
    send(json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list", "params": {} }))?;
    let list = recv(2)?;
    let tools = list["result"]["tools"].as_array().expect("tools array");
    assert_eq!(tools.len(), 6);

    send(json!({
        "jsonrpc": "2.0", "id": 3, "method": "tools/call",
        "params": { "name": "getProject", "arguments": {} }
    }))?;
    let call = recv(3)?;
    assert_eq!(call["result"]["isError"], true);
    assert_eq!(
        call["result"]["structuredContent"]["error"]["kind"],
        "missing_path_parameter"
    );
    Ok(())
}
