use std::process::{Command, Stdio};
use std::io::{Write, BufRead, BufReader};
use std::sync::mpsc::{channel, Sender, Receiver};
use std::thread;
use std::time::Duration;
use serde_json::{json, Value};

/// Helper struct to manage server process with async I/O
struct McpClient {
    child: std::process::Child,
    tx: Sender<Value>,
    rx: Receiver<Value>,
    _dir: tempfile::TempDir,
}

impl McpClient {
    /// Spawn the server against a fresh on-disk catalog, with chaos off, no
    /// simulated model latency and an external source that refuses connections.
    fn spawn() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = format!("sqlite://{}", dir.path().join("catalog.db").display());

        let mut child = Command::new(env!("CARGO_BIN_EXE_signalrank"))
            .current_dir(dir.path())
            .env("SIGNALRANK_DB_PATH", db_path)
            .env("SIGNALRANK_CHAOS__MODEL_FAILURE_RATE", "0")
            .env("SIGNALRANK_CHAOS__EXTERNAL_TIMEOUT_RATE", "0")
            .env("SIGNALRANK_CHAOS__SLOW_SEARCH_RATE", "0")
            .env("SIGNALRANK_CHAOS__EXTERNAL_FAILURE_RATE", "0")
            .env("SIGNALRANK_MODEL__MIN_LATENCY_MS", "0")
            .env("SIGNALRANK_MODEL__MAX_LATENCY_MS", "0")
            .env("SIGNALRANK_MODEL__SLOW_INFERENCE_RATE", "0")
            .env("SIGNALRANK_EXTERNAL__BASE_URL", "http://127.0.0.1:9")
            .env("SIGNALRANK_EXTERNAL__TIMEOUT_MS", "200")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())  // Suppress log output in tests
            .spawn()
            .expect("Failed to spawn signalrank binary");

        let mut stdin = child.stdin.take().expect("Failed to get stdin");
        let stdout = child.stdout.take().expect("Failed to get stdout");

        // Channel for sending requests
        let (req_tx, req_rx) = channel::<Value>();

        // Channel for receiving responses
        let (resp_tx, resp_rx) = channel::<Value>();

        // Thread to write requests to stdin
        thread::spawn(move || {
            while let Ok(request) = req_rx.recv() {
                let request_str = serde_json::to_string(&request).expect("Failed to serialize");
                if writeln!(stdin, "{}", request_str).is_err() {
                    break;
                }
                if stdin.flush().is_err() {
                    break;
                }
            }
        });

        // Thread to read responses from stdout
        thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) => break, // EOF
                    Ok(_) => {
                        if let Ok(value) = serde_json::from_str::<Value>(&line) {
                            if resp_tx.send(value).is_err() {
                                break;
                            }
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        McpClient {
            child,
            tx: req_tx,
            rx: resp_rx,
            _dir: dir,
        }
    }

    /// Spawn and complete the initialize handshake.
    fn ready() -> Self {
        let client = Self::spawn();
        client.send_request(json!({
            "jsonrpc": "2.0",
            "method": "initialize",
            "id": 1,
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "1.0"}
            }
        }))
        .expect("Failed to initialize");

        client.send_notification(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }));
        client
    }

    fn send_request(&self, request: Value) -> Option<Value> {
        self.tx.send(request).ok()?;
        // Generous: the first response waits for migrations and seeding.
        self.rx.recv_timeout(Duration::from_secs(10)).ok()
    }

    fn send_notification(&self, notification: Value) {
        let _ = self.tx.send(notification);
        // Notifications don't have responses, give server time to process
        thread::sleep(Duration::from_millis(50));
    }

    fn call_tool(&self, id: u64, name: &str, arguments: Value) -> Value {
        let response = self
            .send_request(json!({
                "jsonrpc": "2.0",
                "method": "tools/call",
                "id": id,
                "params": {"name": name, "arguments": arguments}
            }))
            .unwrap_or_else(|| panic!("No response to {}", name));
        assert_eq!(response["id"], id);
        response["result"].clone()
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn test_initialize_handshake() {
    let client = McpClient::spawn();

    let response = client.send_request(json!({
        "jsonrpc": "2.0",
        "method": "initialize",
        "id": 1,
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {
                "name": "test-client",
                "version": "1.0.0"
            }
        }
    }))
    .expect("Failed to get initialize response");

    // Verify response structure
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
    assert!(response["result"].is_object());

    let result = &response["result"];
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert!(result["capabilities"]["tools"].is_object());
    assert_eq!(result["serverInfo"]["name"], "signalrank");
    assert!(result["serverInfo"]["version"].is_string());
    assert!(result["serverInfo"]["description"].is_string());

    client.send_notification(json!({
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    }));
}

#[test]
fn test_tool_discovery() {
    let client = McpClient::ready();

    let response = client.send_request(json!({
        "jsonrpc": "2.0",
        "method": "tools/list",
        "id": 2
    }))
    .expect("Failed to get tools/list response");

    assert_eq!(response["id"], 2);
    let tools = response["result"]["tools"].as_array().expect("tools array");
    assert_eq!(tools.len(), 5, "Should have exactly 5 tools");

    let tool_names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    let expected_tools = [
        "search",
        "get_chaos_config",
        "update_chaos_config",
        "get_metrics",
        "health_check",
    ];
    for expected in expected_tools {
        assert!(tool_names.contains(&expected), "missing tool {}", expected);
    }

    for tool in tools {
        assert!(tool["description"].is_string());
        assert!(tool["inputSchema"].is_object());
    }
}

#[test]
fn test_search_returns_fused_ranking() {
    let client = McpClient::ready();

    let result = client.call_tool(2, "search", json!({
        "query": "machine learning",
        "user_id": "integration_user",
        "limit": 5
    }));
    assert!(result["isError"].is_null() || result["isError"] == false);

    let body = &result["structuredContent"];
    assert_eq!(body["query"], "machine learning");
    assert_eq!(body["parsed_query"]["intent"], "discovery");
    assert_eq!(body["parsed_query"]["tokens"], json!(["machine", "learning"]));

    let results = body["results"].as_array().expect("results array");
    assert!(!results.is_empty() && results.len() <= 5);

    let scores: Vec<f64> = results.iter().map(|r| r["final_score"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]), "results not sorted: {:?}", scores);

    for r in results {
        let e = &r["explanation"];
        let expected = 0.5 * e["search"].as_f64().unwrap()
            + 0.3 * e["recommendation"].as_f64().unwrap()
            + 0.2 * e["external"].as_f64().unwrap();
        assert!((r["final_score"].as_f64().unwrap() - expected).abs() < 1e-9);
        // The external source is unreachable, so no boost is applied.
        assert_eq!(e["external"], 0.0);
    }

    let components: Vec<&str> = body["meta"]["components_called"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c.as_str())
        .collect();
    assert_eq!(
        components,
        vec!["query_normalizer", "lexical_index", "recommendation", "fusion_ranker"]
    );
    assert_eq!(body["meta"]["model_version"], "mock_v1");
}

#[test]
fn test_search_validation_error() {
    let client = McpClient::ready();

    let result = client.call_tool(2, "search", json!({
        "query": "machine learning",
        "user_id": "integration_user",
        "limit": 0
    }));
    assert_eq!(result["isError"], true);
    let body = &result["structuredContent"];
    assert_eq!(body["kind"], "validation_error");
    assert_eq!(body["field"], "limit");

    let result = client.call_tool(3, "search", json!({"query": "   ", "user_id": "u"}));
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["field"], "query");
}

#[test]
fn test_chaos_config_round_trip() {
    let client = McpClient::ready();

    let current = client.call_tool(2, "get_chaos_config", json!({}));
    assert_eq!(current["structuredContent"]["config"]["model_failure_rate"], 0.0);

    let updated = client.call_tool(3, "update_chaos_config", json!({
        "model_failure_rate": 1.0,
        "external_timeout_rate": 0.0,
        "slow_search_rate": 0.0,
        "external_failure_rate": 0.25
    }));
    assert!(updated["isError"].is_null() || updated["isError"] == false);

    let current = client.call_tool(4, "get_chaos_config", json!({}));
    assert_eq!(current["structuredContent"]["config"]["model_failure_rate"], 1.0);
    assert_eq!(current["structuredContent"]["config"]["external_failure_rate"], 0.25);

    // Every model call now fails, but the request still succeeds.
    let result = client.call_tool(
        5,
        "search",
        json!({"query": "neural networks", "user_id": "u1"}),
    );
    for r in result["structuredContent"]["results"].as_array().unwrap() {
        assert_eq!(r["explanation"]["recommendation"], 0.0);
    }

    let rejected = client.call_tool(6, "update_chaos_config", json!({
        "model_failure_rate": 1.5,
        "external_timeout_rate": 0.0,
        "slow_search_rate": 0.0,
        "external_failure_rate": 0.0
    }));
    assert_eq!(rejected["isError"], true);
    assert_eq!(rejected["structuredContent"]["field"], "model_failure_rate");

    let current = client.call_tool(7, "get_chaos_config", json!({}));
    assert_eq!(
        current["structuredContent"]["config"]["model_failure_rate"],
        1.0,
        "rejected update must not apply"
    );
}

#[test]
fn test_health_and_metrics() {
    let client = McpClient::ready();

    let health = client.call_tool(2, "health_check", json!({}));
    let body = &health["structuredContent"];
    assert_eq!(body["status"], "ok");
    assert_eq!(body["document_count"], 50);
    assert!(body["version"].is_string());

    client.call_tool(3, "search", json!({"query": "kubernetes deployment", "user_id": "u1"}));

    let metrics = client.call_tool(4, "get_metrics", json!({}));
    let service = &metrics["structuredContent"]["service"];
    assert_eq!(service["requests_completed"], 1);
    assert_eq!(service["queries_discovery"], 1);
    assert_eq!(service["external_miss"], 1);
    assert_eq!(service["stage_durations"]["fusion_ranker"]["count"], 1);
    assert_eq!(service["stage_durations"]["external_signal"]["count"], 1);
    assert!(metrics["structuredContent"]["chaos_events"].is_object());
}
