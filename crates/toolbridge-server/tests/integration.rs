use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use toolbridge_server::app_state::AppState;

fn build_test_app() -> TestServer {
    let server = Arc::new(toolbridge_server::demo::server().unwrap());
    let app = toolbridge_server::router::create_router(AppState::new(server));
    TestServer::new(app).unwrap()
}

/// POST one request to `/mcp` and return the decoded response body.
async fn rpc(server: &TestServer, id: Value, method: &str, params: Value) -> Value {
    let resp = server
        .post("/mcp")
        .json(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
        .await;
    resp.assert_status_ok();
    resp.json()
}

#[tokio::test]
async fn health_reports_server_summary() {
    let server = build_test_app();
    let resp = server.get("/health").await;
    resp.assert_status_ok();

    let body: Value = resp.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["server"], "Demo");
    assert_eq!(body["tools"], 1);
    assert_eq!(body["sse_sessions"], 0);
}

#[tokio::test]
async fn initialize_advertises_tools_and_resources() {
    let server = build_test_app();
    let body = rpc(&server, json!(1), "initialize", json!({})).await;

    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["serverInfo"]["name"], "Demo");
    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
    assert!(body["result"]["capabilities"]["tools"].is_object());
    assert!(body["result"]["capabilities"]["resources"].is_object());
}

#[tokio::test]
async fn ping_returns_empty_result() {
    let server = build_test_app();
    let body = rpc(&server, json!(9), "ping", Value::Null).await;
    assert_eq!(body["result"], json!({}));
}

#[tokio::test]
async fn tools_list_describes_sum() {
    let server = build_test_app();
    let body = rpc(&server, json!(1), "tools/list", json!({})).await;

    let tools = body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "sum");
    assert_eq!(tools[0]["description"], "Add two numbers");

    let schema = &tools[0]["inputSchema"];
    assert_eq!(schema["properties"]["a"]["type"], "integer");
    assert_eq!(schema["required"], json!(["a", "b"]));
}

#[tokio::test]
async fn tools_call_sum() {
    let server = build_test_app();
    let body = rpc(
        &server,
        json!("call-1"),
        "tools/call",
        json!({ "name": "sum", "arguments": { "a": 2, "b": 3 } }),
    )
    .await;

    assert_eq!(body["id"], "call-1");
    assert_eq!(body["result"]["isError"], false);
    assert_eq!(body["result"]["structuredContent"]["result"], 5);
    assert_eq!(body["result"]["content"][0]["text"], "5");
}

#[tokio::test]
async fn tools_call_validation_error() {
    let server = build_test_app();
    let body = rpc(
        &server,
        json!(2),
        "tools/call",
        json!({ "name": "sum", "arguments": { "a": "x" } }),
    )
    .await;

    assert_eq!(body["error"]["code"], -32602);
    assert_eq!(body["error"]["data"]["kind"], "validation");
}

#[tokio::test]
async fn tools_call_unknown_tool() {
    let server = build_test_app();
    let body = rpc(&server, json!(3), "tools/call", json!({ "name": "multiply" })).await;

    assert_eq!(body["error"]["code"], -32602);
    assert_eq!(body["error"]["data"]["kind"], "unknown_tool");
}

#[tokio::test]
async fn handler_failure_is_reported_in_band() {
    let server = build_test_app();
    let body = rpc(
        &server,
        json!(4),
        "tools/call",
        json!({ "name": "sum", "arguments": { "a": i64::MAX, "b": 1 } }),
    )
    .await;

    assert!(body.get("error").is_none());
    assert_eq!(body["result"]["isError"], true);
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("overflows"), "{text}");
}

#[tokio::test]
async fn resource_templates_list() {
    let server = build_test_app();
    let body = rpc(&server, json!(5), "resources/templates/list", json!({})).await;

    let templates = body["result"]["resourceTemplates"].as_array().unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0]["uriTemplate"], "greeting://{name}");
    assert_eq!(templates[0]["name"], "get_greeting");
}

#[tokio::test]
async fn read_greeting() {
    let server = build_test_app();
    let body = rpc(&server, json!(6), "resources/read", json!({ "uri": "greeting://World" })).await;

    let contents = &body["result"]["contents"][0];
    assert_eq!(contents["uri"], "greeting://World");
    assert_eq!(contents["text"], "Hello, World!");
}

#[tokio::test]
async fn read_unknown_resource() {
    let server = build_test_app();
    let body = rpc(&server, json!(7), "resources/read", json!({ "uri": "weather://today" })).await;

    assert_eq!(body["error"]["code"], -32002);
    assert_eq!(body["error"]["data"]["uri"], "weather://today");
}

#[tokio::test]
async fn unknown_method() {
    let server = build_test_app();
    let body = rpc(&server, json!(1), "nonexistent/method", json!({})).await;
    assert_eq!(body["error"]["code"], -32601);
}

#[tokio::test]
async fn notification_is_accepted_without_body() {
    let server = build_test_app();
    let resp = server
        .post("/mcp")
        .json(&json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
        .await;

    resp.assert_status(StatusCode::ACCEPTED);
}

#[tokio::test]
async fn malformed_body_is_a_parse_error() {
    let server = build_test_app();
    let resp = server.post("/mcp").text("{oops").await;

    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], -32700);
    assert!(body["id"].is_null());
}

#[tokio::test]
async fn messages_for_unknown_session_are_rejected() {
    let server = build_test_app();
    let request = json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" });

    server
        .post("/messages")
        .add_query_param("session_id", "6f2a3c1e-0d4b-4b6a-9a51-3c2d8e7f1a90")
        .json(&request)
        .await
        .assert_status_not_found();

    server
        .post("/messages")
        .add_query_param("session_id", "not-a-uuid")
        .json(&request)
        .await
        .assert_status_bad_request();
}
