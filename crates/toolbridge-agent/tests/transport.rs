use std::sync::Arc;

use serde_json::{json, Value};

use toolbridge_agent::transport::{self, TransportKind};
use toolbridge_agent::{events, AgentEvent, BridgeConfig, EventSink, Session};
use toolbridge_core::{
    Decision, Error, ToolCallRequest, ToolErrorKind, ToolOutcome, ToolTransport,
};
use toolbridge_server::app_state::AppState;

mod mocks;
use mocks::{call, ScriptedLoop};

async fn spawn_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let state = AppState::new(Arc::new(toolbridge_server::demo::server().unwrap()));
    let app = toolbridge_server::router::create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

fn args(value: Value) -> toolbridge_core::Arguments {
    value.as_object().cloned().unwrap()
}

async fn exercise(transport: &dyn ToolTransport) {
    let tools = transport.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "sum");
    assert_eq!(tools[0].params.len(), 2);

    let request = ToolCallRequest::new("sum", args(json!({"a": 2, "b": 3})));
    let result = transport.call_tool(&request).await.unwrap();
    assert_eq!(result.call_id, request.id);
    assert_eq!(result.outcome, ToolOutcome::Output(json!(5)));

    let request = ToolCallRequest::new("sum", args(json!({"a": 2})));
    let result = transport.call_tool(&request).await.unwrap();
    match result.outcome {
        ToolOutcome::Error(err) => {
            assert_eq!(err.kind, ToolErrorKind::Validation);
            assert!(err.message.contains("'b'"), "{}", err.message);
        }
        ToolOutcome::Output(value) => panic!("unexpected output {value}"),
    }

    let request = ToolCallRequest::new("divide", args(json!({})));
    let result = transport.call_tool(&request).await.unwrap();
    assert!(matches!(
        result.outcome,
        ToolOutcome::Error(ref err) if err.kind == ToolErrorKind::UnknownTool
    ));

    let templates = transport.list_resource_templates().await.unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].uri_template, "greeting://{name}");

    let contents = transport.read_resource("greeting://Ada").await.unwrap();
    assert_eq!(contents[0].text, "Hello, Ada!");
    assert_eq!(contents[0].uri, "greeting://Ada");

    let err = transport.read_resource("weather://today").await.unwrap_err();
    assert!(matches!(err, Error::UnknownResource(_)));
}

#[tokio::test]
async fn http_transport_end_to_end() {
    let base = spawn_server().await;
    let transport = transport::connect(TransportKind::Http, &base).await.unwrap();
    exercise(transport.as_ref()).await;
}

#[tokio::test]
async fn sse_transport_end_to_end() {
    let base = spawn_server().await;
    let transport = transport::connect(TransportKind::Sse, &base).await.unwrap();
    exercise(transport.as_ref()).await;
}

#[tokio::test]
async fn sse_transport_handles_concurrent_requests() {
    let base = spawn_server().await;
    let transport = transport::connect(TransportKind::Sse, &base).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                let request = ToolCallRequest::new("sum", args(json!({"a": n, "b": 1})));
                transport.call_tool(&request).await.unwrap().outcome
            })
        })
        .collect();

    for (n, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), ToolOutcome::Output(json!(n + 1)));
    }
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = transport::connect(TransportKind::Http, &format!("http://{addr}"))
        .await
        .err().unwrap();
    assert!(err.is_transport(), "{err}");
}

#[tokio::test]
async fn session_over_sse() {
    let base = spawn_server().await;
    let transport = transport::connect(TransportKind::Sse, &base).await.unwrap();

    let decider = Arc::new(ScriptedLoop::new([
        call("sum", json!({"a": "40", "b": 2})),
        Decision::FinalAnswer("42".to_string()),
    ]));
    let (sink, mut rx) = events::channel(BridgeConfig::default().event_buffer);
    let mut session = Session::connect(transport, decider, BridgeConfig::default(), sink)
        .await
        .unwrap();

    assert_eq!(session.send("what is 40 + 2?").await.unwrap(), "42");
    assert_eq!(session.context().len(), 4);

    assert!(matches!(rx.recv().await.unwrap(), AgentEvent::ToolCallStarted { .. }));
    match rx.recv().await.unwrap() {
        AgentEvent::ToolCallFinished { outcome, .. } => {
            assert_eq!(outcome, ToolOutcome::Output(json!(42)));
        }
        other => panic!("unexpected event {other:?}"),
    }

    session.close();
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn session_without_observer() {
    let base = spawn_server().await;
    let transport = transport::connect(TransportKind::Http, &base).await.unwrap();

    let mut session = Session::connect(
        transport,
        Arc::new(ScriptedLoop::default()),
        BridgeConfig::default(),
        EventSink::disabled(),
    )
    .await
    .unwrap();
    assert_eq!(session.send("hi").await.unwrap(), "done");
}
