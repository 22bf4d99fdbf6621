//! The two demo operations: `sum` and the `greeting://{name}` resource.

use serde_json::Value;

use toolbridge_core::{Arguments, Error, ParamType, ResourceTemplate};
use toolbridge_mcp::{McpServer, ToolBuilder};

pub const SERVER_NAME: &str = "Demo";

/// Build the demo server with its tool and resource registered.
pub fn server() -> Result<McpServer, Error> {
    let server = McpServer::new(SERVER_NAME);

    server.tools().register(
        ToolBuilder::new("sum", "Add two numbers")
            .param("a", ParamType::Integer, "First addend")
            .param("b", ParamType::Integer, "Second addend")
            .build(),
        sum,
    )?;

    server.resources().register_template(
        ResourceTemplate {
            uri_template: "greeting://{name}".to_string(),
            name: "get_greeting".to_string(),
            description: "Get a personalized greeting".to_string(),
            mime_type: "text/plain".to_string(),
        },
        |vars| {
            let name = vars.get("name").ok_or("Missing 'name' in URI")?;
            Ok(format!("Hello, {name}!"))
        },
    )?;

    Ok(server)
}

fn sum(args: &Arguments) -> Result<Value, String> {
    let a = args
        .get("a")
        .and_then(Value::as_i64)
        .ok_or("Missing 'a' parameter")?;
    let b = args
        .get("b")
        .and_then(Value::as_i64)
        .ok_or("Missing 'b' parameter")?;

    a.checked_add(b)
        .map(Value::from)
        .ok_or_else(|| format!("{a} + {b} overflows a 64-bit integer"))
}
