use serde_json::Value;

use toolbridge_core::{ToolCallRequest, ToolOutcome, ToolTransport};

pub async fn list_tools(transport: &dyn ToolTransport) -> anyhow::Result<()> {
    for tool in transport.list_tools().await? {
        println!("{} - {}", tool.name, tool.description);
        for param in &tool.params {
            let ty = param.ty.schema_type().unwrap_or("any");
            let required = if param.required { "" } else { " (optional)" };
            println!("    {}: {ty}{required}", param.name);
        }
    }
    Ok(())
}

/// Call `tool` with `arguments` (a JSON object) and print the output.
pub async fn call(transport: &dyn ToolTransport, tool: &str, arguments: &str) -> anyhow::Result<()> {
    let arguments = match serde_json::from_str::<Value>(arguments)? {
        Value::Object(map) => map,
        other => anyhow::bail!("Arguments must be a JSON object, got {other}"),
    };

    let result = transport
        .call_tool(&ToolCallRequest::new(tool, arguments))
        .await?;
    match result.outcome {
        ToolOutcome::Output(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        ToolOutcome::Error(err) => anyhow::bail!("{tool} failed: {err}"),
    }
    Ok(())
}

pub async fn resources(transport: &dyn ToolTransport) -> anyhow::Result<()> {
    for template in transport.list_resource_templates().await? {
        println!(
            "{} ({}) - {}",
            template.uri_template, template.mime_type, template.description
        );
    }
    Ok(())
}

pub async fn read(transport: &dyn ToolTransport, uri: &str) -> anyhow::Result<()> {
    for contents in transport.read_resource(uri).await? {
        println!("{}", contents.text);
    }
    Ok(())
}
