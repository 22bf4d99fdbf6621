use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Named tool arguments, in the order the caller supplied them.
pub type Arguments = serde_json::Map<String, Value>;

/// Unique identifier for a transport or agent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Primitive parameter types understood by schema validation.
///
/// `Raw` covers schemas without a `type` (or with one we don't know); any
/// value is accepted for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Raw,
}

impl ParamType {
    /// JSON-schema `type` keyword for this parameter, if any.
    #[must_use]
    pub fn schema_type(self) -> Option<&'static str> {
        match self {
            Self::String => Some("string"),
            Self::Integer => Some("integer"),
            Self::Number => Some("number"),
            Self::Boolean => Some("boolean"),
            Self::Array => Some("array"),
            Self::Object => Some("object"),
            Self::Raw => None,
        }
    }

    /// Read the type out of a JSON-schema property. Union types such as
    /// `["integer", "null"]` or an `anyOf` of alternatives resolve to their
    /// first non-null member.
    #[must_use]
    pub fn from_schema(property: &Value) -> Self {
        let name = match property.get("type") {
            Some(Value::String(name)) => Some(name.as_str()),
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .find(|name| *name != "null"),
            _ => None,
        };
        if name.is_none() {
            let alternatives = property
                .get("anyOf")
                .or_else(|| property.get("oneOf"))
                .and_then(Value::as_array);
            if let Some(alternatives) = alternatives {
                return alternatives
                    .iter()
                    .map(Self::from_schema)
                    .find(|ty| *ty != Self::Raw)
                    .unwrap_or(Self::Raw);
            }
        }

        match name {
            Some("string") => Self::String,
            Some("integer") => Self::Integer,
            Some("number") => Self::Number,
            Some("boolean") => Self::Boolean,
            Some("array") => Self::Array,
            Some("object") => Self::Object,
            _ => Self::Raw,
        }
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Machine-readable description of a tool exposed by a registry.
///
/// On the wire this is the MCP tool shape: `name`, `description` and a JSON
/// schema under `inputSchema`. `params` is a flattened view of that schema
/// used for validation and listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireDescriptor", try_from = "WireDescriptor")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    /// Input schema exactly as a server advertised it. `None` for
    /// descriptors built locally, whose schema is derived from `params`.
    pub schema: Option<Value>,
}

impl ToolDescriptor {
    /// JSON schema for this tool's input: the advertised one verbatim when
    /// there is one, otherwise built from `params`.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        if let Some(schema) = &self.schema {
            return schema.clone();
        }

        let mut properties = serde_json::Map::new();
        for param in &self.params {
            let mut property = serde_json::Map::new();
            if let Some(ty) = param.ty.schema_type() {
                property.insert("type".to_string(), Value::from(ty));
            }
            if let Some(description) = &param.description {
                property.insert("description".to_string(), Value::from(description.as_str()));
            }
            properties.insert(param.name.clone(), Value::Object(property));
        }

        let required: Vec<Value> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| Value::from(p.name.as_str()))
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Look up a declared parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

#[derive(Serialize, Deserialize)]
struct WireDescriptor {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "inputSchema", default)]
    input_schema: Value,
}

impl From<ToolDescriptor> for WireDescriptor {
    fn from(descriptor: ToolDescriptor) -> Self {
        Self {
            input_schema: descriptor.input_schema(),
            name: descriptor.name,
            description: descriptor.description,
        }
    }
}

impl TryFrom<WireDescriptor> for ToolDescriptor {
    type Error = String;

    fn try_from(wire: WireDescriptor) -> Result<Self, Self::Error> {
        let required: Vec<&str> = wire
            .input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let params = match wire.input_schema.get("properties") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(properties)) => properties
                .iter()
                .map(|(name, property)| ParamSpec {
                    name: name.clone(),
                    ty: ParamType::from_schema(property),
                    required: required.contains(&name.as_str()),
                    description: property
                        .get("description")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
                .collect(),
            Some(other) => {
                return Err(format!(
                    "tool '{}': inputSchema.properties must be an object, got {other}",
                    wire.name
                ))
            }
        };

        let schema = (!wire.input_schema.is_null()).then_some(wire.input_schema);
        Ok(Self {
            name: wire.name,
            description: wire.description,
            params,
            schema,
        })
    }
}

/// A request to run one tool, chosen by the decision loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub tool: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl ToolCallRequest {
    /// Create a request with a freshly generated call id.
    #[must_use]
    pub fn new(tool: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            tool: tool.into(),
            arguments,
        }
    }

    /// Replace the call id, e.g. with one assigned by the model.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Category of a recoverable tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    UnknownTool,
    Validation,
    Handler,
}

/// Error descriptor returned in place of a tool's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            ToolErrorKind::UnknownTool => "unknown tool",
            ToolErrorKind::Validation => "validation error",
            ToolErrorKind::Handler => "handler error",
        };
        write!(f, "{kind}: {}", self.message)
    }
}

/// What a tool invocation produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Output(Value),
    Error(ToolError),
}

impl ToolOutcome {
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Render the outcome as text for a model or a console.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Output(Value::String(text)) => text.clone(),
            Self::Output(value) => value.to_string(),
            Self::Error(err) => format!("Error: {err}"),
        }
    }
}

/// Result of one tool invocation, matched to its request by call id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub call_id: String,
    pub tool: String,
    pub outcome: ToolOutcome,
}

impl ToolCallResult {
    #[must_use]
    pub fn output(request: &ToolCallRequest, value: Value) -> Self {
        Self {
            call_id: request.id.clone(),
            tool: request.tool.clone(),
            outcome: ToolOutcome::Output(value),
        }
    }

    #[must_use]
    pub fn failed(request: &ToolCallRequest, error: ToolError) -> Self {
        Self {
            call_id: request.id.clone(),
            tool: request.tool.clone(),
            outcome: ToolOutcome::Error(error),
        }
    }
}

/// Parameterised resource advertised by a server, e.g. `greeting://{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTemplate {
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "mimeType", default = "default_mime_type")]
    pub mime_type: String,
}

/// Text body of a resource read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceContents {
    pub uri: String,
    #[serde(rename = "mimeType", default = "default_mime_type")]
    pub mime_type: String,
    pub text: String,
}

fn default_mime_type() -> String {
    "text/plain".to_string()
}

/// What the decision loop wants to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    CallTool(ToolCallRequest),
    FinalAnswer(String),
}

/// Payload of a single conversation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EntryKind {
    User(String),
    ToolCall(ToolCallRequest),
    ToolResult(ToolCallResult),
    Assistant(String),
    /// Turn-level failure or cancellation, surfaced in the conversation.
    Notice(String),
}

/// A timestamped conversation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EntryKind,
}

/// Ordered history of one agent session.
///
/// Entries can only be appended; there is no way to edit or remove one.
#[derive(Debug, Default, Serialize)]
pub struct ConversationContext {
    entries: Vec<ConversationEntry>,
}

impl ConversationContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current time.
    pub fn append(&mut self, kind: EntryKind) -> &ConversationEntry {
        self.entries.push(ConversationEntry {
            recorded_at: Utc::now(),
            kind,
        });
        &self.entries[self.entries.len() - 1]
    }

    #[must_use]
    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntryKind> {
        self.entries.iter().map(|e| &e.kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the result recorded for a call id, if it has one.
    #[must_use]
    pub fn result_for(&self, call_id: &str) -> Option<&ToolCallResult> {
        self.iter().find_map(|kind| match kind {
            EntryKind::ToolResult(result) if result.call_id == call_id => Some(result),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "sum".to_string(),
            description: "Add two numbers".to_string(),
            params: vec![
                ParamSpec {
                    name: "a".to_string(),
                    ty: ParamType::Integer,
                    required: true,
                    description: None,
                },
                ParamSpec {
                    name: "b".to_string(),
                    ty: ParamType::Integer,
                    required: true,
                    description: None,
                },
            ],
            schema: None,
        }
    }

    #[test]
    fn session_id_roundtrip() {
        let id = SessionId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
        assert_eq!(id.to_string().parse::<SessionId>().unwrap(), id);
    }

    #[test]
    fn descriptor_serializes_as_mcp_tool() {
        let json = serde_json::to_value(sum_descriptor()).unwrap();
        assert_eq!(json["name"], "sum");
        assert_eq!(json["inputSchema"]["type"], "object");
        assert_eq!(json["inputSchema"]["properties"]["a"]["type"], "integer");
        assert_eq!(json["inputSchema"]["required"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn descriptor_keeps_property_order() {
        let json = r#"{
            "name": "greet",
            "description": "",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "zeta": {"type": "string"},
                    "alpha": {"type": "boolean"}
                },
                "required": ["zeta"]
            }
        }"#;
        let descriptor: ToolDescriptor = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = descriptor.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert!(descriptor.param("zeta").unwrap().required);
        assert!(!descriptor.param("alpha").unwrap().required);
    }

    #[test]
    fn unknown_schema_types_fall_back_to_raw() {
        let json = r#"{
            "name": "odd",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "when": {"type": "date-time"},
                    "anything": {},
                    "maybe": {"type": ["null", "integer"]}
                }
            }
        }"#;
        let descriptor: ToolDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.param("when").unwrap().ty, ParamType::Raw);
        assert_eq!(descriptor.param("anything").unwrap().ty, ParamType::Raw);
        assert_eq!(descriptor.param("maybe").unwrap().ty, ParamType::Integer);
        assert_eq!(descriptor.description, "");
    }

    #[test]
    fn advertised_schema_survives_a_round_trip() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "tags": {"type": "array", "items": {"type": "string"}},
                "mode": {"type": "string", "enum": ["fast", "full"]},
                "limit": {"anyOf": [{"type": "integer"}, {"type": "null"}], "default": 10},
                "filter": {
                    "type": "object",
                    "properties": {"since": {"type": "string", "format": "date"}}
                }
            },
            "required": ["tags"],
            "additionalProperties": false
        });
        let wire = serde_json::json!({"name": "search", "description": "Search", "inputSchema": schema});

        let descriptor: ToolDescriptor = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(descriptor.input_schema(), schema);
        assert_eq!(serde_json::to_value(&descriptor).unwrap(), wire);

        assert_eq!(descriptor.param("tags").unwrap().ty, ParamType::Array);
        assert_eq!(descriptor.param("limit").unwrap().ty, ParamType::Integer);
        assert!(!descriptor.param("limit").unwrap().required);
    }

    #[test]
    fn descriptor_without_schema_has_no_params() {
        let descriptor: ToolDescriptor = serde_json::from_str(r#"{"name": "ping"}"#).unwrap();
        assert!(descriptor.params.is_empty());
        assert!(descriptor.schema.is_none());
        assert_eq!(descriptor.input_schema()["type"], "object");
    }

    #[test]
    fn descriptor_rejects_non_object_properties() {
        let json = r#"{"name": "bad", "inputSchema": {"properties": [1, 2]}}"#;
        assert!(serde_json::from_str::<ToolDescriptor>(json).is_err());
    }

    #[test]
    fn tool_outcome_wire_shape() {
        let request = ToolCallRequest::new("sum", Arguments::new());
        let ok = ToolCallResult::output(&request, serde_json::json!(5));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["outcome"]["output"], 5);

        let failed = ToolCallResult::failed(
            &request,
            ToolError {
                kind: ToolErrorKind::Validation,
                message: "bad".to_string(),
            },
        );
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["outcome"]["error"]["kind"], "validation");
        assert!(failed.outcome.is_error());
    }

    #[test]
    fn call_ids_are_unique() {
        let a = ToolCallRequest::new("sum", Arguments::new());
        let b = ToolCallRequest::new("sum", Arguments::new());
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("call_"));
    }

    #[test]
    fn context_is_ordered_and_finds_results() {
        let mut context = ConversationContext::new();
        let request = ToolCallRequest::new("sum", Arguments::new());
        context.append(EntryKind::User("add 2 and 3".to_string()));
        context.append(EntryKind::ToolCall(request.clone()));
        context.append(EntryKind::ToolResult(ToolCallResult::output(
            &request,
            serde_json::json!(5),
        )));

        assert_eq!(context.len(), 3);
        assert!(matches!(context.entries()[0].kind, EntryKind::User(_)));
        assert_eq!(
            context.result_for(&request.id).unwrap().outcome,
            ToolOutcome::Output(serde_json::json!(5))
        );
        assert!(context.result_for("call_missing").is_none());
    }

    #[test]
    fn entry_serialization() {
        let mut context = ConversationContext::new();
        context.append(EntryKind::Notice("turn cancelled".to_string()));
        let json = serde_json::to_value(&context.entries()[0]).unwrap();
        assert_eq!(json["type"], "notice");
        assert_eq!(json["data"], "turn cancelled");
        assert!(json.get("recorded_at").is_some());
    }
}
