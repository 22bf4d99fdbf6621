use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use toolbridge_core::{Arguments, Error, ParamSpec, ParamType, ToolDescriptor};

use crate::validate::validate;

/// Executable body of a tool. Errors are plain messages; the registry wraps
/// them as [`Error::Handler`].
pub type ToolHandler = Arc<dyn Fn(&Arguments) -> Result<Value, String> + Send + Sync>;

struct RegisteredTool {
    descriptor: Arc<ToolDescriptor>,
    handler: ToolHandler,
}

/// Registry of tools exposed over MCP.
///
/// Safe to share between sessions. The lock is only held for lookups, never
/// while a handler runs.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<Vec<RegisteredTool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails with [`Error::DuplicateName`] if the name is
    /// taken, leaving the registry unchanged.
    pub fn register<F>(&self, descriptor: ToolDescriptor, handler: F) -> Result<(), Error>
    where
        F: Fn(&Arguments) -> Result<Value, String> + Send + Sync + 'static,
    {
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        if tools.iter().any(|t| t.descriptor.name == descriptor.name) {
            return Err(Error::DuplicateName(descriptor.name));
        }

        tracing::debug!(tool = %descriptor.name, "registered tool");
        tools.push(RegisteredTool {
            descriptor: Arc::new(descriptor),
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Return the tool descriptors in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<ToolDescriptor> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        tools.iter().map(|t| (*t.descriptor).clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate `arguments` against the tool's schema and run its handler.
    pub fn invoke(&self, name: &str, arguments: &Arguments) -> Result<Value, Error> {
        let (descriptor, handler) = {
            let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
            let tool = tools
                .iter()
                .find(|t| t.descriptor.name == name)
                .ok_or_else(|| Error::UnknownTool(name.to_string()))?;
            (Arc::clone(&tool.descriptor), Arc::clone(&tool.handler))
        };

        let arguments = validate(&descriptor, arguments).map_err(|reason| Error::Validation {
            tool: name.to_string(),
            reason,
        })?;

        tracing::debug!(tool = name, "invoking tool");
        handler(&arguments).map_err(|message| {
            tracing::warn!(tool = name, %message, "tool handler failed");
            Error::Handler {
                tool: name.to_string(),
                message,
            }
        })
    }
}

/// Builder for [`ToolDescriptor`]s.
#[derive(Debug)]
pub struct ToolBuilder {
    descriptor: ToolDescriptor,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: name.into(),
                description: description.into(),
                params: Vec::new(),
                schema: None,
            },
        }
    }

    /// Add a required parameter.
    #[must_use]
    pub fn param(self, name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        self.push(name.into(), ty, true, description.into())
    }

    /// Add an optional parameter.
    #[must_use]
    pub fn optional(
        self,
        name: impl Into<String>,
        ty: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.push(name.into(), ty, false, description.into())
    }

    fn push(mut self, name: String, ty: ParamType, required: bool, description: String) -> Self {
        self.descriptor.params.push(ParamSpec {
            name,
            ty,
            required,
            description: (!description.is_empty()).then_some(description),
        });
        self
    }

    #[must_use]
    pub fn build(self) -> ToolDescriptor {
        self.descriptor
    }
}
