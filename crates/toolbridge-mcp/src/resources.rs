use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use toolbridge_core::{Error, ResourceContents, ResourceTemplate};

/// Produces the text of a templated resource from the captured URI variables.
pub type ResourceHandler =
    Arc<dyn Fn(&HashMap<String, String>) -> Result<String, String> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Var(String),
}

/// Parsed form of a URI template such as `greeting://{name}`.
#[derive(Debug, Clone)]
struct UriPattern {
    parts: Vec<Part>,
}

impl UriPattern {
    fn parse(template: &str) -> Result<Self, String> {
        let mut parts = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                parts.push(Part::Literal(rest[..open].to_string()));
            }
            let close = rest[open..]
                .find('}')
                .map(|i| open + i)
                .ok_or_else(|| format!("unclosed '{{' in '{template}'"))?;
            let name = &rest[open + 1..close];
            if name.is_empty() || name.contains('{') {
                return Err(format!("bad variable name in '{template}'"));
            }
            if matches!(parts.last(), Some(Part::Var(_))) {
                return Err(format!("adjacent variables in '{template}'"));
            }
            parts.push(Part::Var(name.to_string()));
            rest = &rest[close + 1..];
        }
        if rest.contains('}') {
            return Err(format!("unmatched '}}' in '{template}'"));
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_string()));
        }

        Ok(Self { parts })
    }

    /// Match a concrete URI, capturing each variable. A variable matches one
    /// non-empty run of characters without `/`.
    fn captures(&self, uri: &str) -> Option<HashMap<String, String>> {
        let mut vars = HashMap::new();
        let mut rest = uri;
        let mut parts = self.parts.iter().peekable();

        while let Some(part) = parts.next() {
            match part {
                Part::Literal(literal) => rest = rest.strip_prefix(literal.as_str())?,
                Part::Var(name) => {
                    let end = match parts.peek() {
                        Some(Part::Literal(next)) => rest.find(next.as_str())?,
                        _ => rest.len(),
                    };
                    let value = &rest[..end];
                    if value.is_empty() || value.contains('/') {
                        return None;
                    }
                    vars.insert(name.clone(), value.to_string());
                    rest = &rest[end..];
                }
            }
        }

        rest.is_empty().then_some(vars)
    }
}

struct RegisteredTemplate {
    template: ResourceTemplate,
    pattern: UriPattern,
    handler: ResourceHandler,
}

/// Registry of templated, read-only resources.
#[derive(Default)]
pub struct ResourceRegistry {
    templates: RwLock<Vec<RegisteredTemplate>>,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource template.
    pub fn register_template<F>(&self, template: ResourceTemplate, handler: F) -> Result<(), Error>
    where
        F: Fn(&HashMap<String, String>) -> Result<String, String> + Send + Sync + 'static,
    {
        let pattern = UriPattern::parse(&template.uri_template).map_err(|reason| {
            Error::Validation {
                tool: template.name.clone(),
                reason,
            }
        })?;

        let mut templates = self.templates.write().unwrap_or_else(PoisonError::into_inner);
        if templates
            .iter()
            .any(|t| t.template.uri_template == template.uri_template)
        {
            return Err(Error::DuplicateName(template.uri_template));
        }

        tracing::debug!(uri_template = %template.uri_template, "registered resource template");
        templates.push(RegisteredTemplate {
            template,
            pattern,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Return the registered templates in registration order.
    #[must_use]
    pub fn templates(&self) -> Vec<ResourceTemplate> {
        let templates = self.templates.read().unwrap_or_else(PoisonError::into_inner);
        templates.iter().map(|t| t.template.clone()).collect()
    }

    /// Read a resource by concrete URI. The first matching template wins.
    pub fn read(&self, uri: &str) -> Result<ResourceContents, Error> {
        let (template, vars, handler) = {
            let templates = self.templates.read().unwrap_or_else(PoisonError::into_inner);
            templates
                .iter()
                .find_map(|t| {
                    t.pattern
                        .captures(uri)
                        .map(|vars| (t.template.clone(), vars, Arc::clone(&t.handler)))
                })
                .ok_or_else(|| Error::UnknownResource(uri.to_string()))?
        };

        let text = handler(&vars).map_err(|message| Error::Handler {
            tool: template.name.clone(),
            message,
        })?;

        Ok(ResourceContents {
            uri: uri.to_string(),
            mime_type: template.mime_type,
            text,
        })
    }
}
