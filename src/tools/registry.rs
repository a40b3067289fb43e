//! Tool registry and discovery

use std::collections::HashMap;
use std::sync::Arc;

use super::Tool;
use super::{search, visit, weather};
use crate::Result;
use crate::config::ToolsConfig;
use crate::llm::ToolFunction;

/// A provider of tools, loaded during discovery
pub trait ToolSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Build the tools this source provides
    ///
    /// # Errors
    ///
    /// Returns error if the source cannot be loaded
    fn load(&self) -> Result<Vec<Tool>>;
}

/// Tool source backed by a closure
pub struct FnSource<F> {
    name: String,
    load: F,
}

impl<F> FnSource<F>
where
    F: Fn() -> Result<Vec<Tool>> + Send + Sync,
{
    pub fn new(name: impl Into<String>, load: F) -> Self {
        Self {
            name: name.into(),
            load,
        }
    }
}

impl<F> ToolSource for FnSource<F>
where
    F: Fn() -> Result<Vec<Tool>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Vec<Tool>> {
        (self.load)()
    }
}

/// Sources for the built-in tools
#[must_use]
pub fn builtin_sources(config: &ToolsConfig) -> Vec<Box<dyn ToolSource>> {
    let timeout = config.timeout;
    let brave_token = config.brave_api_token.clone();

    vec![
        Box::new(FnSource::new("weather", move || {
            Ok(vec![weather::tool(timeout)?])
        })),
        Box::new(FnSource::new("search", move || {
            Ok(vec![search::tool(brave_token.clone(), timeout)?])
        })),
        Box::new(FnSource::new("visit", move || Ok(vec![visit::tool(timeout)?]))),
    ]
}

/// Registry of available tools, keyed by unique name
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with the built-in tools
    #[must_use]
    pub fn with_builtins(config: &ToolsConfig) -> Self {
        let mut registry = Self::new();
        let count = registry.discover(&builtin_sources(config));
        tracing::info!(count, "built-in tools registered");
        registry
    }

    /// Register a tool; an existing tool with the same name is replaced
    pub fn register(&mut self, tool: Tool) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Arc::new(tool)).is_some() {
            tracing::debug!(tool = %name, "replaced existing tool registration");
        } else {
            tracing::debug!(tool = %name, "registered tool");
        }
    }

    /// Look up a tool by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Tool>> {
        self.tools.get(name).cloned()
    }

    /// Copy of the name-to-tool mapping
    #[must_use]
    pub fn get_all(&self) -> HashMap<String, Arc<Tool>> {
        self.tools.clone()
    }

    /// Schemas of all tools, sorted by name
    #[must_use]
    pub fn schemas(&self) -> Vec<ToolFunction> {
        let mut schemas: Vec<ToolFunction> = self.tools.values().map(|t| t.to_schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Sorted tool names
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Load and register tools from each source
    ///
    /// A source that fails to load is logged and skipped. Returns the number
    /// of tools registered.
    pub fn discover(&mut self, sources: &[Box<dyn ToolSource>]) -> usize {
        let mut count = 0;
        for source in sources {
            match source.load() {
                Ok(tools) => {
                    tracing::debug!(source = source.name(), tools = tools.len(), "loaded tool source");
                    for tool in tools {
                        self.register(tool);
                        count += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "failed to load tool source");
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::tools::{ParamType, ToolArgs, ToolParam};

    fn constant(name: &str, reply: &'static str) -> Tool {
        Tool::from_fn(name, format!("Returns {reply}"), Vec::new(), move |_| {
            Ok(reply.to_string())
        })
    }

    #[tokio::test]
    async fn test_register_last_wins() {
        let mut registry = ToolRegistry::new();
        registry.register(constant("greet", "hello"));
        registry.register(constant("greet", "bonjour"));

        assert_eq!(registry.len(), 1);
        let tool = registry.get("greet").unwrap();
        assert_eq!(tool.invoke(ToolArgs::default()).await.unwrap(), "bonjour");
    }

    #[test]
    fn test_get_all_is_a_copy() {
        let mut registry = ToolRegistry::new();
        registry.register(constant("a", "1"));

        let mut all = registry.get_all();
        all.remove("a");
        all.insert("b".to_string(), Arc::new(constant("b", "2")));

        assert!(registry.get("a").is_some());
        assert!(registry.get("b").is_none());
    }

    #[test]
    fn test_schemas_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(constant("zeta", "z"));
        registry.register(Tool::from_fn(
            "alpha",
            "First",
            vec![ToolParam::required("q", ParamType::String)],
            |_| Ok(String::new()),
        ));

        let names: Vec<String> = registry.schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_discover_skips_failing_sources() {
        let sources: Vec<Box<dyn ToolSource>> = vec![
            Box::new(FnSource::new("broken", || {
                Err(Error::Config("missing dependency".to_string()))
            })),
            Box::new(FnSource::new("good", || {
                Ok(vec![constant("one", "1"), constant("two", "2")])
            })),
        ];

        let mut registry = ToolRegistry::new();
        assert_eq!(registry.discover(&sources), 2);
        assert_eq!(registry.names(), vec!["one", "two"]);
    }

    #[test]
    fn test_with_builtins() {
        let registry = ToolRegistry::with_builtins(&ToolsConfig::default());
        assert_eq!(registry.names(), vec!["brave_search", "get_weather", "visit_url"]);
    }
}
