//! Tool Registry
//!
//! Local functions the analytical backend may call during a turn. The
//! registry is built once and handed to the backend clients that enable
//! tools; providers translate [`ToolDefinition`]s into their wire format
//! and route calls back through [`ToolRegistry::invoke`].

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::path::Path;
use tracing::{debug, warn};

/// Schema entry advertised to the backend
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// A callable local function. Failures are reported in the returned text
/// so the model can read them.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema of the argument object
    fn parameters(&self) -> Value;

    async fn call(&self, args: &Value) -> String;
}

/// Ordered set of tools keyed by name
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `echo_message`, `analyze_message` and `get_file_content`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(EchoTool);
        registry.register(AnalyzeMessageTool);
        registry.register(FileContentTool);
        registry
    }

    /// Add a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(Box::new(tool));
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name(),
                description: t.description(),
                parameters: t.parameters(),
            })
            .collect()
    }

    /// Run a tool by name. Unknown names produce an error text, not a failure.
    pub async fn invoke(&self, name: &str, args: &Value) -> String {
        match self.tools.iter().find(|t| t.name() == name) {
            Some(tool) => {
                debug!("Invoking tool '{}'", name);
                tool.call(args).await
            }
            None => {
                warn!("Backend requested unknown tool '{}'", name);
                format!("Error: unknown tool '{}'", name)
            }
        }
    }
}

fn string_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn single_string_schema(key: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            key: { "type": "string", "description": description }
        },
        "required": [key]
    })
}

// =============================================================================
// Built-in Tools
// =============================================================================

/// Returns the message prefixed with `[ECHO]`
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &'static str {
        "echo_message"
    }

    fn description(&self) -> &'static str {
        "Returns the received message prefixed with [ECHO]. Useful for testing communication."
    }

    fn parameters(&self) -> Value {
        single_string_schema("message", "The message to return")
    }

    async fn call(&self, args: &Value) -> String {
        format!("[ECHO] {}", string_arg(args, "message").unwrap_or_default())
    }
}

/// Word and character statistics for a message
pub struct AnalyzeMessageTool;

impl AnalyzeMessageTool {
    pub fn analyze(message: &str) -> String {
        if message.trim().is_empty() {
            return "Error: message is empty.".to_string();
        }

        let words = message
            .split([' ', '\t', '\n', '\r'])
            .filter(|w| !w.is_empty())
            .count();
        let chars = message.chars().count();
        let chars_no_spaces = message.chars().filter(|c| *c != ' ').count();

        format!(
            "Message analysis:\n- Words: {}\n- Characters (with spaces): {}\n- Characters (without spaces): {}",
            words, chars, chars_no_spaces
        )
    }
}

#[async_trait]
impl Tool for AnalyzeMessageTool {
    fn name(&self) -> &'static str {
        "analyze_message"
    }

    fn description(&self) -> &'static str {
        "Analyzes a message and returns statistics such as word count and character count."
    }

    fn parameters(&self) -> Value {
        single_string_schema("message", "The message to analyze")
    }

    async fn call(&self, args: &Value) -> String {
        Self::analyze(string_arg(args, "message").unwrap_or_default())
    }
}

/// Reads a local text file
pub struct FileContentTool;

#[async_trait]
impl Tool for FileContentTool {
    fn name(&self) -> &'static str {
        "get_file_content"
    }

    fn description(&self) -> &'static str {
        "Reads and returns the content of a local file. Useful for document analysis."
    }

    fn parameters(&self) -> Value {
        single_string_schema("file_path", "Full path to the file")
    }

    async fn call(&self, args: &Value) -> String {
        let path = string_arg(args, "file_path").unwrap_or_default();
        if !Path::new(path).is_file() {
            return format!("Error: file not found at {}", path);
        }

        match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => format!("Error reading file: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_echo() {
        let registry = ToolRegistry::with_defaults();
        let out = registry
            .invoke("echo_message", &json!({ "message": "hallo" }))
            .await;
        assert_eq!(out, "[ECHO] hallo");
    }

    #[test]
    fn test_analyze_counts() {
        let out = AnalyzeMessageTool::analyze("eins zwei\r\ndrei");
        assert!(out.contains("- Words: 3"));
        assert!(out.contains("- Characters (with spaces): 15"));
        assert!(out.contains("- Characters (without spaces): 14"));
    }

    #[test]
    fn test_analyze_blank_is_error() {
        assert_eq!(AnalyzeMessageTool::analyze(" \t\n"), "Error: message is empty.");
    }

    #[tokio::test]
    async fn test_file_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("note.txt");
        std::fs::write(&path, "inhalt").unwrap();

        let registry = ToolRegistry::with_defaults();
        let out = registry
            .invoke(
                "get_file_content",
                &json!({ "file_path": path.to_string_lossy() }),
            )
            .await;
        assert_eq!(out, "inhalt");

        let missing = registry
            .invoke("get_file_content", &json!({ "file_path": "/no/such/file" }))
            .await;
        assert!(missing.starts_with("Error: file not found"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::with_defaults();
        let out = registry.invoke("format_disk", &json!({})).await;
        assert_eq!(out, "Error: unknown tool 'format_disk'");
    }

    #[test]
    fn test_definitions_and_replace() {
        let mut registry = ToolRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec!["echo_message", "analyze_message", "get_file_content"]
        );
        registry.register(EchoTool);
        assert_eq!(registry.definitions().len(), 3);
        assert_eq!(registry.names().last(), Some(&"echo_message"));
        assert_eq!(
            registry.definitions()[0].parameters["required"][0],
            "message"
        );
    }
}
