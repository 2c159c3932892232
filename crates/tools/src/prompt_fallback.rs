//! Prompt-Based Tool Calling Fallback
//!
//! For providers without native tool calling (e.g. Ollama), tool descriptions
//! are injected into the system prompt and tool calls are parsed back out of
//! the reply text.
//!
//! Blocks are located by marker, then decoded with a streaming JSON reader
//! rather than by searching for the closing fence, because `write_file`
//! content routinely contains backticks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use appweaver_llm::types::ToolDefinition;

/// A tool call parsed from the LLM's text response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedToolCall {
    pub tool_name: String,
    pub arguments: Value,
    /// The raw text block that was parsed
    pub raw_text: String,
}

/// Build the prompt-based tool calling instructions for the system prompt.
pub fn build_tool_call_instructions(tools: &[ToolDefinition]) -> String {
    let mut tool_descriptions = String::new();

    for tool in tools {
        tool_descriptions.push_str(&format!("### {}\n{}\n", tool.name, tool.description));

        if let Some(properties) = tool.input_schema.properties.as_ref() {
            if !properties.is_empty() {
                tool_descriptions.push_str("Parameters:\n");
                let required = tool.input_schema.required.clone().unwrap_or_default();
                let mut names: Vec<&String> = properties.keys().collect();
                names.sort();
                for name in names {
                    let schema = &properties[name];
                    let marker = if required.contains(name) {
                        "required"
                    } else {
                        "optional"
                    };
                    tool_descriptions.push_str(&format!(
                        "  - `{}` ({}, {}): {}\n",
                        name,
                        schema.schema_type,
                        marker,
                        schema.description.as_deref().unwrap_or("")
                    ));
                }
            }
        }
        tool_descriptions.push('\n');
    }

    let example_tool = tools
        .first()
        .map(|t| t.name.as_str())
        .unwrap_or("write_file");

    format!(
        r#"## Tool Calling

You have access to the tools below. To call a tool, output a block in this EXACT format:

```tool_call
{{"tool": "{example_tool}", "arguments": {{"param1": "value1"}}}}
```

Rules:
- The block MUST start with ```tool_call and end with ```
- The JSON MUST be valid; escape newlines and quotes inside strings
- You may make several tool calls in one response
- After making tool calls, STOP and wait for the real results
- NEVER invent or describe tool results
- Only use tools from the list below

## Available Tools

{tool_descriptions}When you receive a tool result, decide whether more tool calls are needed."#,
        example_tool = example_tool,
        tool_descriptions = tool_descriptions,
    )
}

/// Parse tool calls from an LLM text response.
///
/// - Pass 1: `` ```tool_call {...} ``` `` fenced blocks
/// - Pass 2: `<tool_call>{...}</tool_call>` XML blocks
/// - Pass 3 (only if nothing matched): bare `{"tool": ..., "arguments": ...}` objects
pub fn parse_tool_calls(text: &str) -> Vec<ParsedToolCall> {
    let mut calls = scan_marked(text, "```tool_call", "```");
    calls.extend(scan_marked(text, "<tool_call>", "</tool_call>"));
    if calls.is_empty() {
        calls = scan_bare_json(text);
    }
    calls
}

fn scan_marked(text: &str, marker: &str, closer: &str) -> Vec<ParsedToolCall> {
    let mut calls = Vec::new();
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(marker) {
        let start = cursor + found;
        let body_start = start + marker.len();
        let Some((value, consumed)) = first_json_value(&text[body_start..]) else {
            cursor = body_start;
            continue;
        };

        let mut end = body_start + consumed;
        if let Some(close) = text[end..].find(closer) {
            if text[end..end + close].trim().is_empty() {
                end += close + closer.len();
            }
        }

        if let Some((tool_name, arguments)) = tool_from_value(&value) {
            calls.push(ParsedToolCall {
                tool_name,
                arguments,
                raw_text: text[start..end].to_string(),
            });
        }
        cursor = end;
    }
    calls
}

fn scan_bare_json(text: &str) -> Vec<ParsedToolCall> {
    let mut calls = Vec::new();
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find('{') {
        let start = cursor + found;
        let looks_like_call = text[start + 1..].trim_start().starts_with("\"tool\"");
        if looks_like_call {
            if let Some((value, consumed)) = first_json_value(&text[start..]) {
                if let Some((tool_name, arguments)) = tool_from_value(&value) {
                    let end = start + consumed;
                    calls.push(ParsedToolCall {
                        tool_name,
                        arguments,
                        raw_text: text[start..end].to_string(),
                    });
                    cursor = end;
                    continue;
                }
            }
        }
        cursor = start + 1;
    }
    calls
}

/// Decode the first JSON value in `text`, returning it with the bytes consumed.
fn first_json_value(text: &str) -> Option<(Value, usize)> {
    let leading = text.len() - text.trim_start().len();
    let mut stream =
        serde_json::Deserializer::from_str(&text[leading..]).into_iter::<Value>();
    let value = stream.next()?.ok()?;
    Some((value, leading + stream.byte_offset()))
}

fn tool_from_value(value: &Value) -> Option<(String, Value)> {
    let name = value
        .get("tool")
        .or_else(|| value.get("name"))?
        .as_str()?
        .trim()
        .to_string();
    if name.is_empty() {
        return None;
    }
    let arguments = value
        .get("arguments")
        .or_else(|| value.get("args"))
        .or_else(|| value.get("input"))
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    Some((name, arguments))
}

/// First JSON object embedded anywhere in `text`, fenced or not.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let mut cursor = 0;
    while let Some(found) = text[cursor..].find('{') {
        let start = cursor + found;
        if let Some((value, _)) = first_json_value(&text[start..]) {
            if value.is_object() {
                return Some(value);
            }
        }
        cursor = start + 1;
    }
    None
}

/// The response text with parsed tool call blocks removed.
pub fn extract_text_without_tool_calls(text: &str) -> String {
    let mut cleaned = text.to_string();
    for call in parse_tool_calls(text) {
        cleaned = cleaned.replacen(&call.raw_text, "", 1);
    }
    while cleaned.contains("\n\n\n") {
        cleaned = cleaned.replace("\n\n\n", "\n\n");
    }
    cleaned.trim().to_string()
}

/// Format a tool result for injection back into the conversation as text.
pub fn format_tool_result(tool_name: &str, tool_id: &str, result: &str, is_error: bool) -> String {
    if is_error {
        format!(
            "[Tool Result: {} (id: {})]\nError: {}",
            tool_name, tool_id, result
        )
    } else {
        format!("[Tool Result: {} (id: {})]\n{}", tool_name, tool_id, result)
    }
}
