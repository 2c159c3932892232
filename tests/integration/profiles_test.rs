//! Backend Profile Integration Tests
//!
//! The single-tool profile (plan extraction plus write-only turns) and
//! prompt-based tool calling for providers without native tool support.

use std::sync::Arc;

use serde_json::{json, Value};

use appweaver::{MultiToolBackend, RunRequest};
use appweaver_core::{BuildEventKind, BuildMode, BuildPhase};
use appweaver_llm::MessageContent;

use crate::support::{
    calls, complete_call, plan_call, run_backend, run_multi, run_single, source_for, test_config,
    text, write_call, ScriptedProvider,
};

fn tool_block(tool: &str, arguments: Value) -> String {
    format!(
        "```tool_call\n{}\n```",
        json!({"tool": tool, "arguments": arguments})
    )
}

fn write_block(path: &str) -> String {
    tool_block(
        "write_file",
        json!({"path": path, "content": source_for(path)}),
    )
}

fn complete_summary(events: &[appweaver_core::BuildEvent]) -> Option<(String, Vec<String>)> {
    events.iter().find_map(|e| match &e.kind {
        BuildEventKind::Complete {
            summary,
            files_created,
        } => Some((summary.clone(), files_created.clone())),
        _ => None,
    })
}

// ============================================================================
// Single-tool profile
// ============================================================================

#[tokio::test]
async fn test_single_tool_auto_completes_after_last_file() {
    let provider = ScriptedProvider::new(
        true,
        vec![
            Ok(calls(vec![plan_call("p1", &["App.tsx", "screens/Home.tsx"])])),
            Ok(calls(vec![
                write_call("w1", "App.tsx"),
                write_call("w2", "screens/Home.tsx"),
            ])),
        ],
    );
    let run = run_single(provider.clone(), test_config()).await;

    assert!(run.summary.success, "run failed: {:?}", run.summary.error);
    assert_eq!(run.summary.phase, BuildPhase::Complete);

    let (summary, files_created) = complete_summary(&run.events).unwrap();
    assert!(summary.starts_with("Built "));
    assert_eq!(files_created, vec!["App.tsx", "screens/Home.tsx"]);

    // The final turn is answered without another provider request.
    let seen = provider.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].tools, vec!["create_plan"]);
    assert_eq!(seen[1].tools, vec!["write_file"]);
    assert!(seen[1].system.as_deref().unwrap().contains("- screens/Home.tsx"));
}

#[tokio::test]
async fn test_single_tool_drops_calls_outside_its_surface() {
    let provider = ScriptedProvider::new(
        true,
        vec![
            Ok(calls(vec![plan_call("p1", &["App.tsx"])])),
            Ok(calls(vec![
                write_call("w1", "App.tsx"),
                complete_call("c1", "from the model"),
            ])),
        ],
    );
    let run = run_single(provider, test_config()).await;

    assert!(run.summary.success);
    let tools: Vec<&str> = run
        .events
        .iter()
        .filter_map(|e| match &e.kind {
            BuildEventKind::ToolCall { tool, .. } => Some(tool.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(tools, vec!["create_plan", "write_file"]);

    let (summary, _) = complete_summary(&run.events).unwrap();
    assert_ne!(summary, "from the model");
}

#[tokio::test]
async fn test_single_tool_plan_from_json_without_native_tools() {
    let manifest = "Here is the plan:\n```json\n{\"app_name\": \"Notes\", \"app_type\": \"utility\", \
                    \"file_tree\": [\"App.tsx\", \"screens/Home.tsx\"]}\n```";
    let writes = format!(
        "Writing both files.\n\n{}\n\n{}",
        write_block("App.tsx"),
        write_block("screens/Home.tsx")
    );
    let provider = ScriptedProvider::new(false, vec![Ok(text(manifest)), Ok(text(&writes))]);
    let run = run_single(provider.clone(), test_config()).await;

    assert!(run.summary.success, "run failed: {:?}", run.summary.error);
    let plan = run.summary.plan.as_ref().unwrap();
    assert_eq!(plan.app_name, "Notes");
    assert_eq!(plan.total_files(), 2);
    assert_eq!(
        run.project.file("screens/Home.tsx").await.as_deref(),
        Some(source_for("screens/Home.tsx").as_str())
    );

    for request in provider.seen() {
        assert!(request.tools.is_empty());
    }
}

// ============================================================================
// Prompt-based tool calling
// ============================================================================

#[tokio::test]
async fn test_multi_tool_parses_calls_from_text() {
    let plan = tool_block(
        "create_plan",
        json!({"app_name": "Todo", "file_tree": ["App.tsx"]}),
    );
    let provider = ScriptedProvider::new(
        false,
        vec![
            Ok(text(&format!("Planning first.\n\n{}", plan))),
            Ok(text(&write_block("App.tsx"))),
            Ok(text(&tool_block("complete", json!({"summary": "Todo app ready"})))),
        ],
    );
    let run = run_multi(provider.clone(), test_config()).await;

    assert!(run.summary.success, "run failed: {:?}", run.summary.error);
    assert_eq!(complete_summary(&run.events).unwrap().0, "Todo app ready");
    assert_eq!(run.count("text_delta"), 1);

    let seen = provider.seen();
    assert_eq!(seen.len(), 3);
    assert!(seen[0].tools.is_empty());
    assert!(seen[0].system.as_deref().unwrap().contains("```tool_call"));

    // Earlier tool exchanges reach the provider as plain text.
    let later = &seen[2].messages;
    assert!(later
        .iter()
        .flat_map(|m| m.content.iter())
        .all(|c| matches!(c, MessageContent::Text { .. })));
    let transcript: String = later.iter().map(|m| m.text_content()).collect();
    assert!(transcript.contains("[Tool Result: write_file"));
}

// ============================================================================
// Plan mode
// ============================================================================

#[tokio::test]
async fn test_plan_mode_stops_after_plan() {
    let provider = ScriptedProvider::new(
        true,
        vec![Ok(calls(vec![plan_call("p1", &["App.tsx", "screens/Home.tsx"])]))],
    );
    let backend = Arc::new(MultiToolBackend::new(provider.clone()));
    let request = RunRequest::new("Plan a todo app").with_mode(BuildMode::Plan);
    let run = run_backend(backend, test_config(), request).await;

    assert!(run.summary.success);
    assert_eq!(run.summary.phase, BuildPhase::Complete);
    assert!(run.summary.plan.is_some());
    assert_eq!(run.count("file_created"), 0);
    assert!(run.project.files().await.is_empty());
    assert!(run.project.plan().await.is_some());
    assert_eq!(provider.seen()[0].tools, vec!["create_plan"]);
}
