//! Build Flow Integration Tests
//!
//! Drives full runs through the multi-tool profile: planning, file writes,
//! completion gating, continuation and budgets.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::json;

use appweaver_core::{BuildEventKind, BuildPhase, RunSnapshot};
use appweaver_llm::LlmError;

use crate::support::{
    call, calls, complete_call, plan_call, run_multi, source_for, test_config, text, write_call,
    ScriptedProvider,
};

const TODO_FILES: [&str; 2] = ["app/_layout.tsx", "app/(tabs)/index.tsx"];

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_todo_app_event_order() {
    let provider = ScriptedProvider::new(
        true,
        vec![
            Ok(calls(vec![plan_call("p1", &TODO_FILES)])),
            Ok(calls(vec![write_call("w1", TODO_FILES[0])])),
            Ok(calls(vec![write_call("w2", TODO_FILES[1])])),
            Ok(calls(vec![call(
                "c1",
                "complete",
                json!({"summary": "Todo app ready", "files_created": TODO_FILES}),
            )])),
        ],
    );
    let run = run_multi(provider.clone(), test_config()).await;

    let milestones: Vec<&str> = run
        .names()
        .into_iter()
        .filter(|n| matches!(*n, "plan_created" | "file_created" | "complete" | "run_finish"))
        .collect();
    assert_eq!(
        milestones,
        vec!["plan_created", "file_created", "file_created", "complete", "run_finish"]
    );
    assert_eq!(run.names()[0], "run_start");

    match &run.events.last().unwrap().kind {
        BuildEventKind::RunFinish { phase, success } => {
            assert_eq!(*phase, BuildPhase::Complete);
            assert!(*success);
        }
        other => panic!("Expected run_finish, got {:?}", other),
    }

    assert!(run.summary.success);
    assert_eq!(run.summary.files.len(), 2);
    assert_eq!(run.summary.iterations, 4);
    assert_eq!(run.summary.backend_calls, 4);
    assert_eq!(
        run.project.file(TODO_FILES[1]).await.as_deref(),
        Some(source_for(TODO_FILES[1]).as_str())
    );
    assert!(run.project.completion().await.is_some());

    let seen = provider.seen();
    assert_eq!(seen.len(), 4);
    assert!(seen[0].tools.contains(&"create_plan".to_string()));
    assert!(seen[0].tools.contains(&"write_file".to_string()));
}

#[tokio::test]
async fn test_complete_never_fires_with_pending_paths() {
    let mut config = test_config();
    config.max_iterations = 40;
    config.max_backend_calls = 80;

    for seed in 0..16u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let planned: Vec<String> = (0..rng.gen_range(1..=10))
            .map(|i| format!("app/screens/Screen{}.tsx", i))
            .collect();
        let plan_paths: Vec<&str> = planned.iter().map(String::as_str).collect();
        let mut order = plan_paths.clone();
        order.shuffle(&mut rng);

        // Writes in random batches, with completion attempts sprinkled in.
        let mut script = vec![Ok(calls(vec![plan_call("p1", &plan_paths)]))];
        let mut remaining = order.as_slice();
        let mut turn = 0;
        while !remaining.is_empty() {
            let size = rng.gen_range(1..=3).min(remaining.len());
            let (batch, rest) = remaining.split_at(size);
            let mut turn_calls: Vec<_> = batch
                .iter()
                .enumerate()
                .map(|(i, path)| write_call(&format!("w{}_{}", turn, i), path))
                .collect();
            if rng.gen_bool(0.5) {
                let at = rng.gen_range(0..=turn_calls.len());
                turn_calls.insert(at, complete_call(&format!("c{}", turn), "done?"));
            }
            script.push(Ok(calls(turn_calls)));
            remaining = rest;
            turn += 1;
        }
        script.push(Ok(calls(vec![complete_call("final", "done")])));

        let run = run_multi(ScriptedProvider::new(true, script), config.clone()).await;
        assert!(
            run.summary.success,
            "seed {}: run failed: {:?}",
            seed,
            run.summary.error
        );

        let written: BTreeSet<String> = run.project.files().await.into_keys().collect();
        let expected: BTreeSet<String> = planned.iter().cloned().collect();
        assert_eq!(written, expected, "seed {}", seed);

        for end in 1..=run.events.len() {
            let snapshot = RunSnapshot::from_events(&run.events[..end]);
            let pending = snapshot.pending_paths();
            match &run.events[end - 1].kind {
                BuildEventKind::Complete { .. } => {
                    assert!(pending.is_empty(), "seed {}: complete with {:?}", seed, pending)
                }
                BuildEventKind::ToolResult { tool, result, .. } if tool == "complete" => {
                    assert_eq!(result.success, pending.is_empty(), "seed {}", seed)
                }
                _ => {}
            }
            if !pending.is_empty() {
                assert!(snapshot.completion.is_none(), "seed {}", seed);
            }
        }
        assert_eq!(run.count("complete"), 1, "seed {}", seed);
    }
}

// ============================================================================
// Completion gating and continuation
// ============================================================================

#[tokio::test]
async fn test_completion_rejected_until_plan_is_written() {
    let provider = ScriptedProvider::new(
        true,
        vec![
            Ok(calls(vec![plan_call("p1", &TODO_FILES)])),
            Ok(calls(vec![
                write_call("w1", TODO_FILES[0]),
                complete_call("c1", "done early"),
            ])),
            Ok(calls(vec![write_call("w2", TODO_FILES[1])])),
            Ok(calls(vec![complete_call("c2", "done")])),
        ],
    );
    let run = run_multi(provider, test_config()).await;

    let completes: Vec<_> = run
        .events
        .iter()
        .filter_map(|e| match &e.kind {
            BuildEventKind::ToolResult { tool, result, .. } if tool == "complete" => Some(result),
            _ => None,
        })
        .collect();
    assert_eq!(completes.len(), 2);
    assert!(!completes[0].success);
    let error = completes[0].error.as_deref().unwrap();
    assert!(error.contains("Cannot complete"));
    assert!(error.contains(TODO_FILES[1]));
    assert!(completes[1].success);

    assert_eq!(run.count("complete"), 1);
    assert!(run.summary.success);
}

#[tokio::test]
async fn test_continuation_does_not_duplicate_created_files() {
    let files = ["a.tsx", "b.tsx", "c.tsx"];
    let provider = ScriptedProvider::new(
        true,
        vec![
            Ok(calls(vec![plan_call("p1", &files)])),
            Ok(calls(vec![write_call("w1", "a.tsx")])),
            Ok(text("I'll keep going with the remaining screens.")),
            Ok(calls(vec![write_call("w2", "a.tsx"), write_call("w3", "b.tsx")])),
            Ok(calls(vec![write_call("w4", "c.tsx")])),
            Ok(calls(vec![complete_call("c1", "done")])),
        ],
    );
    let run = run_multi(provider.clone(), test_config()).await;

    assert!(run.summary.success);
    assert_eq!(run.created_paths(), vec!["a.tsx", "b.tsx", "c.tsx"]);
    assert_eq!(run.count("file_updated"), 1);
    assert_eq!(run.count("text_delta"), 1);

    // The request after the stalled turn carries the continuation prompt.
    let seen = provider.seen();
    let nudge = seen[3].messages.last().unwrap().text_content();
    assert!(nudge.contains("planned file(s) have not been written"));
    assert!(nudge.contains("- b.tsx"));
    assert!(nudge.contains("- c.tsx"));
}

#[tokio::test]
async fn test_build_without_plan_is_prompted_for_one() {
    let provider = ScriptedProvider::new(
        true,
        vec![
            Ok(text("Sure, a todo app sounds great.")),
            Ok(calls(vec![plan_call("p1", &["App.tsx"])])),
            Ok(calls(vec![write_call("w1", "App.tsx")])),
            Ok(calls(vec![complete_call("c1", "done")])),
        ],
    );
    let run = run_multi(provider.clone(), test_config()).await;

    assert!(run.summary.success);
    let nudge = provider.seen()[1].messages.last().unwrap().text_content();
    assert!(nudge.contains("create_plan"));
}

// ============================================================================
// Budgets, retries and failures
// ============================================================================

#[tokio::test]
async fn test_iteration_budget_stops_the_run() {
    let mut config = test_config();
    config.max_iterations = 3;
    let provider = ScriptedProvider::new(true, vec![Ok(calls(vec![plan_call("p1", &TODO_FILES)]))]);
    let run = run_multi(provider, config).await;

    assert_eq!(run.count("iteration"), 3);
    assert_eq!(run.summary.iterations, 3);
    assert!(!run.summary.success);
    assert!(run
        .summary
        .error
        .as_deref()
        .unwrap()
        .contains("Maximum iterations (3) reached"));
    assert_eq!(run.summary.phase, BuildPhase::Error);
    assert_eq!(run.count("complete"), 0);
    assert_eq!(run.names().last(), Some(&"run_finish"));
}

#[tokio::test]
async fn test_budget_exhaustion_keeps_partial_progress() {
    let mut config = test_config();
    config.max_iterations = 3;
    let provider = ScriptedProvider::new(
        true,
        vec![
            Ok(calls(vec![plan_call("p1", &TODO_FILES)])),
            Ok(calls(vec![write_call("w1", TODO_FILES[0])])),
        ],
    );
    let run = run_multi(provider, config).await;

    assert!(!run.summary.success);
    assert_eq!(run.summary.phase, BuildPhase::Coding);
    assert_eq!(run.summary.written_files().count(), 1);
    assert!(run.project.file(TODO_FILES[0]).await.is_some());
}

#[tokio::test]
async fn test_transient_errors_are_retried_and_counted() {
    let provider = ScriptedProvider::new(
        true,
        vec![
            Err(LlmError::ServerError {
                message: "overloaded".to_string(),
                status: Some(529),
            }),
            Ok(calls(vec![plan_call("p1", &["App.tsx"])])),
            Ok(calls(vec![write_call("w1", "App.tsx")])),
            Ok(calls(vec![complete_call("c1", "done")])),
        ],
    );
    let run = run_multi(provider.clone(), test_config()).await;

    assert!(run.summary.success);
    assert_eq!(run.summary.iterations, 3);
    assert_eq!(run.summary.backend_calls, 4);
    assert_eq!(provider.seen().len(), 4);
}

#[tokio::test]
async fn test_failed_patch_reports_path_and_keeps_phase() {
    let provider = ScriptedProvider::new(
        true,
        vec![
            Ok(calls(vec![plan_call("p1", &["App.tsx"])])),
            Ok(calls(vec![call(
                "x1",
                "patch_file",
                json!({"path": "App.tsx", "find": "old", "replace": "new"}),
            )])),
            Ok(calls(vec![write_call("w1", "App.tsx")])),
            Ok(calls(vec![complete_call("c1", "done")])),
        ],
    );
    let run = run_multi(provider, test_config()).await;

    let index = run
        .events
        .iter()
        .position(|e| {
            matches!(&e.kind, BuildEventKind::ToolResult { tool, .. } if tool == "patch_file")
        })
        .unwrap();
    match &run.events[index].kind {
        BuildEventKind::ToolResult { result, .. } => {
            assert!(!result.success);
            assert!(result.error.as_deref().unwrap().contains("App.tsx"));
        }
        _ => unreachable!(),
    }
    let before = RunSnapshot::from_events(&run.events[..=index]);
    assert_eq!(before.phase, BuildPhase::Planning);
    assert_eq!(before.failed_tool_calls, 1);

    assert!(run.summary.success);
}

#[tokio::test]
async fn test_fatal_provider_error_ends_run() {
    let provider = ScriptedProvider::new(
        true,
        vec![Err(LlmError::AuthenticationFailed {
            message: "anthropic: Invalid API key".to_string(),
        })],
    );
    let run = run_multi(provider.clone(), test_config()).await;

    assert!(!run.summary.success);
    assert_eq!(run.summary.phase, BuildPhase::Error);
    assert_eq!(provider.seen().len(), 1);
    assert!(run.summary.error.as_deref().unwrap().contains("Invalid API key"));
    assert_eq!(run.names()[run.names().len() - 2], "error");
}
