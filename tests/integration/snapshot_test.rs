//! Event Stream Folding Tests
//!
//! A consumer folding the event stream must arrive at the same state the
//! orchestrator reports in its summary.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use appweaver::{MultiToolBackend, RunRequest};
use appweaver_core::{BuildEvent, RunSnapshot};

use crate::support::{
    call, calls, complete_call, plan_call, run_backend, test_config, text, write_call,
    ScriptedProvider,
};

#[tokio::test]
async fn test_folded_events_match_summary() {
    let provider = ScriptedProvider::new(
        true,
        vec![
            Ok(calls(vec![plan_call("p1", &["App.tsx", "screens/Home.tsx"])])),
            Ok(calls(vec![
                write_call("w1", "App.tsx"),
                call(
                    "x1",
                    "patch_file",
                    json!({"path": "legacy.ts", "find": "var", "replace": "const"}),
                ),
                call("d1", "delete_file", json!({"path": "old.ts"})),
            ])),
            Ok(text("Now the home screen.")),
            Ok(calls(vec![write_call("w2", "screens/Home.tsx")])),
            Ok(calls(vec![complete_call("c1", "done")])),
        ],
    );
    let existing = BTreeMap::from([
        ("legacy.ts".to_string(), "var x = 1;\n".to_string()),
        ("old.ts".to_string(), "export {};\n".to_string()),
    ]);
    let backend = Arc::new(MultiToolBackend::new(provider));
    let request = RunRequest::new("Update my app").with_existing_files(existing);
    let run = run_backend(backend, test_config(), request).await;

    assert!(run.summary.success, "run failed: {:?}", run.summary.error);

    let snapshot = RunSnapshot::from_events(&run.events);
    assert_eq!(snapshot.run_id.as_deref(), Some(run.summary.run_id.as_str()));
    assert_eq!(snapshot.phase, run.summary.phase);
    assert_eq!(snapshot.success, Some(run.summary.success));
    assert_eq!(snapshot.iteration, run.summary.iterations);
    assert_eq!(snapshot.plan, run.summary.plan);
    assert_eq!(snapshot.input_tokens, run.summary.usage.input_tokens);
    assert_eq!(snapshot.output_tokens, run.summary.usage.output_tokens);
    assert!(snapshot.pending_paths().is_empty());

    let mut from_summary: Vec<String> =
        run.summary.written_files().map(|f| f.path.clone()).collect();
    from_summary.sort();
    let mut from_events = snapshot.written_paths();
    from_events.sort();
    assert_eq!(from_events, from_summary);
    assert!(from_events.contains(&"legacy.ts".to_string()));
    assert!(!from_events.contains(&"old.ts".to_string()));

    assert_eq!(
        run.project.file("legacy.ts").await.as_deref(),
        Some("const x = 1;\n")
    );
    assert!(run.project.file("old.ts").await.is_none());
}

#[tokio::test]
async fn test_sequence_numbers_are_gapless() {
    let provider = ScriptedProvider::new(
        true,
        vec![
            Ok(calls(vec![plan_call("p1", &["App.tsx"])])),
            Ok(calls(vec![write_call("w1", "App.tsx")])),
            Ok(calls(vec![complete_call("c1", "done")])),
        ],
    );
    let backend = Arc::new(MultiToolBackend::new(provider));
    let run = run_backend(backend, test_config(), RunRequest::new("Build a todo app")).await;

    let seqs: Vec<u64> = run.events.iter().map(|e: &BuildEvent| e.seq).collect();
    let expected: Vec<u64> = (0..run.events.len() as u64).collect();
    assert_eq!(seqs, expected);
    assert!(run
        .events
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));

    // Events survive a JSON round trip through their wire form.
    let wire = serde_json::to_string(&run.events).unwrap();
    let decoded: Vec<BuildEvent> = serde_json::from_str(&wire).unwrap();
    assert_eq!(decoded, run.events);
}
