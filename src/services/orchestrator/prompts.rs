//! Prompt text for build runs.

use std::collections::BTreeMap;

use appweaver_core::BuildMode;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert mobile app developer. You turn a \
user's description into a complete React Native (Expo) project by calling tools.

Workflow:
1. Call create_plan once with the full file manifest. Every file you will write must be in file_tree.
2. Write every planned file with write_file. Write complete files, never placeholders.
3. Use read_file, search_files, patch_file and verify_project to check and fix your work.
4. Call complete only when every planned file has been written.";

const PLAN_MODE_NOTE: &str = "This is a planning run: call create_plan with the complete \
manifest and do not write any files.";

/// System prompt for a run: the override or the default, plus mode and
/// existing-file context.
pub fn system_prompt(
    override_prompt: Option<&str>,
    mode: BuildMode,
    existing_files: &BTreeMap<String, String>,
) -> String {
    let mut prompt = override_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT).to_string();
    if mode == BuildMode::Plan {
        prompt.push_str("\n\n");
        prompt.push_str(PLAN_MODE_NOTE);
    }
    if !existing_files.is_empty() {
        prompt.push_str("\n\nThe project already contains these files; read or patch them instead of starting over:\n");
        for path in existing_files.keys() {
            prompt.push_str(&format!("- {}\n", path));
        }
    }
    prompt
}

/// Sent when the backend stops without having planned.
pub fn plan_request() -> String {
    "You have not created a plan yet. Call create_plan now with the complete file manifest \
     for the app before writing any code."
        .to_string()
}

/// Sent when the backend stops with planned files still missing.
pub fn continuation(pending: &[String], batch_size: usize) -> String {
    let batch: Vec<&str> = pending
        .iter()
        .take(batch_size.max(1))
        .map(String::as_str)
        .collect();
    format!(
        "The build is not finished: {} planned file(s) have not been written:\n{}\n\n\
         Write the next {} now with write_file: {}. Do not try to write everything at once.",
        pending.len(),
        bullet_list(pending),
        batch.len(),
        batch.join(", ")
    )
}

/// Tool error returned when `complete` is called too early.
pub fn completion_rejected(pending: &[String]) -> String {
    format!(
        "Cannot complete: {} planned file(s) have not been written:\n{}",
        pending.len(),
        bullet_list(pending)
    )
}

fn bullet_list(paths: &[String]) -> String {
    paths
        .iter()
        .map(|p| format!("- {}", p))
        .collect::<Vec<_>>()
        .join("\n")
}
