//! In-Memory Project
//!
//! Default `ProjectExecutor`: a virtual project held in a sorted map. Used by
//! the CLI and by tests; a run owns one instance for its whole lifetime.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use appweaver_core::{normalize_path, Plan};

use crate::executor::{ProjectExecutor, ToolResult};
use crate::verify::{checks_for_suite, verify, VerifyReport};

/// Maximum matches returned by `search_files`.
pub const SEARCH_MATCH_CAP: usize = 200;

/// Byte cap for file content returned by `fix_error`.
pub const FIX_ERROR_CONTENT_CAP: usize = 8_000;

const SNIPPET_CHARS: usize = 160;

/// One `search_files` hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub path: String,
    /// 1-based line number
    pub line: usize,
    pub snippet: String,
}

/// What the backend reported when it completed the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub summary: String,
    pub files_created: Vec<String>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Default)]
struct ProjectState {
    files: BTreeMap<String, String>,
    plan: Option<Plan>,
    completion: Option<CompletionRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryProject {
    state: RwLock<ProjectState>,
}

impl InMemoryProject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing files. Paths that fail normalization are skipped.
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let files = files
            .into_iter()
            .filter_map(|(path, content)| {
                normalize_path(path.as_ref())
                    .ok()
                    .map(|p| (p, content.into()))
            })
            .collect();
        Self {
            state: RwLock::new(ProjectState {
                files,
                ..ProjectState::default()
            }),
        }
    }

    /// Copy of every file.
    pub async fn files(&self) -> BTreeMap<String, String> {
        self.state.read().await.files.clone()
    }

    pub async fn file(&self, path: &str) -> Option<String> {
        let path = normalize_path(path).ok()?;
        self.state.read().await.files.get(&path).cloned()
    }

    pub async fn plan(&self) -> Option<Plan> {
        self.state.read().await.plan.clone()
    }

    pub async fn completion(&self) -> Option<CompletionRecord> {
        self.state.read().await.completion.clone()
    }

    fn report_result(report: VerifyReport) -> ToolResult {
        let data = json!({
            "errors": report.errors,
            "warnings": report.warnings,
        });
        if report.passed() {
            ToolResult::ok(format!("Checks passed: {}", report.render())).with_data(data)
        } else {
            ToolResult::err(format!("Checks failed: {}", report.render())).with_data(data)
        }
    }
}

/// Normalize `raw` or produce the failed tool result for it.
fn project_path(raw: &str) -> Result<String, ToolResult> {
    normalize_path(raw).map_err(|e| ToolResult::err(e.to_string()))
}

/// Directory prefix filter; empty, `.` and `/` mean the whole project.
fn prefix_filter(prefix: Option<&str>) -> Result<Option<String>, ToolResult> {
    match prefix.map(str::trim) {
        None | Some("") | Some(".") | Some("/") | Some("./") => Ok(None),
        Some(p) => project_path(p).map(Some),
    }
}

fn under_prefix(path: &str, prefix: Option<&str>) -> bool {
    match prefix {
        None => true,
        Some(prefix) => {
            path == prefix
                || (path.starts_with(prefix) && path[prefix.len()..].starts_with('/'))
        }
    }
}

/// Cut `text` to at most `max_bytes`, on a char boundary.
fn truncate_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn snippet(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.chars().count() <= SNIPPET_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(SNIPPET_CHARS).collect();
        format!("{}…", cut)
    }
}

#[async_trait]
impl ProjectExecutor for InMemoryProject {
    async fn create_plan(&self, plan: &Plan) -> ToolResult {
        let mut state = self.state.write().await;
        state.plan = Some(plan.clone());
        debug!(app = %plan.app_name, files = plan.file_tree.len(), "plan recorded");
        ToolResult::ok(format!(
            "Plan created for {}. Files to write, in order:\n{}",
            plan.summary(),
            plan.file_tree.join("\n")
        ))
        .with_data(json!({ "file_tree": plan.file_tree }))
    }

    async fn write_file(&self, path: &str, content: &str) -> ToolResult {
        let path = match project_path(path) {
            Ok(p) => p,
            Err(result) => return result,
        };
        let mut state = self.state.write().await;
        let created = state
            .files
            .insert(path.clone(), content.to_string())
            .is_none();
        ToolResult::ok(format!(
            "{} {} ({} bytes)",
            if created { "Created" } else { "Updated" },
            path,
            content.len()
        ))
        .with_data(json!({ "path": path, "created": created }))
    }

    async fn patch_file(&self, path: &str, find: &str, replace: &str) -> ToolResult {
        let path = match project_path(path) {
            Ok(p) => p,
            Err(result) => return result,
        };
        if find.is_empty() {
            return ToolResult::err(format!("Cannot patch {}: find text is empty", path));
        }
        let mut state = self.state.write().await;
        let Some(current) = state.files.get(&path) else {
            return ToolResult::err(format!("Cannot patch {}: file does not exist", path));
        };
        if !current.contains(find) {
            return ToolResult::err(format!(
                "Cannot patch {}: find text not present in file",
                path
            ));
        }
        let patched = current.replacen(find, replace, 1);
        state.files.insert(path.clone(), patched.clone());
        ToolResult::ok(format!("Patched {}", path))
            .with_data(json!({ "path": path, "content": patched }))
    }

    async fn search_files(&self, query: &str, path_prefix: Option<&str>) -> ToolResult {
        if query.trim().is_empty() {
            return ToolResult::err("Search query is empty");
        }
        let prefix = match prefix_filter(path_prefix) {
            Ok(p) => p,
            Err(result) => return result,
        };
        let needle = query.to_lowercase();
        let state = self.state.read().await;

        let mut matches = Vec::new();
        let mut truncated = false;
        'files: for (path, content) in &state.files {
            if !under_prefix(path, prefix.as_deref()) {
                continue;
            }
            for (index, line) in content.lines().enumerate() {
                if line.to_lowercase().contains(&needle) {
                    if matches.len() == SEARCH_MATCH_CAP {
                        truncated = true;
                        break 'files;
                    }
                    matches.push(SearchMatch {
                        path: path.clone(),
                        line: index + 1,
                        snippet: snippet(line),
                    });
                }
            }
        }

        let mut output = if matches.is_empty() {
            format!("No matches for '{}'", query)
        } else {
            matches
                .iter()
                .map(|m| format!("{}:{}: {}", m.path, m.line, m.snippet))
                .collect::<Vec<_>>()
                .join("\n")
        };
        if truncated {
            output.push_str(&format!("\n(results capped at {} matches)", SEARCH_MATCH_CAP));
        }
        ToolResult::ok(output).with_data(json!({ "matches": matches, "truncated": truncated }))
    }

    async fn verify_project(&self, checks: &[String]) -> ToolResult {
        let state = self.state.read().await;
        Self::report_result(verify(&state.files, checks))
    }

    async fn delete_file(&self, path: &str) -> ToolResult {
        let path = match project_path(path) {
            Ok(p) => p,
            Err(result) => return result,
        };
        let mut state = self.state.write().await;
        let deleted = state.files.remove(&path).is_some();
        let output = if deleted {
            format!("Deleted {}", path)
        } else {
            format!("{} does not exist; nothing to delete", path)
        };
        ToolResult::ok(output).with_data(json!({ "path": path, "deleted": deleted }))
    }

    async fn read_file(&self, path: &str) -> ToolResult {
        let path = match project_path(path) {
            Ok(p) => p,
            Err(result) => return result,
        };
        let state = self.state.read().await;
        match state.files.get(&path) {
            Some(content) => ToolResult::ok(content.clone()),
            None => ToolResult::err(format!("File not found: {}", path)),
        }
    }

    async fn list_files(&self, prefix: Option<&str>) -> ToolResult {
        let prefix = match prefix_filter(prefix) {
            Ok(p) => p,
            Err(result) => return result,
        };
        let state = self.state.read().await;
        let paths: Vec<&String> = state
            .files
            .keys()
            .filter(|p| under_prefix(p, prefix.as_deref()))
            .collect();
        let output = if paths.is_empty() {
            "No files found".to_string()
        } else {
            paths
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        };
        ToolResult::ok(output).with_data(json!({ "files": paths }))
    }

    async fn run_test(&self, check_type: &str) -> ToolResult {
        let Some(checks) = checks_for_suite(check_type) else {
            return ToolResult::err(format!(
                "Unknown check type '{}' (expected lint, typecheck, smoke or all)",
                check_type
            ));
        };
        let state = self.state.read().await;
        Self::report_result(verify(&state.files, &checks))
    }

    async fn fix_error(&self, path: &str, message: &str, description: &str) -> ToolResult {
        let path = match project_path(path) {
            Ok(p) => p,
            Err(result) => return result,
        };
        let state = self.state.read().await;
        let Some(content) = state.files.get(&path) else {
            return ToolResult::err(format!("Cannot fix {}: file not found", path));
        };
        let shown = truncate_bytes(content, FIX_ERROR_CONTENT_CAP);
        let truncated = shown.len() < content.len();

        let mut output = format!("Error in {}: {}\n", path, message);
        if !description.trim().is_empty() {
            output.push_str(&format!("Planned fix: {}\n", description));
        }
        output.push_str(&format!(
            "\nCurrent content ({} bytes{}):\n{}",
            content.len(),
            if truncated { ", truncated" } else { "" },
            shown
        ));
        output.push_str("\n\nRewrite the file with write_file or apply patch_file.");
        ToolResult::ok(output).with_data(json!({
            "path": path,
            "content": shown,
            "truncated": truncated,
        }))
    }

    async fn complete(
        &self,
        summary: &str,
        files_created: &[String],
        next_steps: &[String],
    ) -> ToolResult {
        let mut state = self.state.write().await;
        state.completion = Some(CompletionRecord {
            summary: summary.to_string(),
            files_created: files_created.to_vec(),
            next_steps: next_steps.to_vec(),
        });
        ToolResult::ok(format!("Build complete: {}", summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::BuildToolCall;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_then_read() {
        let project = InMemoryProject::new();
        let result = project.write_file("./App.tsx", "export default App;").await;
        assert!(result.success);
        assert_eq!(result.data.as_ref().unwrap()["created"], true);

        let again = project.write_file("App.tsx", "v2").await;
        assert_eq!(again.data.unwrap()["created"], false);

        let read = project.read_file("App.tsx").await;
        assert_eq!(read.output.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_read_missing_file_fails() {
        let project = InMemoryProject::new();
        let result = project.read_file("nope.ts").await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("File not found: nope.ts"));
    }

    #[tokio::test]
    async fn test_write_rejects_escaping_path() {
        let project = InMemoryProject::new();
        let result = project.write_file("../outside.ts", "x").await;
        assert!(!result.success);
        assert!(project.files().await.is_empty());
    }

    #[tokio::test]
    async fn test_patch_file() {
        let project = InMemoryProject::with_files([("App.tsx", "const a = 1;\nconst a2 = 1;")]);
        let result = project.patch_file("App.tsx", "= 1", "= 2").await;
        assert!(result.success);
        assert_eq!(result.data_str("content"), Some("const a = 2;\nconst a2 = 1;"));
        assert_eq!(
            project.file("App.tsx").await.as_deref(),
            Some("const a = 2;\nconst a2 = 1;")
        );
    }

    #[tokio::test]
    async fn test_patch_failures_name_the_path() {
        let project = InMemoryProject::with_files([("App.tsx", "hello")]);
        let missing_text = project.patch_file("App.tsx", "goodbye", "x").await;
        assert!(!missing_text.success);
        assert!(missing_text.error.unwrap().contains("App.tsx"));

        let missing_file = project.patch_file("Other.tsx", "hello", "x").await;
        assert!(!missing_file.success);
        assert!(missing_file.error.unwrap().contains("Other.tsx"));
        assert_eq!(project.file("App.tsx").await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_delete_is_noop_when_absent() {
        let project = InMemoryProject::with_files([("a.ts", "x")]);
        let first = project.delete_file("a.ts").await;
        assert!(first.success);
        assert_eq!(first.data.unwrap()["deleted"], true);
        let second = project.delete_file("a.ts").await;
        assert!(second.success);
        assert_eq!(second.data.unwrap()["deleted"], false);
    }

    #[tokio::test]
    async fn test_list_files_with_prefix() {
        let project = InMemoryProject::with_files([
            ("app/_layout.tsx", ""),
            ("app/(tabs)/index.tsx", ""),
            ("appendix.md", ""),
        ]);
        let all = project.list_files(None).await;
        assert_eq!(all.output.unwrap().lines().count(), 3);

        let app = project.list_files(Some("app/")).await;
        let listed: Vec<String> = app.output.unwrap().lines().map(String::from).collect();
        assert_eq!(listed, vec!["app/(tabs)/index.tsx", "app/_layout.tsx"]);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_capped() {
        let many = "useState\n".repeat(SEARCH_MATCH_CAP + 50);
        let project = InMemoryProject::with_files([
            ("hooks/a.ts", many.as_str()),
            ("screens/Home.tsx", "const [x] = UseState(0);"),
        ]);

        let scoped = project.search_files("usestate", Some("screens")).await;
        let data = scoped.data.unwrap();
        assert_eq!(data["matches"].as_array().unwrap().len(), 1);
        assert_eq!(data["matches"][0]["line"], 1);

        let all = project.search_files("useState", None).await;
        let data = all.data.unwrap();
        assert_eq!(data["matches"].as_array().unwrap().len(), SEARCH_MATCH_CAP);
        assert_eq!(data["truncated"], true);
    }

    #[tokio::test]
    async fn test_search_rejects_empty_query() {
        let project = InMemoryProject::new();
        assert!(!project.search_files("  ", None).await.success);
    }

    #[tokio::test]
    async fn test_fix_error_truncates_content() {
        let big = "é".repeat(FIX_ERROR_CONTENT_CAP);
        let project = InMemoryProject::with_files([("Big.tsx", big.as_str())]);
        let result = project
            .fix_error("Big.tsx", "Unexpected token", "close the tag")
            .await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["truncated"], true);
        assert!(data["content"].as_str().unwrap().len() <= FIX_ERROR_CONTENT_CAP);
        assert!(result.output.unwrap().contains("Planned fix: close the tag"));
    }

    #[tokio::test]
    async fn test_fix_error_missing_file() {
        let project = InMemoryProject::new();
        let result = project.fix_error("Gone.tsx", "boom", "").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Gone.tsx"));
    }

    #[tokio::test]
    async fn test_verify_and_run_test() {
        let project = InMemoryProject::with_files([(
            "App.tsx",
            "import Header from './Header';\nexport default function App() { return <Header />; }",
        )]);
        let report = project.verify_project(&[]).await;
        assert!(!report.success);
        assert_eq!(report.data.as_ref().unwrap()["errors"].as_array().unwrap().len(), 1);

        let lint = project.run_test("lint").await;
        assert!(lint.success);
        assert!(lint.data.unwrap()["warnings"].as_array().unwrap().is_empty());

        assert!(!project.run_test("e2e").await.success);
    }

    #[tokio::test]
    async fn test_execute_dispatches_plan_and_complete() {
        let project = InMemoryProject::new();
        let plan = project
            .execute(&BuildToolCall::CreatePlan {
                manifest: json!({"app_name": "Todo", "file_tree": ["App.tsx"]}),
            })
            .await;
        assert!(plan.success);
        assert_eq!(project.plan().await.unwrap().file_tree, vec!["App.tsx"]);

        let invalid = project
            .execute(&BuildToolCall::CreatePlan {
                manifest: json!({"file_tree": []}),
            })
            .await;
        assert!(!invalid.success);

        let done = project
            .execute(&BuildToolCall::Complete {
                summary: "Todo app".to_string(),
                files_created: vec!["App.tsx".to_string()],
                next_steps: vec![],
            })
            .await;
        assert!(done.success);
        assert_eq!(project.completion().await.unwrap().summary, "Todo app");
    }
}
