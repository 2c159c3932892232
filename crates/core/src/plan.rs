//! Plan Contract
//!
//! The manifest a build commits to producing. Once accepted, `file_tree` is
//! the authoritative completion contract for the run: every path in it must
//! reach a written status before the run may report success.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::files::FileRecord;

/// Declared manifest of an app build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub app_name: String,
    pub app_type: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub screens: Vec<String>,
    /// Ordered, deduplicated, normalized relative paths.
    pub file_tree: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub plan_steps: Vec<String>,
}

/// Raw planning-tool arguments as a backend sends them.
///
/// Backends are loose about naming and about whether `file_tree` entries are
/// bare strings or `{ "path": ... }` objects, so both are accepted here and
/// normalized by [`Plan::from_args`].
#[derive(Debug, Deserialize)]
struct PlanArgs {
    #[serde(default, alias = "appName", alias = "name")]
    app_name: Option<String>,
    #[serde(default, alias = "appType", alias = "type")]
    app_type: Option<String>,
    #[serde(default)]
    features: Vec<serde_json::Value>,
    #[serde(default)]
    screens: Vec<serde_json::Value>,
    #[serde(default, alias = "fileTree", alias = "files")]
    file_tree: Vec<serde_json::Value>,
    #[serde(default)]
    dependencies: Vec<serde_json::Value>,
    #[serde(default, alias = "planSteps", alias = "steps")]
    plan_steps: Vec<serde_json::Value>,
}

impl Plan {
    /// Build a plan from planning-tool arguments.
    ///
    /// Fails when the manifest declares no usable path or contains a path that
    /// escapes the project root.
    pub fn from_args(args: &serde_json::Value) -> CoreResult<Self> {
        let raw: PlanArgs = serde_json::from_value(args.clone())
            .map_err(|e| CoreError::invalid_plan(format!("malformed plan arguments: {}", e)))?;

        let mut seen = HashSet::new();
        let mut file_tree = Vec::new();
        for entry in &raw.file_tree {
            let Some(candidate) = entry_text(entry, "path") else {
                continue;
            };
            let path = normalize_path(&candidate)?;
            if seen.insert(path.clone()) {
                file_tree.push(path);
            }
        }

        if file_tree.is_empty() {
            return Err(CoreError::invalid_plan(
                "file_tree must declare at least one file path",
            ));
        }

        Ok(Self {
            app_name: raw
                .app_name
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "app".to_string()),
            app_type: raw
                .app_type
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "mobile".to_string()),
            features: text_list(&raw.features, "name"),
            screens: text_list(&raw.screens, "name"),
            file_tree,
            dependencies: text_list(&raw.dependencies, "name"),
            plan_steps: text_list(&raw.plan_steps, "description"),
        })
    }

    /// Whether `path` is declared by this plan.
    pub fn declares(&self, path: &str) -> bool {
        self.file_tree.iter().any(|p| p == path)
    }

    pub fn total_files(&self) -> usize {
        self.file_tree.len()
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "{} ({}): {} files, {} screens, {} features",
            self.app_name,
            self.app_type,
            self.file_tree.len(),
            self.screens.len(),
            self.features.len()
        )
    }
}

fn entry_text(value: &serde_json::Value, object_key: &str) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get(object_key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        _ => None,
    }
}

fn text_list(values: &[serde_json::Value], object_key: &str) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| entry_text(v, object_key))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Normalize a project-relative path.
///
/// Trims whitespace, converts `\` to `/`, strips leading `./` and `/`, and
/// collapses repeated separators. Empty paths and `..` segments are rejected.
pub fn normalize_path(raw: &str) -> CoreResult<String> {
    let unified = raw.trim().replace('\\', "/");
    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(CoreError::invalid_path(format!(
                    "'{}' escapes the project root",
                    raw
                )))
            }
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Err(CoreError::invalid_path(format!("'{}' is empty", raw)));
    }
    Ok(segments.join("/"))
}

/// Plan paths that do not yet have a created or updated record, in plan order.
pub fn pending_paths(plan: &Plan, files: &BTreeMap<String, FileRecord>) -> Vec<String> {
    plan.file_tree
        .iter()
        .filter(|path| {
            !files
                .get(path.as_str())
                .map(|record| record.status.is_written())
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}
