//! Project Checks
//!
//! Static checks behind `verify_project` and `run_test`. They run over the
//! in-memory file map only; nothing is executed.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Check names accepted by `verify_project`.
pub const ALL_CHECKS: [&str; 4] = ["imports", "syntax", "empty", "entry"];

/// Entry points a React Native / Expo project is expected to have (any one).
const ENTRY_FILES: [&str; 4] = ["app/_layout.tsx", "app/_layout.js", "App.tsx", "App.js"];

const RESOLVE_EXTENSIONS: [&str; 5] = ["tsx", "ts", "jsx", "js", "json"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIssue {
    pub check: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ProjectIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {}: {}", self.check, path, self.message),
            None => write!(f, "[{}] {}", self.check, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub errors: Vec<ProjectIssue>,
    pub warnings: Vec<ProjectIssue>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, check: &str, path: Option<&str>, message: impl Into<String>) {
        self.errors.push(issue(check, path, message));
    }

    fn warning(&mut self, check: &str, path: Option<&str>, message: impl Into<String>) {
        self.warnings.push(issue(check, path, message));
    }

    /// Multi-line text for the backend.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{} error(s), {} warning(s)",
            self.errors.len(),
            self.warnings.len()
        );
        for e in &self.errors {
            out.push_str(&format!("\nerror {}", e));
        }
        for w in &self.warnings {
            out.push_str(&format!("\nwarning {}", w));
        }
        out
    }
}

fn issue(check: &str, path: Option<&str>, message: impl Into<String>) -> ProjectIssue {
    ProjectIssue {
        check: check.to_string(),
        path: path.map(|p| p.to_string()),
        message: message.into(),
    }
}

/// Checks making up a named test suite, or `None` for an unknown suite.
pub fn checks_for_suite(check_type: &str) -> Option<Vec<String>> {
    let names: &[&str] = match check_type.trim().to_ascii_lowercase().as_str() {
        "" | "all" => &ALL_CHECKS,
        "lint" => &["syntax", "empty"],
        "typecheck" | "types" => &["imports", "syntax"],
        "smoke" | "unit" => &["entry", "imports"],
        other if ALL_CHECKS.contains(&other) => return Some(vec![other.to_string()]),
        _ => return None,
    };
    Some(names.iter().map(|s| s.to_string()).collect())
}

/// Run `checks` (all checks when empty) against `files`.
pub fn verify(files: &BTreeMap<String, String>, checks: &[String]) -> VerifyReport {
    let mut report = VerifyReport::default();
    let selected: Vec<String> = if checks.is_empty() {
        ALL_CHECKS.iter().map(|s| s.to_string()).collect()
    } else {
        checks.iter().map(|c| c.trim().to_ascii_lowercase()).collect()
    };

    for check in &selected {
        match check.as_str() {
            "imports" => check_imports(files, &mut report),
            "syntax" => check_syntax(files, &mut report),
            "empty" => check_empty(files, &mut report),
            "entry" => check_entry(files, &mut report),
            other => report.warning(other, None, "unknown check skipped"),
        }
    }
    report
}

fn is_script(path: &str) -> bool {
    matches!(
        path.rsplit_once('.').map(|(_, ext)| ext),
        Some("ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs")
    )
}

fn import_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:\bfrom\s*|\bimport\s*\(?\s*|\brequire\s*\(\s*)['"](\.{1,2}/[^'"]*)['"]"#).ok()
    })
    .as_ref()
}

fn check_imports(files: &BTreeMap<String, String>, report: &mut VerifyReport) {
    let Some(re) = import_regex() else {
        report.warning("imports", None, "import scanner unavailable");
        return;
    };
    for (path, content) in files.iter().filter(|(p, _)| is_script(p)) {
        for capture in re.captures_iter(content) {
            let specifier = &capture[1];
            match resolve_relative(path, specifier) {
                Some(base) if resolves(files, &base) => {}
                Some(_) => report.error(
                    "imports",
                    Some(path),
                    format!("cannot resolve import '{}'", specifier),
                ),
                None => report.error(
                    "imports",
                    Some(path),
                    format!("import '{}' escapes the project root", specifier),
                ),
            }
        }
    }
}

/// Join `specifier` onto the directory of `from`.
fn resolve_relative(from: &str, specifier: &str) -> Option<String> {
    let mut segments: Vec<&str> = from.split('/').collect();
    segments.pop();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }
    Some(segments.join("/"))
}

fn resolves(files: &BTreeMap<String, String>, base: &str) -> bool {
    if files.contains_key(base) {
        return true;
    }
    RESOLVE_EXTENSIONS.iter().any(|ext| {
        files.contains_key(&format!("{}.{}", base, ext))
            || files.contains_key(&format!("{}/index.{}", base, ext))
    })
}

fn check_syntax(files: &BTreeMap<String, String>, report: &mut VerifyReport) {
    for (path, content) in files {
        if path.ends_with(".json") {
            if let Err(e) = serde_json::from_str::<serde_json::Value>(content) {
                report.error("syntax", Some(path), format!("invalid JSON: {}", e));
            }
            continue;
        }
        if !is_script(path) {
            continue;
        }
        if let Some(problem) = bracket_problem(content) {
            // JSX text makes quote tracking unreliable, so only warn there
            if path.ends_with(".tsx") || path.ends_with(".jsx") {
                report.warning("syntax", Some(path), problem);
            } else {
                report.error("syntax", Some(path), problem);
            }
        }
    }
}

/// First bracket mismatch, skipping strings and comments.
fn bracket_problem(source: &str) -> Option<String> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut line = 1;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if next == '\n' {
                        line += 1;
                    }
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '\'' | '"' | '`' => {
                let mut escaped = false;
                for next in chars.by_ref() {
                    if next == '\n' {
                        line += 1;
                        if c != '`' {
                            break;
                        }
                    }
                    if escaped {
                        escaped = false;
                    } else if next == '\\' {
                        escaped = true;
                    } else if next == c {
                        break;
                    }
                }
            }
            '(' | '[' | '{' => stack.push((c, line)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, open_line)) => {
                        return Some(format!(
                            "line {}: '{}' does not match '{}' opened on line {}",
                            line, c, open, open_line
                        ))
                    }
                    None => return Some(format!("line {}: unmatched '{}'", line, c)),
                }
            }
            _ => {}
        }
    }

    stack
        .last()
        .map(|(open, open_line)| format!("'{}' opened on line {} is never closed", open, open_line))
}

fn check_empty(files: &BTreeMap<String, String>, report: &mut VerifyReport) {
    for (path, content) in files {
        if content.trim().is_empty() {
            report.warning("empty", Some(path), "file is empty");
        }
    }
}

fn check_entry(files: &BTreeMap<String, String>, report: &mut VerifyReport) {
    if !ENTRY_FILES.iter().any(|entry| files.contains_key(*entry)) {
        report.warning(
            "entry",
            None,
            format!("no entry point found (expected one of {})", ENTRY_FILES.join(", ")),
        );
    }
}
