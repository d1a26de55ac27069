//! Architectural Enforcement Integration Tests
//!
//! Helpers shared by the tests in `tests/`. They walk the production sources
//! of the workspace crates and let each test apply one rule per line:
//! - No blocking sleeps, only awaited timers (and those only for retries)
//! - No blocking I/O inside async code
//! - No `unwrap()`/`expect()` on runtime paths
//!
//! Test code is excluded: a file is cut at its first `#[cfg(test)]`, and
//! test-only modules are skipped entirely.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source roots, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["lamapbx/core/src", "lamapbx/cli/src"];

/// Files that only exist for tests
const TEST_ONLY_FILES: &[&str] = &["test_utils.rs"];

/// Workspace root, resolved from this crate's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Production part of one source file
pub struct SourceFile {
    /// Path relative to the workspace root
    pub path: PathBuf,
    /// Lines up to (not including) the first `#[cfg(test)]`
    pub lines: Vec<String>,
}

impl SourceFile {
    /// Production lines with their 1-based line numbers, comments stripped
    pub fn code_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines.iter().enumerate().filter_map(|(idx, line)| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("//") {
                return None;
            }
            let code = line.split("//").next().unwrap_or(line);
            Some((idx + 1, code))
        })
    }

    /// Whether `line_number` falls inside an `async fn`
    #[must_use]
    pub fn in_async_fn(&self, line_number: usize) -> bool {
        enclosing_fn(&self.lines, line_number.saturating_sub(1))
            .is_some_and(|signature| signature.contains("async fn "))
    }

    /// File name, e.g. `retry.rs`
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Format a violation for reporting
    #[must_use]
    pub fn violation(&self, line_number: usize, what: &str) -> String {
        let line = self
            .lines
            .get(line_number.saturating_sub(1))
            .map_or("", |l| l.trim());
        format!("{}:{} - {}: {}", self.path.display(), line_number, what, line)
    }
}

/// Cut a file's content at its test module
#[must_use]
pub fn production_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .take_while(|line| !line.trim_start().starts_with("#[cfg(test)]"))
        .map(str::to_string)
        .collect()
}

/// Nearest function signature at or above `idx`
#[must_use]
pub fn enclosing_fn(lines: &[String], idx: usize) -> Option<&str> {
    let end = idx.min(lines.len().saturating_sub(1));
    lines[..=end]
        .iter()
        .rev()
        .map(|l| l.trim())
        .find(|l| {
            l.starts_with("fn ")
                || l.contains(" fn ")
                || l.starts_with("async fn ")
        })
}

/// Load the production sources of every crate in [`PRODUCTION_DIRS`]
#[must_use]
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    let mut sources = Vec::new();

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }

        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(Result::ok)
        {
            let file = entry.path();
            if file.extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if TEST_ONLY_FILES.contains(&name) {
                continue;
            }
            let Ok(content) = fs::read_to_string(file) else {
                continue;
            };
            sources.push(SourceFile {
                path: file.strip_prefix(&root).unwrap_or(file).to_path_buf(),
                lines: production_lines(&content),
            });
        }
    }

    sources
}

/// Print violations and fail the calling test
///
/// # Panics
///
/// Panics when `violations` is non-empty.
pub fn report(rule: &str, violations: &[String]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {rule}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!(
        "\nFound {} violation(s) of: {rule}.\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &[&str]) -> Vec<String> {
        src.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let content = "fn a() {}\n#[cfg(test)]\nmod tests {\n    fn b() { x.unwrap(); }\n}\n";
        assert_eq!(production_lines(content), vec!["fn a() {}".to_string()]);
    }

    #[test]
    fn test_enclosing_fn_detection() {
        let src = lines(&[
            "pub fn load(path: &Path) -> Result<()> {",
            "    let content = std::fs::read_to_string(path)?;",
            "}",
            "pub async fn send(&self) {",
            "    let body = response.text().await?;",
            "}",
        ]);
        assert_eq!(enclosing_fn(&src, 1), Some("pub fn load(path: &Path) -> Result<()> {"));
        assert!(enclosing_fn(&src, 4).is_some_and(|s| s.contains("async fn ")));
    }

    #[test]
    fn test_workspace_root_contains_production_dirs() {
        let root = workspace_root();
        for dir in PRODUCTION_DIRS {
            assert!(root.join(dir).exists(), "{dir} should exist");
        }
    }
}
