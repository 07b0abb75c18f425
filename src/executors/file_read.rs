//! `file_read` executor: read the full contents of one or more files.
//!
//! Grounded on `km-tools::tools::editor_edit`'s `fs::read_to_string` +
//! formatted-error-string convention: a missing or unreadable file is
//! reported back as `{path, content: "<error text>", size: 0}` data, not as
//! a propagated `ToolError` — from the model's perspective "the file
//! doesn't exist" is a useful answer, not a crash.

use crate::error::ToolError;
use crate::executors::Executor;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct Args {
    #[serde(rename = "filePaths")]
    file_paths: Vec<String>,
}

pub struct FileReadExecutor {
    /// Directory reads are confined to; `None` permits any absolute path.
    pub confine_to: Option<PathBuf>,
}

impl FileReadExecutor {
    pub fn new(confine_to: Option<PathBuf>) -> Self {
        Self { confine_to }
    }

    fn resolve(&self, raw_path: &str) -> Result<PathBuf, String> {
        let requested = PathBuf::from(raw_path);
        let Some(root) = &self.confine_to else {
            return Ok(requested);
        };

        let candidate = if requested.is_absolute() {
            requested
        } else {
            root.join(requested)
        };

        let canonical_root = root
            .canonicalize()
            .map_err(|e| format!("cannot resolve vault root: {}", e))?;
        let canonical_candidate = candidate
            .canonicalize()
            .map_err(|e| format!("no such file: {}", e))?;

        if !canonical_candidate.starts_with(&canonical_root) {
            return Err("path escapes the configured vault root".to_string());
        }
        Ok(canonical_candidate)
    }

    async fn read_one(&self, raw_path: &str) -> Value {
        let path = match self.resolve(raw_path) {
            Ok(path) => path,
            Err(message) => {
                return serde_json::json!({ "path": raw_path, "content": message, "size": 0 })
            }
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let size = content.len();
                serde_json::json!({ "path": path.display().to_string(), "content": content, "size": size })
            }
            Err(err) => serde_json::json!({
                "path": path.display().to_string(),
                "content": format!("failed to read {}: {}", path.display(), err),
                "size": 0
            }),
        }
    }
}

#[async_trait]
impl Executor for FileReadExecutor {
    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
        let args: Args = serde_json::from_value(arguments.clone())
            .map_err(|e| ToolError::ExecutionFailed(format!("bad arguments: {}", e)))?;

        // Empty filePaths (e.g. after C3 deselects every file) ⇒ [] and the
        // loop continues; no filesystem touched.
        if args.file_paths.is_empty() {
            return Ok(serde_json::json!({ "results": [] }));
        }

        let mut results = Vec::with_capacity(args.file_paths.len());
        for raw_path in &args.file_paths {
            results.push(self.read_one(raw_path).await);
        }

        Ok(serde_json::json!({ "results": results }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn reads_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.md");
        fs::write(&file, "hello vault").unwrap();

        let executor = FileReadExecutor::new(None);
        let result = executor
            .execute(&serde_json::json!({ "filePaths": [file.to_str().unwrap()] }))
            .await
            .unwrap();
        let results = result["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["content"], "hello vault");
        assert_eq!(results[0]["size"], 11);
    }

    #[tokio::test]
    async fn missing_file_reports_error_in_content_with_zero_size() {
        let executor = FileReadExecutor::new(None);
        let result = executor
            .execute(&serde_json::json!({ "filePaths": ["/no/such/file.md"] }))
            .await
            .unwrap();
        let results = result["results"].as_array().unwrap();
        assert_eq!(results[0]["size"], 0);
        assert!(results[0]["content"].as_str().unwrap().contains("failed to read"));
    }

    #[tokio::test]
    async fn empty_file_paths_returns_empty_results() {
        let executor = FileReadExecutor::new(None);
        let result = executor
            .execute(&serde_json::json!({ "filePaths": [] }))
            .await
            .unwrap();
        assert_eq!(result["results"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn scenario_s4_reads_only_the_selected_subset() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A.md"), "a").unwrap();
        fs::write(dir.path().join("C.md"), "c").unwrap();
        let executor = FileReadExecutor::new(None);

        let a = dir.path().join("A.md");
        let c = dir.path().join("C.md");
        let result = executor
            .execute(&serde_json::json!({ "filePaths": [a.to_str().unwrap(), c.to_str().unwrap()] }))
            .await
            .unwrap();
        assert_eq!(result["results"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn confinement_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let inside = dir.path().join("inside.md");
        fs::write(&inside, "ok").unwrap();
        let outside_dir = tempfile::tempdir().unwrap();
        let outside = outside_dir.path().join("secret.md");
        fs::write(&outside, "nope").unwrap();

        let executor = FileReadExecutor::new(Some(dir.path().to_path_buf()));
        let result = executor
            .execute(&serde_json::json!({ "filePaths": [outside.to_str().unwrap()] }))
            .await
            .unwrap();
        let results = result["results"].as_array().unwrap();
        assert!(results[0]["content"].as_str().unwrap().contains("escapes"));
    }
}
