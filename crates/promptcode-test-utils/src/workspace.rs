//! Temporary workspaces for pipeline tests.
//!
//! [`TestWorkspace`] owns a temp directory laid out like a real project: plain
//! files anywhere under the root and preset documents under
//! `.promptcode/presets/`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use promptcode_core::preset::PRESETS_DIR;
use promptcode_core::tokens::{APPROX_TOKENIZER, TokenCounter, TokenizerCache};
use promptcode_core::{ContextAssembler, sanitize_name};
use tempfile::TempDir;

/// Content of `a/x.ts` in [`TestWorkspace::demo`]: 40 bytes, 10 approx tokens.
pub const DEMO_X: &str = "export const x = 'xxxxxxxxxxxxxxxxxxxx';";
/// Content of `a/y.ts` in [`TestWorkspace::demo`]: 20 bytes, 5 approx tokens.
pub const DEMO_Y: &str = "export const y = 1;\n";

/// A test-scoped workspace directory.
///
/// The directory is deleted when this value is dropped, even on panic.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// An empty workspace with no preset directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// The `demo` fixture: `a/x.ts` (10 tokens), `a/y.ts` (5), `b.ts` (0),
    /// under the approx tokenizer.
    pub fn demo() -> Self {
        let ws = Self::new();
        ws.write_file("a/x.ts", DEMO_X);
        ws.write_file("a/y.ts", DEMO_Y);
        ws.write_file("b.ts", "");
        ws.write_preset_document(
            "demo",
            &serde_json::json!({
                "name": "demo",
                "description": "demo preset",
                "files": ["a/x.ts", "a/y.ts", "b.ts"],
            }),
        );
        ws
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn presets_dir(&self) -> PathBuf {
        self.path().join(PRESETS_DIR)
    }

    /// Write `content` to a workspace-relative path, creating parents.
    pub fn write_file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(&path, content).expect("failed to write test file");
        path
    }

    /// Write a preset document for `name` listing `files`.
    pub fn write_preset(&self, name: &str, files: &[&str]) -> PathBuf {
        self.write_preset_document(
            name,
            &serde_json::json!({ "name": name, "files": files }),
        )
    }

    /// Write an arbitrary JSON document where the store would save `name`.
    pub fn write_preset_document(&self, name: &str, doc: &serde_json::Value) -> PathBuf {
        let dir = self.presets_dir();
        std::fs::create_dir_all(&dir).expect("failed to create preset dir");
        let path = dir.join(format!("{}.json", sanitize_name(name)));
        let json = serde_json::to_string_pretty(doc).expect("failed to encode preset");
        std::fs::write(&path, json).expect("failed to write preset");
        path
    }

    /// An assembler over this workspace using the approx tokenizer.
    pub fn assembler(&self) -> ContextAssembler {
        self.assembler_with(Arc::new(TokenizerCache::new()))
    }

    /// An assembler over this workspace sharing `cache`.
    pub fn assembler_with(&self, cache: Arc<TokenizerCache>) -> ContextAssembler {
        ContextAssembler::new(self.path(), TokenCounter::new(cache, APPROX_TOKENIZER), 4)
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
