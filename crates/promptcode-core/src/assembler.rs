//! Context assembler — turns a preset into a tree, a bundle, or a catalog row.
//!
//! Every mode resolves the preset first and then fans out per-file work
//! concurrently under a limit owned by that call alone. Results land in slots
//! indexed by the file's position in the preset, so output order never
//! depends on which read finishes first. The first failing file aborts the
//! remaining tasks and fails the whole call; no partial bundle is ever
//! produced.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use promptcode_config::AppConfig;

use crate::error::ContextError;
use crate::preset::{Preset, PresetStore};
use crate::tokens::{TokenCounter, TokenizerCache};
use crate::tree::{FileToken, build_tree, render_tree, resolve_path};

/// Catalog row for one preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetSummary {
    pub name: String,
    pub file_count: usize,
    pub total_tokens: usize,
}

/// One preset with its per-file token breakdown, in declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetDetail {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub files: Vec<FileToken>,
    pub total_tokens: usize,
}

/// A file's contents as placed in a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    pub path: String,
    pub content: String,
}

/// A fully assembled context bundle.
///
/// The [`Display`](fmt::Display) form is the wire format:
///
/// ```text
/// # File Tree
///
/// <tree>
///
/// # File Contents
///
/// // --- <path> ---
/// <content>
///
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub tree: String,
    /// Files in the preset's declared order.
    pub files: Vec<BundleFile>,
}

impl Bundle {
    /// Total bytes of file content carried by the bundle.
    pub fn content_bytes(&self) -> usize {
        self.files.iter().map(|f| f.content.len()).sum()
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "# File Tree\n\n{}\n\n# File Contents\n\n", self.tree)?;
        for file in &self.files {
            write!(f, "// --- {} ---\n{}\n\n", file.path, file.content)?;
        }
        Ok(())
    }
}

/// Orchestrates the preset store, token counter, and tree builder for one
/// workspace.
///
/// Cloning is cheap; clones share only the tokenizer cache.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    workspace: PathBuf,
    store: PresetStore,
    counter: TokenCounter,
    max_concurrent: usize,
}

impl ContextAssembler {
    /// Create an assembler for `workspace`.
    ///
    /// Each call reads or counts at most `max_concurrent` files at once
    /// (minimum 1).
    pub fn new(workspace: impl Into<PathBuf>, counter: TokenCounter, max_concurrent: usize) -> Self {
        let workspace = workspace.into();
        Self {
            store: PresetStore::new(&workspace),
            workspace,
            counter,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Create an assembler from resolved configuration.
    pub fn from_config(config: &AppConfig, cache: Arc<TokenizerCache>) -> Self {
        Self::new(
            config.workspace_root(),
            TokenCounter::new(cache, config.tokenizer.default.clone()),
            config.pipeline.max_concurrent_reads,
        )
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn store(&self) -> &PresetStore {
        &self.store
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// A view of this assembler that counts with another tokenizer.
    pub fn with_tokenizer(&self, tokenizer: impl Into<String>) -> Self {
        Self {
            counter: self.counter.with_default(tokenizer),
            ..self.clone()
        }
    }

    /// Summaries of every preset in the workspace.
    pub async fn list(&self) -> Result<Vec<PresetSummary>, ContextError> {
        let presets = self.store.load_all().await?;
        let mut summaries = Vec::with_capacity(presets.len());
        for preset in presets {
            let files = self.file_tokens(&preset).await?;
            summaries.push(PresetSummary {
                file_count: preset.files.len(),
                total_tokens: total_tokens(&files),
                name: preset.name,
            });
        }
        Ok(summaries)
    }

    /// Per-file token breakdown for one preset.
    pub async fn detail(&self, name: &str) -> Result<PresetDetail, ContextError> {
        let preset = self.store.load_by_name(name).await?;
        let files = self.file_tokens(&preset).await?;
        Ok(PresetDetail {
            name: preset.name,
            description: preset.description,
            total_tokens: total_tokens(&files),
            files,
        })
    }

    /// Rendered file tree for one preset.
    pub async fn tree(&self, name: &str) -> Result<String, ContextError> {
        let preset = self.store.load_by_name(name).await?;
        let files = self.file_tokens(&preset).await?;
        render(&files)
    }

    /// Tree plus concatenated contents for one preset.
    ///
    /// Each file is read once; its count and its bundled content come from
    /// the same read.
    pub async fn bundle(&self, name: &str) -> Result<Bundle, ContextError> {
        let preset = self.store.load_by_name(name).await?;

        let counter = self.counter.clone();
        let workspace = self.workspace.clone();
        let loaded = ordered_fan_out(self.max_concurrent, preset.files.iter().cloned(), move |rel| {
            let counter = counter.clone();
            let abs = resolve_path(&workspace, &rel);
            async move {
                let content = read_text(&abs).await?;
                let tokens = counter.count_owned(content.clone(), None).await?;
                Ok::<_, ContextError>((
                    FileToken::new(rel.clone(), tokens),
                    BundleFile { path: rel, content },
                ))
            }
        })
        .await?;

        let (tokens, files): (Vec<FileToken>, Vec<BundleFile>) = loaded.into_iter().unzip();
        let bundle = Bundle {
            tree: render(&tokens)?,
            files,
        };
        debug!(
            preset = %preset.name,
            files = bundle.files.len(),
            bytes = bundle.content_bytes(),
            "Assembled bundle"
        );
        Ok(bundle)
    }

    async fn file_tokens(&self, preset: &Preset) -> Result<Vec<FileToken>, ContextError> {
        let counter = self.counter.clone();
        let workspace = self.workspace.clone();
        let files = ordered_fan_out(self.max_concurrent, preset.files.iter().cloned(), move |rel| {
            let counter = counter.clone();
            let abs = resolve_path(&workspace, &rel);
            async move {
                let tokens = counter.count_file(&abs, None).await?;
                Ok::<_, ContextError>(FileToken::new(rel, tokens))
            }
        })
        .await?;
        debug!(
            preset = %preset.name,
            files = files.len(),
            tokens = total_tokens(&files),
            "Counted preset"
        );
        Ok(files)
    }
}

fn total_tokens(files: &[FileToken]) -> usize {
    files.iter().map(|f| f.tokens).sum()
}

fn render(files: &[FileToken]) -> Result<String, ContextError> {
    Ok(render_tree(&build_tree(files)?, 0))
}

async fn read_text(path: &Path) -> Result<String, ContextError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ContextError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Run `task` for every input concurrently and return the results in input
/// order.
///
/// At most `limit` tasks run at once; the permits belong to this call. On
/// the first error the remaining tasks are aborted and the error is returned.
pub async fn ordered_fan_out<I, R, F, Fut>(
    limit: usize,
    inputs: I,
    task: F,
) -> Result<Vec<R>, ContextError>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = Result<R, ContextError>> + Send + 'static,
    R: Send + 'static,
{
    let limit = Arc::new(Semaphore::new(limit.max(1)));
    let mut set = JoinSet::new();
    let mut slots: Vec<Option<R>> = Vec::new();

    for (index, input) in inputs.into_iter().enumerate() {
        let fut = task(input);
        let limit = Arc::clone(&limit);
        slots.push(None);
        set.spawn(async move {
            let _permit = limit.acquire_owned().await;
            (index, fut.await)
        });
    }

    // Dropping `set` on an early return aborts whatever is still running.
    while let Some(joined) = set.join_next().await {
        let (index, result) = joined?;
        slots[index] = Some(result?);
    }

    Ok(slots.into_iter().flatten().collect())
}
