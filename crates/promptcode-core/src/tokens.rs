//! Token counting with a per-identifier tokenizer cache.
//!
//! Building a BPE tokenizer means decoding its rank table, which is far more
//! expensive than encoding a typical source file. [`TokenizerCache`] builds
//! each tokenizer once, on first use, and hands out shared handles after that.
//! Counts themselves are never cached: every call re-reads and re-encodes.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};

use tiktoken_rs::CoreBPE;
use tracing::debug;

use crate::error::ContextError;

/// Tokenizer used when neither the caller nor the configuration names one.
pub const DEFAULT_TOKENIZER: &str = "gpt-4o";

/// Identifier of the heuristic tokenizer (~4 bytes per token).
pub const APPROX_TOKENIZER: &str = "approx";

/// Something that can turn text into a token count.
pub trait Tokenizer: Send + Sync {
    /// Number of tokens `text` encodes to.
    fn count(&self, text: &str) -> usize;
}

/// A tiktoken byte-pair encoder.
pub struct BpeTokenizer {
    bpe: CoreBPE,
}

impl BpeTokenizer {
    pub fn new(bpe: CoreBPE) -> Self {
        Self { bpe }
    }
}

impl Tokenizer for BpeTokenizer {
    fn count(&self, text: &str) -> usize {
        // Special-token markers inside source files are counted as plain text.
        self.bpe.encode_ordinary(text).len()
    }
}

/// Heuristic tokenizer: one token per four bytes, rounded up.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApproxTokenizer;

impl Tokenizer for ApproxTokenizer {
    fn count(&self, text: &str) -> usize {
        text.len().div_ceil(4)
    }
}

/// Constructs a tokenizer for an identifier, or explains why it cannot.
pub type TokenizerFactory = dyn Fn(&str) -> Result<Arc<dyn Tokenizer>, String> + Send + Sync;

/// Resolve one of the built-in tokenizers.
///
/// Accepts raw encoding names (`o200k_base`, `cl100k_base`, `p50k_base`,
/// `r50k_base`), any model name tiktoken knows about, and [`APPROX_TOKENIZER`].
pub fn builtin_tokenizer(id: &str) -> Result<Arc<dyn Tokenizer>, String> {
    let bpe = match id {
        APPROX_TOKENIZER => return Ok(Arc::new(ApproxTokenizer)),
        "o200k_base" => tiktoken_rs::o200k_base(),
        "cl100k_base" => tiktoken_rs::cl100k_base(),
        "p50k_base" => tiktoken_rs::p50k_base(),
        "r50k_base" => tiktoken_rs::r50k_base(),
        model => tiktoken_rs::get_bpe_from_model(model),
    }
    .map_err(|e| e.to_string())?;
    Ok(Arc::new(BpeTokenizer::new(bpe)))
}

/// Lazily-populated map from tokenizer identifier to tokenizer instance.
///
/// Construct one per process and share it behind an `Arc`. Two tasks asking
/// for the same uncached identifier at the same time may both build it; the
/// first one inserted is kept.
pub struct TokenizerCache {
    factory: Box<TokenizerFactory>,
    instances: RwLock<HashMap<String, Arc<dyn Tokenizer>>>,
}

impl TokenizerCache {
    /// A cache backed by [`builtin_tokenizer`].
    pub fn new() -> Self {
        Self::with_factory(builtin_tokenizer)
    }

    /// A cache backed by a custom factory.
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Result<Arc<dyn Tokenizer>, String> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Get the tokenizer for `id`, building it on first use.
    ///
    /// Blocks while the tokenizer is built; call from a blocking context.
    pub fn get(&self, id: &str) -> Result<Arc<dyn Tokenizer>, ContextError> {
        {
            let instances = self.instances.read().unwrap_or_else(|e| e.into_inner());
            if let Some(tokenizer) = instances.get(id) {
                return Ok(Arc::clone(tokenizer));
            }
        }

        debug!(tokenizer = id, "Initializing tokenizer");
        let built = (self.factory)(id).map_err(|reason| ContextError::Tokenizer {
            id: id.to_string(),
            reason,
        })?;

        let mut instances = self.instances.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(
            instances.entry(id.to_string()).or_insert(built),
        ))
    }

    /// Number of tokenizers built so far.
    pub fn len(&self) -> usize {
        self.instances
            .read()
            .map(|instances| instances.len())
            .unwrap_or(0)
    }

    /// Whether no tokenizer has been built yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TokenizerCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenizerCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loaded: Vec<String> = self
            .instances
            .read()
            .map(|instances| instances.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("TokenizerCache")
            .field("loaded", &loaded)
            .finish()
    }
}

/// Counts the tokens in workspace files.
///
/// Cloning is cheap; clones share the tokenizer cache.
#[derive(Debug, Clone)]
pub struct TokenCounter {
    cache: Arc<TokenizerCache>,
    default_tokenizer: String,
}

impl TokenCounter {
    pub fn new(cache: Arc<TokenizerCache>, default_tokenizer: impl Into<String>) -> Self {
        Self {
            cache,
            default_tokenizer: default_tokenizer.into(),
        }
    }

    /// Tokenizer used when a call does not name one.
    pub fn default_tokenizer(&self) -> &str {
        &self.default_tokenizer
    }

    /// A counter sharing this cache but defaulting to another tokenizer.
    pub fn with_default(&self, tokenizer: impl Into<String>) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            default_tokenizer: tokenizer.into(),
        }
    }

    pub fn cache(&self) -> &Arc<TokenizerCache> {
        &self.cache
    }

    /// Count the tokens in `text` synchronously.
    pub fn count_text(&self, text: &str, tokenizer: Option<&str>) -> Result<usize, ContextError> {
        let id = tokenizer.unwrap_or(&self.default_tokenizer);
        Ok(self.cache.get(id)?.count(text))
    }

    /// Read `path` and count its tokens.
    ///
    /// The file is decoded as UTF-8 with invalid sequences replaced. Encoding
    /// runs on the blocking pool.
    pub async fn count_file(
        &self,
        path: &Path,
        tokenizer: Option<&str>,
    ) -> Result<usize, ContextError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ContextError::FileAccess {
                path: path.to_path_buf(),
                source,
            })?;
        let tokens = self
            .count_owned(String::from_utf8_lossy(&bytes).into_owned(), tokenizer)
            .await?;

        debug!(path = %path.display(), tokens, "Counted tokens");
        Ok(tokens)
    }

    /// Count the tokens in `text` on the blocking pool.
    pub async fn count_owned(
        &self,
        text: String,
        tokenizer: Option<&str>,
    ) -> Result<usize, ContextError> {
        let cache = Arc::clone(&self.cache);
        let id = tokenizer.unwrap_or(&self.default_tokenizer).to_string();
        tokio::task::spawn_blocking(move || cache.get(&id).map(|t| t.count(&text))).await?
    }
}
