#![deny(unsafe_code)]

//! promptcode core — preset resolution, token accounting, tree rendering, and
//! context assembly.
//!
//! A *preset* is a named, ordered list of workspace files. The
//! [`ContextAssembler`] turns one into a token-annotated file tree, a full
//! text bundle of the files' contents, or a catalog row, and the [`http`]
//! module exposes those modes over HTTP.
//!
//! ```text
//!   PresetStore ──▶ TokenCounter (fan-out) ──▶ build_tree ──▶ render_tree
//!        │                                                        │
//!        └────────────── ContextAssembler ◀───────────────────────┘
//! ```

/// Context assembler — tree, bundle, listing, and detail modes.
pub mod assembler;
/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Error taxonomy shared by every component.
pub mod error;
/// HTTP routes over the assembler.
pub mod http;
/// Preset documents and the on-disk preset store.
pub mod preset;
/// Tokenizers, the tokenizer cache, and the file token counter.
pub mod tokens;
/// File tree construction and rendering.
pub mod tree;

pub use assembler::{Bundle, BundleFile, ContextAssembler, PresetDetail, PresetSummary};
pub use error::{ContextError, ErrorKind};
pub use preset::{Preset, PresetStore, sanitize_name};
pub use tokens::{TokenCounter, Tokenizer, TokenizerCache};
pub use tree::{FileToken, TreeNode, build_tree, render_tree};
