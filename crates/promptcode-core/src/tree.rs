//! File tree construction and rendering.
//!
//! A flat list of `(relative path, token count)` pairs becomes an owned
//! hierarchy of [`TreeNode`]s whose siblings are always sorted by name. The
//! text rendering produced by [`render_tree`] is consumed verbatim by the CLI
//! and the HTTP API, so its layout must not drift:
//!
//! ```text
//! a
//!    └─ x.ts  (10)
//!    └─ y.ts  (5)
//! b.ts
//! ```

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed, CollatorPreferences};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ContextError;

/// Indentation added per nesting level.
const INDENT: &str = "   ";

/// Prefix for every non-root line.
const BRANCH: &str = "└─ ";

/// A workspace-relative file and its token count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileToken {
    pub path: String,
    pub tokens: usize,
}

impl FileToken {
    pub fn new(path: impl Into<String>, tokens: usize) -> Self {
        Self {
            path: path.into(),
            tokens,
        }
    }
}

/// A node in the rendered file tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    /// A directory; `children` is non-empty and sorted by name.
    Directory { name: String, children: Vec<TreeNode> },
    /// A file with its token count.
    File { name: String, tokens: usize },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            Self::Directory { name, .. } | Self::File { name, .. } => name,
        }
    }

    /// Token count, for files only.
    pub fn tokens(&self) -> Option<usize> {
        match self {
            Self::File { tokens, .. } => Some(*tokens),
            Self::Directory { .. } => None,
        }
    }

    /// Child nodes; empty for files.
    pub fn children(&self) -> &[TreeNode] {
        match self {
            Self::Directory { children, .. } => children,
            Self::File { .. } => &[],
        }
    }
}

/// Split a workspace-relative path on either separator.
///
/// Empty segments (`a//b`, trailing `/`) and `.` segments are dropped.
pub fn path_segments(rel: &str) -> Vec<&str> {
    rel.split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

/// Resolve a preset path against the workspace root using the platform
/// separator.
pub fn resolve_path(workspace: &Path, rel: &str) -> PathBuf {
    let mut path = workspace.to_path_buf();
    path.extend(path_segments(rel));
    path
}

thread_local! {
    static ROOT_COLLATOR: Option<CollatorBorrowed<'static>> =
        Collator::try_new(CollatorPreferences::default(), CollatorOptions::default())
            .map_err(|e| warn!(error = %e, "Root collator unavailable; sorting by folded case"))
            .ok();
}

/// Sibling order: Unicode collation with the root locale.
///
/// Punctuation sorts before digits and digits before letters (`_x`, `1x`,
/// `tree_builder.rs`, `tree.rs`). Case only breaks ties, lowercase first.
/// Names the collator considers equal fall back to code-point order so
/// distinct names never merge.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    ROOT_COLLATOR
        .with(|collator| match collator {
            Some(collator) => collator.compare(a, b),
            None => a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| b.cmp(a)),
        })
        .then_with(|| a.cmp(b))
}

/// Build a sorted tree from per-file token counts.
///
/// Fails with [`ContextError::PathConflict`] when one entry needs a segment to
/// be a file and another needs it to be a directory, and with
/// [`ContextError::InvalidPreset`] for a path with no segments. Listing the
/// same file twice keeps one node with the later count.
pub fn build_tree(files: &[FileToken]) -> Result<Vec<TreeNode>, ContextError> {
    let mut roots = Vec::new();
    for file in files {
        let segments = path_segments(&file.path);
        if segments.is_empty() {
            return Err(ContextError::InvalidPreset(format!(
                "path {:?} does not name a file",
                file.path
            )));
        }
        insert(&mut roots, &segments, 0, file.tokens)?;
    }
    Ok(roots)
}

fn insert(
    level: &mut Vec<TreeNode>,
    segments: &[&str],
    depth: usize,
    tokens: usize,
) -> Result<(), ContextError> {
    let name = segments[depth];
    let is_leaf = depth + 1 == segments.len();
    let slot = level.binary_search_by(|node| compare_names(node.name(), name));

    if is_leaf {
        match slot {
            Ok(i) => match &mut level[i] {
                TreeNode::File { tokens: existing, .. } => *existing = tokens,
                TreeNode::Directory { .. } => return Err(conflict(segments, depth)),
            },
            Err(i) => level.insert(
                i,
                TreeNode::File {
                    name: name.to_string(),
                    tokens,
                },
            ),
        }
        return Ok(());
    }

    let i = slot.unwrap_or_else(|i| {
        level.insert(
            i,
            TreeNode::Directory {
                name: name.to_string(),
                children: Vec::new(),
            },
        );
        i
    });
    match &mut level[i] {
        TreeNode::Directory { children, .. } => insert(children, segments, depth + 1, tokens),
        TreeNode::File { .. } => Err(conflict(segments, depth)),
    }
}

fn conflict(segments: &[&str], depth: usize) -> ContextError {
    ContextError::PathConflict {
        path: segments[..=depth].join("/"),
    }
}

/// Render nodes as indented text, starting at `depth`.
///
/// Each line is `depth * 3` spaces, then `└─ ` unless at the root, then the
/// name, then `  (N)` for files with a non-zero count. Lines are joined with
/// `\n` and there is no trailing newline.
pub fn render_tree(nodes: &[TreeNode], depth: usize) -> String {
    let mut lines = Vec::new();
    push_lines(nodes, depth, &mut lines);
    lines.join("\n")
}

fn push_lines(nodes: &[TreeNode], depth: usize, lines: &mut Vec<String>) {
    for node in nodes {
        let mut line = INDENT.repeat(depth);
        if depth > 0 {
            line.push_str(BRANCH);
        }
        line.push_str(node.name());
        if let Some(tokens) = node.tokens().filter(|&t| t > 0) {
            line.push_str(&format!("  ({tokens})"));
        }
        lines.push(line);
        push_lines(node.children(), depth + 1, lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn demo() -> Vec<FileToken> {
        vec![
            FileToken::new("a/x.ts", 10),
            FileToken::new("a/y.ts", 5),
            FileToken::new("b.ts", 0),
        ]
    }

    #[test]
    fn test_demo_rendering() {
        let tree = build_tree(&demo()).unwrap();
        assert_eq!(
            render_tree(&tree, 0),
            "a\n   └─ x.ts  (10)\n   └─ y.ts  (5)\nb.ts"
        );
    }

    #[test]
    fn test_structure() {
        let tree = build_tree(&demo()).unwrap();
        assert_eq!(
            tree,
            vec![
                TreeNode::Directory {
                    name: "a".to_string(),
                    children: vec![
                        TreeNode::File {
                            name: "x.ts".to_string(),
                            tokens: 10
                        },
                        TreeNode::File {
                            name: "y.ts".to_string(),
                            tokens: 5
                        },
                    ],
                },
                TreeNode::File {
                    name: "b.ts".to_string(),
                    tokens: 0
                },
            ]
        );
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut reversed = demo();
        reversed.reverse();
        let a = render_tree(&build_tree(&demo()).unwrap(), 0);
        let b = render_tree(&build_tree(&reversed).unwrap(), 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_deep_nesting_and_backslashes() {
        let files = vec![
            FileToken::new("src\\core\\lib.rs", 7),
            FileToken::new("src/main.rs", 3),
        ];
        let tree = build_tree(&files).unwrap();
        assert_eq!(
            render_tree(&tree, 0),
            "src\n   └─ core\n      └─ lib.rs  (7)\n   └─ main.rs  (3)"
        );
    }

    #[test]
    fn test_render_from_nonzero_depth() {
        let tree = build_tree(&[FileToken::new("f.rs", 2)]).unwrap();
        assert_eq!(render_tree(&tree, 2), "      └─ f.rs  (2)");
    }

    #[test]
    fn test_case_insensitive_sort() {
        let files = vec![
            FileToken::new("Zeta.md", 1),
            FileToken::new("alpha.md", 1),
            FileToken::new("Beta.md", 1),
            FileToken::new("beta.md", 1),
        ];
        let tree = build_tree(&files).unwrap();
        let names: Vec<&str> = tree.iter().map(TreeNode::name).collect();
        assert_eq!(names, vec!["alpha.md", "beta.md", "Beta.md", "Zeta.md"]);
    }

    #[test]
    fn test_punctuation_and_digits_sort_before_letters() {
        let files = vec![
            FileToken::new("tree.rs", 1),
            FileToken::new("tree_builder.rs", 1),
            FileToken::new("1x", 1),
            FileToken::new("_x", 1),
        ];
        let tree = build_tree(&files).unwrap();
        assert_eq!(
            render_tree(&tree, 0),
            "_x  (1)\n1x  (1)\ntree_builder.rs  (1)\ntree.rs  (1)"
        );
    }

    #[test]
    fn test_compare_names() {
        assert_eq!(compare_names("a", "A"), Ordering::Less);
        assert_eq!(compare_names("B", "a"), Ordering::Greater);
        assert_eq!(compare_names("lib-a.rs", "lib.rs"), Ordering::Less);
        assert_eq!(compare_names("file2", "file10"), Ordering::Greater);
        assert_eq!(compare_names("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_file_then_directory_conflict() {
        let files = vec![FileToken::new("a", 1), FileToken::new("a/b", 1)];
        let err = build_tree(&files).unwrap_err();
        assert!(matches!(err, ContextError::PathConflict { ref path } if path == "a"));
    }

    #[test]
    fn test_directory_then_file_conflict() {
        let files = vec![FileToken::new("a/b/c", 1), FileToken::new("a/b", 1)];
        let err = build_tree(&files).unwrap_err();
        assert!(matches!(err, ContextError::PathConflict { ref path } if path == "a/b"));
    }

    #[test]
    fn test_duplicate_file_keeps_one_node() {
        let files = vec![FileToken::new("a.rs", 1), FileToken::new("./a.rs", 4)];
        let tree = build_tree(&files).unwrap();
        assert_eq!(render_tree(&tree, 0), "a.rs  (4)");
    }

    #[test]
    fn test_empty_path_rejected() {
        let err = build_tree(&[FileToken::new("//", 1)]).unwrap_err();
        assert!(matches!(err, ContextError::InvalidPreset(_)));
    }

    #[test]
    fn test_empty_input() {
        let tree = build_tree(&[]).unwrap();
        assert!(tree.is_empty());
        assert_eq!(render_tree(&tree, 0), "");
    }

    #[test]
    fn test_resolve_path() {
        let resolved = resolve_path(Path::new("/ws"), "src\\a//b.rs");
        assert_eq!(resolved, Path::new("/ws").join("src").join("a").join("b.rs"));
    }
}
