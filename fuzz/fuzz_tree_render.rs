//! Fuzz target for file tree construction and rendering.
//!
//! Run with: cargo +nightly fuzz run fuzz_tree_render
//!
//! Splits the input into newline-separated paths with byte-derived token
//! counts, then builds and renders the tree. Conflicting paths must surface
//! as errors, never panics.

#![no_main]

use libfuzzer_sys::fuzz_target;
use promptcode_core::{FileToken, build_tree, render_tree};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let files: Vec<FileToken> = text
        .lines()
        .take(256)
        .map(|line| FileToken::new(line, line.len()))
        .collect();

    if let Ok(nodes) = build_tree(&files) {
        let first = render_tree(&nodes, 0);
        let second = render_tree(&nodes, 0);
        assert_eq!(first, second);
    }
});
