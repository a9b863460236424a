//! Fuzz target for preset document parsing.
//!
//! Run with: cargo +nightly fuzz run fuzz_preset_parser
//!
//! Feeds arbitrary bytes through the preset JSON decoder and, on success,
//! through name sanitization and re-serialization.

#![no_main]

use libfuzzer_sys::fuzz_target;
use promptcode_core::{Preset, sanitize_name};

fuzz_target!(|data: &[u8]| {
    let Ok(preset) = serde_json::from_slice::<Preset>(data) else {
        return;
    };

    let sanitized = sanitize_name(&preset.name);
    assert!(
        sanitized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    );

    let json = serde_json::to_string(&preset).expect("preset serializes");
    let reparsed: Preset = serde_json::from_str(&json).expect("preset reparses");
    assert_eq!(reparsed, preset);
});
