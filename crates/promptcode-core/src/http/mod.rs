//! HTTP API — axum routes over the context assembler.
//!
//! ```text
//! GET  /health                  build metadata
//! GET  /presets                 catalog with token totals
//! GET  /presets/{name}          per-file token breakdown
//! GET  /presets/{name}/tree     rendered file tree (text/plain)
//! POST /presets/{name}/context  full bundle (text/plain)
//! ```

pub mod server;
pub mod types;

pub use server::{AppState, router, serve};
pub use types::*;
