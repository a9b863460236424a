#![deny(unsafe_code)]

//! Shared test utilities for the promptcode workspace.
//!
//! Provides temporary workspaces with preset fixtures, config builders, and
//! tracing helpers so that individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! promptcode-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod tracing_setup;
pub mod workspace;

pub use config::TestConfigBuilder;
pub use workspace::TestWorkspace;
