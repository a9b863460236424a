//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::Path;

use promptcode_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .workspace(ws.path())
///     .tokenizer("approx")
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn workspace(mut self, root: &Path) -> Self {
        self.config.workspace.root = Some(root.display().to_string());
        self
    }

    pub fn tokenizer(mut self, id: &str) -> Self {
        self.config.tokenizer.default = id.to_string();
        self
    }

    pub fn max_concurrent_reads(mut self, n: usize) -> Self {
        self.config.pipeline.max_concurrent_reads = n;
        self
    }

    pub fn listen_port(mut self, port: u16) -> Self {
        self.config.server.listen_port = port;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
