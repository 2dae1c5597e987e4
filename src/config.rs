//! Configuration shared by groups, the relocator, and the runner.

use std::path::PathBuf;

/// Environment variable holding a substring filter for unit names.
pub const FILTER_ENV: &str = "FIXTURE_MATRIX_FILTER";

/// Environment variable that, when set to anything but `0`, disables source reading.
pub const NO_SOURCE_ENV: &str = "FIXTURE_MATRIX_NO_SOURCE";

/// Naming conventions and diagnostic settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // === Naming ===
    /// Prefix of synthesized and plain test unit names.
    pub test_prefix: String,

    /// Prefix of reserved/internal entry names.
    pub reserved_prefix: String,

    /// Name of the shared test-function slot. Must start with `reserved_prefix`.
    pub shared_slot: String,

    // === Diagnostics ===
    /// Read declaring source files to quote lines and locate undeclared fixtures.
    pub read_source: bool,

    /// Directories tried, in order, for relative source paths that do not resolve
    /// against the working directory.
    pub source_roots: Vec<PathBuf>,

    // === Runner ===
    /// Run only units whose name contains this substring.
    pub filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            test_prefix: "test_".to_string(),
            reserved_prefix: "_".to_string(),
            shared_slot: "_test".to_string(),
            read_source: true,
            source_roots: std::env::var_os("CARGO_MANIFEST_DIR")
                .map(PathBuf::from)
                .into_iter()
                .collect(),
            filter: None,
        }
    }
}

impl Config {
    /// Defaults overridden by [`FILTER_ENV`] and [`NO_SOURCE_ENV`].
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(filter) = std::env::var(FILTER_ENV) {
            if !filter.is_empty() {
                config.filter = Some(filter);
            }
        }
        if let Ok(value) = std::env::var(NO_SOURCE_ENV) {
            if !value.is_empty() && value != "0" {
                config.read_source = false;
            }
        }
        config
    }

    // === Builder methods ===

    /// Set the test prefix.
    pub fn with_test_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.test_prefix = prefix.into();
        self
    }

    /// Set the reserved prefix.
    pub fn with_reserved_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reserved_prefix = prefix.into();
        self
    }

    /// Set the shared slot name.
    pub fn with_shared_slot(mut self, slot: impl Into<String>) -> Self {
        self.shared_slot = slot.into();
        self
    }

    /// Enable or disable source reading.
    pub fn with_read_source(mut self, read_source: bool) -> Self {
        self.read_source = read_source;
        self
    }

    /// Append a source root.
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_roots.push(root.into());
        self
    }

    /// Set the unit name filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Synthesized unit name for fixture `name`.
    pub fn test_name(&self, name: &str) -> String {
        format!("{}{}", self.test_prefix, name)
    }

    /// Returns `true` if `name` is reserved/internal.
    pub fn is_reserved(&self, name: &str) -> bool {
        name.starts_with(&self.reserved_prefix)
    }

    /// Returns `true` if `name` has the test prefix.
    pub fn is_test_name(&self, name: &str) -> bool {
        name.starts_with(&self.test_prefix)
    }

    /// Returns `true` if unit `name` passes the filter.
    pub fn selects(&self, name: &str) -> bool {
        self.filter.as_deref().map_or(true, |f| name.contains(f))
    }
}
