//! Pipeline configuration loaded from environment variables.

use std::path::PathBuf;

use crate::partition::DEFAULT_PADDING_RATIO;

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Root directory of the cell cache.
    pub cache_root: PathBuf,
    /// Bounding-box padding as a fraction of its diagonal.
    pub padding_ratio: f64,
    /// Read and write the cell cache.
    pub use_cache: bool,
}

impl PipelineConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    ///
    /// - `CONTOUR_CELLS_CACHE_DIR`
    /// - `CONTOUR_CELLS_PADDING`
    /// - `CONTOUR_CELLS_NO_CACHE` (`1`/`true` disables the cache)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            cache_root: lookup("CONTOUR_CELLS_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_root),
            padding_ratio: lookup("CONTOUR_CELLS_PADDING")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|r| r.is_finite() && *r >= 0.0)
                .unwrap_or(defaults.padding_ratio),
            use_cache: !lookup("CONTOUR_CELLS_NO_CACHE")
                .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
        }
    }

    #[must_use]
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    #[must_use]
    pub const fn with_padding_ratio(mut self, ratio: f64) -> Self {
        self.padding_ratio = ratio;
        self
    }

    #[must_use]
    pub const fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from(".cache/cells"),
            padding_ratio: DEFAULT_PADDING_RATIO,
            use_cache: true,
        }
    }
}
