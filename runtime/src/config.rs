//! Runtime configuration.
//!
//! Provides typed configuration with a bon builder and environment variable fallbacks.

use std::num::NonZeroUsize;

use bon::bon;

/// How many loaded kernels a cache keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Insert-only: every artifact ever used stays loaded for the life of the cache.
    #[default]
    Unbounded,

    /// Keep at most `capacity` kernels, evicting the least recently used.
    Bounded { capacity: NonZeroUsize },
}

impl RetentionPolicy {
    /// Parse `unbounded` or a positive integer capacity.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") {
            return Some(Self::Unbounded);
        }
        s.parse::<NonZeroUsize>().ok().map(|capacity| Self::Bounded { capacity })
    }

    pub fn capacity(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Bounded { capacity } => Some(capacity.get()),
        }
    }
}

/// Configuration shared by all calls into one backend variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Kernel cache retention.
    pub retention: RetentionPolicy,
    /// Entry point override; `None` uses the target's conventional name.
    pub entry_point: Option<String>,
    /// Reject arguments whose element count differs from the product of their shape.
    pub strict_shapes: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[bon]
impl RuntimeConfig {
    #[builder]
    pub fn new(
        #[builder(default)] retention: RetentionPolicy,
        #[builder(into)] entry_point: Option<String>,
        #[builder(default = true)] strict_shapes: bool,
    ) -> Self {
        Self { retention, entry_point, strict_shapes }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `AOTCALL_KERNEL_CACHE` - `unbounded` (default) or the maximum number of loaded kernels
    /// * `AOTCALL_ENTRY_POINT` - Entry point override
    /// * `AOTCALL_STRICT_SHAPES=0` - Skip the element count / shape consistency check
    pub fn from_env() -> Self {
        let retention = match std::env::var("AOTCALL_KERNEL_CACHE") {
            Ok(value) => RetentionPolicy::parse(&value).unwrap_or_else(|| {
                tracing::warn!(value = %value, "Ignoring invalid AOTCALL_KERNEL_CACHE, keeping every kernel");
                RetentionPolicy::Unbounded
            }),
            Err(_) => RetentionPolicy::Unbounded,
        };
        let entry_point = std::env::var("AOTCALL_ENTRY_POINT").ok().filter(|s| !s.is_empty());
        let strict_shapes = std::env::var("AOTCALL_STRICT_SHAPES").map(|v| v != "0").unwrap_or(true);

        Self { retention, entry_point, strict_shapes }
    }
}
