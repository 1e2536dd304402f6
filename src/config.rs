//! Configuration and limits for gateway connections.

/// Environment variable that enables byte-level pipe logging.
pub const PROXY_DEBUG_ENV: &str = "PROXY_DEBUG";

/// Resource limits for a single connection.
///
/// These bound the memory a slow or hostile peer can pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of a buffered header block in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_header_size: usize,

    /// Capacity of each directional pipe buffer in bytes.
    ///
    /// Default: 16 KB (16 * 1024)
    pub pipe_buffer_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_header_size: 8192,
            pipe_buffer_size: 16 * 1024,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_header_size: usize, pipe_buffer_size: usize) -> Self {
        Self {
            max_header_size,
            pipe_buffer_size,
        }
    }

    /// Create limits suitable for small embedded systems.
    ///
    /// - Max header block: 2 KB
    /// - Pipe buffer: 4 KB
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_header_size: 2048,
            pipe_buffer_size: 4096,
        }
    }

    /// Validate that a buffered header block is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HeaderTooLarge`](crate::Error::HeaderTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_header_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_header_size {
            Err(crate::Error::HeaderTooLarge {
                size,
                max: self.max_header_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Gateway connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Total bytes a pipe half may write before it is cancelled.
    ///
    /// Default: None (unbounded)
    pub transfer_limit: Option<u64>,

    /// Log every byte the pipe writes at `trace` level.
    ///
    /// Default: false
    pub proxy_debug: bool,

    /// Size of the scratch chunk used for a single socket read.
    ///
    /// Default: 4 KB (4096)
    pub read_chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            transfer_limit: None,
            proxy_debug: false,
            read_chunk_size: 4096,
        }
    }
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with `proxy_debug` taken from the `PROXY_DEBUG`
    /// environment variable. Only the literal value `"true"` enables it.
    #[must_use]
    pub fn from_env() -> Self {
        let proxy_debug = std::env::var(PROXY_DEBUG_ENV)
            .map(|v| v == "true")
            .unwrap_or(false);
        Self {
            proxy_debug,
            ..Self::default()
        }
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the per-half transfer limit.
    #[must_use]
    pub const fn with_transfer_limit(mut self, limit: u64) -> Self {
        self.transfer_limit = Some(limit);
        self
    }

    /// Enable or disable byte-level pipe logging.
    #[must_use]
    pub const fn with_proxy_debug(mut self, enabled: bool) -> Self {
        self.proxy_debug = enabled;
        self
    }

    /// Set the read scratch chunk size.
    #[must_use]
    pub const fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }
}
