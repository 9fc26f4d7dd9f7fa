//! Client configuration.

use std::sync::Arc;
use std::time::Duration;

use protocol_grpcweb::{DEFAULT_MAX_FRAME_LEN, Metadata};

use crate::error::{Error, Result};

/// TLS client configuration for `wss://` endpoints.
#[derive(Clone)]
pub struct TlsClientConfig {
    /// Pre-built rustls ClientConfig. User configures root certs, ALPN, etc.
    pub client_config: Arc<rustls::ClientConfig>,
}

impl std::fmt::Debug for TlsClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsClientConfig").finish_non_exhaustive()
    }
}

/// Configuration shared by the calls a client makes.
#[derive(Debug, Clone)]
pub struct Config {
    /// Target host including scheme, e.g. `https://api.example.com`.
    pub host: String,
    /// Upper bound on establishing the TCP connection. `None` blocks.
    pub connect_timeout: Option<Duration>,
    /// Upper bound on each blocking socket read. When it expires the call
    /// yields no event instead of blocking further. `None` blocks.
    pub read_timeout: Option<Duration>,
    /// Largest frame payload accepted from the server.
    pub max_frame_len: usize,
    /// Metadata sent with every call, ahead of any the call adds.
    pub metadata: Metadata,
    /// TLS configuration for `wss://`. When unset the default webpki roots
    /// are used.
    pub tls: Option<TlsClientConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "http://localhost:8080".to_string(),
            connect_timeout: Some(Duration::from_secs(10)),
            read_timeout: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            metadata: Metadata::new(),
            tls: None,
        }
    }
}

impl Config {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Create a configuration from environment variables.
    ///
    /// Uses:
    /// - `GRPCWEB_HOST` for the target host (required)
    /// - `GRPCWEB_CONNECT_TIMEOUT_MS` for the connect timeout
    /// - `GRPCWEB_READ_TIMEOUT_MS` for the read timeout
    /// - `GRPCWEB_MAX_FRAME_LEN` for the frame size limit in bytes
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("GRPCWEB_HOST")
            .map_err(|_| Error::Config("GRPCWEB_HOST environment variable not set".into()))?;
        let mut config = Self::new(host);

        if let Some(ms) = env_u64("GRPCWEB_CONNECT_TIMEOUT_MS")? {
            config.connect_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = env_u64("GRPCWEB_READ_TIMEOUT_MS")? {
            config.read_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(len) = env_u64("GRPCWEB_MAX_FRAME_LEN")? {
            config.max_frame_len = usize::try_from(len)
                .map_err(|_| Error::Config(format!("GRPCWEB_MAX_FRAME_LEN out of range: {len}")))?;
        }

        Ok(config)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Add a header sent with every call.
    pub fn with_metadata(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.metadata.append(name, value);
        self
    }

    pub fn with_tls(mut self, client_config: Arc<rustls::ClientConfig>) -> Self {
        self.tls = Some(TlsClientConfig { client_config });
        self
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{name} is not an integer: {raw}"))),
        Err(_) => Ok(None),
    }
}
