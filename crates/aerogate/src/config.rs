//! Configuration for a bootstrap gate

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GateError, Result};

/// Default host the factory connects to.
pub const DEFAULT_HOSTNAME: &str = "127.0.0.1";

/// Default service port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default bound for `BootstrapGate::wait_ready`.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection parameters and identifiers for one gate.
///
/// `hostname` and `port` are passed through to the connection factory
/// untouched. `namespace` and `set` identify the target resource and must be
/// non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Host passed to the connection factory
    pub hostname: String,

    /// Port passed to the connection factory
    pub port: u16,

    /// Target namespace
    pub namespace: String,

    /// Target set within the namespace
    pub set: String,

    /// Default bound used when waiting for readiness
    #[serde(rename = "ready_timeout_ms", with = "duration_millis")]
    pub ready_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            port: DEFAULT_PORT,
            namespace: String::new(),
            set: String::new(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }
}

impl GateConfig {
    /// Create a configuration targeting `namespace`/`set` on the default endpoint.
    pub fn new(namespace: impl Into<String>, set: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.into(),
            ..Default::default()
        }
    }

    /// Set the endpoint handed to the connection factory.
    pub fn with_endpoint(mut self, hostname: impl Into<String>, port: u16) -> Self {
        self.hostname = hostname.into();
        self.port = port;
        self
    }

    /// Set the default readiness wait bound.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Check the mandatory identifiers.
    pub fn validate(&self) -> Result<()> {
        validate_target(&self.namespace, &self.set)
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    /// This will look for:
    /// - `AEROGATE_HOSTNAME` for the host
    /// - `AEROGATE_PORT` for the port
    /// - `AEROGATE_NAMESPACE` for the namespace
    /// - `AEROGATE_SET` for the set
    /// - `AEROGATE_READY_TIMEOUT_MS` for the readiness wait bound (in milliseconds)
    ///
    /// Unset variables keep their defaults. The result is not validated; the
    /// gate constructor does that.
    ///
    /// # Errors
    ///
    /// `GateError::InvalidConfig` if the `.env` file exists but cannot be
    /// read or parsed, or if a numeric variable does not parse.
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self> {
        load_dotenv(dotenvy::dotenv())?;
        Self::from_process_env()
    }

    /// Like [`from_env`](Self::from_env), but loads the dotenv file at `path`.
    ///
    /// A missing file is not an error.
    #[cfg(feature = "env")]
    pub fn from_env_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        load_dotenv(dotenvy::from_path(path.as_ref()))?;
        Self::from_process_env()
    }

    #[cfg(feature = "env")]
    fn from_process_env() -> Result<Self> {
        use std::env;

        let mut config = Self::default();

        if let Ok(hostname) = env::var("AEROGATE_HOSTNAME") {
            config.hostname = hostname;
        }

        if let Ok(port) = env::var("AEROGATE_PORT") {
            config.port = port.parse().map_err(|e| {
                GateError::InvalidConfig(format!("AEROGATE_PORT={port:?}: {e}"))
            })?;
        }

        if let Ok(namespace) = env::var("AEROGATE_NAMESPACE") {
            config.namespace = namespace;
        }

        if let Ok(set) = env::var("AEROGATE_SET") {
            config.set = set;
        }

        if let Ok(timeout) = env::var("AEROGATE_READY_TIMEOUT_MS") {
            let millis: u64 = timeout.parse().map_err(|e| {
                GateError::InvalidConfig(format!("AEROGATE_READY_TIMEOUT_MS={timeout:?}: {e}"))
            })?;
            config.ready_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }
}

// dotenvy stops at the first bad line, so anything but a missing file means
// later variables were never loaded.
#[cfg(feature = "env")]
fn load_dotenv<T>(result: std::result::Result<T, dotenvy::Error>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(GateError::InvalidConfig(format!(".env: {e}"))),
    }
}

/// Validate gate identifiers.
///
/// `set` is checked first, so an entirely empty target reports `EmptySet`.
pub fn validate_target(namespace: &str, set: &str) -> Result<()> {
    if set.is_empty() {
        return Err(GateError::EmptySet);
    }
    if namespace.is_empty() {
        return Err(GateError::EmptyNamespace);
    }
    Ok(())
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
