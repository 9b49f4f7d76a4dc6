#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Non-blocking bootstrap for slow-to-connect client handles.
//!
//! Database and cache drivers often perform network handshakes inside their
//! constructors. This crate wraps such a constructor in a [`BootstrapGate`]
//! that:
//!
//! - **Starts connecting immediately** on a background task, without blocking
//!   the caller
//! - **Waits with a bound** via [`BootstrapGate::wait_for_ready`]
//! - **Reports health without side effects** via
//!   [`BootstrapGate::check_connection`], which never starts a second attempt
//!
//! Each gate calls its factory exactly once. A failed attempt is terminal for
//! that gate; build a new gate to try again.
//!
//! # Examples
//!
//! ```rust
//! use aerogate::prelude::*;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), GateError> {
//! let config = GateConfig::new("users", "profiles").with_endpoint("127.0.0.1", 3000);
//!
//! let gate = BootstrapGate::from_config(&config, |host: String, port: u16| async move {
//!     tokio::time::sleep(Duration::from_millis(20)).await;
//!     Ok::<_, BoxError>(format!("connected to {host}:{port}"))
//! })?;
//!
//! // Still handshaking: transient, not a fault.
//! assert!(matches!(gate.check_connection(), Err(GateError::AlreadyConnecting)));
//!
//! gate.wait_for_ready(Duration::from_secs(1)).await?;
//! gate.check_connection()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod factory;
pub mod gate;
pub mod status;

pub use config::GateConfig;
pub use error::{BoxError, GateError, InitError, Result};
pub use gate::BootstrapGate;
pub use status::{ConnectionStatus, HealthReport};

/// Convenient re-exports of commonly used items.
///
/// ```rust
/// use aerogate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::GateConfig;
    pub use crate::error::{BoxError, FactoryPanic, GateError, InitError};
    pub use crate::factory::{ConnectionFactory, Liveness, blocking};
    pub use crate::gate::BootstrapGate;
    pub use crate::status::{ConnectionStatus, HealthReport};
    pub use tokio_util::sync::CancellationToken;
}
