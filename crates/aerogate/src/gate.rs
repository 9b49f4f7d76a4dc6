//! The bootstrap gate.
//!
//! A [`BootstrapGate`] starts one connection attempt in the background as
//! soon as it is constructed and lets any number of callers wait for, or poll,
//! the outcome. The outcome is written once into a `OnceCell` and only then
//! broadcast through a `watch` channel, so a caller that sees the gate ready
//! always sees the full result.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{OnceCell, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{DEFAULT_READY_TIMEOUT, GateConfig, validate_target};
use crate::error::{GateError, InitError, Result};
use crate::factory::{ConnectionFactory, Liveness};
use crate::status::{ConnectionStatus, HealthReport};

/// Non-blocking wrapper around a slow-to-connect client handle.
///
/// Cloning is cheap; clones observe the same connection attempt.
///
/// # Examples
///
/// ```rust
/// use aerogate::prelude::*;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), GateError> {
/// let gate = BootstrapGate::new("127.0.0.1", 3000, "users", "profiles", |host: String, port: u16| async move {
///     // Slow handshake goes here
///     Ok::<_, BoxError>(format!("{host}:{port}"))
/// })?;
///
/// gate.wait_for_ready(Duration::from_secs(1)).await?;
/// gate.check_connection()?;
/// assert_eq!(gate.handle().map(String::as_str), Some("127.0.0.1:3000"));
/// # Ok(())
/// # }
/// ```
pub struct BootstrapGate<H> {
    inner: Arc<Inner<H>>,
}

struct Inner<H> {
    hostname: String,
    port: u16,
    namespace: String,
    set: String,
    ready_timeout: Duration,
    outcome: OnceCell<std::result::Result<H, InitError>>,
    ready: watch::Receiver<bool>,
}

impl<H> BootstrapGate<H>
where
    H: Send + Sync + 'static,
{
    /// Validate the target and start connecting in the background.
    ///
    /// Returns as soon as the bootstrap task is spawned; the factory's own
    /// errors surface later through [`check_connection`](Self::check_connection).
    ///
    /// # Errors
    ///
    /// `GateError::EmptySet` if `set` is empty, otherwise
    /// `GateError::EmptyNamespace` if `namespace` is empty.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new<F>(
        hostname: impl Into<String>,
        port: u16,
        namespace: impl Into<String>,
        set: impl Into<String>,
        factory: F,
    ) -> Result<Self>
    where
        F: ConnectionFactory<H> + 'static,
    {
        Self::spawn(
            hostname.into(),
            port,
            namespace.into(),
            set.into(),
            DEFAULT_READY_TIMEOUT,
            factory,
        )
    }

    /// Start a gate from a [`GateConfig`].
    ///
    /// The config's `ready_timeout` becomes the bound used by
    /// [`wait_ready`](Self::wait_ready).
    pub fn from_config<F>(config: &GateConfig, factory: F) -> Result<Self>
    where
        F: ConnectionFactory<H> + 'static,
    {
        Self::spawn(
            config.hostname.clone(),
            config.port,
            config.namespace.clone(),
            config.set.clone(),
            config.ready_timeout,
            factory,
        )
    }

    fn spawn<F>(
        hostname: String,
        port: u16,
        namespace: String,
        set: String,
        ready_timeout: Duration,
        factory: F,
    ) -> Result<Self>
    where
        F: ConnectionFactory<H> + 'static,
    {
        validate_target(&namespace, &set)?;

        let (ready_tx, ready_rx) = watch::channel(false);
        let inner = Arc::new(Inner {
            hostname,
            port,
            namespace,
            set,
            ready_timeout,
            outcome: OnceCell::new(),
            ready: ready_rx,
        });

        debug!(
            namespace = %inner.namespace,
            set = %inner.set,
            hostname = %inner.hostname,
            port = inner.port,
            "Spawning client bootstrap"
        );
        tokio::spawn(bootstrap(Arc::clone(&inner), factory, ready_tx));

        Ok(Self { inner })
    }
}

/// The one and only factory invocation for a gate.
async fn bootstrap<H, F>(inner: Arc<Inner<H>>, factory: F, ready_tx: watch::Sender<bool>)
where
    H: Send + Sync + 'static,
    F: ConnectionFactory<H>,
{
    let attempt = factory.connect(&inner.hostname, inner.port);
    let outcome = match AssertUnwindSafe(attempt).catch_unwind().await {
        Ok(Ok(handle)) => Ok(handle),
        Ok(Err(cause)) => Err(InitError::new(cause)),
        Err(payload) => Err(InitError::panicked(payload)),
    };

    // Sole writer; the cell is never set anywhere else.
    let _ = inner.outcome.set(outcome);
    ready_tx.send_replace(true);
}

impl<H> BootstrapGate<H> {
    /// Wait until the factory has returned, for at most `timeout`.
    ///
    /// Readiness means the attempt finished, successfully or not; follow up
    /// with [`check_connection`](Self::check_connection) for the verdict.
    /// Returns immediately once the gate is ready, whatever the timeout.
    ///
    /// # Errors
    ///
    /// `GateError::ClientConnTimeout` if `timeout` elapses first. The attempt
    /// keeps running and may still complete later.
    /// `GateError::Abandoned` if the bootstrap task was dropped.
    #[tracing::instrument(skip(self), fields(namespace = %self.inner.namespace, set = %self.inner.set))]
    pub async fn wait_for_ready(&self, timeout: Duration) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        let mut ready = self.inner.ready.clone();
        let signalled = async move { ready.wait_for(|ready| *ready).await.map(|_| ()) };

        match tokio::time::timeout(timeout, signalled).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_closed)) => self.settled_or_abandoned().map(|_| ()),
            Err(_elapsed) => {
                debug!(?timeout, "Client not ready before timeout");
                Err(GateError::ClientConnTimeout(timeout))
            }
        }
    }

    /// [`wait_for_ready`](Self::wait_for_ready) bounded by the configured
    /// default timeout.
    pub async fn wait_ready(&self) -> Result<()> {
        self.wait_for_ready(self.inner.ready_timeout).await
    }

    /// Like [`wait_for_ready`](Self::wait_for_ready), but also gives up when
    /// `cancel` fires.
    ///
    /// Readiness wins if it is already observable when the call starts.
    ///
    /// # Errors
    ///
    /// `GateError::Cancelled` if the token is cancelled first, plus the
    /// errors of `wait_for_ready`.
    pub async fn wait_for_ready_or_cancel(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        tokio::select! {
            biased;
            result = self.wait_for_ready(timeout) => result,
            () = cancel.cancelled() => {
                debug!(namespace = %self.inner.namespace, set = %self.inner.set, "Readiness wait cancelled");
                Err(GateError::Cancelled)
            }
        }
    }

    /// Report connection health without blocking.
    ///
    /// Never triggers a new connection attempt and never probes the handle.
    ///
    /// # Errors
    ///
    /// - `GateError::AlreadyConnecting` while the factory is still running;
    ///   transient, not a fault.
    /// - `GateError::Init` with the factory's error once it has failed.
    /// - `GateError::Abandoned` if the bootstrap task was dropped.
    pub fn check_connection(&self) -> Result<()> {
        match self.observe() {
            Observed::Connecting => Err(GateError::AlreadyConnecting),
            Observed::Settled(outcome) => settle(outcome).map(|_| ()),
            Observed::Abandoned => Err(GateError::Abandoned),
        }
    }

    /// Wait for readiness, then hand out the client.
    ///
    /// # Errors
    ///
    /// The errors of `wait_for_ready`, or `GateError::Init` when the factory
    /// failed.
    pub async fn ready_handle(&self, timeout: Duration) -> Result<&H> {
        self.wait_for_ready(timeout).await?;
        self.settled_or_abandoned()
    }

    /// The client, if initialization has already succeeded.
    pub fn handle(&self) -> Option<&H> {
        self.inner.outcome.get().and_then(|outcome| outcome.as_ref().ok())
    }

    /// Whether the factory has returned.
    pub fn is_ready(&self) -> bool {
        self.inner.outcome.initialized()
    }

    /// Current lifecycle status.
    ///
    /// Derived from the bootstrap outcome only; wait timeouts and liveness
    /// probes never change it.
    pub fn status(&self) -> ConnectionStatus {
        self.observe().status()
    }

    /// Snapshot suitable for a health endpoint.
    pub fn health_report(&self) -> HealthReport {
        let observed = self.observe();
        let status = observed.status();
        let error = match observed {
            Observed::Connecting | Observed::Settled(Ok(_)) => None,
            Observed::Settled(Err(cause)) => Some(GateError::Init(cause.clone()).to_string()),
            Observed::Abandoned => Some(GateError::Abandoned.to_string()),
        };

        HealthReport {
            namespace: self.inner.namespace.clone(),
            set: self.inner.set.clone(),
            endpoint: format!("{}:{}", self.inner.hostname, self.inner.port),
            status,
            error,
        }
    }

    /// Target namespace.
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Target set.
    pub fn set(&self) -> &str {
        &self.inner.set
    }

    /// Host given to the factory.
    pub fn hostname(&self) -> &str {
        &self.inner.hostname
    }

    /// Port given to the factory.
    pub fn port(&self) -> u16 {
        self.inner.port
    }

    /// Bound used by [`wait_ready`](Self::wait_ready).
    pub fn default_ready_timeout(&self) -> Duration {
        self.inner.ready_timeout
    }

    fn observe(&self) -> Observed<'_, H> {
        match self.inner.outcome.get() {
            Some(outcome) => Observed::Settled(outcome),
            None if self.inner.ready.has_changed().is_err() => self.closed_outcome(),
            None => Observed::Connecting,
        }
    }

    // The signal is closed: either the outcome was published just before the
    // sender dropped, or the task died without one.
    fn closed_outcome(&self) -> Observed<'_, H> {
        match self.inner.outcome.get() {
            Some(outcome) => Observed::Settled(outcome),
            None => Observed::Abandoned,
        }
    }

    fn settled_or_abandoned(&self) -> Result<&H> {
        match self.closed_outcome() {
            Observed::Settled(outcome) => settle(outcome),
            Observed::Connecting | Observed::Abandoned => Err(GateError::Abandoned),
        }
    }
}

/// A point-in-time view of the bootstrap.
enum Observed<'a, H> {
    Connecting,
    Settled(&'a std::result::Result<H, InitError>),
    Abandoned,
}

impl<H> Observed<'_, H> {
    fn status(&self) -> ConnectionStatus {
        match self {
            Observed::Connecting => ConnectionStatus::Connecting,
            Observed::Settled(Ok(_)) => ConnectionStatus::Ready,
            Observed::Settled(Err(_)) => ConnectionStatus::Failed,
            Observed::Abandoned => ConnectionStatus::Abandoned,
        }
    }
}

impl<H: Liveness> BootstrapGate<H> {
    /// [`check_connection`](Self::check_connection) followed by a live probe
    /// of the handle.
    ///
    /// # Errors
    ///
    /// The errors of `check_connection`, or `GateError::Unhealthy` when the
    /// handle reports itself dead.
    pub async fn probe_connection(&self) -> Result<()> {
        self.check_connection()?;
        match self.handle() {
            Some(handle) if handle.is_alive().await => Ok(()),
            _ => {
                warn!(
                    namespace = %self.inner.namespace,
                    set = %self.inner.set,
                    "Client failed liveness probe"
                );
                Err(GateError::Unhealthy)
            }
        }
    }
}

impl<H> Clone for BootstrapGate<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H> std::fmt::Debug for BootstrapGate<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapGate")
            .field("namespace", &self.inner.namespace)
            .field("set", &self.inner.set)
            .field("hostname", &self.inner.hostname)
            .field("port", &self.inner.port)
            .field("ready", &self.is_ready())
            .finish()
    }
}

fn settle<H>(outcome: &std::result::Result<H, InitError>) -> Result<&H> {
    outcome.as_ref().map_err(|cause| GateError::Init(cause.clone()))
}
