//! Connection factories and liveness probes.
//!
//! A `ConnectionFactory` builds the client handle a gate wraps. It is called
//! exactly once per gate, on a background task, and may be arbitrarily slow.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{BoxError, FactoryPanic};

/// Something that can produce a client handle from connection parameters.
///
/// Async closures taking `(String, u16)` implement this trait directly.
/// Synchronous driver constructors can be adapted with [`blocking`].
///
/// # Examples
///
/// ```rust
/// use aerogate::factory::ConnectionFactory;
/// use aerogate::error::BoxError;
/// use async_trait::async_trait;
///
/// struct CacheClient {
///     endpoint: String,
/// }
///
/// struct CacheConnector;
///
/// #[async_trait]
/// impl ConnectionFactory<CacheClient> for CacheConnector {
///     async fn connect(&self, hostname: &str, port: u16) -> Result<CacheClient, BoxError> {
///         Ok(CacheClient {
///             endpoint: format!("{hostname}:{port}"),
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait ConnectionFactory<H>: Send + Sync {
    /// Establish the connection and return the ready-to-use handle.
    async fn connect(&self, hostname: &str, port: u16) -> Result<H, BoxError>;
}

#[async_trait]
impl<H, F, Fut> ConnectionFactory<H> for F
where
    H: 'static,
    F: Fn(String, u16) -> Fut + Send + Sync,
    Fut: Future<Output = Result<H, BoxError>> + Send + 'static,
{
    async fn connect(&self, hostname: &str, port: u16) -> Result<H, BoxError> {
        (self)(hostname.to_owned(), port).await
    }
}

/// Adapter running a synchronous constructor on Tokio's blocking pool.
///
/// Created by [`blocking`].
pub struct BlockingFactory<F> {
    connect: Arc<F>,
}

/// Wrap a synchronous, possibly blocking, constructor as a factory.
///
/// Most native drivers perform their handshake inside a plain constructor.
/// Running it on the blocking pool keeps it off the async worker threads.
///
/// ```rust
/// use aerogate::factory::blocking;
/// use aerogate::error::BoxError;
///
/// let factory = blocking(|hostname: &str, port: u16| -> Result<String, BoxError> {
///     Ok(format!("{hostname}:{port}"))
/// });
/// # let _ = factory;
/// ```
pub fn blocking<H, F>(connect: F) -> BlockingFactory<F>
where
    F: Fn(&str, u16) -> Result<H, BoxError> + Send + Sync + 'static,
{
    BlockingFactory {
        connect: Arc::new(connect),
    }
}

#[async_trait]
impl<H, F> ConnectionFactory<H> for BlockingFactory<F>
where
    H: Send + 'static,
    F: Fn(&str, u16) -> Result<H, BoxError> + Send + Sync + 'static,
{
    async fn connect(&self, hostname: &str, port: u16) -> Result<H, BoxError> {
        let connect = Arc::clone(&self.connect);
        let hostname = hostname.to_owned();

        match tokio::task::spawn_blocking(move || connect(&hostname, port)).await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                Err(Box::new(FactoryPanic::from_payload(join_err.into_panic())))
            }
            Err(join_err) => Err(Box::new(join_err)),
        }
    }
}

/// A handle that can report whether its connection is still alive.
///
/// Used by `BootstrapGate::probe_connection` to go beyond "initialization
/// succeeded".
#[async_trait]
pub trait Liveness: Send + Sync {
    /// Check if the handle is alive and usable.
    ///
    /// Default implementation always returns `true`.
    async fn is_alive(&self) -> bool {
        true
    }
}
