//! Error types for the bootstrap gate.
//!
//! Errors fall into four groups: configuration errors raised while building a
//! gate, the transient "still connecting" state, the terminal initialization
//! failure captured from the connection factory, and wait timeouts.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by connection factories.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Result type alias for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;

/// Main error type for gate construction and readiness queries.
#[derive(Debug, Error)]
pub enum GateError {
    /// The target namespace was empty.
    #[error("namespace must not be empty")]
    EmptyNamespace,

    /// The target set was empty.
    #[error("set must not be empty")]
    EmptySet,

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The connection factory has not returned yet.
    #[error("client is already connecting")]
    AlreadyConnecting,

    /// The client did not become ready within the wait bound.
    #[error("client connection not ready after {0:?}")]
    ClientConnTimeout(Duration),

    /// The wait was cancelled before the client became ready.
    #[error("wait for client readiness was cancelled")]
    Cancelled,

    /// The connection factory returned an error or panicked.
    #[error("client initialization failed: {0}")]
    Init(#[source] InitError),

    /// The bootstrap task was dropped before the factory returned,
    /// usually because its runtime shut down.
    #[error("client bootstrap was abandoned before completion")]
    Abandoned,

    /// The client initialized but failed its liveness probe.
    #[error("client failed liveness probe")]
    Unhealthy,
}

impl GateError {
    /// Whether this error describes a state that may resolve by itself.
    ///
    /// Callers should retry later rather than alert on transient errors.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GateError::AlreadyConnecting | GateError::ClientConnTimeout(_) | GateError::Cancelled
        )
    }

    /// Whether this error was raised by parameter validation.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            GateError::EmptyNamespace | GateError::EmptySet | GateError::InvalidConfig(_)
        )
    }

    /// The original factory error, if this is an initialization failure.
    pub fn init_cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            GateError::Init(init) => Some(init.cause()),
            _ => None,
        }
    }
}

/// A connection factory failure, shared by every caller that observes it.
///
/// Cloning is cheap; all clones point at the same underlying error.
#[derive(Clone)]
pub struct InitError {
    cause: Arc<dyn StdError + Send + Sync>,
}

impl InitError {
    /// Wrap an error produced by a connection factory.
    pub fn new(cause: impl Into<BoxError>) -> Self {
        Self {
            cause: Arc::from(cause.into()),
        }
    }

    pub(crate) fn panicked(payload: Box<dyn Any + Send>) -> Self {
        Self::new(FactoryPanic::from_payload(payload))
    }

    /// The original factory error.
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.cause
    }

    /// Whether the original factory error is of type `E`.
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.cause.is::<E>()
    }

    /// Downcast the original factory error to a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.cause.downcast_ref::<E>()
    }
}

impl fmt::Debug for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InitError").field(&self.cause).finish()
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.cause, f)
    }
}

impl StdError for InitError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.cause)
    }
}

/// Cause recorded when a connection factory panics instead of returning.
#[derive(Debug, Clone, Error)]
#[error("connection factory panicked: {message}")]
pub struct FactoryPanic {
    /// The panic message, when it was a string.
    pub message: String,
}

impl FactoryPanic {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}
