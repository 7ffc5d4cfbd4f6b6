//! Process-level error hierarchy: the ways the proxy can fail to start or
//! fail to shut down cleanly, each carrying enough detail for `main` to log
//! it and pick a distinct exit code.

use thiserror::Error;

/// Fatal errors that can occur before the proxy has started accepting
/// traffic. Any variant here means no listener was ever bound.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("upstream is unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to bind listener: {0}")]
    ListenerBind(String),
}

/// Errors raised while draining the worker pool during shutdown.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("shutdown deadline exceeded before the worker pool drained")]
    Timeout,
}
