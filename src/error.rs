use std::io;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Every way a command, subscription, or pool operation can fail.
///
/// Variants map directly onto the error taxonomy: protocol errors and
/// transport errors are fatal to the connection that raised them, server
/// errors and mode violations are per-request, and pool errors never reach
/// the connection layer at all.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The server sent bytes that do not form a well-formed RESP value.
    /// Fatal: the connection that observed this is torn down.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The connection is `Closed` and can no longer be used.
    #[error("connection closed")]
    ConnectionClosed,

    /// A command outside the Pub/Sub allowlist was issued while the
    /// connection is subscribed. The command was never written to the
    /// socket.
    #[error("command not allowed while subscribed: {0}")]
    PubSubModeViolation(String),

    /// The server replied with a RESP `Error` frame.
    #[error("{0}")]
    Server(String),

    /// An operation did not complete within its deadline.
    #[error("operation timed out")]
    Timeout,

    /// The underlying transport failed (socket reset, connect failure, ...).
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    /// A pool-level failure: no capacity, retry budget exhausted, etc.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Failures specific to [`crate::pool::Pool`].
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    /// The pool already has `maximum_connection_count` connections leased
    /// and none are free.
    #[error("connection pool exhausted")]
    Exhausted,

    /// A fresh connection could not be established before
    /// `connection_retry_timeout` elapsed.
    #[error("timed out establishing a new connection after {0:?} of retries")]
    ConnectTimeout(std::time::Duration),

    /// The pool has been closed and no longer accepts leases.
    #[error("connection pool is closed")]
    Closed,
}
