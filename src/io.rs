//! Type-erased duplex stream so [`crate::connection::Connection`] can be
//! built over a plain TCP socket or, at the caller's choosing, a TLS-wrapped
//! one without this crate needing to know which.

use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};

pub(crate) type DynStream = Pin<Box<dyn Io>>;

/// A duplex byte stream that can be used as a trait object.
///
/// Rust only allows one non-auto trait when building a trait object; this
/// trait exists purely to bundle `AsyncRead + AsyncWrite` behind one name.
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin + 'static {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Io for T {}
