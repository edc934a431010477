//! A Redis-protocol client: a RESP codec, a connection state machine that
//! tracks the transition into and out of Pub/Sub mode, and a connection
//! pool with a dedicated Pub/Sub lease.

pub const DEFAULT_PORT: &str = "6379";

mod resp;
pub use resp::Value;

pub mod error;
pub use error::{Error, PoolError, Result};

mod io;
pub use io::Io;

mod pubsub;
pub use pubsub::{Kind, Message, MessageCallback, SubscribeCallback, UnsubscribeCallback};

pub mod connection;
pub use connection::Connection;

mod commands;

pub mod pool;
pub use pool::{Pool, PoolConfig};
