//! Publish to a channel example.
//!
//! A simple client that connects to a redis-compatible server and publishes
//! a message on the `foo` channel.
//!
//! You can test this out by running a redis-compatible server, then:
//!
//!     cargo run --bin redis-cli -- subscribe foo
//!
//! And in another terminal:
//!
//!     cargo run --example pub

#![warn(rust_2018_idioms)]

use redis_client::{Connection, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let conn = Connection::connect("127.0.0.1:6379").await?;

    conn.publish("foo", "bar".into()).await?;

    Ok(())
}
