//! Command-line chat example.
//!
//! A minimal chat client. A user connects, subscribes to the `chat` channel,
//! and publishes whatever they type across that same channel.
//!
//! You can test this out by running a redis-compatible server, then running
//! this example in as many terminals as you want:
//!
//!     cargo run --example chat

#![warn(rust_2018_idioms)]

use bytes::Bytes;
use redis_client::{Connection, Result};
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
pub async fn main() -> Result<()> {
    let mut stdout = io::stdout();
    let mut stdin = BufReader::new(io::stdin());
    let mut username = String::new();
    stdout.write_all(b"What is your username: ").await?;
    stdout.flush().await?;
    stdin
        .read_line(&mut username)
        .await
        .map_err(redis_client::Error::Io)?;
    let username = Arc::new(username.trim().to_string());

    let addr = "127.0.0.1:6379";
    let publisher = Connection::connect(addr).await?;

    // A dedicated connection for the subscription; `subscribe` moves it into
    // Pub/Sub mode, so it can no longer issue the `PUBLISH` calls below.
    let subscriber = Connection::connect(addr).await?;
    let own_name = username.clone();
    subscriber
        .subscribe(
            &[Bytes::from_static(b"chat")],
            move |message| {
                let content = String::from_utf8_lossy(&message.payload);
                if !content.starts_with(own_name.as_str()) {
                    println!("{content}");
                }
            },
            None::<fn(Bytes, i64)>,
            None::<fn(Bytes, i64)>,
        )
        .await?;

    loop {
        let mut input = String::new();
        if stdin.read_line(&mut input).await? == 0 {
            break;
        }
        let line = format!("{}: {}", username, input.trim());
        publisher
            .publish("chat", Bytes::from(line))
            .await?;
    }

    Ok(())
}
