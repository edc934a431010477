use redis_client::{Connection, DEFAULT_PORT};

use bytes::Bytes;
use clap::Parser;
use std::num::ParseIntError;
use std::str;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(name = "redis-cli", version, author, about = "Issue Redis commands")]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    #[clap(name = "hostname", long = "--host", default_value = "127.0.0.1")]
    host: String,

    #[clap(name = "port", long = "--port", default_value = DEFAULT_PORT)]
    port: String,
}

#[derive(Parser, Debug)]
enum Command {
    /// Get the value of key.
    Get {
        /// Name of key to get
        key: String,
    },
    /// Set key to hold the string value.
    Set {
        /// Name of key to set
        key: String,

        /// Value to set.
        #[clap(parse(from_str = bytes_from_str))]
        value: Bytes,

        /// Expire the value after specified amount of time, in milliseconds.
        #[clap(parse(try_from_str = duration_from_ms_str))]
        expires: Option<Duration>,
    },
    /// Publish a message to a channel.
    Publish {
        /// Name of channel to publish to
        channel: String,

        /// Message to publish
        #[clap(parse(from_str = bytes_from_str))]
        message: Bytes,
    },
    /// Subscribe to one or more channels and print every message received.
    Subscribe {
        /// Channels to subscribe to
        #[clap(required = true)]
        channels: Vec<String>,
    },
    /// Ping the server.
    Ping {
        /// Optional message to echo back
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> redis_client::Result<()> {
    tracing_subscriber::fmt::try_init().ok();

    let cli = Cli::parse();
    let addr = format!("{}:{}", cli.host, cli.port);
    let conn = Connection::connect(&addr).await?;

    match cli.command {
        Command::Get { key } => {
            if let Some(value) = conn.get(&key).await? {
                print_value(&value);
            } else {
                println!("(nil)");
            }
        }
        Command::Set {
            key,
            value,
            expires,
        } => {
            conn.set(&key, value, expires).await?;
            println!("OK");
        }
        Command::Publish { channel, message } => {
            let count = conn.publish(&channel, message).await?;
            println!("(integer) {count}");
        }
        Command::Subscribe { channels } => {
            let names: Vec<Bytes> = channels.into_iter().map(Bytes::from).collect();
            conn.subscribe(
                &names,
                |msg| {
                    print!("{}: ", String::from_utf8_lossy(&msg.channel));
                    print_value(&msg.payload);
                },
                Some(|channel: Bytes, count: i64| {
                    println!(
                        "subscribed to {} ({} total)",
                        String::from_utf8_lossy(&channel),
                        count
                    );
                }),
                None::<fn(Bytes, i64)>,
            )
            .await?;

            // Block forever; messages arrive on the callback above.
            std::future::pending::<()>().await;
        }
        Command::Ping { message } => {
            let reply = conn.ping(message.map(Bytes::from)).await?;
            print_value(&reply);
        }
    }

    Ok(())
}

fn print_value(value: &[u8]) {
    if let Ok(s) = str::from_utf8(value) {
        println!("\"{s}\"");
    } else {
        println!("{value:?}");
    }
}

fn duration_from_ms_str(src: &str) -> Result<Duration, ParseIntError> {
    let ms = src.parse::<u64>()?;
    Ok(Duration::from_millis(ms))
}

fn bytes_from_str(src: &str) -> Bytes {
    Bytes::from(src.to_string())
}
