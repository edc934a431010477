//! Thin command wrappers over [`Connection::send`].
//!
//! Mirrors the shape of the teacher's `cmd::Get`/`Set`/`Publish` (build the
//! argument list, send, translate the reply) but from the client side: there
//! is no `Db` to apply against, only a reply to parse into a typed result.

use crate::connection::Connection;
use crate::error::Error;
use crate::resp::Value;
use bytes::Bytes;
use std::time::Duration;

impl Connection {
    /// `GET key`. Returns `None` for a nil reply (key absent).
    pub async fn get(&self, key: &str) -> crate::error::Result<Option<Bytes>> {
        let reply = self.send("GET", &[Bytes::copy_from_slice(key.as_bytes())]).await?;
        match reply {
            Value::BulkString(payload) => Ok(payload),
            other => Err(unexpected_reply("GET", other)),
        }
    }

    /// `SET key value [PX milliseconds]`.
    pub async fn set(&self, key: &str, value: Bytes, expire: Option<Duration>) -> crate::error::Result<()> {
        let mut args = vec![Bytes::copy_from_slice(key.as_bytes()), value];
        if let Some(expire) = expire {
            args.push(Bytes::from_static(b"PX"));
            args.push(Bytes::copy_from_slice(expire.as_millis().to_string().as_bytes()));
        }

        let reply = self.send("SET", &args).await?;
        match reply {
            Value::SimpleString(_) => Ok(()),
            other => Err(unexpected_reply("SET", other)),
        }
    }

    /// `PUBLISH channel message`. Returns the number of subscribers that
    /// received the message, per the server's reply.
    pub async fn publish(&self, channel: &str, message: Bytes) -> crate::error::Result<i64> {
        let reply = self
            .send(
                "PUBLISH",
                &[Bytes::copy_from_slice(channel.as_bytes()), message],
            )
            .await?;
        match reply {
            Value::Integer(n) => Ok(n),
            other => Err(unexpected_reply("PUBLISH", other)),
        }
    }

    /// `PING [message]`. Allowed in every connection state.
    pub async fn ping(&self, message: Option<Bytes>) -> crate::error::Result<Bytes> {
        let args = message.into_iter().collect::<Vec<_>>();
        let reply = self.send("PING", &args).await?;
        match reply {
            Value::SimpleString(s) => Ok(s),
            Value::BulkString(Some(s)) => Ok(s),
            other => Err(unexpected_reply("PING", other)),
        }
    }
}

fn unexpected_reply(command: &str, reply: Value) -> Error {
    Error::Protocol(format!("unexpected reply to {command}: {reply:?}"))
}
