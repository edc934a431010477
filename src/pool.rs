//! A bounded pool of [`Connection`]s to a single endpoint, plus the
//! dedicated Pub/Sub lease discipline described in the module docs.
//!
//! Grounded on the teacher's `Db` (`Arc<Shared>` wrapping a `Mutex<State>`,
//! cloned to move into a spawned background task) and on
//! `server::Listener::accept`'s exponential-backoff retry loop, applied
//! here to opening a fresh connection instead of accepting one.

use crate::connection::Connection;
use crate::error::{Error, PoolError, Result};
use crate::pubsub::Message;

use bytes::Bytes;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Configuration for a [`Pool`]. Every field is taken as given; there is no
/// external config-file loading, just a plain struct constructed in code.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Delay before the first connection retry after a failed connect.
    pub initial_connection_backoff_delay: Duration,
    /// Multiplier applied to the backoff delay after each failed retry.
    pub connection_backoff_factor: u32,
    /// Total time budget across all connection retries before giving up
    /// with [`PoolError::ConnectTimeout`].
    pub connection_retry_timeout: Duration,
    /// Hard cap on the number of connections the pool will ever open.
    pub maximum_connection_count: usize,
    /// Connections the pool tries to have warm and free immediately after
    /// construction.
    pub minimum_connection_count: usize,
    /// Sent via `AUTH` on every freshly opened connection, if set.
    pub connection_password: Option<String>,
    /// Whether to emit a debug-level log line each time a new connection is
    /// established.
    pub connection_default_logger: bool,
    /// Address passed to [`Connection::connect`] for every new connection.
    pub tcp_client: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            initial_connection_backoff_delay: Duration::from_millis(64),
            connection_backoff_factor: 2,
            connection_retry_timeout: Duration::from_secs(64),
            maximum_connection_count: 10,
            minimum_connection_count: 1,
            connection_password: None,
            connection_default_logger: true,
            tcp_client: "127.0.0.1:6379".to_string(),
        }
    }
}

struct State {
    free: Vec<Connection>,
    pubsub_lease: Option<Connection>,
}

struct Inner {
    config: PoolConfig,
    state: Mutex<State>,
    leased_count: AtomicUsize,
}

/// A cheap, `Clone`-able handle to a connection pool for a single endpoint.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<Inner>,
}

impl Pool {
    /// Builds a pool from `config`. Returns immediately;
    /// `minimum_connection_count` connections are opened lazily in the
    /// background.
    pub fn new(config: PoolConfig) -> Pool {
        let pool = Pool {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State {
                    free: Vec::new(),
                    pubsub_lease: None,
                }),
                leased_count: AtomicUsize::new(0),
            }),
        };

        let warm = pool.clone();
        tokio::spawn(async move { warm.warm_up().await });

        pool
    }

    async fn warm_up(&self) {
        for _ in 0..self.inner.config.minimum_connection_count {
            match self.connect_with_backoff().await {
                Ok(conn) => {
                    self.inner.state.lock().await.free.push(conn);
                }
                Err(e) => {
                    warn!(error = %e, "failed to warm up pool connection");
                    return;
                }
            }
        }
    }

    async fn connect_with_backoff(&self) -> Result<Connection> {
        let cfg = &self.inner.config;
        let mut delay = cfg.initial_connection_backoff_delay;
        let started = tokio::time::Instant::now();

        loop {
            match Connection::connect(&cfg.tcp_client).await {
                Ok(conn) => {
                    if let Some(password) = &cfg.connection_password {
                        conn.send("AUTH", &[Bytes::copy_from_slice(password.as_bytes())])
                            .await?;
                    }
                    if cfg.connection_default_logger {
                        debug!(addr = %cfg.tcp_client, "opened pool connection");
                    }
                    return Ok(conn);
                }
                Err(e) => {
                    if started.elapsed() + delay > cfg.connection_retry_timeout {
                        return Err(Error::Pool(PoolError::ConnectTimeout(
                            cfg.connection_retry_timeout,
                        )));
                    }
                    warn!(error = %e, ?delay, "pool connection attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= cfg.connection_backoff_factor;
                }
            }
        }
    }

    async fn acquire_connection(&self) -> Result<Connection> {
        {
            let mut state = self.inner.state.lock().await;
            if let Some(conn) = state.free.pop() {
                self.inner.leased_count.fetch_add(1, Ordering::Relaxed);
                return Ok(conn);
            }
            if self.inner.leased_count.load(Ordering::Relaxed)
                >= self.inner.config.maximum_connection_count
            {
                return Err(Error::Pool(PoolError::Exhausted));
            }
            // Reserve the slot before releasing the lock so two concurrent
            // acquires can't both decide there's room for one connection.
            self.inner.leased_count.fetch_add(1, Ordering::Relaxed);
        }

        match self.connect_with_backoff().await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                self.inner.leased_count.fetch_sub(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    async fn release(&self, conn: Connection) {
        let mut state = self.inner.state.lock().await;
        state.free.push(conn);
        drop(state);
        self.inner.leased_count.fetch_sub(1, Ordering::Relaxed);
    }

    /// Leases a connection, runs `f` against it, and returns it to the pool
    /// regardless of `f`'s outcome.
    pub async fn with_connection<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let conn = self.acquire_connection().await?;
        let result = f(conn.clone()).await;
        self.release(conn).await;
        result
    }

    /// `GET key` on a leased connection.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.with_connection(|conn| async move { conn.get(key).await })
            .await
    }

    /// `SET key value [PX ms]` on a leased connection.
    pub async fn set(&self, key: &str, value: Bytes, expire: Option<Duration>) -> Result<()> {
        self.with_connection(|conn| async move { conn.set(key, value, expire).await })
            .await
    }

    /// `PUBLISH channel message` on a leased connection.
    pub async fn publish(&self, channel: &str, message: Bytes) -> Result<i64> {
        self.with_connection(|conn| async move { conn.publish(channel, message).await })
            .await
    }

    /// The number of connections currently leased out, including the
    /// dedicated Pub/Sub lease if one is held.
    pub fn leased_connection_count(&self) -> usize {
        self.inner.leased_count.load(Ordering::Relaxed)
    }

    /// Subscribes on the pool's dedicated Pub/Sub connection, leasing one if
    /// none is currently held.
    pub async fn subscribe(
        &self,
        channels: &[Bytes],
        on_message: impl Fn(Message) + Send + Sync + 'static,
        on_subscribe: Option<impl Fn(Bytes, i64) + Send + Sync + 'static>,
        on_unsubscribe: Option<impl Fn(Bytes, i64) + Send + Sync + 'static>,
    ) -> Result<()> {
        let conn = self.pubsub_connection().await?;
        conn.subscribe(channels, on_message, on_subscribe, on_unsubscribe)
            .await
    }

    /// Pattern-subscribes on the pool's dedicated Pub/Sub connection.
    pub async fn psubscribe(
        &self,
        patterns: &[Bytes],
        on_message: impl Fn(Message) + Send + Sync + 'static,
        on_subscribe: Option<impl Fn(Bytes, i64) + Send + Sync + 'static>,
        on_unsubscribe: Option<impl Fn(Bytes, i64) + Send + Sync + 'static>,
    ) -> Result<()> {
        let conn = self.pubsub_connection().await?;
        conn.psubscribe(patterns, on_message, on_subscribe, on_unsubscribe)
            .await
    }

    /// Unsubscribes on the pool's dedicated Pub/Sub connection. A local
    /// no-op if no Pub/Sub lease is currently held (§9 Open Question).
    pub async fn unsubscribe(&self, channels: &[Bytes]) -> Result<()> {
        match self.current_pubsub_lease().await {
            Some(conn) => conn.unsubscribe(channels).await,
            None => Ok(()),
        }
    }

    /// Pattern-unsubscribes on the pool's dedicated Pub/Sub connection. A
    /// local no-op if no Pub/Sub lease is currently held.
    pub async fn punsubscribe(&self, patterns: &[Bytes]) -> Result<()> {
        match self.current_pubsub_lease().await {
            Some(conn) => conn.punsubscribe(patterns).await,
            None => Ok(()),
        }
    }

    async fn current_pubsub_lease(&self) -> Option<Connection> {
        self.inner.state.lock().await.pubsub_lease.clone()
    }

    async fn pubsub_connection(&self) -> Result<Connection> {
        if let Some(conn) = self.current_pubsub_lease().await {
            return Ok(conn);
        }

        let conn = self.acquire_connection().await?;
        self.inner.state.lock().await.pubsub_lease = Some(conn.clone());
        self.watch_for_lease_release(conn.clone());
        Ok(conn)
    }

    /// Spawns a task that watches `conn`'s subscribed state and returns it
    /// to the free set the moment it drops back to `Normal`, per the
    /// `PubSub -> Normal` half of the leasing discipline.
    fn watch_for_lease_release(&self, conn: Connection) {
        let pool = self.clone();
        tokio::spawn(async move {
            let mut subscribed = conn.subscribed_receiver();

            while !*subscribed.borrow() {
                if subscribed.changed().await.is_err() {
                    return;
                }
            }
            while *subscribed.borrow() {
                if subscribed.changed().await.is_err() {
                    return;
                }
            }

            let mut state = pool.inner.state.lock().await;
            state.pubsub_lease = None;
            drop(state);
            pool.release(conn).await;
        });
    }
}
