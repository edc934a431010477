use redis_client::{Connection, Error, Pool, PoolConfig};

use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn bind() -> (SocketAddr, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (addr, listener)
}

/// Reads one command off `stream` and asserts the raw bytes contain every
/// string in `contains`, in whatever order the caller already expects from
/// the wire encoding.
async fn expect_command(stream: &mut TcpStream, contains: &[&str]) {
    let mut buf = [0u8; 4096];
    let n = stream.read(&mut buf).await.unwrap();
    assert!(n > 0, "server socket closed while expecting a command");
    let text = String::from_utf8_lossy(&buf[..n]).into_owned();
    for needle in contains {
        assert!(
            text.contains(needle),
            "expected command containing {needle:?}, got {text:?}"
        );
    }
}

async fn write_raw(stream: &mut TcpStream, bytes: &[u8]) {
    stream.write_all(bytes).await.unwrap();
}

#[tokio::test]
async fn single_channel_pub_sub() {
    let (addr, listener) = bind().await;

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_cb = received.clone();
    let unsub_count = Arc::new(AtomicI64::new(-1));
    let unsub_count_cb = unsub_count.clone();

    let client = async {
        let subscriber = Connection::connect(addr).await.unwrap();
        subscriber
            .subscribe(
                &[Bytes::from_static(b"X")],
                move |msg| received_cb.lock().unwrap().push(msg.payload),
                None::<fn(Bytes, i64)>,
                Some(move |_channel: Bytes, count: i64| {
                    unsub_count_cb.store(count, Ordering::SeqCst);
                }),
            )
            .await
            .unwrap();

        let publisher = Connection::connect(addr).await.unwrap();
        let count = publisher
            .publish("X", Bytes::from_static(b"Hello from Redis!"))
            .await
            .unwrap();
        assert_eq!(count, 1);

        // Give the push frame a beat to reach the subscriber's actor before
        // tearing down the subscription.
        tokio::time::sleep(Duration::from_millis(20)).await;

        subscriber
            .unsubscribe(&[Bytes::from_static(b"X")])
            .await
            .unwrap();
    };

    let server = async {
        let (mut sub_sock, _) = listener.accept().await.unwrap();
        expect_command(&mut sub_sock, &["SUBSCRIBE", "X"]).await;
        write_raw(&mut sub_sock, b"*3\r\n$9\r\nsubscribe\r\n$1\r\nX\r\n:1\r\n").await;

        let (mut pub_sock, _) = listener.accept().await.unwrap();
        expect_command(&mut pub_sock, &["PUBLISH", "X", "Hello from Redis!"]).await;
        write_raw(&mut pub_sock, b":1\r\n").await;

        write_raw(
            &mut sub_sock,
            b"*3\r\n$7\r\nmessage\r\n$1\r\nX\r\n$17\r\nHello from Redis!\r\n",
        )
        .await;

        expect_command(&mut sub_sock, &["UNSUBSCRIBE", "X"]).await;
        write_raw(&mut sub_sock, b"*3\r\n$11\r\nunsubscribe\r\n$1\r\nX\r\n:0\r\n").await;
    };

    tokio::join!(client, server);

    let payloads = received.lock().unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0], Bytes::from_static(b"Hello from Redis!"));
    assert_eq!(unsub_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn mixed_channel_and_pattern_subscription() {
    let (addr, listener) = bind().await;

    let channel_hits = Arc::new(Mutex::new(0u32));
    let pattern_hits = Arc::new(Mutex::new(0u32));
    let channel_hits_cb = channel_hits.clone();
    let pattern_hits_cb = pattern_hits.clone();

    let client = async {
        let subscriber = Connection::connect(addr).await.unwrap();
        subscriber
            .subscribe(
                &[Bytes::from_static(b"news.tech")],
                move |_msg| *channel_hits_cb.lock().unwrap() += 1,
                None::<fn(Bytes, i64)>,
                None::<fn(Bytes, i64)>,
            )
            .await
            .unwrap();
        subscriber
            .psubscribe(
                &[Bytes::from_static(b"news.*")],
                move |_msg| *pattern_hits_cb.lock().unwrap() += 1,
                None::<fn(Bytes, i64)>,
                None::<fn(Bytes, i64)>,
            )
            .await
            .unwrap();

        let publisher = Connection::connect(addr).await.unwrap();
        let count = publisher
            .publish("news.tech", Bytes::from_static(b"hello!"))
            .await
            .unwrap();
        assert_eq!(count, 2);

        tokio::time::sleep(Duration::from_millis(20)).await;
    };

    let server = async {
        let (mut sub_sock, _) = listener.accept().await.unwrap();
        expect_command(&mut sub_sock, &["SUBSCRIBE", "news.tech"]).await;
        write_raw(
            &mut sub_sock,
            b"*3\r\n$9\r\nsubscribe\r\n$9\r\nnews.tech\r\n:1\r\n",
        )
        .await;

        expect_command(&mut sub_sock, &["PSUBSCRIBE", "news.*"]).await;
        write_raw(
            &mut sub_sock,
            b"*3\r\n$10\r\npsubscribe\r\n$6\r\nnews.*\r\n:2\r\n",
        )
        .await;

        let (mut pub_sock, _) = listener.accept().await.unwrap();
        expect_command(&mut pub_sock, &["PUBLISH", "news.tech", "hello!"]).await;
        write_raw(&mut pub_sock, b":2\r\n").await;

        write_raw(
            &mut sub_sock,
            b"*3\r\n$7\r\nmessage\r\n$9\r\nnews.tech\r\n$6\r\nhello!\r\n",
        )
        .await;
        write_raw(
            &mut sub_sock,
            b"*4\r\n$8\r\npmessage\r\n$6\r\nnews.*\r\n$9\r\nnews.tech\r\n$6\r\nhello!\r\n",
        )
        .await;
    };

    tokio::join!(client, server);

    assert_eq!(*channel_hits.lock().unwrap(), 1);
    assert_eq!(*pattern_hits.lock().unwrap(), 1);
}

#[tokio::test]
async fn unsubscribe_with_no_subscriptions_is_a_local_no_op() {
    let (addr, listener) = bind().await;

    let client = async {
        let conn = Connection::connect(addr).await.unwrap();
        conn.unsubscribe(&[Bytes::from_static(b"X")]).await.unwrap();
        assert!(!conn.is_subscribed());
    };

    let server = async {
        let (mut sock, _) = listener.accept().await.unwrap();
        // Nothing should ever arrive: an UNSUBSCRIBE naming a channel the
        // connection never subscribed to still has a name to confirm on a
        // real server, but this connection never subscribed at all, so
        // `unsubscribe` resolves without writing anything.
        let mut buf = [0u8; 16];
        let res = tokio::time::timeout(Duration::from_millis(100), sock.read(&mut buf)).await;
        assert!(res.is_err(), "expected no bytes to be written");
    };

    tokio::join!(client, server);
}

#[tokio::test]
async fn commands_outside_the_allowlist_are_rejected_locally_while_subscribed() {
    let (addr, listener) = bind().await;

    let client = async {
        let conn = Connection::connect(addr).await.unwrap();
        conn.subscribe(
            &[Bytes::from_static(b"X")],
            |_msg| {},
            None::<fn(Bytes, i64)>,
            None::<fn(Bytes, i64)>,
        )
        .await
        .unwrap();

        let err = conn
            .send("LPUSH", &[Bytes::from_static(b"list"), Bytes::from_static(b"value")])
            .await;
        assert!(matches!(err, Err(Error::PubSubModeViolation(_))));
    };

    let server = async {
        let (mut sock, _) = listener.accept().await.unwrap();
        expect_command(&mut sock, &["SUBSCRIBE", "X"]).await;
        write_raw(&mut sock, b"*3\r\n$9\r\nsubscribe\r\n$1\r\nX\r\n:1\r\n").await;

        // LPUSH must never be written: confirm nothing more arrives.
        let mut buf = [0u8; 16];
        let res = tokio::time::timeout(Duration::from_millis(100), sock.read(&mut buf)).await;
        assert!(res.is_err(), "LPUSH should never reach the wire");
    };

    tokio::join!(client, server);
}

#[tokio::test]
async fn ping_is_allowed_while_subscribed() {
    let (addr, listener) = bind().await;

    let client = async {
        let conn = Connection::connect(addr).await.unwrap();
        conn.subscribe(
            &[Bytes::from_static(b"X")],
            |_msg| {},
            None::<fn(Bytes, i64)>,
            None::<fn(Bytes, i64)>,
        )
        .await
        .unwrap();

        let pong = conn.ping(None).await.unwrap();
        assert_eq!(pong, Bytes::from_static(b"PONG"));

        let echo = conn.ping(Some(Bytes::from_static(b"Hello"))).await.unwrap();
        assert_eq!(echo, Bytes::from_static(b"Hello"));
    };

    let server = async {
        let (mut sock, _) = listener.accept().await.unwrap();
        expect_command(&mut sock, &["SUBSCRIBE", "X"]).await;
        write_raw(&mut sock, b"*3\r\n$9\r\nsubscribe\r\n$1\r\nX\r\n:1\r\n").await;

        expect_command(&mut sock, &["PING"]).await;
        write_raw(&mut sock, b"+PONG\r\n").await;

        expect_command(&mut sock, &["PING", "Hello"]).await;
        write_raw(&mut sock, b"$5\r\nHello\r\n").await;
    };

    tokio::join!(client, server);
}

#[tokio::test]
async fn unsubscribe_all_and_punsubscribe_all_act_on_independent_maps() {
    let (addr, listener) = bind().await;

    let unsub_hits = Arc::new(Mutex::new(Vec::new()));
    let unsub_hits_cb = unsub_hits.clone();

    let client = async {
        let conn = Connection::connect(addr).await.unwrap();
        conn.subscribe(
            &[Bytes::from_static(b"C")],
            |_msg| {},
            None::<fn(Bytes, i64)>,
            {
                let hits = unsub_hits_cb.clone();
                Some(move |name: Bytes, _count: i64| hits.lock().unwrap().push(name))
            },
        )
        .await
        .unwrap();
        conn.psubscribe(
            &[Bytes::from_static(b"*P")],
            |_msg| {},
            None::<fn(Bytes, i64)>,
            {
                let hits = unsub_hits_cb.clone();
                Some(move |name: Bytes, _count: i64| hits.lock().unwrap().push(name))
            },
        )
        .await
        .unwrap();

        assert!(conn.is_subscribed());

        conn.unsubscribe(&[]).await.unwrap();
        assert!(conn.is_subscribed(), "the pattern subscription remains");

        conn.punsubscribe(&[]).await.unwrap();
        assert!(!conn.is_subscribed());
    };

    let server = async {
        let (mut sock, _) = listener.accept().await.unwrap();
        expect_command(&mut sock, &["SUBSCRIBE", "C"]).await;
        write_raw(&mut sock, b"*3\r\n$9\r\nsubscribe\r\n$1\r\nC\r\n:1\r\n").await;

        expect_command(&mut sock, &["PSUBSCRIBE", "*P"]).await;
        write_raw(&mut sock, b"*3\r\n$10\r\npsubscribe\r\n$2\r\n*P\r\n:2\r\n").await;

        expect_command(&mut sock, &["UNSUBSCRIBE", "C"]).await;
        write_raw(&mut sock, b"*3\r\n$11\r\nunsubscribe\r\n$1\r\nC\r\n:1\r\n").await;

        expect_command(&mut sock, &["PUNSUBSCRIBE", "*P"]).await;
        write_raw(&mut sock, b"*3\r\n$12\r\npunsubscribe\r\n$2\r\n*P\r\n:0\r\n").await;
    };

    tokio::join!(client, server);

    let hits = unsub_hits.lock().unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.contains(&Bytes::from_static(b"C")));
    assert!(hits.contains(&Bytes::from_static(b"*P")));
}

#[tokio::test]
async fn pool_tracks_a_single_leased_pubsub_connection() {
    let (addr, listener) = bind().await;

    let pool = Pool::new(PoolConfig {
        minimum_connection_count: 0,
        tcp_client: addr.to_string(),
        ..PoolConfig::default()
    });

    assert_eq!(pool.leased_connection_count(), 0);

    let client = async {
        pool.subscribe(
            &[Bytes::from_static(b"X")],
            |_msg| {},
            None::<fn(Bytes, i64)>,
            None::<fn(Bytes, i64)>,
        )
        .await
        .unwrap();
        assert_eq!(pool.leased_connection_count(), 1);

        // Same lease reused for a pattern subscription on the same pool.
        pool.psubscribe(
            &[Bytes::from_static(b"*P")],
            |_msg| {},
            None::<fn(Bytes, i64)>,
            None::<fn(Bytes, i64)>,
        )
        .await
        .unwrap();
        assert_eq!(pool.leased_connection_count(), 1);

        pool.unsubscribe(&[Bytes::from_static(b"X")]).await.unwrap();
        pool.punsubscribe(&[Bytes::from_static(b"*P")]).await.unwrap();

        // The lease-release watcher runs in a spawned task; poll briefly
        // for it to return the connection to the free set.
        for _ in 0..50 {
            if pool.leased_connection_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(pool.leased_connection_count(), 0);
    };

    let server = async {
        let (mut sock, _) = listener.accept().await.unwrap();
        expect_command(&mut sock, &["SUBSCRIBE", "X"]).await;
        write_raw(&mut sock, b"*3\r\n$9\r\nsubscribe\r\n$1\r\nX\r\n:1\r\n").await;

        expect_command(&mut sock, &["PSUBSCRIBE", "*P"]).await;
        write_raw(&mut sock, b"*3\r\n$10\r\npsubscribe\r\n$2\r\n*P\r\n:2\r\n").await;

        expect_command(&mut sock, &["UNSUBSCRIBE", "X"]).await;
        write_raw(&mut sock, b"*3\r\n$11\r\nunsubscribe\r\n$1\r\nX\r\n:1\r\n").await;

        expect_command(&mut sock, &["PUNSUBSCRIBE", "*P"]).await;
        write_raw(&mut sock, b"*3\r\n$12\r\npunsubscribe\r\n$2\r\n*P\r\n:0\r\n").await;
    };

    tokio::join!(client, server);
}
