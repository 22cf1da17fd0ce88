//! End-to-end tests over real loopback TCP connections.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use chat_relay::{Config, FrameCodec, Registry, RelayServer};

type Client = Framed<TcpStream, FrameCodec>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Start a relay on a random port; returns its address, a registry handle
/// for assertions, and the server task.
async fn start_relay() -> (SocketAddr, Registry, JoinHandle<()>) {
    // Keep eviction-by-idleness out of the way of slow CI machines
    start_relay_with_idle_timeout(60).await
}

async fn start_relay_with_idle_timeout(
    idle_timeout_secs: u64,
) -> (SocketAddr, Registry, JoinHandle<()>) {
    let mut config = Config::default();
    config.port = 0;
    config.idle_timeout_secs = idle_timeout_secs;

    let server = RelayServer::bind(config).await.expect("bind failed");
    let addr = server.local_addr().expect("no local addr");
    let registry = server.registry();
    let task = tokio::spawn(async move {
        let _ = server.run().await;
    });
    (addr, registry, task)
}

/// Receive one frame or panic after a generous timeout.
async fn recv(client: &mut Client) -> String {
    timeout(RECV_TIMEOUT, client.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended unexpectedly")
        .expect("frame error")
}

/// Connect, consume the name prompt, and send the display name.
async fn connect(addr: SocketAddr, name: &str) -> Client {
    let stream = TcpStream::connect(addr).await.expect("connect failed");
    let mut client = Framed::new(stream, FrameCodec::new());

    let prompt = recv(&mut client).await;
    assert!(prompt.contains("type a name"), "unexpected prompt: {prompt}");

    client.send(name.to_string()).await.expect("send name failed");
    client
}

/// Wait for the registry to settle at the expected number of sessions.
async fn wait_for_len(registry: &Registry, expected: usize) {
    for _ in 0..100 {
        if registry.len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("registry never reached {} entries", expected);
}

#[tokio::test]
async fn test_fanout_attribution_and_ordering() {
    let (addr, registry, server) = start_relay().await;

    let mut a = connect(addr, "A").await;
    assert_eq!(recv(&mut a).await, ">> SERVER: Welcome, A!");

    let mut b = connect(addr, "B").await;
    assert_eq!(recv(&mut a).await, ">> SERVER: Welcome, B!");
    assert_eq!(recv(&mut b).await, ">> SERVER: Welcome, B!");

    let mut c = connect(addr, "C").await;
    assert_eq!(recv(&mut a).await, ">> SERVER: Welcome, C!");
    assert_eq!(recv(&mut b).await, ">> SERVER: Welcome, C!");
    assert_eq!(recv(&mut c).await, ">> SERVER: Welcome, C!");
    wait_for_len(&registry, 3).await;

    a.send("hello".to_string()).await.unwrap();
    a.send("how are you".to_string()).await.unwrap();

    // Everyone, including the sender, sees A's lines in publish order
    for client in [&mut a, &mut b, &mut c] {
        assert_eq!(recv(client).await, ">> A: hello");
        assert_eq!(recv(client).await, ">> A: how are you");
    }

    server.abort();
}

#[tokio::test]
async fn test_exit_directive_closes_session() {
    let (addr, registry, server) = start_relay().await;

    let mut a = connect(addr, "A").await;
    assert_eq!(recv(&mut a).await, ">> SERVER: Welcome, A!");
    let mut b = connect(addr, "B").await;
    assert_eq!(recv(&mut a).await, ">> SERVER: Welcome, B!");
    assert_eq!(recv(&mut b).await, ">> SERVER: Welcome, B!");
    wait_for_len(&registry, 2).await;

    a.send("/command exit".to_string()).await.unwrap();

    // Peers see the farewell; A is already out of the snapshot by then
    assert_eq!(recv(&mut b).await, ">> SERVER: Goodbye A!");
    wait_for_len(&registry, 1).await;

    // A's socket is released: the server closes A's stream
    let end = timeout(RECV_TIMEOUT, a.next()).await.expect("no EOF");
    assert!(end.is_none(), "expected EOF, got {:?}", end);

    // A message published after A's removal never reaches A
    b.send("anyone there?".to_string()).await.unwrap();
    assert_eq!(recv(&mut b).await, ">> B: anyone there?");

    server.abort();
}

#[tokio::test]
async fn test_abrupt_disconnect_evicts_only_that_session() {
    let (addr, registry, server) = start_relay().await;

    let mut a = connect(addr, "A").await;
    assert_eq!(recv(&mut a).await, ">> SERVER: Welcome, A!");
    let mut b = connect(addr, "B").await;
    assert_eq!(recv(&mut a).await, ">> SERVER: Welcome, B!");
    assert_eq!(recv(&mut b).await, ">> SERVER: Welcome, B!");
    let c = connect(addr, "C").await;
    wait_for_len(&registry, 3).await;

    // C drops without a word; its session tears down via PeerClosed
    drop(c);
    wait_for_len(&registry, 2).await;
    assert_eq!(recv(&mut a).await, ">> SERVER: Welcome, C!");
    assert_eq!(recv(&mut a).await, ">> SERVER: Goodbye C!");
    assert_eq!(recv(&mut b).await, ">> SERVER: Welcome, C!");
    assert_eq!(recv(&mut b).await, ">> SERVER: Goodbye C!");

    // The survivors still relay normally
    a.send("still here".to_string()).await.unwrap();
    assert_eq!(recv(&mut a).await, ">> A: still here");
    assert_eq!(recv(&mut b).await, ">> A: still here");

    server.abort();
}

#[tokio::test]
async fn test_large_frame_reassembled_end_to_end() {
    let (addr, registry, server) = start_relay().await;

    let mut a = connect(addr, "A").await;
    assert_eq!(recv(&mut a).await, ">> SERVER: Welcome, A!");
    let mut b = connect(addr, "B").await;
    assert_eq!(recv(&mut a).await, ">> SERVER: Welcome, B!");
    assert_eq!(recv(&mut b).await, ">> SERVER: Welcome, B!");
    wait_for_len(&registry, 2).await;

    // Far larger than any single TCP read; must arrive as one message
    let long = "x".repeat(50_000);
    a.send(long.clone()).await.unwrap();
    assert_eq!(recv(&mut b).await, format!(">> A: {}", long));

    server.abort();
}

#[tokio::test]
async fn test_idle_session_evicted_on_read_deadline() {
    let (addr, registry, server) = start_relay_with_idle_timeout(1).await;

    let mut idle = connect(addr, "Idle").await;
    assert_eq!(recv(&mut idle).await, ">> SERVER: Welcome, Idle!");
    let mut active = connect(addr, "Active").await;
    assert_eq!(recv(&mut idle).await, ">> SERVER: Welcome, Active!");
    assert_eq!(recv(&mut active).await, ">> SERVER: Welcome, Active!");
    wait_for_len(&registry, 2).await;

    // Keep one peer talking while the other's read deadline runs out.
    // Each send echoes straight back, so this loop spins well inside
    // the one-second deadline until the farewell shows up.
    let mut saw_farewell = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        active.send("ping".to_string()).await.unwrap();
        if recv(&mut active).await == ">> SERVER: Goodbye Idle!" {
            saw_farewell = true;
            break;
        }
    }
    assert!(saw_farewell, "idle peer was never evicted");

    // Evicted through the same removal path as a disconnect: only the
    // talking peer is left, and the idle peer's socket is closed
    let remaining = registry.snapshot();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "Active");

    let mut saw_eof = false;
    for _ in 0..100 {
        match timeout(RECV_TIMEOUT, idle.next()).await.expect("no EOF") {
            Some(Ok(_)) => continue, // pings relayed before the eviction
            _ => {
                saw_eof = true;
                break;
            }
        }
    }
    assert!(saw_eof, "idle peer's connection was never closed");

    server.abort();
}

#[tokio::test]
async fn test_empty_name_is_reprompted() {
    let (addr, registry, server) = start_relay().await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut client = Framed::new(stream, FrameCodec::new());
    let _prompt = recv(&mut client).await;

    // Empty frames do not become a name; the session stays unregistered
    client.send(String::new()).await.unwrap();
    assert_eq!(registry.len(), 0);

    client.send("Ann".to_string()).await.unwrap();
    assert_eq!(recv(&mut client).await, ">> SERVER: Welcome, Ann!");
    wait_for_len(&registry, 1).await;

    server.abort();
}
