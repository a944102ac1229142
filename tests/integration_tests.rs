//! peercache Integration Tests
//!
//! Runs real nodes on ephemeral localhost ports:
//! - Remote fetch from the owning peer
//! - Fallback to the local loader when the owner is down or times out
//! - Peer protocol status codes

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use peercache::peer::DEFAULT_REPLICAS;
use peercache::{GetterFn, Group, GroupRegistry, HashRing, HttpPool, PoolConfig};
use tokio::net::TcpListener;

// =============================================================================
// Harness
// =============================================================================

struct Node {
    url: String,
    group: Arc<Group>,
    loads: Arc<AtomicUsize>,
}

fn source() -> HashMap<String, String> {
    let mut data: HashMap<String, String> = (0..64)
        .map(|i| (format!("key-{}", i), format!("value-{}", i)))
        .collect();
    data.insert("Tom".to_string(), "630".to_string());
    data.insert("Jack".to_string(), "589".to_string());
    data
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Accepts connections and holds them open without ever answering
async fn stalled_peer() -> String {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            open.push(stream);
        }
    });
    url
}

/// Start a node serving one "scores" group; `peers` is the full peer list
async fn start_node(listener: TcpListener, url: String, peers: &[String]) -> Node {
    start_node_with_timeout(listener, url, peers, Duration::from_secs(2)).await
}

async fn start_node_with_timeout(
    listener: TcpListener,
    url: String,
    peers: &[String],
    request_timeout: Duration,
) -> Node {
    let registry = Arc::new(GroupRegistry::new());
    let loads = Arc::new(AtomicUsize::new(0));

    let data = source();
    let counter = Arc::clone(&loads);
    let group = registry
        .new_group(
            "scores",
            2 << 10,
            GetterFn(move |key: &str| -> anyhow::Result<Vec<u8>> {
                counter.fetch_add(1, Ordering::SeqCst);
                data.get(key)
                    .map(|v| v.clone().into_bytes())
                    .ok_or_else(|| anyhow::anyhow!("{} not exist", key))
            }),
        )
        .unwrap();

    let config = PoolConfig {
        request_timeout,
        ..Default::default()
    };
    let pool = Arc::new(HttpPool::with_config(url.clone(), config, registry).unwrap());
    pool.set(peers.iter().cloned());
    group.register_peers(pool.clone()).unwrap();

    tokio::spawn(pool.serve(listener));

    Node { url, group, loads }
}

fn key_owned_by(peers: &[String], owner: &str) -> String {
    let mut ring = HashRing::new(DEFAULT_REPLICAS);
    ring.add(peers);

    (0..64)
        .map(|i| format!("key-{}", i))
        .find(|key| ring.get(key) == Some(owner))
        .expect("some key maps to the owner")
}

// =============================================================================
// Remote Fetch
// =============================================================================

mod remote_fetch_tests {
    use super::*;

    #[tokio::test]
    async fn test_value_fetched_from_owner() {
        let (listener_a, url_a) = bind().await;
        let (listener_b, url_b) = bind().await;
        let peers = vec![url_a.clone(), url_b.clone()];

        let a = start_node(listener_a, url_a, &peers).await;
        let b = start_node(listener_b, url_b, &peers).await;

        let key = key_owned_by(&peers, &b.url);
        let value = a.group.get(&key).await.unwrap();
        let expected = key.replace("key", "value");

        assert_eq!(value.to_string(), expected);
        assert_eq!(a.loads.load(Ordering::SeqCst), 0);
        assert_eq!(b.loads.load(Ordering::SeqCst), 1);

        // the owner caches, the requester does not
        assert_eq!(a.group.cache_stats().items, 0);
        assert_eq!(b.group.cache_stats().items, 1);
        assert_eq!(a.group.stats().peer_loads, 1);
        assert_eq!(b.group.stats().server_requests, 1);

        // second fetch is served from the owner's cache
        a.group.get(&key).await.unwrap();
        assert_eq!(b.loads.load(Ordering::SeqCst), 1);
        assert_eq!(b.group.stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_self_owned_key_is_loaded_locally() {
        let (listener_a, url_a) = bind().await;
        let (listener_b, url_b) = bind().await;
        let peers = vec![url_a.clone(), url_b.clone()];

        let a = start_node(listener_a, url_a, &peers).await;
        let b = start_node(listener_b, url_b, &peers).await;

        let key = key_owned_by(&peers, &a.url);
        a.group.get(&key).await.unwrap();

        assert_eq!(a.loads.load(Ordering::SeqCst), 1);
        assert_eq!(b.loads.load(Ordering::SeqCst), 0);
        assert_eq!(a.group.cache_stats().items, 1);
    }

    #[tokio::test]
    async fn test_missing_key_on_owner_falls_back_locally() {
        let (listener_a, url_a) = bind().await;
        let (listener_b, url_b) = bind().await;
        let peers = vec![url_a.clone(), url_b.clone()];

        let a = start_node(listener_a, url_a, &peers).await;
        let b = start_node(listener_b, url_b.clone(), &peers).await;

        // find an unknown key that the other node owns
        let mut ring = HashRing::new(DEFAULT_REPLICAS);
        ring.add(&peers);
        let key = (0..)
            .map(|i| format!("unknown-{}", i))
            .find(|key| ring.get(key) == Some(url_b.as_str()))
            .unwrap();

        let err = a.group.get(&key).await.unwrap_err();
        assert!(err.is_not_found());

        // owner answered 404, then the requester asked its own loader
        assert_eq!(b.loads.load(Ordering::SeqCst), 1);
        assert_eq!(a.loads.load(Ordering::SeqCst), 1);
        assert_eq!(a.group.stats().peer_errors, 1);
    }
}

// =============================================================================
// Fallback
// =============================================================================

mod fallback_tests {
    use super::*;

    #[tokio::test]
    async fn test_owner_down_falls_back_to_loader() {
        let (listener, url) = bind().await;
        let dead = dead_url();
        let peers = vec![url.clone(), dead.clone()];

        let node = start_node(listener, url, &peers).await;

        let key = key_owned_by(&peers, &dead);
        let value = node.group.get(&key).await.unwrap();

        assert_eq!(value.to_string(), key.replace("key", "value"));
        assert_eq!(node.loads.load(Ordering::SeqCst), 1);
        assert_eq!(node.group.stats().peer_errors, 1);
        assert_eq!(node.group.cache_stats().items, 1);

        // now cached locally
        node.group.get(&key).await.unwrap();
        assert_eq!(node.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_owner_timeout_falls_back_to_loader() {
        let (listener, url) = bind().await;
        let stalled = stalled_peer().await;
        let peers = vec![url.clone(), stalled.clone()];

        let node =
            start_node_with_timeout(listener, url, &peers, Duration::from_millis(300)).await;

        let key = key_owned_by(&peers, &stalled);
        let value = tokio::time::timeout(Duration::from_secs(5), node.group.get(&key))
            .await
            .expect("peer timeout should end the request")
            .unwrap();

        assert_eq!(value.to_string(), key.replace("key", "value"));
        assert_eq!(node.loads.load(Ordering::SeqCst), 1);

        let stats = node.group.stats();
        assert_eq!(stats.peer_errors, 1);
        assert_eq!(stats.peer_loads, 0);
        assert_eq!(node.group.cache_stats().items, 1);

        // served from the local cache without touching the stalled peer
        node.group.get(&key).await.unwrap();
        assert_eq!(node.group.stats().cache_hits, 1);
        assert_eq!(node.group.stats().peer_errors, 1);
    }
}

// =============================================================================
// Peer Protocol
// =============================================================================

mod protocol_tests {
    use super::*;
    use reqwest::StatusCode;

    async fn single_node() -> Node {
        let (listener, url) = bind().await;
        let peers = vec![url.clone()];
        start_node(listener, url, &peers).await
    }

    #[tokio::test]
    async fn test_scores_end_to_end() {
        let node = single_node().await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("{}/mycache/scores/Tom", node.url))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "application/octet-stream"
        );
        assert_eq!(response.text().await.unwrap(), "630");

        let response = client
            .get(format!("{}/mycache/missing/Tom", node.url))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let node = single_node().await;
        let client = reqwest::Client::new();

        let cases = [
            ("/mycache/scores", StatusCode::BAD_REQUEST),
            ("/elsewhere/scores/Tom", StatusCode::BAD_REQUEST),
            ("/mycache/scores/Nobody", StatusCode::NOT_FOUND),
        ];

        for (path, expected) in cases {
            let response = client
                .get(format!("{}{}", node.url, path))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), expected, "path {}", path);
        }

        let response = client
            .post(format!("{}/mycache/scores/Tom", node.url))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_loader_error_text_is_returned() {
        let node = single_node().await;

        let response = reqwest::get(format!("{}/mycache/scores/Nobody", node.url))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.text().await.unwrap().contains("Nobody not exist"));
    }

    #[tokio::test]
    async fn test_concurrent_clients() {
        let node = single_node().await;
        let client = reqwest::Client::new();

        let requests = (0..16).map(|i| {
            let client = client.clone();
            let url = format!("{}/mycache/scores/key-{}", node.url, i % 4);
            async move { client.get(url).send().await.unwrap().text().await.unwrap() }
        });

        let bodies = futures::future::join_all(requests).await;
        for (i, body) in bodies.iter().enumerate() {
            assert_eq!(body, &format!("value-{}", i % 4));
        }
        assert_eq!(node.group.stats().server_requests, 16);
    }
}
