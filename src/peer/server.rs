//! Peer Server
//!
//! Serves `GET <base-path><group>/<key>` for the groups in the pool's
//! registry. Every failure is answered with a status code; nothing escapes
//! the connection task.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use super::pool::HttpPool;
use crate::error::{Error, Result};

impl HttpPool {
    /// Answer one protocol request
    pub async fn respond(&self, method: &Method, path: &str) -> Response<Full<Bytes>> {
        if method != Method::GET {
            return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        }

        let (group_name, key) = match self.split_path(path) {
            Ok(parts) => parts,
            Err(e) => {
                debug!(node = %self.self_url(), path, error = %e, "rejected request");
                return text(StatusCode::BAD_REQUEST, "bad request");
            }
        };

        info!(node = %self.self_url(), method = %method, path, "serving request");

        let Some(group) = self.registry().get_group(&group_name) else {
            let err = Error::GroupNotFound(group_name);
            return text(StatusCode::NOT_FOUND, err.to_string());
        };

        group.record_server_request();
        match group.get(&key).await {
            Ok(value) => {
                let mut response = Response::new(Full::new(value.bytes()));
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/octet-stream"),
                );
                response
            }
            Err(e) => {
                warn!(group = %group_name, key = %key, error = %e, "request failed");
                text(StatusCode::NOT_FOUND, e.to_string())
            }
        }
    }

    /// Strip the base path, percent-decode, and split into group and key.
    /// The key keeps any further `/`.
    fn split_path(&self, path: &str) -> Result<(String, String)> {
        let rest = path
            .strip_prefix(self.base_path())
            .ok_or_else(|| Error::BadRequest(format!("path outside {}", self.base_path())))?;

        let decoded = urlencoding::decode(rest)
            .map_err(|e| Error::BadRequest(format!("invalid path encoding: {}", e)))?;

        match decoded.split_once('/') {
            Some((group, key)) => Ok((group.to_string(), key.to_string())),
            None => Err(Error::BadRequest(format!("expected <group>/<key>, got {}", decoded))),
        }
    }

    /// Accept connections until the listener fails
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        info!(node = %self.self_url(), %addr, "peer server listening");

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let pool = Arc::clone(&self);

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let pool = Arc::clone(&pool);
                    async move {
                        let response = pool.respond(req.method(), req.uri().path()).await;
                        Ok::<_, Infallible>(response)
                    }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Peer server connection error: {}", e);
                }
            });
        }
    }
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{GetterFn, GroupRegistry};
    use crate::peer::PoolConfig;
    use http_body_util::BodyExt;

    fn scores_pool() -> HttpPool {
        let registry = Arc::new(GroupRegistry::new());
        registry
            .new_group(
                "scores",
                2 << 10,
                GetterFn(|key: &str| -> anyhow::Result<Vec<u8>> {
                    match key {
                        "Tom" => Ok(b"630".to_vec()),
                        "a/b" => Ok(b"slash".to_vec()),
                        _ => Err(anyhow::anyhow!("{} not exist", key)),
                    }
                }),
            )
            .unwrap();

        HttpPool::with_config("http://127.0.0.1:8001", PoolConfig::default(), registry).unwrap()
    }

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_hit_returns_value() {
        let pool = scores_pool();
        let response = pool.respond(&Method::GET, "/mycache/scores/Tom").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "application/octet-stream"
        );
        assert_eq!(body_string(response).await, "630");
    }

    #[tokio::test]
    async fn test_unknown_group_is_not_found() {
        let pool = scores_pool();
        let response = pool.respond(&Method::GET, "/mycache/missing/Tom").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "no such group: missing");
    }

    #[tokio::test]
    async fn test_loader_failure_is_not_found_with_message() {
        let pool = scores_pool();
        let response = pool.respond(&Method::GET, "/mycache/scores/Nobody").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("Nobody not exist"));
    }

    #[tokio::test]
    async fn test_single_segment_is_bad_request() {
        let pool = scores_pool();
        let response = pool.respond(&Method::GET, "/mycache/scores").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_path_outside_base_is_bad_request() {
        let pool = scores_pool();
        let response = pool.respond(&Method::GET, "/other/scores/Tom").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_bad_request() {
        let pool = scores_pool();
        let response = pool.respond(&Method::GET, "/mycache/scores/%FF%FE").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_get_is_rejected() {
        let pool = scores_pool();
        let response = pool.respond(&Method::POST, "/mycache/scores/Tom").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_escaped_key_keeps_slash() {
        let pool = scores_pool();
        let response = pool.respond(&Method::GET, "/mycache/scores/a%2Fb").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "slash");
    }

    #[tokio::test]
    async fn test_served_requests_are_counted() {
        let pool = scores_pool();
        pool.respond(&Method::GET, "/mycache/scores/Tom").await;
        pool.respond(&Method::GET, "/mycache/scores/Tom").await;

        let group = pool.registry().get_group("scores").unwrap();
        let stats = group.stats();
        assert_eq!(stats.server_requests, 2);
        assert_eq!(stats.cache_hits, 1);
    }
}
