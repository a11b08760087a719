//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, dispatch of `/`
//! to the default document and every other path to the file flow.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, REFERER, USER_AGENT};
use hyper::{HeaderMap, Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppState;
use crate::handler::static_files;
use crate::http;
use crate::logger::{self, AccessLogEntry};

/// Request context encapsulating information needed for request processing
#[derive(Debug, Clone)]
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
}

impl<'a> RequestContext<'a> {
    /// Capture the validators from the request headers
    pub fn from_parts(path: &'a str, method: &Method, headers: &HeaderMap) -> Self {
        Self {
            path,
            is_head: *method == Method::HEAD,
            if_none_match: header_string(headers, &IF_NONE_MATCH),
            if_modified_since: header_string(headers, &IF_MODIFIED_SINCE),
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let method = req.method();
    let uri = req.uri();

    let response = if matches!(*method, Method::GET | Method::HEAD) {
        let ctx = RequestContext::from_parts(uri.path(), method, req.headers());
        route_request(&ctx, &state).await
    } else {
        logger::log_warning(&format!("Method not allowed: {method}"));
        http::build_405_response(&state.config.http.server_name)
    };

    if state.access_log_enabled() {
        let mut entry = AccessLogEntry::new(
            peer_addr.ip().to_string(),
            method.to_string(),
            uri.path().to_string(),
        );
        entry.query = uri.query().map(ToString::to_string);
        entry.http_version = version_label(req.version()).to_string();
        entry.status = response.status().as_u16();
        entry.body_bytes = body_len(&response);
        entry.referer = header_string(req.headers(), &REFERER);
        entry.user_agent = header_string(req.headers(), &USER_AGENT);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route request based on path
pub async fn route_request(ctx: &RequestContext<'_>, state: &AppState) -> Response<Full<Bytes>> {
    let result = if ctx.path == "/" {
        static_files::serve_root(ctx, state).await
    } else {
        static_files::serve_file(ctx, state).await
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            if e.status().is_server_error() {
                logger::log_error(&e.to_string());
            } else {
                logger::log_debug(&format!("[Request] {}: {e}", ctx.path));
            }
            http::build_error_response(&e, &state.config.http.server_name)
        }
    }
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn body_len(response: &Response<Full<Bytes>>) -> usize {
    hyper::body::Body::size_hint(response.body())
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

const fn version_label(version: hyper::Version) -> &'static str {
    match version {
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ValidationStrategy};
    use http_body_util::BodyExt;
    use hyper::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, LAST_MODIFIED};
    use hyper::StatusCode;
    use std::path::Path;

    fn state_for(root: &Path, configure: impl FnOnce(&mut Config)) -> AppState {
        let mut cfg = Config::for_root(root);
        configure(&mut cfg);
        AppState::new(&cfg)
    }

    fn get(path: &str) -> RequestContext<'_> {
        RequestContext {
            path,
            is_head: false,
            if_none_match: None,
            if_modified_since: None,
        }
    }

    async fn body_of(resp: Response<Full<Bytes>>) -> Bytes {
        resp.into_body().collect().await.unwrap().to_bytes()
    }

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), b"<h1>home</h1>").unwrap();
        std::fs::write(dir.path().join("style.css"), b"body { margin: 0 }").unwrap();
        std::fs::write(dir.path().join("file.unknownext"), b"???").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_root_serves_default_document() {
        let dir = site();
        let state = state_for(dir.path(), |_| {});
        let mut ctx = get("/");
        ctx.if_none_match = Some("anything".to_string());

        let resp = route_request(&ctx, &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/html");
        assert!(resp.headers().get(ETAG).is_none());
        assert!(resp.headers().get(CACHE_CONTROL).is_none());
        assert_eq!(&body_of(resp).await[..], b"<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_root_without_document_uses_builtin_page() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(dir.path(), |_| {});
        let resp = route_request(&get("/"), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/html");
        assert!(!body_of(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_root_with_oversized_document_is_500() {
        let dir = site();
        let state = state_for(dir.path(), |cfg| cfg.files.max_file_size = 4);
        let resp = route_request(&get("/"), &state).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.headers().get(ETAG).is_none());
        let body = body_of(resp).await;
        assert!(!body.windows(4).any(|w| w == b"home"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_root_with_unreadable_document_is_500() {
        let dir = site();
        let state = state_for(dir.path(), |cfg| {
            cfg.files.default_document = "index.html/inner.html".to_string();
        });
        let resp = route_request(&get("/"), &state).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_etag_round_trip() {
        let dir = site();
        let state = state_for(dir.path(), |_| {});

        let first = route_request(&get("/style.css"), &state).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[CONTENT_TYPE], "text/css");
        assert_eq!(first.headers()[CACHE_CONTROL], "no-cache");
        let etag = first.headers()[ETAG].to_str().unwrap().to_string();
        assert_eq!(etag, crate::http::cache::digest(b"body { margin: 0 }").as_str());
        assert_eq!(&body_of(first).await[..], b"body { margin: 0 }");

        let mut revalidate = get("/style.css");
        revalidate.if_none_match = Some(etag.clone());
        let second = route_request(&revalidate, &state).await;
        assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
        assert!(body_of(second).await.is_empty());

        std::fs::write(dir.path().join("style.css"), b"body { margin: 1px }").unwrap();
        let third = route_request(&revalidate, &state).await;
        assert_eq!(third.status(), StatusCode::OK);
        assert_ne!(third.headers()[ETAG].to_str().unwrap(), etag);
    }

    #[tokio::test]
    async fn test_stale_validator_gets_full_body() {
        let dir = site();
        let state = state_for(dir.path(), |_| {});
        let mut ctx = get("/style.css");
        ctx.if_none_match = Some("stale".to_string());

        let resp = route_request(&ctx, &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(ETAG).is_some());
    }

    #[tokio::test]
    async fn test_unknown_extension_has_no_content_type() {
        let dir = site();
        let state = state_for(dir.path(), |_| {});
        let resp = route_request(&get("/file.unknownext"), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(CONTENT_TYPE).is_none());

        let state = state_for(dir.path(), |cfg| {
            cfg.files.fallback_content_type = Some("application/octet-stream".to_string());
        });
        let resp = route_request(&get("/file.unknownext"), &state).await;
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/octet-stream");
    }

    #[tokio::test]
    async fn test_traversal_is_forbidden() {
        let dir = site();
        let state = state_for(dir.path(), |_| {});
        let resp = route_request(&get("/../../etc/passwd"), &state).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(!body_of(resp).await.starts_with(b"root:"));
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let dir = site();
        let state = state_for(dir.path(), |_| {});
        let resp = route_request(&get("/does-not-exist.png"), &state).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_oversized_file_is_500() {
        let dir = site();
        let state = state_for(dir.path(), |cfg| cfg.files.max_file_size = 4);
        let resp = route_request(&get("/style.css"), &state).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_failure_is_500() {
        let dir = site();
        let state = state_for(dir.path(), |_| {});
        // A regular file used as a directory fails with ENOTDIR, not ENOENT
        let resp = route_request(&get("/style.css/inner.css"), &state).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.headers().get(ETAG).is_none());
        assert_eq!(&body_of(resp).await[..], b"500 Internal Server Error");
    }

    #[tokio::test]
    async fn test_head_has_no_body() {
        let dir = site();
        let state = state_for(dir.path(), |_| {});
        let mut ctx = get("/style.css");
        ctx.is_head = true;
        let resp = route_request(&ctx, &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(ETAG).is_some());
        assert!(body_of(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_no_validation_strategy() {
        let dir = site();
        let state = state_for(dir.path(), |cfg| cfg.files.validation = ValidationStrategy::None);
        let mut ctx = get("/style.css");
        ctx.if_none_match = Some(crate::http::cache::digest(b"body { margin: 0 }").to_string());
        let resp = route_request(&ctx, &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(ETAG).is_none());
        assert!(resp.headers().get(CACHE_CONTROL).is_none());
    }

    #[tokio::test]
    async fn test_last_modified_strategy() {
        let dir = site();
        let state = state_for(dir.path(), |cfg| {
            cfg.files.validation = ValidationStrategy::LastModified;
        });

        let first = route_request(&get("/style.css"), &state).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert!(first.headers().get(ETAG).is_none());
        let last_modified = first.headers()[LAST_MODIFIED].to_str().unwrap().to_string();

        let mut ctx = get("/style.css");
        ctx.if_modified_since = Some(last_modified);
        let second = route_request(&ctx, &state).await;
        assert_eq!(second.status(), StatusCode::NOT_MODIFIED);

        ctx.if_modified_since = Some("Thu, 01 Jan 1970 00:00:00 GMT".to_string());
        let third = route_request(&ctx, &state).await;
        assert_eq!(third.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_fingerprint_cache_is_populated() {
        let dir = site();
        let state = state_for(dir.path(), |cfg| cfg.files.fingerprint_cache = true);
        let fingerprints = state.fingerprints.as_ref().unwrap();
        assert_eq!(fingerprints.len(), 0);

        let first = route_request(&get("/style.css"), &state).await;
        let etag = first.headers()[ETAG].to_str().unwrap().to_string();
        assert_eq!(fingerprints.len(), 1);

        let mut ctx = get("/style.css");
        ctx.if_none_match = Some(etag);
        let second = route_request(&ctx, &state).await;
        assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(second.headers()[CACHE_CONTROL], "no-cache");
    }

    #[tokio::test]
    async fn test_handle_request_rejects_post() {
        let dir = site();
        let state = Arc::new(state_for(dir.path(), |_| {}));
        let req = Request::builder()
            .method(Method::POST)
            .uri("/style.css")
            .body(())
            .unwrap();
        let resp = handle_request(req, state, "127.0.0.1:1".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_handle_request_reads_headers() {
        let dir = site();
        let state = Arc::new(state_for(dir.path(), |_| {}));
        let etag = crate::http::cache::digest(b"body { margin: 0 }");
        let req = Request::builder()
            .uri("/style.css?v=2")
            .header("IF-NONE-MATCH", etag.as_str())
            .body(())
            .unwrap();
        let resp = handle_request(req, state, "127.0.0.1:1".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
    }
}
