//! HTTP response building module
//!
//! Provides builders for the responses the file server emits, decoupled from routing.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE, SERVER};
use hyper::{Response, StatusCode};

use super::cache::{Negotiation, Outcome};
use crate::error::ServeError;

/// Build 405 Method Not Allowed response
pub fn build_405_response(server_name: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(SERVER, server_name)
        .header(CONTENT_TYPE, "text/plain")
        .header(ALLOW, "GET, HEAD")
        .body(Full::new(Bytes::from("405 Method Not Allowed")))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(Full::new(Bytes::from("405 Method Not Allowed")))
        })
}

/// Build a plain-text error response for a failed file request
pub fn build_error_response(error: &ServeError, server_name: &str) -> Response<Full<Bytes>> {
    let status = error.status();
    let text = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error")
    );

    Response::builder()
        .status(status)
        .header(SERVER, server_name)
        .header(CONTENT_TYPE, "text/plain")
        .header(CONTENT_LENGTH, text.len())
        .body(Full::new(Bytes::from(text)))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            let mut fallback = Response::new(Full::new(Bytes::new()));
            *fallback.status_mut() = status;
            fallback
        })
}

/// Build the default document response; never carries cache validators
pub fn build_html_response(
    content: Bytes,
    server_name: &str,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let content_length = content.len();
    let body = if is_head { Bytes::new() } else { content };

    Response::builder()
        .status(StatusCode::OK)
        .header(SERVER, server_name)
        .header(CONTENT_TYPE, "text/html")
        .header(CONTENT_LENGTH, content_length)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("HTML", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build a file response from a negotiation result
///
/// `content` may be empty for a 304 that was decided without reading the file.
pub fn build_negotiated_response(
    negotiation: &Negotiation,
    content: Bytes,
    content_type: Option<&str>,
    server_name: &str,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let status = negotiation.status();
    let mut builder = Response::builder().status(status).header(SERVER, server_name);

    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    for (name, value) in &negotiation.headers {
        builder = builder.header(name.clone(), value.as_str());
    }

    let body = match negotiation.outcome {
        Outcome::NotModified => Bytes::new(),
        Outcome::Full => {
            builder = builder.header(CONTENT_LENGTH, content.len());
            if is_head {
                Bytes::new()
            } else {
                content
            }
        }
    };

    builder.body(Full::new(body)).unwrap_or_else(|e| {
        log_build_error(status.as_str(), &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationStrategy;
    use crate::http::cache::{digest, CacheNegotiator};
    use http_body_util::BodyExt;
    use hyper::header::{CACHE_CONTROL, ETAG};

    async fn body_bytes(resp: Response<Full<Bytes>>) -> Bytes {
        resp.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_full_response() {
        let content = Bytes::from_static(b"body { color: red }");
        let fp = digest(&content);
        let negotiation = CacheNegotiator::new(ValidationStrategy::Etag).negotiate(None, &fp);
        let resp =
            build_negotiated_response(&negotiation, content.clone(), Some("text/css"), "t", false);

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/css");
        assert_eq!(resp.headers()[ETAG], fp.as_str());
        assert_eq!(resp.headers()[CACHE_CONTROL], "no-cache");
        assert_eq!(body_bytes(resp).await, content);
    }

    #[tokio::test]
    async fn test_not_modified_has_no_body() {
        let content = Bytes::from_static(b"x");
        let fp = digest(&content);
        let negotiation =
            CacheNegotiator::new(ValidationStrategy::Etag).negotiate(Some(fp.as_str()), &fp);
        let resp = build_negotiated_response(&negotiation, content, None, "t", false);

        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert!(resp.headers().get(CONTENT_TYPE).is_none());
        assert!(body_bytes(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_head_keeps_length() {
        let resp = build_html_response(Bytes::from_static(b"<p>hi</p>"), "t", true);
        assert_eq!(resp.headers()[CONTENT_LENGTH], "9");
        assert!(body_bytes(resp).await.is_empty());
    }

    #[test]
    fn test_error_statuses() {
        let resp = build_error_response(&ServeError::PathTraversal("/..".into()), "t");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(build_405_response("t").headers()[ALLOW], "GET, HEAD");
    }
}
