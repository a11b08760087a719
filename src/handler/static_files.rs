//! Static file serving module
//!
//! Resolves request paths under the root directory, loads the file, and runs
//! cache negotiation to build the response.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::ETAG;
use hyper::Response;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::loader;
use crate::config::{AppState, ValidationStrategy};
use crate::error::ServeError;
use crate::handler::router::RequestContext;
use crate::http::cache::{self, CacheNegotiator, Negotiation, Outcome};
use crate::http::{self, mime};
use crate::logger;

/// Served at `/` when the default document is missing from the root directory
const BUILTIN_HOMEPAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>etagd</title>
</head>
<body>
    <h1>etagd</h1>
    <p>Static files are served with content-hash validation.</p>
</body>
</html>
"#;

/// Serve the default document at `/`
///
/// 200 `text/html` with no validators; `If-None-Match` is ignored. The
/// built-in page stands in only when the document does not exist.
pub async fn serve_root(
    ctx: &RequestContext<'_>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, ServeError> {
    let files = &state.config.files;
    let path = state.root_dir.join(&files.default_document);

    let content = match loader::load_bytes(&path, files.max_file_size).await {
        Ok(content) => content.bytes,
        Err(ServeError::NotFound(_)) => Bytes::from_static(BUILTIN_HOMEPAGE.as_bytes()),
        Err(e) => return Err(e),
    };

    Ok(http::build_html_response(
        content,
        &state.config.http.server_name,
        ctx.is_head,
    ))
}

/// Serve a file below the root directory
pub async fn serve_file(
    ctx: &RequestContext<'_>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, ServeError> {
    let files = &state.config.files;
    let path = locate_file(&state.root_dir, ctx.path, &files.default_document).await?;

    let content_type = mime::resolve(&path.to_string_lossy())
        .or(files.fallback_content_type.as_deref());

    let (negotiation, content) = match state.negotiator.strategy() {
        ValidationStrategy::None => {
            let content = loader::load_bytes(&path, files.max_file_size).await?;
            (CacheNegotiator::unvalidated(), content.bytes)
        }
        ValidationStrategy::Etag => negotiate_etag(ctx, state, &path).await?,
        ValidationStrategy::LastModified => {
            let (modified, _) = loader::stat_modified_time(&path).await?;
            let negotiation = state
                .negotiator
                .negotiate_modified(ctx.if_modified_since.as_deref(), modified);
            let content = match negotiation.outcome {
                Outcome::NotModified => Bytes::new(),
                Outcome::Full => loader::load_bytes(&path, files.max_file_size).await?.bytes,
            };
            (negotiation, content)
        }
    };

    logger::log_debug(&format!(
        "[Cache] {} -> {:?} (etag: {})",
        path.display(),
        negotiation.outcome,
        negotiation.header(&ETAG).unwrap_or("-")
    ));

    Ok(http::build_negotiated_response(
        &negotiation,
        content,
        content_type,
        &state.config.http.server_name,
        ctx.is_head,
    ))
}

/// Fingerprint the file and negotiate against `If-None-Match`
///
/// With the fingerprint cache enabled, a matching validator for an unchanged
/// file is answered without reading it.
async fn negotiate_etag(
    ctx: &RequestContext<'_>,
    state: &AppState,
    path: &Path,
) -> Result<(Negotiation, Bytes), ServeError> {
    let if_none_match = ctx.if_none_match.as_deref();

    if let (Some(fingerprints), Some(_)) = (&state.fingerprints, if_none_match) {
        let (modified, len) = loader::stat_modified_time(path).await?;
        if let Some(fingerprint) = fingerprints.get(path, modified, len) {
            let negotiation = state.negotiator.negotiate(if_none_match, &fingerprint);
            if negotiation.outcome == Outcome::NotModified {
                return Ok((negotiation, Bytes::new()));
            }
        }
    }

    let content = loader::load_bytes(path, state.config.files.max_file_size).await?;
    let fingerprint = cache::digest(&content.bytes);

    if let (Some(fingerprints), Some(modified)) = (&state.fingerprints, content.modified) {
        fingerprints.insert(
            content.source_path.clone(),
            modified,
            content.bytes.len() as u64,
            fingerprint.clone(),
        );
    }

    let negotiation = state.negotiator.negotiate(if_none_match, &fingerprint);
    Ok((negotiation, content.bytes))
}

/// Map a request path onto the filesystem without touching it
///
/// The path is percent-decoded, then split into segments. Any `..` segment,
/// backslash, or NUL is rejected before any file access.
pub fn resolve_request_path(root: &Path, request_path: &str) -> Result<PathBuf, ServeError> {
    let decoded = percent_decode_str(request_path)
        .decode_utf8()
        .map_err(|_| ServeError::BadPath(request_path.to_string()))?;

    let mut path = root.to_path_buf();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(ServeError::PathTraversal(request_path.to_string())),
            s if s.contains(['\\', '\0']) => {
                return Err(ServeError::PathTraversal(request_path.to_string()))
            }
            s => path.push(s),
        }
    }
    Ok(path)
}

/// Resolve a request path to an existing file inside the root directory
///
/// Directories resolve to their default document. Symlinks pointing outside
/// the root are rejected.
async fn locate_file(
    root: &Path,
    request_path: &str,
    default_document: &str,
) -> Result<PathBuf, ServeError> {
    let mut path = resolve_request_path(root, request_path)?;

    if fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
        path.push(default_document);
    }

    let root_canonical = fs::canonicalize(root)
        .await
        .map_err(|e| ServeError::from_io(root.to_path_buf(), e))?;
    let file_canonical = fs::canonicalize(&path)
        .await
        .map_err(|e| ServeError::from_io(path.clone(), e))?;

    if !file_canonical.starts_with(&root_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            request_path,
            file_canonical.display()
        ));
        return Err(ServeError::PathTraversal(request_path.to_string()));
    }

    Ok(path)
}
