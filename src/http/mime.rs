//! MIME type detection module
//!
//! Returns the Content-Type for a request path based on its extension.

/// Lookup key used when the final path segment has no extension
const NO_EXTENSION: &str = "unknown";

/// Extract the extension of the final path segment
///
/// Dotfiles such as `.bashrc` and names ending in a dot have no extension.
pub fn extension(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rfind('.') {
        Some(0) | None => None,
        Some(idx) if idx + 1 == segment.len() => None,
        Some(idx) => Some(&segment[idx + 1..]),
    }
}

/// Get MIME Content-Type for a request path
///
/// Keys are case-sensitive. A miss returns `None`; callers send no
/// Content-Type rather than erroring.
pub fn resolve(path: &str) -> Option<&'static str> {
    lookup(extension(path).unwrap_or(NO_EXTENSION))
}

fn lookup(extension: &str) -> Option<&'static str> {
    let content_type = match extension {
        // Text
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "less" => "text/less",
        "txt" => "text/plain",
        "xml" => "text/xml",

        // Scripts
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "wasm" => "application/wasm",

        // Images
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "tiff" => "image/tiff",
        "webp" => "image/webp",

        // Audio / video
        "wav" => "audio/x-wav",
        "wma" => "audio/x-ms-wma",
        "mp3" => "audio/mpeg",
        "wmv" => "video/x-ms-wmv",
        "mp4" => "video/mp4",
        "webm" => "video/webm",

        // Fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",

        // Documents
        "pdf" => "application/pdf",
        "swf" => "application/x-shockwave-flash",

        _ => return None,
    };
    Some(content_type)
}
