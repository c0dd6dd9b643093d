//! URL path handling: percent decoding, prefix stripping and `Destination`
//! parsing.

use http::HeaderMap;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use davgate_auth::permission::normalize_path;
use davgate_core::error::AppError;

/// Bytes escaped in a path segment when building hrefs.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}')
    .add(b'/');

/// Normalize a configured URL prefix: `""` for the root, otherwise a
/// leading slash and no trailing slash.
pub fn normalize_prefix(prefix: &str) -> String {
    let normalized = normalize_path(prefix);
    if normalized == "/" {
        String::new()
    } else {
        normalized
    }
}

/// Percent-decode a URL path.
pub fn decode_path(raw: &str) -> Result<String, AppError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|p| p.into_owned())
        .map_err(|_| AppError::validation("request path is not valid UTF-8"))
}

/// Strip `prefix` (as returned by [`normalize_prefix`]) from a decoded URL
/// path on a segment boundary. Returns the normalized remainder, or `None`
/// when the path lies outside the prefix.
pub fn strip_prefix(prefix: &str, path: &str) -> Option<String> {
    if prefix.is_empty() {
        return Some(normalize_path(path));
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(normalize_path(rest))
    } else {
        None
    }
}

/// Build an href for a resource path under `prefix`. Collections get a
/// trailing slash.
pub fn href(prefix: &str, path: &str, is_dir: bool) -> String {
    let mut out = String::from(prefix);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.extend(utf8_percent_encode(segment, SEGMENT));
    }
    if out.is_empty() || is_dir {
        out.push('/');
    }
    out
}

/// The decoded path named by the `Destination` header, still carrying the
/// URL prefix. `None` when the header is absent.
///
/// Absolute URLs must name the same host as the request.
pub fn destination(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    let Some(value) = headers.get("Destination") else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::validation("invalid Destination header"))?;

    let uri: http::Uri = value
        .parse()
        .map_err(|_| AppError::validation("invalid Destination header"))?;

    if let Some(authority) = uri.authority() {
        let host = headers
            .get(http::header::HOST)
            .and_then(|h| h.to_str().ok());
        if host.is_some_and(|h| !h.eq_ignore_ascii_case(authority.as_str())) {
            return Err(AppError::bad_gateway(
                "Destination refers to a different server",
            ));
        }
    }

    decode_path(uri.path()).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/dav/"), "/dav");
        assert_eq!(normalize_prefix("dav"), "/dav");
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("", "/a/b").as_deref(), Some("/a/b"));
        assert_eq!(strip_prefix("/dav", "/dav").as_deref(), Some("/"));
        assert_eq!(strip_prefix("/dav", "/dav/x/").as_deref(), Some("/x"));
        assert_eq!(strip_prefix("/dav", "/davx/y"), None);
        assert_eq!(strip_prefix("/dav", "/other"), None);
    }

    #[test]
    fn test_strip_prefix_clamps_traversal() {
        assert_eq!(
            strip_prefix("/dav", "/dav/../../etc/passwd").as_deref(),
            Some("/etc/passwd")
        );
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(decode_path("/a%20b/%C3%A9").unwrap(), "/a b/é");
        assert!(decode_path("/%FF").is_err());
    }

    #[test]
    fn test_href_encodes_segments() {
        assert_eq!(href("", "/", true), "/");
        assert_eq!(href("/dav", "/", true), "/dav/");
        assert_eq!(href("/dav", "/a b/c#d.txt", false), "/dav/a%20b/c%23d.txt");
        assert_eq!(href("", "/docs", true), "/docs/");
    }

    #[test]
    fn test_destination_parsing() {
        let mut headers = HeaderMap::new();
        assert!(destination(&headers).unwrap().is_none());

        headers.insert("destination", HeaderValue::from_static("/dav/new%20name"));
        assert_eq!(destination(&headers).unwrap().as_deref(), Some("/dav/new name"));

        headers.insert(http::header::HOST, HeaderValue::from_static("example.com"));
        headers.insert(
            "destination",
            HeaderValue::from_static("http://example.com/dav/b"),
        );
        assert_eq!(destination(&headers).unwrap().as_deref(), Some("/dav/b"));

        headers.insert(
            "destination",
            HeaderValue::from_static("http://elsewhere.org/dav/b"),
        );
        let err = destination(&headers).unwrap_err();
        assert!(err.is(davgate_core::ErrorKind::BadGateway));
    }
}
