//! # 请求/响应头清洗
//!
//! 入站只放行会话 Cookie 与请求体类型。出站时 HTTP 客户端已解压并缓冲了响应体，
//! 上游的 `content-encoding` / `content-length` 不再描述实际发出的字节，必须丢弃。
//! `set-cookie` 在这里移除，由 [`super::cookie`] 改写后重新追加。

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};

/// 上游未声明时使用的默认内容类型
pub const DEFAULT_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// 请求 ID 头，转发给上游并回传给浏览器
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 允许转发到上游的入站头
const FORWARDED_REQUEST_HEADERS: &[HeaderName] = &[header::CONTENT_TYPE, header::COOKIE];

/// 不原样回传的上游响应头
const STRIPPED_RESPONSE_HEADERS: &[HeaderName] = &[
    header::SET_COOKIE,
    header::CONTENT_ENCODING,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    // 逐跳头
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
    // 上游实现细节
    header::SERVER,
];

const STRIPPED_RESPONSE_HEADER_NAMES: &[&str] = &["keep-alive", "x-powered-by"];

/// 选出可转发到上游的入站头
#[must_use]
pub fn forwardable_request_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for name in FORWARDED_REQUEST_HEADERS {
        for value in inbound.get_all(name) {
            forwarded.append(name.clone(), value.clone());
        }
    }
    forwarded
}

/// 从上游响应构建面向浏览器的头集合
#[must_use]
pub fn sanitize_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if is_stripped(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    finalize_gateway_headers(&mut headers);
    headers
}

/// 补齐所有网关响应都携带的头
pub fn finalize_gateway_headers(headers: &mut HeaderMap) {
    // 网关不做任何缓存
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(DEFAULT_CONTENT_TYPE),
        );
    }
}

fn is_stripped(name: &HeaderName) -> bool {
    STRIPPED_RESPONSE_HEADERS.contains(name)
        || STRIPPED_RESPONSE_HEADER_NAMES.contains(&name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("br"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("1234"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::SET_COOKIE, HeaderValue::from_static("token=abc"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=600"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-powered-by", HeaderValue::from_static("Express"));
        headers.insert(header::ETAG, HeaderValue::from_static("\"v1\""));
        headers
    }

    #[test]
    fn test_response_drops_framing_and_encoding() {
        let headers = sanitize_response_headers(&upstream_headers());

        for name in ["content-encoding", "content-length", "transfer-encoding", "set-cookie"] {
            assert!(headers.get(name).is_none(), "{name} must not be relayed");
        }
        assert!(headers.get("connection").is_none());
        assert!(headers.get("keep-alive").is_none());
        assert!(headers.get("x-powered-by").is_none());
        assert_eq!(headers.get(header::ETAG).unwrap(), "\"v1\"");
    }

    #[test]
    fn test_response_forces_no_store() {
        let headers = sanitize_response_headers(&upstream_headers());
        let values: Vec<_> = headers.get_all(header::CACHE_CONTROL).iter().collect();
        assert_eq!(values, vec![HeaderValue::from_static("no-store")]);
    }

    #[test]
    fn test_content_type_default_and_passthrough() {
        let headers = sanitize_response_headers(&HeaderMap::new());
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), DEFAULT_CONTENT_TYPE);

        let mut upstream = HeaderMap::new();
        upstream.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let headers = sanitize_response_headers(&upstream);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/plain");
    }

    #[test]
    fn test_request_keeps_only_cookie_and_content_type() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::COOKIE, HeaderValue::from_static("token=abc"));
        inbound.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        inbound.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, br"));
        inbound.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer x"));
        inbound.insert(header::HOST, HeaderValue::from_static("app.example.com"));

        let forwarded = forwardable_request_headers(&inbound);
        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded.get(header::COOKIE).unwrap(), "token=abc");
        assert!(forwarded.get(header::ACCEPT_ENCODING).is_none());
    }
}
