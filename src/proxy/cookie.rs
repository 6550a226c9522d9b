//! # Set-Cookie 改写
//!
//! 上游与网关跨域，浏览器与网关同源。上游下发的会话 Cookie 需要：
//! 去掉 `Domain`（回落到响应源的默认作用域），并把 `SameSite=None` 降为 `SameSite=Lax`。

use axum::http::{HeaderMap, HeaderValue, header};

/// 改写单个 `Set-Cookie` 值
///
/// 第一个段（`name=value`）原样保留；之后的属性按名称大小写不敏感处理。
/// 结果重复改写保持不变。
#[must_use]
pub fn rewrite(set_cookie: &str) -> String {
    let mut parts = set_cookie.split(';').map(str::trim).filter(|p| !p.is_empty());

    let Some(pair) = parts.next() else {
        return String::new();
    };

    let mut rewritten = vec![pair.to_string()];
    for attribute in parts {
        let (name, value) = attribute
            .split_once('=')
            .map_or((attribute, None), |(n, v)| (n.trim(), Some(v.trim())));

        if name.eq_ignore_ascii_case("domain") {
            continue;
        }
        if name.eq_ignore_ascii_case("samesite")
            && value.is_some_and(|v| v.eq_ignore_ascii_case("none"))
        {
            rewritten.push("SameSite=Lax".to_string());
            continue;
        }
        rewritten.push(attribute.to_string());
    }

    rewritten.join("; ")
}

/// 改写上游响应中的全部 `Set-Cookie`，追加到目标头集合
///
/// 没有 `Set-Cookie` 时不产生任何头；无法表示为合法头值的结果被丢弃并返回计数
pub fn rewrite_all(upstream: &HeaderMap, target: &mut HeaderMap) -> usize {
    let mut dropped = 0;
    for value in upstream.get_all(header::SET_COOKIE) {
        let Ok(raw) = value.to_str() else {
            dropped += 1;
            continue;
        };
        let rewritten = rewrite(raw);
        if rewritten.is_empty() {
            continue;
        }
        match HeaderValue::from_str(&rewritten) {
            Ok(v) => {
                target.append(header::SET_COOKIE, v);
            }
            Err(_) => dropped += 1,
        }
    }
    dropped
}
