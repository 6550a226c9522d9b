//! 上游地址解析工具
//!
//! 统一处理 `base_url` 可能包含的 scheme / path / 末尾斜杠，输出不可变的上游源。

use crate::ensure;
use crate::error::{GatewayError, Result};
use std::fmt;
use url::Url;

/// 已校验的上游基础地址，进程生命周期内不变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamOrigin {
    /// 不带末尾斜杠的基础地址，例如 `https://api.example.com` 或 `http://10.0.0.1:8000/v2`
    base: String,
    host: String,
}

impl UpstreamOrigin {
    /// 解析上游 `base_url`
    ///
    /// 缺少 scheme 时按 https 处理；仅接受 http/https
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        ensure!(
            !trimmed.is_empty(),
            GatewayError::config("base_url 不能为空")
        );

        let url = if trimmed.contains("://") {
            Url::parse(trimmed)?
        } else {
            Url::parse(&format!("https://{trimmed}"))?
        };

        ensure!(
            matches!(url.scheme(), "http" | "https"),
            GatewayError::config(format!("base_url 仅支持 http/https: {trimmed}"))
        );
        ensure!(
            url.query().is_none() && url.fragment().is_none(),
            GatewayError::config(format!("base_url 不能包含查询串或片段: {trimmed}"))
        );

        let host = url
            .host_str()
            .ok_or_else(|| GatewayError::config(format!("base_url 缺少 host: {trimmed}")))?
            .to_string();

        let base = url.as_str().trim_end_matches('/').to_string();

        Ok(Self { base, host })
    }

    /// 基础地址（无末尾斜杠）
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// 上游主机名
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// 拼接上游绝对路径与查询串
    #[must_use]
    pub fn join(&self, path: &str, query: Option<&str>) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        match query.filter(|q| !q.is_empty()) {
            Some(q) => format!("{}{path}?{q}", self.base),
            None => format!("{}{path}", self.base),
        }
    }
}

impl fmt::Display for UpstreamOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}
