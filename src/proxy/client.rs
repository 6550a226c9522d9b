//! 上游 HTTP 客户端构建

use reqwest::{Client, redirect};

use crate::config::UpstreamConfig;
use crate::error::{GatewayError, Result};

/// 构建转发与探测共用的上游客户端
///
/// 不跟随重定向：3xx 原样交给浏览器。压缩协商只发生在网关与上游之间，
/// 客户端自动解压响应体。
pub fn build_upstream_client(config: &UpstreamConfig) -> Result<Client> {
    Client::builder()
        .redirect(redirect::Policy::none())
        .connect_timeout(config.connect_timeout())
        .timeout(config.request_timeout())
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| GatewayError::internal_with_source("创建上游 HTTP 客户端失败", e))
}
