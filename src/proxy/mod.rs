//! # 代理转发模块
//!
//! 浏览器 → 网关 → 上游 的单跳转发：路径改写、头清洗、Cookie 改写，
//! 以及上游休眠时的唤醒与单次重试

pub mod client;
pub mod context;
pub mod cookie;
pub mod forwarding;
pub mod headers;
pub mod route_table;
pub mod upstream_url;

pub use client::build_upstream_client;
pub use context::ForwardingContext;
pub use forwarding::{GatewayResponse, InboundRequest, RelayedResponse, RequestForwarder};
pub use route_table::{RouteTable, UpstreamTarget, split_subpath};
pub use upstream_url::UpstreamOrigin;
