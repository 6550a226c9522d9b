//! # BFF Gateway Library
//!
//! 记账应用的浏览器侧网关核心库：同源转发、Cookie 改写、上游冷启动唤醒

pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod logging;
pub mod proxy;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use gateway::{AppState, GatewayServer, create_router};
