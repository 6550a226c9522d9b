//! # 配置管理模块
//!
//! 处理网关配置加载、环境变量覆盖和校验

mod app_config;
mod manager;

pub use app_config::{
    GatewayConfig, PathRewrite, RoutesConfig, ServerConfig, UpstreamConfig, WakeConfig,
};
pub use manager::{CONFIG_PATH_ENV, ConfigManager, ConfigSource, DEFAULT_CONFIG_PATH};
