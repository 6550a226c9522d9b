//! # 配置管理器
//!
//! 启动时一次性加载配置：配置文件 → 环境变量覆盖 → 校验。
//! 加载完成后的配置不可变，由调用方显式传递给各组件。

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::GatewayConfig;
use crate::config_error;
use crate::error::{GatewayError, Result};

/// 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "BFF_CONFIG_PATH";
/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/gateway.toml";

/// 环境变量 → 配置项 的映射；同一配置项出现多次时前者优先
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("BFF_UPSTREAM_URL", "upstream.base_url"),
    ("API_URL", "upstream.base_url"),
    ("BFF_HOST", "server.host"),
    ("BFF_PORT", "server.port"),
    ("BFF_WAKE_MAX_WAIT_MS", "wake.max_wait_ms"),
];

/// 配置来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// 从文件加载
    File(PathBuf),
    /// 使用内置默认值
    Defaults,
}

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: GatewayConfig,
    source: ConfigSource,
}

impl ConfigManager {
    /// 按环境变量约定加载配置
    ///
    /// `BFF_CONFIG_PATH` 指定的文件必须存在；未指定时默认文件可选
    pub fn load() -> Result<Self> {
        Self::load_from(env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
    }

    /// 从显式路径（必须存在）或默认位置加载，并应用环境变量覆盖
    pub fn load_from(explicit: Option<PathBuf>) -> Result<Self> {
        let (mut config, source) = match explicit {
            Some(path) => (Self::load_config_file(&path)?, ConfigSource::File(path)),
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    (Self::load_config_file(&path)?, ConfigSource::File(path))
                } else {
                    (GatewayConfig::default(), ConfigSource::Defaults)
                }
            }
        };

        let overrides = Self::build_env_overrides();
        Self::apply_env_overrides(&mut config, &overrides)?;
        config.validate().map_err(GatewayError::config)?;

        info!("配置加载完成: source={:?}, overrides={}", source, overrides.len());

        Ok(Self { config, source })
    }

    /// 从指定文件加载配置（不应用环境变量覆盖）
    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self> {
        let path = config_path.as_ref();
        let config = Self::load_config_file(path)?;
        config.validate().map_err(GatewayError::config)?;
        Ok(Self {
            config,
            source: ConfigSource::File(path.to_path_buf()),
        })
    }

    /// 获取当前配置
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// 配置来源
    #[must_use]
    pub const fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// 取出配置
    #[must_use]
    pub fn into_config(self) -> GatewayConfig {
        self.config
    }

    /// 加载配置文件
    fn load_config_file(path: &Path) -> Result<GatewayConfig> {
        if !path.exists() {
            return Err(GatewayError::config(format!("配置文件不存在: {}", path.display())));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
        })?;

        toml::from_str(&content).map_err(|e| {
            GatewayError::config_with_source(
                format!("TOML解析失败 - 配置文件: {}, 详细错误: {e}", path.display()),
                e,
            )
        })
    }

    /// 构建环境变量覆盖映射
    fn build_env_overrides() -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        for (var, path) in ENV_OVERRIDES {
            if let Ok(value) = env::var(var) {
                if !value.trim().is_empty() {
                    overrides.entry((*path).to_string()).or_insert(value);
                }
            }
        }
        debug!("发现 {} 个环境变量覆盖", overrides.len());
        overrides
    }

    /// 应用环境变量覆盖
    pub(crate) fn apply_env_overrides(
        config: &mut GatewayConfig,
        overrides: &HashMap<String, String>,
    ) -> Result<()> {
        for (path, value) in overrides {
            debug!("应用环境变量覆盖: {} = {}", path, value);
            Self::apply_override_to_config(config, path, value)?;
        }
        Ok(())
    }

    /// 将单个覆盖项写入配置
    fn apply_override_to_config(config: &mut GatewayConfig, path: &str, value: &str) -> Result<()> {
        match path {
            "upstream.base_url" => config.upstream.base_url = Some(value.trim().to_string()),
            "server.host" => config.server.host = value.to_string(),
            "server.port" => {
                config.server.port = value.parse().map_err(|e| {
                    GatewayError::config_with_source(format!("无效的端口号: {value}"), e)
                })?;
            }
            "wake.max_wait_ms" => {
                config.wake.max_wait_ms = value.parse().map_err(|e| {
                    GatewayError::config_with_source(format!("无效的唤醒预算: {value}"), e)
                })?;
            }
            other => return Err(config_error!("未知的配置覆盖项: {}", other)),
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for (var, _) in ENV_OVERRIDES {
            // SAFETY: 测试串行执行，不存在并发读写环境变量
            unsafe { env::remove_var(var) };
        }
        unsafe { env::remove_var(CONFIG_PATH_ENV) };
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = GatewayConfig::default();
        let overrides = HashMap::from([
            ("upstream.base_url".to_string(), " https://api.example.com ".to_string()),
            ("server.port".to_string(), "8088".to_string()),
        ]);

        ConfigManager::apply_env_overrides(&mut config, &overrides).unwrap();

        assert_eq!(config.upstream.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.server.port, 8088);
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = GatewayConfig::default();
        let overrides = HashMap::from([("server.port".to_string(), "eighty".to_string())]);
        let err = ConfigManager::apply_env_overrides(&mut config, &overrides).unwrap_err();
        assert!(matches!(err, GatewayError::Config { .. }));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [server]
            port = 4000

            [upstream]
            base_url = "http://127.0.0.1:9000"

            [[routes.rewrites]]
            from = "me"
            to = "/api/users/profile"
            "#
        )
        .unwrap();

        let manager = ConfigManager::from_file(file.path()).unwrap();
        assert_eq!(manager.config().server.port, 4000);
        assert_eq!(manager.config().routes.rewrites.len(), 1);
        assert_eq!(manager.source(), &ConfigSource::File(file.path().to_path_buf()));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ConfigManager::from_file("/nonexistent/gateway.toml").unwrap_err();
        assert!(err.to_string().contains("配置文件不存在"));
    }

    #[test]
    #[serial]
    fn test_load_prefers_dedicated_upstream_env() {
        clear_env();
        unsafe {
            env::set_var("API_URL", "https://fallback.example.com");
            env::set_var("BFF_UPSTREAM_URL", "https://primary.example.com");
        }

        let manager = ConfigManager::load().unwrap();
        assert_eq!(
            manager.config().upstream.base_url.as_deref(),
            Some("https://primary.example.com")
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_without_upstream_is_not_fatal() {
        clear_env();
        let manager = ConfigManager::load().unwrap();
        assert!(manager.config().upstream.base_url.is_none());
    }
}
