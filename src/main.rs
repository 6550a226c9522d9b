//! # BFF Gateway 主程序
//!
//! 浏览器侧网关：同源转发到上游 API，并在上游冷启动时自动唤醒

use std::path::PathBuf;

use bff_gateway::{
    GatewayError, GatewayServer, Result,
    config::ConfigManager,
    lerror, linfo,
    logging::{self, LogComponent, LogStage},
};
use clap::Parser;

/// 命令行参数，优先级高于配置文件与环境变量
#[derive(Parser, Debug)]
#[command(name = "bff-gateway")]
#[command(version, about, long_about = None)]
struct Args {
    /// 配置文件路径（指定时必须存在）
    #[arg(short, long, env = "BFF_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// 监听主机
    #[arg(long)]
    host: Option<String>,

    /// 监听端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 上游基础地址
    #[arg(long)]
    upstream: Option<String>,

    /// 日志级别（trace, debug, info, warn, error）
    #[arg(long)]
    log_level: Option<String>,

    /// 只校验配置，不启动服务
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_optimized_logging(args.log_level.as_deref());

    let manager = ConfigManager::load_from(args.config.clone())?;
    linfo!(
        "system",
        LogStage::Configuration,
        LogComponent::Config,
        "config_loaded",
        "配置加载完成",
        source = ?manager.source()
    );

    let mut config = manager.into_config();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(upstream) = args.upstream {
        config.upstream.base_url = Some(upstream);
    }
    config.validate().map_err(GatewayError::config)?;

    if args.validate {
        linfo!(
            "system",
            LogStage::Configuration,
            LogComponent::Main,
            "config_valid",
            "配置校验通过"
        );
        return Ok(());
    }

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        "服务启动"
    );
    if let Err(e) = GatewayServer::new(config).serve().await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_start_failed",
            &format!("服务运行失败: {e:?}")
        );
        std::process::exit(1);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
    Ok(())
}
