//! # 转发上下文
//!
//! 单个入站请求在转发过程中的状态

use axum::http::Method;
use std::time::{Duration, Instant};

/// 单次请求的转发上下文
#[derive(Debug, Clone)]
pub struct ForwardingContext {
    /// 请求ID
    pub request_id: String,
    /// 开始时间
    pub start_time: Instant,
    /// 入站方法
    pub method: Method,
    /// 解析后的上游路径
    pub upstream_path: String,
    /// 已发往上游的次数（至多 2：首次 + 唤醒后的一次重试）
    pub attempt: u32,
}

impl ForwardingContext {
    /// 创建上下文
    #[must_use]
    pub fn new(request_id: impl Into<String>, method: Method, upstream_path: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            start_time: Instant::now(),
            method,
            upstream_path: upstream_path.into(),
            attempt: 0,
        }
    }

    /// 记录一次上游调用
    pub const fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// 是否已经是重试
    #[must_use]
    pub const fn is_retry(&self) -> bool {
        self.attempt > 1
    }

    /// 已耗时
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 已耗时（毫秒）
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
