//! # 路径改写表
//!
//! 把网关前缀之后的子路径映射到上游路径。映射是纯函数且对任意输入都有定义：
//! 命中显式改写规则时使用规则目标，否则挂到业务前缀下。

use std::collections::HashMap;

use super::upstream_url::UpstreamOrigin;
use crate::config::{PathRewrite, UpstreamConfig};

/// 健康检查子路径，总是映射到不带业务前缀的存活路径
pub const LIVENESS_SUBPATH: &str = "health";

/// 解析后的上游目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    /// 上游绝对路径
    pub path: String,
    /// 完整的上游 URL（含查询串）
    pub url: String,
    /// 是否命中显式改写规则
    pub rewritten: bool,
}

/// 路径改写表
#[derive(Debug, Clone)]
pub struct RouteTable {
    api_prefix: String,
    rewrites: HashMap<String, String>,
}

impl RouteTable {
    /// 从上游配置与改写规则构建
    #[must_use]
    pub fn new(upstream: &UpstreamConfig, rewrites: &[PathRewrite]) -> Self {
        let mut table: HashMap<String, String> = rewrites
            .iter()
            .map(|rule| (normalize_key(&rule.from), rule.to.clone()))
            .collect();
        // 存活路径不挂业务前缀，且不允许被配置覆盖
        table.insert(LIVENESS_SUBPATH.to_string(), upstream.liveness_path.clone());

        Self {
            api_prefix: upstream.api_prefix.trim_end_matches('/').to_string(),
            rewrites: table,
        }
    }

    /// 将入站子路径解析为上游路径
    #[must_use]
    pub fn resolve_path(&self, segments: &[String]) -> (String, bool) {
        let subpath = join_segments(segments);
        if let Some(target) = self.rewrites.get(&subpath) {
            return (target.clone(), true);
        }
        if subpath.is_empty() {
            (format!("{}/", self.api_prefix), false)
        } else {
            (format!("{}/{subpath}", self.api_prefix), false)
        }
    }

    /// 解析完整上游目标
    #[must_use]
    pub fn resolve(
        &self,
        origin: &UpstreamOrigin,
        segments: &[String],
        query: Option<&str>,
    ) -> UpstreamTarget {
        let (path, rewritten) = self.resolve_path(segments);
        let url = origin.join(&path, query);
        UpstreamTarget {
            path,
            url,
            rewritten,
        }
    }

    /// 存活路径
    #[must_use]
    pub fn liveness_path(&self) -> &str {
        self.rewrites
            .get(LIVENESS_SUBPATH)
            .map_or("/health", String::as_str)
    }
}

/// 将原始 URI 路径切分为段，丢弃空段与点段
///
/// 段本身保持未解码；`\` 与 `/` 同样视为分隔符（上游 URL 解析会这样处理）。
#[must_use]
pub fn split_subpath(raw: &str) -> Vec<String> {
    raw.split(['/', '\\'])
        .filter(|segment| keeps_segment(segment))
        .map(str::to_string)
        .collect()
}

/// 是否为点段，含百分号编码形式（`%2e%2e`、`.%2E` 等）
#[must_use]
pub fn is_dot_segment(segment: &str) -> bool {
    let decoded = urlencoding::decode_binary(segment.as_bytes());
    matches!(decoded.as_ref(), b"." | b"..")
}

fn keeps_segment(segment: &str) -> bool {
    !segment.is_empty() && !is_dot_segment(segment)
}

fn join_segments(segments: &[String]) -> String {
    segments
        .iter()
        .map(String::as_str)
        .filter(|segment| keeps_segment(segment))
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize_key(from: &str) -> String {
    join_segments(&split_subpath(from))
}
