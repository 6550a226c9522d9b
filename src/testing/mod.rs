//! # 测试框架模块
//!
//! 提供单元测试使用的脚本化探测器与配置 fixtures

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
