//! # 上游健康与唤醒模块
//!
//! 负责探测上游存活状态，并在上游冷启动时按退避策略唤醒

pub mod checker;
pub mod types;
pub mod wake;

pub use checker::*;
pub use types::*;
pub use wake::*;
