//! # 浏览器侧网关
//!
//! axum 入口：路由、处理器、共享状态与服务器生命周期

pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use routes::create_router;
pub use server::GatewayServer;
pub use state::{AppState, Backend, ReadyBackend};
