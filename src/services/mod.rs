//! 服务层模块
//!
//! 包含命令分发（Controller）与拓扑 setup 主流程

pub mod controller;
pub mod topology;

pub use controller::Controller;
