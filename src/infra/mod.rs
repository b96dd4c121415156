//! 基础设施模块
//!
//! 封装外部协作方（docker CLI、本机子进程、模板引擎）

pub mod command;
pub mod docker;
pub mod template;

pub use command::LocalRunner;
pub use docker::{ContainerRuntime, DockerCli};
