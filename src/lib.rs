//! dyndb-ldap-testenv - 集成测试容器拓扑初始化
//!
//! 为 dyndb-ldap 集成测试套件搭建多容器拓扑：一个 master、N 个
//! client、M 个 replica，统一 hostname / DNS / SSH 信任关系，
//! 最后渲染出供测试执行使用的 test-config.yaml。

pub mod error;
pub mod config;
pub mod infra;
pub mod domain;
pub mod services;

pub use error::{Result, SetupError};
