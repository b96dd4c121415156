//! 统一错误处理
//!
//! 整个 setup 流程采用 fail-fast 策略：任何一步失败立即向上传播，
//! 不做重试，也不回滚已完成的步骤。

use thiserror::Error;

/// Setup 过程中的错误类型
#[derive(Debug, Error)]
pub enum SetupError {
    /// 容器内命令以非零状态退出
    #[error("command `{command}` exited with {code} in container: {stderr}")]
    RemoteExecution {
        code: i64,
        command: String,
        stderr: String,
    },

    /// 本机命令以非零状态退出
    #[error("local command `{command}` exited with {code}: {stderr}")]
    LocalExecution {
        code: i64,
        command: String,
        stderr: String,
    },

    /// 容器或网络 attachment 不存在
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// 必需的环境变量缺失
    #[error("missing required environment variable {0}")]
    Configuration(String),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("invalid inspect output: {0}")]
    Inspect(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SetupError {
    /// 创建 lookup 错误
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }
}

/// 便捷类型别名
pub type Result<T> = std::result::Result<T, SetupError>;
