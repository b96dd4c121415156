//! Docker CLI 封装
//!
//! 通过 `docker inspect` / `docker exec` 与容器运行时交互。
//! 容器的创建、启动、销毁不在本工具范围内，由外部 pipeline 负责。

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::error;

use crate::domain::group::CommandResult;
use crate::error::{Result, SetupError};

/// 单个网络 attachment（`NetworkSettings.Networks` 的值）
#[derive(Clone, Debug, Deserialize)]
pub struct NetworkAttachment {
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
}

/// 容器运行时的窄接口：查网络、执行命令
///
/// 用 trait 抽象是为了在测试中替换成录制桩；生产路径只有
/// [`DockerCli`] 一个实现。
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// 返回容器的全部网络 attachment（network name -> attachment）
    async fn inspect_networks(&self, name: &str) -> Result<HashMap<String, NetworkAttachment>>;

    /// 在容器内执行命令，stdout/stderr 分离捕获
    ///
    /// 非零退出不在此层报错，由调用方决定如何处理。
    async fn exec(&self, name: &str, argv: &[&str]) -> Result<CommandResult>;
}

/// 基于 docker CLI 的运行时实现
#[derive(Debug, Default)]
pub struct DockerCli;

impl DockerCli {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn inspect_networks(&self, name: &str) -> Result<HashMap<String, NetworkAttachment>> {
        let output = Command::new("docker")
            .args([
                "inspect",
                "--format",
                "{{json .NetworkSettings.Networks}}",
                name,
            ])
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("No such") {
                return Err(SetupError::lookup(format!("container '{}' not found", name)));
            }
            error!(container = %name, stderr = %stderr, "docker inspect failed");
            return Err(SetupError::lookup(format!(
                "docker inspect failed for '{}': {}",
                name,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(serde_json::from_str(stdout.trim())?)
    }

    async fn exec(&self, name: &str, argv: &[&str]) -> Result<CommandResult> {
        let output = Command::new("docker")
            .arg("exec")
            .arg(name)
            .args(argv)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("No such container") {
                return Err(SetupError::lookup(format!("container '{}' not found", name)));
            }
        }

        Ok(CommandResult {
            exit_code: output.status.code().unwrap_or(-1) as i64,
            stdout: none_if_empty(output.stdout),
            stderr: none_if_empty(output.stderr),
        })
    }
}

fn none_if_empty(bytes: Vec<u8>) -> Option<Vec<u8>> {
    if bytes.is_empty() {
        None
    } else {
        Some(bytes)
    }
}
