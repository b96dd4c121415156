//! 本机命令执行
//!
//! Controller 在 `local` 模式下通过这里执行命令。

use tokio::process::Command;
use tracing::info;

use crate::domain::group::CommandResult;
use crate::error::{Result, SetupError};

/// 本机命令执行器
pub struct LocalRunner;

impl LocalRunner {
    /// 在本机执行命令并捕获 stdout，非零退出视为失败
    ///
    /// stdout 会去掉结尾空白并剥掉一层成对的引号。剥引号是沿袭
    /// 下来的兼容行为，下游消费方依赖这个形态，勿随意更改。
    pub async fn run(argv: &[&str]) -> Result<CommandResult> {
        let program = argv.first().ok_or_else(|| SetupError::LocalExecution {
            code: -1,
            command: String::new(),
            stderr: "empty command".to_string(),
        })?;

        info!(command = ?argv, "local run");
        let output = Command::new(program).args(&argv[1..]).output().await?;

        if !output.status.success() {
            return Err(SetupError::LocalExecution {
                code: output.status.code().unwrap_or(-1) as i64,
                command: argv.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let cleaned = strip_quote_layer(stdout.trim_end());
        Ok(CommandResult {
            exit_code: 0,
            stdout: if cleaned.is_empty() {
                None
            } else {
                Some(cleaned.as_bytes().to_vec())
            },
            stderr: None,
        })
    }
}

/// 剥掉一层成对的包围引号（单引号或双引号）
fn strip_quote_layer(s: &str) -> &str {
    for quote in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}
