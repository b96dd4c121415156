//! setup-containers - 集成测试容器拓扑初始化入口
//!
//! 全部配置来自环境变量（见 `config::env`），没有命令行参数。
//! 成功退出 0；任何一步失败记录失败命令、退出码与 stderr 后以
//! 非零状态退出。

use tracing::error;
use tracing_subscriber::EnvFilter;

use dyndb_ldap_testenv::config::EnvConfig;
use dyndb_ldap_testenv::services::topology;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let code = rt.block_on(async {
        let config = match EnvConfig::from_env() {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "invalid configuration");
                return 1;
            }
        };

        match topology::run(&config).await {
            Ok(()) => 0,
            Err(e) => {
                error!(error = %e, "topology setup failed");
                1
            }
        }
    });
    std::process::exit(code);
}
