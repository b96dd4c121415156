//! 环境变量配置加载
//!
//! 除工作目录与环境名外全部有默认值。启动时一次性读取，
//! 之后不再访问环境。

use std::env;
use std::path::PathBuf;

use crate::domain::topology::ControllerKind;
use crate::error::{Result, SetupError};

/// 输出文件名，固定写入 `<working_dir>/<env_name>/` 下
pub const TEST_CONFIG_FILE: &str = "test-config.yaml";

/// 环境配置
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// 测试环境工作目录（必填）
    pub working_dir: String,
    /// 环境名（必填）
    pub env_name: String,
    /// 环境 id，同时作为容器名前缀和网络名前缀
    pub env_id: String,
    /// client 容器数量
    pub clients: usize,
    /// replica 容器数量
    pub replicas: usize,
    /// 测试域名
    pub domain: String,
    /// SSH 私钥路径
    pub ssh_priv_key: String,
    /// 外部 DNS forwarder
    pub dns_forwarder: String,
    /// docker 网络名（不含环境 id 前缀）
    pub network: String,
    /// 命令分发目标
    pub controller_type: ControllerKind,
    /// test-config 模板路径
    pub template_path: String,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        let working_dir = required("DYNDB_LDAP_TESTS_ENV_WORKING_DIR")?;
        let env_name = required("DYNDB_LDAP_TESTS_ENV_NAME")?;

        let env_id = env::var("DYNDB_LDAP_TESTS_ENV_ID").unwrap_or_else(|_| "1".to_string());

        let clients = env::var("DYNDB_LDAP_TESTS_CLIENTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let replicas = env::var("DYNDB_LDAP_TESTS_REPLICAS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let domain =
            env::var("DYNDB_LDAP_TESTS_DOMAIN").unwrap_or_else(|_| "ipa.test".to_string());

        let ssh_priv_key =
            env::var("DYNDB_LDAP_SSH_PRIV_KEY").unwrap_or_else(|_| "/root/.ssh/id_rsa".to_string());

        let dns_forwarder =
            env::var("DYNDB_LDAP_DNS_FORWARDER").unwrap_or_else(|_| "8.8.8.8".to_string());

        let network = env::var("DYNDB_LDAP_NETWORK").unwrap_or_else(|_| "ipanet".to_string());

        let controller_type = env::var("DYNDB_LDAP_CONTROLLER_TYPE")
            .map(|v| ControllerKind::from_str(&v))
            .unwrap_or_default();

        let template_path = env::var("DYNDB_LDAP_TEST_CONFIG_TEMPLATE")
            .unwrap_or_else(|_| "./templates/test-config-template.yaml".to_string());

        Ok(Self {
            working_dir,
            env_name,
            env_id,
            clients,
            replicas,
            domain,
            ssh_priv_key,
            dns_forwarder,
            network,
            controller_type,
            template_path,
        })
    }

    /// 环境目录：`<working_dir>/<env_name>`
    pub fn env_dir(&self) -> PathBuf {
        PathBuf::from(&self.working_dir).join(&self.env_name)
    }

    /// 输出文件完整路径
    pub fn test_config_path(&self) -> PathBuf {
        self.env_dir().join(TEST_CONFIG_FILE)
    }

    /// 完整 docker 网络名：`<env_id>_<network>`
    pub fn docker_network(&self) -> String {
        format!("{}_{}", self.env_id, self.network)
    }
}

fn required(name: &'static str) -> Result<String> {
    env::var(name).map_err(|_| SetupError::Configuration(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // 测试共用进程环境，串行化防止互相干扰
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for name in [
            "DYNDB_LDAP_TESTS_ENV_WORKING_DIR",
            "DYNDB_LDAP_TESTS_ENV_NAME",
            "DYNDB_LDAP_TESTS_ENV_ID",
            "DYNDB_LDAP_TESTS_CLIENTS",
            "DYNDB_LDAP_TESTS_REPLICAS",
            "DYNDB_LDAP_TESTS_DOMAIN",
            "DYNDB_LDAP_SSH_PRIV_KEY",
            "DYNDB_LDAP_DNS_FORWARDER",
            "DYNDB_LDAP_NETWORK",
            "DYNDB_LDAP_CONTROLLER_TYPE",
            "DYNDB_LDAP_TEST_CONFIG_TEMPLATE",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_defaults_apply_when_optional_vars_missing() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var("DYNDB_LDAP_TESTS_ENV_WORKING_DIR", "/tmp/work");
        env::set_var("DYNDB_LDAP_TESTS_ENV_NAME", "env-1");

        let config = EnvConfig::from_env().unwrap();
        assert_eq!(config.env_id, "1");
        assert_eq!(config.clients, 0);
        assert_eq!(config.replicas, 0);
        assert_eq!(config.domain, "ipa.test");
        assert_eq!(config.ssh_priv_key, "/root/.ssh/id_rsa");
        assert_eq!(config.dns_forwarder, "8.8.8.8");
        assert_eq!(config.network, "ipanet");
        assert_eq!(config.controller_type, ControllerKind::Master);
        assert_eq!(config.template_path, "./templates/test-config-template.yaml");
        assert_eq!(config.docker_network(), "1_ipanet");
        assert_eq!(
            config.test_config_path(),
            PathBuf::from("/tmp/work/env-1/test-config.yaml")
        );
        clear_all();
    }

    #[test]
    fn test_missing_working_dir_is_a_configuration_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var("DYNDB_LDAP_TESTS_ENV_NAME", "env-1");

        let err = EnvConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("DYNDB_LDAP_TESTS_ENV_WORKING_DIR"));
        clear_all();
    }

    #[test]
    fn test_counts_and_controller_type_are_parsed() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var("DYNDB_LDAP_TESTS_ENV_WORKING_DIR", "/tmp/work");
        env::set_var("DYNDB_LDAP_TESTS_ENV_NAME", "env-1");
        env::set_var("DYNDB_LDAP_TESTS_CLIENTS", "2");
        env::set_var("DYNDB_LDAP_TESTS_REPLICAS", "1");
        env::set_var("DYNDB_LDAP_CONTROLLER_TYPE", "local");

        let config = EnvConfig::from_env().unwrap();
        assert_eq!(config.clients, 2);
        assert_eq!(config.replicas, 1);
        assert_eq!(config.controller_type, ControllerKind::Local);
        clear_all();
    }
}
