//! 容器组管理
//!
//! 一个 [`ContainerGroup`] 表示同一角色（master / client / replica）的
//! 一组同构容器。成员的名字、hostname、IP 构成固定的身份三元组，
//! 按下标对齐。组创建后数量不再变化。
//!
//! names / hostnames / ips 均为首次访问时计算、进程生命周期内缓存，
//! 不做失效处理：前提是容器的网络身份在单次运行期间不变。

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::error::{Result, SetupError};
use crate::infra::docker::ContainerRuntime;

/// 容器内无法工作的服务，统一声明为容器环境下跳过
const CONTAINER_INCOMPATIBLE_SERVICES: &[&str] = &["nis-domainname"];

/// 容器角色，决定命名规则和默认 DNS 来源
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Master,
    Client,
    Replica,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Client => "client",
            Role::Replica => "replica",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次容器内命令执行的结果
///
/// 每次执行产生一个，调用方立即消费，不做持久化。
#[derive(Clone, Debug)]
pub struct CommandResult {
    pub exit_code: i64,
    /// 捕获的 stdout，无输出时为 None
    pub stdout: Option<Vec<u8>>,
    pub stderr: Option<Vec<u8>>,
}

impl CommandResult {
    pub fn stdout_lossy(&self) -> String {
        self.stdout
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    pub fn stderr_lossy(&self) -> String {
        self.stderr
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }
}

/// 同构容器组
pub struct ContainerGroup {
    role: Role,
    num: usize,
    prefix: String,
    domain: String,
    dns: String,
    /// 完整的 docker 网络名（`<env_id>_<network>`）
    network: String,
    runtime: Arc<dyn ContainerRuntime>,
    names: OnceLock<Vec<String>>,
    hostnames: OnceLock<Vec<String>>,
    ips: OnceCell<Vec<String>>,
}

impl ContainerGroup {
    pub fn new(
        role: Role,
        num: usize,
        prefix: String,
        domain: String,
        dns: String,
        network: String,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        Self {
            role,
            num,
            prefix,
            domain,
            dns,
            network,
            runtime,
            names: OnceLock::new(),
            hostnames: OnceLock::new(),
            ips: OnceCell::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn num(&self) -> usize {
        self.num
    }

    /// 组内容器名：`{prefix}_{role}_{i}`，i 从 1 开始
    pub fn names(&self) -> &[String] {
        self.names.get_or_init(|| {
            (1..=self.num)
                .map(|i| format!("{}_{}_{}", self.prefix, self.role, i))
                .collect()
        })
    }

    /// 组内 hostname：`{role}{i}.{domain}`
    pub fn hostnames(&self) -> &[String] {
        self.hostnames.get_or_init(|| {
            (1..=self.num)
                .map(|i| format!("{}{}.{}", self.role, i, self.domain))
                .collect()
        })
    }

    /// 单个容器在组网络上的 IPv4 地址
    pub async fn ip(&self, name: &str) -> Result<String> {
        let networks = self.runtime.inspect_networks(name).await?;
        let attachment = networks.get(&self.network).ok_or_else(|| {
            SetupError::lookup(format!(
                "container '{}' has no attachment to network '{}'",
                name, self.network
            ))
        })?;
        if attachment.ip_address.is_empty() {
            return Err(SetupError::lookup(format!(
                "container '{}' has no IPv4 address on network '{}'",
                name, self.network
            )));
        }
        Ok(attachment.ip_address.clone())
    }

    /// 组内全部 IPv4 地址，与 `names()` 下标对齐
    pub async fn ips(&self) -> Result<&[String]> {
        let ips = self
            .ips
            .get_or_try_init(|| async {
                let mut out = Vec::with_capacity(self.num);
                for name in self.names() {
                    out.push(self.ip(name).await?);
                }
                Ok::<_, SetupError>(out)
            })
            .await?;
        Ok(ips.as_slice())
    }

    /// 在指定容器内执行命令
    ///
    /// 记录命令、输出与退出码；非零退出转为
    /// [`SetupError::RemoteExecution`]，这是组级操作唯一的错误传播途径。
    pub async fn execute(&self, name: &str, argv: &[&str]) -> Result<CommandResult> {
        info!(container = %name, command = ?argv, "run");
        let result = self.runtime.exec(name, argv).await?;
        if let Some(stdout) = &result.stdout {
            info!(container = %name, "{}", String::from_utf8_lossy(stdout));
        }
        info!(container = %name, exit_code = result.exit_code, "result");

        if result.exit_code != 0 {
            let stderr = result.stderr_lossy();
            error!(container = %name, stderr = %stderr, "command failed");
            return Err(SetupError::RemoteExecution {
                code: result.exit_code,
                command: argv.join(" "),
                stderr,
            });
        }
        Ok(result)
    }

    /// 按 `names()` 顺序在每个成员内执行命令
    ///
    /// 第一个失败即中断并传播，不继续后续成员。已执行成员的改动
    /// 不回滚。
    pub async fn execute_all(&self, argv: &[&str]) -> Result<Vec<CommandResult>> {
        let mut results = Vec::with_capacity(self.num);
        for name in self.names() {
            results.push(self.execute(name, argv).await?);
        }
        Ok(results)
    }

    /// 解除 docker 对路径的 bind mount 并去掉执行权限
    ///
    /// /etc/hosts、/etc/hostname、/etc/resolv.conf 默认由 docker
    /// bind mount，必须先 umount 才能原地覆写。
    pub async fn umount_docker_resource(&self, path: &str) -> Result<()> {
        self.execute_all(&["/bin/umount", path]).await?;
        self.execute_all(&["/bin/chmod", "a-x", path]).await?;
        Ok(())
    }

    /// 向组内每个容器追加 ssh 公钥
    ///
    /// 重复调用会追加重复条目，一次性工具可以接受。
    pub async fn add_ssh_pubkey(&self, key: &str) -> Result<()> {
        let home_ssh_dir = "/root/.ssh";
        let auth_keys = "/root/.ssh/authorized_keys";
        let script = format!(
            "mkdir {dir} ; chmod 0700 {dir} && touch {keys} && chmod 0600 {keys} && echo {key} >> {keys}",
            dir = home_ssh_dir,
            keys = auth_keys,
            key = key,
        );
        self.execute_all(&["/bin/bash", "-c", &script]).await?;
        Ok(())
    }

    /// 覆写组内每个容器的 /etc/hosts
    ///
    /// 这一层每个成员只写入自己的条目；跨组条目由 Controller 层追加。
    pub async fn setup_hosts(&self) -> Result<()> {
        self.umount_docker_resource("/etc/hosts").await?;
        let ips = self.ips().await?.to_vec();
        for ((name, ip), hostname) in self.names().iter().zip(ips.iter()).zip(self.hostnames()) {
            let script = format!("echo -e '{}' > /etc/hosts", member_hosts_file(ip, hostname));
            self.execute(name, &["/bin/bash", "-c", &script]).await?;
        }
        Ok(())
    }

    /// 覆写 /etc/hostname 并让运行中的系统立即生效
    pub async fn setup_hostname(&self) -> Result<()> {
        self.umount_docker_resource("/etc/hostname").await?;
        for (name, hostname) in self.names().iter().zip(self.hostnames()) {
            let script = format!("echo -e '{}' > /etc/hostname", hostname);
            self.execute(name, &["/bin/bash", "-c", &script]).await?;
            self.execute(name, &["hostnamectl", "set-hostname", hostname.as_str()])
                .await?;
        }
        Ok(())
    }

    /// 覆写组内每个容器的 /etc/resolv.conf，指向组配置的 DNS
    pub async fn setup_resolvconf(&self) -> Result<()> {
        self.umount_docker_resource("/etc/resolv.conf").await?;
        let script = format!("echo nameserver {} > /etc/resolv.conf", self.dns);
        self.execute_all(&["/bin/bash", "-c", &script]).await?;
        Ok(())
    }

    /// 写 systemd override，让服务在容器虚拟化环境下不启动
    pub async fn ignore_service_in_container(&self, service: &str) -> Result<()> {
        let service_dir = format!("/etc/systemd/system/{}.service.d", service);
        let override_file = format!("{}/ipa-override.conf", service_dir);
        let script = format!(
            "mkdir -p {dir};echo '[Unit]' > {file};echo 'ConditionVirtualization=!container' >> {file}",
            dir = service_dir,
            file = override_file,
        );
        self.execute_all(&["/bin/bash", "-c", &script]).await?;
        Ok(())
    }

    /// 屏蔽已知与容器不兼容的服务并 reload systemd
    pub async fn setup_container_overrides(&self) -> Result<()> {
        for service in CONTAINER_INCOMPATIBLE_SERVICES {
            self.ignore_service_in_container(service).await?;
        }
        self.execute_all(&["systemctl", "daemon-reload"]).await?;
        Ok(())
    }
}

/// 成员自己的 hosts 文件内容：localhost v4/v6 加本机条目，共三行
pub(crate) fn member_hosts_file(ip: &str, hostname: &str) -> String {
    format!("127.0.0.1 localhost\n::1 localhost\n{} {}", ip, hostname)
}
