//! Controller：命令分发与跨组编排
//!
//! Controller 把"在执行上下文上运行命令"抽象成一个入口：`master`
//! 模式转发到集群内 master 容器，`local` 模式在本机起子进程。
//! 上层的 setup 步骤因此只写一遍，在集群内外都能运行。

use std::path::Path;

use tokio::sync::OnceCell;
use tracing::info;

use crate::domain::group::{CommandResult, ContainerGroup, Role};
use crate::domain::topology::{ControllerKind, TopologyConfig};
use crate::error::{Result, SetupError};
use crate::infra::command::LocalRunner;
use crate::infra::template;

/// 容器组的管理者，驱动整个 setup 序列
pub struct Controller {
    kind: ControllerKind,
    /// 注册顺序即 setup 顺序
    groups: Vec<ContainerGroup>,
    /// master 组下标，首次分发时解析，之后复用
    master: OnceCell<usize>,
}

impl Controller {
    pub fn new(kind: ControllerKind) -> Self {
        Self {
            kind,
            groups: Vec::new(),
            master: OnceCell::new(),
        }
    }

    /// 注册一个容器组
    pub fn register(&mut self, group: ContainerGroup) {
        self.groups.push(group);
    }

    /// 解析并缓存 master 组
    ///
    /// `master` 模式要求恰好注册了一个至少一名成员的 master 组，
    /// 否则分发失败。
    async fn master_group(&self) -> Result<&ContainerGroup> {
        let idx = self
            .master
            .get_or_try_init(|| async {
                self.groups
                    .iter()
                    .position(|g| g.role() == Role::Master && g.num() >= 1)
                    .ok_or_else(|| {
                        SetupError::lookup("no master group with at least one member registered")
                    })
            })
            .await?;
        Ok(&self.groups[*idx])
    }

    /// 在执行上下文上运行命令
    pub async fn execute(&self, argv: &[&str]) -> Result<CommandResult> {
        match self.kind {
            ControllerKind::Master => {
                let master = self.master_group().await?;
                let name = master.names()[0].as_str();
                master.execute(name, argv).await
            }
            ControllerKind::Local => LocalRunner::run(argv).await,
        }
    }

    /// 生成 ssh 密钥对并把公钥分发到所有组
    ///
    /// 密钥在执行上下文上生成（RSA、PEM、无口令），旧密钥先删除。
    /// 这是后续测试套件做免密 SSH 的前提。
    pub async fn setup_ssh(&self, priv_key: &str) -> Result<()> {
        self.execute(&["rm", "-f", priv_key]).await?;

        self.execute(&[
            "ssh-keygen", "-q", "-f", priv_key, "-t", "rsa", "-m", "PEM", "-N", "",
        ])
        .await?;

        let cat = format!("cat {}.pub", priv_key);
        let result = self.execute(&["/bin/bash", "-c", &cat]).await?;
        let key = result.stdout_lossy();
        let key = key.trim_end();

        for group in &self.groups {
            group.add_ssh_pubkey(key).await?;
        }
        Ok(())
    }

    /// 覆写各组 hosts，并把全量条目追加到执行上下文的 /etc/hosts
    ///
    /// 每个容器只认识自己；只有分发目标（本机或 master）拿到跨组的
    /// 完整解析表。
    pub async fn setup_hosts(&self) -> Result<()> {
        let mut hosts = Vec::new();
        for group in &self.groups {
            group.setup_hosts().await?;
            for (ip, hostname) in group.ips().await?.iter().zip(group.hostnames()) {
                hosts.push(format!("{} {}", ip, hostname));
            }
        }

        let script = format!("echo -e '{}' >> /etc/hosts", hosts.join("\n"));
        self.execute(&["/bin/bash", "-c", &script]).await?;
        Ok(())
    }

    /// 逐组覆写 hostname
    pub async fn setup_hostname(&self) -> Result<()> {
        for group in &self.groups {
            group.setup_hostname().await?;
        }
        Ok(())
    }

    /// 逐组覆写 resolv.conf
    pub async fn setup_resolvconf(&self) -> Result<()> {
        for group in &self.groups {
            group.setup_resolvconf().await?;
        }
        Ok(())
    }

    /// 逐组屏蔽容器内不兼容的服务
    pub async fn setup_container_overrides(&self) -> Result<()> {
        for group in &self.groups {
            group.setup_container_overrides().await?;
        }
        Ok(())
    }

    /// 渲染并写出 test-config
    ///
    /// 同一份配置渲染两次：一次打到 stdout 便于排查，一次写入输出
    /// 文件，两次输出字节一致。
    pub async fn generate_test_config(
        &self,
        template_path: &str,
        output_path: &Path,
        config: &TopologyConfig,
    ) -> Result<()> {
        let template = tokio::fs::read_to_string(template_path).await?;

        println!("{}", template::render(&template, config)?);

        tokio::fs::write(output_path, template::render(&template, config)?).await?;
        info!(path = %output_path.display(), "test config written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::docker::mock::RecordingRuntime;
    use std::sync::Arc;

    fn group(runtime: Arc<RecordingRuntime>, role: Role, num: usize) -> ContainerGroup {
        ContainerGroup::new(
            role,
            num,
            "1".to_string(),
            "ipa.test".to_string(),
            "8.8.8.8".to_string(),
            "1_ipanet".to_string(),
            runtime,
        )
    }

    fn runtime_for(role: Role, num: usize, base: u8) -> RecordingRuntime {
        let mut runtime = RecordingRuntime::new();
        for i in 0..num {
            runtime = runtime.with_network(
                &format!("1_{}_{}", role, i + 1),
                "1_ipanet",
                &format!("172.21.0.{}", base + i as u8),
            );
        }
        runtime
    }

    #[tokio::test]
    async fn test_local_dispatch_never_touches_the_runtime() {
        let runtime = Arc::new(RecordingRuntime::new());
        let mut controller = Controller::new(ControllerKind::Local);
        controller.register(group(runtime.clone(), Role::Master, 1));

        let result = controller.execute(&["echo", "hello"]).await.unwrap();
        assert_eq!(result.stdout, Some(b"hello".to_vec()));
        assert_eq!(runtime.exec_count(), 0);
    }

    #[tokio::test]
    async fn test_master_dispatch_forwards_to_first_master_member() {
        let runtime = Arc::new(RecordingRuntime::new());
        let mut controller = Controller::new(ControllerKind::Master);
        controller.register(group(runtime.clone(), Role::Client, 2));
        controller.register(group(runtime.clone(), Role::Master, 1));

        controller.execute(&["true"]).await.unwrap();
        controller.execute(&["true"]).await.unwrap();

        let log = runtime.exec_log();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|(name, _)| name == "1_master_1"));
        // master 只解析一次，之后走缓存
        assert_eq!(controller.master.get(), Some(&1));
    }

    #[tokio::test]
    async fn test_master_dispatch_fails_without_master_group() {
        let runtime = Arc::new(RecordingRuntime::new());
        let mut controller = Controller::new(ControllerKind::Master);
        controller.register(group(runtime.clone(), Role::Client, 2));
        // 空 master 组也不行
        controller.register(group(runtime, Role::Master, 0));

        let err = controller.execute(&["true"]).await.unwrap_err();
        assert!(err.to_string().contains("no master group"));
    }

    #[tokio::test]
    async fn test_setup_hosts_appends_one_line_per_member() {
        let runtime = Arc::new(
            runtime_for(Role::Master, 1, 2)
                .with_network("1_client_1", "1_ipanet", "172.21.0.3")
                .with_network("1_client_2", "1_ipanet", "172.21.0.4"),
        );
        let mut controller = Controller::new(ControllerKind::Master);
        controller.register(group(runtime.clone(), Role::Master, 1));
        controller.register(group(runtime.clone(), Role::Client, 2));

        controller.setup_hosts().await.unwrap();

        // 最后一条命令是发往分发目标的全量追加
        let log = runtime.exec_log();
        let (target, append) = log.last().unwrap();
        assert_eq!(target, "1_master_1");
        assert!(append.contains(">> /etc/hosts"));
        assert!(append.contains("172.21.0.2 master1.ipa.test"));
        assert!(append.contains("172.21.0.3 client1.ipa.test"));
        assert!(append.contains("172.21.0.4 client2.ipa.test"));
        // master + 2 client，共三行
        let appended = append
            .trim_start_matches("/bin/bash -c echo -e '")
            .split(" >> ")
            .next()
            .unwrap();
        assert_eq!(appended.matches("ipa.test").count(), 3);
    }

    #[tokio::test]
    async fn test_setup_ssh_broadcasts_public_key_to_all_groups() {
        let runtime = Arc::new(
            RecordingRuntime::new().with_stdout(b"ssh-rsa AAAAB3Nza test-key\n"),
        );
        let mut controller = Controller::new(ControllerKind::Master);
        controller.register(group(runtime.clone(), Role::Master, 1));
        controller.register(group(runtime.clone(), Role::Client, 2));

        controller.setup_ssh("/root/.ssh/id_rsa").await.unwrap();

        let log = runtime.exec_log();
        // rm + keygen + cat，然后广播到 3 个容器
        assert_eq!(log.len(), 6);
        assert!(log[0].1.starts_with("rm -f /root/.ssh/id_rsa"));
        assert!(log[1].1.contains("ssh-keygen"));
        assert!(log[2].1.contains("cat /root/.ssh/id_rsa.pub"));
        for (_, cmd) in &log[3..] {
            assert!(cmd.contains("ssh-rsa AAAAB3Nza test-key"));
            assert!(cmd.contains(">> /root/.ssh/authorized_keys"));
        }
        let broadcast: Vec<&str> = log[3..].iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(broadcast, &["1_master_1", "1_client_1", "1_client_2"]);
    }
}
