//! 拓扑构建与 setup 主流程
//!
//! 流程是严格线性的：构建各组 -> 注册 -> setup_ssh -> setup_hosts
//! -> setup_hostname -> setup_resolvconf -> setup_container_overrides
//! -> 渲染 test-config -> 退出。任何一步失败立即终止后续步骤。

use std::sync::Arc;

use tracing::info;

use crate::config::EnvConfig;
use crate::domain::group::{ContainerGroup, Role};
use crate::domain::topology::TopologyConfig;
use crate::error::{Result, SetupError};
use crate::infra::docker::{ContainerRuntime, DockerCli};
use crate::services::controller::Controller;

/// 执行完整的 setup 流程
pub async fn run(config: &EnvConfig) -> Result<()> {
    run_with_runtime(config, Arc::new(DockerCli::new())).await
}

/// 与 [`run`] 相同，但允许注入容器运行时（测试用）
pub async fn run_with_runtime(
    config: &EnvConfig,
    runtime: Arc<dyn ContainerRuntime>,
) -> Result<()> {
    let master = ContainerGroup::new(
        Role::Master,
        1,
        config.env_id.clone(),
        config.domain.clone(),
        config.dns_forwarder.clone(),
        config.docker_network(),
        runtime.clone(),
    );

    // client/replica 的 DNS 指向 master。先确认 master 的网络
    // attachment 可解析再继续，避免悄悄捕获空地址。
    let master_ips = master.ips().await?.to_vec();
    let master_ip = master_ips
        .first()
        .cloned()
        .ok_or_else(|| SetupError::lookup("master group resolved no address"))?;
    info!(master_ip = %master_ip, "master resolved");

    let clients = ContainerGroup::new(
        Role::Client,
        config.clients,
        config.env_id.clone(),
        config.domain.clone(),
        master_ip.clone(),
        config.docker_network(),
        runtime.clone(),
    );
    let replicas = ContainerGroup::new(
        Role::Replica,
        config.replicas,
        config.env_id.clone(),
        config.domain.clone(),
        master_ip,
        config.docker_network(),
        runtime,
    );

    let client_ips = clients.ips().await?.to_vec();
    let replica_ips = replicas.ips().await?.to_vec();

    let mut controller = Controller::new(config.controller_type);
    controller.register(master);
    controller.register(clients);
    controller.register(replicas);

    controller.setup_ssh(&config.ssh_priv_key).await?;
    controller.setup_hosts().await?;
    controller.setup_hostname().await?;
    controller.setup_resolvconf().await?;
    controller.setup_container_overrides().await?;

    let topology = TopologyConfig {
        dns_forwarder: config.dns_forwarder.clone(),
        ssh_private_key: config.ssh_priv_key.clone(),
        domain_name: config.domain.clone(),
        master: master_ips,
        replicas: replica_ips,
        clients: client_ips,
    };
    controller
        .generate_test_config(&config.template_path, &config.test_config_path(), &topology)
        .await?;

    info!("topology setup complete");
    Ok(())
}
