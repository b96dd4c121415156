//! 拓扑配置与执行上下文模型

use serde::Serialize;

/// Controller 的命令分发目标
///
/// `Master` 将命令转发到集群内 master 容器执行，
/// `Local` 在本机以子进程方式执行。
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum ControllerKind {
    #[default]
    Master,
    Local,
}

impl ControllerKind {
    pub fn from_str(s: &str) -> Self {
        match s {
            "master" => ControllerKind::Master,
            _ => ControllerKind::Local,
        }
    }
}

/// 渲染 test-config.yaml 所用的扁平配置
///
/// 地址列表按注册顺序排列，与各组 `ips()` 一一对应。
#[derive(Clone, Debug, Serialize)]
pub struct TopologyConfig {
    pub dns_forwarder: String,
    pub ssh_private_key: String,
    pub domain_name: String,
    pub master: Vec<String>,
    pub replicas: Vec<String>,
    pub clients: Vec<String>,
}
