//! 领域模型模块

pub mod group;
pub mod topology;

pub use group::{CommandResult, ContainerGroup, Role};
pub use topology::{ControllerKind, TopologyConfig};
