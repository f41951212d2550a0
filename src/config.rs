//! 协议栈配置
//!
//! 配置以 JSON 形式给出，所有字段都有默认值，缺省字段按默认值填充。

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::net::NetworkProtocolNumber;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config: {0}")]
    Json(#[from] serde_json::Error),
}

/// 协议栈配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    /// 启用的网络层协议；未列出的协议无法注册端点
    #[serde(default = "default_network_protocols")]
    pub network_protocols: Vec<NetworkProtocolNumber>,
    /// 分发表最多容纳的注册数
    #[serde(default = "default_max_endpoints")]
    pub max_endpoints: usize,
    #[serde(default)]
    pub udp: UdpConfig,
}

/// UDP 端点配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpConfig {
    /// 接收缓冲区上限（字节）
    #[serde(default = "default_receive_buffer_size")]
    pub receive_buffer_size: usize,
    /// 新端点是否允许与其它端点共享同一个四元组
    #[serde(default)]
    pub reuse_port: bool,
}

fn default_network_protocols() -> Vec<NetworkProtocolNumber> {
    vec![NetworkProtocolNumber::IPV4, NetworkProtocolNumber::IPV6]
}

fn default_max_endpoints() -> usize {
    65_536
}

fn default_receive_buffer_size() -> usize {
    32 * 1024
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            network_protocols: default_network_protocols(),
            max_endpoints: default_max_endpoints(),
            udp: UdpConfig::default(),
        }
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            receive_buffer_size: default_receive_buffer_size(),
            reuse_port: false,
        }
    }
}

impl StackConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn supports(&self, proto: NetworkProtocolNumber) -> bool {
        self.network_protocols.contains(&proto)
    }
}
