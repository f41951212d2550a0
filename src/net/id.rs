//! 标识符类型
//!
//! 定义网卡与协议号等标识符。

use serde::{Deserialize, Serialize};

/// 网卡标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NicId(pub u32);

/// 网络层协议号（以太网类型）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkProtocolNumber(pub u32);

impl NetworkProtocolNumber {
    pub const IPV4: NetworkProtocolNumber = NetworkProtocolNumber(0x0800);
    pub const IPV6: NetworkProtocolNumber = NetworkProtocolNumber(0x86dd);
}

impl std::fmt::Display for NetworkProtocolNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::IPV4 => write!(f, "ipv4"),
            Self::IPV6 => write!(f, "ipv6"),
            Self(n) => write!(f, "{n:#06x}"),
        }
    }
}

/// 传输层协议号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportProtocolNumber(pub u32);

impl TransportProtocolNumber {
    pub const TCP: TransportProtocolNumber = TransportProtocolNumber(6);
    pub const UDP: TransportProtocolNumber = TransportProtocolNumber(17);
}
