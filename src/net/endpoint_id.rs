//! 流标识

use std::fmt;
use std::net::IpAddr;

use super::id::NicId;

/// 标识一条传输层流的四元组。
///
/// 对入方向的数据报，本端是数据报的目的地址，对端是它的源地址。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportEndpointId {
    pub local_address: IpAddr,
    pub local_port: u16,
    pub remote_address: IpAddr,
    pub remote_port: u16,
}

impl TransportEndpointId {
    /// 由 `src` 发往 `dst` 的数据报对应的四元组
    pub fn inbound(src: (IpAddr, u16), dst: (IpAddr, u16)) -> Self {
        Self {
            local_address: dst.0,
            local_port: dst.1,
            remote_address: src.0,
            remote_port: src.1,
        }
    }

    pub fn remote(&self) -> FullAddress {
        FullAddress {
            nic: None,
            addr: self.remote_address,
            port: self.remote_port,
        }
    }
}

impl fmt::Display for TransportEndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} <- {}:{}",
            self.local_address, self.local_port, self.remote_address, self.remote_port
        )
    }
}

/// 读取数据报时报告的对端地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FullAddress {
    pub nic: Option<NicId>,
    pub addr: IpAddr,
    pub port: u16,
}
