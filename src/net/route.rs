//! 路由描述
//!
//! 路由解析本身不在此 crate 中实现，这里只保存一次解析的结果。

use std::net::IpAddr;

use super::id::{NetworkProtocolNumber, NicId};

/// 一条有方向的网络路径：出口网卡、本端/对端地址与网络层协议。
///
/// 请求里的路由只是借用；需要长期持有时必须 `clone()` 一份。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    nic_id: NicId,
    net_proto: NetworkProtocolNumber,
    local_address: IpAddr,
    remote_address: IpAddr,
}

impl Route {
    pub fn new(
        nic_id: NicId,
        net_proto: NetworkProtocolNumber,
        local_address: IpAddr,
        remote_address: IpAddr,
    ) -> Self {
        Self {
            nic_id,
            net_proto,
            local_address,
            remote_address,
        }
    }

    /// 按地址族推断网络层协议
    pub fn for_addresses(nic_id: NicId, local_address: IpAddr, remote_address: IpAddr) -> Self {
        let net_proto = match local_address {
            IpAddr::V4(_) => NetworkProtocolNumber::IPV4,
            IpAddr::V6(_) => NetworkProtocolNumber::IPV6,
        };
        Self::new(nic_id, net_proto, local_address, remote_address)
    }

    pub fn nic_id(&self) -> NicId {
        self.nic_id
    }

    pub fn net_proto(&self) -> NetworkProtocolNumber {
        self.net_proto
    }

    pub fn local_address(&self) -> IpAddr {
        self.local_address
    }

    pub fn remote_address(&self) -> IpAddr {
        self.remote_address
    }
}
