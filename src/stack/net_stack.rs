//! 协议栈
//!
//! 持有传输层分发表、各传输层协议的兜底处理器以及统计信息。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, trace};

use super::demux::TransportDemuxer;
use super::handler::{TransportEndpoint, TransportProtocolHandler};
use super::stats::Stats;
use crate::config::StackConfig;
use crate::error::Error;
use crate::net::{
    NetworkProtocolNumber, NicId, Payload, Route, TransportEndpointId, TransportProtocolNumber,
};

/// 用户态协议栈
pub struct Stack {
    cfg: StackConfig,
    demux: TransportDemuxer,
    handlers: RwLock<HashMap<TransportProtocolNumber, Arc<dyn TransportProtocolHandler>>>,
    stats: Stats,
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("cfg", &self.cfg)
            .field("registrations", &self.demux.len())
            .finish_non_exhaustive()
    }
}

impl Stack {
    /// 创建协议栈
    pub fn new(cfg: StackConfig) -> Arc<Self> {
        info!(
            network_protocols = ?cfg.network_protocols,
            max_endpoints = cfg.max_endpoints,
            "🧱 创建协议栈"
        );
        let demux = TransportDemuxer::new(cfg.max_endpoints, 0);
        Arc::new(Self {
            cfg,
            demux,
            handlers: RwLock::new(HashMap::new()),
            stats: Stats::default(),
        })
    }

    pub fn config(&self) -> &StackConfig {
        &self.cfg
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// 分发表中的注册总数
    pub fn registered_endpoints(&self) -> usize {
        self.demux.len()
    }

    /// 把端点注册进分发表（插入或失败，原子操作）。
    #[tracing::instrument(skip_all, fields(nic = nic.0, %id))]
    pub fn register_transport_endpoint(
        &self,
        nic: NicId,
        net_protos: &[NetworkProtocolNumber],
        trans_proto: TransportProtocolNumber,
        id: TransportEndpointId,
        ep: Arc<dyn TransportEndpoint>,
        reuse_port: bool,
    ) -> Result<(), Error> {
        let Some(&first) = net_protos.first() else {
            return Err(Error::UnsupportedProtocol(NetworkProtocolNumber(0)));
        };
        if let Some(&bad) = net_protos.iter().find(|p| !self.cfg.supports(**p)) {
            debug!(net_proto = %bad, "网络层协议未启用");
            return Err(Error::UnsupportedProtocol(bad));
        }

        let res = self
            .demux
            .register(nic, net_protos, trans_proto, id, ep, reuse_port);
        match &res {
            Ok(()) => {
                self.stats.inc_endpoints_registered();
                trace!(net_proto = %first, "注册成功");
            }
            Err(Error::RegistrationConflict { .. }) => self.stats.inc_registration_conflicts(),
            Err(_) => {}
        }
        res
    }

    /// 注销端点；只会移除 `ep` 自己的注册。
    pub fn unregister_transport_endpoint(
        &self,
        nic: NicId,
        net_protos: &[NetworkProtocolNumber],
        trans_proto: TransportProtocolNumber,
        id: &TransportEndpointId,
        ep: &dyn TransportEndpoint,
    ) {
        let removed = self.demux.unregister(net_protos, trans_proto, id, ep);
        debug!(nic = nic.0, %id, removed, "注销端点");
    }

    pub fn find_transport_endpoint(
        &self,
        net_proto: NetworkProtocolNumber,
        trans_proto: TransportProtocolNumber,
        id: &TransportEndpointId,
    ) -> Option<Arc<dyn TransportEndpoint>> {
        self.demux.find(net_proto, trans_proto, id)
    }

    /// 已注册四元组所在的网卡
    pub fn registered_nic(
        &self,
        net_proto: NetworkProtocolNumber,
        trans_proto: TransportProtocolNumber,
        id: &TransportEndpointId,
    ) -> Option<NicId> {
        self.demux.nic_of(net_proto, trans_proto, id)
    }

    /// 设置某个传输层协议的兜底处理器（例如 UDP 转发器）。
    ///
    /// 处理器若持有本协议栈的 `Arc`，会形成引用环，需要用
    /// `remove_transport_protocol_handler` 解开。
    pub fn set_transport_protocol_handler(
        &self,
        proto: TransportProtocolNumber,
        handler: Arc<dyn TransportProtocolHandler>,
    ) {
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(proto, handler);
    }

    pub fn remove_transport_protocol_handler(
        &self,
        proto: TransportProtocolNumber,
    ) -> Option<Arc<dyn TransportProtocolHandler>> {
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&proto)
    }

    /// 把一个传输层数据报分发给匹配的端点或兜底处理器。
    ///
    /// 返回 `false` 表示既没有端点也没有处理器接管（端口不可达）。
    #[tracing::instrument(skip_all, fields(nic = route.nic_id().0, %id, bytes = payload.size()))]
    pub fn deliver_transport_packet(
        &self,
        route: &Route,
        trans_proto: TransportProtocolNumber,
        id: TransportEndpointId,
        payload: Payload,
    ) -> bool {
        // 查表和取处理器都只在锁内 clone 出 Arc，调用时不持锁，
        // 处理器内部才能再去注册端点。
        if let Some(ep) = self.demux.find(route.net_proto(), trans_proto, &id) {
            trace!("命中已注册端点");
            self.stats.inc_delivered_to_endpoint();
            ep.handle_packet(route, &id, payload);
            return true;
        }

        let handler = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&trans_proto)
            .cloned();
        if let Some(h) = handler {
            if h.handle_packet(route, id, payload) {
                trace!("已交给兜底处理器");
                self.stats.inc_forwarded_to_handler();
                return true;
            }
        }

        debug!("端口不可达");
        self.stats.inc_unknown_port_errors();
        false
    }
}
