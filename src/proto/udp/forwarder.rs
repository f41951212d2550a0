//! UDP 未匹配数据报转发器
//!
//! 协议栈找不到匹配端点时把数据报交给 `Forwarder`，由策略决定忽略，
//! 还是把这个数据报提升为一个新连接端点的第一条消息。

use std::sync::Arc;

use tracing::trace;

use super::endpoint::UdpEndpoint;
use super::policy::ForwarderPolicy;
use crate::error::Error;
use crate::net::{Payload, Route, TransportEndpointId, TransportProtocolNumber};
use crate::stack::{Stack, TransportEndpoint, TransportProtocolHandler};
use crate::waiter::WaitQueue;

/// 转发器：接管所有未匹配的 UDP 数据报并交给策略处理。
///
/// 自身没有可变状态，可以被多个分发路径并发调用。
pub struct Forwarder {
    stack: Arc<Stack>,
    policy: Box<dyn ForwarderPolicy>,
}

impl Forwarder {
    pub fn new(stack: Arc<Stack>, policy: impl ForwarderPolicy + 'static) -> Self {
        Self {
            stack,
            policy: Box::new(policy),
        }
    }

    /// 作为 UDP 的兜底处理器安装到协议栈上。
    pub fn install(self) -> Arc<Self> {
        let fwd = Arc::new(self);
        fwd.stack
            .set_transport_protocol_handler(TransportProtocolNumber::UDP, fwd.clone());
        fwd
    }

    /// 处理一个未匹配的数据报。总是返回 `true`。
    pub fn handle_packet(&self, route: &Route, id: TransportEndpointId, payload: Payload) -> bool {
        trace!(%id, nic = route.nic_id().0, "交给转发策略");
        self.policy.decide(ForwarderRequest {
            stack: &self.stack,
            route,
            id,
            payload,
        });
        true
    }
}

impl TransportProtocolHandler for Forwarder {
    fn handle_packet(&self, route: &Route, id: TransportEndpointId, payload: Payload) -> bool {
        Forwarder::handle_packet(self, route, id, payload)
    }
}

/// 一次转发请求，只在策略调用期间有效。
///
/// 路由是借用的，策略返回后即失效；创建出的端点持有自己的副本。
#[derive(Debug)]
pub struct ForwarderRequest<'a> {
    stack: &'a Arc<Stack>,
    route: &'a Route,
    id: TransportEndpointId,
    payload: Payload,
}

impl<'a> ForwarderRequest<'a> {
    /// 数据报的四元组
    pub fn id(&self) -> TransportEndpointId {
        self.id
    }

    pub fn route(&self) -> &'a Route {
        self.route
    }

    /// 触发本次请求的数据报
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// 为该数据报创建一个已连接的端点，并把数据报作为第一条消息投递进去。
    ///
    /// 注册失败时本地分配的端点直接关闭，不留下任何其它痕迹。
    /// 同一个请求第二次调用会因四元组已被占用而失败。
    /// 激活完成前端点已被别处关闭时返回 `ClosedForReceive`，分发表中不留注册。
    pub fn create_endpoint(&self, waiter: Arc<WaitQueue>) -> Result<Arc<UdpEndpoint>, Error> {
        let net_proto = self.route.net_proto();
        let ep = Arc::new(UdpEndpoint::new(Arc::clone(self.stack), net_proto, waiter));

        let registered = self.stack.register_transport_endpoint(
            self.route.nic_id(),
            &[net_proto],
            TransportProtocolNumber::UDP,
            self.id,
            Arc::clone(&ep) as Arc<dyn TransportEndpoint>,
            ep.reuse_port(),
        );
        if let Err(e) = registered {
            ep.close();
            return Err(e);
        }

        // 其它线程可能已经通过分发表拿到并关闭了这个端点
        if !ep.bind_registered(self.id, self.route.nic_id()) || !ep.activate(self.route) {
            return Err(Error::ClosedForReceive);
        }
        ep.handle_packet(self.route, &self.id, self.payload.clone());

        Ok(ep)
    }
}
