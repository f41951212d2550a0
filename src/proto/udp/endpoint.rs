//! UDP 端点
//!
//! 端点生命周期：`Initial`（已分配未注册）→ `Registered`（分发表中可见，四元组已绑定）
//! → `Connected`（路由、端口、网卡已就绪，可以接收）→ `Closed`。
//!
//! 绑定信息与接收队列分别由两把锁保护。接收就绪标志只会在绑定锁内的
//! 全部字段写完之后才在接收锁内置位，因此任何观察者看到"就绪"时，
//! 四元组和路由一定已经设置好。

use std::any::Any;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::error::Error;
use crate::net::{
    FullAddress, NetworkProtocolNumber, NicId, Payload, Route, TransportEndpointId,
    TransportProtocolNumber,
};
use crate::stack::{Stack, TransportEndpoint};
use crate::waiter::{EventMask, WaitQueue};

/// 端点状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Initial,
    Registered,
    Connected,
    Closed,
}

#[derive(Debug)]
struct Binding {
    state: EndpointState,
    id: Option<TransportEndpointId>,
    route: Option<Route>,
    dst_port: u16,
    reg_nic_id: NicId,
}

#[derive(Debug)]
struct Datagram {
    bytes: Vec<u8>,
    sender: FullAddress,
}

#[derive(Debug)]
struct ReceiveQueue {
    ready: bool,
    closed: bool,
    buffered: usize,
    limit: usize,
    queue: VecDeque<Datagram>,
}

/// 一个 UDP 端点
#[derive(Debug)]
pub struct UdpEndpoint {
    stack: Arc<Stack>,
    net_proto: NetworkProtocolNumber,
    reuse_port: bool,
    waiter: Arc<WaitQueue>,
    bind: Mutex<Binding>,
    rcv: Mutex<ReceiveQueue>,
}

impl UdpEndpoint {
    /// 分配一个未绑定的端点
    pub fn new(stack: Arc<Stack>, net_proto: NetworkProtocolNumber, waiter: Arc<WaitQueue>) -> Self {
        let udp = &stack.config().udp;
        let reuse_port = udp.reuse_port;
        let limit = udp.receive_buffer_size;
        stack.stats().inc_endpoints_allocated();
        Self {
            net_proto,
            reuse_port,
            waiter,
            bind: Mutex::new(Binding {
                state: EndpointState::Initial,
                id: None,
                route: None,
                dst_port: 0,
                reg_nic_id: NicId::default(),
            }),
            rcv: Mutex::new(ReceiveQueue {
                ready: false,
                closed: false,
                buffered: 0,
                limit,
                queue: VecDeque::new(),
            }),
            stack,
        }
    }

    /// 注册成功后立即绑定四元组。
    ///
    /// 若端点在注册之后、绑定之前已被关闭（此时 `close` 看到的是 `Initial`，
    /// 不会去注销），在这里补做注销并返回 `false`。
    pub(crate) fn bind_registered(&self, id: TransportEndpointId, nic: NicId) -> bool {
        {
            let mut b = self.binding();
            if b.state != EndpointState::Closed {
                b.id = Some(id);
                b.reg_nic_id = nic;
                b.state = EndpointState::Registered;
                return true;
            }
        }

        debug!(%id, "端点在绑定前已关闭，撤销注册");
        self.stack.unregister_transport_endpoint(
            nic,
            &[self.net_proto],
            TransportProtocolNumber::UDP,
            &id,
            self,
        );
        false
    }

    /// 激活：先在绑定锁内写完路由、端口与网卡，再在接收锁内置就绪。
    ///
    /// 端点已关闭时什么都不做，返回 `false`。
    pub(crate) fn activate(&self, route: &Route) -> bool {
        let id = {
            let mut b = self.binding();
            if b.state == EndpointState::Closed {
                return false;
            }
            b.route = Some(route.clone());
            b.dst_port = b.id.map_or(0, |id| id.remote_port);
            b.reg_nic_id = route.nic_id();
            b.state = EndpointState::Connected;
            b.id
        };

        {
            let mut rcv = self.receive_queue();
            if rcv.closed {
                return false;
            }
            rcv.ready = true;
        }
        debug!(id = ?id, nic = route.nic_id().0, "🔗 端点已激活");
        true
    }

    /// 取出一个数据报及其发送方地址
    pub fn read(&self) -> Result<(Vec<u8>, FullAddress), Error> {
        let mut rcv = self.receive_queue();
        match rcv.queue.pop_front() {
            Some(d) => {
                rcv.buffered = rcv.buffered.saturating_sub(d.bytes.len());
                Ok((d.bytes, d.sender))
            }
            None if rcv.closed => Err(Error::ClosedForReceive),
            None => Err(Error::WouldBlock),
        }
    }

    /// 返回 `mask` 中当前已就绪的事件
    pub fn readiness(&self, mask: EventMask) -> EventMask {
        let mut result = EventMask::OUT;
        {
            let rcv = self.receive_queue();
            if !rcv.queue.is_empty() || rcv.closed {
                result |= EventMask::IN;
            }
            if rcv.closed {
                result |= EventMask::HUP;
            }
        }
        result & mask
    }

    /// 关闭端点。重复调用无副作用。
    pub fn close(&self) {
        let registered = {
            let mut b = self.binding();
            let prev = std::mem::replace(&mut b.state, EndpointState::Closed);
            match prev {
                EndpointState::Closed => return,
                EndpointState::Initial => None,
                EndpointState::Registered | EndpointState::Connected => {
                    b.id.map(|id| (id, b.reg_nic_id))
                }
            }
        };

        if let Some((id, nic)) = registered {
            self.stack.unregister_transport_endpoint(
                nic,
                &[self.net_proto],
                TransportProtocolNumber::UDP,
                &id,
                self,
            );
        }

        {
            let mut rcv = self.receive_queue();
            rcv.ready = false;
            rcv.closed = true;
            rcv.queue.clear();
            rcv.buffered = 0;
        }

        self.stack.stats().inc_endpoints_released();
        self.waiter.notify(EventMask::HUP | EventMask::IN);
        debug!("端点已关闭");
    }

    pub fn id(&self) -> Option<TransportEndpointId> {
        self.binding().id
    }

    /// 端点自己持有的路由副本
    pub fn route(&self) -> Option<Route> {
        self.binding().route.clone()
    }

    pub fn state(&self) -> EndpointState {
        self.binding().state
    }

    pub fn dst_port(&self) -> u16 {
        self.binding().dst_port
    }

    /// 注册时所用的网卡
    pub fn nic_id(&self) -> NicId {
        self.binding().reg_nic_id
    }

    pub fn net_proto(&self) -> NetworkProtocolNumber {
        self.net_proto
    }

    pub fn reuse_port(&self) -> bool {
        self.reuse_port
    }

    pub fn is_receive_ready(&self) -> bool {
        self.receive_queue().ready
    }

    pub fn wait_queue(&self) -> &Arc<WaitQueue> {
        &self.waiter
    }

    fn binding(&self) -> MutexGuard<'_, Binding> {
        self.bind.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn receive_queue(&self) -> MutexGuard<'_, ReceiveQueue> {
        self.rcv.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TransportEndpoint for UdpEndpoint {
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[tracing::instrument(skip_all, fields(%id, bytes = payload.size()))]
    fn handle_packet(&self, route: &Route, id: &TransportEndpointId, payload: Payload) {
        let stats = self.stack.stats();
        let was_empty = {
            let mut rcv = self.receive_queue();
            if !rcv.ready || rcv.closed {
                trace!(ready = rcv.ready, closed = rcv.closed, "端点未就绪，丢弃");
                stats.inc_receive_dropped();
                return;
            }
            // 队列为空时总是接收，上限再小也不会丢掉第一条消息
            if !rcv.queue.is_empty() && rcv.buffered >= rcv.limit {
                trace!(buffered = rcv.buffered, limit = rcv.limit, "接收缓冲区已满，丢弃");
                stats.inc_receive_dropped();
                return;
            }

            let bytes = payload.to_vec();
            let was_empty = rcv.queue.is_empty();
            rcv.buffered += bytes.len();
            rcv.queue.push_back(Datagram {
                bytes,
                sender: FullAddress {
                    nic: Some(route.nic_id()),
                    ..id.remote()
                },
            });
            was_empty
        };

        stats.inc_received_datagrams();
        if was_empty {
            self.waiter.notify(EventMask::IN);
        }
    }
}
