//! 分发表与协议处理器之间的接口。

use std::any::Any;
use std::fmt;

use crate::net::{Payload, Route, TransportEndpointId};

/// 可以注册进分发表的传输层端点
pub trait TransportEndpoint: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;

    /// 处理一个已匹配到本端点的数据报
    fn handle_packet(&self, route: &Route, id: &TransportEndpointId, payload: Payload);
}

/// 处理分发表中没有匹配端点的数据报。
///
/// 返回 `true` 表示数据报已被接管，协议栈不再按"端口不可达"处理。
pub trait TransportProtocolHandler: Send + Sync {
    fn handle_packet(&self, route: &Route, id: TransportEndpointId, payload: Payload) -> bool;
}
