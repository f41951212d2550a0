//! 协议栈错误类型

use crate::net::{NetworkProtocolNumber, TransportEndpointId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// 四元组已被占用，且双方不都允许共享
    #[error("flow {id} is already registered")]
    RegistrationConflict { id: TransportEndpointId },

    /// 分发表已满
    #[error("dispatch table is full ({limit} registrations)")]
    ResourceExhausted { limit: usize },

    #[error("unsupported network protocol: {0}")]
    UnsupportedProtocol(NetworkProtocolNumber),

    /// 接收队列暂时为空
    #[error("operation would block")]
    WouldBlock,

    /// 端点已关闭
    #[error("endpoint is closed for receive")]
    ClosedForReceive,
}
