//! 协议栈核心
//!
//! 此模块包含传输层分发表、协议栈本体与统计信息。

// 子模块声明
mod demux;
mod handler;
mod net_stack;
mod stats;

// 重新导出公共接口
pub use demux::TransportDemuxer;
pub use handler::{TransportEndpoint, TransportProtocolHandler};
pub use net_stack::Stack;
pub use stats::{Stats, StatsSnapshot};
