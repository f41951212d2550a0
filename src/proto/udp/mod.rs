//! UDP
//!
//! UDP 端点以及未匹配数据报的转发器。

// 子模块声明
mod endpoint;
mod forwarder;
mod policy;

// 重新导出公共接口
pub use endpoint::{EndpointState, UdpEndpoint};
pub use forwarder::{Forwarder, ForwarderRequest};
pub use policy::{AcceptAll, Action, Decision, ForwarderPolicy, IgnoreAll, PortPolicy};
