//! 网络层基础类型
//!
//! 此模块包含协议栈各层共享的标识符、路由描述与载荷类型。

// 子模块声明
mod endpoint_id;
mod id;
mod payload;
mod route;

// 重新导出公共接口
pub use endpoint_id::{FullAddress, TransportEndpointId};
pub use id::{NetworkProtocolNumber, NicId, TransportProtocolNumber};
pub use payload::Payload;
pub use route::Route;
