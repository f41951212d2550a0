//! 传输层/协议模块
//!
//! 目前只有 UDP：端点与未匹配数据报转发器。

pub mod udp;
