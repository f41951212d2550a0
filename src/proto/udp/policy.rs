//! 转发策略
//!
//! 策略拿到一个 `ForwarderRequest`，决定忽略它还是为它创建端点。
//! 创建失败时错误原样返回给调用者，这一层不记录、不重试。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use tracing::debug;

use super::endpoint::UdpEndpoint;
use super::forwarder::ForwarderRequest;
use crate::error::Error;
use crate::waiter::WaitQueue;

/// 策略对一次请求的处理结果
#[derive(Debug)]
pub enum Decision {
    /// 不创建端点，数据报就此丢弃
    Ignore,
    /// 尝试创建了端点
    Accept(Result<Arc<UdpEndpoint>, Error>),
}

/// 决策接口
pub trait ForwarderPolicy: Send + Sync {
    fn decide(&self, request: ForwarderRequest<'_>) -> Decision;
}

impl<F> ForwarderPolicy for F
where
    F: Fn(ForwarderRequest<'_>) -> Decision + Send + Sync,
{
    fn decide(&self, request: ForwarderRequest<'_>) -> Decision {
        self(request)
    }
}

/// 忽略所有请求
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreAll;

impl ForwarderPolicy for IgnoreAll {
    fn decide(&self, _request: ForwarderRequest<'_>) -> Decision {
        Decision::Ignore
    }
}

/// 接受所有请求；新端点通过 channel 交给使用方。
///
/// 接收端已经被丢弃时，新端点会立即关闭并从分发表中移除，
/// 返回的端点处于 `Closed` 状态。
#[derive(Debug, Clone)]
pub struct AcceptAll {
    accepted: Sender<Arc<UdpEndpoint>>,
}

impl AcceptAll {
    pub fn new(accepted: Sender<Arc<UdpEndpoint>>) -> Self {
        Self { accepted }
    }
}

impl ForwarderPolicy for AcceptAll {
    fn decide(&self, request: ForwarderRequest<'_>) -> Decision {
        let res = request.create_endpoint(Arc::new(WaitQueue::new()));
        if let Ok(ep) = &res {
            if self.accepted.send(Arc::clone(ep)).is_err() {
                // 没有使用方能读取或关闭它
                debug!(id = ?ep.id(), "接收端已关闭，释放新端点");
                ep.close();
            }
        }
        Decision::Accept(res)
    }
}

/// 按本端端口查表的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Accept,
    Ignore,
}

/// 按本端端口决定接受或忽略，未配置的端口使用默认动作。
#[derive(Debug, Clone)]
pub struct PortPolicy {
    rules: HashMap<u16, Action>,
    default: Action,
    accept: AcceptAll,
}

impl PortPolicy {
    pub fn new(accept: AcceptAll, default: Action) -> Self {
        Self {
            rules: HashMap::new(),
            default,
            accept,
        }
    }

    pub fn with_rule(mut self, local_port: u16, action: Action) -> Self {
        self.rules.insert(local_port, action);
        self
    }

    pub fn action_for(&self, local_port: u16) -> Action {
        self.rules.get(&local_port).copied().unwrap_or(self.default)
    }
}

impl ForwarderPolicy for PortPolicy {
    fn decide(&self, request: ForwarderRequest<'_>) -> Decision {
        match self.action_for(request.id().local_port) {
            Action::Accept => self.accept.decide(request),
            Action::Ignore => Decision::Ignore,
        }
    }
}
