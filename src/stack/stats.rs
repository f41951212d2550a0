//! 统计信息
//!
//! 协议栈与端点共享的计数器，可并发更新。

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// 协议栈统计计数器
#[derive(Debug, Default)]
pub struct Stats {
    endpoints_allocated: AtomicU64,
    endpoints_released: AtomicU64,
    endpoints_registered: AtomicU64,
    registration_conflicts: AtomicU64,
    delivered_to_endpoint: AtomicU64,
    forwarded_to_handler: AtomicU64,
    unknown_port_errors: AtomicU64,
    received_datagrams: AtomicU64,
    receive_dropped: AtomicU64,
}

/// 某一时刻的统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub endpoints_allocated: u64,
    pub endpoints_released: u64,
    pub endpoints_registered: u64,
    pub registration_conflicts: u64,
    pub delivered_to_endpoint: u64,
    pub forwarded_to_handler: u64,
    pub unknown_port_errors: u64,
    pub received_datagrams: u64,
    pub receive_dropped: u64,
}

impl StatsSnapshot {
    /// 已分配但尚未释放的端点数
    pub fn live_endpoints(&self) -> u64 {
        self.endpoints_allocated.saturating_sub(self.endpoints_released)
    }
}

fn bump(c: &AtomicU64) {
    c.fetch_add(1, Ordering::Relaxed);
}

impl Stats {
    pub(crate) fn inc_endpoints_allocated(&self) {
        bump(&self.endpoints_allocated);
    }

    pub(crate) fn inc_endpoints_released(&self) {
        bump(&self.endpoints_released);
    }

    pub(crate) fn inc_endpoints_registered(&self) {
        bump(&self.endpoints_registered);
    }

    pub(crate) fn inc_registration_conflicts(&self) {
        bump(&self.registration_conflicts);
    }

    pub(crate) fn inc_delivered_to_endpoint(&self) {
        bump(&self.delivered_to_endpoint);
    }

    pub(crate) fn inc_forwarded_to_handler(&self) {
        bump(&self.forwarded_to_handler);
    }

    pub(crate) fn inc_unknown_port_errors(&self) {
        bump(&self.unknown_port_errors);
    }

    pub(crate) fn inc_received_datagrams(&self) {
        bump(&self.received_datagrams);
    }

    pub(crate) fn inc_receive_dropped(&self) {
        bump(&self.receive_dropped);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            endpoints_allocated: load(&self.endpoints_allocated),
            endpoints_released: load(&self.endpoints_released),
            endpoints_registered: load(&self.endpoints_registered),
            registration_conflicts: load(&self.registration_conflicts),
            delivered_to_endpoint: load(&self.delivered_to_endpoint),
            forwarded_to_handler: load(&self.forwarded_to_handler),
            unknown_port_errors: load(&self.unknown_port_errors),
            received_datagrams: load(&self.received_datagrams),
            receive_dropped: load(&self.receive_dropped),
        }
    }
}
