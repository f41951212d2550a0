//! 事件通知
//!
//! 端点在状态变化（可读、关闭）时通过 `WaitQueue` 通知订阅者。

use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

/// 事件掩码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventMask(pub u16);

impl EventMask {
    pub const EMPTY: EventMask = EventMask(0);
    pub const IN: EventMask = EventMask(0x01);
    pub const OUT: EventMask = EventMask(0x04);
    pub const ERR: EventMask = EventMask(0x08);
    pub const HUP: EventMask = EventMask(0x10);

    pub fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: EventMask) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: EventMask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EventMask {
    type Output = EventMask;

    fn bitand(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 & rhs.0)
    }
}

#[derive(Debug)]
struct Waiter {
    mask: EventMask,
    tx: Sender<EventMask>,
}

/// 等待队列：订阅者按掩码接收事件，丢弃接收端即取消订阅。
#[derive(Debug, Default)]
pub struct WaitQueue {
    waiters: Mutex<Vec<Waiter>>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅 `mask` 中的事件
    pub fn subscribe(&self, mask: EventMask) -> Receiver<EventMask> {
        let (tx, rx) = mpsc::channel();
        self.lock().push(Waiter { mask, tx });
        rx
    }

    /// 通知所有关心 `mask` 的订阅者，顺带清理已断开的订阅。
    pub fn notify(&self, mask: EventMask) {
        self.lock().retain(|w| {
            if !w.mask.intersects(mask) {
                return true;
            }
            w.tx.send(w.mask & mask).is_ok()
        });
    }

    pub fn subscribers(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Waiter>> {
        // 订阅列表不会处于中间状态，中毒后继续使用即可。
        self.waiters.lock().unwrap_or_else(|e| e.into_inner())
    }
}
