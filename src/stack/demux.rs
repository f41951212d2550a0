//! 传输层分发表
//!
//! 以 (网络层协议, 传输层协议, 四元组) 为键保存已注册的端点。
//! 所有修改都在同一把写锁内完成，"检查冲突 + 插入" 对竞争者是原子的。

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace};

use super::handler::TransportEndpoint;
use crate::error::Error;
use crate::net::{NetworkProtocolNumber, NicId, TransportEndpointId, TransportProtocolNumber};

type ProtocolKey = (NetworkProtocolNumber, TransportProtocolNumber);

/// 同一个四元组下的注册
#[derive(Debug)]
struct Binding {
    nic: NicId,
    /// 只有当组内所有端点都允许共享时才可以继续加入
    reuse_port: bool,
    endpoints: Vec<Arc<dyn TransportEndpoint>>,
}

#[derive(Debug, Default)]
struct Tables {
    by_proto: HashMap<ProtocolKey, HashMap<TransportEndpointId, Binding>>,
    registrations: usize,
}

/// 传输层分发表
#[derive(Debug)]
pub struct TransportDemuxer {
    limit: usize,
    hash_salt: u64,
    tables: RwLock<Tables>,
}

impl TransportDemuxer {
    pub fn new(limit: usize, hash_salt: u64) -> Self {
        Self {
            limit,
            hash_salt,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// 原子地为 `net_protos` 中的每个协议注册 `ep`，要么全部成功，要么什么都不改。
    pub fn register(
        &self,
        nic: NicId,
        net_protos: &[NetworkProtocolNumber],
        trans_proto: TransportProtocolNumber,
        id: TransportEndpointId,
        ep: Arc<dyn TransportEndpoint>,
        reuse_port: bool,
    ) -> Result<(), Error> {
        let mut t = self.write();

        for &net in net_protos {
            let existing = t
                .by_proto
                .get(&(net, trans_proto))
                .and_then(|m| m.get(&id));
            if let Some(b) = existing {
                if !(b.reuse_port && reuse_port) {
                    debug!(%id, net_proto = %net, "四元组已被占用");
                    return Err(Error::RegistrationConflict { id });
                }
            }
        }

        if t.registrations.saturating_add(net_protos.len()) > self.limit {
            return Err(Error::ResourceExhausted { limit: self.limit });
        }

        for &net in net_protos {
            let binding = t
                .by_proto
                .entry((net, trans_proto))
                .or_default()
                .entry(id)
                .or_insert_with(|| Binding {
                    nic,
                    reuse_port,
                    endpoints: Vec::new(),
                });
            binding.endpoints.push(Arc::clone(&ep));
            trace!(%id, net_proto = %net, group = binding.endpoints.len(), "注册端点");
        }
        t.registrations += net_protos.len();
        Ok(())
    }

    /// 注销 `ep`。只移除与 `ep` 指针相同的注册，其它端点不受影响。
    ///
    /// 返回实际移除的注册数。
    pub fn unregister(
        &self,
        net_protos: &[NetworkProtocolNumber],
        trans_proto: TransportProtocolNumber,
        id: &TransportEndpointId,
        ep: &dyn TransportEndpoint,
    ) -> usize {
        let target = std::ptr::from_ref(ep).cast::<()>();
        let mut t = self.write();
        let mut removed = 0;

        for &net in net_protos {
            let Some(m) = t.by_proto.get_mut(&(net, trans_proto)) else {
                continue;
            };
            let Some(b) = m.get_mut(id) else {
                continue;
            };
            let before = b.endpoints.len();
            b.endpoints.retain(|e| Arc::as_ptr(e).cast::<()>() != target);
            removed += before - b.endpoints.len();
            if b.endpoints.is_empty() {
                m.remove(id);
            }
        }

        t.registrations = t.registrations.saturating_sub(removed);
        removed
    }

    /// 查找匹配的端点；共享绑定时按四元组哈希稳定地选择一个。
    pub fn find(
        &self,
        net_proto: NetworkProtocolNumber,
        trans_proto: TransportProtocolNumber,
        id: &TransportEndpointId,
    ) -> Option<Arc<dyn TransportEndpoint>> {
        let t = self.read();
        let b = t.by_proto.get(&(net_proto, trans_proto))?.get(id)?;
        match b.endpoints.as_slice() {
            [] => None,
            [only] => Some(Arc::clone(only)),
            group => {
                let idx = (mix64(flow_key(id) ^ self.hash_salt) as usize) % group.len();
                Some(Arc::clone(&group[idx]))
            }
        }
    }

    /// 四元组注册所在的网卡
    pub fn nic_of(
        &self,
        net_proto: NetworkProtocolNumber,
        trans_proto: TransportProtocolNumber,
        id: &TransportEndpointId,
    ) -> Option<NicId> {
        let t = self.read();
        t.by_proto.get(&(net_proto, trans_proto))?.get(id).map(|b| b.nic)
    }

    /// 当前注册总数（每个网络层协议各计一次）
    pub fn len(&self) -> usize {
        self.read().registrations
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        // 每次修改都在检查通过之后才写入，中毒时表仍然一致。
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn addr_bits(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u32::from(v4) as u128,
        IpAddr::V6(v6) => u128::from(v6),
    }
}

fn flow_key(id: &TransportEndpointId) -> u64 {
    let fold = |x: u128| (x as u64) ^ ((x >> 64) as u64);
    fold(addr_bits(id.local_address))
        ^ fold(addr_bits(id.remote_address)).rotate_left(17)
        ^ (((id.local_port as u64) << 16) | id.remote_port as u64).wrapping_mul(0x9E3779B97F4A7C15)
}

/// 一个简单、确定性的 64-bit mixing（替代 RandomState，避免每次运行 hash 不稳定）。
fn mix64(mut x: u64) -> u64 {
    // splitmix64
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
