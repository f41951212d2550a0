use std::net::IpAddr;
use std::sync::Arc;

use crate::config::StackConfig;
use crate::net::{NicId, Route, TransportEndpointId};
use crate::stack::Stack;

mod demux;

pub(crate) fn ip(s: &str) -> IpAddr {
    s.parse().expect("ip address")
}

/// Route and flow id of a datagram sent from `src` to `dst`, received on NIC 1.
pub(crate) fn inbound(src: (&str, u16), dst: (&str, u16)) -> (Route, TransportEndpointId) {
    let id = TransportEndpointId::inbound((ip(src.0), src.1), (ip(dst.0), dst.1));
    let route = Route::for_addresses(NicId(1), id.local_address, id.remote_address);
    (route, id)
}

pub(crate) fn default_stack() -> Arc<Stack> {
    Stack::new(StackConfig::default())
}
