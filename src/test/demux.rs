use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::net::{NetworkProtocolNumber, NicId, Payload, Route, TransportEndpointId, TransportProtocolNumber};
use crate::stack::{TransportDemuxer, TransportEndpoint};

use super::inbound;

const V4: NetworkProtocolNumber = NetworkProtocolNumber::IPV4;
const V6: NetworkProtocolNumber = NetworkProtocolNumber::IPV6;
const UDP: TransportProtocolNumber = TransportProtocolNumber::UDP;

#[derive(Debug, Default)]
struct Recorder {
    packets: Mutex<Vec<Vec<u8>>>,
}

impl TransportEndpoint for Recorder {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn handle_packet(&self, _route: &Route, _id: &TransportEndpointId, payload: Payload) {
        self.packets.lock().unwrap().push(payload.to_vec());
    }
}

fn recorder() -> Arc<Recorder> {
    Arc::new(Recorder::default())
}

fn same(a: &Arc<dyn TransportEndpoint>, b: &Arc<Recorder>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

#[test]
fn demux_rejects_second_registration_without_reuse() {
    let demux = TransportDemuxer::new(16, 0);
    let (_, id) = inbound(("10.0.0.1", 1000), ("10.0.0.2", 53));
    let a = recorder();
    let b = recorder();

    demux.register(NicId(1), &[V4], UDP, id, a.clone(), false).expect("first");
    let err = demux.register(NicId(1), &[V4], UDP, id, b, false).unwrap_err();
    assert_eq!(err, Error::RegistrationConflict { id });
    assert_eq!(demux.len(), 1);

    let found = demux.find(V4, UDP, &id).expect("registered");
    assert!(same(&found, &a));
}

#[test]
fn demux_reuse_port_group_requires_all_members_to_opt_in() {
    let demux = TransportDemuxer::new(16, 0);
    let (_, id) = inbound(("10.0.0.1", 1000), ("10.0.0.2", 53));
    let a = recorder();
    let b = recorder();
    let c = recorder();

    demux.register(NicId(1), &[V4], UDP, id, a.clone(), true).expect("a");
    demux.register(NicId(1), &[V4], UDP, id, b.clone(), true).expect("b joins group");
    let err = demux.register(NicId(1), &[V4], UDP, id, c, false).unwrap_err();
    assert!(matches!(err, Error::RegistrationConflict { .. }));
    assert_eq!(demux.len(), 2);

    // Selection within the group is stable for a given flow.
    let first = demux.find(V4, UDP, &id).expect("group member");
    for _ in 0..10 {
        let again = demux.find(V4, UDP, &id).expect("group member");
        assert!(Arc::ptr_eq(&first, &again));
    }
    assert!(same(&first, &a) || same(&first, &b));
}

#[test]
fn demux_rejects_joining_exclusive_binding_with_reuse() {
    let demux = TransportDemuxer::new(16, 0);
    let (_, id) = inbound(("10.0.0.1", 1000), ("10.0.0.2", 53));

    demux.register(NicId(1), &[V4], UDP, id, recorder(), false).expect("exclusive");
    let err = demux.register(NicId(1), &[V4], UDP, id, recorder(), true).unwrap_err();
    assert!(matches!(err, Error::RegistrationConflict { .. }));
}

#[test]
fn demux_multi_protocol_registration_is_all_or_nothing() {
    let demux = TransportDemuxer::new(16, 0);
    let (_, id) = inbound(("10.0.0.1", 1000), ("10.0.0.2", 53));

    demux.register(NicId(1), &[V4], UDP, id, recorder(), false).expect("v4");
    let err = demux
        .register(NicId(2), &[V6, V4], UDP, id, recorder(), false)
        .unwrap_err();
    assert!(matches!(err, Error::RegistrationConflict { .. }));

    assert!(demux.find(V6, UDP, &id).is_none(), "v6 must not be half-registered");
    assert_eq!(demux.len(), 1);
    assert_eq!(demux.nic_of(V4, UDP, &id), Some(NicId(1)));
}

#[test]
fn demux_enforces_capacity_without_side_effects() {
    let demux = TransportDemuxer::new(2, 0);
    let (_, id1) = inbound(("10.0.0.1", 1000), ("10.0.0.2", 53));
    let (_, id2) = inbound(("10.0.0.1", 1001), ("10.0.0.2", 53));
    let (_, id3) = inbound(("10.0.0.1", 1002), ("10.0.0.2", 53));

    demux.register(NicId(1), &[V4], UDP, id1, recorder(), false).expect("id1");
    let err = demux
        .register(NicId(1), &[V4, V6], UDP, id2, recorder(), false)
        .unwrap_err();
    assert_eq!(err, Error::ResourceExhausted { limit: 2 });
    assert!(demux.find(V4, UDP, &id2).is_none());

    demux.register(NicId(1), &[V4], UDP, id3, recorder(), false).expect("id3 fits");
    assert_eq!(demux.len(), 2);
}

#[test]
fn demux_unregister_removes_only_the_given_endpoint() {
    let demux = TransportDemuxer::new(16, 0);
    let (_, id) = inbound(("10.0.0.1", 1000), ("10.0.0.2", 53));
    let owner = recorder();
    let stranger = recorder();

    demux.register(NicId(1), &[V4], UDP, id, owner.clone(), false).expect("owner");

    assert_eq!(demux.unregister(&[V4], UDP, &id, stranger.as_ref()), 0);
    assert!(demux.find(V4, UDP, &id).is_some());

    assert_eq!(demux.unregister(&[V4], UDP, &id, owner.as_ref()), 1);
    assert!(demux.find(V4, UDP, &id).is_none());
    assert!(demux.is_empty());
}

#[test]
fn demux_keys_by_transport_protocol() {
    let demux = TransportDemuxer::new(16, 0);
    let (_, id) = inbound(("10.0.0.1", 1000), ("10.0.0.2", 53));

    demux.register(NicId(1), &[V4], UDP, id, recorder(), false).expect("udp");
    demux
        .register(NicId(1), &[V4], TransportProtocolNumber::TCP, id, recorder(), false)
        .expect("same tuple on tcp does not collide");
    assert_eq!(demux.len(), 2);
}

#[test]
fn demux_found_endpoint_receives_packets() {
    let demux = TransportDemuxer::new(16, 0);
    let (route, id) = inbound(("10.0.0.1", 1000), ("10.0.0.2", 53));
    let ep = recorder();
    demux.register(NicId(1), &[V4], UDP, id, ep.clone(), false).expect("register");

    let found = demux.find(V4, UDP, &id).expect("registered");
    found.handle_packet(&route, &id, Payload::from(&b"hello"[..]));
    assert_eq!(*ep.packets.lock().unwrap(), vec![b"hello".to_vec()]);
}
