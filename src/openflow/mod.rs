/*!
Dispatches the OpenFlow 1.0 messages an application receives from its switches.
Each message arrives wrapped in a `ServiceHeader` naming the switch. It is
validated, decoded and handed to the `Handler` registered for its kind.
Undecodable messages are logged, counted and dropped.
*/

pub mod error;
pub mod handler;
pub mod messages;

use crate::buffer::Reader;
use crate::stats::Stats;
use crate::transport::*;

use crate::openflow::error::{Error, Result};
use crate::openflow::handler::{CallShape, EventKind, Handler, Handlers};
use crate::openflow::messages::deserialize::Deserialize;
use crate::openflow::messages::*;

/// Splits a transport message into the datapath id, the OpenFlow header and
/// the whole OpenFlow message
fn split_message(data: &[u8]) -> Result<(u64, OfpHeader, &[u8])> {
    let mut reader = Reader::new(data);
    let envelope = ServiceHeader::decode(&mut reader)?;
    let message = reader.rest();
    let header = OfpHeader::read(message)?;
    Ok((envelope.datapath_id, header, message))
}

fn read_datapath_id(data: &[u8]) -> Result<u64> {
    Ok(Reader::new(data).read_u64()?)
}

/// Routes the messages of the switch channel to the registered handlers
#[derive(Debug)]
pub struct Dispatcher<'a> {
    handlers: &'a mut Handlers,
    stats: &'a mut Stats,
}

impl<'a> Dispatcher<'a> {
    pub fn new(handlers: &'a mut Handlers, stats: &'a mut Stats) -> Dispatcher<'a> {
        Dispatcher { handlers, stats }
    }

    /// Handles one transport message. Returns false if `tag` does not
    /// belong to the switch channel.
    pub fn dispatch(&mut self, tag: u16, data: &[u8]) -> bool {
        match tag {
            MESSENGER_OPENFLOW_MESSAGE => self.handle_openflow_message(data),
            MESSENGER_OPENFLOW_READY => self.handle_switch_event(EventKind::SwitchReady, data),
            MESSENGER_OPENFLOW_DISCONNECTED => {
                self.handle_switch_event(EventKind::SwitchDisconnected, data)
            }
            MESSENGER_OPENFLOW_CONNECTED => {
                // the switch becomes usable with its ready event
                debug!("A switch connected");
            }
            _ => return false,
        }
        true
    }

    fn handle_switch_event(&mut self, kind: EventKind, data: &[u8]) {
        let datapath_id = match read_datapath_id(data) {
            Ok(id) => id,
            Err(e) => {
                warn!("Dropping {} event: {}", kind.name(), e);
                self.stats.failed(kind.name());
                return;
            }
        };
        info!("{} {:#x}", kind.name(), datapath_id);
        match self.handlers.get_handler_mut(kind) {
            Some(Handler::SwitchReady(h)) | Some(Handler::SwitchDisconnected(h)) => h(datapath_id),
            _ => {}
        }
        self.stats.succeeded(kind.name());
    }

    fn handle_openflow_message(&mut self, data: &[u8]) {
        let (datapath_id, header, message) = match split_message(data) {
            Ok(parts) => parts,
            Err(e) => {
                warn!("Dropping undecodable OpenFlow message: {}", e);
                self.stats.failed("openflow_message");
                return;
            }
        };
        debug!("Incoming message from {:#x}: {:?}", datapath_id, header);

        let name = ofp_type_name(header.typ());
        match self.handle_ofp_message(datapath_id, &header, message) {
            Ok(()) => self.stats.succeeded(name),
            Err(Error::BadType(t)) => {
                debug!("Cannot interpret message of type {} ({})", t, name);
                self.stats.unhandled(name);
            }
            Err(e) => {
                warn!("Dropping {} from {:#x}: {}", name, datapath_id, e);
                trace!("Full message: {:?}", message);
                self.stats.failed(name);
            }
        }
    }

    fn handle_ofp_message(
        &mut self,
        datapath_id: u64,
        header: &OfpHeader,
        message: &[u8],
    ) -> Result<()> {
        if header.version() != OFP_VERSION {
            return Err(Error::BadVersion(header.version()));
        }
        if header.length() != message.len() {
            return Err(Error::LengthMismatch {
                header: header.length(),
                received: message.len(),
            });
        }
        let body = &message[OfpHeader::header_length()..];
        let xid = header.xid();

        // Process the message
        let t = header.typ();
        if t == OfpType::Hello as u8 {
            trace!("Hello from {:#x}", datapath_id);
        }
        else if t == OfpType::Error as u8 {
            let error = OfpErrorMsg::deserialize(header, body)?;
            match error.text() {
                Some(text) => info!("{} from {:#x}: {}", error, datapath_id, text),
                None if error.data.is_none() => {
                    warn!("Unrecognized {} from {:#x}", error, datapath_id)
                }
                None => debug!("{} from {:#x}", error, datapath_id),
            }
            if let Some(Handler::Error(h)) = self.handlers.get_handler_mut(EventKind::Error) {
                let data = error.data.as_ref().map(|d| d.as_slice());
                h(datapath_id, xid, error.typ, error.code, data);
            }
        }
        else if t == OfpType::EchoReply as u8 {
            let reply = OfpEchoReply::deserialize(header, body)?;
            let handler = self.handlers.get_handler_mut(EventKind::EchoReply);
            if let Some(Handler::EchoReply(h)) = handler {
                h(datapath_id, xid, reply.arbitrary());
            }
        }
        else if t == OfpType::Vendor as u8 {
            let vendor = OfpVendor::deserialize(header, body)?;
            if let Some(Handler::Vendor(h)) = self.handlers.get_handler_mut(EventKind::Vendor) {
                h(datapath_id, xid, vendor.vendor, &vendor.data);
            }
        }
        else if t == OfpType::FeaturesReply as u8 {
            let f = SwitchFeatures::deserialize(header, body)?;
            info!(
                "Switch {:#x} reports datapath id {:#x} with {} ports",
                datapath_id,
                f.datapath_id,
                f.ports.len()
            );
            match self.handlers.get_handler_mut(EventKind::FeaturesReply) {
                Some(Handler::FeaturesReply(CallShape::Simple(h))) => h(datapath_id, xid, &f),
                Some(Handler::FeaturesReply(CallShape::Detailed(h))) => h(
                    datapath_id,
                    xid,
                    f.n_buffers,
                    f.n_tables,
                    f.capabilities,
                    f.actions,
                    &f.ports,
                ),
                _ => {}
            }
        }
        else if t == OfpType::GetConfigReply as u8 {
            let config = SwitchConfig::deserialize(header, body)?;
            if let Some(Handler::GetConfigReply(h)) =
                self.handlers.get_handler_mut(EventKind::GetConfigReply)
            {
                h(datapath_id, xid, config.flags, config.miss_send_len);
            }
        }
        else if t == OfpType::PacketIn as u8 {
            let p = PacketIn::deserialize(header, body)?;
            match self.handlers.get_handler_mut(EventKind::PacketIn) {
                Some(Handler::PacketIn(CallShape::Simple(h))) => h(datapath_id, &p),
                Some(Handler::PacketIn(CallShape::Detailed(h))) => h(
                    datapath_id,
                    p.transaction_id,
                    p.buffer_id,
                    p.total_len,
                    p.in_port,
                    p.reason,
                    &p.data,
                ),
                _ => {}
            }
        }
        else if t == OfpType::FlowRemoved as u8 {
            let r = FlowRemoved::deserialize(header, body)?;
            match self.handlers.get_handler_mut(EventKind::FlowRemoved) {
                Some(Handler::FlowRemoved(CallShape::Simple(h))) => h(datapath_id, &r),
                Some(Handler::FlowRemoved(CallShape::Detailed(h))) => h(
                    datapath_id,
                    r.transaction_id,
                    &r.match_field,
                    r.cookie,
                    r.priority,
                    r.reason,
                    r.duration_sec,
                    r.duration_nsec,
                    r.idle_timeout,
                    r.packet_count,
                    r.byte_count,
                ),
                _ => {}
            }
        }
        else if t == OfpType::PortStatus as u8 {
            let status = OfpPortStatus::deserialize(header, body)?;
            let handler = self.handlers.get_handler_mut(EventKind::PortStatus);
            if let Some(Handler::PortStatus(h)) = handler {
                h(datapath_id, xid, status.reason, &status.desc);
            }
        }
        else if t == OfpType::StatsReply as u8 {
            let reply = StatsReply::deserialize(header, body)?;
            let handler = self.handlers.get_handler_mut(EventKind::StatsReply);
            if let Some(Handler::StatsReply(h)) = handler {
                h(datapath_id, xid, reply.typ, reply.flags, &reply.body);
            }
        }
        else if t == OfpType::BarrierReply as u8 {
            if !body.is_empty() {
                return Err(Error::BadLen {
                    typ: t,
                    len: message.len(),
                });
            }
            if let Some(Handler::BarrierReply(h)) =
                self.handlers.get_handler_mut(EventKind::BarrierReply)
            {
                h(datapath_id, xid);
            }
        }
        else if t == OfpType::QueueGetConfigReply as u8 {
            let reply = QueueGetConfigReply::deserialize(header, body)?;
            if let Some(Handler::QueueGetConfigReply(h)) =
                self.handlers.get_handler_mut(EventKind::QueueGetConfigReply)
            {
                h(datapath_id, xid, reply.port, &reply.queues);
            }
        }
        else {
            return Err(Error::BadType(t));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openflow::messages::fixtures;
    use crate::openflow::messages::serialize::OfpPacket;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    const DPID: u64 = 0xabc;

    fn wrap(message: &[u8]) -> Vec<u8> {
        let mut data = vec![];
        ServiceHeader {
            datapath_id: DPID,
            service_name: "switch.0xabc".to_string(),
        }
        .encode(&mut data);
        data.extend_from_slice(message);
        data
    }

    fn dispatch(handlers: &mut Handlers, stats: &mut Stats, message: &[u8]) {
        let mut testee = Dispatcher::new(handlers, stats);
        assert!(testee.dispatch(MESSENGER_OPENFLOW_MESSAGE, &wrap(message)));
    }

    type PacketInFields = (u64, u32, u32, u16, u16, u8, Vec<u8>);

    #[test]
    fn packet_in_call_shapes_agree() {
        let msg = fixtures::packet_in(0x77, 0x100, 1500, 3, 1, &[1, 2, 3, 4]);
        let mut stats = Stats::new();

        let simple: Rc<RefCell<Option<PacketInFields>>> = Rc::new(RefCell::new(None));
        let s = simple.clone();
        let mut handlers = Handlers::new();
        handlers.set_handler(Handler::packet_in(move |dpid, p| {
            *s.borrow_mut() = Some((
                dpid,
                p.transaction_id,
                p.buffer_id,
                p.total_len,
                p.in_port,
                p.reason,
                p.data.clone(),
            ));
        }));
        dispatch(&mut handlers, &mut stats, &msg);

        let detailed: Rc<RefCell<Option<PacketInFields>>> = Rc::new(RefCell::new(None));
        let d = detailed.clone();
        handlers.set_handler(Handler::packet_in_detailed(
            move |dpid, xid, buffer_id, total_len, in_port, reason, data| {
                *d.borrow_mut() =
                    Some((dpid, xid, buffer_id, total_len, in_port, reason, data.to_vec()));
            },
        ));
        dispatch(&mut handlers, &mut stats, &msg);

        assert_eq!(
            Some((DPID, 0x77, 0x100, 1500, 3, 1, vec![1, 2, 3, 4])),
            *simple.borrow()
        );
        assert_eq!(*simple.borrow(), *detailed.borrow());
        assert_eq!(2, stats.get("packet_in_receive_succeeded"));
    }

    #[test]
    fn flow_removed_call_shapes_agree() {
        let msg = fixtures::flow_removed(5, 0xc0ffee, 100, 7);
        let mut stats = Stats::new();
        let mut handlers = Handlers::new();

        let simple = Rc::new(RefCell::new(None));
        let s = simple.clone();
        handlers.set_handler(Handler::flow_removed(move |_, r| {
            *s.borrow_mut() = Some((r.cookie, r.priority, r.packet_count, r.match_field.clone()));
        }));
        dispatch(&mut handlers, &mut stats, &msg);

        let detailed = Rc::new(RefCell::new(None));
        let d = detailed.clone();
        handlers.set_handler(Handler::flow_removed_detailed(
            move |_, _, m, cookie, priority, _, _, _, _, packet_count, _| {
                *d.borrow_mut() = Some((cookie, priority, packet_count, m.clone()));
            },
        ));
        dispatch(&mut handlers, &mut stats, &msg);

        assert_eq!(Some((0xc0ffee, 100, 7, OfpMatch::in_port(1))), *simple.borrow());
        assert_eq!(*simple.borrow(), *detailed.borrow());
    }

    #[test]
    fn features_reply_call_shapes_agree() {
        let ports = vec![fixtures::port(1, "eth1")];
        let msg = fixtures::features_reply(3, 0x1234, &ports);
        let mut stats = Stats::new();
        let mut handlers = Handlers::new();

        let simple = Rc::new(RefCell::new(None));
        let s = simple.clone();
        handlers.set_handler(Handler::features_reply(move |_, xid, f| {
            *s.borrow_mut() = Some((xid, f.n_buffers, f.n_tables, f.ports.clone()));
        }));
        dispatch(&mut handlers, &mut stats, &msg);

        let detailed = Rc::new(RefCell::new(None));
        let d = detailed.clone();
        handlers.set_handler(Handler::features_reply_detailed(
            move |_, xid, n_buffers, n_tables, _, _, ports| {
                *d.borrow_mut() = Some((xid, n_buffers, n_tables, ports.to_vec()));
            },
        ));
        dispatch(&mut handlers, &mut stats, &msg);

        assert_eq!(Some((3, 256, 1, ports)), *simple.borrow());
        assert_eq!(*simple.borrow(), *detailed.borrow());
    }

    #[test]
    fn flow_stats_sweep() {
        let entries = [
            fixtures::flow_stats(0, 1, &[]),
            fixtures::flow_stats(0, 2, &[fixtures::output_action(1)]),
            fixtures::flow_stats(1, 3, &[]),
        ];
        let msg = fixtures::stats_reply(9, OfpStatsType::Flow as u16, &entries.concat());
        let mut stats = Stats::new();
        let mut handlers = Handlers::new();
        let priorities = Rc::new(RefCell::new(vec![]));
        let p = priorities.clone();
        handlers.set_handler(Handler::stats_reply(move |_, _, typ, _, body| {
            assert_eq!(OfpStatsType::Flow as u16, typ);
            if let StatsReplyBody::Flow(ref flows) = *body {
                p.borrow_mut().extend(flows.iter().map(|f| f.priority));
            }
        }));
        dispatch(&mut handlers, &mut stats, &msg);
        assert_eq!(vec![1, 2, 3], *priorities.borrow());

        // the last entry claims 8 bytes more than the body has
        let mut broken = entries.concat();
        let last = 2 * 88 + 8;
        broken[last..last + 2].copy_from_slice(&[0, 96]);
        let msg = fixtures::stats_reply(9, OfpStatsType::Flow as u16, &broken);
        dispatch(&mut handlers, &mut stats, &msg);
        assert_eq!(3, priorities.borrow().len());
        assert_eq!(1, stats.get("stats_reply_receive_succeeded"));
        assert_eq!(1, stats.get("stats_reply_receive_failed"));
    }

    #[test]
    fn missing_handler_is_no_failure() {
        let mut stats = Stats::new();
        let mut handlers = Handlers::new();
        dispatch(&mut handlers, &mut stats, &fixtures::get_config_reply(1, 0, 128));
        assert_eq!(1, stats.get("get_config_reply_receive_succeeded"));
        assert_eq!(0, stats.get("get_config_reply_receive_failed"));
    }

    #[test]
    fn error_data() {
        let mut stats = Stats::new();
        let mut handlers = Handlers::new();
        let seen = Rc::new(RefCell::new(vec![]));
        let s = seen.clone();
        handlers.set_handler(Handler::error(move |_, xid, typ, code, data| {
            s.borrow_mut().push((xid, typ, code, data.map(|d| d.to_vec())));
        }));
        let bad_action = OfpErrorType::BadAction as u16;
        dispatch(&mut handlers, &mut stats, &fixtures::error(4, bad_action, 2, &[9, 9]));
        dispatch(&mut handlers, &mut stats, &fixtures::error(5, 0x99, 1, &[9, 9]));
        assert_eq!(
            vec![(4, bad_action, 2, Some(vec![9, 9])), (5, 0x99, 1, None)],
            *seen.borrow()
        );
    }

    #[test]
    fn port_status_and_barrier() {
        let mut stats = Stats::new();
        let mut handlers = Handlers::new();
        let reasons = Rc::new(RefCell::new(vec![]));
        let r = reasons.clone();
        handlers.set_handler(Handler::port_status(move |_, _, reason, port| {
            r.borrow_mut().push((reason, port.name.clone()));
        }));
        let barriers = Rc::new(Cell::new(0));
        let b = barriers.clone();
        handlers.set_handler(Handler::barrier_reply(move |_, _| b.set(b.get() + 1)));

        let port = fixtures::port(2, "eth2");
        let modify = OfpPortReason::Modify as u8;
        dispatch(&mut handlers, &mut stats, &fixtures::port_status(1, modify, &port));
        dispatch(
            &mut handlers,
            &mut stats,
            &OfpHeader::new(OfpType::BarrierReply, 2).to_bytes().unwrap(),
        );
        assert_eq!(vec![(modify, "eth2".to_string())], *reasons.borrow());
        assert_eq!(1, barriers.get());
    }

    #[test]
    fn echo_reply_and_vendor() {
        let mut stats = Stats::new();
        let mut handlers = Handlers::new();
        let echoed = Rc::new(RefCell::new(vec![]));
        let e = echoed.clone();
        handlers.set_handler(Handler::echo_reply(move |_, _, data| {
            e.borrow_mut().extend_from_slice(data)
        }));
        let vendors = Rc::new(RefCell::new(vec![]));
        let v = vendors.clone();
        handlers.set_handler(Handler::vendor(move |_, _, vendor, data| {
            v.borrow_mut().push((vendor, data.to_vec()))
        }));

        let echo = OfpEchoReply::new(vec![7, 7]).to_bytes(1).unwrap();
        dispatch(&mut handlers, &mut stats, &echo);
        dispatch(&mut handlers, &mut stats, &fixtures::vendor(2, 0x2320, &[1]));
        assert_eq!(vec![7, 7], *echoed.borrow());
        assert_eq!(vec![(0x2320, vec![1])], *vendors.borrow());
    }

    #[test]
    fn queue_config() {
        let mut stats = Stats::new();
        let mut handlers = Handlers::new();
        let queues = Rc::new(RefCell::new(vec![]));
        let q = queues.clone();
        handlers.set_handler(Handler::queue_get_config_reply(move |_, _, port, qs| {
            q.borrow_mut().push((port, qs.len()))
        }));
        let body = [fixtures::packet_queue(1, Some(500)), fixtures::packet_queue(2, None)].concat();
        dispatch(&mut handlers, &mut stats, &fixtures::queue_get_config_reply(3, 7, &body));
        assert_eq!(vec![(7, 2)], *queues.borrow());
    }

    #[test]
    fn invalid_messages_are_counted() {
        let mut stats = Stats::new();
        let mut handlers = Handlers::new();
        let called = Rc::new(Cell::new(false));
        let c = called.clone();
        handlers.set_handler(Handler::packet_in(move |_, _| c.set(true)));

        let mut wrong_version = fixtures::packet_in(1, OFP_NO_BUFFER, 4, 1, 0, &[0; 4]);
        wrong_version[0] = 0x04;
        dispatch(&mut handlers, &mut stats, &wrong_version);

        let mut short_header = fixtures::packet_in(1, OFP_NO_BUFFER, 4, 1, 0, &[0; 4]);
        short_header.pop();
        dispatch(&mut handlers, &mut stats, &short_header);

        assert!(!called.get());
        assert_eq!(2, stats.get("packet_in_receive_failed"));
    }

    #[test]
    fn switch_bound_messages_are_unhandled() {
        let mut stats = Stats::new();
        let mut handlers = Handlers::new();
        let echo = OfpHeader::new(OfpType::EchoRequest, 1).to_bytes().unwrap();
        dispatch(&mut handlers, &mut stats, &echo);
        assert_eq!(1, stats.get("echo_request_receive_unhandled"));
        assert_eq!(0, stats.get("echo_request_receive_failed"));
    }

    #[test]
    fn truncated_envelope() {
        let mut stats = Stats::new();
        let mut handlers = Handlers::new();
        let mut testee = Dispatcher::new(&mut handlers, &mut stats);
        testee.dispatch(MESSENGER_OPENFLOW_MESSAGE, &[0, 0, 0]);
        assert_eq!(1, stats.get("openflow_message_receive_failed"));
    }

    #[test]
    fn switch_events() {
        let mut stats = Stats::new();
        let mut handlers = Handlers::new();
        let events = Rc::new(RefCell::new(vec![]));
        let e = events.clone();
        handlers.set_handler(Handler::switch_ready(move |dpid| {
            e.borrow_mut().push(("ready", dpid))
        }));
        let e = events.clone();
        handlers.set_handler(Handler::switch_disconnected(move |dpid| {
            e.borrow_mut().push(("disconnected", dpid))
        }));

        let mut testee = Dispatcher::new(&mut handlers, &mut stats);
        assert!(testee.dispatch(MESSENGER_OPENFLOW_READY, &wrap(&[])));
        assert!(testee.dispatch(MESSENGER_OPENFLOW_CONNECTED, &[]));
        assert!(testee.dispatch(MESSENGER_OPENFLOW_DISCONNECTED, &wrap(&[])));
        assert!(!testee.dispatch(0x1234, &[]));
        assert!(testee.dispatch(MESSENGER_OPENFLOW_READY, &[1]));

        assert_eq!(vec![("ready", DPID), ("disconnected", DPID)], *events.borrow());
        assert_eq!(1, stats.get("switch_ready_receive_failed"));
    }
}
