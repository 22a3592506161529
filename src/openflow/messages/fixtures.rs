//! Raw switch-to-controller messages for tests

use byteorder::{ByteOrder, NetworkEndian, WriteBytesExt};

use crate::buffer::fixed_str_bytes;
use crate::openflow::messages::*;

/// Builds a message of type `typ` around `body`
pub fn message(typ: OfpType, xid: u32, body: &[u8]) -> Vec<u8> {
    let mut msg = vec![OFP_VERSION, typ as u8, 0, 0];
    msg.write_u32::<NetworkEndian>(xid).unwrap();
    msg.extend_from_slice(body);
    fix_length(&mut msg);
    msg
}

/// Rewrites the header length after a message was modified
pub fn fix_length(msg: &mut Vec<u8>) {
    let len = msg.len() as u16;
    NetworkEndian::write_u16(&mut msg[2..4], len);
}

pub fn port(port_no: u16, name: &str) -> PhyPort {
    PhyPort {
        port_no,
        hw_addr: [0, 0x11, 0x22, 0x33, 0x44, port_no as u8],
        name: name.to_string(),
        curr: 0x20,
        ..Default::default()
    }
}

pub fn phy_port_bytes(port: &PhyPort) -> Vec<u8> {
    let mut bytes = vec![];
    bytes.write_u16::<NetworkEndian>(port.port_no).unwrap();
    bytes.extend_from_slice(&port.hw_addr);
    bytes.extend_from_slice(&fixed_str_bytes(&port.name, OFP_MAX_PORT_NAME_LEN));
    for field in &[
        port.config,
        port.state,
        port.curr,
        port.advertised,
        port.supported,
        port.peer,
    ] {
        bytes.write_u32::<NetworkEndian>(*field).unwrap();
    }
    bytes
}

pub fn error(xid: u32, typ: u16, code: u16, data: &[u8]) -> Vec<u8> {
    let mut body = vec![];
    body.write_u16::<NetworkEndian>(typ).unwrap();
    body.write_u16::<NetworkEndian>(code).unwrap();
    body.extend_from_slice(data);
    message(OfpType::Error, xid, &body)
}

pub fn vendor(xid: u32, vendor: u32, data: &[u8]) -> Vec<u8> {
    let mut body = vec![];
    body.write_u32::<NetworkEndian>(vendor).unwrap();
    body.extend_from_slice(data);
    message(OfpType::Vendor, xid, &body)
}

pub fn features_reply(xid: u32, datapath_id: u64, ports: &[PhyPort]) -> Vec<u8> {
    let mut body = vec![];
    body.write_u64::<NetworkEndian>(datapath_id).unwrap();
    body.write_u32::<NetworkEndian>(256).unwrap();
    body.extend_from_slice(&[1, 0, 0, 0]);
    body.write_u32::<NetworkEndian>(0x87).unwrap();
    body.write_u32::<NetworkEndian>(0xfff).unwrap();
    for p in ports {
        body.extend_from_slice(&phy_port_bytes(p));
    }
    message(OfpType::FeaturesReply, xid, &body)
}

pub fn get_config_reply(xid: u32, flags: u16, miss_send_len: u16) -> Vec<u8> {
    let mut body = vec![];
    body.write_u16::<NetworkEndian>(flags).unwrap();
    body.write_u16::<NetworkEndian>(miss_send_len).unwrap();
    message(OfpType::GetConfigReply, xid, &body)
}

pub fn packet_in(
    xid: u32,
    buffer_id: u32,
    total_len: u16,
    in_port: u16,
    reason: u8,
    data: &[u8],
) -> Vec<u8> {
    let mut body = vec![];
    body.write_u32::<NetworkEndian>(buffer_id).unwrap();
    body.write_u16::<NetworkEndian>(total_len).unwrap();
    body.write_u16::<NetworkEndian>(in_port).unwrap();
    body.extend_from_slice(&[reason, 0]);
    body.extend_from_slice(data);
    message(OfpType::PacketIn, xid, &body)
}

pub fn flow_removed(xid: u32, cookie: u64, priority: u16, packet_count: u64) -> Vec<u8> {
    let mut body = vec![];
    OfpMatch::in_port(1).serialize(&mut body).unwrap();
    body.write_u64::<NetworkEndian>(cookie).unwrap();
    body.write_u16::<NetworkEndian>(priority).unwrap();
    body.extend_from_slice(&[OfpFlowRemovedReason::IdleTimeout as u8, 0]);
    body.write_u32::<NetworkEndian>(30).unwrap();
    body.write_u32::<NetworkEndian>(500).unwrap();
    body.write_u16::<NetworkEndian>(10).unwrap();
    body.extend_from_slice(&[0, 0]);
    body.write_u64::<NetworkEndian>(packet_count).unwrap();
    body.write_u64::<NetworkEndian>(packet_count * 64).unwrap();
    message(OfpType::FlowRemoved, xid, &body)
}

pub fn port_status(xid: u32, reason: u8, port: &PhyPort) -> Vec<u8> {
    let mut body = vec![reason, 0, 0, 0, 0, 0, 0, 0];
    body.extend_from_slice(&phy_port_bytes(port));
    message(OfpType::PortStatus, xid, &body)
}

pub fn stats_reply(xid: u32, typ: u16, stats: &[u8]) -> Vec<u8> {
    let mut body = vec![];
    body.write_u16::<NetworkEndian>(typ).unwrap();
    body.write_u16::<NetworkEndian>(0).unwrap();
    body.extend_from_slice(stats);
    message(OfpType::StatsReply, xid, &body)
}

/// An output action as it appears in an action list
pub fn output_action(port: u16) -> Vec<u8> {
    let mut action = vec![0, 0, 0, 8];
    action.write_u16::<NetworkEndian>(port).unwrap();
    action.extend_from_slice(&[0xff, 0xff]);
    action
}

/// One entry of a flow stats reply with its self-reported length
pub fn flow_stats(table_id: u8, priority: u16, actions: &[Vec<u8>]) -> Vec<u8> {
    let actions = actions.concat();
    let mut entry = vec![];
    entry.write_u16::<NetworkEndian>((88 + actions.len()) as u16).unwrap();
    entry.extend_from_slice(&[table_id, 0]);
    OfpMatch::default().serialize(&mut entry).unwrap();
    entry.write_u32::<NetworkEndian>(12).unwrap();
    entry.write_u32::<NetworkEndian>(0).unwrap();
    entry.write_u16::<NetworkEndian>(priority).unwrap();
    entry.write_u16::<NetworkEndian>(60).unwrap();
    entry.write_u16::<NetworkEndian>(0).unwrap();
    entry.extend_from_slice(&[0; 6]);
    entry.write_u64::<NetworkEndian>(0xc0de).unwrap();
    entry.write_u64::<NetworkEndian>(3).unwrap();
    entry.write_u64::<NetworkEndian>(192).unwrap();
    entry.extend_from_slice(&actions);
    entry
}

/// A packet queue with an optional minimum rate property
pub fn packet_queue(queue_id: u32, min_rate: Option<u16>) -> Vec<u8> {
    let mut queue = vec![];
    queue.write_u32::<NetworkEndian>(queue_id).unwrap();
    let len = if min_rate.is_some() { 24 } else { 8 };
    queue.write_u16::<NetworkEndian>(len).unwrap();
    queue.extend_from_slice(&[0, 0]);
    if let Some(rate) = min_rate {
        queue.write_u16::<NetworkEndian>(OfpQueueProperties::MinRate as u16).unwrap();
        queue.write_u16::<NetworkEndian>(16).unwrap();
        queue.extend_from_slice(&[0; 4]);
        queue.write_u16::<NetworkEndian>(rate).unwrap();
        queue.extend_from_slice(&[0; 6]);
    }
    queue
}

pub fn queue_get_config_reply(xid: u32, port: u16, queues: &[u8]) -> Vec<u8> {
    let mut body = vec![];
    body.write_u16::<NetworkEndian>(port).unwrap();
    body.extend_from_slice(&[0; 6]);
    body.extend_from_slice(queues);
    message(OfpType::QueueGetConfigReply, xid, &body)
}
