/*!
All deserialization routines for the OpenFlow message primitives

The header uses a special deserialization because its size is known.
Use the trait `Deserialize` for any other deserialization implementation.

Variable-shape bodies (flow statistics, actions, queues, queue properties)
are swept one sub-record at a time. Each sub-record reports its own length,
which has to be nonzero and fit into what is left of the body.
*/

use byteorder::{ByteOrder, NetworkEndian};

use crate::buffer::{self, Reader};
use crate::openflow::error::{Error, Result};
use crate::openflow::messages::*;

const PHY_PORT_LEN: usize = 48;
const MATCH_LEN: usize = 40;
const ACTION_HEADER_LEN: usize = 8;
const FLOW_STATS_LEN: usize = 88;
const DESC_STATS_LEN: usize = 4 * DESC_STR_LEN + SERIAL_NUM_LEN;
const AGGREGATE_STATS_LEN: usize = 24;
const TABLE_STATS_LEN: usize = 64;
const PORT_STATS_LEN: usize = 104;
const QUEUE_STATS_LEN: usize = 32;
const PACKET_QUEUE_LEN: usize = 8;
const QUEUE_PROP_HEADER_LEN: usize = 8;

impl OfpHeader {
    /// Deserializes an OpenFlow header
    pub fn deserialize(bytes: &[u8; 8]) -> OfpHeader {
        OfpHeader {
            version: bytes[0],
            typ: bytes[1],
            length: NetworkEndian::read_u16(&bytes[2..4]),
            xid: NetworkEndian::read_u32(&bytes[4..]),
        }
    }

    /// Reads the header from the start of a message
    pub fn read(message: &[u8]) -> Result<OfpHeader> {
        if message.len() < OfpHeader::header_length() {
            return Err(Error::Buffer(buffer::Error::Truncated {
                need: OfpHeader::header_length(),
                have: message.len(),
            }));
        }
        let mut bytes = [0; 8];
        bytes.copy_from_slice(&message[..8]);
        Ok(OfpHeader::deserialize(&bytes))
    }

    /// Returns the body length in byte
    pub fn body_length(&self) -> usize {
        (self.length as usize).saturating_sub(OfpHeader::header_length())
    }
}

/// To be implemented by all OpenFlow messages that are received.
pub trait Deserialize: Sized {
    /// Deserialize the body that follows `header`.
    /// Fails on providing a too small or too large body.
    fn deserialize(header: &OfpHeader, body: &[u8]) -> Result<Self> {
        if Self::min_length() > body.len() || Self::max_length() < body.len() {
            return Err(Error::BadLen {
                typ: header.typ(),
                len: OfpHeader::header_length() + body.len(),
            });
        }
        Self::deserialize_len_ok(header, &mut Reader::new(body))
    }

    /// Deserializes the body (network byte order).
    /// Implementers can rely on the body's size to be between
    /// Self::min_length() and Self::max_length().
    fn deserialize_len_ok(header: &OfpHeader, bytes: &mut Reader) -> Result<Self>;

    /// The minimum length of the body in bytes
    fn min_length() -> usize;

    /// The maximum length of the body in bytes
    /// May not return a value greater than 0xFFF7
    fn max_length() -> usize {
        0xffff - OfpHeader::header_length()
    }
}

impl Deserialize for OfpEchoReply {
    fn deserialize_len_ok(_: &OfpHeader, bytes: &mut Reader) -> Result<Self> {
        Ok(OfpEchoReply {
            arbitrary: bytes.rest().to_vec(),
        })
    }

    fn min_length() -> usize {
        0
    }
}

impl Deserialize for OfpErrorMsg {
    fn deserialize_len_ok(_: &OfpHeader, bytes: &mut Reader) -> Result<Self> {
        let typ = bytes.read_u16()?;
        let code = bytes.read_u16()?;
        let rest = bytes.rest();
        let data = OfpErrorType::from_u16(typ).map(|_| rest.to_vec());
        Ok(OfpErrorMsg { typ, code, data })
    }

    fn min_length() -> usize {
        4
    }
}

impl Deserialize for OfpVendor {
    fn deserialize_len_ok(_: &OfpHeader, bytes: &mut Reader) -> Result<Self> {
        Ok(OfpVendor {
            vendor: bytes.read_u32()?,
            data: bytes.rest().to_vec(),
        })
    }

    fn min_length() -> usize {
        4
    }
}

impl Deserialize for SwitchFeatures {
    fn deserialize_len_ok(_: &OfpHeader, bytes: &mut Reader) -> Result<Self> {
        let datapath_id = bytes.read_u64()?;
        let n_buffers = bytes.read_u32()?;
        let n_tables = bytes.read_u8()?;
        bytes.skip(3)?;
        let capabilities = bytes.read_u32()?;
        let actions = bytes.read_u32()?;
        let ports = fixed_records(bytes, PHY_PORT_LEN, read_phy_port)?;
        Ok(SwitchFeatures {
            datapath_id,
            n_buffers,
            n_tables,
            capabilities,
            actions,
            ports,
        })
    }

    fn min_length() -> usize {
        24
    }
}

impl Deserialize for SwitchConfig {
    fn deserialize_len_ok(_: &OfpHeader, bytes: &mut Reader) -> Result<Self> {
        Ok(SwitchConfig {
            flags: bytes.read_u16()?,
            miss_send_len: bytes.read_u16()?,
        })
    }

    fn min_length() -> usize {
        4
    }

    fn max_length() -> usize {
        4
    }
}

impl Deserialize for PacketIn {
    fn deserialize_len_ok(header: &OfpHeader, bytes: &mut Reader) -> Result<Self> {
        let buffer_id = bytes.read_u32()?;
        let total_len = bytes.read_u16()?;
        let in_port = bytes.read_u16()?;
        let reason = bytes.read_u8()?;
        bytes.skip(1)?;
        // only the captured bytes are carried, total_len may be larger
        let data = bytes.rest().to_vec();
        Ok(PacketIn {
            transaction_id: header.xid(),
            buffer_id,
            total_len,
            in_port,
            reason,
            data,
        })
    }

    fn min_length() -> usize {
        10
    }
}

impl Deserialize for FlowRemoved {
    fn deserialize_len_ok(header: &OfpHeader, bytes: &mut Reader) -> Result<Self> {
        let match_field = read_match(bytes)?;
        let cookie = bytes.read_u64()?;
        let priority = bytes.read_u16()?;
        let reason = bytes.read_u8()?;
        bytes.skip(1)?;
        let duration_sec = bytes.read_u32()?;
        let duration_nsec = bytes.read_u32()?;
        let idle_timeout = bytes.read_u16()?;
        bytes.skip(2)?;
        let packet_count = bytes.read_u64()?;
        let byte_count = bytes.read_u64()?;
        Ok(FlowRemoved {
            transaction_id: header.xid(),
            match_field,
            cookie,
            priority,
            reason,
            duration_sec,
            duration_nsec,
            idle_timeout,
            packet_count,
            byte_count,
        })
    }

    fn min_length() -> usize {
        80
    }

    fn max_length() -> usize {
        80
    }
}

impl Deserialize for OfpPortStatus {
    fn deserialize_len_ok(_: &OfpHeader, bytes: &mut Reader) -> Result<Self> {
        let reason = bytes.read_u8()?;
        bytes.skip(7)?;
        let desc = read_phy_port(bytes)?;
        Ok(OfpPortStatus { reason, desc })
    }

    fn min_length() -> usize {
        8 + PHY_PORT_LEN
    }

    fn max_length() -> usize {
        8 + PHY_PORT_LEN
    }
}

impl Deserialize for StatsReply {
    fn deserialize_len_ok(_: &OfpHeader, bytes: &mut Reader) -> Result<Self> {
        let typ = bytes.read_u16()?;
        let flags = bytes.read_u16()?;
        let body = if typ == OfpStatsType::Desc as u16 {
            exact_length(bytes, DESC_STATS_LEN)?;
            StatsReplyBody::Desc(DescStats {
                mfr_desc: bytes.read_fixed_str(DESC_STR_LEN)?,
                hw_desc: bytes.read_fixed_str(DESC_STR_LEN)?,
                sw_desc: bytes.read_fixed_str(DESC_STR_LEN)?,
                serial_num: bytes.read_fixed_str(SERIAL_NUM_LEN)?,
                dp_desc: bytes.read_fixed_str(DESC_STR_LEN)?,
            })
        }
        else if typ == OfpStatsType::Flow as u16 {
            let mut flow_stats = vec![];
            while !bytes.is_empty() {
                let length = bytes.peek_u16(0)? as usize;
                let mut entry = bytes.sub_record(length)?;
                flow_stats.push(read_flow_stats(&mut entry)?);
            }
            StatsReplyBody::Flow(flow_stats)
        }
        else if typ == OfpStatsType::Aggregate as u16 {
            exact_length(bytes, AGGREGATE_STATS_LEN)?;
            let packet_count = bytes.read_u64()?;
            let byte_count = bytes.read_u64()?;
            let flow_count = bytes.read_u32()?;
            bytes.skip(4)?;
            StatsReplyBody::Aggregate(AggregateStats {
                packet_count,
                byte_count,
                flow_count,
            })
        }
        else if typ == OfpStatsType::Table as u16 {
            StatsReplyBody::Table(fixed_records(bytes, TABLE_STATS_LEN, read_table_stats)?)
        }
        else if typ == OfpStatsType::Port as u16 {
            StatsReplyBody::Port(fixed_records(bytes, PORT_STATS_LEN, read_port_stats)?)
        }
        else if typ == OfpStatsType::Queue as u16 {
            StatsReplyBody::Queue(fixed_records(bytes, QUEUE_STATS_LEN, read_queue_stats)?)
        }
        else if typ == OfpStatsType::Vendor as u16 {
            StatsReplyBody::Vendor {
                vendor: bytes.read_u32()?,
                data: bytes.rest().to_vec(),
            }
        }
        else {
            return Err(Error::UnknownStatsType(typ));
        };
        Ok(StatsReply { typ, flags, body })
    }

    fn min_length() -> usize {
        4
    }
}

impl Deserialize for QueueGetConfigReply {
    fn deserialize_len_ok(_: &OfpHeader, bytes: &mut Reader) -> Result<Self> {
        let port = bytes.read_u16()?;
        bytes.skip(6)?;
        let mut queues = vec![];
        while !bytes.is_empty() {
            // the queue's len field follows its 4 byte id
            let length = bytes.peek_u16(4)? as usize;
            if length < PACKET_QUEUE_LEN {
                return Err(bad_record_length(length, bytes));
            }
            let mut queue = bytes.sub_record(length)?;
            queues.push(read_packet_queue(&mut queue)?);
        }
        Ok(QueueGetConfigReply { port, queues })
    }

    fn min_length() -> usize {
        8
    }
}

/// Decodes the `OfpAction` list that fills the rest of `bytes`
pub fn read_actions(bytes: &mut Reader) -> Result<Vec<OfpAction>> {
    let mut actions = vec![];
    while !bytes.is_empty() {
        let length = bytes.peek_u16(2)? as usize;
        if length < ACTION_HEADER_LEN {
            return Err(bad_record_length(length, bytes));
        }
        let mut action = bytes.sub_record(length)?;
        let typ = action.read_u16()?;
        action.skip(2)?;
        actions.push(OfpAction {
            typ,
            body: action.rest().to_vec(),
        });
    }
    Ok(actions)
}

/// Decodes a `OfpMatch` (40 bytes)
pub fn read_match(bytes: &mut Reader) -> Result<OfpMatch> {
    let mut m = bytes.sub_record(MATCH_LEN)?;
    let wildcards = m.read_u32()?;
    let in_port = m.read_u16()?;
    let dl_src = m.read_array6()?;
    let dl_dst = m.read_array6()?;
    let dl_vlan = m.read_u16()?;
    let dl_vlan_pcp = m.read_u8()?;
    m.skip(1)?;
    let dl_type = m.read_u16()?;
    let nw_tos = m.read_u8()?;
    let nw_proto = m.read_u8()?;
    m.skip(2)?;
    let nw_src = m.read_u32()?;
    let nw_dst = m.read_u32()?;
    let tp_src = m.read_u16()?;
    let tp_dst = m.read_u16()?;
    Ok(OfpMatch {
        wildcards,
        in_port,
        dl_src,
        dl_dst,
        dl_vlan,
        dl_vlan_pcp,
        dl_type,
        nw_tos,
        nw_proto,
        nw_src,
        nw_dst,
        tp_src,
        tp_dst,
    })
}

/// Decodes a `PhyPort` (48 bytes)
pub fn read_phy_port(bytes: &mut Reader) -> Result<PhyPort> {
    Ok(PhyPort {
        port_no: bytes.read_u16()?,
        hw_addr: bytes.read_array6()?,
        name: bytes.read_fixed_str(OFP_MAX_PORT_NAME_LEN)?,
        config: bytes.read_u32()?,
        state: bytes.read_u32()?,
        curr: bytes.read_u32()?,
        advertised: bytes.read_u32()?,
        supported: bytes.read_u32()?,
        peer: bytes.read_u32()?,
    })
}

fn read_flow_stats(entry: &mut Reader) -> Result<FlowStats> {
    if entry.remaining() < FLOW_STATS_LEN {
        return Err(bad_record_length(entry.remaining(), entry));
    }
    entry.skip(2)?;
    let table_id = entry.read_u8()?;
    entry.skip(1)?;
    let match_field = read_match(entry)?;
    let duration_sec = entry.read_u32()?;
    let duration_nsec = entry.read_u32()?;
    let priority = entry.read_u16()?;
    let idle_timeout = entry.read_u16()?;
    let hard_timeout = entry.read_u16()?;
    entry.skip(6)?;
    let cookie = entry.read_u64()?;
    let packet_count = entry.read_u64()?;
    let byte_count = entry.read_u64()?;
    let actions = read_actions(entry)?;
    Ok(FlowStats {
        table_id,
        match_field,
        duration_sec,
        duration_nsec,
        priority,
        idle_timeout,
        hard_timeout,
        cookie,
        packet_count,
        byte_count,
        actions,
    })
}

fn read_table_stats(bytes: &mut Reader) -> Result<TableStats> {
    let table_id = bytes.read_u8()?;
    bytes.skip(3)?;
    Ok(TableStats {
        table_id,
        name: bytes.read_fixed_str(OFP_MAX_TABLE_NAME_LEN)?,
        wildcards: bytes.read_u32()?,
        max_entries: bytes.read_u32()?,
        active_count: bytes.read_u32()?,
        lookup_count: bytes.read_u64()?,
        matched_count: bytes.read_u64()?,
    })
}

fn read_port_stats(bytes: &mut Reader) -> Result<PortStats> {
    let port_no = bytes.read_u16()?;
    bytes.skip(6)?;
    Ok(PortStats {
        port_no,
        rx_packets: bytes.read_u64()?,
        tx_packets: bytes.read_u64()?,
        rx_bytes: bytes.read_u64()?,
        tx_bytes: bytes.read_u64()?,
        rx_dropped: bytes.read_u64()?,
        tx_dropped: bytes.read_u64()?,
        rx_errors: bytes.read_u64()?,
        tx_errors: bytes.read_u64()?,
        rx_frame_err: bytes.read_u64()?,
        rx_over_err: bytes.read_u64()?,
        rx_crc_err: bytes.read_u64()?,
        collisions: bytes.read_u64()?,
    })
}

fn read_queue_stats(bytes: &mut Reader) -> Result<QueueStats> {
    let port_no = bytes.read_u16()?;
    bytes.skip(2)?;
    Ok(QueueStats {
        port_no,
        queue_id: bytes.read_u32()?,
        tx_bytes: bytes.read_u64()?,
        tx_packets: bytes.read_u64()?,
        tx_errors: bytes.read_u64()?,
    })
}

fn read_packet_queue(queue: &mut Reader) -> Result<PacketQueue> {
    let queue_id = queue.read_u32()?;
    queue.skip(4)?;
    let mut properties = vec![];
    while !queue.is_empty() {
        let length = queue.peek_u16(2)? as usize;
        if length < QUEUE_PROP_HEADER_LEN {
            return Err(bad_record_length(length, queue));
        }
        let mut prop = queue.sub_record(length)?;
        let property = prop.read_u16()?;
        prop.skip(6)?;
        let decoded = if property == OfpQueueProperties::None as u16 {
            QueueProperty::None
        }
        else if property == OfpQueueProperties::MinRate as u16 {
            let rate = prop.read_u16()?;
            prop.skip(6)?;
            QueueProperty::MinRate(rate)
        }
        else {
            QueueProperty::Unknown {
                property,
                body: prop.rest().to_vec(),
            }
        };
        properties.push(decoded);
    }
    Ok(PacketQueue {
        queue_id,
        properties,
    })
}

/// Reads a body that is a sequence of records of the same fixed size
fn fixed_records<T>(
    bytes: &mut Reader,
    size: usize,
    read: fn(&mut Reader) -> Result<T>,
) -> Result<Vec<T>> {
    if bytes.remaining() % size != 0 {
        return Err(Error::NotAMultiple {
            record: size,
            body: bytes.remaining(),
        });
    }
    let mut records = Vec::with_capacity(bytes.remaining() / size);
    while !bytes.is_empty() {
        let mut record = bytes.sub_record(size)?;
        records.push(read(&mut record)?);
    }
    Ok(records)
}

fn exact_length(bytes: &Reader, size: usize) -> Result<()> {
    if bytes.remaining() != size {
        return Err(Error::NotAMultiple {
            record: size,
            body: bytes.remaining(),
        });
    }
    Ok(())
}

fn bad_record_length(declared: usize, bytes: &Reader) -> Error {
    Error::Buffer(buffer::Error::BadRecordLength {
        declared,
        remaining: bytes.remaining(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openflow::messages::fixtures;

    fn split(message: &[u8]) -> (OfpHeader, &[u8]) {
        (OfpHeader::read(message).unwrap(), &message[8..])
    }

    #[test]
    fn header_deserialization() {
        let expected = OfpHeader {
            version: 1,
            typ: 10,
            length: 0x5234,
            xid: 0x12345678,
        };
        let bytes = [1, 10, 0x52, 0x34, 0x12, 0x34, 0x56, 0x78];
        assert_eq!(expected, OfpHeader::deserialize(&bytes));
    }

    #[test]
    fn min_lengths() {
        assert_eq!(0, OfpEchoReply::min_length());
        assert_eq!(24, SwitchFeatures::min_length());
        assert_eq!(4, OfpErrorMsg::min_length());
        assert_eq!(80, FlowRemoved::min_length());
        assert_eq!(56, OfpPortStatus::min_length());
    }

    #[test]
    fn max_lengths() {
        assert_eq!(0xFFF7, OfpEchoReply::max_length());
        assert_eq!(4, SwitchConfig::max_length());
        assert_eq!(80, FlowRemoved::max_length());
    }

    #[test]
    fn truncated_packet_in() {
        let mut msg = fixtures::packet_in(7, 3, 60, 1, 0, &[]);
        msg.truncate(12);
        let (header, body) = split(&msg);
        let expected = Error::BadLen { typ: 10, len: 12 };
        assert_eq!(expected, PacketIn::deserialize(&header, body).unwrap_err());
    }

    #[test]
    fn packet_in_with_truncated_frame() {
        let frame = [0xaa; 20];
        let msg = fixtures::packet_in(7, OFP_NO_BUFFER, 1500, 3, 0, &frame);
        let (header, body) = split(&msg);
        let testee = PacketIn::deserialize(&header, body).unwrap();
        assert_eq!(7, testee.transaction_id);
        assert_eq!(1500, testee.total_len);
        assert_eq!(20, testee.data.len());
        assert!(!testee.is_buffered());
    }

    #[test]
    fn features_reply_with_ports() {
        let ports = vec![fixtures::port(1, "eth1"), fixtures::port(2, "eth2")];
        let msg = fixtures::features_reply(9, 0xabcd, &ports);
        let (header, body) = split(&msg);
        let testee = SwitchFeatures::deserialize(&header, body).unwrap();
        assert_eq!(0xabcd, testee.datapath_id);
        assert_eq!(ports, testee.ports);
    }

    #[test]
    fn features_reply_with_partial_port() {
        let mut msg = fixtures::features_reply(9, 0xabcd, &[fixtures::port(1, "eth1")]);
        msg.truncate(msg.len() - 1);
        fixtures::fix_length(&mut msg);
        let (header, body) = split(&msg);
        let expected = Error::NotAMultiple {
            record: 48,
            body: 47,
        };
        assert_eq!(expected, SwitchFeatures::deserialize(&header, body).unwrap_err());
    }

    #[test]
    fn error_with_recognized_type() {
        let msg = fixtures::error(1, OfpErrorType::HelloFailed as u16, 0, b"incompatible\0");
        let (header, body) = split(&msg);
        let testee = OfpErrorMsg::deserialize(&header, body).unwrap();
        assert_eq!(Some("incompatible".to_string()), testee.text());
    }

    #[test]
    fn error_with_unknown_type_drops_data() {
        let msg = fixtures::error(1, 0x77, 3, &[1, 2, 3]);
        let (header, body) = split(&msg);
        let testee = OfpErrorMsg::deserialize(&header, body).unwrap();
        assert_eq!(0x77, testee.typ);
        assert_eq!(3, testee.code);
        assert_eq!(None, testee.data);
    }

    #[test]
    fn flow_stats_sweep() {
        let entries = vec![
            fixtures::flow_stats(1, 10, &[fixtures::output_action(1)]),
            fixtures::flow_stats(2, 20, &[]),
            fixtures::flow_stats(3, 30, &[fixtures::output_action(2), fixtures::output_action(3)]),
        ];
        let msg = fixtures::stats_reply(4, OfpStatsType::Flow as u16, &entries.concat());
        let (header, body) = split(&msg);
        let testee = StatsReply::deserialize(&header, body).unwrap();
        match testee.body {
            StatsReplyBody::Flow(flows) => {
                assert_eq!(3, flows.len());
                assert_eq!(vec![10, 20, 30], flows.iter().map(|f| f.priority).collect::<Vec<_>>());
                assert_eq!(2, flows[2].actions.len());
                assert_eq!(vec![0, 3, 0xff, 0xff], flows[2].actions[1].body);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn flow_stats_overlong_entry() {
        let mut entry = fixtures::flow_stats(1, 10, &[]);
        // claim more than is there
        NetworkEndian::write_u16(&mut entry[0..2], 96);
        let msg = fixtures::stats_reply(4, OfpStatsType::Flow as u16, &entry);
        let (header, body) = split(&msg);
        let expected = Error::Buffer(buffer::Error::BadRecordLength {
            declared: 96,
            remaining: 88,
        });
        assert_eq!(expected, StatsReply::deserialize(&header, body).unwrap_err());
    }

    #[test]
    fn flow_stats_zero_length_entry() {
        let mut entry = fixtures::flow_stats(1, 10, &[]);
        NetworkEndian::write_u16(&mut entry[0..2], 0);
        let msg = fixtures::stats_reply(4, OfpStatsType::Flow as u16, &entry);
        let (header, body) = split(&msg);
        assert!(StatsReply::deserialize(&header, body).is_err());
    }

    #[test]
    fn port_stats_not_a_multiple() {
        let msg = fixtures::stats_reply(4, OfpStatsType::Port as u16, &[0; 105]);
        let (header, body) = split(&msg);
        let expected = Error::NotAMultiple {
            record: 104,
            body: 105,
        };
        assert_eq!(expected, StatsReply::deserialize(&header, body).unwrap_err());
    }

    #[test]
    fn unknown_stats_type() {
        let msg = fixtures::stats_reply(4, 42, &[]);
        let (header, body) = split(&msg);
        assert_eq!(
            Error::UnknownStatsType(42),
            StatsReply::deserialize(&header, body).unwrap_err()
        );
    }

    #[test]
    fn queue_config_with_min_rate() {
        let queues = [fixtures::packet_queue(5, Some(300)), fixtures::packet_queue(6, None)];
        let msg = fixtures::queue_get_config_reply(8, 2, &queues.concat());
        let (header, body) = split(&msg);
        let testee = QueueGetConfigReply::deserialize(&header, body).unwrap();
        assert_eq!(2, testee.port);
        assert_eq!(
            vec![
                PacketQueue {
                    queue_id: 5,
                    properties: vec![QueueProperty::MinRate(300)],
                },
                PacketQueue {
                    queue_id: 6,
                    properties: vec![],
                },
            ],
            testee.queues
        );
    }

    #[test]
    fn action_shorter_than_its_header() {
        let bytes = [0, 0, 0, 4, 0, 0, 0, 0];
        let mut reader = Reader::new(&bytes);
        assert!(read_actions(&mut reader).is_err());
    }
}
