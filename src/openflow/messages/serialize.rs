/*!
All serialization and construction routines for the OpenFlow message primitives

Use the trait `OfpPacket` for serialization implementations of messages
that are sent. Other primitives that are part of a message should
implement a serialize funtion that operates on a given byte stream.
*/

use byteorder::{NetworkEndian, WriteBytesExt};
use std::io;
use std::io::Write;

use crate::openflow::messages::*;

const HEADER_LENGTH: usize = 8;

impl OfpHeader {
    /// Constructs a body-less `OfpHeader`
    pub fn new(typ: OfpType, xid: u32) -> OfpHeader {
        OfpHeader {
            version: OFP_VERSION,
            typ: typ as u8,
            length: OfpHeader::header_length() as u16,
            xid,
        }
    }

    /// Returns the fixed header length of 8 (in byte)
    pub fn header_length() -> usize {
        HEADER_LENGTH
    }

    /// Serializes this header on the given stream
    pub fn serialize<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_all(&[self.version, self.typ])?;
        stream.write_u16::<NetworkEndian>(self.length)?;
        stream.write_u32::<NetworkEndian>(self.xid)
    }

    /// The header as a complete message, e.g. a features or barrier request
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(HEADER_LENGTH);
        self.serialize(&mut buf)?;
        Ok(buf)
    }
}

impl OfpMatch {
    /// Constructs a match on the input port only
    pub fn in_port(port: u16) -> OfpMatch {
        OfpMatch {
            wildcards: OFPFW_ALL & !OFPFW_IN_PORT,
            in_port: port,
            ..Default::default()
        }
    }

    /// Serializes the 40 byte match
    pub fn serialize<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_u32::<NetworkEndian>(self.wildcards)?;
        stream.write_u16::<NetworkEndian>(self.in_port)?;
        stream.write_all(&self.dl_src)?;
        stream.write_all(&self.dl_dst)?;
        stream.write_u16::<NetworkEndian>(self.dl_vlan)?;
        stream.write_all(&[self.dl_vlan_pcp, 0])?;
        stream.write_u16::<NetworkEndian>(self.dl_type)?;
        stream.write_all(&[self.nw_tos, self.nw_proto, 0, 0])?;
        stream.write_u32::<NetworkEndian>(self.nw_src)?;
        stream.write_u32::<NetworkEndian>(self.nw_dst)?;
        stream.write_u16::<NetworkEndian>(self.tp_src)?;
        stream.write_u16::<NetworkEndian>(self.tp_dst)
    }
}

impl OfpAction {
    /// Constructs an output action.
    /// `max_len` is the number of bytes to send when outputting to the controller.
    pub fn output(port: u16, max_len: u16) -> OfpAction {
        let mut body = Vec::with_capacity(4);
        body.extend_from_slice(&port.to_be_bytes());
        body.extend_from_slice(&max_len.to_be_bytes());
        OfpAction {
            typ: OfpActionType::Output as u16,
            body,
        }
    }

    /// Length of the action on the wire including its type and length fields
    pub fn length(&self) -> usize {
        4 + self.body.len()
    }

    pub fn serialize<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_u16::<NetworkEndian>(self.typ)?;
        stream.write_u16::<NetworkEndian>(self.length() as u16)?;
        stream.write_all(&self.body)
    }
}

fn actions_length(actions: &[OfpAction]) -> usize {
    actions.iter().map(OfpAction::length).sum()
}

impl FlowMod {
    /// Constructs a permanent `FlowMod` that is not tied to a buffered packet.
    pub fn new(
        command: OfpFlowModCommand,
        priority: u16,
        match_field: OfpMatch,
        actions: Vec<OfpAction>,
    ) -> FlowMod {
        FlowMod {
            match_field,
            cookie: 0,
            command,
            idle_timeout: OFP_FLOW_PERMANENT,
            hard_timeout: OFP_FLOW_PERMANENT,
            priority,
            buffer_id: OFP_NO_BUFFER,
            out_port: OFPP_NONE,
            flags: 0,
            actions,
        }
    }
}

impl StatsRequest {
    /// Constructs a request for the body-less statistics kinds
    pub fn new(typ: OfpStatsType) -> StatsRequest {
        StatsRequest {
            typ: typ as u16,
            flags: 0,
            body: vec![],
        }
    }

    /// Constructs an individual flow statistics request
    pub fn flow(match_field: &OfpMatch, table_id: u8, out_port: u16) -> io::Result<StatsRequest> {
        let mut body = Vec::with_capacity(44);
        match_field.serialize(&mut body)?;
        body.write_all(&[table_id, 0])?;
        body.write_u16::<NetworkEndian>(out_port)?;
        Ok(StatsRequest {
            typ: OfpStatsType::Flow as u16,
            flags: 0,
            body,
        })
    }

    /// Constructs a port statistics request. `OFPP_NONE` requests all ports.
    pub fn port(port_no: u16) -> io::Result<StatsRequest> {
        let mut body = Vec::with_capacity(8);
        body.write_u16::<NetworkEndian>(port_no)?;
        body.write_all(&[0; 6])?;
        Ok(StatsRequest {
            typ: OfpStatsType::Port as u16,
            flags: 0,
            body,
        })
    }
}

/// An OpenFlow packet. Must be implemented for all OpenFlow messsages that are sent.
pub trait OfpPacket {
    /// Constructs an OfpHeader with the given body length and transaction ID
    fn header(&self, body_length: usize, xid: u32) -> OfpHeader {
        OfpHeader {
            version: OFP_VERSION,
            typ: Self::typ() as u8,
            length: (OfpHeader::header_length() + body_length) as u16,
            xid,
        }
    }

    /// Returns the packet's type
    fn typ() -> OfpType;

    /// Serializes this packet with network byte order.
    /// The xid is used as its header's transaction id.
    fn serialize<S: Write>(&self, stream: &mut S, xid: u32) -> io::Result<()> {
        let mut body = vec![];
        self.serialize_body(&mut body)?;
        let header = self.header(body.len(), xid);
        debug!("Outgoing message: {:?}", header);
        header.serialize(stream)?;
        stream.write_all(&body)
    }

    /// Serializes this packet into a fresh buffer
    fn to_bytes(&self, xid: u32) -> io::Result<Vec<u8>> {
        let mut buf = vec![];
        self.serialize(&mut buf, xid)?;
        Ok(buf)
    }

    /// Serializes this packet's body.
    /// Implementers have to output network byte order on the given stream.
    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()>;
}

impl OfpEchoRequest {
    /// Constructs a new `OfpEchoRequest` with `arbitrary` content.
    pub fn new(arbitrary: Vec<u8>) -> OfpEchoRequest {
        OfpEchoRequest { arbitrary }
    }
}
impl OfpPacket for OfpEchoRequest {
    fn typ() -> OfpType {
        OfpType::EchoRequest
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_all(&self.arbitrary)
    }
}

impl OfpEchoReply {
    /// Constructs a new `OfpEchoReply` with `arbitrary` content.
    /// This should be the same as in the `OfpEchoRequest` that issued this reply.
    pub fn new(arbitrary: Vec<u8>) -> OfpEchoReply {
        OfpEchoReply { arbitrary }
    }
}
impl OfpPacket for OfpEchoReply {
    fn typ() -> OfpType {
        OfpType::EchoReply
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_all(&self.arbitrary)
    }
}

impl OfpPacket for SwitchConfig {
    fn typ() -> OfpType {
        OfpType::SetConfig
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_u16::<NetworkEndian>(self.flags)?;
        stream.write_u16::<NetworkEndian>(self.miss_send_len)
    }
}

impl OfpPacket for StatsRequest {
    fn typ() -> OfpType {
        OfpType::StatsRequest
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_u16::<NetworkEndian>(self.typ)?;
        stream.write_u16::<NetworkEndian>(self.flags)?;
        stream.write_all(&self.body)
    }
}

impl OfpPacket for QueueGetConfigRequest {
    fn typ() -> OfpType {
        OfpType::QueueGetConfigRequest
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_u16::<NetworkEndian>(self.port)?;
        stream.write_all(&[0; 2])
    }
}

impl OfpPacket for PacketOut {
    fn typ() -> OfpType {
        OfpType::PacketOut
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_u32::<NetworkEndian>(self.buffer_id)?;
        stream.write_u16::<NetworkEndian>(self.in_port)?;
        stream.write_u16::<NetworkEndian>(actions_length(&self.actions) as u16)?;
        for action in &self.actions {
            action.serialize(stream)?;
        }
        stream.write_all(&self.data)
    }
}

impl OfpPacket for FlowMod {
    fn typ() -> OfpType {
        OfpType::FlowMod
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        self.match_field.serialize(stream)?;
        stream.write_u64::<NetworkEndian>(self.cookie)?;
        stream.write_u16::<NetworkEndian>(self.command as u16)?;
        stream.write_u16::<NetworkEndian>(self.idle_timeout)?;
        stream.write_u16::<NetworkEndian>(self.hard_timeout)?;
        stream.write_u16::<NetworkEndian>(self.priority)?;
        stream.write_u32::<NetworkEndian>(self.buffer_id)?;
        stream.write_u16::<NetworkEndian>(self.out_port)?;
        stream.write_u16::<NetworkEndian>(self.flags)?;
        for action in &self.actions {
            action.serialize(stream)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Reader;
    use crate::openflow::messages::deserialize::read_match;

    #[test]
    fn echo_request_header() {
        let xid = 42;
        let expected = OfpHeader {
            version: 1,
            typ: 2,
            length: 8,
            xid,
        };
        let testee = OfpEchoRequest::new(vec![]);
        assert_eq!(expected, testee.header(0, xid));
    }

    #[test]
    fn echo_request_serialization() {
        let testee = OfpEchoRequest::new(vec![1, 2, 3, 4]);
        let ser = testee.to_bytes(0x0a0b0c0d).unwrap();
        assert_eq!(
            vec![1, 2, 0, 12, 0x0a, 0x0b, 0x0c, 0x0d, 1, 2, 3, 4],
            ser
        );
    }

    #[test]
    fn barrier_request_is_header_only() {
        let ser = OfpHeader::new(OfpType::BarrierRequest, 7).to_bytes().unwrap();
        assert_eq!(vec![1, 18, 0, 8, 0, 0, 0, 7], ser);
    }

    #[test]
    fn match_serialization() {
        let mut testee = OfpMatch::in_port(3);
        testee.dl_src = [1, 2, 3, 4, 5, 6];
        testee.nw_src = 0x0a00_0001;
        testee.tp_dst = 80;
        let mut ser = vec![];
        testee.serialize(&mut ser).unwrap();
        assert_eq!(40, ser.len());
        assert_eq!(testee, read_match(&mut Reader::new(&ser)).unwrap());
    }

    #[test]
    fn action_output_serialization() {
        let testee = OfpAction::output(0x1122, 0xffff);
        let mut ser = vec![];
        testee.serialize(&mut ser).unwrap();
        assert_eq!(vec![0, 0, 0, 8, 0x11, 0x22, 0xff, 0xff], ser);
    }

    #[test]
    fn flow_mod_length() {
        let testee = FlowMod::new(
            OfpFlowModCommand::Add,
            OFP_DEFAULT_PRIORITY,
            OfpMatch::default(),
            vec![OfpAction::output(2, 0)],
        );
        let ser = testee.to_bytes(1).unwrap();
        assert_eq!(80, ser.len());
        assert_eq!(&[0, 80], &ser[2..4]);
    }

    #[test]
    fn packet_out_actions_len() {
        let testee = PacketOut {
            buffer_id: OFP_NO_BUFFER,
            in_port: OFPP_NONE,
            actions: vec![OfpAction::output(1, 0), OfpAction::output(2, 0)],
            data: vec![0xee; 14],
        };
        let ser = testee.to_bytes(1).unwrap();
        assert_eq!(8 + 8 + 16 + 14, ser.len());
        assert_eq!(&[0, 16], &ser[14..16]);
    }

    #[test]
    fn flow_stats_request_body() {
        let testee = StatsRequest::flow(&OfpMatch::default(), 0xff, OFPP_NONE).unwrap();
        assert_eq!(44, testee.body.len());
        let ser = testee.to_bytes(1).unwrap();
        assert_eq!(8 + 4 + 44, ser.len());
    }
}
