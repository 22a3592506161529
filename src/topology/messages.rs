/*!
Messages of the topology service protocol

Requests carry the requesting client's service name, responses a status
byte or a sequence of fixed size status records. Notifications carry a
single record. All integers are in network byte order.
*/

use crate::buffer::{fixed_str_bytes, Reader};
use crate::topology::error::{Error, Result};

const MESSAGE_BASE: u16 = 0x1000;

/// The transport tags of the topology protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    QueryLinkStatusRequest = 0x1000,
    QueryLinkStatusResponse,
    QueryPortStatusRequest,
    QueryPortStatusResponse,
    QuerySwitchStatusRequest,
    QuerySwitchStatusResponse,
    SubscribeRequest,
    SubscribeResponse,
    UnsubscribeRequest,
    UnsubscribeResponse,
    LinkStatusNotification,
    PortStatusNotification,
    SwitchStatusNotification,
    UpdateLinkStatusRequest,
    UpdateLinkStatusResponse,
    PingRequest,
    PingResponse,
    EnableDiscoveryRequest,
    EnableDiscoveryResponse,
    DisableDiscoveryRequest,
    DisableDiscoveryResponse,
}

const ALL_TYPES: [MessageType; 21] = [
    MessageType::QueryLinkStatusRequest,
    MessageType::QueryLinkStatusResponse,
    MessageType::QueryPortStatusRequest,
    MessageType::QueryPortStatusResponse,
    MessageType::QuerySwitchStatusRequest,
    MessageType::QuerySwitchStatusResponse,
    MessageType::SubscribeRequest,
    MessageType::SubscribeResponse,
    MessageType::UnsubscribeRequest,
    MessageType::UnsubscribeResponse,
    MessageType::LinkStatusNotification,
    MessageType::PortStatusNotification,
    MessageType::SwitchStatusNotification,
    MessageType::UpdateLinkStatusRequest,
    MessageType::UpdateLinkStatusResponse,
    MessageType::PingRequest,
    MessageType::PingResponse,
    MessageType::EnableDiscoveryRequest,
    MessageType::EnableDiscoveryResponse,
    MessageType::DisableDiscoveryRequest,
    MessageType::DisableDiscoveryResponse,
];

impl MessageType {
    pub fn from_u16(tag: u16) -> Option<MessageType> {
        tag.checked_sub(MESSAGE_BASE)
            .and_then(|i| ALL_TYPES.get(i as usize))
            .cloned()
    }

    pub fn tag(self) -> u16 {
        self as u16
    }

    /// The response that answers this request
    pub fn response(self) -> Option<MessageType> {
        match self {
            MessageType::QueryLinkStatusRequest => Some(MessageType::QueryLinkStatusResponse),
            MessageType::QueryPortStatusRequest => Some(MessageType::QueryPortStatusResponse),
            MessageType::QuerySwitchStatusRequest => Some(MessageType::QuerySwitchStatusResponse),
            MessageType::SubscribeRequest => Some(MessageType::SubscribeResponse),
            MessageType::UnsubscribeRequest => Some(MessageType::UnsubscribeResponse),
            MessageType::UpdateLinkStatusRequest => Some(MessageType::UpdateLinkStatusResponse),
            MessageType::PingRequest => Some(MessageType::PingResponse),
            MessageType::EnableDiscoveryRequest => Some(MessageType::EnableDiscoveryResponse),
            MessageType::DisableDiscoveryRequest => Some(MessageType::DisableDiscoveryResponse),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageType::QueryLinkStatusRequest => "query_link_status_request",
            MessageType::QueryLinkStatusResponse => "query_link_status_response",
            MessageType::QueryPortStatusRequest => "query_port_status_request",
            MessageType::QueryPortStatusResponse => "query_port_status_response",
            MessageType::QuerySwitchStatusRequest => "query_switch_status_request",
            MessageType::QuerySwitchStatusResponse => "query_switch_status_response",
            MessageType::SubscribeRequest => "subscribe_request",
            MessageType::SubscribeResponse => "subscribe_response",
            MessageType::UnsubscribeRequest => "unsubscribe_request",
            MessageType::UnsubscribeResponse => "unsubscribe_response",
            MessageType::LinkStatusNotification => "link_status_notification",
            MessageType::PortStatusNotification => "port_status_notification",
            MessageType::SwitchStatusNotification => "switch_status_notification",
            MessageType::UpdateLinkStatusRequest => "update_link_status_request",
            MessageType::UpdateLinkStatusResponse => "update_link_status_response",
            MessageType::PingRequest => "ping_request",
            MessageType::PingResponse => "ping_response",
            MessageType::EnableDiscoveryRequest => "enable_discovery_request",
            MessageType::EnableDiscoveryResponse => "enable_discovery_response",
            MessageType::DisableDiscoveryRequest => "disable_discovery_request",
            MessageType::DisableDiscoveryResponse => "disable_discovery_response",
        }
    }
}

pub const STATUS_DOWN: u8 = 0;
pub const STATUS_UP: u8 = 1;

pub const PORT_NAME_LEN: usize = 16;

/// The status byte of a response
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseStatus {
    Ok,
    AlreadySubscribed,
    NoSuchSubscriber,
    Other(u8),
}

impl ResponseStatus {
    pub fn from_u8(status: u8) -> ResponseStatus {
        match status {
            0 => ResponseStatus::Ok,
            1 => ResponseStatus::AlreadySubscribed,
            2 => ResponseStatus::NoSuchSubscriber,
            other => ResponseStatus::Other(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            ResponseStatus::Ok => 0,
            ResponseStatus::AlreadySubscribed => 1,
            ResponseStatus::NoSuchSubscriber => 2,
            ResponseStatus::Other(other) => other,
        }
    }
}

/// A fixed size record of the topology protocol
pub trait Record: Sized {
    /// Size on the wire in bytes
    const SIZE: usize;

    fn decode(reader: &mut Reader) -> Result<Self>;

    fn encode(&self, buf: &mut Vec<u8>);
}

/// Status of the unidirectional link between two switch ports
#[derive(Debug, Clone, PartialEq)]
pub struct LinkStatus {
    pub from_dpid: u64,
    pub from_port_no: u16,
    pub to_dpid: u64,
    pub to_port_no: u16,
    pub up: bool,
    pub unstable: bool,
}

impl Record for LinkStatus {
    const SIZE: usize = 24;

    fn decode(reader: &mut Reader) -> Result<Self> {
        let from_dpid = reader.read_u64()?;
        let to_dpid = reader.read_u64()?;
        let from_port_no = reader.read_u16()?;
        let to_port_no = reader.read_u16()?;
        let status = reader.read_u8()?;
        let unstable = reader.read_u8()?;
        reader.skip(2)?;
        Ok(LinkStatus {
            from_dpid,
            from_port_no,
            to_dpid,
            to_port_no,
            up: status == STATUS_UP,
            unstable: unstable != 0,
        })
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.from_dpid.to_be_bytes());
        buf.extend_from_slice(&self.to_dpid.to_be_bytes());
        buf.extend_from_slice(&self.from_port_no.to_be_bytes());
        buf.extend_from_slice(&self.to_port_no.to_be_bytes());
        buf.push(status_byte(self.up));
        buf.push(self.unstable as u8);
        buf.extend_from_slice(&[0; 2]);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortStatus {
    pub dpid: u64,
    pub port_no: u16,
    pub name: String,
    pub mac: [u8; 6],
    /// The port connects to something outside of the managed switches
    pub external: bool,
    pub up: bool,
}

impl Record for PortStatus {
    const SIZE: usize = 40;

    fn decode(reader: &mut Reader) -> Result<Self> {
        let dpid = reader.read_u64()?;
        let port_no = reader.read_u16()?;
        let name = reader.read_fixed_str(PORT_NAME_LEN)?;
        let mac = reader.read_array6()?;
        let external = reader.read_u8()?;
        let status = reader.read_u8()?;
        reader.skip(6)?;
        Ok(PortStatus {
            dpid,
            port_no,
            name,
            mac,
            external: external != 0,
            up: status == STATUS_UP,
        })
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.dpid.to_be_bytes());
        buf.extend_from_slice(&self.port_no.to_be_bytes());
        buf.extend_from_slice(&fixed_str_bytes(&self.name, PORT_NAME_LEN));
        buf.extend_from_slice(&self.mac);
        buf.push(self.external as u8);
        buf.push(status_byte(self.up));
        buf.extend_from_slice(&[0; 6]);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStatus {
    pub dpid: u64,
    pub up: bool,
}

impl Record for SwitchStatus {
    const SIZE: usize = 16;

    fn decode(reader: &mut Reader) -> Result<Self> {
        let dpid = reader.read_u64()?;
        let status = reader.read_u8()?;
        reader.skip(7)?;
        Ok(SwitchStatus {
            dpid,
            up: status == STATUS_UP,
        })
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.dpid.to_be_bytes());
        buf.push(status_byte(self.up));
        buf.extend_from_slice(&[0; 7]);
    }
}

fn status_byte(up: bool) -> u8 {
    if up {
        STATUS_UP
    }
    else {
        STATUS_DOWN
    }
}

/// Decodes a message that consists of exactly one record
pub fn decode_one<R: Record>(data: &[u8]) -> Result<R> {
    if data.len() != R::SIZE {
        return Err(Error::BadLength {
            expected: R::SIZE,
            received: data.len(),
        });
    }
    R::decode(&mut Reader::new(data))
}

/// Decodes a message that is a sequence of records.
/// The record count follows from the length.
pub fn decode_all<R: Record>(data: &[u8]) -> Result<Vec<R>> {
    if data.len() % R::SIZE != 0 {
        return Err(Error::NotAMultiple {
            record: R::SIZE,
            body: data.len(),
        });
    }
    let mut reader = Reader::new(data);
    let mut records = Vec::with_capacity(data.len() / R::SIZE);
    while !reader.is_empty() {
        let mut record = reader.sub_record(R::SIZE)?;
        records.push(R::decode(&mut record)?);
    }
    Ok(records)
}

pub fn encode_all<R: Record>(records: &[R]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(records.len() * R::SIZE);
    for r in records {
        r.encode(&mut buf);
    }
    buf
}

/// A request: the NUL terminated name of the requesting service
pub fn encode_request(service_name: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(service_name.len() + 1);
    buf.extend_from_slice(service_name.as_bytes());
    buf.push(0);
    buf
}

pub fn decode_request(data: &[u8]) -> Result<String> {
    match data.iter().position(|&b| b == 0) {
        Some(end) => Ok(String::from_utf8_lossy(&data[..end]).into_owned()),
        None => Err(Error::BadLength {
            expected: data.len() + 1,
            received: data.len(),
        }),
    }
}

const RESPONSE_SIZE: usize = 4;

pub fn encode_response(status: ResponseStatus) -> Vec<u8> {
    vec![status.to_u8(), 0, 0, 0]
}

pub fn decode_response(data: &[u8]) -> Result<ResponseStatus> {
    if data.len() != RESPONSE_SIZE {
        return Err(Error::BadLength {
            expected: RESPONSE_SIZE,
            received: data.len(),
        });
    }
    Ok(ResponseStatus::from_u8(data[0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> LinkStatus {
        LinkStatus {
            from_dpid: 0x1234,
            from_port_no: 42,
            to_dpid: 0x5678,
            to_port_no: 666,
            up: true,
            unstable: false,
        }
    }

    #[test]
    fn tags_are_consecutive() {
        assert_eq!(0x1000, MessageType::QueryLinkStatusRequest.tag());
        assert_eq!(0x100a, MessageType::LinkStatusNotification.tag());
        assert_eq!(0x100f, MessageType::PingRequest.tag());
        assert_eq!(0x1014, MessageType::DisableDiscoveryResponse.tag());
        for t in ALL_TYPES.iter() {
            assert_eq!(Some(*t), MessageType::from_u16(t.tag()));
        }
        assert_eq!(None, MessageType::from_u16(0x0fff));
        assert_eq!(None, MessageType::from_u16(0x1015));
    }

    #[test]
    fn link_status_layout() {
        let mut buf = vec![];
        link().encode(&mut buf);
        assert_eq!(LinkStatus::SIZE, buf.len());
        assert_eq!(&[0, 0, 0, 0, 0, 0, 0x12, 0x34], &buf[0..8]);
        assert_eq!(&[0, 42, 0x02, 0x9a, STATUS_UP, 0], &buf[16..22]);
        assert_eq!(link(), decode_one::<LinkStatus>(&buf).unwrap());
    }

    #[test]
    fn port_status_round_trip() {
        let port = PortStatus {
            dpid: 0xfedc_ba98_7654_3210,
            port_no: 0xff00,
            name: "veth-a".to_string(),
            mac: [0x00, 0x1b, 0x21, 0xff, 0xfe, 0x01],
            external: true,
            up: false,
        };
        let buf = encode_all(&[port.clone()]);
        assert_eq!(PortStatus::SIZE, buf.len());
        assert_eq!(vec![port], decode_all::<PortStatus>(&buf).unwrap());
    }

    #[test]
    fn query_response_must_be_whole_records() {
        let mut buf = encode_all(&[link(), link()]);
        assert_eq!(2, decode_all::<LinkStatus>(&buf).unwrap().len());
        buf.pop();
        match decode_all::<LinkStatus>(&buf) {
            Err(Error::NotAMultiple { record: 24, body: 47 }) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(decode_all::<LinkStatus>(&[]).unwrap().is_empty());
    }

    #[test]
    fn notification_of_wrong_size() {
        let buf = encode_all(&[
            SwitchStatus { dpid: 1, up: true },
            SwitchStatus { dpid: 2, up: true },
        ]);
        assert!(decode_one::<SwitchStatus>(&buf).is_err());
    }

    #[test]
    fn requests_and_responses() {
        let req = encode_request("topology.4711");
        assert_eq!(b"topology.4711\0".to_vec(), req);
        assert_eq!("topology.4711", decode_request(&req).unwrap());
        assert!(decode_request(b"unterminated").is_err());

        let rep = encode_response(ResponseStatus::AlreadySubscribed);
        assert_eq!(ResponseStatus::AlreadySubscribed, decode_response(&rep).unwrap());
        assert_eq!(ResponseStatus::Other(9), decode_response(&[9, 0, 0, 0]).unwrap());
        assert!(decode_response(&[0]).is_err());
    }
}
