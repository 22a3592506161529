/*!
All the OpenFlow 1.0 message primitives an application receives or sends

This is based on the openflow.h from OpenFlow Switch Specification 1.0.0.
The type names are changed to align with the Rust conventions.
*/

pub mod deserialize;
pub mod serialize;

#[cfg(test)]
pub mod fixtures;

use std::fmt;

/* Some getters */

impl OfpHeader {
    /// Gets the packet's OpenFlow version
    pub fn version(&self) -> u8 {
        self.version
    }
    /// Gets this packet's `OfpType`'s numerical respresentation.
    pub fn typ(&self) -> u8 {
        self.typ
    }
    /// Gets the packet's length including the header
    pub fn length(&self) -> usize {
        self.length as usize
    }
    /// Gets the packet's transaction id
    pub fn xid(&self) -> u32 {
        self.xid
    }
}

impl OfpErrorMsg {
    /// Gets the `data` as text. Only `HelloFailed` errors carry text.
    pub fn text(&self) -> Option<String> {
        if self.typ != OfpErrorType::HelloFailed as u16 {
            return None;
        }
        self.data.as_ref().map(|d| {
            let end = d.iter().position(|&b| b == 0).unwrap_or(d.len());
            String::from_utf8_lossy(&d[..end]).into_owned()
        })
    }
}

impl fmt::Display for OfpErrorMsg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match OfpErrorType::from_u16(self.typ) {
            Some(typ) => write!(f, "OpenFlow Error: {:?}, code({})", typ, self.code),
            None => write!(f, "OpenFlow Error: type({}), code({})", self.typ, self.code),
        }
    }
}

/* Copyright (c) 2008 The Board of Trustees of The Leland Stanford Junior University
 *
 * We are making the OpenFlow specification and associated documentation
 * (Software) available for public use and benefit with the expectation
 * that others will use, modify and enhance the Software and contribute
 * those enhancements back to the community. However, since we would
 * like to make the Software available for broadest use, with as few
 * restrictions as possible permission is hereby granted, free of
 * charge, to any person obtaining a copy of this Software to deal in
 * the Software under the copyrights without restriction, including
 * without limitation the rights to use, copy, modify, merge, publish,
 * distribute, sublicense, and/or sell copies of the Software, and to
 * permit persons to whom the Software is furnished to do so, subject to
 * the following conditions:
 *
 * The above copyright notice and this permission notice shall be
 * included in all copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
 * EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
 * MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
 * NONINFRINGEMENT.  IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
 * BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
 * ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
 * CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 *
 * The name and trademarks of copyright holder(s) may NOT be used in
 * advertising or publicity pertaining to the Software or any
 * derivatives without specific, written prior permission.
 */

/// Version number:
/// Non-experimental versions released: 0x01
/// Experimental versions released: 0x81 -- 0x99
pub const OFP_VERSION: u8 = 0x01;

pub const OFP_MAX_TABLE_NAME_LEN: usize = 32;
pub const OFP_MAX_PORT_NAME_LEN: usize = 16;
pub const OFP_ETH_ALEN: usize = 6;
pub const DESC_STR_LEN: usize = 256;
pub const SERIAL_NUM_LEN: usize = 32;

/// Maximum number of physical switch ports.
pub const OFPP_MAX: u16 = 0xff00;
/// Not associated with a physical port.
pub const OFPP_NONE: u16 = 0xffff;

/// A reserved buffer ID to express that no buffer is assigned
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// Value used in `idle_timeout` and `hard_timeout` to indicate that the entry is permanent.
pub const OFP_FLOW_PERMANENT: u16 = 0;

/// By default, choose a priority in the middle.
pub const OFP_DEFAULT_PRIORITY: u16 = 0x8000;

/// Switch input port.
pub const OFPFW_IN_PORT: u32 = 1 << 0;

/// Wildcard all fields of an `OfpMatch`.
pub const OFPFW_ALL: u32 = (1 << 22) - 1;

/// A message's type, the most fundamental to
/// distinguish information between messages
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpType {
    /* Immutable messages. */
    /// Symmetric message
    Hello = 0,
    /// Symmetric message
    Error = 1,
    /// Symmetric message
    EchoRequest = 2,
    /// Symmetric message
    EchoReply = 3,
    /// Symmetric message
    Vendor = 4,

    /* Switch configuration messages. */
    /// Controller/switch message
    FeaturesRequest = 5,
    /// Controller/switch message
    FeaturesReply = 6,
    /// Controller/switch message
    GetConfigRequest = 7,
    /// Controller/switch message
    GetConfigReply = 8,
    /// Controller/switch message
    SetConfig = 9,

    /* Asynchronous messages. */
    /// Async message
    PacketIn = 10,
    /// Async message
    FlowRemoved = 11,
    /// Async message
    PortStatus = 12,

    /* Controller command messages. */
    /// Controller/switch message
    PacketOut = 13,
    /// Controller/switch message
    FlowMod = 14,
    /// Controller/switch message
    PortMod = 15,

    /* Statistics messages. */
    /// Controller/switch message
    StatsRequest = 16,
    /// Controller/switch message
    StatsReply = 17,

    /* Barrier messages. */
    /// Controller/switch message
    BarrierRequest = 18,
    /// Controller/switch message
    BarrierReply = 19,

    /* Queue Configuration messages. */
    /// Controller/switch message
    QueueGetConfigRequest = 20,
    /// Controller/switch message
    QueueGetConfigReply = 21,
}

/// The name used for logging and statistics of a raw message type
pub fn ofp_type_name(typ: u8) -> &'static str {
    match typ {
        0 => "hello",
        1 => "error",
        2 => "echo_request",
        3 => "echo_reply",
        4 => "vendor",
        5 => "features_request",
        6 => "features_reply",
        7 => "get_config_request",
        8 => "get_config_reply",
        9 => "set_config",
        10 => "packet_in",
        11 => "flow_removed",
        12 => "port_status",
        13 => "packet_out",
        14 => "flow_mod",
        15 => "port_mod",
        16 => "stats_request",
        17 => "stats_reply",
        18 => "barrier_request",
        19 => "barrier_reply",
        20 => "queue_get_config_request",
        21 => "queue_get_config_reply",
        _ => "undefined",
    }
}

/// Header on all OpenFlow packets.
#[derive(Debug, PartialEq, Clone)]
pub struct OfpHeader {
    /// OFP_VERSION.
    version: u8,
    /// This packet's OfpType.
    typ: u8,
    /// This packet's length including this OfpHeader.
    length: u16,
    /// Transaction id associated with this packet.
    /// Replies use the same id as was in the request
    /// to facilitate pairing.
    xid: u32,
}

/// Description of a physical port
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhyPort {
    pub port_no: u16,
    pub hw_addr: [u8; OFP_ETH_ALEN],
    /// Null-terminated on the wire
    pub name: String,

    /// Bitmap of OFPPC_* flags.
    pub config: u32,
    /// Bitmap of OFPPS_* flags.
    pub state: u32,

    /* Bitmaps of OFPPF_* that describe features.  All bits zeroed if
     * unsupported or unavailable. */
    /// Current features.
    pub curr: u32,
    /// Features being advertised by the port.
    pub advertised: u32,
    /// Features supported by the port.
    pub supported: u32,
    /// Features advertised by peer.
    pub peer: u32,
}

/// Switch features.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchFeatures {
    /// Datapath unique ID. The lower 48-bits are for
    /// a MAC address, while the upper 16-bits are
    /// implementer-defined.
    pub datapath_id: u64,
    /// Max packets buffered at once.
    pub n_buffers: u32,
    /// Number of tables supported by datapath.
    pub n_tables: u8,

    /* Features. */
    /// Bitmap of support OfpCapabilities.
    pub capabilities: u32,
    /// Bitmap of supported OfpActionType's.
    pub actions: u32,

    /* Port info.*/
    /// Port definitions. The number of ports is inferred from the
    /// length field in the header.
    pub ports: Vec<PhyPort>,
}

/// Switch configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchConfig {
    /// OFPC_* flags.
    pub flags: u16,
    /// Max bytes of new flow that datapath should send to the controller.
    pub miss_send_len: u16,
}

/// Fields to match against flows
#[derive(Debug, Clone, PartialEq)]
pub struct OfpMatch {
    /// Wildcard fields.
    pub wildcards: u32,
    /// Input switch port.
    pub in_port: u16,
    /// Ethernet source address.
    pub dl_src: [u8; OFP_ETH_ALEN],
    /// Ethernet destination address.
    pub dl_dst: [u8; OFP_ETH_ALEN],
    /// Input VLAN id.
    pub dl_vlan: u16,
    /// Input VLAN priority.
    pub dl_vlan_pcp: u8,
    /// Ethernet frame type.
    pub dl_type: u16,
    /// IP ToS (actually DSCP field, 6 bits).
    pub nw_tos: u8,
    /// IP protocol or lower 8 bits of ARP opcode.
    pub nw_proto: u8,
    /// IP source address.
    pub nw_src: u32,
    /// IP destination address.
    pub nw_dst: u32,
    /// TCP/UDP source port.
    pub tp_src: u16,
    /// TCP/UDP destination port.
    pub tp_dst: u16,
}

impl Default for OfpMatch {
    /// A match that wildcards everything
    fn default() -> Self {
        OfpMatch {
            wildcards: OFPFW_ALL,
            in_port: 0,
            dl_src: [0; OFP_ETH_ALEN],
            dl_dst: [0; OFP_ETH_ALEN],
            dl_vlan: 0,
            dl_vlan_pcp: 0,
            dl_type: 0,
            nw_tos: 0,
            nw_proto: 0,
            nw_src: 0,
            nw_dst: 0,
            tp_src: 0,
            tp_dst: 0,
        }
    }
}

/* ## ----------------- ## */
/* ## OpenFlow Actions. ## */
/* ## ----------------- ## */

/// The type of an OpenFlow Action
pub enum OfpActionType {
    /// Output to switch port.
    Output = 0,
}

/// One action of an action list. Only the header is interpreted,
/// the body is passed on as it is.
#[derive(Debug, Clone, PartialEq)]
pub struct OfpAction {
    /// One of OFPAT_*.
    pub typ: u16,
    /// Everything after the type and length fields, including padding.
    pub body: Vec<u8>,
}

/// Packet sent by the controller (controller -> datapath).
#[derive(Debug, Clone, PartialEq)]
pub struct PacketOut {
    /// ID assigned by datapath (`OFP_NO_BUFFER` if none).
    pub buffer_id: u32,
    /// Packet's input port (`OFPP_NONE` if none).
    pub in_port: u16,
    pub actions: Vec<OfpAction>,
    /// Packet data. Only meaningful if `buffer_id` is `OFP_NO_BUFFER`.
    pub data: Vec<u8>,
}

/// Command of a flow modification
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpFlowModCommand {
    /// New flow.
    Add = 0,
    /// Modify all matching flows.
    Modify = 1,
    /// Modify entry strictly matching wildcards.
    ModifyStrict = 2,
    /// Delete all matching flows.
    Delete = 3,
    /// Strictly match wildcards and priority.
    DeleteStrict = 4,
}

/// Flow setup and teardown (controller -> datapath).
#[derive(Debug, Clone, PartialEq)]
pub struct FlowMod {
    /// Fields to match.
    pub match_field: OfpMatch,
    /// Opaque controller-issued identifier.
    pub cookie: u64,
    pub command: OfpFlowModCommand,
    /// Idle time before discarding (seconds).
    pub idle_timeout: u16,
    /// Max time before discarding (seconds).
    pub hard_timeout: u16,
    /// Priority level of flow entry.
    pub priority: u16,
    /// Buffered packet to apply to, or `OFP_NO_BUFFER`.
    pub buffer_id: u32,
    /// For delete commands, require matching entries to include this as an output port.
    /// `OFPP_NONE` indicates no restriction.
    pub out_port: u16,
    /// One of OFPFF_*.
    pub flags: u16,
    pub actions: Vec<OfpAction>,
}

/// Why is this packet being sent to the controller?
#[derive(Debug, Clone, Copy)]
pub enum OfpPacketInReason {
    /// No matching flow.
    NoMatch = 0,
    /// Action explicitly output to controller.
    Action = 1,
}

/// Packet received on port (datapath -> controller).
#[derive(Debug, Clone, PartialEq)]
pub struct PacketIn {
    pub transaction_id: u32,
    /// ID assigned by datapath.
    /// `OFP_NO_BUFFER` if the packet is not buffered and `data` is authoritative.
    pub buffer_id: u32,
    /// Full length of frame. May exceed `data.len()` when the frame was truncated.
    pub total_len: u16,
    /// Port on which frame was received.
    pub in_port: u16,
    /// Reason packet is being sent (one of OFPR_*)
    pub reason: u8,
    /// The captured bytes of the frame
    pub data: Vec<u8>,
}

impl PacketIn {
    /// Checks if the switch buffered the frame
    pub fn is_buffered(&self) -> bool {
        self.buffer_id != OFP_NO_BUFFER
    }
}

/// Why was this flow removed?
#[derive(Debug, Clone, Copy)]
pub enum OfpFlowRemovedReason {
    /// Flow idle time exceeded idle_timeout.
    IdleTimeout = 0,
    /// Time exceeded hard_timeout.
    HardTimeout = 1,
    /// Evicted by a DELETE flow mod.
    Delete = 2,
}

/// Flow removed (datapath -> controller).
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRemoved {
    pub transaction_id: u32,
    /// Description of fields.
    pub match_field: OfpMatch,
    /// Opaque controller-issued identifier.
    pub cookie: u64,
    /// Priority level of flow entry.
    pub priority: u16,
    /// One of OFPRR_*.
    pub reason: u8,
    /// Time flow was alive in seconds.
    pub duration_sec: u32,
    /// Time flow was alive in nanoseconds beyond duration_sec.
    pub duration_nsec: u32,
    /// Idle timeout from original flow mod.
    pub idle_timeout: u16,
    pub packet_count: u64,
    pub byte_count: u64,
}

/// What changed about the physical port
#[derive(Debug, Clone, Copy)]
pub enum OfpPortReason {
    /// The port was added.
    Add = 0,
    /// The port was removed.
    Delete = 1,
    /// Some attribute of the port has changed.
    Modify = 2,
}

/// A physical port has changed in the datapath
#[derive(Debug, Clone, PartialEq)]
pub struct OfpPortStatus {
    /// One of OFPPR_*.
    pub reason: u8,
    pub desc: PhyPort,
}

/// Values for 'type' in `OfpErrorMsg`. These values are immutable: they will
/// not change in future versions of the protocol (although new values may be added).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpErrorType {
    /// Hello protocol failed.
    HelloFailed = 0,
    /// Request was not understood.
    BadRequest = 1,
    /// Error in action description.
    BadAction = 2,
    /// Problem modifying flow entry.
    FlowModFailed = 3,
    /// Port mod request failed.
    PortModFailed = 4,
    /// Queue operation failed.
    QueueOpFailed = 5,
}

impl OfpErrorType {
    /// Maps the wire value onto the recognized error types
    pub fn from_u16(typ: u16) -> Option<OfpErrorType> {
        match typ {
            0 => Some(OfpErrorType::HelloFailed),
            1 => Some(OfpErrorType::BadRequest),
            2 => Some(OfpErrorType::BadAction),
            3 => Some(OfpErrorType::FlowModFailed),
            4 => Some(OfpErrorType::PortModFailed),
            5 => Some(OfpErrorType::QueueOpFailed),
            _ => None,
        }
    }
}

/// Error message (datapath -> controller).
#[derive(Debug, Clone, PartialEq)]
pub struct OfpErrorMsg {
    pub typ: u16,
    pub code: u16,
    /// Variable-length data. Interpreted based on the type and code.
    /// `None` if the type is not recognized.
    pub data: Option<Vec<u8>>,
}

/// Vendor extension.
#[derive(Debug, Clone, PartialEq)]
pub struct OfpVendor {
    /// Vendor ID:
    /// - MSB 0: low-order bytes are IEEE OUI.
    /// - MSB != 0: defined by OpenFlow consortium.
    pub vendor: u32,
    /// Vendor-defined arbitrary additional data.
    pub data: Vec<u8>,
}

/// An OpenFlow Echo Request
#[derive(Debug)]
pub struct OfpEchoRequest {
    arbitrary: Vec<u8>,
}

/// An OpenFlow Echo Reply
#[derive(Debug)]
pub struct OfpEchoReply {
    arbitrary: Vec<u8>,
}

impl OfpEchoReply {
    /// Gets the message's content
    pub fn arbitrary(&self) -> &[u8] {
        &self.arbitrary
    }
}

/* ## ---------------------- ## */
/* ## OpenFlow Statistics.   ## */
/* ## ---------------------- ## */

/// The kind of statistics in a stats request or reply
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpStatsType {
    /// Description of this OpenFlow switch.
    Desc = 0,
    /// Individual flow statistics.
    Flow = 1,
    /// Aggregate flow statistics.
    Aggregate = 2,
    /// Flow table statistics.
    Table = 3,
    /// Physical port statistics.
    Port = 4,
    /// Queue statistics for a port.
    Queue = 5,
    /// Vendor extension.
    Vendor = 0xffff,
}

/// Statistics request (controller -> datapath).
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRequest {
    /// One of the OfpStatsType constants.
    pub typ: u16,
    /// OFPSF_REQ_* flags (none yet defined).
    pub flags: u16,
    /// Body of the request, already in network byte order.
    pub body: Vec<u8>,
}

/// Body of reply to OFPST_DESC request.
#[derive(Debug, Clone, PartialEq)]
pub struct DescStats {
    /// Manufacturer description.
    pub mfr_desc: String,
    /// Hardware description.
    pub hw_desc: String,
    /// Software description.
    pub sw_desc: String,
    /// Serial number.
    pub serial_num: String,
    /// Human readable description of datapath.
    pub dp_desc: String,
}

/// Body of reply to OFPST_FLOW request.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowStats {
    /// ID of table flow came from.
    pub table_id: u8,
    /// Description of fields.
    pub match_field: OfpMatch,
    /// Time flow has been alive in seconds.
    pub duration_sec: u32,
    /// Time flow has been alive in nanoseconds beyond duration_sec.
    pub duration_nsec: u32,
    /// Priority of the entry. Only meaningful when this is not an exact-match entry.
    pub priority: u16,
    /// Number of seconds idle before expiration.
    pub idle_timeout: u16,
    /// Number of seconds before expiration.
    pub hard_timeout: u16,
    /// Opaque controller-issued identifier.
    pub cookie: u64,
    /// Number of packets in flow.
    pub packet_count: u64,
    /// Number of bytes in flow.
    pub byte_count: u64,
    /// Actions.
    pub actions: Vec<OfpAction>,
}

/// Body of reply to OFPST_AGGREGATE request.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateStats {
    /// Number of packets in flows.
    pub packet_count: u64,
    /// Number of bytes in flows.
    pub byte_count: u64,
    /// Number of flows.
    pub flow_count: u32,
}

/// Body of reply to OFPST_TABLE request.
#[derive(Debug, Clone, PartialEq)]
pub struct TableStats {
    /// Identifier of table. Lower numbered tables are consulted first.
    pub table_id: u8,
    pub name: String,
    /// Bitmap of OFPFW_* wildcards that are supported by the table.
    pub wildcards: u32,
    /// Max number of entries supported.
    pub max_entries: u32,
    /// Number of active entries.
    pub active_count: u32,
    /// Number of packets looked up in table.
    pub lookup_count: u64,
    /// Number of packets that hit table.
    pub matched_count: u64,
}

/// Body of reply to OFPST_PORT request. If a counter is unsupported, set
/// the field to all ones.
#[derive(Debug, Clone, PartialEq)]
pub struct PortStats {
    pub port_no: u16,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_frame_err: u64,
    pub rx_over_err: u64,
    pub rx_crc_err: u64,
    pub collisions: u64,
}

/// Body of reply to OFPST_QUEUE request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStats {
    pub port_no: u16,
    pub queue_id: u32,
    /// Number of transmitted bytes.
    pub tx_bytes: u64,
    /// Number of transmitted packets.
    pub tx_packets: u64,
    /// Number of packets dropped due to overrun.
    pub tx_errors: u64,
}

/// The decoded body of a stats reply
#[derive(Debug, Clone, PartialEq)]
pub enum StatsReplyBody {
    Desc(DescStats),
    Flow(Vec<FlowStats>),
    Aggregate(AggregateStats),
    Table(Vec<TableStats>),
    Port(Vec<PortStats>),
    Queue(Vec<QueueStats>),
    Vendor { vendor: u32, data: Vec<u8> },
}

/// Statistics reply (datapath -> controller).
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReply {
    /// One of the OfpStatsType constants.
    pub typ: u16,
    /// OFPSF_REPLY_* flags.
    pub flags: u16,
    pub body: StatsReplyBody,
}

/* ## ---------------------- ## */
/* ## OpenFlow Queues.       ## */
/* ## ---------------------- ## */

/// The property type of a queue
pub enum OfpQueueProperties {
    /// No property defined for queue (default).
    None = 0,
    /// Minimum datarate guaranteed.
    MinRate = 1,
}

/// One property of a packet queue
#[derive(Debug, Clone, PartialEq)]
pub enum QueueProperty {
    None,
    /// In 1/10 of a percent; >1000 -> disabled.
    MinRate(u16),
    Unknown { property: u16, body: Vec<u8> },
}

/// Full description for a queue.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketQueue {
    /// id for the specific queue.
    pub queue_id: u32,
    /// List of properties.
    pub properties: Vec<QueueProperty>,
}

/// Query for port queue configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueGetConfigRequest {
    /// Port to be queried. Should refer to a valid physical port (i.e. < `OFPP_MAX`)
    pub port: u16,
}

/// Queue configuration for a given port.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueGetConfigReply {
    pub port: u16,
    /// List of configured queues.
    pub queues: Vec<PacketQueue>,
}
