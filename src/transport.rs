/*!
The messaging transport this core is driven by

The transport itself (sockets, framing, the event loop) lives outside of this
crate. It delivers tagged byte buffers to the `Controller` and accepts
outgoing ones through the `Transport` trait.
*/

use crate::buffer::{self, Reader};

use std::error;
use std::fmt;

/// An OpenFlow message wrapped in a `ServiceHeader`
pub const MESSENGER_OPENFLOW_MESSAGE: u16 = 0x6000;
/// A switch daemon accepted a connection
pub const MESSENGER_OPENFLOW_CONNECTED: u16 = 0x6001;
pub const MESSENGER_OPENFLOW_DISCONNECTED: u16 = 0x6002;
/// A switch finished its handshake and can be used
pub const MESSENGER_OPENFLOW_READY: u16 = 0x6003;

pub const MESSENGER_DUMP_SWITCHES_REQUEST: u16 = 0x7000;
pub const MESSENGER_DUMP_SWITCHES_REPLY: u16 = 0x7001;

/// The service that knows all connected switches
pub const SWITCH_MANAGER: &str = "switch_manager";

/// Maximum service name length including the terminating NUL
pub const MESSENGER_SERVICE_NAME_LENGTH: usize = 32;

/// The service name of the switch daemon that manages `datapath_id`
pub fn switch_service_name(datapath_id: u64) -> String {
    format!("switch.{:#x}", datapath_id)
}

/// Identifies an inbound request so that it can be replied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle(pub u64);

/// The kinds of inbound traffic a service can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// One-way messages
    Received,
    /// Requests from peers that expect a reply
    Requested,
    /// Replies to requests this service sent
    Replied,
}

#[derive(Debug)]
pub enum Error {
    /// Sending the message with the given tag failed
    Send(u16),
    /// Registering or deleting the callback failed
    Register(Channel, String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Send(tag) => write!(f, "Failed to send a message with tag {:#06x}", tag),
            Error::Register(channel, ref service) => {
                write!(f, "Failed to (un)register {:?} callback for {}", channel, service)
            }
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "transport error"
    }
}

/// What the core needs from a messaging transport.
/// Every method reports whether the transport accepted the operation.
pub trait Transport {
    fn send(&self, service: &str, tag: u16, data: &[u8]) -> bool;

    /// Sends a request whose reply is delivered with the same `context`
    fn send_request(&self, to: &str, from: &str, tag: u16, data: &[u8], context: u32) -> bool;

    fn send_reply(&self, handle: RequestHandle, tag: u16, data: &[u8]) -> bool;

    fn register_callback(&self, channel: Channel, service: &str) -> bool;

    fn delete_callback(&self, channel: Channel, service: &str) -> bool;
}

/// Converts a transport's boolean answer on a send
pub fn check_send(accepted: bool, tag: u16) -> Result<(), Error> {
    if accepted {
        Ok(())
    }
    else {
        Err(Error::Send(tag))
    }
}

/// Converts a transport's boolean answer on a (de)registration
pub fn check_register(accepted: bool, channel: Channel, service: &str) -> Result<(), Error> {
    if accepted {
        Ok(())
    }
    else {
        Err(Error::Register(channel, service.to_string()))
    }
}

/// Prefix of every OpenFlow carrying transport message
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceHeader {
    pub datapath_id: u64,
    /// The sending (inbound) or replying (outbound) service
    pub service_name: String,
}

impl ServiceHeader {
    /// Splits the header off a transport message.
    /// The name length on the wire includes the terminating NUL.
    pub fn decode<'a>(reader: &mut Reader<'a>) -> buffer::Result<ServiceHeader> {
        let datapath_id = reader.read_u64()?;
        let name_length = reader.read_u16()? as usize;
        let service_name = reader.read_fixed_str(name_length)?;
        Ok(ServiceHeader {
            datapath_id,
            service_name,
        })
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        let name_length = self.service_name.len() + 1;
        buf.extend_from_slice(&self.datapath_id.to_be_bytes());
        buf.extend_from_slice(&(name_length as u16).to_be_bytes());
        buf.extend_from_slice(self.service_name.as_bytes());
        buf.push(0);
    }
}

#[cfg(test)]
pub mod mock {
    //! A transport that records everything instead of sending it

    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Debug, Clone, PartialEq)]
    pub enum Sent {
        Message {
            service: String,
            tag: u16,
            data: Vec<u8>,
        },
        Request {
            to: String,
            from: String,
            tag: u16,
            data: Vec<u8>,
            context: u32,
        },
        Reply {
            handle: RequestHandle,
            tag: u16,
            data: Vec<u8>,
        },
    }

    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        pub sent: RefCell<Vec<Sent>>,
        pub callbacks: RefCell<Vec<(Channel, String)>>,
        pub fail_sends: Cell<bool>,
        pub fail_registrations: Cell<bool>,
    }

    impl RecordingTransport {
        pub fn new() -> RecordingTransport {
            RecordingTransport::default()
        }

        /// The most recently sent request as `(tag, data, context)`
        pub fn last_request(&self) -> Option<(u16, Vec<u8>, u32)> {
            self.sent.borrow().iter().rev().find_map(|s| match *s {
                Sent::Request {
                    tag,
                    ref data,
                    context,
                    ..
                } => Some((tag, data.clone(), context)),
                _ => None,
            })
        }

        pub fn requests(&self) -> usize {
            self.sent
                .borrow()
                .iter()
                .filter(|s| match **s {
                    Sent::Request { .. } => true,
                    _ => false,
                })
                .count()
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, service: &str, tag: u16, data: &[u8]) -> bool {
            if self.fail_sends.get() {
                return false;
            }
            self.sent.borrow_mut().push(Sent::Message {
                service: service.to_string(),
                tag,
                data: data.to_vec(),
            });
            true
        }

        fn send_request(&self, to: &str, from: &str, tag: u16, data: &[u8], context: u32) -> bool {
            if self.fail_sends.get() {
                return false;
            }
            self.sent.borrow_mut().push(Sent::Request {
                to: to.to_string(),
                from: from.to_string(),
                tag,
                data: data.to_vec(),
                context,
            });
            true
        }

        fn send_reply(&self, handle: RequestHandle, tag: u16, data: &[u8]) -> bool {
            if self.fail_sends.get() {
                return false;
            }
            self.sent.borrow_mut().push(Sent::Reply {
                handle,
                tag,
                data: data.to_vec(),
            });
            true
        }

        fn register_callback(&self, channel: Channel, service: &str) -> bool {
            if self.fail_registrations.get() {
                return false;
            }
            self.callbacks
                .borrow_mut()
                .push((channel, service.to_string()));
            true
        }

        fn delete_callback(&self, channel: Channel, service: &str) -> bool {
            let mut callbacks = self.callbacks.borrow_mut();
            let before = callbacks.len();
            callbacks.retain(|(c, s)| !(*c == channel && s == service));
            callbacks.len() < before
        }
    }
}
