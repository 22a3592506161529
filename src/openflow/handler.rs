/*!
The registry of application callbacks, one per event kind

A callback carries its own context by capturing it. Registering a callback
for a kind that already has one replaces the old one.
*/

use crate::openflow::messages::*;
use crate::topology::messages::{LinkStatus, PortStatus, SwitchStatus};

use std::collections::HashMap;
use std::fmt;

/// Everything an application can register a callback for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SwitchReady,
    SwitchDisconnected,
    Error,
    EchoReply,
    Vendor,
    FeaturesReply,
    GetConfigReply,
    PacketIn,
    FlowRemoved,
    PortStatus,
    StatsReply,
    BarrierReply,
    QueueGetConfigReply,
    ListSwitchesReply,
    LinkStatusUpdated,
    PortStatusUpdated,
    SwitchStatusUpdated,
}

impl EventKind {
    /// The name used for logging and statistics
    pub fn name(self) -> &'static str {
        match self {
            EventKind::SwitchReady => "switch_ready",
            EventKind::SwitchDisconnected => "switch_disconnected",
            EventKind::Error => "error",
            EventKind::EchoReply => "echo_reply",
            EventKind::Vendor => "vendor",
            EventKind::FeaturesReply => "features_reply",
            EventKind::GetConfigReply => "get_config_reply",
            EventKind::PacketIn => "packet_in",
            EventKind::FlowRemoved => "flow_removed",
            EventKind::PortStatus => "port_status",
            EventKind::StatsReply => "stats_reply",
            EventKind::BarrierReply => "barrier_reply",
            EventKind::QueueGetConfigReply => "queue_get_config_reply",
            EventKind::ListSwitchesReply => "list_switches_reply",
            EventKind::LinkStatusUpdated => "link_status_updated",
            EventKind::PortStatusUpdated => "port_status_updated",
            EventKind::SwitchStatusUpdated => "switch_status_updated",
        }
    }
}

/// Kinds that accept two callback signatures: a simple one taking the decoded
/// record and a detailed one taking every field separately.
pub enum CallShape<S: ?Sized, D: ?Sized> {
    Simple(Box<S>),
    Detailed(Box<D>),
}

impl<S: ?Sized, D: ?Sized> fmt::Debug for CallShape<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CallShape::Simple(_) => write!(f, "Simple"),
            CallShape::Detailed(_) => write!(f, "Detailed"),
        }
    }
}

/// `(datapath_id, transaction_id, features)`
pub type FeaturesReplySimple = dyn FnMut(u64, u32, &SwitchFeatures);
/// `(datapath_id, transaction_id, n_buffers, n_tables, capabilities, actions, ports)`
pub type FeaturesReplyDetailed = dyn FnMut(u64, u32, u32, u8, u32, u32, &[PhyPort]);

pub type PacketInSimple = dyn FnMut(u64, &PacketIn);
/// `(datapath_id, transaction_id, buffer_id, total_len, in_port, reason, data)`
pub type PacketInDetailed = dyn FnMut(u64, u32, u32, u16, u16, u8, &[u8]);

pub type FlowRemovedSimple = dyn FnMut(u64, &FlowRemoved);
/// `(datapath_id, transaction_id, match, cookie, priority, reason, duration_sec,
/// duration_nsec, idle_timeout, packet_count, byte_count)`
pub type FlowRemovedDetailed =
    dyn FnMut(u64, u32, &OfpMatch, u64, u16, u8, u32, u32, u16, u64, u64);

/// A registered callback. The variant determines the `EventKind`.
pub enum Handler {
    /// `(datapath_id)`
    SwitchReady(Box<dyn FnMut(u64)>),
    /// `(datapath_id)`
    SwitchDisconnected(Box<dyn FnMut(u64)>),
    /// `(datapath_id, transaction_id, type, code, data)`.
    /// `data` is `None` if the error type is not recognized.
    Error(Box<dyn FnMut(u64, u32, u16, u16, Option<&[u8]>)>),
    /// `(datapath_id, transaction_id, data)`
    EchoReply(Box<dyn FnMut(u64, u32, &[u8])>),
    /// `(datapath_id, transaction_id, vendor, data)`
    Vendor(Box<dyn FnMut(u64, u32, u32, &[u8])>),
    FeaturesReply(CallShape<FeaturesReplySimple, FeaturesReplyDetailed>),
    /// `(datapath_id, transaction_id, flags, miss_send_len)`
    GetConfigReply(Box<dyn FnMut(u64, u32, u16, u16)>),
    PacketIn(CallShape<PacketInSimple, PacketInDetailed>),
    FlowRemoved(CallShape<FlowRemovedSimple, FlowRemovedDetailed>),
    /// `(datapath_id, transaction_id, reason, port)`
    PortStatus(Box<dyn FnMut(u64, u32, u8, &PhyPort)>),
    /// `(datapath_id, transaction_id, type, flags, body)`
    StatsReply(Box<dyn FnMut(u64, u32, u16, u16, &StatsReplyBody)>),
    /// `(datapath_id, transaction_id)`
    BarrierReply(Box<dyn FnMut(u64, u32)>),
    /// `(datapath_id, transaction_id, port, queues)`
    QueueGetConfigReply(Box<dyn FnMut(u64, u32, u16, &[PacketQueue])>),
    /// `(datapath_ids)`
    ListSwitchesReply(Box<dyn FnMut(&[u64])>),
    LinkStatusUpdated(Box<dyn FnMut(&LinkStatus)>),
    PortStatusUpdated(Box<dyn FnMut(&PortStatus)>),
    SwitchStatusUpdated(Box<dyn FnMut(&SwitchStatus)>),
}

impl Handler {
    pub fn kind(&self) -> EventKind {
        match *self {
            Handler::SwitchReady(_) => EventKind::SwitchReady,
            Handler::SwitchDisconnected(_) => EventKind::SwitchDisconnected,
            Handler::Error(_) => EventKind::Error,
            Handler::EchoReply(_) => EventKind::EchoReply,
            Handler::Vendor(_) => EventKind::Vendor,
            Handler::FeaturesReply(_) => EventKind::FeaturesReply,
            Handler::GetConfigReply(_) => EventKind::GetConfigReply,
            Handler::PacketIn(_) => EventKind::PacketIn,
            Handler::FlowRemoved(_) => EventKind::FlowRemoved,
            Handler::PortStatus(_) => EventKind::PortStatus,
            Handler::StatsReply(_) => EventKind::StatsReply,
            Handler::BarrierReply(_) => EventKind::BarrierReply,
            Handler::QueueGetConfigReply(_) => EventKind::QueueGetConfigReply,
            Handler::ListSwitchesReply(_) => EventKind::ListSwitchesReply,
            Handler::LinkStatusUpdated(_) => EventKind::LinkStatusUpdated,
            Handler::PortStatusUpdated(_) => EventKind::PortStatusUpdated,
            Handler::SwitchStatusUpdated(_) => EventKind::SwitchStatusUpdated,
        }
    }

    /* Constructors that let closures infer their argument types */

    pub fn switch_ready<F: FnMut(u64) + 'static>(f: F) -> Handler {
        Handler::SwitchReady(Box::new(f))
    }

    pub fn switch_disconnected<F: FnMut(u64) + 'static>(f: F) -> Handler {
        Handler::SwitchDisconnected(Box::new(f))
    }

    pub fn error<F>(f: F) -> Handler
    where
        F: FnMut(u64, u32, u16, u16, Option<&[u8]>) + 'static,
    {
        Handler::Error(Box::new(f))
    }

    pub fn echo_reply<F: FnMut(u64, u32, &[u8]) + 'static>(f: F) -> Handler {
        Handler::EchoReply(Box::new(f))
    }

    pub fn vendor<F: FnMut(u64, u32, u32, &[u8]) + 'static>(f: F) -> Handler {
        Handler::Vendor(Box::new(f))
    }

    pub fn features_reply<F: FnMut(u64, u32, &SwitchFeatures) + 'static>(f: F) -> Handler {
        Handler::FeaturesReply(CallShape::Simple(Box::new(f)))
    }

    pub fn features_reply_detailed<F>(f: F) -> Handler
    where
        F: FnMut(u64, u32, u32, u8, u32, u32, &[PhyPort]) + 'static,
    {
        Handler::FeaturesReply(CallShape::Detailed(Box::new(f)))
    }

    pub fn get_config_reply<F: FnMut(u64, u32, u16, u16) + 'static>(f: F) -> Handler {
        Handler::GetConfigReply(Box::new(f))
    }

    pub fn packet_in<F: FnMut(u64, &PacketIn) + 'static>(f: F) -> Handler {
        Handler::PacketIn(CallShape::Simple(Box::new(f)))
    }

    pub fn packet_in_detailed<F>(f: F) -> Handler
    where
        F: FnMut(u64, u32, u32, u16, u16, u8, &[u8]) + 'static,
    {
        Handler::PacketIn(CallShape::Detailed(Box::new(f)))
    }

    pub fn flow_removed<F: FnMut(u64, &FlowRemoved) + 'static>(f: F) -> Handler {
        Handler::FlowRemoved(CallShape::Simple(Box::new(f)))
    }

    pub fn flow_removed_detailed<F>(f: F) -> Handler
    where
        F: FnMut(u64, u32, &OfpMatch, u64, u16, u8, u32, u32, u16, u64, u64) + 'static,
    {
        Handler::FlowRemoved(CallShape::Detailed(Box::new(f)))
    }

    pub fn port_status<F: FnMut(u64, u32, u8, &PhyPort) + 'static>(f: F) -> Handler {
        Handler::PortStatus(Box::new(f))
    }

    pub fn stats_reply<F>(f: F) -> Handler
    where
        F: FnMut(u64, u32, u16, u16, &StatsReplyBody) + 'static,
    {
        Handler::StatsReply(Box::new(f))
    }

    pub fn barrier_reply<F: FnMut(u64, u32) + 'static>(f: F) -> Handler {
        Handler::BarrierReply(Box::new(f))
    }

    pub fn queue_get_config_reply<F>(f: F) -> Handler
    where
        F: FnMut(u64, u32, u16, &[PacketQueue]) + 'static,
    {
        Handler::QueueGetConfigReply(Box::new(f))
    }

    pub fn list_switches_reply<F: FnMut(&[u64]) + 'static>(f: F) -> Handler {
        Handler::ListSwitchesReply(Box::new(f))
    }

    pub fn link_status_updated<F: FnMut(&LinkStatus) + 'static>(f: F) -> Handler {
        Handler::LinkStatusUpdated(Box::new(f))
    }

    pub fn port_status_updated<F: FnMut(&PortStatus) + 'static>(f: F) -> Handler {
        Handler::PortStatusUpdated(Box::new(f))
    }

    pub fn switch_status_updated<F: FnMut(&SwitchStatus) + 'static>(f: F) -> Handler {
        Handler::SwitchStatusUpdated(Box::new(f))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Handler::FeaturesReply(ref s) => write!(f, "Handler::FeaturesReply({:?})", s),
            Handler::PacketIn(ref s) => write!(f, "Handler::PacketIn({:?})", s),
            Handler::FlowRemoved(ref s) => write!(f, "Handler::FlowRemoved({:?})", s),
            _ => write!(f, "Handler::{:?}", self.kind()),
        }
    }
}

/// At most one `Handler` per `EventKind`
#[derive(Debug, Default)]
pub struct Handlers {
    handlers: HashMap<EventKind, Handler>,
}

impl Handlers {
    pub fn new() -> Handlers {
        Handlers::default()
    }

    /// Registers `handler` for its kind. Returns the handler it replaces.
    pub fn set_handler(&mut self, handler: Handler) -> Option<Handler> {
        let kind = handler.kind();
        let old = self.handlers.insert(kind, handler);
        if old.is_some() {
            debug!("Replaced the {} handler", kind.name());
        }
        old
    }

    pub fn get_handler(&self, kind: EventKind) -> Option<&Handler> {
        self.handlers.get(&kind)
    }

    pub fn get_handler_mut(&mut self, kind: EventKind) -> Option<&mut Handler> {
        self.handlers.get_mut(&kind)
    }

    pub fn clear_handler(&mut self, kind: EventKind) -> Option<Handler> {
        self.handlers.remove(&kind)
    }

    pub fn is_set(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}
