/*!
The state of one OpenFlow application

A `Controller` owns the handler registry, the counters and the topology
client of an application. The embedding event loop feeds it whatever the
transport delivers, one message at a time:

* `handle_message` for one-way messages (OpenFlow traffic and topology notifications)
* `handle_request` for requests of peers (topology pings)
* `handle_reply` for replies to requests sent from here
*/

use crate::buffer::Reader;
use crate::conf::Config;
use crate::openflow;
use crate::openflow::handler::{EventKind, Handler, Handlers};
use crate::openflow::Dispatcher;
use crate::stats::Stats;
use crate::topology::messages::{
    LinkStatus, MessageType, PortStatus, ResponseStatus, SwitchStatus,
};
use crate::topology::{self, TopologyClient};
use crate::transaction::TransactionTable;
use crate::transport;
use crate::transport::*;

use std::error;
use std::fmt;
use std::rc::Rc;
use std::result;
use std::time::{Duration, Instant};

const DATAPATH_ID_LENGTH: usize = 8;

const TOPOLOGY_UPDATES: [EventKind; 3] = [
    EventKind::LinkStatusUpdated,
    EventKind::PortStatusUpdated,
    EventKind::SwitchStatusUpdated,
];

/// Decodes the datapath ids of a switch manager reply
fn decode_datapath_ids(data: &[u8]) -> openflow::error::Result<Vec<u64>> {
    if data.len() % DATAPATH_ID_LENGTH != 0 {
        return Err(openflow::error::Error::NotAMultiple {
            record: DATAPATH_ID_LENGTH,
            body: data.len(),
        });
    }
    let mut reader = Reader::new(data);
    let mut ids = Vec::with_capacity(data.len() / DATAPATH_ID_LENGTH);
    while !reader.is_empty() {
        ids.push(reader.read_u64()?);
    }
    Ok(ids)
}

#[derive(Debug)]
pub enum Error {
    AlreadyInitialized,
    NotInitialized,
    Finalized,
    Transport(transport::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::AlreadyInitialized => write!(f, "Application is already initialized"),
            Error::NotInitialized => write!(f, "Application is not initialized"),
            Error::Finalized => write!(f, "Application is finalized"),
            Error::Transport(ref e) => write!(f, "{}", e),
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "application lifecycle error"
    }
}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Error::Transport(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Uninitialized,
    Initialized,
    /// Terminal, like the topology client
    Finalized,
}

pub struct Controller {
    name: String,
    state: State,
    transport: Rc<dyn Transport>,
    handlers: Handlers,
    stats: Stats,
    switch_requests: TransactionTable<()>,
    topology: TopologyClient,
    sweep_interval: Duration,
    stale_after: Duration,
}

impl Controller {
    /// Panics if `name` does not fit into a service name
    pub fn new(name: &str, topology: TopologyClient, transport: Rc<dyn Transport>) -> Controller {
        assert!(
            !name.is_empty() && name.len() + 1 < MESSENGER_SERVICE_NAME_LENGTH,
            "application name '{}' is empty or too long",
            name
        );
        Controller {
            name: name.to_string(),
            state: State::Uninitialized,
            transport,
            handlers: Handlers::new(),
            stats: Stats::new(),
            switch_requests: TransactionTable::new(),
            topology,
            sweep_interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(60),
        }
    }

    /// Sets up an application whose topology client starts the configured daemon on demand
    pub fn from_config(config: &Config, transport: Rc<dyn Transport>) -> Controller {
        let topology = TopologyClient::new(&config.topology.service, transport.clone())
            .with_launcher(Box::new(config.topology.launcher()), config.topology.retry);
        let mut controller = Controller::new(&config.application.name, topology, transport);
        controller.sweep_interval = config.transactions.sweep_interval;
        controller.stale_after = config.transactions.stale_after;
        controller
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.state == State::Initialized
    }

    /// Registers the application's service for messages and replies.
    /// Fails if called more than once.
    pub fn init(&mut self) -> result::Result<(), Error> {
        match self.state {
            State::Uninitialized => {}
            State::Initialized => {
                warn!("Application {} is already initialized", self.name);
                return Err(Error::AlreadyInitialized);
            }
            State::Finalized => {
                warn!("Application {} is finalized and cannot be initialized again", self.name);
                return Err(Error::Finalized);
            }
        }
        for channel in &[Channel::Received, Channel::Replied] {
            check_register(
                self.transport.register_callback(*channel, &self.name),
                *channel,
                &self.name,
            )?;
        }
        self.state = State::Initialized;
        info!("Application {} is initialized", self.name);
        Ok(())
    }

    /// Unregisters everything and forgets outstanding requests
    pub fn finalize(&mut self) -> result::Result<(), Error> {
        match self.state {
            State::Initialized => {}
            State::Uninitialized => {
                warn!("Application {} is not initialized", self.name);
                return Err(Error::NotInitialized);
            }
            State::Finalized => {
                warn!("Application {} is finalized already", self.name);
                return Err(Error::Finalized);
            }
        }
        for channel in &[Channel::Received, Channel::Replied] {
            if !self.transport.delete_callback(*channel, &self.name) {
                warn!("Cannot delete {:?} callback of {}", channel, self.name);
            }
        }
        let dropped = self.switch_requests.clear();
        if dropped > 0 {
            info!("Dropped {} unanswered switch list requests", dropped);
        }
        if self.topology.is_initialized() {
            if let Err(e) = self.topology.finalize() {
                warn!("{}", e);
            }
        }
        self.state = State::Finalized;
        info!("Application {} is finalized", self.name);
        Ok(())
    }

    fn assert_initialized(&self) {
        assert!(
            self.is_initialized(),
            "application {} is not initialized",
            self.name
        );
    }

    /* The handler registry */

    /// Registers `handler` for its kind. Returns the handler it replaces.
    pub fn set_handler(&mut self, handler: Handler) -> Option<Handler> {
        self.handlers.set_handler(handler)
    }

    pub fn get_handler(&self, kind: EventKind) -> Option<&Handler> {
        self.handlers.get_handler(kind)
    }

    pub fn clear_handler(&mut self, kind: EventKind) -> Option<Handler> {
        self.handlers.clear_handler(kind)
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn topology(&self) -> &TopologyClient {
        &self.topology
    }

    /* Inbound */

    /// Handles a one-way message of the switch daemons or the topology daemon
    pub fn handle_message(&mut self, tag: u16, data: &[u8]) {
        if Dispatcher::new(&mut self.handlers, &mut self.stats).dispatch(tag, data) {
            return;
        }
        let typ = match MessageType::from_u16(tag) {
            Some(typ) => typ,
            None => {
                warn!("Ignoring message with unknown tag {:#06x}", tag);
                return;
            }
        };
        match self.topology.handle_notification(tag, data, &mut self.handlers) {
            Ok(()) => self.stats.succeeded(typ.name()),
            Err(e) => {
                warn!("Dropping {}: {}", typ.name(), e);
                self.stats.failed(typ.name());
            }
        }
    }

    pub fn handle_request(&mut self, tag: u16, data: &[u8], handle: RequestHandle) {
        if let Err(e) = self.topology.handle_request(tag, data, handle) {
            warn!("Cannot answer request {:#06x}: {}", tag, e);
        }
    }

    /// Handles a reply, `context` is the transaction id of its request
    pub fn handle_reply(&mut self, tag: u16, data: &[u8], context: u32) {
        if tag == MESSENGER_DUMP_SWITCHES_REPLY {
            self.handle_list_switches_reply(data, context);
        }
        else if let Err(e) = self.topology.handle_reply(tag, data, context) {
            warn!("Dropping topology reply {:#06x}: {}", tag, e);
        }
    }

    fn handle_list_switches_reply(&mut self, data: &[u8], context: u32) {
        if self.switch_requests.resolve_and_remove(context).is_none() {
            return;
        }
        let kind = EventKind::ListSwitchesReply;
        let ids = match decode_datapath_ids(data) {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Dropping switch list: {}", e);
                self.stats.failed(kind.name());
                return;
            }
        };
        debug!("{} switches are connected", ids.len());
        if let Some(Handler::ListSwitchesReply(h)) = self.handlers.get_handler_mut(kind) {
            h(&ids);
        }
        self.stats.succeeded(kind.name());
    }

    /* Outbound */

    /// Sends an encoded OpenFlow message to the switch `datapath_id`.
    /// Panics if `message` is empty or the application is not initialized.
    pub fn send_openflow_message(
        &self,
        datapath_id: u64,
        message: &[u8],
    ) -> result::Result<(), transport::Error> {
        self.assert_initialized();
        assert!(!message.is_empty(), "cannot send an empty OpenFlow message");
        let header = ServiceHeader {
            datapath_id,
            service_name: self.name.clone(),
        };
        let mut data = vec![];
        header.encode(&mut data);
        data.extend_from_slice(message);

        let service = switch_service_name(datapath_id);
        trace!("Sending {} bytes to {}", message.len(), service);
        check_send(
            self.transport.send(&service, MESSENGER_OPENFLOW_MESSAGE, &data),
            MESSENGER_OPENFLOW_MESSAGE,
        )
    }

    /// Asks the switch manager for all connected switches.
    /// The answer goes to the `ListSwitchesReply` handler.
    pub fn send_list_switches_request(&mut self) -> result::Result<u32, transport::Error> {
        self.assert_initialized();
        let xid = self.switch_requests.next_transaction_id();
        self.switch_requests
            .register(xid, MESSENGER_DUMP_SWITCHES_REQUEST, ());
        let accepted = self.transport.send_request(
            SWITCH_MANAGER,
            &self.name,
            MESSENGER_DUMP_SWITCHES_REQUEST,
            &[],
            xid,
        );
        if let Err(e) = check_send(accepted, MESSENGER_DUMP_SWITCHES_REQUEST) {
            error!("Cannot send a switch list request to {}", SWITCH_MANAGER);
            self.switch_requests.remove(xid);
            return Err(e);
        }
        Ok(xid)
    }

    /* Topology, initialized on first use */

    /// Initializes the topology client on first use. If that happens while
    /// status update handlers are registered, it subscribes right away.
    fn prepare_topology(&mut self) -> topology::Result<()> {
        self.assert_initialized();
        let wants_updates = TOPOLOGY_UPDATES.iter().any(|k| self.handlers.is_set(*k));
        if self.topology.ensure_initialized()? && wants_updates {
            info!("Subscribing to topology notifications for the registered handlers");
            self.topology
                .subscribe(|status| debug!("Subscription answered with {:?}", status))?;
        }
        Ok(())
    }

    pub fn subscribe_topology<F>(&mut self, callback: F) -> topology::Result<u32>
    where
        F: FnOnce(ResponseStatus) + 'static,
    {
        self.assert_initialized();
        self.topology.ensure_initialized()?;
        self.topology.subscribe(callback)
    }

    pub fn unsubscribe_topology<F>(&mut self, callback: F) -> topology::Result<u32>
    where
        F: FnOnce(ResponseStatus) + 'static,
    {
        self.assert_initialized();
        self.topology.ensure_initialized()?;
        self.topology.unsubscribe(callback)
    }

    pub fn enable_topology_discovery<F>(&mut self, callback: F) -> topology::Result<u32>
    where
        F: FnOnce(ResponseStatus) + 'static,
    {
        self.prepare_topology()?;
        self.topology.enable_discovery(callback)
    }

    pub fn disable_topology_discovery<F>(&mut self, callback: F) -> topology::Result<u32>
    where
        F: FnOnce(ResponseStatus) + 'static,
    {
        self.prepare_topology()?;
        self.topology.disable_discovery(callback)
    }

    pub fn get_all_link_status<F>(&mut self, callback: F) -> topology::Result<u32>
    where
        F: FnOnce(&[LinkStatus]) + 'static,
    {
        self.prepare_topology()?;
        self.topology.get_all_link_status(callback)
    }

    pub fn get_all_port_status<F>(&mut self, callback: F) -> topology::Result<u32>
    where
        F: FnOnce(&[PortStatus]) + 'static,
    {
        self.prepare_topology()?;
        self.topology.get_all_port_status(callback)
    }

    pub fn get_all_switch_status<F>(&mut self, callback: F) -> topology::Result<u32>
    where
        F: FnOnce(&[SwitchStatus]) + 'static,
    {
        self.prepare_topology()?;
        self.topology.get_all_switch_status(callback)
    }

    pub fn set_link_status<F>(&mut self, link: &LinkStatus, callback: F) -> topology::Result<u32>
    where
        F: FnOnce(ResponseStatus) + 'static,
    {
        self.prepare_topology()?;
        self.topology.set_link_status(link, callback)
    }

    /// Forgets an outstanding topology request
    pub fn cancel_topology_request(&mut self, transaction_id: u32) -> bool {
        self.topology.cancel(transaction_id)
    }

    /// How often the embedding loop is expected to call `sweep_stale_transactions`
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Reports the requests that have waited for longer than the configured
    /// age. Returns how many there are. They stay outstanding.
    pub fn sweep_stale_transactions(&self, now: Instant) -> usize {
        let switches = self.switch_requests.sweep_stale(now, self.stale_after);
        let topology = self.topology.sweep_stale(now, self.stale_after);
        switches.len() + topology.len()
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.name)
            .field("initialized", &self.is_initialized())
            .field("handlers", &self.handlers)
            .field("switch_requests", &self.switch_requests.len())
            .field("topology", &self.topology)
            .finish()
    }
}
