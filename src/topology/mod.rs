/*!
Client of the topology service

The client issues requests to the topology daemon and correlates the
replies through a `TransactionTable`. Once subscribed, the daemon pushes
link, port and switch status notifications which are handed to the
registered `Handler`s. The daemon also pings its clients, which are
answered with the client's service name.
*/

pub mod error;
pub mod messages;

pub use self::error::{Error, Result};

use self::messages::*;
use crate::bootstrap::{ensure_daemon, DaemonLauncher, RetryPolicy, ServiceNames};
use crate::openflow::handler::{EventKind, Handler, Handlers};
use crate::transaction::TransactionTable;
use crate::transport::{check_register, check_send, Channel, RequestHandle, Transport};

use std::fmt;
use std::process;
use std::rc::Rc;
use std::time::{Duration, Instant};

const CHANNELS: [Channel; 3] = [Channel::Received, Channel::Requested, Channel::Replied];

enum State {
    Uninitialized,
    Initialized(ServiceNames),
    /// Terminal, a finalized client cannot be initialized again
    Finalized,
}

/// What to do once the reply to a request arrives
pub enum Pending {
    Status(Box<dyn FnOnce(ResponseStatus)>),
    LinkStatus(Box<dyn FnOnce(&[LinkStatus])>),
    PortStatus(Box<dyn FnOnce(&[PortStatus])>),
    SwitchStatus(Box<dyn FnOnce(&[SwitchStatus])>),
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            Pending::Status(_) => "Status",
            Pending::LinkStatus(_) => "LinkStatus",
            Pending::PortStatus(_) => "PortStatus",
            Pending::SwitchStatus(_) => "SwitchStatus",
        };
        write!(f, "Pending::{}", name)
    }
}

pub struct TopologyClient {
    base: String,
    pid: u32,
    state: State,
    subscribed: bool,
    transport: Rc<dyn Transport>,
    transactions: TransactionTable<Pending>,
    launcher: Option<Box<dyn DaemonLauncher>>,
    retry: RetryPolicy,
}

impl TopologyClient {
    /// Constructs an uninitialized client for the service `base`
    pub fn new(base: &str, transport: Rc<dyn Transport>) -> TopologyClient {
        TopologyClient {
            base: base.to_string(),
            pid: process::id(),
            state: State::Uninitialized,
            subscribed: false,
            transport,
            transactions: TransactionTable::new(),
            launcher: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Lets `init` make sure the daemon runs
    pub fn with_launcher(mut self, launcher: Box<dyn DaemonLauncher>, retry: RetryPolicy) -> Self {
        self.launcher = Some(launcher);
        self.retry = retry;
        self
    }

    pub fn is_initialized(&self) -> bool {
        match self.state {
            State::Initialized(_) => true,
            _ => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// The service names, known once initialized
    pub fn names(&self) -> Option<&ServiceNames> {
        match self.state {
            State::Initialized(ref names) => Some(names),
            _ => None,
        }
    }

    /// Number of requests without a reply
    pub fn outstanding(&self) -> usize {
        self.transactions.len()
    }

    /// Derives the service names, starts the daemon if needed and registers
    /// for inbound messages. A daemon that cannot be started is logged only:
    /// the client keeps working but will not get any replies.
    pub fn init(&mut self) -> Result<()> {
        match self.state {
            State::Uninitialized => {}
            State::Initialized(_) => {
                warn!("Topology client is already initialized");
                return Err(Error::AlreadyInitialized);
            }
            State::Finalized => {
                warn!("Topology client is finalized and cannot be initialized again");
                return Err(Error::Finalized);
            }
        }
        let names = ServiceNames::derive(&self.base, self.pid);
        if let Some(ref mut launcher) = self.launcher {
            if let Err(e) = ensure_daemon(launcher.as_mut(), &names.daemon, self.retry) {
                error!("{}. Requests to {} will not be answered.", e, names.daemon);
            }
        }
        for channel in CHANNELS.iter() {
            let accepted = self.transport.register_callback(*channel, &names.client);
            check_register(accepted, *channel, &names.client)?;
        }
        info!("Topology client {} is initialized", names.client);
        self.state = State::Initialized(names);
        Ok(())
    }

    /// Initializes the client unless that happened before.
    /// Returns whether it was initialized by this call.
    pub fn ensure_initialized(&mut self) -> Result<bool> {
        match self.state {
            State::Uninitialized => self.init().map(|_| true),
            State::Initialized(_) => Ok(false),
            State::Finalized => Err(Error::Finalized),
        }
    }

    /// Unregisters from the transport and drops all outstanding requests
    pub fn finalize(&mut self) -> Result<()> {
        let names = match self.state {
            State::Initialized(ref names) => names.clone(),
            State::Uninitialized => {
                warn!("Topology client is not initialized");
                return Err(Error::NotInitialized);
            }
            State::Finalized => {
                warn!("Topology client is already finalized");
                return Err(Error::Finalized);
            }
        };
        for channel in CHANNELS.iter() {
            if !self.transport.delete_callback(*channel, &names.client) {
                warn!("Cannot delete {:?} callback of {}", channel, names.client);
            }
        }
        let dropped = self.transactions.clear();
        if dropped > 0 {
            info!("Dropped {} unanswered topology requests", dropped);
        }
        self.subscribed = false;
        self.state = State::Finalized;
        info!("Topology client {} is finalized", names.client);
        Ok(())
    }

    /// Records the request and sends it. The record is rolled back if the send fails.
    /// Panics if the client is not initialized.
    fn send_request(&mut self, typ: MessageType, data: &[u8], pending: Pending) -> Result<u32> {
        let names = match self.state {
            State::Initialized(ref names) => names,
            _ => panic!("topology client is not initialized"),
        };
        let xid = self.transactions.next_transaction_id();
        self.transactions.register(xid, typ.tag(), pending);
        let accepted = self
            .transport
            .send_request(&names.daemon, &names.client, typ.tag(), data, xid);
        if let Err(e) = check_send(accepted, typ.tag()) {
            error!("Cannot send {} to {}", typ.name(), names.daemon);
            self.transactions.remove(xid);
            return Err(e.into());
        }
        debug!("Sent {} ({:#x}) to {}", typ.name(), xid, names.daemon);
        Ok(xid)
    }

    fn client_request(&self) -> Vec<u8> {
        match self.state {
            State::Initialized(ref names) => encode_request(&names.client),
            _ => panic!("topology client is not initialized"),
        }
    }

    pub fn subscribe<F: FnOnce(ResponseStatus) + 'static>(&mut self, callback: F) -> Result<u32> {
        let req = self.client_request();
        self.send_request(
            MessageType::SubscribeRequest,
            &req,
            Pending::Status(Box::new(callback)),
        )
    }

    pub fn unsubscribe<F: FnOnce(ResponseStatus) + 'static>(&mut self, callback: F) -> Result<u32> {
        let req = self.client_request();
        self.send_request(
            MessageType::UnsubscribeRequest,
            &req,
            Pending::Status(Box::new(callback)),
        )
    }

    pub fn enable_discovery<F>(&mut self, callback: F) -> Result<u32>
    where
        F: FnOnce(ResponseStatus) + 'static,
    {
        let req = self.client_request();
        self.send_request(
            MessageType::EnableDiscoveryRequest,
            &req,
            Pending::Status(Box::new(callback)),
        )
    }

    pub fn disable_discovery<F>(&mut self, callback: F) -> Result<u32>
    where
        F: FnOnce(ResponseStatus) + 'static,
    {
        let req = self.client_request();
        self.send_request(
            MessageType::DisableDiscoveryRequest,
            &req,
            Pending::Status(Box::new(callback)),
        )
    }

    pub fn get_all_link_status<F>(&mut self, callback: F) -> Result<u32>
    where
        F: FnOnce(&[LinkStatus]) + 'static,
    {
        let req = self.client_request();
        self.send_request(
            MessageType::QueryLinkStatusRequest,
            &req,
            Pending::LinkStatus(Box::new(callback)),
        )
    }

    pub fn get_all_port_status<F>(&mut self, callback: F) -> Result<u32>
    where
        F: FnOnce(&[PortStatus]) + 'static,
    {
        let req = self.client_request();
        self.send_request(
            MessageType::QueryPortStatusRequest,
            &req,
            Pending::PortStatus(Box::new(callback)),
        )
    }

    pub fn get_all_switch_status<F>(&mut self, callback: F) -> Result<u32>
    where
        F: FnOnce(&[SwitchStatus]) + 'static,
    {
        let req = self.client_request();
        self.send_request(
            MessageType::QuerySwitchStatusRequest,
            &req,
            Pending::SwitchStatus(Box::new(callback)),
        )
    }

    /// Pushes a locally learned link status to the daemon
    pub fn set_link_status<F>(&mut self, link: &LinkStatus, callback: F) -> Result<u32>
    where
        F: FnOnce(ResponseStatus) + 'static,
    {
        let mut req = vec![];
        link.encode(&mut req);
        self.send_request(
            MessageType::UpdateLinkStatusRequest,
            &req,
            Pending::Status(Box::new(callback)),
        )
    }

    /// Forgets an outstanding request. Its callback is never invoked,
    /// a late reply is logged and ignored.
    pub fn cancel(&mut self, transaction_id: u32) -> bool {
        match self.transactions.remove(transaction_id) {
            Some(t) => {
                debug!(
                    "Cancelled transaction {:#x} (message type {:#06x})",
                    t.transaction_id, t.message_type
                );
                true
            }
            None => false,
        }
    }

    /// Handles a reply to one of the requests, `context` is its transaction id
    pub fn handle_reply(&mut self, tag: u16, data: &[u8], context: u32) -> Result<()> {
        let typ = MessageType::from_u16(tag).ok_or(Error::UnexpectedTag(tag))?;
        let request = match self.transactions.get(context) {
            Some(t) => MessageType::from_u16(t.message_type),
            None => {
                warn!("No outstanding transaction {:#x}", context);
                return Ok(());
            }
        };
        // a mismatching reply leaves the request outstanding
        if request.and_then(MessageType::response) != Some(typ) {
            warn!("Transaction {:#x} was answered with {}", context, typ.name());
            return Err(Error::UnexpectedTag(tag));
        }
        let transaction = match self.transactions.resolve_and_remove(context) {
            Some(t) => t,
            None => return Ok(()),
        };
        match transaction.pending {
            Pending::Status(callback) => {
                let status = decode_response(data)?;
                self.update_subscription(typ, status);
                callback(status);
            }
            Pending::LinkStatus(callback) => callback(&decode_all::<LinkStatus>(data)?),
            Pending::PortStatus(callback) => callback(&decode_all::<PortStatus>(data)?),
            Pending::SwitchStatus(callback) => callback(&decode_all::<SwitchStatus>(data)?),
        }
        Ok(())
    }

    fn update_subscription(&mut self, typ: MessageType, status: ResponseStatus) {
        match (typ, status) {
            (MessageType::SubscribeResponse, ResponseStatus::Ok) => {
                info!("Subscribed to topology notifications");
                self.subscribed = true;
            }
            (MessageType::SubscribeResponse, ResponseStatus::AlreadySubscribed) => {
                warn!("Already subscribed to topology notifications");
                self.subscribed = true;
            }
            (MessageType::UnsubscribeResponse, ResponseStatus::Ok) => {
                info!("Unsubscribed from topology notifications");
                self.subscribed = false;
            }
            (MessageType::UnsubscribeResponse, ResponseStatus::NoSuchSubscriber) => {
                warn!("Was not subscribed to topology notifications");
                self.subscribed = false;
            }
            (_, ResponseStatus::Ok) => {}
            (_, status) => warn!("{} failed with {:?}", typ.name(), status),
        }
    }

    /// Decodes a status notification and hands it to its handler, if there is one
    pub fn handle_notification(
        &mut self,
        tag: u16,
        data: &[u8],
        handlers: &mut Handlers,
    ) -> Result<()> {
        let typ = MessageType::from_u16(tag).ok_or(Error::UnexpectedTag(tag))?;
        match typ {
            MessageType::LinkStatusNotification => {
                let link = decode_one::<LinkStatus>(data)?;
                trace!("Link status update: {:?}", link);
                if let Some(Handler::LinkStatusUpdated(h)) =
                    handlers.get_handler_mut(EventKind::LinkStatusUpdated)
                {
                    h(&link);
                }
            }
            MessageType::PortStatusNotification => {
                let port = decode_one::<PortStatus>(data)?;
                trace!("Port status update: {:?}", port);
                if let Some(Handler::PortStatusUpdated(h)) =
                    handlers.get_handler_mut(EventKind::PortStatusUpdated)
                {
                    h(&port);
                }
            }
            MessageType::SwitchStatusNotification => {
                let switch = decode_one::<SwitchStatus>(data)?;
                trace!("Switch status update: {:?}", switch);
                if let Some(Handler::SwitchStatusUpdated(h)) =
                    handlers.get_handler_mut(EventKind::SwitchStatusUpdated)
                {
                    h(&switch);
                }
            }
            _ => return Err(Error::UnexpectedTag(tag)),
        }
        Ok(())
    }

    /// Answers requests of the daemon. Only pings are expected.
    pub fn handle_request(&mut self, tag: u16, data: &[u8], handle: RequestHandle) -> Result<()> {
        if MessageType::from_u16(tag) != Some(MessageType::PingRequest) {
            return Err(Error::UnexpectedTag(tag));
        }
        let reply = self.client_request();
        trace!("Ping from {}", decode_request(data)?);
        let tag = MessageType::PingResponse.tag();
        check_send(self.transport.send_reply(handle, tag, &reply), tag)?;
        Ok(())
    }

    /// Logs requests that wait for a reply for longer than `max_age`
    pub fn sweep_stale(&self, now: Instant, max_age: Duration) -> Vec<u32> {
        self.transactions.sweep_stale(now, max_age)
    }
}

impl fmt::Debug for TopologyClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TopologyClient")
            .field("base", &self.base)
            .field("names", &self.names())
            .field("subscribed", &self.subscribed)
            .field("outstanding", &self.transactions.len())
            .finish()
    }
}
