/*!
The core of an OpenFlow 1.0 application.

Switch daemons and a topology daemon talk to the application through a
tag-addressed message transport. This crate decodes what arrives, hands it
to the callbacks an application registered and correlates replies with the
requests that caused them. The transport itself is not part of the crate,
it is plugged in through the `transport::Transport` trait.
*/

#[macro_use]
extern crate log;

pub mod bootstrap;
pub mod buffer;
pub mod conf;
pub mod controller;
pub mod openflow;
pub mod stats;
pub mod topology;
pub mod transaction;
pub mod transport;

pub use crate::controller::Controller;
pub use crate::openflow::handler::{EventKind, Handler};
