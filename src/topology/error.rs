use crate::buffer;
use crate::transport;

use std::error;
use std::fmt;
use std::result;

#[derive(Debug)]
pub enum Error {
    Buffer(buffer::Error),
    /// A query response that is not a sequence of whole records
    NotAMultiple { record: usize, body: usize },
    /// A single record message of the wrong size
    BadLength { expected: usize, received: usize },
    /// A tag that does not belong on the channel it arrived on
    UnexpectedTag(u16),
    AlreadyInitialized,
    NotInitialized,
    Finalized,
    Transport(transport::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Buffer(ref e) => write!(f, "{}", e),
            Error::NotAMultiple { record, body } => write!(
                f,
                "Body of {} bytes is not a sequence of {} byte records",
                body, record
            ),
            Error::BadLength { expected, received } => {
                write!(f, "Expected {} bytes but received {}", expected, received)
            }
            Error::UnexpectedTag(tag) => write!(f, "Unexpected topology message {:#06x}", tag),
            Error::AlreadyInitialized => write!(f, "Topology client is already initialized"),
            Error::NotInitialized => write!(f, "Topology client is not initialized"),
            Error::Finalized => write!(f, "Topology client is finalized"),
            Error::Transport(ref e) => write!(f, "{}", e),
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "topology client error"
    }
}

impl From<buffer::Error> for Error {
    fn from(e: buffer::Error) -> Self {
        Error::Buffer(e)
    }
}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Error::Transport(e)
    }
}

pub type Result<T> = result::Result<T, Error>;
