use crate::buffer;

use std::error;
use std::fmt;
use std::result;

/// Everything that makes an inbound OpenFlow message undecodable.
/// None of these leave the dispatch engine.
#[derive(Debug, PartialEq)]
pub enum Error {
    Buffer(buffer::Error),
    /// The message length does not fit the fixed part of its claimed type
    BadLen { typ: u8, len: usize },
    /// The OpenFlow header length disagrees with the received bytes
    LengthMismatch { header: usize, received: usize },
    BadVersion(u8),
    /// A message type that an application does not receive
    BadType(u8),
    /// A body that must be a sequence of fixed size records is not
    NotAMultiple { record: usize, body: usize },
    UnknownStatsType(u16),
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "Deserialization error"
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Buffer(ref e) => write!(f, "{}", e),
            Error::BadLen { typ, len } => {
                write!(f, "Wrong length {} for message of type {}", len, typ)
            }
            Error::LengthMismatch { header, received } => write!(
                f,
                "OpenFlow header announces {} bytes but {} were received",
                header, received
            ),
            Error::BadVersion(v) => write!(f, "Unsupported OpenFlow version {:#x}", v),
            Error::BadType(t) => write!(f, "Unexpected message type {}", t),
            Error::NotAMultiple { record, body } => write!(
                f,
                "Body of {} bytes is not a sequence of {} byte records",
                body, record
            ),
            Error::UnknownStatsType(t) => write!(f, "Unknown stats type {}", t),
        }
    }
}

impl From<buffer::Error> for Error {
    fn from(e: buffer::Error) -> Self {
        Error::Buffer(e)
    }
}

pub type Result<T> = result::Result<T, Error>;
