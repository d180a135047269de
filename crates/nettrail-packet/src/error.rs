use thiserror::Error;

/// A packet error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A packet error.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    /// Attempting to create or parse a packet from a buffer which is too
    /// small for the packet header.
    #[error("truncated {0} packet, minimum={1}, provided={2}")]
    Truncated(String, usize, usize),
}
