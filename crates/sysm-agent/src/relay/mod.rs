//! Outbound link to the upstream collector.

mod channel;
mod link;


pub use channel::{RelayChannel, RelaySender, RelaySink};
pub use link::RelayLink;

pub const RELAY_ID: &str = "relay";

/// Status messages waiting for the socket. Anything beyond this is dropped.
pub const OUTBOUND_CAPACITY: usize = 16;
