//! Selective Repeat ARQ sender and receiver engines.
//!
//! The engines implement [`TransportProtocol`] and are driven entirely by
//! the three external events delivered through it: an application message,
//! a packet arrival, and a timer expiry. They never block and own no shared
//! state; the only communication between the two halves is the packets they
//! exchange through the channel.

pub mod checksum;
pub mod receiver;
pub mod sender;
pub mod seq;

pub use receiver::{ReceiverCounters, SrReceiver};
pub use sender::{SenderCounters, SrSender};
pub use sr_lab_abstract::{Packet, SystemContext, TransportProtocol};
