//! GOAL: a time-slotted, reservation-based MAC for underwater acoustic
//! sensor networks.
//!
//! Channel access is negotiated with a REQUEST → REPLY → DATA → ACK
//! handshake. A node with queued data broadcasts a REQUEST advertising the
//! burst and its future send window; candidate forwarders inside the VBF
//! pipe answer with a REPLY after a geometry-derived backoff, and the
//! fastest replier becomes the next hop. All transmit and receive windows
//! are reserved in a shared schedule so that the long acoustic propagation
//! delay never turns into send/receive or receive/receive collisions.
//!
//! The engine is sans-IO: [`mac::GoalMac`] consumes inbound frames and
//! timer expiries at explicit instants and returns the transmissions and
//! deliveries to perform. One instance owns the complete state of one
//! network interface.

pub mod backoff;
pub mod config;
pub mod error;
pub mod history;
pub mod mac;
pub mod packet;
pub mod queue;
pub mod schedule;
pub mod timer;
pub mod traits;

pub use config::MacConfig;
pub use error::MacError;
pub use mac::{GoalMac, MacEffect};
pub use traits::{Mobility, Phy, PhyStatus};
