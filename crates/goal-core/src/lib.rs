//! Core value types and wire format for the GOAL underwater acoustic MAC.
//!
//! This crate defines the address/id newtypes, the simulation time base,
//! 3-D geometry helpers, and the frame model with its byte codec. The
//! protocol engine itself lives in `goal-mac`.

pub mod error;
pub mod geometry;
pub mod time;
pub mod types;
pub mod wire;
