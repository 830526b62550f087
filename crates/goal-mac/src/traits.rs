//! Collaborator seams toward the PHY and the mobility model.

use core::time::Duration;

use goal_core::geometry::Vec3;

/// Current state of the acoustic transducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyStatus {
    Idle,
    Sending,
    Receiving,
    Sleeping,
}

/// Physical-layer control surface the MAC depends on.
pub trait Phy {
    fn status(&self) -> PhyStatus;

    /// Wake the transducer from sleep.
    fn power_on(&mut self);

    /// Abort an in-progress reception for `duration` so a send can start.
    fn interrupt_reception(&mut self, duration: Duration);

    /// Time a frame of `size` bytes occupies the channel.
    fn tx_time(&self, size: usize) -> Duration;
}

/// Position provider for the node this MAC instance runs on.
pub trait Mobility {
    fn current_position(&self) -> Vec3;
}
