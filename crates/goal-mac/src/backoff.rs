//! Vector-based-forwarding backoff computation.
//!
//! The reply delay encodes forwarding quality: nodes close to the
//! source→sink axis and close to the previous sender compute a smaller
//! backoff and therefore answer a REQUEST sooner. Nodes that offer no
//! progress toward the sink, or that sit outside the forwarding pipe,
//! do not contend at all.

use core::time::Duration;

use serde::Deserialize;

use goal_core::geometry::Vec3;

/// Which geometry the backoff uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffKind {
    /// Full VBF: pipe measured from the packet's original source.
    Vbf,
    /// Hop-by-hop VBF: pipe measured from the previous hop only.
    HopByHopVbf,
}

/// Geometry parameters of the backoff computation.
#[derive(Debug, Clone, Copy)]
pub struct BackoffParams {
    /// Maximum VBF delay; scales the geometric term.
    pub max_delay: Duration,
    /// Radius of the forwarding pipe, meters.
    pub pipe_width: f64,
    /// Acoustic transmission radius, meters.
    pub tx_radius: f64,
    /// Sound propagation speed, meters per second.
    pub prop_speed: f64,
}

/// Compute the backoff for a node at `this` evaluating a REQUEST whose
/// data originated at `source`, was last sent from `sender`, and is bound
/// for `sink`. Returns `None` when the node should not contend.
#[must_use]
pub fn compute(
    kind: BackoffKind,
    params: &BackoffParams,
    this: Vec3,
    source: Vec3,
    sender: Vec3,
    sink: Vec3,
) -> Option<Duration> {
    match kind {
        BackoffKind::Vbf => vbf(params, this, source, sender, sink),
        BackoffKind::HopByHopVbf => vbf(params, this, sender, sender, sink),
    }
}

fn vbf(params: &BackoffParams, this: Vec3, source: Vec3, sender: Vec3, sink: Vec3) -> Option<Duration> {
    // No progress toward the sink: not a useful forwarder.
    if sender.dist(sink) < this.dist(sink) {
        return None;
    }

    let angle_term = this.dist_to_line(sender, sink);
    let pipe_term = this.dist_to_line(source, sink);

    if pipe_term > params.pipe_width {
        return None;
    }

    let alpha = pipe_term / params.pipe_width + (params.tx_radius - angle_term) / params.tx_radius;
    let backoff = params.max_delay.as_secs_f64() * alpha.sqrt()
        + 2.0 * (params.tx_radius - sender.dist(this)) / params.prop_speed;

    if backoff <= 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(backoff))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Monotonic progress: any node farther from the sink than the
        /// sender never gets a backoff.
        #[test]
        fn farther_than_sender_never_contends(
            x in -500.0..500.0f64,
            y in -500.0..500.0f64,
            z in -500.0..500.0f64,
        ) {
            let sink = Vec3::new(1000.0, 0.0, 0.0);
            let sender = Vec3::new(200.0, 0.0, 0.0);
            let this = Vec3::new(x, y, z);
            prop_assume!(this.dist(sink) > sender.dist(sink));

            let p = BackoffParams {
                max_delay: Duration::from_secs(2),
                pipe_width: 100.0,
                tx_radius: 100.0,
                prop_speed: 1500.0,
            };
            prop_assert_eq!(
                compute(BackoffKind::Vbf, &p, this, Vec3::default(), sender, sink),
                None
            );
        }
    }
}
