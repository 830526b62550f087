//! 3-D geometry for vector-based forwarding decisions.

use core::fmt;

/// A position in the 3-D deployment volume, in meters.
#[derive(Clone, Copy, PartialEq, Default)]
#[must_use]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn dist(&self, other: Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Perpendicular distance from this point to the line through `p1`
    /// and `p2`, via the law of cosines on the triangle (p1, p2, self).
    ///
    /// Degenerates to the distance to `p1` when `p1 == p2` or when this
    /// point coincides with `p1`.
    #[must_use]
    pub fn dist_to_line(&self, p1: Vec3, p2: Vec3) -> f64 {
        let a = p1.dist(*self);
        let b = p1.dist(p2);
        let c = self.dist(p2);
        if a == 0.0 || b == 0.0 {
            return a;
        }
        let cos_theta = (a * a + b * b - c * c) / (2.0 * a * b);
        // Clamp against rounding excursions outside [-1, 1].
        let cos_theta = cos_theta.clamp(-1.0, 1.0);
        a * (1.0 - cos_theta * cos_theta).sqrt()
    }
}

impl fmt::Debug for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dist() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert_eq!(a.dist(b), 5.0);
        assert_eq!(b.dist(a), 5.0);
        assert_eq!(a.dist(a), 0.0);
    }

    #[test]
    fn test_dist_to_line_perpendicular() {
        // Line along x axis; point 7 above it.
        let p = Vec3::new(5.0, 7.0, 0.0);
        let d = p.dist_to_line(Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0));
        assert!((d - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_dist_to_line_point_on_line() {
        let p = Vec3::new(4.0, 0.0, 0.0);
        let d = p.dist_to_line(Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0));
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn test_dist_to_line_degenerate() {
        let p = Vec3::new(3.0, 4.0, 0.0);
        let q = Vec3::new(0.0, 0.0, 0.0);
        // p1 == p2: falls back to distance to p1.
        assert_eq!(p.dist_to_line(q, q), 5.0);
        // point == p1: zero.
        assert_eq!(p.dist_to_line(p, q), 0.0);
    }
}
