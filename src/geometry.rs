// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Affine maps of the plane.  As with the complex plane of a fractal,
//! we don't need a separate point type: a single complex number is a
//! point, with the real part as x and the imaginary part as y.

use num::Complex;
use std::ops::Mul;

/// A point or vector in the plane.
pub type Vec2 = Complex<f32>;

/// An affine map, stored as the images of the two unit vectors plus
/// the image of the origin.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Affine2 {
    /// Image of the x unit vector.
    pub x: Vec2,
    /// Image of the y unit vector.
    pub y: Vec2,
    /// Image of the origin.
    pub origin: Vec2,
}

impl Default for Affine2 {
    fn default() -> Self {
        Affine2::identity()
    }
}

impl Affine2 {
    /// The map that leaves every point where it is.
    pub fn identity() -> Affine2 {
        Affine2 {
            x: Complex::new(1.0, 0.0),
            y: Complex::new(0.0, 1.0),
            origin: Complex::new(0.0, 0.0),
        }
    }

    /// Scales x and y independently, then moves the origin to `origin`.
    pub fn scale_offset(sx: f32, sy: f32, origin: Vec2) -> Affine2 {
        Affine2 {
            x: Complex::new(sx, 0.0),
            y: Complex::new(0.0, sy),
            origin,
        }
    }

    /// Counter-clockwise rotation by `phi` radians about the origin.
    pub fn rotation(phi: f32) -> Affine2 {
        let (s, c) = phi.sin_cos();
        Affine2 {
            x: Complex::new(c, s),
            y: Complex::new(-s, c),
            origin: Complex::new(0.0, 0.0),
        }
    }

    /// Maps a vector; the translation part does not apply.
    #[inline]
    pub fn apply_vector(&self, v: Vec2) -> Vec2 {
        self.x * v.re + self.y * v.im
    }

    /// Maps a point.
    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        self.origin + self.apply_vector(p)
    }
}

/// Composition: `(t * u).apply(p) == t.apply(u.apply(p))`.
impl Mul for Affine2 {
    type Output = Affine2;

    fn mul(self, u: Affine2) -> Affine2 {
        Affine2 {
            x: self.apply_vector(u.x),
            y: self.apply_vector(u.y),
            origin: self.apply(u.origin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).norm() < 1e-5
    }

    #[test]
    fn identity_leaves_points_alone() {
        let p = Complex::new(3.5, -2.0);
        assert_eq!(Affine2::identity().apply(p), p);
    }

    #[test]
    fn scale_offset_maps_on_mixed_planes() {
        let m = Affine2::scale_offset(0.5, 0.25, Complex::new(-2.0, -2.0));
        assert_eq!(m.apply(Complex::new(0.0, 0.0)), Complex::new(-2.0, -2.0));
        assert_eq!(m.apply(Complex::new(4.0, 8.0)), Complex::new(0.0, 0.0));
        assert_eq!(m.apply(Complex::new(8.0, 16.0)), Complex::new(2.0, 2.0));
    }

    #[test]
    fn quarter_turn_rotates_counter_clockwise() {
        let m = Affine2::rotation(PI / 2.0);
        assert!(close(m.apply(Complex::new(1.0, 0.0)), Complex::new(0.0, 1.0)));
        assert!(close(m.apply(Complex::new(0.0, 1.0)), Complex::new(-1.0, 0.0)));
    }

    #[test]
    fn vectors_skip_the_translation() {
        let m = Affine2 {
            origin: Complex::new(5.0, 5.0),
            ..Affine2::rotation(1.0)
        };
        let v = Complex::new(1.0, 2.0);
        assert!(close(m.apply(v) - m.apply_vector(v), Complex::new(5.0, 5.0)));
    }

    #[test]
    fn composition_applies_right_hand_side_first() {
        let scale = Affine2::scale_offset(2.0, 2.0, Complex::new(1.0, 0.0));
        let turn = Affine2::rotation(PI);
        let p = Complex::new(1.0, 1.0);

        // scale first: (3, 2), then a half turn: (-3, -2)
        assert!(close((turn * scale).apply(p), Complex::new(-3.0, -2.0)));
        // half turn first: (-1, -1), then scale: (-1, -2)
        assert!(close((scale * turn).apply(p), Complex::new(-1.0, -2.0)));
    }
}
