// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-run lookup tables and the per-frame clock.
//!
//! The crystal is a sum of plane waves travelling in `num_angles`
//! evenly spaced directions.  The direction sines and cosines are
//! computed once, and the waves themselves are evaluated through a
//! cosine table instead of calling `cos` for every sample.  The table
//! lookup has no interpolation: the error of a sample is bounded by
//! the table's step, `2π / num_cosines`.

use batch::F32s;
use geometry::{Affine2, Vec2};
use num::Complex;
use std::f64::consts::PI;

/// Width (and height) of the visible part of the pattern plane.  The
/// image is stretched over it, so the pattern fills any aspect ratio.
pub const WORLD_SCALE: f32 = 150.0;

const INV_TAU: f32 = (1.0 / (2.0 * PI)) as f32;

/// Lookup tables plus the animation clock.  Built once; only `time`
/// changes afterwards, and only between frames.
#[derive(Clone, Debug)]
pub struct Uniforms {
    sincos: Vec<f32>,
    cosines: Vec<f32>,
    /// Animation clock in pattern time units.
    pub time: f64,
    /// Pattern rotation in radians per unit of animation time.
    pub rotation_rate: f32,
}

impl Uniforms {
    /// Builds the direction table for `num_waves` waves and a cosine
    /// table of `num_cosines` samples over one period.  Both counts must
    /// be at least one.
    pub fn new(num_waves: usize, num_cosines: usize) -> Uniforms {
        debug_assert!(num_waves > 0 && num_cosines > 0);

        let step = (2.0 * PI / num_waves as f64) as f32;
        let mut sincos = Vec::with_capacity(2 * num_waves);
        for i in 0..num_waves {
            let theta = i as f32 * step;
            sincos.push(theta.sin());
            sincos.push(theta.cos());
        }

        // One extra sample repeats the first, so an index of exactly
        // num_cosines (see F32s::fract) needs no wrap.
        let step = (2.0 * PI / num_cosines as f64) as f32;
        let mut cosines: Vec<f32> = (0..num_cosines).map(|i| (i as f32 * step).cos()).collect();
        let first = cosines[0];
        cosines.push(first);

        Uniforms {
            sincos,
            cosines,
            time: 0.0,
            rotation_rate: 0.0,
        }
    }

    /// Number of wave directions.
    pub fn num_angles(&self) -> usize {
        self.sincos.len() / 2
    }

    /// Number of cosine samples per period, not counting the wraparound
    /// duplicate.
    pub fn num_cosines(&self) -> usize {
        self.cosines.len() - 1
    }

    /// `(sin θ, cos θ)` pairs, flattened, one pair per direction.
    pub fn sincos_table(&self) -> &[f32] {
        &self.sincos
    }

    /// The cosine samples, `num_cosines() + 1` of them.
    pub fn cosine_table(&self) -> &[f32] {
        &self.cosines
    }

    /// `(sin θ, cos θ)` of direction `a`.
    #[inline(always)]
    pub fn direction(&self, a: usize) -> (f32, f32) {
        (self.sincos[2 * a], self.sincos[2 * a + 1])
    }

    /// The clock folded into one period, `[0, 2π]`.  The kernel adds
    /// this rather than `time`, so the lookup stays in range however
    /// long the animation runs or however fast the clock is.
    pub fn phase(&self) -> f32 {
        self.time.rem_euclid(2.0 * PI) as f32
    }

    /// Approximate `cos(t)` for every lane, negative `t` included.
    /// `|t|` must stay below `2π · 2³¹`, past which the index saturates.
    #[inline(always)]
    pub fn cos_lookup(&self, t: F32s) -> F32s {
        let n = F32s::splat(self.num_cosines() as f32);
        let t = (t * F32s::splat(INV_TAU)).fract() * n;
        F32s::gather(&self.cosines, t.trunc())
    }

    /// Single value version of `cos_lookup`, with identical results.
    pub fn cos_lookup_scalar(&self, t: f32) -> f32 {
        self.cos_lookup(F32s::splat(t)).0[0]
    }
}

/// The two affine maps from pixel space to pattern space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transforms {
    /// Fixed map from pixel coordinates to the centred pattern plane.
    pub inverse_world: Affine2,
    /// Time-dependent rotation of the pattern plane.
    pub rotation: Affine2,
}

impl Transforms {
    /// Stretches a `width` by `height` image over the pattern plane,
    /// with the image centre at the origin.  No rotation.
    pub fn new(width: usize, height: usize) -> Transforms {
        let origin: Vec2 = Complex::new(-0.5 * WORLD_SCALE, -0.5 * WORLD_SCALE);
        Transforms {
            inverse_world: Affine2::scale_offset(
                WORLD_SCALE / width as f32,
                WORLD_SCALE / height as f32,
                origin,
            ),
            rotation: Affine2::identity(),
        }
    }

    /// Pixel space to pattern space: `rotation ∘ inverse_world`.
    pub fn composed(&self) -> Affine2 {
        self.rotation * self.inverse_world
    }
}
