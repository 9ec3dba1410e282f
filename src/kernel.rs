// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The crystal itself.
//!
//! A tile is rendered in passes over batches of `LANES` pixels: pixel
//! coordinates, the affine map into pattern space, a radial warp, the
//! interference sum of the plane waves, and finally the mapping from
//! amplitude to a grey level.  Each pixel depends only on its own
//! coordinates and the read-only uniforms, so tiles can be rendered in
//! any order, on any thread.
//!
//! `shade_pixel` computes the same pixel one at a time, doing the same
//! float operations in the same order, and exists to check the batched
//! path against.

use batch::{F32s, I32s, LANES};
use frame::Rgba;
use geometry::Affine2;
use num::Complex;
use scheduler::Rect;
use uniforms::Uniforms;

const WARP_DT: f32 = 0.08;
const WARP_SCALE: f32 = 0.5;
const WARP_EPSILON: f32 = 0.001;
const MAX_LUM: f32 = 255.0;
const OPAQUE: i32 = (255u32 << 24) as i32;

/// Per-worker buffers for the passes over one tile.
#[derive(Debug, Clone)]
pub struct Scratch {
    xs: Vec<F32s>,
    ys: Vec<F32s>,
    amp: Vec<F32s>,
}

impl Scratch {
    /// Buffers for tiles of up to `tile_size` pixels.
    pub fn new(tile_size: usize) -> Scratch {
        let n = tile_size / LANES;
        Scratch {
            xs: vec![F32s::default(); n],
            ys: vec![F32s::default(); n],
            amp: vec![F32s::default(); n],
        }
    }

    fn ensure(&mut self, batches: usize) {
        if self.xs.len() < batches {
            self.xs.resize(batches, F32s::default());
            self.ys.resize(batches, F32s::default());
            self.amp.resize(batches, F32s::default());
        }
    }
}

/// Renders the pixels of `rect` in an image `width` pixels wide into
/// `out`, which holds exactly those pixels.
///
/// `m` maps pixel coordinates to pattern space.  `width`, `rect.offset`
/// and `rect.size` must all be multiples of `LANES`, so that no batch
/// straddles two rows.
pub fn draw_tile(
    us: &Uniforms,
    m: &Affine2,
    width: usize,
    rect: Rect,
    out: &mut [Rgba],
    scratch: &mut Scratch,
) {
    debug_assert_eq!(out.len(), rect.size);
    debug_assert_eq!(width % LANES, 0);
    debug_assert_eq!(rect.offset % LANES, 0);
    debug_assert_eq!(rect.size % LANES, 0);

    let n = rect.size / LANES;
    scratch.ensure(n);
    let xs = &mut scratch.xs[..n];
    let ys = &mut scratch.ys[..n];
    let amp = &mut scratch.amp[..n];

    pixel_coords(width, rect.offset, xs, ys);
    transform_points(m, xs, ys);
    warp_points(xs, ys);
    amplitudes(us, xs, ys, amp);
    shade(amp, out);
}

/// One pixel of the crystal, computed without batching.
pub fn shade_pixel(us: &Uniforms, m: &Affine2, x: usize, y: usize) -> Rgba {
    let p = m.apply(Complex::new(x as f32, y as f32));
    let (wx, wy) = warp_point(p.re, p.im);

    let time = us.phase();
    let mut amp = us.num_angles() as f32;
    for a in 0..us.num_angles() {
        let (sin, cos) = us.direction(a);
        let mut t = time;
        t += wx * sin;
        t += wy * cos;
        amp += us.cos_lookup_scalar(t);
    }

    let lum = luminance(F32s::splat(amp * 0.5).fract_positive()).0[0] as u8;
    Rgba::new(lum, lum, lum, 255)
}

/// A whole `width` by `height` frame, one `shade_pixel` at a time.
pub fn render_reference(us: &Uniforms, m: &Affine2, width: usize, height: usize) -> Vec<Rgba> {
    iproduct!(0..height, 0..width)
        .map(|(y, x)| shade_pixel(us, m, x, y))
        .collect()
}

/// The smooth cubic `t²(3 - 2t)`, scaled to a channel value.  Maps 0 to
/// 0 and 1 to 255.
#[inline(always)]
pub fn luminance(t: F32s) -> I32s {
    let curve = t * t * (F32s::splat(3.0) - F32s::splat(2.0) * t);
    (curve * F32s::splat(MAX_LUM)).trunc()
}

/// The radial warp of a single point of pattern space.
///
/// The point is pushed outwards by `d = r/2 + cos(0.4r)/100`, where `r`
/// is its distance from the origin in a plane squeezed by 7 along x and
/// by 2 along y, and the result is scaled down.
#[inline]
pub fn warp_point(x: f32, y: f32) -> (f32, f32) {
    let (sx, sy) = (x / 7.0, y / 2.0);
    let r = (sx * sx + sy * sy).sqrt();
    let d = r * 0.5 + (r * 0.4).cos() * 0.01;
    let inv_r = 1.0 / (r + WARP_EPSILON);
    let fx = d * inv_r * x;
    let fy = d * inv_r * y;
    ((x + fx * WARP_DT) * WARP_SCALE, (y + fy * WARP_DT) * WARP_SCALE)
}

fn pixel_coords(width: usize, offset: usize, xs: &mut [F32s], ys: &mut [F32s]) {
    let mut row = offset / width;
    let mut col = offset % width;
    for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
        *x = F32s::ramp(col as f32);
        *y = F32s::splat(row as f32);
        col += LANES;
        if col == width {
            col = 0;
            row += 1;
        }
    }
}

fn transform_points(m: &Affine2, xs: &mut [F32s], ys: &mut [F32s]) {
    let (m11, m12) = (F32s::splat(m.x.re), F32s::splat(m.y.re));
    let (m21, m22) = (F32s::splat(m.x.im), F32s::splat(m.y.im));
    let (x_off, y_off) = (F32s::splat(m.origin.re), F32s::splat(m.origin.im));

    for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
        let (vx, vy) = (*x, *y);
        *x = vx * m11 + vy * m12 + x_off;
        *y = vx * m21 + vy * m22 + y_off;
    }
}

fn warp_points(xs: &mut [F32s], ys: &mut [F32s]) {
    for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
        for i in 0..LANES {
            let (wx, wy) = warp_point(x.0[i], y.0[i]);
            x.0[i] = wx;
            y.0[i] = wy;
        }
    }
}

fn amplitudes(us: &Uniforms, xs: &[F32s], ys: &[F32s], amp: &mut [F32s]) {
    let base = F32s::splat(us.num_angles() as f32);
    for a in amp.iter_mut() {
        *a = base;
    }

    let time = F32s::splat(us.phase());
    for a in 0..us.num_angles() {
        let (sin, cos) = us.direction(a);
        let (scale_x, scale_y) = (F32s::splat(sin), F32s::splat(cos));
        for ((x, y), amp) in xs.iter().zip(ys).zip(amp.iter_mut()) {
            let mut t = time;
            t += *x * scale_x;
            t += *y * scale_y;
            *amp += us.cos_lookup(t);
        }
    }
}

// Amplitudes are at least zero: the baseline is one per wave and each
// wave adds at least -1.
fn shade(amp: &[F32s], out: &mut [Rgba]) {
    let half = F32s::splat(0.5);
    let alpha = I32s::splat(OPAQUE);
    for (a, pixels) in amp.iter().zip(out.chunks_mut(LANES)) {
        let lum = luminance((*a * half).fract_positive());
        let grey = lum | (lum << 8) | (lum << 16) | alpha;
        for (p, bits) in pixels.iter_mut().zip(grey.to_bits().iter()) {
            *p = Rgba(*bits);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uniforms::Transforms;

    fn uniforms(time: f64) -> Uniforms {
        let mut us = Uniforms::new(7, 1024);
        us.time = time;
        us
    }

    fn draw_frame(us: &Uniforms, m: &Affine2, width: usize, height: usize, tile: usize) -> Vec<Rgba> {
        let tiles = (width * height + tile - 1) / tile;
        let mut out = vec![Rgba::default(); tiles * tile];
        let mut scratch = Scratch::new(tile);
        for (i, chunk) in out.chunks_mut(tile).enumerate() {
            let rect = Rect {
                offset: i * tile,
                size: tile,
            };
            draw_tile(us, m, width, rect, chunk, &mut scratch);
        }
        out.truncate(width * height);
        out
    }

    #[test]
    fn luminance_maps_the_ends_exactly() {
        let lum = luminance(F32s([0.0, 1.0, 0.5, 0.25]));
        assert_eq!(lum, I32s([0, 255, 127, 39]));
    }

    #[test]
    fn warp_keeps_the_origin_and_stretches_far_points() {
        assert_eq!(warp_point(0.0, 0.0), (0.0, 0.0));
        let (x, y) = warp_point(700.0, 0.0);
        assert!((x - 364.0).abs() < 0.1, "got {}", x);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn coordinates_follow_rows_from_mid_row_offsets() {
        let mut xs = vec![F32s::default(); 4];
        let mut ys = vec![F32s::default(); 4];
        pixel_coords(8, 4, &mut xs, &mut ys);
        let firsts: Vec<(f32, f32)> = xs.iter().zip(&ys).map(|(x, y)| (x.0[0], y.0[3])).collect();
        assert_eq!(firsts, vec![(4.0, 0.0), (0.0, 1.0), (4.0, 1.0), (0.0, 2.0)]);
        assert_eq!(xs[0], F32s([4.0, 5.0, 6.0, 7.0]));
    }

    #[test]
    fn tiles_match_the_reference_renderer() {
        let us = uniforms(1.3);
        let mut tr = Transforms::new(16, 5);
        tr.rotation = Affine2::rotation(0.4);
        let m = tr.composed();

        let reference = render_reference(&us, &m, 16, 5);
        // 12 pixel tiles start and end in the middle of rows
        for &tile in &[4, 12, 16, 64] {
            assert_eq!(draw_frame(&us, &m, 16, 5, tile), reference, "tile size {}", tile);
        }
    }

    #[test]
    fn pixels_are_opaque_grey() {
        let us = uniforms(0.0);
        let m = Transforms::new(32, 8).composed();
        let frame = draw_frame(&us, &m, 32, 8, 32);
        for p in &frame {
            let [r, g, b, a] = p.channels();
            assert_eq!(a, 255);
            assert!(r == g && g == b);
        }
        let first = frame[0];
        assert!(frame.iter().any(|p| *p != first), "the pattern should not be flat");
    }

    #[test]
    fn time_moves_the_pattern() {
        let m = Transforms::new(32, 8).composed();
        let a = draw_frame(&uniforms(0.0), &m, 32, 8, 64);
        let b = draw_frame(&uniforms(0.5), &m, 32, 8, 64);
        assert_ne!(a, b);
    }

    #[test]
    fn clocks_a_whole_period_apart_match() {
        let m = Transforms::new(32, 8).composed();
        let tau = 2.0 * ::std::f64::consts::PI;
        let a = draw_frame(&uniforms(2.0), &m, 32, 8, 64);
        let b = draw_frame(&uniforms(2.0 + 1.0e6 * tau), &m, 32, 8, 64);
        assert_eq!(a, b);
    }

    #[test]
    fn huge_clocks_render_like_the_reference() {
        let m = Transforms::new(16, 4).composed();
        for &time in &[1.0e12, -1.0e12, 4.0e18] {
            let us = uniforms(time);
            assert_eq!(draw_frame(&us, &m, 16, 4, 16), render_reference(&us, &m, 16, 4));
        }
    }

    #[test]
    fn scratch_grows_for_larger_tiles() {
        let us = uniforms(0.0);
        let m = Transforms::new(8, 8).composed();
        let mut scratch = Scratch::new(4);
        let mut out = vec![Rgba::default(); 64];
        draw_tile(&us, &m, 8, Rect { offset: 0, size: 64 }, &mut out, &mut scratch);
        assert_eq!(out, render_reference(&us, &m, 8, 8));
    }
}
