// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fixed-width lane batches.
//!
//! Every stage of the tile kernel works on `LANES` values at a time.
//! A batch is a plain array and every operation is a lane loop, which
//! the optimizer turns into vector instructions on targets that have
//! them.  Anything that has to look at the representation of a float
//! goes through `to_bits()`; nothing here reinterprets storage.

use std::ops::{Add, AddAssign, BitOr, Mul, MulAssign, Shl, Shr, Sub, SubAssign};

/// Number of lanes in a batch.  Image widths and tile sizes are
/// multiples of this.
pub const LANES: usize = 4;

/// A batch of `LANES` single precision floats.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct F32s(pub [f32; LANES]);

/// A batch of `LANES` 32-bit integers.  Shifts are logical, as they
/// would be on the unsigned lanes of a vector register.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct I32s(pub [i32; LANES]);

macro_rules! lanewise {
    ($ty:ident, $tr:ident, $method:ident, $op:tt) => {
        impl $tr for $ty {
            type Output = $ty;

            #[inline(always)]
            fn $method(self, rhs: $ty) -> $ty {
                let mut out = self;
                for i in 0..LANES {
                    out.0[i] = self.0[i] $op rhs.0[i];
                }
                out
            }
        }
    };
}

macro_rules! lanewise_assign {
    ($ty:ident, $tr:ident, $method:ident, $op:tt) => {
        impl $tr for $ty {
            #[inline(always)]
            fn $method(&mut self, rhs: $ty) {
                for i in 0..LANES {
                    self.0[i] $op rhs.0[i];
                }
            }
        }
    };
}

lanewise!(F32s, Add, add, +);
lanewise!(F32s, Sub, sub, -);
lanewise!(F32s, Mul, mul, *);
lanewise_assign!(F32s, AddAssign, add_assign, +=);
lanewise_assign!(F32s, SubAssign, sub_assign, -=);
lanewise_assign!(F32s, MulAssign, mul_assign, *=);
lanewise!(I32s, BitOr, bitor, |);

impl F32s {
    /// Every lane set to `value`.
    #[inline(always)]
    pub fn splat(value: f32) -> F32s {
        F32s([value; LANES])
    }

    /// Consecutive values `start, start + 1, ...`, one per lane.  Used
    /// to turn a run of pixel columns into a coordinate batch.
    #[inline(always)]
    pub fn ramp(start: f32) -> F32s {
        let mut out = F32s::splat(start);
        for i in 0..LANES {
            out.0[i] += i as f32;
        }
        out
    }

    /// Converts to integers, truncating towards zero.
    #[inline(always)]
    pub fn trunc(self) -> I32s {
        let mut out = I32s::default();
        for i in 0..LANES {
            out.0[i] = self.0[i] as i32;
        }
        out
    }

    /// The IEEE sign bit of every lane, as 0 or 1.  Negative zero
    /// reports 1.
    #[inline(always)]
    pub fn sign_bits(self) -> I32s {
        let mut bits = I32s::default();
        for i in 0..LANES {
            bits.0[i] = self.0[i].to_bits() as i32;
        }
        bits >> 31
    }

    /// The fractional part, `v - floor(v)`, computed without a branch
    /// by truncating and then stepping down one for negative lanes.
    ///
    /// The result lies in `[0, 1]`: a negative integer (and negative
    /// zero) yields exactly `1.0` instead of `0.0`.  Callers that index
    /// a table with the result must have a spare slot at the end.
    #[inline(always)]
    pub fn fract(self) -> F32s {
        self - (self.trunc() - self.sign_bits()).to_f32s()
    }

    /// The fractional part of a batch known to be non-negative.
    #[inline(always)]
    pub fn fract_positive(self) -> F32s {
        self - self.trunc().to_f32s()
    }

    /// Loads `table[idx[i]]` into lane `i`.
    ///
    /// Panics if an index is negative or out of bounds.
    #[inline(always)]
    pub fn gather(table: &[f32], idx: I32s) -> F32s {
        let mut out = F32s::default();
        for i in 0..LANES {
            out.0[i] = table[idx.0[i] as usize];
        }
        out
    }
}

impl I32s {
    /// Every lane set to `value`.
    #[inline(always)]
    pub fn splat(value: i32) -> I32s {
        I32s([value; LANES])
    }

    /// Converts every lane to a float.
    #[inline(always)]
    pub fn to_f32s(self) -> F32s {
        let mut out = F32s::default();
        for i in 0..LANES {
            out.0[i] = self.0[i] as f32;
        }
        out
    }

    /// The raw bits of every lane.
    #[inline(always)]
    pub fn to_bits(self) -> [u32; LANES] {
        let mut out = [0u32; LANES];
        for i in 0..LANES {
            out[i] = self.0[i] as u32;
        }
        out
    }
}

impl Sub for I32s {
    type Output = I32s;

    #[inline(always)]
    fn sub(self, rhs: I32s) -> I32s {
        let mut out = self;
        for i in 0..LANES {
            out.0[i] = self.0[i].wrapping_sub(rhs.0[i]);
        }
        out
    }
}

impl Shl<u32> for I32s {
    type Output = I32s;

    #[inline(always)]
    fn shl(self, n: u32) -> I32s {
        let mut out = self;
        for v in out.0.iter_mut() {
            *v = ((*v as u32) << n) as i32;
        }
        out
    }
}

impl Shr<u32> for I32s {
    type Output = I32s;

    #[inline(always)]
    fn shr(self, n: u32) -> I32s {
        let mut out = self;
        for v in out.0.iter_mut() {
            *v = ((*v as u32) >> n) as i32;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(a: f32, b: f32, c: f32, d: f32) -> F32s {
        F32s([a, b, c, d])
    }

    #[test]
    fn lanes_divide_the_default_tile() {
        assert_eq!(::scheduler::TILE_SIZE % LANES, 0);
    }

    #[test]
    fn arithmetic_is_lanewise() {
        let a = batch(1.0, 2.0, 3.0, 4.0);
        let b = F32s::splat(2.0);
        assert_eq!(a + b, batch(3.0, 4.0, 5.0, 6.0));
        assert_eq!(a - b, batch(-1.0, 0.0, 1.0, 2.0));
        assert_eq!(a * b, batch(2.0, 4.0, 6.0, 8.0));

        let mut c = a;
        c += b;
        c *= b;
        c -= a;
        assert_eq!(c, batch(5.0, 6.0, 7.0, 8.0));
    }

    #[test]
    fn ramp_counts_up_from_start() {
        assert_eq!(F32s::ramp(8.0), batch(8.0, 9.0, 10.0, 11.0));
    }

    #[test]
    fn trunc_rounds_towards_zero() {
        assert_eq!(batch(1.7, -1.7, 0.2, -0.2).trunc(), I32s([1, -1, 0, 0]));
    }

    #[test]
    fn sign_bits_see_negative_zero() {
        assert_eq!(batch(1.0, -1.0, 0.0, -0.0).sign_bits(), I32s([0, 1, 0, 1]));
    }

    #[test]
    fn fract_handles_negative_input() {
        let f = batch(0.0, 1.0, 1.5, -0.5).fract();
        assert_eq!(f, batch(0.0, 0.0, 0.5, 0.5));

        let f = batch(-0.25, 2.75, -3.25, 0.125).fract();
        assert_eq!(f, batch(0.75, 0.75, 0.75, 0.125));
    }

    #[test]
    fn fract_glitches_to_one_on_negative_integers() {
        let f = batch(-1.0, -2.0, -0.0, 3.0).fract();
        assert_eq!(f, batch(1.0, 1.0, 1.0, 0.0));
    }

    #[test]
    fn fract_positive_on_non_negative_input() {
        let f = batch(0.0, 1.0, 1.5, 7.25).fract_positive();
        assert_eq!(f, batch(0.0, 0.0, 0.5, 0.25));
    }

    #[test]
    fn gather_reads_per_lane_indices() {
        let table = [10.0, 11.0, 12.0, 13.0, 14.0];
        let got = F32s::gather(&table, I32s([4, 0, 2, 2]));
        assert_eq!(got, batch(14.0, 10.0, 12.0, 12.0));
    }

    #[test]
    fn integer_shifts_are_logical() {
        let v = I32s([1, 0xff, -1, 0x7f]);
        assert_eq!(v << 8, I32s([0x100, 0xff00, -256, 0x7f00]));
        assert_eq!(I32s::splat(-1) >> 31, I32s::splat(1));
        assert_eq!((v | I32s::splat(0x100)).0[0], 0x101);
    }

    #[test]
    fn to_bits_keeps_the_pattern() {
        let v = I32s([-1, 0, 1, i32::min_value()]);
        assert_eq!(v.to_bits(), [0xffff_ffff, 0, 1, 0x8000_0000]);
    }
}
