// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Run configuration.  The renderer trusts what it is given; callers
//! are expected to run `validate` first.

use batch::LANES;
use errors::Error;
use scheduler::TILE_SIZE;

/// Most workers a renderer may run, the coordinator included.
pub const MAX_WORKERS: usize = 256;
/// Image dimensions must be strictly below this.
pub const MAX_DIMENSION: usize = 4096;
/// Most plane waves in the crystal.
pub const MAX_WAVES: usize = 4096;
/// Largest cosine table.
pub const MAX_COSINES: usize = 1 << 20;
/// Highest frame rate.
pub const MAX_FPS: u32 = 4096;
/// Longest capture.
pub const MAX_CAPTURE: u32 = 1 << 30;

/// Everything needed to set up a renderer and animate it.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Log per-frame timings.
    pub verbose: bool,
    /// Number of workers, the calling thread included.
    pub workers: usize,
    /// Image width in pixels; a multiple of `LANES`.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Number of plane waves.
    pub waves: usize,
    /// Cosine table resolution.
    pub cosines: usize,
    /// Target frames per second.
    pub fps: u32,
    /// Frames to save before stopping; zero for none.
    pub capture: u32,
    /// Pattern time per second of animation.
    pub time_speed: f64,
    /// Pattern time at the start of the animation.
    pub time_offset: f64,
    /// Rotation in radians per second of animation.
    pub rotation_rate: f32,
    /// Pixels per tile; a multiple of `LANES`.
    pub tile_size: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            verbose: false,
            workers: 1,
            width: 800,
            height: 600,
            waves: 7,
            cosines: 1024,
            fps: 30,
            capture: 0,
            time_speed: 0.25,
            time_offset: 0.0,
            rotation_rate: 0.0,
            tile_size: TILE_SIZE,
        }
    }
}

fn check(ok: bool, message: impl FnOnce() -> String) -> Result<(), Error> {
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidConfig(message()))
    }
}

impl Config {
    /// Checks every rule, reporting the first one broken.
    pub fn validate(&self) -> Result<(), Error> {
        check(self.workers >= 1 && self.workers <= MAX_WORKERS, || {
            format!("worker count must be between 1 and {}", MAX_WORKERS)
        })?;
        check(
            self.width > 0 && self.width < MAX_DIMENSION && self.height > 0 && self.height < MAX_DIMENSION,
            || format!("image size must be between 1x1 and {0}x{0}", MAX_DIMENSION - 1),
        )?;
        check(self.width % LANES == 0, || {
            format!("image width has to be divisible by {}", LANES)
        })?;
        check(self.waves >= 1 && self.waves <= MAX_WAVES, || {
            format!("wave count must be between 1 and {}", MAX_WAVES)
        })?;
        check(self.cosines >= 1 && self.cosines <= MAX_COSINES, || {
            format!("cosine table size must be between 1 and {}", MAX_COSINES)
        })?;
        check(self.fps >= 1 && self.fps <= MAX_FPS, || {
            format!("frame rate must be between 1 and {}", MAX_FPS)
        })?;
        check(self.capture <= MAX_CAPTURE, || {
            format!("capture count must be at most {}", MAX_CAPTURE)
        })?;
        check(self.time_speed.is_finite() && self.time_offset.is_finite(), || {
            "time speed and offset must be finite".to_string()
        })?;
        check(self.rotation_rate.is_finite(), || {
            "rotation rate must be finite".to_string()
        })?;
        check(self.tile_size > 0 && self.tile_size % LANES == 0, || {
            format!("tile size must be a positive multiple of {}", LANES)
        })?;
        Ok(())
    }
}
