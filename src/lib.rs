#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Crystal renderer
//!
//! The crystal is an interference pattern: a handful of plane waves,
//! travelling in evenly spaced directions, are summed at every point
//! of the plane, and the fractional part of the sum picks a grey level.
//! Bending the plane with a radial warp before the waves are evaluated
//! turns the flat moiré into something like a faceted crystal, and
//! moving the waves' phase with time makes it shimmer.
//!
//! Every pixel depends on nothing but its own coordinates and the clock,
//! so a frame is split into tiles that any thread can render.  Each
//! worker starts a frame with its own slice of the tiles and, when it
//! runs out, steals from the others.  Two frame buffers alternate: one
//! is being rendered while the other holds the last finished frame.

#[macro_use]
extern crate failure;
extern crate crossbeam;
extern crate image;
#[macro_use]
extern crate itertools;
#[macro_use]
extern crate log;
extern crate num;

#[cfg(test)]
extern crate tempfile;

pub mod anim;
pub mod barrier;
pub mod batch;
pub mod config;
pub mod errors;
pub mod frame;
pub mod geometry;
pub mod kernel;
pub mod renderer;
pub mod scheduler;
pub mod sink;
mod sync;
pub mod uniforms;
pub mod worker;

pub use anim::{Animation, FrameStats};
pub use config::Config;
pub use errors::Error;
pub use frame::{Image, Rgba};
pub use renderer::Renderer;
pub use sink::{FrameSink, NullSink, SnapshotSink};
pub use worker::WorkerState;
