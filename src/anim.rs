// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The animation loop: advance the clock, render, hand the frame to a
//! sink, sleep until the next frame is due.

use config::Config;
use errors::Error;
use renderer::Renderer;
use sink::FrameSink;
use std::thread;
use std::time::{Duration, Instant};

const STATS_FIRST: f64 = 0.5;
const STATS_CYCLE: f64 = 1.5;

/// What a run of the animation did.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameStats {
    /// Frames rendered.
    pub frames: u64,
    /// Wall clock seconds the run took.
    pub elapsed: f64,
}

/// Drives a renderer at a fixed frame rate.
#[derive(Clone, Debug)]
pub struct Animation {
    frame_time: f64,
    anim_time: f64,
}

impl Animation {
    /// Starts the animation clock at zero.
    pub fn new(config: &Config) -> Animation {
        Animation {
            frame_time: 1.0 / f64::from(config.fps),
            anim_time: 0.0,
        }
    }

    /// Seconds of animation so far.
    pub fn anim_time(&self) -> f64 {
        self.anim_time
    }

    /// Renders frames into `sink` until it is finished or `frame_limit`
    /// frames have been rendered.  Each frame moves the clock on by one
    /// frame time, however long it actually took.
    pub fn run(
        &mut self,
        renderer: &mut Renderer,
        sink: &mut dyn FrameSink,
        frame_limit: Option<u64>,
    ) -> Result<FrameStats, Error> {
        let start = Instant::now();
        let mut stats_next = STATS_FIRST;
        let mut stats_last = 0.0;
        let mut since_stats = 0u64;
        let mut frames = 0u64;

        loop {
            let real_time = start.elapsed().as_secs_f64();
            if real_time > stats_next {
                if since_stats > 0 {
                    let frame_time = (real_time - stats_last) / since_stats as f64;
                    info!("frame time: {:.6} sec, fps: {:.6}", frame_time, 1.0 / frame_time);
                }
                stats_next = real_time + STATS_CYCLE;
                stats_last = real_time;
                since_stats = 0;
            }

            if sink.finished() || frame_limit.map_or(false, |limit| frames >= limit) {
                break;
            }
            let next_frame = real_time + self.frame_time;

            self.anim_time += self.frame_time;
            renderer.advance(self.anim_time);
            let render_start = Instant::now();
            renderer.render();
            let render_time = render_start.elapsed();

            if let Some(frame) = renderer.published() {
                sink.present(frame)?;
            }
            debug!(
                "frame {}: render {:?}, total {:?}",
                frames,
                render_time,
                render_start.elapsed()
            );
            frames += 1;
            since_stats += 1;

            let now = start.elapsed().as_secs_f64();
            if next_frame > now {
                thread::sleep(Duration::from_secs_f64(next_frame - now));
            }
        }

        Ok(FrameStats {
            frames,
            elapsed: start.elapsed().as_secs_f64(),
        })
    }
}
