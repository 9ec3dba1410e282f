// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The renderer: a pool of workers, two frame buffers and the clock.
//!
//! A frame goes like this.  The queues were seeded when the previous
//! frame finished, so `render` only has to open every worker's start
//! gate and then join in as worker 0.  When the coordinator runs out of
//! tiles it waits on every done gate in turn.  Once all have come back
//! no one touches the buffer any more, so it becomes the published
//! frame, and the queues are seeded for the next one.
//!
//! The clock is only ever changed by `advance`, and since `render` and
//! `advance` both take `&mut self` it can't happen during a frame.

use config::Config;
use errors::Error;
use frame::Image;
use geometry::Affine2;
use std::mem;
use std::sync::Arc;
#[cfg(debug_assertions)]
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
#[cfg(debug_assertions)]
use sync::lock;
use sync::{read, write};
use worker::{spawn_thread, spawn_workers, stop_workers, Shared, Spawner, WorkerContext, WorkerState};

/// Renders frames of the crystal on a pool of workers.
pub struct Renderer {
    shared: Arc<Shared>,
    coordinator: WorkerContext,
    handles: Vec<JoinHandle<()>>,
    published: Option<usize>,
    time_speed: f64,
    time_offset: f64,
    stopped: bool,
}

impl Renderer {
    /// Builds the tables and buffers, starts worker threads 1 and up,
    /// and seeds the first frame.  `config` should have passed
    /// `Config::validate`.
    ///
    /// Fails only when a worker thread can't be started, in which case
    /// no thread is left behind.
    pub fn new(config: &Config) -> Result<Renderer, Error> {
        Renderer::with_spawner(config, &mut spawn_thread)
    }

    pub(crate) fn with_spawner(config: &Config, spawn: &mut Spawner) -> Result<Renderer, Error> {
        debug_assert!(config.validate().is_ok(), "renderer built from an invalid configuration");

        let shared = Arc::new(Shared::new(config));
        let handles = spawn_workers(&shared, spawn)?;
        shared.slots[0].set_state(WorkerState::Initialized);
        shared.scheduler.seed(shared.pixels());
        info!(
            "renderer ready: {}x{}, {} workers, {} pixel tiles",
            config.width, config.height, config.workers, config.tile_size
        );

        Ok(Renderer {
            coordinator: WorkerContext::new(0, shared.clone()),
            shared,
            handles,
            published: None,
            time_speed: config.time_speed,
            time_offset: config.time_offset,
            stopped: false,
        })
    }

    /// Image width.
    pub fn width(&self) -> usize {
        self.shared.width
    }

    /// Image height.
    pub fn height(&self) -> usize {
        self.shared.height
    }

    /// Number of workers, the coordinator included.
    pub fn workers(&self) -> usize {
        self.shared.slots.len()
    }

    /// The pattern clock the next frame will be rendered at.
    pub fn time(&self) -> f64 {
        read(&self.shared.uniforms).time
    }

    /// The current rotation of the pattern plane.
    pub fn rotation(&self) -> Affine2 {
        read(&self.shared.transforms).rotation
    }

    /// Moves the clock to `anim_time` seconds into the animation.
    pub fn advance(&mut self, anim_time: f64) {
        let angle = {
            let mut uniforms = write(&self.shared.uniforms);
            uniforms.time = anim_time * self.time_speed + self.time_offset;
            (f64::from(uniforms.rotation_rate) * anim_time) as f32
        };
        write(&self.shared.transforms).rotation = Affine2::rotation(angle);
    }

    /// Renders one frame and publishes it.  Blocks until every worker is
    /// done.  Does nothing after `shutdown`.
    pub fn render(&mut self) {
        if self.stopped {
            warn!("render called on a renderer that was shut down");
            return;
        }

        for slot in self.shared.slots.iter().skip(1) {
            slot.start.notify();
        }
        self.coordinator.render_frame();
        for slot in self.shared.slots.iter().skip(1) {
            slot.done.wait();
        }

        let target = match self.coordinator.target() {
            Some(target) => target,
            None => return,
        };
        self.check_consistency(target);
        debug_assert!(self.shared.scheduler.is_drained(), "frame finished with tiles left over");

        self.shared.scheduler.seed(self.shared.pixels());
        self.published = Some(target);
    }

    /// The last finished frame, `None` until the first `render`.
    pub fn published(&self) -> Option<&Image> {
        // Workers only write the buffer that is not published, and only
        // inside `render`, which can't run while this borrow lives.
        self.published
            .map(|index| unsafe { self.shared.frames.image(index) })
    }

    /// Where each worker is, the coordinator first.
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.shared.slots.iter().map(|slot| slot.state()).collect()
    }

    /// Stops and joins the worker threads.  Calling it again does
    /// nothing, and dropping the renderer calls it.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let handles = mem::replace(&mut self.handles, Vec::new());
        stop_workers(&self.shared, handles);
        self.shared.slots[0].set_state(WorkerState::Stopped);
        debug!("renderer shut down");
    }

    // Every worker must have rendered the same frame into the same buffer.
    #[cfg(debug_assertions)]
    fn check_consistency(&self, target: usize) {
        let version = self.shared.render_version.load(Ordering::SeqCst);
        for (id, slot) in self.shared.slots.iter().enumerate() {
            let stamp = *lock(&slot.stamp);
            assert_eq!(stamp, Some((version, target)), "worker {} is out of step", id);
        }
    }

    #[cfg(not(debug_assertions))]
    fn check_consistency(&self, _target: usize) {}
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
