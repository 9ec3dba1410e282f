// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Workers and the state they share.
//!
//! Worker 0 is the coordinator and runs on whatever thread calls
//! `Renderer::render`; the others each get a thread of their own and
//! spend their lives in `WorkerContext::run`, parked on their start
//! gate between frames.

use barrier::Rendezvous;
use config::Config;
use errors::Error;
use frame::FrameStore;
use kernel::{draw_tile, Scratch};
use scheduler::Scheduler;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
#[cfg(debug_assertions)]
use std::sync::Mutex;
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
#[cfg(debug_assertions)]
use sync::lock;
use sync::read;
use uniforms::{Transforms, Uniforms};

/// Where a worker is in its life.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Not yet started.
    New,
    /// Handed to a thread that has not reached its loop.
    Started,
    /// Ready for frames.
    Initialized,
    /// Told to stop, not yet gone.
    ShuttingDown,
    /// Gone.
    Stopped,
}

impl WorkerState {
    fn from_usize(n: usize) -> WorkerState {
        match n {
            0 => WorkerState::New,
            1 => WorkerState::Started,
            2 => WorkerState::Initialized,
            3 => WorkerState::ShuttingDown,
            _ => WorkerState::Stopped,
        }
    }
}

/// The coordinator's handle on one worker.
pub(crate) struct WorkerSlot {
    pub start: Rendezvous,
    pub done: Rendezvous,
    pub shutdown: AtomicBool,
    state: AtomicUsize,
    // (frame version, target buffer) of the worker's last frame
    #[cfg(debug_assertions)]
    pub stamp: Mutex<Option<(usize, usize)>>,
}

impl WorkerSlot {
    fn new() -> WorkerSlot {
        WorkerSlot {
            start: Rendezvous::new(),
            done: Rendezvous::new(),
            shutdown: AtomicBool::new(false),
            state: AtomicUsize::new(WorkerState::New as usize),
            #[cfg(debug_assertions)]
            stamp: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_usize(self.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: WorkerState) {
        self.state.store(state as usize, Ordering::SeqCst);
    }
}

/// Everything the workers of one renderer share.
pub(crate) struct Shared {
    pub scheduler: Scheduler,
    pub frames: FrameStore,
    // Written by the coordinator between frames only.
    pub uniforms: RwLock<Uniforms>,
    pub transforms: RwLock<Transforms>,
    pub slots: Vec<WorkerSlot>,
    pub width: usize,
    pub height: usize,
    #[cfg(debug_assertions)]
    pub render_version: AtomicUsize,
}

impl Shared {
    pub fn new(config: &Config) -> Shared {
        let mut uniforms = Uniforms::new(config.waves, config.cosines);
        uniforms.time = config.time_offset;
        uniforms.rotation_rate = config.rotation_rate;

        Shared {
            scheduler: Scheduler::new(config.workers, config.tile_size),
            frames: FrameStore::new(config.width, config.height, config.tile_size),
            uniforms: RwLock::new(uniforms),
            transforms: RwLock::new(Transforms::new(config.width, config.height)),
            slots: (0..config.workers).map(|_| WorkerSlot::new()).collect(),
            width: config.width,
            height: config.height,
            #[cfg(debug_assertions)]
            render_version: AtomicUsize::new(0),
        }
    }

    /// Pixels in a frame, not counting padding.
    pub fn pixels(&self) -> usize {
        self.width * self.height
    }
}

/// One worker's private state.
pub(crate) struct WorkerContext {
    id: usize,
    shared: Arc<Shared>,
    scratch: Scratch,
    target: Option<usize>,
    #[cfg(debug_assertions)]
    version: usize,
}

impl WorkerContext {
    pub fn new(id: usize, shared: Arc<Shared>) -> WorkerContext {
        let scratch = Scratch::new(shared.scheduler.tile_size());
        WorkerContext {
            id,
            shared,
            scratch,
            target: None,
            #[cfg(debug_assertions)]
            version: 0,
        }
    }

    /// The buffer this worker rendered into last.
    pub fn target(&self) -> Option<usize> {
        self.target
    }

    /// Renders this worker's part of one frame: its own queue first,
    /// then whatever it can steal.  Returns false, without rendering,
    /// once the worker has been told to shut down.
    pub fn render_frame(&mut self) -> bool {
        let slot = &self.shared.slots[self.id];
        if self.id != 0 {
            slot.start.wait();
        } else {
            #[cfg(debug_assertions)]
            self.shared.render_version.fetch_add(1, Ordering::SeqCst);
        }

        if slot.shutdown.load(Ordering::SeqCst) {
            slot.set_state(WorkerState::ShuttingDown);
            return false;
        }

        let target = FrameStore::current_target(self.target);
        self.target = Some(target);
        #[cfg(debug_assertions)]
        {
            self.version += 1;
            *lock(&slot.stamp) = Some((self.version, target));
        }

        let mut tiles = 0;
        {
            // Both guards must be gone before `done` is signalled: the
            // coordinator takes the write locks right after.
            let uniforms = read(&self.shared.uniforms);
            let m = read(&self.shared.transforms).composed();
            while let Some(rect) = self.shared.scheduler.next_tile(self.id) {
                // Tiles partition the frame, and nobody reads this buffer
                // until every worker has signalled `done`.
                let out = unsafe { self.shared.frames.span_mut(target, rect) };
                draw_tile(&uniforms, &m, self.shared.width, rect, out, &mut self.scratch);
                tiles += 1;
            }
        }
        trace!("worker {} rendered {} tiles into buffer {}", self.id, tiles, target);

        if self.id != 0 {
            slot.done.notify();
        }
        true
    }

    /// A worker thread's whole life.
    pub fn run(mut self) {
        self.shared.slots[self.id].set_state(WorkerState::Initialized);
        while self.render_frame() {}
        self.shared.slots[self.id].set_state(WorkerState::Stopped);
        info!("worker {} exiting", self.id);
    }
}

/// Starts a worker thread.  Gets the worker id and the body to run.
pub(crate) type Spawner<'a> =
    dyn FnMut(usize, Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>> + 'a;

/// The `Spawner` used outside of tests: a named OS thread.
pub(crate) fn spawn_thread(id: usize, body: Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("crystal-worker-{}", id))
        .spawn(body)
}

/// Starts workers 1 and up.  If any fails to start, the ones already
/// running are stopped and joined before the error is returned.
pub(crate) fn spawn_workers(
    shared: &Arc<Shared>,
    spawn: &mut Spawner,
) -> Result<Vec<JoinHandle<()>>, Error> {
    let mut handles = Vec::with_capacity(shared.slots.len().saturating_sub(1));
    for id in 1..shared.slots.len() {
        let context = WorkerContext::new(id, shared.clone());
        shared.slots[id].set_state(WorkerState::Started);
        match spawn(id, Box::new(move || context.run())) {
            Ok(handle) => handles.push(handle),
            Err(cause) => {
                error!(
                    "could not start worker {} ({}), stopping the {} already running",
                    id,
                    cause,
                    handles.len()
                );
                shared.slots[id].set_state(WorkerState::Stopped);
                stop_workers(shared, handles);
                return Err(Error::WorkerSpawn { id, cause });
            }
        }
    }
    debug!("started {} worker threads", handles.len());
    Ok(handles)
}

/// Flags every worker thread for shutdown, wakes it, and joins it.
/// Must not be called while a frame is in flight.
pub(crate) fn stop_workers(shared: &Shared, handles: Vec<JoinHandle<()>>) {
    for slot in shared.slots.iter().skip(1) {
        slot.shutdown.store(true, Ordering::SeqCst);
        slot.start.notify();
    }
    for handle in handles {
        let name = handle.thread().name().unwrap_or("worker").to_string();
        if handle.join().is_err() {
            warn!("{} panicked", name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(workers: usize) -> Config {
        Config {
            workers,
            width: 16,
            height: 4,
            tile_size: 8,
            ..Config::default()
        }
    }

    #[test]
    fn coordinator_renders_a_whole_frame_alone() {
        let shared = Arc::new(Shared::new(&config(1)));
        shared.scheduler.seed(shared.pixels());
        let mut coordinator = WorkerContext::new(0, shared.clone());
        assert!(coordinator.render_frame());
        assert_eq!(coordinator.target(), Some(0));
        assert!(shared.scheduler.is_drained());

        let image = unsafe { shared.frames.image(0) };
        assert!(image.pixels().iter().all(|p| p.alpha() == 255));
    }

    #[test]
    fn targets_alternate_between_frames() {
        let shared = Arc::new(Shared::new(&config(1)));
        let mut coordinator = WorkerContext::new(0, shared.clone());
        let mut targets = vec![];
        for _ in 0..4 {
            shared.scheduler.seed(shared.pixels());
            coordinator.render_frame();
            targets.push(coordinator.target().unwrap());
        }
        assert_eq!(targets, vec![0, 1, 0, 1]);
    }

    #[test]
    fn shutdown_flag_skips_the_frame() {
        let shared = Arc::new(Shared::new(&config(2)));
        shared.scheduler.seed(shared.pixels());
        shared.slots[1].shutdown.store(true, Ordering::SeqCst);
        shared.slots[1].start.notify();

        let mut worker = WorkerContext::new(1, shared.clone());
        assert!(!worker.render_frame());
        assert_eq!(worker.target(), None);
        assert_eq!(shared.slots[1].state(), WorkerState::ShuttingDown);
        assert!(!shared.scheduler.is_drained());
    }

    #[test]
    fn threads_stop_when_asked() {
        let shared = Arc::new(Shared::new(&config(3)));
        let handles = spawn_workers(&shared, &mut spawn_thread).unwrap();
        assert_eq!(handles.len(), 2);
        stop_workers(&shared, handles);
        for slot in shared.slots.iter().skip(1) {
            assert_eq!(slot.state(), WorkerState::Stopped);
        }
        assert_eq!(shared.slots[0].state(), WorkerState::New);
    }

    #[test]
    fn failed_spawn_rolls_back_started_workers() {
        let shared = Arc::new(Shared::new(&config(4)));
        let mut spawner = |id: usize, body: Box<dyn FnOnce() + Send>| {
            if id == 3 {
                Err(io::Error::new(io::ErrorKind::Other, "no more threads"))
            } else {
                spawn_thread(id, body)
            }
        };

        match spawn_workers(&shared, &mut spawner) {
            Err(Error::WorkerSpawn { id, .. }) => assert_eq!(id, 3),
            other => panic!("expected a spawn failure, got {:?}", other.map(|h| h.len())),
        }
        for slot in shared.slots.iter().skip(1) {
            assert_eq!(slot.state(), WorkerState::Stopped);
        }
    }
}
