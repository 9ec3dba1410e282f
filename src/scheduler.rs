// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tile scheduling with work stealing.
//!
//! A frame is a flat run of pixel indices cut into fixed size tiles.
//! At the start of a frame every worker's queue receives a single
//! `Rect` spanning its whole share, so seeding costs one push per
//! worker no matter how large the image is.  The first time that big
//! rect is taken off a queue it is cut into tiles: one is handed out,
//! the rest go back on the queue of whoever took it.  A worker whose
//! own queue runs dry walks the other queues round-robin, starting
//! with its right-hand neighbour, and takes the first tile it finds.
//!
//! Every dequeue happens under the queue's own lock, so no tile is
//! ever handed out twice and the tiles of a frame partition it.

use crossbeam::utils::CachePadded;
use frame::Rgba;
use std::collections::VecDeque;
use std::mem;
use std::sync::Mutex;
use sync::lock;

/// Default tile size in pixels: four pages' worth of pixels.
pub const TILE_SIZE: usize = ceil_div(4 * 4096, mem::size_of::<Rgba>());

/// `a / b`, rounded up.
pub const fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

/// A contiguous run of pixels in the flattened, row-major frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rect {
    /// Index of the first pixel.
    pub offset: usize,
    /// Number of pixels.
    pub size: usize,
}

#[derive(Debug, Default)]
struct TileQueue {
    jobs: VecDeque<Rect>,
    // Set once the owner found no work anywhere; thieves skip the queue.
    done: bool,
}

/// Per-worker tile queues.
pub struct Scheduler {
    tile_size: usize,
    queues: Vec<CachePadded<Mutex<TileQueue>>>,
}

impl Scheduler {
    /// Creates empty queues for `workers` workers handing out tiles of
    /// `tile_size` pixels.
    pub fn new(workers: usize, tile_size: usize) -> Scheduler {
        debug_assert!(workers > 0 && tile_size > 0);
        Scheduler {
            tile_size,
            queues: (0..workers)
                .map(|_| CachePadded::new(Mutex::new(TileQueue::default())))
                .collect(),
        }
    }

    /// Number of workers.
    pub fn workers(&self) -> usize {
        self.queues.len()
    }

    /// Tile size in pixels.
    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    /// How many tiles each worker receives when `tile_count` tiles are
    /// dealt to `workers` workers: as evenly as possible, with the
    /// leftovers going one apiece to the highest-numbered workers.
    pub fn seed_counts(tile_count: usize, workers: usize) -> Vec<usize> {
        let slice = tile_count / workers;
        let rest = tile_count % workers;
        (0..workers)
            .map(|i| if i >= workers - rest { slice + 1 } else { slice })
            .collect()
    }

    /// Deals out a frame of `pixels` pixels (rounded up to whole tiles)
    /// and clears the done flags.  Must not run while anyone is taking
    /// tiles.
    pub fn seed(&self, pixels: usize) {
        let tiles = ceil_div(pixels, self.tile_size);
        let counts = Scheduler::seed_counts(tiles, self.workers());
        let mut offset = 0;
        for (queue, count) in self.queues.iter().zip(counts) {
            let size = count * self.tile_size;
            // Nobody else is running, but the lock orders these writes
            // before the workers' first dequeue.
            let mut q = lock(queue);
            debug_assert!(q.jobs.is_empty(), "seeding a queue that still holds work");
            q.done = false;
            if size > 0 {
                q.jobs.push_back(Rect { offset, size });
            }
            offset += size;
        }
        trace!("seeded {} tiles over {} workers", tiles, self.workers());
    }

    /// The next tile for worker `me`, from its own queue if possible and
    /// stolen otherwise.  `None` means the frame has no work left that
    /// `me` can reach; the worker is then marked done.
    pub fn next_tile(&self, me: usize) -> Option<Rect> {
        let tile_size = self.tile_size;
        {
            let mut own = lock(&self.queues[me]);
            if let Some(rect) = own.jobs.pop_front() {
                if rect.size > tile_size {
                    debug_assert!(own.jobs.is_empty());
                    self.enqueue_rest(&mut own.jobs, rect);
                }
                return Some(Rect {
                    offset: rect.offset,
                    size: tile_size,
                });
            }
        }

        let n = self.queues.len();
        for victim in (1..n).map(|k| (me + k) % n) {
            let stolen = {
                let mut q = lock(&self.queues[victim]);
                if q.done {
                    None
                } else {
                    q.jobs.pop_front()
                }
            };
            if let Some(rect) = stolen {
                if rect.size > tile_size {
                    let mut own = lock(&self.queues[me]);
                    self.enqueue_rest(&mut own.jobs, rect);
                }
                return Some(Rect {
                    offset: rect.offset,
                    size: tile_size,
                });
            }
        }

        lock(&self.queues[me]).done = true;
        None
    }

    /// Whether every queue is empty.
    pub fn is_drained(&self) -> bool {
        self.queues.iter().all(|q| lock(q).jobs.is_empty())
    }

    // Queues every tile of `rect` except the first.
    fn enqueue_rest(&self, jobs: &mut VecDeque<Rect>, rect: Rect) {
        debug_assert_eq!(rect.size % self.tile_size, 0);
        let tiles = rect.size / self.tile_size;
        for i in 1..tiles {
            jobs.push_back(Rect {
                offset: rect.offset + i * self.tile_size,
                size: self.tile_size,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam;

    fn expected_tiles(tiles: usize, tile_size: usize) -> Vec<Rect> {
        (0..tiles)
            .map(|i| Rect {
                offset: i * tile_size,
                size: tile_size,
            })
            .collect()
    }

    #[test]
    fn default_tile_size_is_four_pages() {
        assert_eq!(TILE_SIZE, 4096);
    }

    #[test]
    fn ceil_div_rounds_up() {
        assert_eq!(ceil_div(10, 5), 2);
        assert_eq!(ceil_div(11, 5), 3);
        assert_eq!(ceil_div(1, 4096), 1);
    }

    #[test]
    fn extra_tiles_go_to_the_last_workers() {
        assert_eq!(Scheduler::seed_counts(10, 3), vec![3, 3, 4]);
        assert_eq!(Scheduler::seed_counts(2, 4), vec![0, 0, 1, 1]);
        assert_eq!(Scheduler::seed_counts(8, 4), vec![2, 2, 2, 2]);
        assert_eq!(Scheduler::seed_counts(7, 1), vec![7]);
    }

    #[test]
    fn seed_counts_cover_every_tile() {
        for tiles in 0..50 {
            for workers in 1..9 {
                let counts = Scheduler::seed_counts(tiles, workers);
                assert_eq!(counts.iter().sum::<usize>(), tiles);
                let (lo, hi) = (counts.iter().min().unwrap(), counts.iter().max().unwrap());
                assert!(hi - lo <= 1);
            }
        }
    }

    #[test]
    fn one_worker_drains_everything_in_order() {
        let s = Scheduler::new(3, 8);
        s.seed(10 * 8);
        let mut got = vec![];
        while let Some(rect) = s.next_tile(0) {
            got.push(rect);
        }
        assert_eq!(got, expected_tiles(10, 8));
        assert!(s.is_drained());
    }

    #[test]
    fn partial_last_tile_is_rounded_up() {
        let s = Scheduler::new(2, 16);
        s.seed(33);
        let mut got = vec![];
        while let Some(rect) = s.next_tile(1) {
            got.push(rect);
        }
        got.sort();
        assert_eq!(got, expected_tiles(3, 16));
    }

    #[test]
    fn stolen_remainder_goes_to_the_thief() {
        let s = Scheduler::new(2, 4);
        s.seed(4 * 4);

        // worker 0 works through its own two tiles
        assert_eq!(s.next_tile(0), Some(Rect { offset: 0, size: 4 }));
        assert_eq!(s.next_tile(0), Some(Rect { offset: 4, size: 4 }));
        // then steals worker 1's untouched share and keeps the rest
        assert_eq!(s.next_tile(0), Some(Rect { offset: 8, size: 4 }));
        // so worker 1 has to steal its own last tile back from 0
        assert_eq!(s.next_tile(1), Some(Rect { offset: 12, size: 4 }));
        assert_eq!(s.next_tile(1), None);
        assert_eq!(s.next_tile(0), None);
    }

    #[test]
    fn reseeding_clears_done_flags() {
        let s = Scheduler::new(2, 4);
        for _ in 0..3 {
            s.seed(32);
            let mut got = vec![];
            while let Some(rect) = s.next_tile(1) {
                got.push(rect);
            }
            assert_eq!(s.next_tile(0), None);
            got.sort();
            assert_eq!(got, expected_tiles(8, 4));
        }
    }

    #[test]
    fn concurrent_workers_partition_the_frame() {
        for &(workers, tiles, tile_size) in &[(2, 1, 4), (3, 10, 4), (4, 333, 8), (8, 1000, 4)] {
            let s = Scheduler::new(workers, tile_size);
            s.seed(tiles * tile_size);

            let mut got: Vec<Rect> = vec![];
            crossbeam::scope(|spawner| {
                let handles: Vec<_> = (0..workers)
                    .map(|me| {
                        let s = &s;
                        spawner.spawn(move |_| {
                            let mut mine = vec![];
                            while let Some(rect) = s.next_tile(me) {
                                mine.push(rect);
                            }
                            mine
                        })
                    })
                    .collect();
                for handle in handles {
                    got.extend(handle.join().unwrap());
                }
            })
            .unwrap();

            got.sort();
            assert_eq!(got, expected_tiles(tiles, tile_size), "{} workers", workers);
            assert!(s.is_drained());
        }
    }
}
