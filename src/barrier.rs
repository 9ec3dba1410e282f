// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A one-slot wait/notify gate.
//!
//! The renderer uses two per worker: the coordinator opens a worker's
//! start gate to let it into a frame, and waits on the worker's done
//! gate to learn that it left.  Workers never wait on each other.

use std::sync::{Condvar, Mutex, PoisonError};
use sync::lock;

/// A gate that is either open or closed.  `notify` opens it, `wait`
/// blocks until it is open and closes it again on the way through.
/// Notifying an open gate does nothing, so notifications do not queue.
#[derive(Debug, Default)]
pub struct Rendezvous {
    open: Mutex<bool>,
    condition: Condvar,
}

impl Rendezvous {
    /// A closed gate.
    pub fn new() -> Rendezvous {
        Rendezvous::default()
    }

    /// Blocks until the gate is open, then closes it.
    pub fn wait(&self) {
        let mut open = lock(&self.open);
        while !*open {
            open = self
                .condition
                .wait(open)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *open = false;
    }

    /// Opens the gate and wakes the waiter, if there is one.
    pub fn notify(&self) {
        *lock(&self.open) = true;
        self.condition.notify_one();
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        *lock(&self.open)
    }
}
