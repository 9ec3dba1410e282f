// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The crate's error type.  Broken invariants inside the renderer are
//! bugs, and show up as debug assertions rather than as errors here.

use std::io;

/// Everything that can go wrong at the edges of the renderer.
#[derive(Debug, Fail)]
pub enum Error {
    /// A configuration value is out of range.
    #[fail(display = "invalid configuration: {}", _0)]
    InvalidConfig(String),

    /// The OS refused to start a worker thread.  Workers started before
    /// it have already been stopped and joined.
    #[fail(display = "could not start worker {}: {}", id, cause)]
    WorkerSpawn {
        /// The worker that failed to start.
        id: usize,
        /// What the OS said.
        #[cause]
        cause: io::Error,
    },

    /// A snapshot could not be written.
    #[fail(display = "could not write {}: {}", path, cause)]
    Snapshot {
        /// The file being written.
        path: String,
        /// The underlying failure.
        #[cause]
        cause: io::Error,
    },
}
