// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Where finished frames go.

use errors::Error;
use frame::Image;
use image::bmp::BMPEncoder;
use image::ColorType;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// A consumer of published frames.
pub trait FrameSink {
    /// Takes one finished frame.
    fn present(&mut self, frame: &Image) -> Result<(), Error>;

    /// Whether the sink wants no more frames.
    fn finished(&self) -> bool {
        false
    }
}

/// Throws frames away, counting them.
#[derive(Debug, Default)]
pub struct NullSink {
    /// Frames presented so far.
    pub frames: u64,
}

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &Image) -> Result<(), Error> {
        self.frames += 1;
        Ok(())
    }
}

/// Digits needed to number `count` frames from zero.
fn id_digits(count: u32) -> usize {
    let mut digits = 0;
    let mut reach = 1u64;
    while reach < u64::from(count) {
        reach *= 10;
        digits += 1;
    }
    digits
}

/// The file name of frame `id` of the zero-based series `series`, in a
/// series of `count` frames.
pub fn snapshot_name(series: u32, id: u32, count: u32) -> String {
    format!(
        "screenshot_{:03}_{:0width$}.bmp",
        series + 1,
        id,
        width = id_digits(count)
    )
}

/// Saves series of consecutive frames as 24-bit BMP files.
///
/// A series is requested with a frame count; the next that many frames
/// are written, numbered within the series.  The sink is finished
/// whenever no series is in progress.
#[derive(Debug)]
pub struct SnapshotSink {
    dir: PathBuf,
    series: u32,
    id: u32,
    count: u32,
}

impl SnapshotSink {
    /// A sink writing into `dir`, with a first series of `count` frames
    /// already requested.
    pub fn new<P: AsRef<Path>>(dir: P, count: u32) -> SnapshotSink {
        let mut sink = SnapshotSink {
            dir: dir.as_ref().to_path_buf(),
            series: 0,
            id: 0,
            count: 0,
        };
        sink.request(count);
        sink
    }

    /// Starts a series of `count` frames, unless one is in progress.
    pub fn request(&mut self, count: u32) {
        if self.id == 0 && self.count == 0 {
            self.count = count;
        }
    }

    /// Number of series completed.
    pub fn series_written(&self) -> u32 {
        self.series
    }

    fn write(path: &Path, frame: &Image) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        BMPEncoder::new(&mut out).encode(
            &frame.to_rgb_bytes(),
            frame.width() as u32,
            frame.height() as u32,
            ColorType::RGB(8),
        )?;
        out.flush()
    }
}

impl FrameSink for SnapshotSink {
    fn present(&mut self, frame: &Image) -> Result<(), Error> {
        if self.id >= self.count {
            return Ok(());
        }

        let path = self.dir.join(snapshot_name(self.series, self.id, self.count));
        info!("writing {}", path.display());
        SnapshotSink::write(&path, frame).map_err(|cause| Error::Snapshot {
            path: path.display().to_string(),
            cause,
        })?;

        self.id += 1;
        if self.id >= self.count {
            self.id = 0;
            self.count = 0;
            self.series += 1;
        }
        Ok(())
    }

    fn finished(&self) -> bool {
        self.count == 0
    }
}
