// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pixel buffers and the double-buffered frame store.
//!
//! An `Image` is padded at the end so every tile of the scheduler is
//! full sized; the padding is rendered like any other pixel but never
//! shown.  The `FrameStore` owns two images.  While a frame is being
//! rendered, workers write into one of them through disjoint spans
//! handed out by the scheduler; the other holds the previous, finished
//! frame.

use scheduler::{ceil_div, Rect};
use std::cell::UnsafeCell;
use std::slice;

/// A packed pixel.  The channel bytes are, from least to most
/// significant, red, green, blue and alpha.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgba(pub u32);

impl Rgba {
    /// Packs four channels.
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Rgba {
        Rgba(u32::from_le_bytes([r, g, b, a]))
    }

    /// `[r, g, b, a]`, whatever the host byte order.
    pub fn channels(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// The colour channels without alpha.
    pub fn rgb(self) -> [u8; 3] {
        let [r, g, b, _] = self.channels();
        [r, g, b]
    }

    /// The alpha channel.
    pub fn alpha(self) -> u8 {
        self.channels()[3]
    }
}

/// A row-major image whose buffer is padded to a whole number of tiles.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    width: usize,
    height: usize,
    pixels: Vec<Rgba>,
}

impl Image {
    /// Allocates a black, transparent image of `width` by `height`
    /// pixels, padded to a multiple of `tile_size`.
    pub fn new(width: usize, height: usize, tile_size: usize) -> Image {
        let len = ceil_div(width * height, tile_size) * tile_size;
        Image {
            width,
            height,
            pixels: vec![Rgba::default(); len],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The visible pixels, row by row.
    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels[..self.width * self.height]
    }

    /// Length of the buffer including the padding.
    pub fn padded_len(&self) -> usize {
        self.pixels.len()
    }

    /// One visible row.
    pub fn row(&self, y: usize) -> &[Rgba] {
        &self.pixels[y * self.width..(y + 1) * self.width]
    }

    #[cfg(test)]
    fn get(&self, x: usize, y: usize) -> Rgba {
        self.pixels[y * self.width + x]
    }

    /// Mutable access to the whole buffer, padding included.
    pub fn pixels_mut(&mut self) -> &mut [Rgba] {
        &mut self.pixels
    }

    /// The visible pixels as packed 24-bit RGB, three bytes per pixel.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 * self.width * self.height);
        for y in 0..self.height {
            for p in self.row(y) {
                out.extend_from_slice(&p.rgb());
            }
        }
        out
    }
}

struct Buffer {
    image: UnsafeCell<Image>,
    base: *mut Rgba,
    len: usize,
}

/// Two images: the one being rendered and the last finished one.
///
/// The store itself does not know which is which.  Workers track the
/// index they wrote last and ask `current_target` for the next; the
/// renderer publishes an index only after every worker is done with
/// it.  Both rules together are what make the unsynchronized access
/// below sound.
pub struct FrameStore {
    buffers: [Buffer; 2],
}

// The raw pointers only ever address disjoint spans (one per tile, and
// tiles partition the frame) of the buffer being rendered.
unsafe impl Send for FrameStore {}
unsafe impl Sync for FrameStore {}

impl FrameStore {
    /// Allocates both buffers.
    pub fn new(width: usize, height: usize, tile_size: usize) -> FrameStore {
        let buffer = || {
            let mut image = Image::new(width, height, tile_size);
            let base = image.pixels.as_mut_ptr();
            let len = image.pixels.len();
            Buffer {
                image: UnsafeCell::new(image),
                base,
                len,
            }
        };
        FrameStore {
            buffers: [buffer(), buffer()],
        }
    }

    /// The buffer to render into, given the one rendered last (`None`
    /// before the first frame).
    pub fn current_target(last: Option<usize>) -> usize {
        match last {
            Some(0) => 1,
            _ => 0,
        }
    }

    /// Mutable access to the pixels `rect` covers in buffer `index`.
    ///
    /// # Safety
    ///
    /// No other reference to those pixels may exist while the returned
    /// slice lives: nobody may hold the image through `image`, and no
    /// two callers may ask for overlapping rects.
    pub unsafe fn span_mut(&self, index: usize, rect: Rect) -> &mut [Rgba] {
        let buffer = &self.buffers[index];
        assert!(rect.offset + rect.size <= buffer.len, "tile outside of the frame");
        slice::from_raw_parts_mut(buffer.base.add(rect.offset), rect.size)
    }

    /// Shared access to buffer `index`.
    ///
    /// # Safety
    ///
    /// No span of that buffer may be live, and none may be handed out
    /// while the returned reference lives.
    pub unsafe fn image(&self, index: usize) -> &Image {
        &*self.buffers[index].image.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_channels_are_little_endian() {
        let p = Rgba::new(1, 2, 3, 255);
        assert_eq!(p.0, 0xff03_0201);
        assert_eq!(p.channels(), [1, 2, 3, 255]);
        assert_eq!(p.rgb(), [1, 2, 3]);
        assert_eq!(p.alpha(), 255);
    }

    #[test]
    fn image_is_padded_to_whole_tiles() {
        let img = Image::new(12, 5, 16);
        assert_eq!(img.padded_len(), 64);
        assert_eq!(img.pixels().len(), 60);

        let img = Image::new(8, 4, 16);
        assert_eq!(img.padded_len(), 32);
    }

    #[test]
    fn rows_and_pixels_agree() {
        let mut img = Image::new(4, 3, 4);
        for (i, p) in img.pixels_mut().iter_mut().enumerate() {
            *p = Rgba(i as u32);
        }
        assert_eq!(img.get(1, 2), Rgba(9));
        assert_eq!(img.row(1), &[Rgba(4), Rgba(5), Rgba(6), Rgba(7)]);
    }

    #[test]
    fn rgb_bytes_skip_alpha_and_padding() {
        let mut img = Image::new(4, 1, 8);
        for p in img.pixels_mut().iter_mut() {
            *p = Rgba::new(10, 20, 30, 255);
        }
        let bytes = img.to_rgb_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..3], &[10, 20, 30]);
    }

    #[test]
    fn rgb_bytes_run_row_by_row() {
        let mut img = Image::new(2, 3, 4);
        for (i, p) in img.pixels_mut().iter_mut().enumerate() {
            *p = Rgba::new(i as u8, 0, 0, 255);
        }
        let reds: Vec<u8> = img.to_rgb_bytes().chunks(3).map(|c| c[0]).collect();
        assert_eq!(reds, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn targets_ping_pong() {
        assert_eq!(FrameStore::current_target(None), 0);
        assert_eq!(FrameStore::current_target(Some(0)), 1);
        assert_eq!(FrameStore::current_target(Some(1)), 0);
    }

    #[test]
    fn spans_write_through_to_the_image() {
        let store = FrameStore::new(8, 2, 8);
        unsafe {
            for p in store.span_mut(1, Rect { offset: 8, size: 8 }) {
                *p = Rgba::new(0, 0, 0, 255);
            }
            let img = store.image(1);
            assert_eq!(img.get(0, 0), Rgba::default());
            assert_eq!(img.get(0, 1).alpha(), 255);
            assert_eq!(store.image(0).get(0, 1), Rgba::default());
        }
    }
}
