//
// bmpflow - multithreaded BMP convolution/median filtering
// pool.rs - worker pool for a single image (C3)
//
// Copyright (c) 2018 Brion Vibber
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.
//

use std::cell::UnsafeCell;
use std::time::{Duration, Instant};

use crate::filter::FilterKind;
use crate::image::Image;
use crate::kernel;
use crate::tile::{PartitionMode, TileScheduler};

/// Wraps the output image so N scoped threads can each write their own
/// disjoint tile without the borrow checker seeing the aliasing.
///
/// Safety invariant upheld by this module only: every tile handed out by a
/// `TileScheduler` for one image is disjoint from every other tile of that
/// same image (enforced by `TileScheduler::next`'s cursor arithmetic), so
/// concurrent `set_pixel` calls through different `&SyncImageCell` never
/// touch the same byte. No code outside `run_single_image` constructs one.
struct SyncImageCell(UnsafeCell<Image>);

unsafe impl Sync for SyncImageCell {}

impl SyncImageCell {
    fn new(image: Image) -> SyncImageCell {
        SyncImageCell(UnsafeCell::new(image))
    }

    /// # Safety
    /// Caller must guarantee the tile passed to the kernel call made with
    /// this reference does not overlap any tile concurrently in use by
    /// another thread holding a reference to the same cell.
    #[allow(clippy::mut_from_ref)]
    unsafe fn get_mut(&self) -> &mut Image {
        &mut *self.0.get()
    }

    fn into_inner(self) -> Image {
        self.0.into_inner()
    }
}

pub struct SingleImageResult {
    pub output: Image,
    pub wall_clock: Duration,
}

/// Runs N workers over one image, each repeatedly pulling tiles from a
/// shared scheduler and applying `filter` until the image is exhausted.
/// With `threadnum == 1` the work runs directly on the calling thread with
/// no spawn, matching the reference implementation's fast path.
pub fn run_single_image(
    threadnum: u32,
    input: &Image,
    filter: &FilterKind,
    mode: PartitionMode,
    block_size: u32,
) -> SingleImageResult {
    let started = Instant::now();
    let scheduler = TileScheduler::new(mode, input.width(), input.height(), block_size);
    let output = Image::new(input.width(), input.height());

    if threadnum <= 1 {
        let mut output = output;
        drain_scheduler(&scheduler, filter, input, &mut output);
        return SingleImageResult { output, wall_clock: started.elapsed() };
    }

    let cell = SyncImageCell::new(output);
    std::thread::scope(|scope| {
        for _ in 0..threadnum {
            let scheduler = &scheduler;
            let cell = &cell;
            scope.spawn(move || {
                while let Some(tile) = scheduler.next() {
                    // Safety: tiles from one scheduler are pairwise disjoint.
                    let output = unsafe { cell.get_mut() };
                    kernel::apply_tile(filter, input, output, tile);
                }
            });
        }
    });

    SingleImageResult { output: cell.into_inner(), wall_clock: started.elapsed() }
}

fn drain_scheduler(scheduler: &TileScheduler, filter: &FilterKind, input: &Image, output: &mut Image) {
    while let Some(tile) = scheduler.next() {
        kernel::apply_tile(filter, input, output, tile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter;
    use crate::image::Pixel;

    fn gradient_image(w: u32, h: u32) -> Image {
        let mut img = Image::new(w, h);
        for y in 0..h {
            for x in 0..w {
                img.set_pixel(x, y, Pixel::new(((x * 8) % 256) as u8, ((y * 8) % 256) as u8, 128));
            }
        }
        img
    }

    #[test]
    fn single_thread_direct_call_matches_scheduler_output() {
        let img = gradient_image(16, 16);
        let kind = filter::lookup("sh").unwrap();
        let one = run_single_image(1, &img, &kind, PartitionMode::Row, 16);
        let many = run_single_image(4, &img, &kind, PartitionMode::Grid, 5);
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(one.output.get_pixel(x, y), many.output.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn identity_filter_is_invariant_to_thread_count_and_mode() {
        let img = gradient_image(32, 32);
        let kind = filter::lookup("co").unwrap();
        let reference = run_single_image(1, &img, &kind, PartitionMode::Row, 32);
        for (threads, mode, block) in [
            (4u32, PartitionMode::Row, 8u32),
            (3, PartitionMode::Column, 5),
            (5, PartitionMode::Grid, 7),
            (2, PartitionMode::Pixel, 64),
        ] {
            let result = run_single_image(threads, &img, &kind, mode, block);
            for y in 0..32 {
                for x in 0..32 {
                    assert_eq!(
                        reference.output.get_pixel(x, y),
                        result.output.get_pixel(x, y),
                        "mismatch at ({x},{y}) threads={threads} mode={mode:?}"
                    );
                }
            }
        }
    }
}
