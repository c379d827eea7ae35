//
// bmpflow - multithreaded BMP convolution/median filtering
// kernel.rs - per-pixel filter application over a tile (C1)
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

use crate::filter::{FilterKind, Kernel};
use crate::image::{Image, Pixel};
use crate::tile::Tile;

/// Applies `kind` to every pixel in `tile`, reading from `src` and writing
/// into the same coordinates of `dst`. `src` and `dst` must have identical
/// dimensions; `dst` may alias `src` only for coordinates outside `tile`
/// (the scheduler guarantees tiles handed to concurrent callers are disjoint).
pub fn apply_tile(kind: &FilterKind, src: &Image, dst: &mut Image, tile: Tile) {
    match kind {
        FilterKind::Convolution(k) => apply_convolution(k, src, dst, tile),
        FilterKind::Median { size } => apply_median(*size, src, dst, tile),
    }
}

/// Clamp-to-edge convolution, matching `apply_filter` in the reference
/// implementation: out-of-bounds taps are clamped to the nearest edge pixel
/// rather than wrapped or zero-padded.
fn apply_convolution(kernel: &Kernel, src: &Image, dst: &mut Image, tile: Tile) {
    let width = src.width() as i64;
    let height = src.height() as i64;
    let padding = (kernel.size / 2) as i64;

    for y in tile.start_row..tile.end_row {
        for x in tile.start_column..tile.end_column {
            let mut red_acc = 0.0f64;
            let mut green_acc = 0.0f64;
            let mut blue_acc = 0.0f64;

            for filter_y in 0..kernel.size {
                for filter_x in 0..kernel.size {
                    let potential_x = x as i64 + filter_x as i64 - padding;
                    let potential_y = y as i64 + filter_y as i64 - padding;
                    let image_x = potential_x.clamp(0, width - 1) as u32;
                    let image_y = potential_y.clamp(0, height - 1) as u32;

                    let orig = src.get_pixel(image_x, image_y);
                    let weight = kernel.weights[filter_y][filter_x];

                    red_acc += orig.r as f64 * weight;
                    green_acc += orig.g as f64 * weight;
                    blue_acc += orig.b as f64 * weight;
                }
            }

            let result = Pixel::new(
                clamp_channel(red_acc * kernel.factor + kernel.bias),
                clamp_channel(green_acc * kernel.factor + kernel.bias),
                clamp_channel(blue_acc * kernel.factor + kernel.bias),
            );
            dst.set_pixel(x, y, result);
        }
    }
}

fn clamp_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Wrap-around median filter, matching `apply_median_filter`: neighborhood
/// coordinates that fall outside the image wrap around to the opposite edge
/// instead of clamping. Each channel is selected independently via
/// quickselect so the three channels of one output pixel need not come from
/// the same source pixel, matching the reference implementation exactly.
fn apply_median(size: usize, src: &Image, dst: &mut Image, tile: Tile) {
    let half = (size / 2) as i64;
    let width = src.width() as i64;
    let height = src.height() as i64;
    let area = size * size;

    let mut red = vec![0i32; area];
    let mut green = vec![0i32; area];
    let mut blue = vec![0i32; area];

    for y in tile.start_row..tile.end_row {
        for x in tile.start_column..tile.end_column {
            let mut n = 0;
            for filter_y in -half..=half {
                for filter_x in -half..=half {
                    let image_x = ((x as i64 + filter_x).rem_euclid(width)) as u32;
                    let image_y = ((y as i64 + filter_y).rem_euclid(height)) as u32;
                    let orig = src.get_pixel(image_x, image_y);
                    red[n] = orig.r as i32;
                    green[n] = orig.g as i32;
                    blue[n] = orig.b as i32;
                    n += 1;
                }
            }

            let k = area / 2;
            let result = Pixel::new(
                select_kth(&mut red, k) as u8,
                select_kth(&mut green, k) as u8,
                select_kth(&mut blue, k) as u8,
            );
            dst.set_pixel(x, y, result);
        }
    }
}

/// Quickselect with the pivot chosen as the middle element of the active
/// range, matching `selectKth` in the reference implementation exactly so
/// median output is byte-for-byte reproducible: ties among equal channel
/// values are broken the same way regardless of input ordering.
fn select_kth(data: &mut [i32], k: usize) -> i32 {
    select_kth_range(data, 0, data.len(), k)
}

fn select_kth_range(data: &mut [i32], s: usize, e: usize, k: usize) -> i32 {
    if e - s <= 5 {
        for i in s + 1..e {
            let mut j = i;
            while j > s && data[j - 1] > data[j] {
                data.swap(j - 1, j);
                j -= 1;
            }
        }
        return data[s + k];
    }

    let p = (s + e) / 2;
    data.swap(p, e - 1);

    let mut j = s;
    for i in s..e - 1 {
        if data[i] < data[e - 1] {
            data.swap(i, j);
            j += 1;
        }
    }
    data.swap(j, e - 1);

    if k == j - s {
        data[j]
    } else if k < j - s {
        select_kth_range(data, s, j, k)
    } else {
        select_kth_range(data, j + 1, e, k - (j - s + 1))
    }
}
