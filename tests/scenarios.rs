//
// bmpflow - multithreaded BMP convolution/median filtering
// tests/scenarios.rs - end-to-end scenarios S1, S2, S4, S5 from spec §8
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

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bmpflow::image::{Image, Pixel};
use bmpflow::tile::PartitionMode;
use bmpflow::{filter, pool, queue};
use rand::Rng;

fn gradient_image(size: u32) -> Image {
    let mut img = Image::new(size, size);
    for y in 0..size {
        for x in 0..size {
            img.set_pixel(x, y, Pixel::new(((x * 8) % 256) as u8, ((y * 8) % 256) as u8, 128));
        }
    }
    img
}

/// S1: a 32x32 gradient run through the identity filter in row mode,
/// block 8, 4 threads must come back byte-for-byte unchanged.
#[test]
fn s1_identity_filter_is_a_no_op() {
    let img = gradient_image(32);
    let kind = filter::lookup("co").unwrap();
    let result = pool::run_single_image(4, &img, &kind, PartitionMode::Row, 8);

    for y in 0..32 {
        for x in 0..32 {
            assert_eq!(result.output.get_pixel(x, y), img.get_pixel(x, y));
        }
    }
}

/// Independent reference implementation of clamp-to-edge 3x3 convolution for
/// a single output pixel, used to cross-check the kernel's own math at both
/// an interior point (S2's center probe) and a corner (clamp-to-edge probe)
/// without duplicating `kernel::apply_convolution`'s code path.
fn reference_sharpen_pixel(img: &Image, x: i64, y: i64) -> Pixel {
    const WEIGHTS: [[i64; 3]; 3] = [[-1, -1, -1], [-1, 9, -1], [-1, -1, -1]];
    let w = img.width() as i64;
    let h = img.height() as i64;
    let mut acc = [0i64; 3];
    for fy in 0..3i64 {
        for fx in 0..3i64 {
            let sx = (x + fx - 1).clamp(0, w - 1) as u32;
            let sy = (y + fy - 1).clamp(0, h - 1) as u32;
            let p = img.get_pixel(sx, sy);
            let weight = WEIGHTS[fy as usize][fx as usize];
            acc[0] += weight * p.r as i64;
            acc[1] += weight * p.g as i64;
            acc[2] += weight * p.b as i64;
        }
    }
    Pixel::new(acc[0].clamp(0, 255) as u8, acc[1].clamp(0, 255) as u8, acc[2].clamp(0, 255) as u8)
}

/// S2: same image, sharpen filter, grid mode block 7. The center pixel's
/// value matches an independently computed clamp-to-edge 3x3 convolution;
/// the corner pixel must reflect clamp-to-edge replication rather than
/// wrapping to the opposite edge (a wrap-around implementation would pull
/// in the bottom-right corner's very different gradient values instead).
#[test]
fn s2_sharpen_matches_hand_computed_center_and_clamps_at_corner() {
    let img = gradient_image(32);
    let kind = filter::lookup("sh").unwrap();
    let result = pool::run_single_image(1, &img, &kind, PartitionMode::Grid, 7);

    assert_eq!(result.output.get_pixel(16, 16), reference_sharpen_pixel(&img, 16, 16));
    assert_eq!(result.output.get_pixel(0, 0), reference_sharpen_pixel(&img, 0, 0));
}

/// Saturating clamp: an all-white image under the sharpen kernel must stay
/// all white (every accumulator saturates at the top of the range).
#[test]
fn clamping_saturates_at_255() {
    let mut img = Image::new(8, 8);
    for y in 0..8 {
        for x in 0..8 {
            img.set_pixel(x, y, Pixel::new(255, 255, 255));
        }
    }
    let kind = filter::lookup("sh").unwrap();
    let result = pool::run_single_image(1, &img, &kind, PartitionMode::Row, 8);
    for y in 0..8 {
        for x in 0..8 {
            assert_eq!(result.output.get_pixel(x, y), Pixel::new(255, 255, 255));
        }
    }
}

/// S4: queue stress. capacity=2, mem_cap = 1.5x one image's estimate, one
/// producer pushing 100 images, one consumer popping after a short pause
/// each time. All 100 must arrive in order and depth must never exceed 2.
#[test]
fn s4_queue_stress_preserves_order_and_bounds() {
    let sample = Image::new(4, 4);
    let mem_cap = (sample.estimate_bytes() as f64 * 1.5) as usize;
    let q = Arc::new(queue::ImageQueue::new(2, mem_cap));
    let done = Arc::new(AtomicUsize::new(0));

    let producer_q = Arc::clone(&q);
    let producer = thread::spawn(move || {
        for i in 0..100 {
            producer_q.push(queue::Item::new(Image::new(4, 4), format!("{i}.bmp")), None);
        }
    });

    let mut received = Vec::new();
    for _ in 0..100 {
        thread::sleep(Duration::from_millis(1));
        let item = q.pop(100, &done, None).expect("producer still has items in flight");
        received.push(item.filename);
        assert!(q.len() <= 2, "queue depth exceeded capacity");
    }
    producer.join().unwrap();

    let expected: Vec<String> = (0..100).map(|i| format!("{i}.bmp")).collect();
    assert_eq!(received, expected);
}

/// S5: median round-trip on a 16x16 random image, column mode block 4,
/// three threads, against the single-threaded reference; and idempotence
/// when applied twice to a checkerboard.
#[test]
fn s5_median_matches_single_thread_reference_and_is_idempotent_on_checkerboard() {
    let mut rng = rand::thread_rng();
    let mut img = Image::new(16, 16);
    for y in 0..16 {
        for x in 0..16 {
            img.set_pixel(x, y, Pixel::new(rng.gen(), rng.gen(), rng.gen()));
        }
    }

    let kind = filter::lookup("mm").unwrap();
    let reference = pool::run_single_image(1, &img, &kind, PartitionMode::Row, 16);
    let threaded = pool::run_single_image(3, &img, &kind, PartitionMode::Column, 4);

    for y in 0..16 {
        for x in 0..16 {
            assert_eq!(reference.output.get_pixel(x, y), threaded.output.get_pixel(x, y));
        }
    }

    let mut checker = Image::new(16, 16);
    for y in 0..16 {
        for x in 0..16 {
            let v = if (x + y) % 2 == 0 { 255 } else { 0 };
            checker.set_pixel(x, y, Pixel::new(v, v, v));
        }
    }
    let once = pool::run_single_image(1, &checker, &kind, PartitionMode::Row, 16);
    let twice = pool::run_single_image(1, &once.output, &kind, PartitionMode::Row, 16);
    for y in 0..16 {
        for x in 0..16 {
            assert_eq!(once.output.get_pixel(x, y), twice.output.get_pixel(x, y));
        }
    }
}
