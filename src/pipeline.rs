//
// bmpflow - multithreaded BMP convolution/median filtering
// pipeline.rs - reader/worker/writer pipeline driver (C5)
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

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::time::Instant;

use crate::error::Error;
use crate::filter::FilterKind;
use crate::io;
use crate::logging::{EventTag, TimingLog};
use crate::kernel;
use crate::queue::{ImageQueue, Item};
use crate::tile::{PartitionMode, TileScheduler};

pub struct PipelineConfig<'a> {
    pub files: &'a [String],
    pub readers: u32,
    pub workers: u32,
    pub writers: u32,
    pub queue_capacity: usize,
    pub queue_mem_cap_bytes: usize,
    pub mode: PartitionMode,
    pub block_size: u32,
    pub filter: &'a FilterKind,
    pub output_prefix: Option<&'a str>,
    pub output_dir: &'a std::path::Path,
    pub timing_log: Option<&'a TimingLog>,
}

pub struct PipelineOutcome {
    pub written: usize,
}

/// Spawns R readers, W workers, T writers over the shared counters and
/// queues and blocks until every file is accounted for.
///
/// Read-failure policy: a reader that cannot load a file pushes a poison
/// record (filename only) into the input queue rather than skipping it. A
/// worker that pops a poison record forwards it untouched to the output
/// queue; a writer that pops one counts it done without attempting to
/// persist it. This keeps `read_claimed`/`written_done` aligned without
/// special-casing the termination math.
pub fn run(cfg: &PipelineConfig) -> Result<PipelineOutcome, Error> {
    let file_count = cfg.files.len();
    let read_claimed = AtomicUsize::new(0);
    let written_done = AtomicUsize::new(0);
    let input_q = ImageQueue::new(cfg.queue_capacity, cfg.queue_mem_cap_bytes);
    let output_q = ImageQueue::new(cfg.queue_capacity, cfg.queue_mem_cap_bytes);
    let reader_barrier = Barrier::new(cfg.readers as usize);

    std::thread::scope(|scope| {
        for _ in 0..cfg.readers {
            scope.spawn(|| {
                reader_loop(
                    cfg.files,
                    &read_claimed,
                    &input_q,
                    &reader_barrier,
                    cfg.workers,
                    cfg.timing_log,
                )
            });
        }
        for _ in 0..cfg.workers {
            scope.spawn(|| {
                worker_loop(
                    &input_q,
                    &output_q,
                    file_count,
                    &written_done,
                    cfg.filter,
                    cfg.mode,
                    cfg.block_size,
                    cfg.timing_log,
                )
            });
        }
        for _ in 0..cfg.writers {
            scope.spawn(|| {
                writer_loop(
                    &output_q,
                    file_count,
                    &written_done,
                    cfg.output_prefix,
                    cfg.output_dir,
                    cfg.timing_log,
                )
            });
        }
    });

    Ok(PipelineOutcome { written: written_done.load(Ordering::Acquire) })
}

fn reader_loop(
    files: &[String],
    read_claimed: &AtomicUsize,
    input_q: &ImageQueue,
    barrier: &Barrier,
    worker_count: u32,
    timing_log: Option<&TimingLog>,
) {
    loop {
        let i = read_claimed.fetch_add(1, Ordering::AcqRel);
        if i >= files.len() {
            read_claimed.fetch_sub(1, Ordering::AcqRel);
            break;
        }

        let started = Instant::now();
        let filename = &files[i];
        match io::load(filename) {
            Ok(image) => input_q.push(Item::new(image, filename.clone()), timing_log),
            Err(e) => {
                tracing::error!(filename, error = %e, "reader: could not load file, pushing poison record");
                input_q.push(Item::poison(filename.clone()), timing_log);
            }
        }
        if let Some(log) = timing_log {
            log.record_event(EventTag::Reader, started.elapsed().as_secs_f64());
        }
    }

    barrier.wait();

    // Every reader races to push sentinels after the barrier; pushing
    // worker_count + 1 per reader over-provisions slightly but a worker that
    // sees an extra sentinel simply exits once, which is harmless.
    for _ in 0..worker_count + 1 {
        input_q.push(Item::poison_sentinel(), timing_log);
    }
}

fn worker_loop(
    input_q: &ImageQueue,
    output_q: &ImageQueue,
    file_count: usize,
    written_done: &AtomicUsize,
    filter: &FilterKind,
    mode: PartitionMode,
    block_size: u32,
    timing_log: Option<&TimingLog>,
) {
    loop {
        let started = Instant::now();
        let item = match input_q.pop(file_count, written_done, timing_log) {
            Some(item) => item,
            None => break,
        };

        if item.is_terminal {
            break;
        }

        if item.is_poison() {
            // A reader's load-failure poison record: forward untouched.
            output_q.push(item, timing_log);
            continue;
        }

        let mut result = crate::image::Image::new(item.image.width(), item.image.height());
        let scheduler = TileScheduler::new(mode, item.image.width(), item.image.height(), block_size);
        while let Some(tile) = scheduler.next() {
            kernel::apply_tile(filter, &item.image, &mut result, tile);
        }

        output_q.push(Item::new(result, item.filename), timing_log);

        if let Some(log) = timing_log {
            log.record_event(EventTag::Worker, started.elapsed().as_secs_f64());
        }
    }
}

fn writer_loop(
    output_q: &ImageQueue,
    file_count: usize,
    written_done: &AtomicUsize,
    output_prefix: Option<&str>,
    output_dir: &std::path::Path,
    timing_log: Option<&TimingLog>,
) {
    loop {
        if written_done.load(Ordering::Acquire) >= file_count {
            break;
        }

        let started = Instant::now();
        let item = match output_q.pop(file_count, written_done, timing_log) {
            Some(item) => item,
            None => break,
        };

        if item.is_poison() {
            tracing::warn!(filename = %item.filename, "writer: counting unwritten poison record as done");
            written_done.fetch_add(1, Ordering::Release);
            continue;
        }

        let out_path = output_path(output_dir, output_prefix, &item.filename);
        match io::save(&item.image, &out_path) {
            Ok(()) => {
                written_done.fetch_add(1, Ordering::Release);
                if let Some(log) = timing_log {
                    log.record_event(EventTag::Writer, started.elapsed().as_secs_f64());
                }
            }
            Err(e) => {
                tracing::error!(path = %out_path.display(), error = %e, "writer: failed to persist image, counting as done");
                written_done.fetch_add(1, Ordering::Release);
            }
        }
    }

    // Drain any stragglers so memory accounting stays consistent even though
    // this writer is about to exit; another writer (or none) may still be
    // alive to pick up the slack.
    while written_done.load(Ordering::Acquire) < file_count {
        match output_q.try_drain_one() {
            Some(item) if item.is_poison() => {
                written_done.fetch_add(1, Ordering::Release);
            }
            Some(item) => {
                let out_path = output_path(output_dir, output_prefix, &item.filename);
                let _ = io::save(&item.image, &out_path);
                written_done.fetch_add(1, Ordering::Release);
            }
            None => break,
        }
    }
}

fn output_path(output_dir: &std::path::Path, prefix: Option<&str>, filename: &str) -> PathBuf {
    match prefix {
        Some(p) if !p.is_empty() => output_dir.join(format!("{p}_{filename}")),
        _ => output_dir.join(filename),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter;
    use crate::image::Pixel;
    use tempfile::tempdir;

    fn write_fixture(path: &std::path::Path, w: u32, h: u32) {
        let mut img = crate::image::Image::new(w, h);
        for y in 0..h {
            for x in 0..w {
                img.set_pixel(x, y, Pixel::new(((x * 8) % 256) as u8, ((y * 8) % 256) as u8, 128));
            }
        }
        io::save(&img, path).unwrap();
    }

    #[test]
    fn every_file_appears_once_with_identity_filter() {
        let dir = tempdir().unwrap();
        let names = ["a.bmp", "b.bmp", "c.bmp"];
        let mut files = Vec::new();
        for name in &names {
            let path = dir.path().join(name);
            write_fixture(&path, 8, 8);
            files.push(path.to_string_lossy().into_owned());
        }

        let out_dir = dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();

        let kind = filter::lookup("co").unwrap();
        let cfg = PipelineConfig {
            files: &files,
            readers: 1,
            workers: 2,
            writers: 1,
            queue_capacity: 4,
            queue_mem_cap_bytes: usize::MAX,
            mode: PartitionMode::Row,
            block_size: 8,
            filter: &kind,
            output_prefix: Some("out"),
            output_dir: &out_dir,
            timing_log: None,
        };

        let outcome = run(&cfg).unwrap();
        assert_eq!(outcome.written, 3);

        for name in &names {
            let produced = out_dir.join(format!("out_{name}"));
            assert!(produced.exists(), "{:?} should exist", produced);
            let loaded = io::load(&produced).unwrap();
            let original = io::load(dir.path().join(name)).unwrap();
            assert_eq!(loaded.width(), original.width());
            assert_eq!(loaded.height(), original.height());
            for y in 0..loaded.height() {
                for x in 0..loaded.width() {
                    assert_eq!(loaded.get_pixel(x, y), original.get_pixel(x, y));
                }
            }
        }
    }

    #[test]
    fn missing_input_still_counts_as_done() {
        let dir = tempdir().unwrap();
        let good_path = dir.path().join("good.bmp");
        write_fixture(&good_path, 4, 4);

        let missing_path = dir.path().join("missing.bmp").to_string_lossy().into_owned();
        let files = vec![good_path.to_string_lossy().into_owned(), missing_path];

        let out_dir = dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();

        let kind = filter::lookup("co").unwrap();
        let cfg = PipelineConfig {
            files: &files,
            readers: 1,
            workers: 1,
            writers: 1,
            queue_capacity: 4,
            queue_mem_cap_bytes: usize::MAX,
            mode: PartitionMode::Row,
            block_size: 4,
            filter: &kind,
            output_prefix: None,
            output_dir: &out_dir,
            timing_log: None,
        };

        let outcome = run(&cfg).unwrap();
        assert_eq!(outcome.written, 2);
    }
}
