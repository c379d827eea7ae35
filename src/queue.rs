//
// bmpflow - multithreaded BMP convolution/median filtering
// queue.rs - bounded thread-safe image queue with dual back-pressure (C4)
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

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::image::Image;
use crate::logging::{EventTag, TimingLog};

/// How often a blocked `pop` re-checks the termination counter while the
/// queue is empty. The reference implementation uses a similar periodic
/// timed wait rather than an indefinite one, so shutdown isn't missed.
const POP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One queued unit: an image plus the filename it travels with, and the
/// memory estimate computed at push time so pop doesn't need to recompute it
/// after the image may have been consumed.
pub struct Item {
    pub image: Image,
    pub filename: String,
    /// `true` for the termination sentinel pushed after the reader barrier;
    /// distinct from a load-failure poison record, which still carries a
    /// real filename and must reach a writer rather than stop a worker.
    pub is_terminal: bool,
    estimate: usize,
}

impl Item {
    pub fn new(image: Image, filename: String) -> Item {
        let estimate = image.estimate_bytes();
        Item { image, filename, is_terminal: false, estimate }
    }

    /// A poison record: carries the filename of a file the reader could not
    /// load, no pixel data. Workers forward it untouched to the output
    /// queue; writers count it done without attempting to persist it.
    pub fn poison(filename: String) -> Item {
        Item { image: Image::sentinel(), filename, is_terminal: false, estimate: 0 }
    }

    /// The empty-image, no-filename sentinel that wakes and terminates a
    /// worker once real input is exhausted.
    pub fn poison_sentinel() -> Item {
        Item { image: Image::sentinel(), filename: String::new(), is_terminal: true, estimate: 0 }
    }

    pub fn is_poison(&self) -> bool {
        self.image.is_sentinel()
    }
}

struct State {
    items: VecDeque<Item>,
    mem_bytes: usize,
}

/// A FIFO of `Item`s bounded both by item count and by estimated total
/// memory, with the "oversized item admitted into an empty queue" exception
/// that keeps a single huge image from deadlocking the pipeline.
pub struct ImageQueue {
    capacity: usize,
    mem_cap: usize,
    state: Mutex<State>,
    non_empty: Condvar,
    non_full: Condvar,
}

impl ImageQueue {
    pub fn new(capacity: usize, mem_cap: usize) -> ImageQueue {
        ImageQueue {
            capacity,
            mem_cap,
            state: Mutex::new(State { items: VecDeque::new(), mem_bytes: 0 }),
            non_empty: Condvar::new(),
            non_full: Condvar::new(),
        }
    }

    /// Blocks while the queue is full by count, or while it is non-empty and
    /// admitting this item would cross the memory cap. An empty queue always
    /// admits the next item regardless of its size. Records a `QPUSH` timing
    /// event (spec's pipeline per-event log format) when `timing_log` is
    /// given, timed from the call to the item actually landing in the queue.
    pub fn push(&self, item: Item, timing_log: Option<&TimingLog>) {
        let started = Instant::now();
        let estimate = item.estimate;
        let mut state = self.state.lock().unwrap();
        loop {
            let over_capacity = state.items.len() >= self.capacity;
            let over_memory = !state.items.is_empty() && state.mem_bytes + estimate > self.mem_cap;
            if !over_capacity && !over_memory {
                break;
            }
            state = self.non_full.wait(state).unwrap();
        }
        state.mem_bytes += estimate;
        state.items.push_back(item);
        self.non_empty.notify_one();
        drop(state);

        if let Some(log) = timing_log {
            log.record_event(EventTag::QPush, started.elapsed().as_secs_f64());
        }
    }

    /// Blocks while the queue is empty, waking periodically to re-check
    /// `written_done >= total_files`; once that holds, returns `None` so an
    /// idle consumer can exit instead of waiting forever. Records a `QPOP`
    /// timing event for every successful pop; a `None` return is not an
    /// event (nothing was dequeued).
    pub fn pop(&self, total_files: usize, written_done: &AtomicUsize, timing_log: Option<&TimingLog>) -> Option<Item> {
        let started = Instant::now();
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(item) = state.items.pop_front() {
                state.mem_bytes -= item.estimate;
                self.non_full.notify_one();
                drop(state);

                if let Some(log) = timing_log {
                    log.record_event(EventTag::QPop, started.elapsed().as_secs_f64());
                }
                return Some(item);
            }
            if written_done.load(Ordering::Acquire) >= total_files {
                return None;
            }
            let (guard, _timeout) = self
                .non_empty
                .wait_timeout(state, POP_POLL_INTERVAL)
                .unwrap();
            state = guard;
        }
    }

    /// Non-blocking drain of one item, used by a writer that is about to
    /// exit to flush stragglers and keep memory accounting consistent.
    pub fn try_drain_one(&self) -> Option<Item> {
        let mut state = self.state.lock().unwrap();
        let item = state.items.pop_front()?;
        state.mem_bytes -= item.estimate;
        self.non_full.notify_one();
        Some(item)
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn mem_bytes(&self) -> usize {
        self.state.lock().unwrap().mem_bytes
    }
}
