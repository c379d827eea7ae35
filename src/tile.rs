//
// bmpflow - multithreaded BMP convolution/median filtering
// tile.rs - work partitioning and the thread-safe tile scheduler (C2)
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

use std::sync::Mutex;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PartitionMode {
    Row,
    Column,
    Grid,
    /// Grid with a fixed 1x1 block, per `process_by_pixel`'s delegation to
    /// `process_by_grid` with `block_size == 1`.
    Pixel,
}

impl PartitionMode {
    pub fn from_str(s: &str) -> Option<PartitionMode> {
        match s {
            "row" => Some(PartitionMode::Row),
            "column" | "col" => Some(PartitionMode::Column),
            "grid" => Some(PartitionMode::Grid),
            "pixel" => Some(PartitionMode::Pixel),
            _ => None,
        }
    }

    /// Lowercase name used on the CLI and in timing log records.
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionMode::Row => "row",
            PartitionMode::Column => "column",
            PartitionMode::Grid => "grid",
            PartitionMode::Pixel => "pixel",
        }
    }
}

impl std::fmt::Display for PartitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A disjoint rectangular region of an image, half-open on both axes:
/// rows `[start_row, end_row)`, columns `[start_column, end_column)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    pub start_row: u32,
    pub end_row: u32,
    pub start_column: u32,
    pub end_column: u32,
}

impl Tile {
    pub fn is_empty(&self) -> bool {
        self.start_row >= self.end_row || self.start_column >= self.end_column
    }
}

struct Cursor {
    next_row: u32,
    next_column: u32,
}

/// Hands out disjoint tiles to an arbitrary number of worker threads.
///
/// One mutex guards the cursor; the critical section is O(1) (increment a
/// couple of counters), matching the lock-hold discipline of
/// `process_by_row`/`process_by_column`/`process_by_grid` in the reference
/// implementation, which take the mutex as a caller-owned parameter. Here the
/// mutex is folded into the scheduler itself rather than exposed to callers.
pub struct TileScheduler {
    mode: PartitionMode,
    width: u32,
    height: u32,
    block_size: u32,
    cursor: Mutex<Cursor>,
}

impl TileScheduler {
    pub fn new(mode: PartitionMode, width: u32, height: u32, block_size: u32) -> TileScheduler {
        let block_size = match mode {
            PartitionMode::Pixel => 1,
            _ => block_size.max(1),
        };
        TileScheduler {
            mode,
            width,
            height,
            block_size,
            cursor: Mutex::new(Cursor { next_row: 0, next_column: 0 }),
        }
    }

    /// Resets the cursor so the same scheduler can drive another pass over
    /// the image (used when a pipeline worker processes more than one
    /// image with the same partition configuration).
    pub fn reset(&self) {
        let mut cursor = self.cursor.lock().unwrap();
        cursor.next_row = 0;
        cursor.next_column = 0;
    }

    /// Claims the next tile, or `None` once the image is exhausted.
    pub fn next(&self) -> Option<Tile> {
        let mut cursor = self.cursor.lock().unwrap();
        match self.mode {
            PartitionMode::Row => self.next_row(&mut cursor),
            PartitionMode::Column => self.next_column(&mut cursor),
            PartitionMode::Grid | PartitionMode::Pixel => self.next_grid(&mut cursor),
        }
    }

    fn next_row(&self, cursor: &mut Cursor) -> Option<Tile> {
        if cursor.next_row >= self.height {
            return None;
        }
        let start_row = cursor.next_row;
        cursor.next_row += self.block_size;
        Some(Tile {
            start_row,
            end_row: (start_row + self.block_size).min(self.height),
            start_column: 0,
            end_column: self.width,
        })
    }

    fn next_column(&self, cursor: &mut Cursor) -> Option<Tile> {
        if cursor.next_column >= self.width {
            return None;
        }
        let start_column = cursor.next_column;
        cursor.next_column += self.block_size;
        Some(Tile {
            start_row: 0,
            end_row: self.height,
            start_column,
            end_column: (start_column + self.block_size).min(self.width),
        })
    }

    fn next_grid(&self, cursor: &mut Cursor) -> Option<Tile> {
        if cursor.next_row >= self.height || cursor.next_column >= self.width {
            return None;
        }
        let start_row = cursor.next_row;
        let start_column = cursor.next_column;
        cursor.next_column += self.block_size;
        if cursor.next_column >= self.width {
            cursor.next_column = 0;
            cursor.next_row += self.block_size;
        }
        Some(Tile {
            start_row,
            end_row: (start_row + self.block_size).min(self.height),
            start_column,
            end_column: (start_column + self.block_size).min(self.width),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn drain(sched: &TileScheduler) -> Vec<Tile> {
        let mut out = Vec::new();
        while let Some(t) = sched.next() {
            out.push(t);
        }
        out
    }

    fn covers_exactly(tiles: &[Tile], width: u32, height: u32) {
        let mut seen = HashSet::new();
        for t in tiles {
            for y in t.start_row..t.end_row {
                for x in t.start_column..t.end_column {
                    assert!(seen.insert((x, y)), "pixel ({x},{y}) covered twice");
                }
            }
        }
        assert_eq!(seen.len(), (width * height) as usize);
    }

    #[test]
    fn row_mode_is_disjoint_and_exhaustive() {
        let sched = TileScheduler::new(PartitionMode::Row, 10, 23, 4);
        let tiles = drain(&sched);
        covers_exactly(&tiles, 10, 23);
    }

    #[test]
    fn column_mode_is_disjoint_and_exhaustive() {
        let sched = TileScheduler::new(PartitionMode::Column, 17, 9, 5);
        let tiles = drain(&sched);
        covers_exactly(&tiles, 17, 9);
    }

    #[test]
    fn grid_mode_is_disjoint_and_exhaustive() {
        let sched = TileScheduler::new(PartitionMode::Grid, 13, 11, 4);
        let tiles = drain(&sched);
        covers_exactly(&tiles, 13, 11);
    }

    #[test]
    fn pixel_mode_yields_single_pixel_tiles() {
        let sched = TileScheduler::new(PartitionMode::Pixel, 3, 2, 64);
        let tiles = drain(&sched);
        assert_eq!(tiles.len(), 6);
        for t in &tiles {
            assert_eq!(t.end_row - t.start_row, 1);
            assert_eq!(t.end_column - t.start_column, 1);
        }
        covers_exactly(&tiles, 3, 2);
    }

    #[test]
    fn reset_allows_a_second_pass() {
        let sched = TileScheduler::new(PartitionMode::Row, 5, 5, 2);
        let first = drain(&sched).len();
        sched.reset();
        let second = drain(&sched).len();
        assert_eq!(first, second);
    }

    #[test]
    fn parallel_claims_never_overlap() {
        use std::sync::Arc;
        use std::thread;

        let sched = Arc::new(TileScheduler::new(PartitionMode::Grid, 64, 64, 3));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let sched = Arc::clone(&sched);
            handles.push(thread::spawn(move || drain(&sched)));
        }
        let mut all = Vec::new();
        for h in handles {
            all.extend(h.join().unwrap());
        }
        covers_exactly(&all, 64, 64);
    }
}
