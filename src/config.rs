//
// bmpflow - multithreaded BMP convolution/median filtering
// config.rs - the configuration envelope shared by both execution modes
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

use crate::error::Error;
use crate::tile::PartitionMode;

pub const DEFAULT_QUEUE_CAPACITY: usize = 20;
pub const DEFAULT_QUEUE_MEM_CAP_MB: usize = 500;

/// Per-thread-count knobs for single-image mode, or reader/worker/writer
/// counts plus queue caps for pipeline mode. Presence of `Rww` selects
/// pipeline mode; this mirrors `--rww`'s role as the mode switch on the CLI.
#[derive(Clone, Debug)]
pub enum ExecutionConfig {
    SingleImage { threadnum: u32 },
    Pipeline {
        readers: u32,
        workers: u32,
        writers: u32,
        queue_capacity: usize,
        queue_mem_cap_bytes: usize,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub mode: PartitionMode,
    pub block_size: u32,
    pub filter_id: String,
    pub execution: ExecutionConfig,
    pub files: Vec<String>,
    pub output_prefix: Option<String>,
    pub log_enabled: bool,
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        if self.block_size < 1 {
            return Err(Error::BadArgument("block size must be >= 1".into()));
        }
        if self.files.is_empty() {
            return Err(Error::BadArgument("at least one input filename is required".into()));
        }
        match &self.execution {
            ExecutionConfig::SingleImage { threadnum } => {
                if *threadnum < 1 {
                    return Err(Error::BadArgument("threadnum must be >= 1".into()));
                }
            }
            ExecutionConfig::Pipeline { readers, workers, writers, .. } => {
                for (name, n) in [("readers", readers), ("workers", workers), ("writers", writers)] {
                    if *n < 1 || *n > 255 {
                        return Err(Error::BadArgument(format!("{name} count must be in 1..=255")));
                    }
                }
            }
        }
        crate::filter::lookup(&self.filter_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            mode: PartitionMode::Row,
            block_size: 8,
            filter_id: "co".into(),
            execution: ExecutionConfig::SingleImage { threadnum: 4 },
            files: vec!["a.bmp".into()],
            output_prefix: None,
            log_enabled: false,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn zero_block_size_rejected() {
        let mut cfg = base_config();
        cfg.block_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_filter_rejected() {
        let mut cfg = base_config();
        cfg.filter_id = "xx".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn pipeline_rww_out_of_range_rejected() {
        let mut cfg = base_config();
        cfg.execution = ExecutionConfig::Pipeline {
            readers: 1,
            workers: 0,
            writers: 1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue_mem_cap_bytes: DEFAULT_QUEUE_MEM_CAP_MB * 1024 * 1024,
        };
        assert!(cfg.validate().is_err());
    }
}
