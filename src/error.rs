//
// bmpflow - multithreaded BMP convolution/median filtering
// error.rs - shared error type for the library
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

use std::io;

/// Each variant carries its own handling policy (fatal vs. logged-and-continue)
/// in how callers are expected to react, not in the type itself.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("could not read '{path}': {source}")]
    MissingOrUnreadable {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("allocation failed: {0}")]
    AllocationFailure(String),

    #[error("kernel invariant breach: {0}")]
    KernelInvariantBreach(String),

    #[error("could not write '{path}': {source}")]
    WriteFailure {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
