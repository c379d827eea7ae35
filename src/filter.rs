//
// bmpflow - multithreaded BMP convolution/median filtering
// filter.rs - kernel tables and filter-id lookup
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

/// A square convolution kernel plus the post-accumulation factor/bias.
pub struct Kernel {
    pub size: usize,
    pub weights: &'static [&'static [f64]],
    pub factor: f64,
    pub bias: f64,
}

/// The operation a filter id selects: either a convolution kernel or a
/// wrap-around median over a square neighborhood of the given size.
pub enum FilterKind {
    Convolution(&'static Kernel),
    Median { size: usize },
}

macro_rules! kernel {
    ($name:ident, $size:expr, $factor:expr, $bias:expr, [$($row:expr),+ $(,)?]) => {
        static $name: Kernel = Kernel {
            size: $size,
            weights: &[$(&$row),+],
            factor: $factor,
            bias: $bias,
        };
    };
}

kernel!(MOTION_BLUR, 9, 1.0 / 9.0, 0.0, [
    [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
]);

kernel!(BLUR, 5, 1.0 / 13.0, 0.0, [
    [0.0, 0.0, 1.0, 0.0, 0.0],
    [0.0, 1.0, 1.0, 1.0, 0.0],
    [1.0, 1.0, 1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0, 1.0, 0.0],
    [0.0, 0.0, 1.0, 0.0, 0.0],
]);

kernel!(GAUS_BLUR, 5, 1.0 / 256.0, 0.0, [
    [1.0, 4.0, 6.0, 4.0, 1.0],
    [4.0, 16.0, 24.0, 16.0, 4.0],
    [6.0, 24.0, 36.0, 24.0, 6.0],
    [4.0, 16.0, 24.0, 16.0, 4.0],
    [1.0, 4.0, 6.0, 4.0, 1.0],
]);

// Identity kernel.
kernel!(CONV, 3, 1.0, 0.0, [
    [0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0],
]);

kernel!(SHARPEN, 3, 1.0, 0.0, [
    [-1.0, -1.0, -1.0],
    [-1.0, 9.0, -1.0],
    [-1.0, -1.0, -1.0],
]);

kernel!(EMBOSS, 5, 1.0, 128.0, [
    [-1.0, -1.0, -1.0, -1.0, 0.0],
    [-1.0, -1.0, -1.0, 0.0, 1.0],
    [-1.0, -1.0, 0.0, 1.0, 1.0],
    [-1.0, 0.0, 1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0, 1.0, 1.0],
]);

kernel!(BIG_GAUS, 15, 1.0 / 771.0, 0.0, [
    [2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 5.0, 5.0, 5.0, 4.0, 4.0, 3.0, 3.0, 2.0, 2.0],
    [2.0, 3.0, 3.0, 4.0, 4.0, 5.0, 5.0, 6.0, 5.0, 5.0, 4.0, 4.0, 3.0, 3.0, 2.0],
    [3.0, 3.0, 4.0, 5.0, 5.0, 6.0, 6.0, 7.0, 6.0, 6.0, 5.0, 5.0, 4.0, 3.0, 3.0],
    [3.0, 4.0, 5.0, 6.0, 7.0, 7.0, 8.0, 8.0, 8.0, 7.0, 7.0, 6.0, 5.0, 4.0, 3.0],
    [4.0, 4.0, 5.0, 7.0, 8.0, 9.0, 9.0, 10.0, 9.0, 9.0, 8.0, 7.0, 5.0, 4.0, 4.0],
    [4.0, 5.0, 6.0, 7.0, 9.0, 10.0, 11.0, 11.0, 11.0, 10.0, 9.0, 7.0, 6.0, 5.0, 4.0],
    [5.0, 5.0, 6.0, 8.0, 9.0, 11.0, 12.0, 12.0, 12.0, 11.0, 9.0, 8.0, 6.0, 5.0, 5.0],
    [5.0, 6.0, 7.0, 8.0, 10.0, 11.0, 12.0, 13.0, 12.0, 11.0, 10.0, 8.0, 7.0, 6.0, 5.0],
    [5.0, 5.0, 6.0, 8.0, 9.0, 11.0, 12.0, 12.0, 12.0, 11.0, 9.0, 8.0, 6.0, 5.0, 5.0],
    [4.0, 5.0, 6.0, 7.0, 9.0, 10.0, 11.0, 11.0, 11.0, 10.0, 9.0, 7.0, 6.0, 5.0, 4.0],
    [4.0, 4.0, 5.0, 7.0, 8.0, 9.0, 9.0, 10.0, 9.0, 9.0, 8.0, 7.0, 5.0, 4.0, 4.0],
    [3.0, 4.0, 5.0, 6.0, 7.0, 7.0, 8.0, 8.0, 8.0, 7.0, 7.0, 6.0, 5.0, 4.0, 3.0],
    [3.0, 3.0, 4.0, 5.0, 5.0, 6.0, 6.0, 7.0, 6.0, 6.0, 5.0, 5.0, 4.0, 3.0, 3.0],
    [2.0, 3.0, 3.0, 4.0, 4.0, 5.0, 5.0, 6.0, 5.0, 5.0, 4.0, 4.0, 3.0, 3.0, 2.0],
    [2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 5.0, 5.0, 5.0, 4.0, 4.0, 3.0, 3.0, 2.0, 2.0],
]);

kernel!(MED_GAUS, 9, 1.0 / 213.0, 0.0, [
    [1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0, 1.0, 1.0],
    [1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 2.0, 2.0, 1.0],
    [2.0, 2.0, 3.0, 4.0, 5.0, 4.0, 3.0, 2.0, 2.0],
    [2.0, 3.0, 4.0, 5.0, 6.0, 5.0, 4.0, 3.0, 2.0],
    [2.0, 3.0, 5.0, 6.0, 7.0, 6.0, 5.0, 3.0, 2.0],
    [2.0, 3.0, 4.0, 5.0, 6.0, 5.0, 4.0, 3.0, 2.0],
    [2.0, 2.0, 3.0, 4.0, 5.0, 4.0, 3.0, 2.0, 2.0],
    [1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 2.0, 2.0, 1.0],
    [1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0, 1.0, 1.0],
]);

const BOX_ROW_15: [f64; 15] = [1.0; 15];
static BOX_BLUR: Kernel = Kernel {
    size: 15,
    weights: &[
        &BOX_ROW_15, &BOX_ROW_15, &BOX_ROW_15, &BOX_ROW_15, &BOX_ROW_15,
        &BOX_ROW_15, &BOX_ROW_15, &BOX_ROW_15, &BOX_ROW_15, &BOX_ROW_15,
        &BOX_ROW_15, &BOX_ROW_15, &BOX_ROW_15, &BOX_ROW_15, &BOX_ROW_15,
    ],
    factor: 1.0 / 225.0,
    bias: 0.0,
};

/// Fixed neighborhood size used by the "mm" median filter id, matching the
/// reference implementation's hardcoded `apply_median_filter(spec, 15)` call.
const MEDIAN_FILTER_SIZE: usize = 15;

/// Resolves a two-letter filter id to its kernel or median operation.
pub fn lookup(id: &str) -> Result<FilterKind, Error> {
    match id {
        "mb" => Ok(FilterKind::Convolution(&MOTION_BLUR)),
        "bb" => Ok(FilterKind::Convolution(&BLUR)),
        "gb" => Ok(FilterKind::Convolution(&GAUS_BLUR)),
        "co" => Ok(FilterKind::Convolution(&CONV)),
        "sh" => Ok(FilterKind::Convolution(&SHARPEN)),
        "em" => Ok(FilterKind::Convolution(&EMBOSS)),
        "mm" => Ok(FilterKind::Median { size: MEDIAN_FILTER_SIZE }),
        "gg" => Ok(FilterKind::Convolution(&BIG_GAUS)),
        "bo" => Ok(FilterKind::Convolution(&BOX_BLUR)),
        "mg" => Ok(FilterKind::Convolution(&MED_GAUS)),
        other => Err(Error::BadArgument(format!("unknown filter id '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ten_ids_resolve() {
        for id in ["mb", "bb", "gb", "co", "sh", "em", "mm", "gg", "bo", "mg"] {
            assert!(lookup(id).is_ok(), "{} should resolve", id);
        }
    }

    #[test]
    fn unknown_id_is_bad_argument() {
        assert!(matches!(lookup("zz"), Err(Error::BadArgument(_))));
    }

    #[test]
    fn identity_kernel_is_centered_one() {
        match lookup("co").unwrap() {
            FilterKind::Convolution(k) => {
                assert_eq!(k.weights[1][1], 1.0);
                assert_eq!(k.factor, 1.0);
            }
            _ => panic!("co should be a convolution"),
        }
    }

    #[test]
    fn median_uses_fixed_size() {
        match lookup("mm").unwrap() {
            FilterKind::Median { size } => assert_eq!(size, 15),
            _ => panic!("mm should be a median filter"),
        }
    }
}
