//
// bmpflow - multithreaded BMP convolution/median filtering
// io.rs - BMP load/save, delegated to the `bmp` crate collaborator
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

use std::path::Path;

use crate::error::Error;
use crate::image::{Image, Pixel};

/// Custom decoding/encoding is explicitly out of scope; this module only
/// adapts the `bmp` crate's `Image` to ours. Orientation (top-down vs
/// bottom-up) is handled entirely by the collaborator crate.
pub fn load(path: impl AsRef<Path>) -> Result<Image, Error> {
    let path = path.as_ref();
    let src = bmp::open(path).map_err(|e| Error::MissingOrUnreadable {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
    })?;

    let width = src.get_width();
    let height = src.get_height();
    let mut image = Image::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let p = src.get_pixel(x, y);
            image.set_pixel(x, y, Pixel::new(p.r, p.g, p.b));
        }
    }
    Ok(image)
}

pub fn save(image: &Image, path: impl AsRef<Path>) -> Result<(), Error> {
    let path = path.as_ref();
    let mut out = bmp::Image::new(image.width(), image.height());
    for y in 0..image.height() {
        for x in 0..image.width() {
            let p = image.get_pixel(x, y);
            out.set_pixel(x, y, bmp::Pixel::new(p.r, p.g, p.b));
        }
    }
    out.save(path).map_err(|e| Error::WriteFailure {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fixture.bmp");

        let mut image = Image::new(4, 3);
        for y in 0..3 {
            for x in 0..4 {
                image.set_pixel(x, y, Pixel::new((x * 50) as u8, (y * 60) as u8, 7));
            }
        }

        save(&image, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.width(), 4);
        assert_eq!(loaded.height(), 3);
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(loaded.get_pixel(x, y), image.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load("/nonexistent/path/does-not-exist.bmp");
        assert!(matches!(err, Err(Error::MissingOrUnreadable { .. })));
    }
}
